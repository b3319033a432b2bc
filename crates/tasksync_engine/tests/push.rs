use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use futures_util::SinkExt;
use tasksync_core::{
    CloseKind, ConnectionId, SubmitRequest, TaskDetail, TaskEvent, TaskStatus, TaskSummary,
};
use tasksync_engine::{
    classify_close, ApiError, ApiSettings, EngineEvent, EngineHandle, FailureKind, PushConnector,
    PushError, PushFrame, PushStream, SubmittedTask, TaskApi, TimerId, WsConnector,
};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    tasksync_logging::initialize_for_tests();
}

/// Starts a one-shot websocket server that plays `script` then closes.
fn serve_script(runtime: &Runtime, script: Vec<Message>) -> SocketAddr {
    runtime.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            for message in script {
                if socket.send(message).await.is_err() {
                    return;
                }
            }
        });
        addr
    })
}

fn collect_until_closed(events: &mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.recv_timeout(WAIT) {
        let done = matches!(event, EngineEvent::PushClosed { .. });
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

struct UnusedApi;

#[async_trait::async_trait]
impl TaskApi for UnusedApi {
    async fn fetch_task_list(&self) -> Result<Vec<TaskSummary>, ApiError> {
        Ok(Vec::new())
    }

    async fn fetch_task_detail(&self, task_id: &str, _: bool) -> Result<TaskDetail, ApiError> {
        Err(ApiError {
            kind: FailureKind::HttpStatus(404),
            message: format!("{task_id} not found"),
        })
    }

    async fn submit_task(&self, _: &SubmitRequest) -> Result<SubmittedTask, ApiError> {
        Ok(SubmittedTask {
            task_id: "fresh".to_string(),
        })
    }

    async fn retry_task(&self, task_id: &str) -> Result<TaskDetail, ApiError> {
        self.fetch_task_detail(task_id, false).await
    }
}

fn ws_settings(addr: SocketAddr) -> ApiSettings {
    ApiSettings {
        base_url: format!("http://{addr}"),
        ..ApiSettings::default()
    }
}

#[test]
fn frames_are_forwarded_in_order_and_garbage_is_dropped() {
    init_logging();
    let server = Runtime::new().expect("runtime");
    let addr = serve_script(
        &server,
        vec![
            Message::Text(
                r#"{"event":"snapshot","task":{"task_id":"t1","status":"running","logs":[]}}"#
                    .to_string(),
            ),
            Message::Text("not json at all".to_string()),
            Message::Text(r#"{"event":"log","task_id":"t1","line":"page 1"}"#.to_string()),
            Message::Text(
                r#"{"event":"status","task_id":"t1","status":"success","timestamp":"T2"}"#
                    .to_string(),
            ),
            Message::Close(Some(CloseFrame {
                code: CloseCode::from(4404),
                reason: "task not found".into(),
            })),
        ],
    );

    let (engine, events) = EngineHandle::with_backends(
        Arc::new(UnusedApi),
        Arc::new(WsConnector::new(ws_settings(addr))),
    );
    let connection = ConnectionId(7);
    engine.open_push(connection, "t1");

    let seen = collect_until_closed(&events);
    assert_eq!(seen.len(), 5, "{seen:?}");
    assert_eq!(seen[0], EngineEvent::PushOpened { connection });
    assert!(matches!(
        &seen[1],
        EngineEvent::PushEvent { event: TaskEvent::Snapshot(detail), .. } if detail.task_id() == "t1"
    ));
    assert_eq!(
        seen[2],
        EngineEvent::PushEvent {
            connection,
            event: TaskEvent::Log {
                task_id: "t1".to_string(),
                line: "page 1".to_string(),
            },
        }
    );
    assert_eq!(
        seen[3],
        EngineEvent::PushEvent {
            connection,
            event: TaskEvent::Status {
                task_id: "t1".to_string(),
                status: TaskStatus::Success,
                timestamp: "T2".to_string(),
            },
        }
    );
    assert_eq!(
        seen[4],
        EngineEvent::PushClosed {
            connection,
            kind: CloseKind::Normal,
        }
    );
}

#[test]
fn dropped_transport_is_an_abnormal_close() {
    init_logging();
    let server = Runtime::new().expect("runtime");
    let addr = serve_script(
        &server,
        vec![Message::Text(
            r#"{"event":"log","task_id":"t1","line":"only line"}"#.to_string(),
        )],
    );

    let (engine, events) = EngineHandle::with_backends(
        Arc::new(UnusedApi),
        Arc::new(WsConnector::new(ws_settings(addr))),
    );
    engine.open_push(ConnectionId(1), "t1");

    let seen = collect_until_closed(&events);
    assert_eq!(
        seen.last(),
        Some(&EngineEvent::PushClosed {
            connection: ConnectionId(1),
            kind: CloseKind::Abnormal,
        })
    );
}

#[test]
fn refused_connection_reports_abnormal_close_without_open() {
    init_logging();
    // Bind then drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("addr");

    let (engine, events) = EngineHandle::with_backends(
        Arc::new(UnusedApi),
        Arc::new(WsConnector::new(ws_settings(addr))),
    );
    engine.open_push(ConnectionId(3), "t1");

    let seen = collect_until_closed(&events);
    assert_eq!(
        seen,
        vec![EngineEvent::PushClosed {
            connection: ConnectionId(3),
            kind: CloseKind::Abnormal,
        }]
    );
}

/// Stream fed by the test through a channel; records whether it was closed.
struct ScriptedStream {
    frames: tokio::sync::mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl PushStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<Result<PushFrame, PushError>> {
        self.frames.recv().await.map(|text| Ok(PushFrame::Text(text)))
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedConnector {
    pending: Mutex<Option<ScriptedStream>>,
}

#[async_trait::async_trait]
impl PushConnector for ScriptedConnector {
    async fn connect(&self, _task_id: &str) -> Result<Box<dyn PushStream>, PushError> {
        match self.pending.lock().unwrap().take() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(PushError::Connect("no scripted stream left".to_string())),
        }
    }
}

#[test]
fn closing_a_connection_stops_forwarding() {
    init_logging();
    let (frame_tx, frame_rx) = tokio::sync::mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let connector = ScriptedConnector {
        pending: Mutex::new(Some(ScriptedStream {
            frames: frame_rx,
            closed: closed.clone(),
        })),
    };
    let (engine, events) = EngineHandle::with_backends(Arc::new(UnusedApi), Arc::new(connector));
    let connection = ConnectionId(1);
    engine.open_push(connection, "t1");
    assert_eq!(
        events.recv_timeout(WAIT).expect("opened"),
        EngineEvent::PushOpened { connection }
    );

    frame_tx
        .send(r#"{"event":"log","task_id":"t1","line":"before"}"#.to_string())
        .unwrap();
    assert!(matches!(
        events.recv_timeout(WAIT).expect("log"),
        EngineEvent::PushEvent { .. }
    ));

    engine.close_push(connection);
    std::thread::sleep(Duration::from_millis(200));
    let _ = frame_tx.send(r#"{"event":"log","task_id":"t1","line":"after"}"#.to_string());

    assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn cancelled_timer_never_fires() {
    let connector = ScriptedConnector {
        pending: Mutex::new(None),
    };
    let (engine, events) = EngineHandle::with_backends(Arc::new(UnusedApi), Arc::new(connector));
    engine.schedule(TimerId(1), Duration::from_millis(150));
    engine.schedule(TimerId(2), Duration::from_millis(50));
    engine.cancel_timer(TimerId(1));

    assert_eq!(
        events.recv_timeout(WAIT).expect("timer"),
        EngineEvent::TimerFired { timer: TimerId(2) }
    );
    assert!(events.recv_timeout(Duration::from_millis(400)).is_err());
}

#[test]
fn pull_results_are_reported_with_their_task() {
    let connector = ScriptedConnector {
        pending: Mutex::new(None),
    };
    let (engine, events) = EngineHandle::with_backends(Arc::new(UnusedApi), Arc::new(connector));
    engine.fetch_task_detail("t9", true);

    match events.recv_timeout(WAIT).expect("detail result") {
        EngineEvent::TaskDetailFetched { task_id, result } => {
            assert_eq!(task_id, "t9");
            let err = result.unwrap_err();
            assert_eq!(err.kind, FailureKind::HttpStatus(404));
            assert_eq!(err.message, "t9 not found");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn stream_url_switches_scheme_and_carries_session() {
    let connector = WsConnector::new(ApiSettings {
        base_url: "https://parser.example.com/api".to_string(),
        session: Some("abc".to_string()),
        ..ApiSettings::default()
    });
    let url = connector.stream_url("t1").unwrap();
    assert_eq!(url.as_str(), "wss://parser.example.com/api/ws/tasks/t1?session=abc");
}

#[test]
fn close_codes_are_classified() {
    let frame = |code: u16| CloseFrame {
        code: CloseCode::from(code),
        reason: "".into(),
    };
    assert_eq!(classify_close(Some(&frame(1000))), CloseKind::Normal);
    assert_eq!(classify_close(Some(&frame(4403))), CloseKind::Normal);
    assert_eq!(classify_close(Some(&frame(1011))), CloseKind::Abnormal);
    assert_eq!(classify_close(None), CloseKind::Abnormal);
}

#[test]
fn secure_base_url_attempts_a_tls_handshake() {
    init_logging();
    let runtime = Runtime::new().expect("runtime");
    let addr = runtime.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            // Not a TLS server: drop the socket as soon as the client hello arrives.
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });
        addr
    });
    let connector = WsConnector::new(ApiSettings {
        base_url: format!("https://{addr}"),
        ..ApiSettings::default()
    });

    let result = runtime.block_on(connector.connect("t1"));
    match result {
        Err(PushError::Connect(message)) => {
            assert!(
                !message.contains("TLS support not compiled in"),
                "wss must be supported, got: {message}"
            );
        }
        Err(other) => panic!("unexpected error {other:?}"),
        Ok(_) => panic!("handshake against a plain socket should fail"),
    }
}
