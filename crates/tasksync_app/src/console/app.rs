use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use tasksync_core::{Msg, StateChange, SyncSession, SyncState};
use tasksync_engine::{EngineEvent, EngineHandle};
use tasksync_logging::{sync_info, sync_warn};

use super::commands::{self, Command};
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::render;

enum Inbox {
    Engine(EngineEvent),
    Line(String),
    InputClosed,
}

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    sync_info!("Starting tasksync against {}", config.base_url);
    let (engine, engine_events) =
        EngineHandle::new(config.api_settings()).context("starting engine")?;

    let (inbox_tx, inbox_rx) = mpsc::channel::<Inbox>();
    spawn_engine_forwarder(engine_events, inbox_tx.clone());
    spawn_stdin_reader(inbox_tx);

    let mut session = SyncSession::new(SyncState::with_settings(
        config.reconnect_policy(),
        config.notice_ttl(),
    ));
    let (change_tx, change_rx) = mpsc::channel::<StateChange>();
    session.subscribe(move |change| {
        let _ = change_tx.send(change.clone());
    });

    let mut runner = EffectRunner::new(engine);
    let mut out = io::stdout();
    print_lines(&mut out, commands::help().lines().map(str::to_string))?;

    let effects = session.handle(Msg::RefreshRequested);
    runner.enqueue(effects);

    for inbox in inbox_rx {
        let msg = match inbox {
            Inbox::Engine(event) => runner.translate(event),
            Inbox::Line(line) => match commands::parse(&line) {
                Ok(Some(Command::Dispatch(msg))) => Some(msg),
                Ok(Some(Command::Show)) => {
                    print_lines(&mut out, render::render_view(&session.view()))?;
                    None
                }
                Ok(Some(Command::Quit)) => break,
                Ok(None) => None,
                // Also covers `help`, which clap reports as an error.
                Err(err) => {
                    print_lines(&mut out, err.render().to_string().lines().map(str::to_string))?;
                    None
                }
            },
            Inbox::InputClosed => break,
        };

        let Some(msg) = msg else {
            continue;
        };
        let effects = session.handle(msg);
        runner.enqueue(effects);

        let changes: Vec<StateChange> = change_rx.try_iter().collect();
        if !changes.is_empty() {
            print_lines(&mut out, render::render_changes(&session.view(), &changes))?;
        }
    }

    let effects = session.clear_selection();
    runner.enqueue(effects);
    sync_info!("Console loop finished");
    Ok(())
}

fn spawn_engine_forwarder(events: mpsc::Receiver<EngineEvent>, inbox: mpsc::Sender<Inbox>) {
    thread::spawn(move || {
        for event in events {
            if inbox.send(Inbox::Engine(event)).is_err() {
                break;
            }
        }
    });
}

fn spawn_stdin_reader(inbox: mpsc::Sender<Inbox>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if inbox.send(Inbox::Line(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    sync_warn!("Reading stdin failed: {}", err);
                    break;
                }
            }
        }
        let _ = inbox.send(Inbox::InputClosed);
    });
}

fn print_lines(
    out: &mut impl Write,
    lines: impl IntoIterator<Item = String>,
) -> anyhow::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
