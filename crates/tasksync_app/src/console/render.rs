use tasksync_core::{ConnectionStatus, StateChange, SyncView, TaskDetail, TaskRowView};

const DETAIL_LOG_TAIL: usize = 10;

/// Lines to print for one batch of state changes. Each affected section is
/// printed once, however many times it changed.
pub fn render_changes(view: &SyncView, changes: &[StateChange]) -> Vec<String> {
    let selected = view.selected.as_deref();
    let mut summaries = false;
    let mut detail = false;
    let mut selection = false;
    let mut connection = false;
    let mut notices = false;
    let mut log_lines = 0usize;

    for change in changes {
        match change {
            StateChange::Summaries => summaries = true,
            StateChange::Detail(task_id) => detail |= Some(task_id.as_str()) == selected,
            StateChange::Log(task_id) if Some(task_id.as_str()) == selected => log_lines += 1,
            StateChange::Log(_) => {}
            StateChange::Selection => selection = true,
            StateChange::Connection => connection = true,
            StateChange::Notices => notices = true,
        }
    }

    let mut lines = Vec::new();
    if selection {
        lines.push(match selected {
            Some(task_id) => format!("selected {task_id}"),
            None => "selection cleared".to_string(),
        });
    }
    if summaries {
        lines.extend(task_table(&view.tasks));
    }
    if detail {
        if let Some(current) = &view.detail {
            lines.extend(detail_block(current));
        }
    } else if log_lines > 0 {
        if let Some(current) = &view.detail {
            let skip = current.logs.len().saturating_sub(log_lines);
            lines.extend(current.logs[skip..].iter().map(|line| format!("  | {line}")));
        }
    }
    if connection {
        lines.push(connection_line(view));
    }
    if notices {
        lines.extend(notice_lines(view));
    }
    lines
}

/// Full dump of the view for the `show` command.
pub fn render_view(view: &SyncView) -> Vec<String> {
    let mut lines = task_table(&view.tasks);
    match &view.detail {
        Some(detail) => lines.extend(detail_block(detail)),
        None => lines.push("no task selected".to_string()),
    }
    lines.push(connection_line(view));
    lines.extend(notice_lines(view));
    lines
}

fn task_table(rows: &[TaskRowView]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["no tasks".to_string()];
    }
    let mut lines = vec![format!(
        "  {:<36} {:<8} {:<10} {:<6} {}",
        "task", "status", "backend", "method", "updated"
    )];
    for row in rows {
        let marker = if row.selected { '>' } else { ' ' };
        let mut line = format!(
            "{marker} {:<36} {:<8} {:<10} {:<6} {}",
            row.task_id,
            row.status.as_str(),
            row.backend,
            row.parse_method,
            row.updated_at
        );
        if let Some(error) = &row.error {
            line.push_str(&format!("  ({error})"));
        }
        lines.push(line);
    }
    lines
}

fn detail_block(detail: &TaskDetail) -> Vec<String> {
    let summary = &detail.summary;
    let mut lines = vec![format!(
        "task {} [{}] backend={} method={} updated={}",
        summary.task_id,
        summary.status.as_str(),
        summary.backend,
        summary.parse_method,
        summary.updated_at
    )];
    if let Some(error) = &summary.error {
        lines.push(format!("  error: {error}"));
    }
    for document in &detail.documents {
        let ready = document.files.iter().filter(|file| file.exists).count();
        lines.push(format!(
            "  document {} ({}/{} artifacts ready)",
            document.name,
            ready,
            document.files.len()
        ));
        if let Some(markdown) = &document.markdown {
            lines.push(format!("    markdown: {} chars", markdown.chars().count()));
        }
    }
    let skip = detail.logs.len().saturating_sub(DETAIL_LOG_TAIL);
    if skip > 0 {
        lines.push(format!("  ... {skip} earlier log lines"));
    }
    lines.extend(detail.logs[skip..].iter().map(|line| format!("  | {line}")));
    lines
}

fn connection_line(view: &SyncView) -> String {
    let label = match view.connection {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Reconnecting => "reconnecting",
    };
    if view.connection == ConnectionStatus::Reconnecting {
        format!("live: {label} (attempt {})", view.reconnect_attempt)
    } else {
        format!("live: {label}")
    }
}

fn notice_lines(view: &SyncView) -> Vec<String> {
    view.notices
        .iter()
        .map(|notice| match &notice.task_id {
            Some(task_id) => format!("! [{}] {task_id}: {}", notice.id.0, notice.message),
            None => format!("! [{}] {}", notice.id.0, notice.message),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::{Notice, NoticeId, TaskStatus, TaskSummary};

    fn row(task_id: &str, selected: bool) -> TaskRowView {
        TaskRowView {
            task_id: task_id.to_string(),
            status: TaskStatus::Running,
            backend: "pipeline".to_string(),
            parse_method: "auto".to_string(),
            updated_at: "2024-05-01T10:00:00Z".to_string(),
            error: None,
            selected,
        }
    }

    fn detail_with_logs(task_id: &str, logs: &[&str]) -> TaskDetail {
        TaskDetail {
            summary: TaskSummary::observed(task_id, TaskStatus::Running, "2024-05-01T10:00:00Z"),
            params: Default::default(),
            documents: Vec::new(),
            logs: logs.iter().map(|line| line.to_string()).collect(),
        }
    }

    #[test]
    fn new_log_lines_for_selected_task_are_tailed() {
        let view = SyncView {
            selected: Some("t1".to_string()),
            detail: Some(detail_with_logs("t1", &["a", "b", "c"])),
            ..SyncView::default()
        };
        let lines = render_changes(
            &view,
            &[
                StateChange::Log("t1".to_string()),
                StateChange::Log("t1".to_string()),
                StateChange::Log("other".to_string()),
            ],
        );
        assert_eq!(lines, vec!["  | b".to_string(), "  | c".to_string()]);
    }

    #[test]
    fn detail_change_wins_over_log_tail() {
        let view = SyncView {
            selected: Some("t1".to_string()),
            detail: Some(detail_with_logs("t1", &["only"])),
            ..SyncView::default()
        };
        let lines = render_changes(
            &view,
            &[
                StateChange::Detail("t1".to_string()),
                StateChange::Log("t1".to_string()),
            ],
        );
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("task t1 [running]"));
        assert_eq!(lines[1], "  | only");
    }

    #[test]
    fn table_marks_selected_row_and_notices_show_ids() {
        let view = SyncView {
            tasks: vec![row("t1", false), row("t2", true)],
            selected: Some("t2".to_string()),
            connection: ConnectionStatus::Reconnecting,
            reconnect_attempt: 2,
            notices: vec![Notice {
                id: NoticeId(4),
                task_id: Some("t2".to_string()),
                message: "boom".to_string(),
            }],
            ..SyncView::default()
        };
        let lines = render_changes(
            &view,
            &[
                StateChange::Summaries,
                StateChange::Connection,
                StateChange::Notices,
            ],
        );
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("  t1"));
        assert!(lines[2].starts_with("> t2"));
        assert_eq!(lines[3], "live: reconnecting (attempt 2)");
        assert_eq!(lines[4], "! [4] t2: boom");
    }

    #[test]
    fn full_view_without_selection() {
        let lines = render_view(&SyncView::default());
        assert_eq!(
            lines,
            vec![
                "no tasks".to_string(),
                "no task selected".to_string(),
                "live: disconnected".to_string(),
            ]
        );
    }
}
