//! Console input lines, parsed with clap as if each line were its own
//! command invocation.

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use tasksync_core::{Msg, NoticeId, SubmitRequest};

#[derive(Debug, Parser)]
#[command(name = "tasksync", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Commands accepted at the tasksync prompt")]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Debug, Subcommand)]
enum ConsoleCommand {
    /// Fetch the task list
    #[command(visible_alias = "refresh")]
    List,
    /// Follow a task live
    Select { task_id: String },
    /// Stop following the selected task
    Clear,
    /// Print the whole view
    Show,
    /// Rerun a finished task
    Retry { task_id: String },
    /// Upload files for parsing
    Submit(SubmitArgs),
    /// Drop an error notice
    Dismiss { notice: u64 },
    /// Leave the console
    #[command(visible_alias = "exit")]
    Quit,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    /// Files to upload
    files: Vec<PathBuf>,
    /// OCR language code
    #[arg(long)]
    lang: Option<String>,
    /// Backend name, e.g. pipeline or vlm-transformers
    #[arg(long)]
    backend: Option<String>,
    #[arg(long, value_parser = ["auto", "txt", "ocr"])]
    method: Option<String>,
    /// Page range to parse, zero based
    #[arg(long, value_name = "START-END", value_parser = page_range)]
    pages: Option<(u32, u32)>,
    #[arg(long)]
    no_formula: bool,
    #[arg(long)]
    no_table: bool,
    /// Ask the backend to keep extracted images
    #[arg(long)]
    images: bool,
}

impl SubmitArgs {
    fn into_request(self) -> SubmitRequest {
        let mut request = SubmitRequest {
            files: self.files,
            formula_enable: !self.no_formula,
            table_enable: !self.no_table,
            return_images: self.images,
            ..SubmitRequest::default()
        };
        if let Some(lang) = self.lang {
            request.language = lang;
        }
        if let Some(backend) = self.backend {
            request.backend = backend;
        }
        if let Some(method) = self.method {
            request.parse_method = method;
        }
        if let Some((start, end)) = self.pages {
            request.start_page_id = start;
            request.end_page_id = end;
        }
        request
    }
}

fn page_range(value: &str) -> Result<(u32, u32), String> {
    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| format!("expected <start>-<end>, got {value:?}"))?;
    let start: u32 = start.trim().parse().map_err(|_| "invalid start page")?;
    let end: u32 = end.trim().parse().map_err(|_| "invalid end page")?;
    if end < start {
        return Err(format!("end page {end} is before start page {start}"));
    }
    Ok((start, end))
}

/// What the loop does with one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Dispatch(Msg),
    Show,
    Quit,
}

/// Blank lines yield `Ok(None)`. `help` and `--help` come back as a clap
/// error of kind `DisplayHelp`, whose rendering is the help text.
pub fn parse(line: &str) -> Result<Option<Command>, clap::Error> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let parsed = ConsoleLine::try_parse_from(line.split_whitespace())?;
    let command = match parsed.command {
        ConsoleCommand::List => Command::Dispatch(Msg::RefreshRequested),
        ConsoleCommand::Select { task_id } => Command::Dispatch(Msg::TaskSelected { task_id }),
        ConsoleCommand::Clear => Command::Dispatch(Msg::SelectionCleared),
        ConsoleCommand::Show => Command::Show,
        ConsoleCommand::Retry { task_id } => Command::Dispatch(Msg::RetryRequested { task_id }),
        ConsoleCommand::Submit(args) => Command::Dispatch(Msg::SubmitRequested(args.into_request())),
        ConsoleCommand::Dismiss { notice } => Command::Dispatch(Msg::NoticeDismissed {
            notice: NoticeId(notice),
        }),
        ConsoleCommand::Quit => Command::Quit,
    };
    Ok(Some(command))
}

pub fn help() -> String {
    ConsoleLine::command().render_help().to_string()
}
