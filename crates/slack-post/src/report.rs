use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::payload::{self, escape, Executed, Message, Payload};
use crate::runner::Invocation;
use crate::sink::Sink;

/// Posted when there is nothing else to say and `fortune` is unavailable.
pub const FALLBACK_TEXT: &str = "I love cats!";

const STDIN_MARKER: &str = "-";

/// One run of the tool as requested on the command line.
#[derive(Debug, Default, Clone)]
pub struct Request {
    pub text: Option<String>,
    /// File whose content is posted; `-` reads stdin.
    pub file: Option<PathBuf>,
    pub exit_status: Option<i32>,
    /// Wrapped command, joined with spaces and handed to the shell.
    pub command: Vec<String>,
}

impl Request {
    pub fn command_line(&self) -> Option<String> {
        (!self.command.is_empty()).then(|| self.command.join(" "))
    }
}

#[derive(Debug)]
pub struct Report {
    pub payload: Payload,
    /// Exit code of the wrapped command, if one ran.
    pub command_exit: Option<i32>,
}

/// Run the wrapped command (if any) and build the message, without sending it.
pub async fn prepare(config: &Config, request: &Request) -> Result<Report> {
    let file_content = match &request.file {
        Some(path) => Some(read_input(path).await?),
        None => None,
    };
    let message = Message {
        text: request.text.clone(),
        file_content,
        exit_status: request.exit_status,
    };

    let command = request.command_line();
    let invocation: Option<Invocation> = match &command {
        Some(cmd) => Some(config.runner().execute(cmd).await?),
        None => None,
    };
    let executed = command
        .as_deref()
        .zip(invocation.as_ref())
        .map(|(command, result)| Executed { command, result });

    let fallback = if executed.is_none() && message.is_blank() {
        Some(random_text().await)
    } else {
        None
    };

    let payload = payload::build(config, &message, executed, || {
        fallback.unwrap_or_else(|| FALLBACK_TEXT.to_string())
    });

    Ok(Report {
        payload,
        command_exit: invocation.map(|i| i.exit_code),
    })
}

/// Prepare the message and hand it to `sink`.
///
/// A failing wrapped command still produces a message; it is the caller's
/// choice whether [`Report::command_exit`] affects the process exit status.
#[tracing::instrument(name = "report", skip_all, fields(command = ?request.command_line()))]
pub async fn run(config: &Config, request: &Request, sink: &dyn Sink) -> Result<Report> {
    let report = prepare(config, request).await?;
    sink.deliver(&report.payload).await?;
    Ok(report)
}

async fn read_input(path: &Path) -> Result<String> {
    let read_err = |source| ReportError::ReadInput {
        path: path.to_path_buf(),
        source,
    };
    if path == Path::new(STDIN_MARKER) {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .map_err(read_err)?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(path).await.map_err(read_err)
    }
}

/// A line from `fortune`, or [`FALLBACK_TEXT`] when it is missing or fails.
async fn random_text() -> String {
    let Ok(bin) = which::which("fortune") else {
        debug!("fortune not on PATH");
        return FALLBACK_TEXT.to_string();
    };
    match Command::new(&bin).output().await {
        Ok(out) if out.status.success() => escape(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            warn!(status = ?out.status, "fortune failed");
            FALLBACK_TEXT.to_string()
        }
        Err(e) => {
            warn!(error = %e, "fortune could not be spawned");
            FALLBACK_TEXT.to_string()
        }
    }
}
