use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ReportError, Result};

/// Bytes kept verbatim from each stream before truncation kicks in.
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024;
/// Extra room, in percent of the limit, tolerated before truncating.
pub const DEFAULT_RELAX_PERCENT: usize = 10;

const READ_CHUNK: usize = 8 * 1024;

/// Exit code reported when the child was terminated by a signal.
const NO_EXIT_CODE: i32 = -1;

#[cfg(windows)]
const DEFAULT_SHELL: &str = "cmd";
#[cfg(windows)]
const SHELL_FLAG: &str = "/C";
#[cfg(not(windows))]
const DEFAULT_SHELL: &str = "sh";
#[cfg(not(windows))]
const SHELL_FLAG: &str = "-c";

/// Truncation policy applied to captured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimit {
    pub limit: usize,
    pub relax_percent: usize,
}

impl Default for OutputLimit {
    fn default() -> Self {
        Self {
            limit: DEFAULT_OUTPUT_LIMIT,
            relax_percent: DEFAULT_RELAX_PERCENT,
        }
    }
}

impl OutputLimit {
    pub fn new(limit: usize, relax_percent: usize) -> Self {
        Self {
            limit,
            relax_percent,
        }
    }

    /// Largest size returned untouched: `limit * (1 + relax)`, rounded down.
    /// Saturates at `usize::MAX` for absurd settings.
    pub fn ceiling(&self) -> usize {
        let extra = self.limit.saturating_mul(self.relax_percent) / 100;
        self.limit.saturating_add(extra)
    }
}

/// Outcome of one wrapped command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands through the platform shell.
#[derive(Debug, Clone)]
pub struct Runner {
    shell: PathBuf,
    limits: OutputLimit,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(OutputLimit::default())
    }
}

impl Runner {
    pub fn new(limits: OutputLimit) -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            limits,
        }
    }

    /// Use a different shell binary. It is still invoked as `<shell> -c <command>`.
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    /// Execute `command` and wait for it to finish.
    ///
    /// A non-zero exit is returned as a normal [`Invocation`]. Only failing to
    /// spawn or wait on the shell is an error. There is no timeout: a command
    /// that never exits blocks the caller forever.
    #[tracing::instrument(name = "execute", skip(self), fields(shell = %self.shell.display()))]
    pub async fn execute(&self, command: &str) -> Result<Invocation> {
        let spawn_err = |source| ReportError::Spawn {
            command: command.to_string(),
            source,
        };

        let start = Instant::now();
        let mut child = Command::new(&self.shell)
            .arg(SHELL_FLAG)
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let keep = self.limits.ceiling();

        // Both pipes are drained together so a chatty stderr cannot stall the child.
        let (out, err) = tokio::join!(read_bounded(stdout, keep), read_bounded(stderr, keep));
        let status = child.wait().await.map_err(spawn_err)?;
        let elapsed = start.elapsed();
        let (out, err) = (out.map_err(spawn_err)?, err.map_err(spawn_err)?);

        let exit_code = status.code().unwrap_or(NO_EXIT_CODE);
        info!(exit_code, elapsed_ms = elapsed.as_millis() as u64, "command finished");
        debug!(
            stdout_bytes = out.total,
            stderr_bytes = err.total,
            "captured output"
        );

        Ok(Invocation {
            exit_code,
            stdout: render(&out.kept, out.total, self.limits),
            stderr: render(&err.kept, err.total, self.limits),
            elapsed,
        })
    }
}

struct Captured {
    kept: Vec<u8>,
    total: usize,
}

/// Drain `reader` to the end, keeping at most `keep` bytes.
async fn read_bounded<R>(reader: Option<R>, keep: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured {
        kept: Vec::new(),
        total: 0,
    };
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        captured.total += n;
        let room = keep.saturating_sub(captured.kept.len());
        captured.kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(captured)
}

/// Apply the truncation policy to a fully captured buffer.
///
/// Within the ceiling the content comes back verbatim. Past it, exactly
/// `limit` bytes are kept followed by a `[...N bytes truncated]` marker on its
/// own line. Invalid UTF-8, including a sequence cut by the window, is
/// replaced rather than rejected.
pub fn truncate(buffer: &[u8], limits: OutputLimit) -> String {
    render(buffer, buffer.len(), limits)
}

fn render(kept: &[u8], total: usize, limits: OutputLimit) -> String {
    if total <= limits.ceiling() {
        return String::from_utf8_lossy(kept).into_owned();
    }
    let head = &kept[..limits.limit.min(kept.len())];
    format!(
        "{}\n[...{} bytes truncated]",
        String::from_utf8_lossy(head),
        total - head.len()
    )
}

/// Render a duration as `H:MM:SS[.ffffff]`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    let micros = elapsed.subsec_micros();
    if micros == 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}.{micros:06}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ceiling_rounds_down() {
        assert_eq!(OutputLimit::default().ceiling(), 1126);
        assert_eq!(OutputLimit::new(10, 0).ceiling(), 10);
    }

    #[test]
    fn huge_limits_do_not_overflow() {
        let limits = OutputLimit::new(usize::MAX / 4, 10);
        assert!(limits.ceiling() >= limits.limit);
        assert_eq!(OutputLimit::new(usize::MAX, 500).ceiling(), usize::MAX);
    }

    #[test]
    fn short_buffer_is_returned_verbatim() {
        let out = truncate(b"hello", OutputLimit::default());
        assert_eq!(out, "hello");
    }

    #[test]
    fn buffer_at_ceiling_is_not_truncated() {
        let buf = vec![b'a'; 1126];
        let out = truncate(&buf, OutputLimit::default());
        assert_eq!(out.len(), 1126);
        assert!(!out.contains("truncated"));
    }

    #[test]
    fn long_buffer_keeps_limit_and_counts_the_rest() {
        let buf = vec![b'x'; 2000];
        let out = truncate(&buf, OutputLimit::default());
        let (head, marker) = out.split_once('\n').unwrap();
        assert_eq!(head.len(), 1024);
        assert_eq!(marker, "[...976 bytes truncated]");
    }

    #[test]
    fn one_past_ceiling_truncates() {
        let buf = vec![b'x'; 1127];
        let out = truncate(&buf, OutputLimit::default());
        assert!(out.ends_with("[...103 bytes truncated]"));
    }

    #[test]
    fn split_multibyte_sequence_does_not_panic() {
        // 'é' is two bytes; an odd limit cuts one in half.
        let buf = "é".repeat(20).into_bytes();
        let out = truncate(&buf, OutputLimit::new(5, 0));
        assert!(out.starts_with("éé"));
        assert!(out.ends_with("[...35 bytes truncated]"));
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "0:00:01.500000");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1:02:03");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn true_has_no_output() {
        let inv = Runner::default().execute("true").await.unwrap();
        assert_eq!(inv.exit_code, 0);
        assert!(inv.success());
        assert_eq!(inv.stdout, "");
        assert_eq!(inv.stderr, "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_code_is_reported_not_raised() {
        let inv = Runner::default().execute("echo oops >&2; exit 3").await.unwrap();
        assert_eq!(inv.exit_code, 3);
        assert!(!inv.success());
        assert_eq!(inv.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_output_is_bounded() {
        let inv = Runner::default()
            .execute("head -c 2000 /dev/zero | tr '\\0' 'a'")
            .await
            .unwrap();
        assert!(inv.stdout.starts_with(&"a".repeat(1024)));
        assert!(inv.stdout.ends_with("\n[...976 bytes truncated]"));
    }

    #[tokio::test]
    async fn missing_shell_is_a_spawn_error() {
        let err = Runner::default()
            .with_shell("/nonexistent/shell-for-tests")
            .execute("true")
            .await
            .unwrap_err();
        assert_matches!(err, ReportError::Spawn { ref command, .. } if command == "true");
    }
}
