use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::runner::{OutputLimit, Runner, DEFAULT_OUTPUT_LIMIT, DEFAULT_RELAX_PERCENT};

const DEFAULT_CONFIG_NAME: &str = "slack-post.toml";
const APP_DIR: &str = "slack-post";

pub const DEFAULT_CHANNEL: &str = "#general";
pub const DEFAULT_ICON: &str = ":robot_face:";
pub const DEFAULT_ICON_ERROR: &str = ":fearful:";

/// Everything the reporter needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
    pub icon_error: String,
    pub text_error: Option<String>,
    pub webhook_url: Option<String>,
    pub shell: Option<PathBuf>,
    pub limits: OutputLimit,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            username: default_username(),
            icon_emoji: DEFAULT_ICON.to_string(),
            icon_error: DEFAULT_ICON_ERROR.to_string(),
            text_error: None,
            webhook_url: None,
            shell: None,
            limits: OutputLimit::default(),
        }
    }
}

/// On-disk layer, every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub channel: Option<String>,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_error: Option<String>,
    pub text_error: Option<String>,
    pub webhook_url: Option<String>,
    pub shell: Option<PathBuf>,
    pub output_limit: Option<usize>,
    pub relax_percent: Option<usize>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub channel: Option<String>,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_error: Option<String>,
    pub text_error: Option<String>,
    pub webhook_url: Option<String>,
}

impl FileConfig {
    /// Load from an explicit path, or search upward from the current dir and
    /// then the user config dir. A missing implicit file is not an error.
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        let path = match path_override {
            Some(p) => p.to_path_buf(),
            None => match find_upwards(DEFAULT_CONFIG_NAME).or_else(user_config_file) {
                Some(p) => p,
                None => {
                    debug!("no config file found, using flags and environment only");
                    return Ok(Self::default());
                }
            },
        };

        debug!(path = %path.display(), "loading config file");
        let contents = fs::read_to_string(&path).map_err(|source| ReportError::ReadInput {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents)
            .map_err(|e| ReportError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

impl Config {
    /// Layer flags/environment over the file over built-in defaults.
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let limits = OutputLimit::new(
            file.output_limit.unwrap_or(DEFAULT_OUTPUT_LIMIT),
            file.relax_percent.unwrap_or(DEFAULT_RELAX_PERCENT),
        );
        if limits.limit == 0 {
            return Err(ReportError::Config(format!(
                "output_limit must be positive (default {DEFAULT_OUTPUT_LIMIT})"
            )));
        }

        let channel = overrides
            .channel
            .or(file.channel)
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
        if channel.trim().is_empty() {
            return Err(ReportError::Config("channel must not be empty".into()));
        }

        Ok(Self {
            channel,
            username: overrides
                .username
                .or(file.username)
                .unwrap_or_else(default_username),
            icon_emoji: overrides
                .icon_emoji
                .or(file.icon_emoji)
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            icon_error: overrides
                .icon_error
                .or(file.icon_error)
                .unwrap_or_else(|| DEFAULT_ICON_ERROR.to_string()),
            text_error: overrides.text_error.or(file.text_error),
            webhook_url: overrides
                .webhook_url
                .or(file.webhook_url)
                .filter(|u| !u.is_empty()),
            shell: file.shell,
            limits,
        })
    }

    pub fn webhook_url(&self) -> Result<&str> {
        self.webhook_url
            .as_deref()
            .ok_or(ReportError::MissingWebhook)
    }

    pub fn runner(&self) -> Runner {
        let runner = Runner::new(self.limits);
        match &self.shell {
            Some(shell) => runner.with_shell(shell),
            None => runner,
        }
    }
}

/// `user@hostname`, or just the user when the hostname is unknown.
pub fn default_username() -> String {
    let user = ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "slack-post".to_string());
    match sysinfo::System::host_name().filter(|h| !h.is_empty()) {
        Some(host) => format!("{user}@{host}"),
        None => user,
    }
}

fn user_config_file() -> Option<PathBuf> {
    let candidate = dirs::config_dir()?.join(APP_DIR).join("config.toml");
    candidate.exists().then_some(candidate)
}

fn find_upwards(file_name: &str) -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_config_success() {
        let toml = r#"channel = "deploys"
webhook_url = "https://hooks.example/T000/B000"
output_limit = 2048
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let file_cfg = FileConfig::load(Some(file.path())).unwrap();
        let cfg = Config::resolve(Overrides::default(), file_cfg).unwrap();
        assert_eq!(cfg.channel, "deploys");
        assert_eq!(cfg.webhook_url().unwrap(), "https://hooks.example/T000/B000");
        assert_eq!(cfg.limits, OutputLimit::new(2048, DEFAULT_RELAX_PERCENT));
        assert_eq!(cfg.icon_emoji, DEFAULT_ICON);
    }

    #[test]
    fn overrides_win_over_file() {
        let file_cfg = FileConfig::parse(
            r#"channel = "from-file"
icon_emoji = ":file:"
"#,
        )
        .unwrap();
        let overrides = Overrides {
            channel: Some("@me".into()),
            ..Overrides::default()
        };
        let cfg = Config::resolve(overrides, file_cfg).unwrap();
        assert_eq!(cfg.channel, "@me");
        assert_eq!(cfg.icon_emoji, ":file:");
    }

    #[test]
    fn missing_webhook_errors() {
        let cfg = Config::resolve(Overrides::default(), FileConfig::default()).unwrap();
        assert_matches!(cfg.webhook_url(), Err(ReportError::MissingWebhook));
    }

    #[test]
    fn empty_channel_is_rejected() {
        let overrides = Overrides {
            channel: Some("  ".into()),
            ..Overrides::default()
        };
        let result = Config::resolve(overrides, FileConfig::default());
        assert_matches!(result, Err(ReportError::Config(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"chanel = \"typo\"\n").unwrap();
        let result = FileConfig::load(Some(file.path()));
        assert_matches!(result, Err(ReportError::Config(_)));
    }

    #[test]
    fn missing_explicit_file_errors() {
        let result = FileConfig::load(Some(Path::new("/nonexistent/slack-post.toml")));
        assert_matches!(result, Err(ReportError::ReadInput { .. }));
    }

    #[test]
    fn custom_shell_reaches_runner() {
        let file_cfg = FileConfig::parse("shell = \"/bin/bash\"\n").unwrap();
        let cfg = Config::resolve(Overrides::default(), file_cfg).unwrap();
        assert_eq!(cfg.runner().shell(), Path::new("/bin/bash"));
    }
}
