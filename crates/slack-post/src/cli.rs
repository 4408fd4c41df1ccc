use clap::Parser;
use std::path::PathBuf;

use crate::config::Overrides;
use crate::report::Request;

/// slack-post – post a message, or the outcome of a command, to Slack
///
/// Handy in crontabs and build scripts: wrap a command and its exit code,
/// run time, stdout or stderr end up in the channel.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Activate verbose output (-v, -vv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Sets a custom config file
    #[arg(long, value_name = "FILE", env = "SLACK_POST_CONFIG")]
    pub config: Option<PathBuf>,

    /// A #channel, or a direct message to a @username [default: #general]
    #[arg(short, long, env = "SLACK_CHANNEL")]
    pub channel: Option<String>,

    /// The name of your bot [default: user@hostname]
    #[arg(short, long, env = "SLACK_USERNAME")]
    pub username: Option<String>,

    /// The icon of your bot [default: :robot_face:]
    #[arg(short, long, env = "SLACK_ICON")]
    pub icon_emoji: Option<String>,

    /// Icon used when --exit-status is non-zero [default: :fearful:]
    #[arg(long, env = "SLACK_ICON_ERROR")]
    pub icon_error: Option<String>,

    /// The message to send
    #[arg(short, long, env = "SLACK_TEXT")]
    pub text: Option<String>,

    /// Message used when --exit-status is non-zero [default: "FAILURE: <text>"]
    #[arg(long, env = "SLACK_TEXT_ERROR")]
    pub text_error: Option<String>,

    /// The URL to post the message to
    #[arg(short, long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Post the content of a text file. Use - for stdin.
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Exit status of a previous step (e.g. `$?`); non-zero posts a failure
    #[arg(long, allow_hyphen_values = true)]
    pub exit_status: Option<i32>,

    /// Exit with the wrapped command's exit code instead of 0
    #[arg(long)]
    pub propagate_exit: bool,

    /// Print the JSON payload instead of posting it
    #[arg(long)]
    pub dry_run: bool,

    /// The command to execute
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            channel: self.channel.clone(),
            username: self.username.clone(),
            icon_emoji: self.icon_emoji.clone(),
            icon_error: self.icon_error.clone(),
            text_error: self.text_error.clone(),
            webhook_url: self.webhook_url.clone(),
        }
    }

    pub fn request(&self) -> Request {
        Request {
            text: self.text.clone(),
            file: self.file.clone(),
            exit_status: self.exit_status,
            command: self.command.clone(),
        }
    }
}
