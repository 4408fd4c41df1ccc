//! Slack incoming-webhook message format.
//!
//! Everything derived from user input or command output goes through
//! [`escape`] before it lands in a field Slack renders as markup.

use serde::Serialize;

use crate::config::Config;
use crate::runner::{format_elapsed, Invocation};

pub const NO_OUTPUT: &str = "_no output_";

const COLOR_GOOD: &str = "good";
const COLOR_DANGER: &str = "danger";

/// Escape the three characters Slack treats as control sequences.
///
/// Not idempotent: escaping `&amp;` again yields `&amp;amp;`.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub channel: String,
    pub username: String,
    pub text: String,
    pub icon_emoji: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub fallback: String,
    pub mrkdwn_in: Vec<String>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(i64),
}

impl Field {
    fn short(title: &str, value: FieldValue) -> Self {
        Self {
            title: title.to_string(),
            value,
            short: Some(true),
        }
    }

    fn long(title: &str, value: FieldValue) -> Self {
        Self {
            title: title.to_string(),
            value,
            short: None,
        }
    }
}

impl Attachment {
    pub fn is_success(&self) -> bool {
        self.color == COLOR_GOOD
    }
}

fn code_block(output: &str) -> String {
    if output.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        escape(&format!("```{output}```"))
    }
}

/// Describe a finished command as an attachment.
///
/// Success shows stdout under a `good` color. Failure shows the exit code and
/// stderr under `danger`.
pub fn format_attachment(result: &Invocation, command: &str) -> Attachment {
    let mut fields = vec![
        Field::short("command", FieldValue::Text(escape(&format!("`{command}`")))),
        Field::short(
            "execution time",
            FieldValue::Text(format_elapsed(result.elapsed)),
        ),
    ];

    let (color, fallback) = if result.success() {
        fields.push(Field::long("stdout", FieldValue::Text(code_block(&result.stdout))));
        (COLOR_GOOD, escape(&format!("Succeeded to execute: {command}")))
    } else {
        fields.push(Field::short(
            "exit code",
            FieldValue::Number(i64::from(result.exit_code)),
        ));
        fields.push(Field::long("stderr", FieldValue::Text(code_block(&result.stderr))));
        (
            COLOR_DANGER,
            escape(&format!(
                "[exit code: {}] Failed to execute: {command}",
                result.exit_code
            )),
        )
    };

    Attachment {
        color: color.to_string(),
        fallback,
        mrkdwn_in: ["pretext", "text", "fields"].map(String::from).to_vec(),
        fields,
    }
}

/// Inputs to a single message besides the resolved [`Config`].
#[derive(Debug, Default, Clone)]
pub struct Message {
    pub text: Option<String>,
    /// Content of the `-f` file or stdin, posted as a code block.
    pub file_content: Option<String>,
    /// Exit status reported by the caller when no command is wrapped.
    pub exit_status: Option<i32>,
}

impl Message {
    fn failed(&self) -> bool {
        matches!(self.exit_status, Some(code) if code != 0)
    }

    /// True when neither text, file content nor a failure status gives the
    /// message a body of its own.
    pub fn is_blank(&self) -> bool {
        let empty = |s: &Option<String>| s.as_deref().map_or(true, str::is_empty);
        empty(&self.text) && empty(&self.file_content) && !self.failed()
    }
}

/// A command that was run, along with the text that was handed to the shell.
#[derive(Debug, Clone)]
pub struct Executed<'a> {
    pub command: &'a str,
    pub result: &'a Invocation,
}

/// Assemble the final payload.
///
/// `fallback_text` is used only when there is nothing else to say: no text,
/// no file and no command.
pub fn build(
    config: &Config,
    message: &Message,
    executed: Option<Executed<'_>>,
    fallback_text: impl FnOnce() -> String,
) -> Payload {
    let mut icon = config.icon_emoji.clone();
    let mut text = message.text.clone().filter(|t| !t.is_empty());

    if executed.is_none() && message.failed() {
        let failure = config
            .text_error
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| match text.as_deref() {
                Some(t) => format!("FAILURE: {t}"),
                None => "FAILURE".to_string(),
            });
        text = Some(failure);
        icon = config.icon_error.clone();
    }

    let mut parts: Vec<String> = text.into_iter().collect();
    if let Some(content) = message.file_content.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("```{content}```"));
    }

    let text = if parts.is_empty() && executed.is_none() {
        fallback_text()
    } else {
        escape(&parts.join("\n"))
    };

    Payload {
        channel: normalize_channel(&config.channel),
        username: config.username.clone(),
        text,
        icon_emoji: icon,
        attachments: executed.map(|e| vec![format_attachment(e.result, e.command)]),
    }
}

/// Prefix bare channel names with `#`; `#chan` and `@user` pass through.
pub fn normalize_channel(channel: &str) -> String {
    if channel.starts_with('#') || channel.starts_with('@') {
        channel.to_string()
    } else {
        format!("#{channel}")
    }
}
