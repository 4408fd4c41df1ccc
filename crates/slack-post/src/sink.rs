use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ReportError, Result};
use crate::payload::Payload;

/// Where a finished payload goes.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, payload: &Payload) -> Result<()>;
}

/// Posts to a Slack incoming webhook. One attempt, no retry.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    #[tracing::instrument(name = "deliver", skip_all, fields(channel = %payload.channel))]
    async fn deliver(&self, payload: &Payload) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|source| ReportError::Delivery { source })?
            .error_for_status()
            .map_err(|source| ReportError::Delivery { source })?;
        info!(status = resp.status().as_u16(), "message posted");
        Ok(())
    }
}

/// Prints the JSON body instead of sending it.
#[derive(Default)]
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn deliver(&self, payload: &Payload) -> Result<()> {
        debug!("dry run, not posting");
        println!("{}", serde_json::to_string_pretty(payload)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> Payload {
        Payload {
            channel: "#ops".into(),
            username: "cron@box".into(),
            text: "test message".into(),
            icon_emoji: ":robot_face:".into(),
            attachments: None,
        }
    }

    #[tokio::test]
    async fn posts_json_body() {
        let mock_server = MockServer::start().await;

        let expected = serde_json::json!({
            "channel": "#ops",
            "username": "cron@box",
            "text": "test message",
            "icon_emoji": ":robot_face:"
        });

        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .and(body_json(expected))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = WebhookSink::new(mock_server.uri());
        sink.deliver(&payload()).await.unwrap();
    }

    #[tokio::test]
    async fn error_status_is_a_delivery_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let sink = WebhookSink::new(mock_server.uri());
        let result = sink.deliver(&payload()).await;
        assert_matches!(result, Err(ReportError::Delivery { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_delivery_failure() {
        let sink = WebhookSink::new("http://127.0.0.1:9/hook");
        let result = sink.deliver(&payload()).await;
        assert_matches!(result, Err(ReportError::Delivery { .. }));
    }
}
