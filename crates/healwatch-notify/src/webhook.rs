//! Incoming-webhook delivery in the Slack "attachments" shape.

use std::time::Duration;

use chrono::DateTime;
use serde_json::{json, Value};
use tracing::debug;

use crate::alert::{presentation, Alert};
use crate::notifier::{Notifier, NotifyError, NotifyFuture};

/// Posts each alert as JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Build a notifier whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("healwatch/0.1")
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send<'a>(&'a self, alert: &'a Alert) -> NotifyFuture<'a> {
        Box::pin(async move {
            let resp = self
                .client
                .post(&self.url)
                .json(&payload(alert))
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        NotifyError::Timeout
                    } else {
                        NotifyError::Transport(e.to_string())
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(NotifyError::Status(status.as_u16()));
            }
            debug!(service = %alert.service, kind = %alert.kind, "alert delivered");
            Ok(())
        })
    }
}

/// JSON body for one alert.
pub fn payload(alert: &Alert) -> Value {
    let p = presentation(alert.kind);
    json!({
        "attachments": [{
            "color": p.color,
            "title": alert.title(),
            "text": alert.detail,
            "fields": [{
                "title": "Time",
                "value": format_timestamp(alert.timestamp),
                "short": true,
            }],
            "ts": alert.timestamp,
        }]
    })
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
