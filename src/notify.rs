//! Run notifications
//!
//! Channels are best effort: a failing channel is logged and recorded in the
//! [`DispatchSummary`], never surfaced as an error of the report run.

use crate::config::NotificationConfig;
use crate::errors::ErrorContext;
use crate::format::artifact_timestamp;
use crate::prelude::*;
use crate::types::EfficiencyLevel;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

impl Urgency {
    /// Urgency of a completed run, driven by how well seats are used
    pub fn for_efficiency(level: EfficiencyLevel) -> Self {
        match level {
            EfficiencyLevel::Good => Urgency::Low,
            EfficiencyLevel::Fair => Urgency::Normal,
            EfficiencyLevel::Poor => Urgency::High,
        }
    }

    pub fn theme_color(self) -> &'static str {
        match self {
            Urgency::Low => "2E7D32",
            Urgency::Normal => "0078D7",
            Urgency::High => "F9A825",
            Urgency::Critical => "C62828",
        }
    }

    /// `X-Priority` header value (1 = highest)
    fn mail_priority(self) -> u8 {
        match self {
            Urgency::Low => 5,
            Urgency::Normal => 3,
            Urgency::High => 2,
            Urgency::Critical => 1,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Urgency::Low => "LOW",
            Urgency::Normal => "NORMAL",
            Urgency::High => "HIGH",
            Urgency::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub urgency: Urgency,
    pub facts: Vec<(String, String)>,
    pub created_at: NaiveDateTime,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        urgency: Urgency,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            urgency,
            facts: Vec::new(),
            created_at,
        }
    }

    pub fn with_fact(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.push((name.into(), value.into()));
        self
    }
}

/// A destination for notifications
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Posts an Office 365 connector MessageCard to an incoming webhook
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn payload(notification: &Notification) -> serde_json::Value {
        let facts: Vec<serde_json::Value> = notification
            .facts
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();

        json!({
            "@type": "MessageCard",
            "@context": "http://schema.org/extensions",
            "themeColor": notification.urgency.theme_color(),
            "summary": notification.title,
            "title": format!("[{}] {}", notification.urgency, notification.title),
            "text": notification.body,
            "sections": [{ "facts": facts }],
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        debug!(url = %self.url, "posting webhook notification");
        self.client
            .post(&self.url)
            .json(&Self::payload(notification))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Writes RFC 5322 messages into an outbox directory picked up by the mail relay
#[derive(Debug, Clone)]
pub struct EmailChannel {
    outbox: PathBuf,
    from: String,
    to: Vec<String>,
}

impl EmailChannel {
    pub fn new(outbox: impl Into<PathBuf>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            outbox: outbox.into(),
            from: from.into(),
            to,
        }
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    pub fn render_message(&self, notification: &Notification) -> String {
        let mut headers = vec![
            format!("From: {}", self.from),
            format!("To: {}", self.to.join(", ")),
            format!(
                "Subject: {}",
                encode_header(&format!("[{}] {}", notification.urgency, notification.title))
            ),
            format!("Date: {}", notification.created_at.and_utc().to_rfc2822()),
            format!("X-Priority: {}", notification.urgency.mail_priority()),
            "MIME-Version: 1.0".to_string(),
            "Content-Type: text/plain; charset=UTF-8".to_string(),
            "Content-Transfer-Encoding: 8bit".to_string(),
        ];
        headers.push(String::new());

        let mut body = vec![notification.body.clone()];
        if !notification.facts.is_empty() {
            body.push(String::new());
            for (name, value) in &notification.facts {
                body.push(format!("{}: {}", name, value));
            }
        }

        let mut message = headers.join("\r\n");
        message.push_str("\r\n");
        message.push_str(&body.join("\r\n"));
        message.push_str("\r\n");
        message
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        if self.to.is_empty() {
            return Err(ReportError::Notification {
                channel: "email".to_string(),
                message: "no recipients configured".to_string(),
            });
        }

        let message = self.render_message(notification);
        let outbox = self.outbox.clone();
        let prefix = format!("{}_", artifact_timestamp(&notification.created_at));

        let path = tokio::task::spawn_blocking(move || write_to_outbox(&outbox, &prefix, &message))
            .await
            .map_err(|e| ReportError::Notification {
                channel: "email".to_string(),
                message: format!("outbox writer stopped: {}", e),
            })??;

        debug!(path = %path.display(), "queued email notification");
        Ok(())
    }
}

/// Write one message as a uniquely named `.eml` file
fn write_to_outbox(outbox: &Path, prefix: &str, message: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(outbox).with_file_context(outbox)?;

    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".eml")
        .tempfile_in(outbox)
        .with_file_context(outbox)?;
    file.write_all(message.as_bytes()).with_file_context(outbox)?;
    let (_, path) = file.keep().map_err(|e| ReportError::FileProcessing {
        file_path: outbox.to_path_buf(),
        cause: e.error.to_string(),
    })?;
    Ok(path)
}

/// Longest encoded-word allowed in a header
const ENCODED_WORD_MAX: usize = 75;
const ENCODED_WORD_OPEN: &str = "=?UTF-8?Q?";
const ENCODED_WORD_CLOSE: &str = "?=";

/// RFC 2047 Q-encoding for non-ASCII header text.
///
/// Long text is split into several encoded-words on character boundaries,
/// folded onto continuation lines.
fn encode_header(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    let budget = ENCODED_WORD_MAX - ENCODED_WORD_OPEN.len() - ENCODED_WORD_CLOSE.len();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        let mut chunk = String::new();
        for &byte in ch.encode_utf8(&mut buf).as_bytes() {
            match byte {
                b' ' => chunk.push('_'),
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                    chunk.push(byte as char)
                }
                _ => chunk.push_str(&format!("={:02X}", byte)),
            }
        }
        if !current.is_empty() && current.len() + chunk.len() > budget {
            words.push(std::mem::take(&mut current));
        }
        current.push_str(&chunk);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| format!("{}{}{}", ENCODED_WORD_OPEN, word, ENCODED_WORD_CLOSE))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchSummary {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fans a notification out to every configured channel
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let mut notifier = Self::new();
        if !config.enabled {
            return Ok(notifier);
        }

        if let Some(url) = &config.webhook_url {
            notifier.add_channel(Box::new(WebhookChannel::new(url.clone())?));
        }
        if let Some(outbox) = &config.email_outbox {
            let from = config
                .email_from
                .clone()
                .unwrap_or_else(|| "m365-report@localhost".to_string());
            notifier.add_channel(Box::new(EmailChannel::new(
                outbox.clone(),
                from,
                config.email_to.clone(),
            )));
        }
        Ok(notifier)
    }

    pub fn add_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn dispatch(&self, notification: &Notification) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for channel in &self.channels {
            match channel.send(notification).await {
                Ok(()) => {
                    info!(channel = channel.name(), "notification sent");
                    summary.delivered.push(channel.name().to_string());
                }
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "notification failed");
                    summary.failed.push((channel.name().to_string(), e.to_string()));
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn notification() -> Notification {
        let at = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        Notification::new("ライセンスレポート作成完了", "Report finished.", Urgency::High, at)
            .with_fact("利用率", "30.9%")
    }

    #[test]
    fn test_webhook_payload_shape() {
        let payload = WebhookChannel::payload(&notification());
        assert_eq!(payload["@type"], "MessageCard");
        assert_eq!(payload["themeColor"], Urgency::High.theme_color());
        assert_eq!(payload["sections"][0]["facts"][0]["value"], "30.9%");
        assert!(payload["title"].as_str().unwrap().starts_with("[HIGH]"));
    }

    #[test]
    fn test_urgency_follows_efficiency() {
        assert_eq!(Urgency::for_efficiency(EfficiencyLevel::Good), Urgency::Low);
        assert_eq!(Urgency::for_efficiency(EfficiencyLevel::Poor), Urgency::High);
        assert!(Urgency::Critical > Urgency::High);
    }

    #[test]
    fn test_email_headers() {
        let channel = EmailChannel::new(
            "/tmp/outbox",
            "report@example.com",
            vec!["it@example.com".to_string()],
        );
        let message = channel.render_message(&notification());

        assert!(message.contains("To: it@example.com\r\n"));
        assert!(message.contains("Subject: =?UTF-8?Q?=5BHIGH=5D_"));
        assert!(message.contains("Date: Mon, 1 Jul 2024 09:15:00 +0000\r\n"));
        assert!(message.contains("X-Priority: 2\r\n"));
        assert!(message.ends_with("利用率: 30.9%\r\n"));
    }

    #[test]
    fn test_long_subject_is_split_into_folded_words() {
        let title = "ライセンスレポート作成完了 月次レポートを出力フォルダに保存しました";
        let encoded = encode_header(&format!("[HIGH] {}", title));
        let words: Vec<&str> = encoded.split("\r\n ").collect();

        assert!(words.len() > 1);
        for word in &words {
            assert!(word.len() <= ENCODED_WORD_MAX, "{} is too long", word);
            assert!(word.starts_with("=?UTF-8?Q?") && word.ends_with("?="));
            // every word holds whole characters
            let payload = &word[10..word.len() - 2];
            let bytes: Vec<u8> = payload
                .split('=')
                .skip(1)
                .map(|hex| u8::from_str_radix(&hex[..2], 16).unwrap())
                .collect();
            assert!(std::str::from_utf8(&bytes).is_ok());
        }
    }

    #[tokio::test]
    async fn test_email_channel_writes_outbox() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = temp_dir.path().join("outbox");
        let channel =
            EmailChannel::new(&outbox, "report@example.com", vec!["it@example.com".to_string()]);

        channel.send(&notification()).await.unwrap();
        channel.send(&notification()).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(&outbox).unwrap().collect();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_records_failures_without_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut notifier = Notifier::new();
        notifier.add_channel(Box::new(WebhookChannel::new("http://127.0.0.1:9/hook").unwrap()));
        notifier.add_channel(Box::new(EmailChannel::new(
            temp_dir.path(),
            "report@example.com",
            vec!["it@example.com".to_string()],
        )));

        let summary = notifier.dispatch(&notification()).await;
        assert_eq!(summary.delivered, vec!["email".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "webhook");
        assert!(!summary.all_delivered());
    }

    #[test]
    fn test_disabled_config_has_no_channels() {
        let config = NotificationConfig {
            enabled: false,
            webhook_url: Some("https://example.com/hook".to_string()),
            ..NotificationConfig::default()
        };
        assert!(Notifier::from_config(&config).unwrap().is_empty());
    }
}
