//! Delivery of the end-of-run report.

use crate::pipeline::RunReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Somewhere to send report messages
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;

    fn channel_name(&self) -> &'static str;
}

/// Text for the new-matches message, if there is anything new
pub fn format_matches(report: &RunReport) -> Option<String> {
    if report.matches.is_empty() {
        return None;
    }

    let mut message = String::from("📢 Nuove offerte trovate!\n\n");
    for search in &report.matches {
        message.push_str(&format!("--- {} ---\n", search.search));
        for listing in &search.listings {
            let price = if listing.price_text.is_empty() {
                "N/D"
            } else {
                listing.price_text.as_str()
            };
            message.push_str(&format!("{} — {}\n{}\n\n", listing.title, price, listing.canonical_url));
        }
    }
    Some(message)
}

/// Text for the failures message, if anything went wrong
pub fn format_failures(report: &RunReport) -> Option<String> {
    if report.is_clean() {
        return None;
    }

    let mut lines: Vec<String> = report
        .failures
        .iter()
        .map(|f| format!("{}: {}: {}", f.search, f.stage, f.reason))
        .collect();
    lines.extend(report.save_warnings.iter().map(|w| format!("history not saved, {}", w)));

    Some(format!("[BOT] Alcune ricerche sono fallite:\n{}", lines.join("\n")))
}

/// Send both report messages, logging rather than failing on delivery errors
pub async fn deliver(notifier: &dyn Notifier, report: &RunReport) {
    for message in [format_matches(report), format_failures(report)].into_iter().flatten() {
        match notifier.send(&message).await {
            Ok(()) => info!("Report sent via {}", notifier.channel_name()),
            Err(e) => warn!("Could not send report via {}: {:#}", notifier.channel_name(), e),
        }
    }
}

/// Prints messages when no chat credentials are configured
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        println!("{}", message);
        Ok(())
    }

    fn channel_name(&self) -> &'static str {
        "stdout"
    }
}

/// Telegram Bot API notifier
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            token,
            chat_id,
        })
    }

    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`, if a token is set
    pub fn from_env() -> Result<Option<Self>> {
        let token = match std::env::var("TELEGRAM_BOT_TOKEN") {
            Ok(token) if !token.trim().is_empty() => token,
            _ => return Ok(None),
        };
        let chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());
        Self::new(token, chat_id).map(Some)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", TELEGRAM_API, self.token, method)
    }

    async fn chat_id(&self) -> Result<String> {
        if let Some(id) = &self.chat_id {
            return Ok(id.clone());
        }

        warn!("TELEGRAM_CHAT_ID not set, looking it up from the bot's updates");
        let updates: Value = self
            .client
            .get(self.endpoint("getUpdates"))
            .send()
            .await
            .context("Failed to call getUpdates")?
            .error_for_status()
            .context("getUpdates returned an error status")?
            .json()
            .await
            .context("Failed to decode getUpdates response")?;

        chat_id_from_updates(&updates).context(
            "No chat found in bot updates; send /start to the bot or set TELEGRAM_CHAT_ID",
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let chat_id = self.chat_id().await?;
        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": message,
                "disable_notification": false,
            }))
            .send()
            .await
            .context("Failed to reach Telegram")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram returned {}: {}", status, body);
        }
        Ok(())
    }

    fn channel_name(&self) -> &'static str {
        "Telegram"
    }
}

/// First chat id found in a `getUpdates` payload
fn chat_id_from_updates(updates: &Value) -> Option<String> {
    updates
        .get("result")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("message").or_else(|| item.get("channel_post")))
        .filter_map(|msg| msg.get("chat")?.get("id"))
        .find_map(|id| match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
}
