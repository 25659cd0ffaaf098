use std::fs;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub session_dir: String,
    pub api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
    pub retry_delay_secs: u64,
    pub max_retry_delay_secs: Option<u64>,
    pub relay_own_messages: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:21465".into(),
            session_dir: "sessions".into(),
            api_key: None,
            webhook_url: None,
            webhook_timeout_secs: 10,
            retry_delay_secs: 5,
            max_retry_delay_secs: None,
            relay_own_messages: true,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("wagate.toml") {
        match toml::from_str::<toml::Table>(&raw) {
            Ok(table) => apply_file_config(&mut settings, &table),
            Err(err) => warn!(%err, "ignoring malformed wagate.toml"),
        }
    }

    apply_env_overrides(&mut settings);
    settings
}

fn apply_file_config(settings: &mut Settings, table: &toml::Table) {
    if let Some(v) = table.get("server_bind").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = table.get("session_dir").and_then(toml::Value::as_str) {
        settings.session_dir = v.to_string();
    }
    if let Some(v) = table.get("api_key").and_then(toml::Value::as_str) {
        settings.api_key = Some(v.to_string());
    }
    if let Some(v) = table.get("webhook_url").and_then(toml::Value::as_str) {
        settings.webhook_url = Some(v.to_string());
    }
    if let Some(v) = table
        .get("webhook_timeout_secs")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.webhook_timeout_secs = v;
    }
    if let Some(v) = table
        .get("retry_delay_secs")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.retry_delay_secs = v;
    }
    if let Some(v) = table
        .get("max_retry_delay_secs")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.max_retry_delay_secs = Some(v);
    }
    if let Some(v) = table
        .get("relay_own_messages")
        .and_then(toml::Value::as_bool)
    {
        settings.relay_own_messages = v;
    }
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(v) = std::env::var("PORT") {
        settings.server_bind = format!("0.0.0.0:{v}");
    }
    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("SESSION_DIR") {
        settings.session_dir = v;
    }
    if let Ok(v) = std::env::var("API_KEY") {
        settings.api_key = Some(v);
    }
    if let Ok(v) = std::env::var("N8N_WEBHOOK_URL") {
        settings.webhook_url = Some(v);
    }
    if let Ok(v) = std::env::var("WEBHOOK_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse() {
            settings.webhook_timeout_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("RETRY_DELAY_SECS") {
        if let Ok(parsed) = v.parse() {
            settings.retry_delay_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("MAX_RETRY_DELAY_SECS") {
        if let Ok(parsed) = v.parse() {
            settings.max_retry_delay_secs = Some(parsed);
        }
    }
    if let Ok(v) = std::env::var("RELAY_OWN_MESSAGES") {
        if let Ok(parsed) = v.parse() {
            settings.relay_own_messages = parsed;
        }
    }
}
