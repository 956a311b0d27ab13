use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const WEBHOOK_PATH: &str = "/webhook";

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Staging,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "dev" | "development" => Ok(AppEnv::Development),
            "staging" => Ok(AppEnv::Staging),
            "prod" | "production" => Ok(AppEnv::Production),
            other => bail!("APP_ENV must be development, staging or production, got '{other}'"),
        }
    }
}

impl std::fmt::Display for AppEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEnv::Development => write!(f, "development"),
            AppEnv::Staging => write!(f, "staging"),
            AppEnv::Production => write!(f, "production"),
        }
    }
}

/// How the bot receives updates from Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMode {
    Polling,
    Webhook(Url),
}

impl UpdateMode {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateMode::Polling => "polling",
            UpdateMode::Webhook(_) => "webhook",
        }
    }
}

/// Bot token wrapper that keeps the secret out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    fn parse(raw: &str) -> Result<Self> {
        let token = raw.trim();
        let Some((bot_id, secret)) = token.split_once(':') else {
            bail!("TELEGRAM_BOT_TOKEN is malformed: expected '<bot id>:<secret>'");
        };
        if bot_id.is_empty() || !bot_id.chars().all(|c| c.is_ascii_digit()) {
            bail!("TELEGRAM_BOT_TOKEN is malformed: bot id must be numeric");
        }
        let secret_ok = secret.len() >= 30
            && secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !secret_ok {
            bail!("TELEGRAM_BOT_TOKEN is malformed: secret part is too short or has invalid characters");
        }
        Ok(Self(token.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Numeric bot id, safe to log.
    pub fn bot_id(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BotToken({}:***)", self.bot_id())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: BotToken,
    pub port: u16,
    pub app_env: AppEnv,
    pub log_level: String,
    pub update_mode: UpdateMode,
    /// Footer appended to the /start and /help texts.
    pub signature: Option<String>,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(raw_token) = get("TELEGRAM_BOT_TOKEN") else {
            bail!("TELEGRAM_BOT_TOKEN is missing. Set it in the container environment or secret store.");
        };
        let bot_token = BotToken::parse(&raw_token)?;

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got '{raw}'"))?,
            None => DEFAULT_PORT,
        };

        let app_env = match get("APP_ENV") {
            Some(raw) => AppEnv::parse(&raw)?,
            None => AppEnv::default(),
        };

        let log_level = match get("LOG_LEVEL") {
            Some(raw) => match parse_log_level(&raw) {
                Some(level) => level.to_string(),
                None => bail!(
                    "LOG_LEVEL must be one of trace, debug, info, warn, error, off, got '{}'",
                    raw.trim()
                ),
            },
            None => "info".to_string(),
        };

        let update_mode = match (get("WEBHOOK_URL"), get("WEBHOOK_DOMAIN")) {
            (Some(url), _) => UpdateMode::Webhook(parse_webhook_url(&url)?),
            (None, Some(domain)) => {
                let domain = domain
                    .trim()
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/');
                UpdateMode::Webhook(parse_webhook_url(&format!("https://{domain}{WEBHOOK_PATH}"))?)
            }
            (None, None) => UpdateMode::Polling,
        };

        let max_retries = match get("MAX_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("MAX_RETRIES must be a non-negative integer, got '{raw}'"))?,
            None => DEFAULT_MAX_RETRIES,
        };

        let timeout_secs = match get("REQUEST_TIMEOUT") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("REQUEST_TIMEOUT must be a number of seconds, got '{raw}'"))?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(Config {
            bot_token,
            port,
            app_env,
            log_level,
            update_mode,
            signature: get("BOT_SIGNATURE").map(|s| s.trim().to_string()),
            max_retries,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Normalised tracing level for a `LOG_LEVEL` value, or `None` if unknown.
pub fn parse_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

fn parse_webhook_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid webhook URL: {raw}"))?;
    if url.scheme() != "https" {
        bail!("Webhook URL must use https, got '{}'", url.scheme());
    }
    Ok(url)
}
