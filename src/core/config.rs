use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ConfigError;
use crate::notify::ChannelKind;

const DEFAULT_CONFIG_FILE: &str = "car_watch.toml";
const ENV_PREFIX: &str = "CAR_WATCH";
// One week; tokio timers overflow on far larger durations.
const MAX_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// File path or http(s) URL of the raw listing feed.
    pub feed: String,
    pub max_results_per_check: usize,
    pub timeout_minutes: u64,
    pub check_interval_minutes: u64,
    pub seen_store_path: PathBuf,
    pub seen_warn_threshold: usize,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            feed: String::new(),
            max_results_per_check: 20,
            timeout_minutes: 3,
            check_interval_minutes: 30,
            seen_store_path: PathBuf::from("seen_cars.json"),
            seen_warn_threshold: 10_000,
        }
    }
}

impl ScrapingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            sender_email: String::new(),
            sender_password: String::new(),
            recipient_email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub phone_number: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: String::new(),
            auth_token: String::new(),
            // Twilio sandbox sender
            from_number: "whatsapp:+14155238886".to_string(),
            phone_number: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads `.env`, then the optional TOML file, then `CAR_WATCH__*`
    /// environment overrides, and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file = env::var("CAR_WATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(&file).required(false))
            .add_source(env_overrides())
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scraping = &self.scraping;
        if scraping.feed.trim().is_empty() {
            return Err(ConfigError::invalid("scraping.feed", "must name a file or URL"));
        }
        if scraping.max_results_per_check == 0 {
            return Err(ConfigError::invalid(
                "scraping.max_results_per_check",
                "must be greater than zero",
            ));
        }
        for (field, minutes) in [
            ("scraping.timeout_minutes", scraping.timeout_minutes),
            ("scraping.check_interval_minutes", scraping.check_interval_minutes),
        ] {
            if minutes == 0 || minutes > MAX_MINUTES {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be between 1 and {} minutes", MAX_MINUTES),
                ));
            }
        }

        if self.email.enabled {
            let email = &self.email;
            require("email.smtp_server", &email.smtp_server)?;
            require("email.sender_email", &email.sender_email)?;
            require("email.sender_password", &email.sender_password)?;
            require("email.recipient_email", &email.recipient_email)?;
            for (field, address) in [
                ("email.sender_email", &email.sender_email),
                ("email.recipient_email", &email.recipient_email),
            ] {
                if !address.contains('@') {
                    return Err(ConfigError::invalid(field, format!("`{}` is not an email address", address)));
                }
            }
        }

        if self.whatsapp.enabled {
            let whatsapp = &self.whatsapp;
            require("whatsapp.account_sid", &whatsapp.account_sid)?;
            require("whatsapp.auth_token", &whatsapp.auth_token)?;
            require("whatsapp.from_number", &whatsapp.from_number)?;
            require("whatsapp.phone_number", &whatsapp.phone_number)?;
            if !whatsapp.phone_number.starts_with('+') {
                return Err(ConfigError::invalid(
                    "whatsapp.phone_number",
                    "must be in international format, e.g. +972501234567",
                ));
            }
        }

        Ok(())
    }

    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        let mut channels = Vec::new();
        if self.email.enabled {
            channels.push(ChannelKind::Email);
        }
        if self.whatsapp.enabled {
            channels.push(ChannelKind::WhatsApp);
        }
        channels
    }
}

// Values stay strings: serde coerces typed fields, and numeric-looking
// secrets or `+` phone numbers must survive unchanged.
fn env_overrides() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::invalid(field, "is required when the channel is enabled"))
    } else {
        Ok(())
    }
}
