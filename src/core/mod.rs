pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, EmailConfig, ScrapingConfig, WhatsAppConfig};
pub use error::{ConfigError, RunError, StoreError};
