pub mod composer;
pub mod email;
pub mod images;
pub mod whatsapp;

use anyhow::Result;
use async_trait::async_trait;

pub use composer::{compose, ChannelCapabilities, ChannelKind, ImageRef, Notification, NotificationBody};
pub use email::EmailNotifier;
pub use images::{ImageFetcher, ImageSource};
pub use whatsapp::WhatsAppNotifier;

use crate::core::Config;

/// Outbound transport for one channel. Failures are reported to the caller
/// and never retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> ChannelKind;

    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Builds a notifier for every enabled channel.
pub fn notifiers_from_config(config: &Config) -> Result<Vec<Box<dyn Notifier>>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    if config.email.enabled {
        notifiers.push(Box::new(EmailNotifier::new(&config.email, Box::new(ImageFetcher::new()?))?));
    }
    if config.whatsapp.enabled {
        notifiers.push(Box::new(WhatsAppNotifier::new(&config.whatsapp)));
    }
    Ok(notifiers)
}
