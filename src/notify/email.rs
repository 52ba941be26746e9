use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::composer::{ChannelKind, Notification};
use super::images::ImageSource;
use super::Notifier;
use crate::core::EmailConfig;

/// SMTP (STARTTLS) delivery. Rich notifications go out as
/// multipart/alternative with the HTML part carrying inline images.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    images: Box<dyn ImageSource>,
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig, images: Box<dyn ImageSource>) -> Result<Self> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .with_context(|| format!("Invalid SMTP server {}", config.smtp_server))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender_email.clone(),
                config.sender_password.clone(),
            ))
            .build();

        Ok(Self {
            mailer,
            from: config.sender_email.parse().context("Invalid sender address")?,
            to: config.recipient_email.parse().context("Invalid recipient address")?,
            images,
        })
    }

    async fn build_message(&self, notification: &Notification) -> Result<Message> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject.clone());

        let plain = SinglePart::plain(notification.body.plain.clone());
        let Some(rich) = notification.body.rich.clone() else {
            return Ok(builder.singlepart(plain)?);
        };

        let mut related = MultiPart::related().singlepart(SinglePart::html(rich));
        let mut embedded = 0;
        for image in notification.images.iter().filter(|i| i.embed) {
            tracing::debug!("📥 Downloading image {}: {}", image.entry, image.url);
            match self.images.fetch(&image.url).await {
                Ok(fetched) => {
                    let content_type = ContentType::parse(&fetched.content_type)
                        .or_else(|_| ContentType::parse("image/jpeg"))?;
                    related = related.singlepart(
                        Attachment::new_inline(image.content_id.clone())
                            .body(fetched.bytes, content_type),
                    );
                    embedded += 1;
                }
                // the rest of the email still goes out
                Err(e) => tracing::warn!("❌ Image {} download failed: {}", image.entry, e),
            }
        }

        tracing::debug!(
            "📧 Email contains {} listings, {} images",
            notification.listing_count,
            embedded
        );

        Ok(builder.multipart(MultiPart::alternative().singlepart(plain).multipart(related))?)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = self.build_message(notification).await?;
        self.mailer
            .send(message)
            .await
            .context("SMTP delivery failed (Gmail needs an app password)")?;

        tracing::info!("✅ Email sent successfully to {}", self.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{RawListing, RecordBuilder};
    use crate::notify::compose;
    use crate::notify::images::{FetchedImage, MockImageSource};

    fn email_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            sender_email: "bot@example.com".to_string(),
            sender_password: "app-password".to_string(),
            recipient_email: "buyer@example.com".to_string(),
            ..Default::default()
        }
    }

    fn listing(id: &str, model: &str) -> RawListing {
        RawListing::default()
            .with_model(model)
            .with_price("45,000")
            .with_link(&format!("https://www.yad2.co.il/item/{}", id))
            .with_image_url(&format!("https://img.yad2.co.il/{}.jpg", id))
    }

    #[tokio::test]
    async fn test_failed_image_still_builds_email() {
        let builder = RecordBuilder::default();
        let records: Vec<_> = [listing("a1", "Peugeot 3008"), listing("b2", "Ford Focus")]
            .iter()
            .map(|raw| builder.build(raw).unwrap().record)
            .collect();
        let notification = compose(&records, &[ChannelKind::Email]).remove(0);

        let mut images = MockImageSource::new();
        images.expect_fetch().times(2).returning(|url| {
            if url.contains("a1") {
                Ok(FetchedImage {
                    bytes: vec![0xff, 0xd8, 0xff],
                    content_type: "image/jpeg".to_string(),
                })
            } else {
                Err(anyhow::anyhow!("HTTP 404"))
            }
        });

        let notifier = EmailNotifier::new(&email_config(), Box::new(images)).unwrap();
        let message = notifier.build_message(&notification).await.unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("<car_image_1>"));
        assert!(!raw.contains("<car_image_2>"));
    }

    #[tokio::test]
    async fn test_plain_only_notification_skips_images() {
        let builder = RecordBuilder::default();
        let record = builder.build(&listing("a1", "Peugeot 3008")).unwrap().record;
        let mut notification = compose(&[record], &[ChannelKind::Email]).remove(0);
        notification.body.rich = None;

        let mut images = MockImageSource::new();
        images.expect_fetch().times(0);

        let notifier = EmailNotifier::new(&email_config(), Box::new(images)).unwrap();
        let message = notifier.build_message(&notification).await.unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(!raw.contains("text/html"));
    }
}
