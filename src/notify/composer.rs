use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use std::fmt;

use crate::listing::ListingRecord;

const FOOTER_SIGNATURE: &str = "This is an automated notification from your Yad2 Car Scraper";
const FOOTER_GREETING: &str = "Happy car hunting! 🚗";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    WhatsApp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCapabilities {
    pub supports_rich: bool,
    pub supports_embedding: bool,
}

impl ChannelKind {
    pub fn capabilities(self) -> ChannelCapabilities {
        match self {
            Self::Email => ChannelCapabilities {
                supports_rich: true,
                supports_embedding: true,
            },
            Self::WhatsApp => ChannelCapabilities {
                supports_rich: false,
                supports_embedding: false,
            },
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Email => "email",
            Self::WhatsApp => "whatsapp",
        })
    }
}

/// Image the transport should fetch. Embedded images are referenced from
/// the rich body as `cid:{content_id}`; the others are attachment hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub entry: usize,
    pub content_id: String,
    pub url: String,
    pub embed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationBody {
    pub plain: String,
    pub rich: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: ChannelKind,
    pub subject: String,
    pub body: NotificationBody,
    pub images: Vec<ImageRef>,
    pub listing_count: usize,
}

/// One combined notification per channel for all new listings of a run.
/// No listings, no notifications.
pub fn compose(records: &[ListingRecord], channels: &[ChannelKind]) -> Vec<Notification> {
    if records.is_empty() {
        return Vec::new();
    }

    let subject = subject_line(records);
    let plain = render_plain(records);

    channels
        .iter()
        .map(|&channel| {
            let caps = channel.capabilities();
            let rich = caps.supports_rich.then(|| render_rich(records, caps.supports_embedding));
            Notification {
                channel,
                subject: subject.clone(),
                body: NotificationBody {
                    plain: plain.clone(),
                    rich,
                },
                images: image_refs(records, caps.supports_embedding),
                listing_count: records.len(),
            }
        })
        .collect()
}

pub fn subject_line(records: &[ListingRecord]) -> String {
    match records {
        [only] => format!("🚗 New Car Alert: {} - {}", only.model(), only.price()),
        _ => format!("🚗 {} New Cars Found on Yad2!", records.len()),
    }
}

pub fn content_id(entry: usize) -> String {
    format!("car_image_{}", entry)
}

fn image_refs(records: &[ListingRecord], embed: bool) -> Vec<ImageRef> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| {
            record.image_url().map(|url| ImageRef {
                entry: i + 1,
                content_id: content_id(i + 1),
                url: url.to_string(),
                embed,
            })
        })
        .collect()
}

fn headline(count: usize) -> String {
    if count == 1 {
        "🚗 New Car Alert!".to_string()
    } else {
        format!("🚗 {} New Cars Found!", count)
    }
}

fn found_line(count: usize) -> String {
    format!(
        "Found {} new car{} matching your criteria:",
        count,
        if count == 1 { "" } else { "s" }
    )
}

/// Detail lines shared by both renderings. Empty optional fields are left
/// out entirely.
fn detail_lines(record: &ListingRecord) -> Vec<String> {
    let mut lines = vec![format!("🏷️ {}", record.model())];
    if !record.year().is_empty() {
        lines.push(format!("📅 {}", record.year()));
    }
    if !record.owner_count().is_empty() {
        lines.push(format!("👥 {}", record.owner_count()));
    }
    lines.push(format!("💰 {}", record.price()));
    if record.is_private_seller() {
        lines.push("👤 Private Person".to_string());
    } else {
        lines.push(format!("🏢 {}", record.agency()));
    }
    if !record.marketing_text().is_empty() {
        lines.push(format!("ℹ️ {}", record.marketing_text()));
    }
    lines
}

pub fn render_plain(records: &[ListingRecord]) -> String {
    let count = records.len();
    let mut parts = vec![headline(count), String::new(), found_line(count), "=".repeat(50)];

    for (i, record) in records.iter().enumerate() {
        parts.push(String::new());
        parts.push(format!("🚗 Car #{}:", i + 1));
        parts.extend(detail_lines(record));
        parts.push(format!("🔗 Link to ad: {}", record.link()));
        parts.push("-".repeat(30));
    }

    parts.push(String::new());
    parts.push(FOOTER_GREETING.to_string());
    parts.push(FOOTER_SIGNATURE.to_string());
    parts.join("\n")
}

pub fn render_rich(records: &[ListingRecord], embed_images: bool) -> String {
    let count = records.len();
    let mut html = String::new();

    html.push_str("<html>\n<body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\n");
    html.push_str(&format!(
        "<h2 style=\"color: #2c5aa0;\">{}</h2>\n",
        encode_text(&headline(count))
    ));
    html.push_str(&format!(
        "<p style=\"font-size: 16px; color: #666;\">{}</p>\n",
        encode_text(&found_line(count))
    ));
    html.push_str("<hr style=\"border: 1px solid #ddd; margin: 20px 0;\">\n");

    for (i, record) in records.iter().enumerate() {
        let entry = i + 1;
        let details = detail_lines(record)
            .iter()
            .map(|line| encode_text(line))
            .collect::<Vec<_>>()
            .join("<br>");

        html.push_str("<div style=\"border: 2px solid #e0e0e0; border-radius: 10px; padding: 20px; margin: 20px 0; background-color: #f9f9f9;\">\n");
        html.push_str(&format!(
            "<h3 style=\"color: #2c5aa0; margin-top: 0;\">Car #{}</h3>\n",
            entry
        ));
        html.push_str(&format!(
            "<div style=\"font-size: 14px; line-height: 1.8;\">{}</div>\n",
            details
        ));
        html.push_str(&format!(
            "<div style=\"margin: 15px 0;\"><strong>🔗 <a href=\"{}\" target=\"_blank\" style=\"color: #2c5aa0;\">View this car on Yad2</a></strong></div>\n",
            encode_double_quoted_attribute(record.link())
        ));

        if let Some(url) = record.image_url() {
            if embed_images {
                html.push_str(&format!(
                    "<div style=\"margin: 15px 0;\"><img src=\"cid:{}\" style=\"max-width: 100%; height: auto; border-radius: 8px;\"></div>\n",
                    content_id(entry)
                ));
            }
            let full_size = url.split('?').next().unwrap_or(url);
            html.push_str(&format!(
                "<div><a href=\"{}\" target=\"_blank\">View full size image</a></div>\n",
                encode_double_quoted_attribute(full_size)
            ));
        }

        html.push_str("</div>\n");
    }

    html.push_str("<hr style=\"border: 1px solid #ddd; margin: 30px 0;\">\n");
    html.push_str(&format!(
        "<p style=\"font-size: 12px; color: #999; text-align: center;\">{}<br>{}</p>\n",
        encode_text(FOOTER_SIGNATURE),
        encode_text(FOOTER_GREETING)
    ));
    html.push_str("</body>\n</html>\n");
    html
}
