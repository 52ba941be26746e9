use chrono::{DateTime, Utc};
use thiserror::Error;

use super::identity::{id_from_link, resolve_id, IdentityFields};
use super::types::{FieldReason, FieldValue, ListingRecord, RawListing, PRIVATE_SELLER};

pub const DEFAULT_SITE_BASE: &str = "https://www.yad2.co.il/";

const UNKNOWN_MODEL: &str = "Unknown Model";
const PRICE_NOT_FOUND: &str = "Price not found";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("listing has neither an item link nor model/price to fingerprint")]
    NoIdentity,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub record: ListingRecord,
    /// Fields that fell back to a default, with the extraction reason.
    pub degraded: Vec<(&'static str, FieldReason)>,
}

impl BuildOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Turns per-field extraction outcomes into a `ListingRecord`, applying the
/// per-field defaults and resolving identity.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    site_base: String,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_BASE)
    }
}

impl RecordBuilder {
    pub fn new(site_base: &str) -> Self {
        let mut site_base = site_base.to_string();
        if !site_base.ends_with('/') {
            site_base.push('/');
        }
        Self { site_base }
    }

    pub fn build(&self, raw: &RawListing) -> Result<BuildOutcome, BuildError> {
        self.build_at(raw, Utc::now())
    }

    pub fn build_at(
        &self,
        raw: &RawListing,
        found_at: DateTime<Utc>,
    ) -> Result<BuildOutcome, BuildError> {
        let link = raw
            .link
            .as_str()
            .map(|href| self.absolutize(href))
            .unwrap_or_default();

        if id_from_link(&link).is_none() && raw.model.as_str().is_none() && raw.price.as_str().is_none() {
            return Err(BuildError::NoIdentity);
        }

        let mut degraded = Vec::new();
        let mut field = |name: &'static str, value: &FieldValue, default: &str| -> String {
            match value {
                FieldValue::Present(text) => text.clone(),
                FieldValue::Unavailable(reason) => {
                    degraded.push((name, reason.clone()));
                    default.to_string()
                }
            }
        };

        let model = field("model", &raw.model, UNKNOWN_MODEL);
        let price = field("price", &raw.price, PRICE_NOT_FOUND);
        let agency = field("agency", &raw.agency, PRIVATE_SELLER);
        let year = optional(&raw.year);
        let owner_count = optional(&raw.owner_count);
        let marketing_text = optional(&raw.marketing_text);
        let image_url = raw.image_url.as_str().map(str::to_string);
        if let Some(reason) = raw.link.reason() {
            degraded.push(("link", reason.clone()));
        }

        let id = resolve_id(&IdentityFields {
            link: &link,
            model: &model,
            price: &price,
            year: &year,
            owner_count: &owner_count,
            marketing_text: &marketing_text,
            agency: &agency,
        });

        let record = ListingRecord::new(
            id,
            model,
            price,
            year,
            owner_count,
            marketing_text,
            agency,
            link,
            image_url,
            found_at,
        );

        Ok(BuildOutcome { record, degraded })
    }

    fn absolutize(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.site_base, href.trim_start_matches('/'))
        }
    }
}

// Optional fields are legitimately blank on many listings.
fn optional(value: &FieldValue) -> String {
    value.as_str().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::IdSource;

    #[test]
    fn test_relative_href_is_absolutized() {
        let raw = RawListing::default()
            .with_model("Suzuki Crossover")
            .with_price("58,000 ₪")
            .with_link("item/kdqeegdr?opened-from=feed&component-type=main_feed");

        let outcome = RecordBuilder::default().build(&raw).unwrap();
        let record = outcome.record;
        assert_eq!(
            record.link(),
            "https://www.yad2.co.il/item/kdqeegdr?opened-from=feed&component-type=main_feed"
        );
        assert_eq!(record.id().as_str(), "kdqeegdr");
        assert_eq!(record.id().source(), IdSource::Link);
    }

    #[test]
    fn test_missing_fields_use_source_defaults() {
        let raw = RawListing::default().with_link("https://www.yad2.co.il/item/abc123");

        let outcome = RecordBuilder::default().build(&raw).unwrap();
        assert_eq!(outcome.record.model(), UNKNOWN_MODEL);
        assert_eq!(outcome.record.price(), PRICE_NOT_FOUND);
        assert!(outcome.record.is_private_seller());
        assert_eq!(outcome.record.year(), "");
        assert_eq!(outcome.record.image_url(), None);

        let names: Vec<_> = outcome.degraded.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["model", "price", "agency"]);
    }

    #[test]
    fn test_fingerprint_used_without_link() {
        let raw = RawListing::default()
            .with_model("Ford Focus")
            .with_price("45,000 ₪")
            .with_year("2018");

        let outcome = RecordBuilder::default().build(&raw).unwrap();
        assert_eq!(outcome.record.id().source(), IdSource::Fingerprint);
        assert_eq!(outcome.record.link(), "");
        assert!(outcome
            .degraded
            .iter()
            .any(|(name, reason)| *name == "link" && *reason == FieldReason::NotFound));
    }

    #[test]
    fn test_rejects_listing_without_identity() {
        let raw = RawListing::default().with_year("2020");
        assert_eq!(
            RecordBuilder::default().build(&raw).unwrap_err(),
            BuildError::NoIdentity
        );
    }

    #[test]
    fn test_custom_site_base() {
        let builder = RecordBuilder::new("https://mirror.example.com");
        let raw = RawListing::default()
            .with_model("Peugeot 3008")
            .with_link("/item/p3008");
        let outcome = builder.build(&raw).unwrap();
        assert_eq!(outcome.record.link(), "https://mirror.example.com/item/p3008");
    }
}
