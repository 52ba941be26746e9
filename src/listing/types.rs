use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::fmt;

/// Agency value the site shows for listings posted by a private seller.
pub const PRIVATE_SELLER: &str = "private person";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldReason {
    NotFound,
    Empty,
    Malformed(String),
}

impl fmt::Display for FieldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not_found"),
            Self::Empty => f.write_str("empty"),
            Self::Malformed(detail) => write!(f, "malformed({})", detail),
        }
    }
}

/// Outcome of extracting one field from a listing's markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Present(String),
    Unavailable(FieldReason),
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Unavailable(FieldReason::NotFound)
    }
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::Unavailable(FieldReason::Empty)
        } else {
            Self::Present(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Present(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&FieldReason> {
        match self {
            Self::Present(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldWire {
    Text(String),
    Unavailable { unavailable: String },
}

// Accepts a string, `null`, or `{"unavailable": "<reason>"}`.
impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Option::<FieldWire>::deserialize(deserializer)?;
        Ok(match wire {
            None => Self::Unavailable(FieldReason::NotFound),
            Some(FieldWire::Text(value)) => Self::text(value),
            Some(FieldWire::Unavailable { unavailable }) => {
                Self::Unavailable(match unavailable.as_str() {
                    "not_found" => FieldReason::NotFound,
                    "empty" => FieldReason::Empty,
                    _ => FieldReason::Malformed(unavailable),
                })
            }
        })
    }
}

/// Per-field extraction results for one listing, as handed over by the
/// acquisition layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawListing {
    pub model: FieldValue,
    pub price: FieldValue,
    pub year: FieldValue,
    #[serde(alias = "yad")]
    pub owner_count: FieldValue,
    pub marketing_text: FieldValue,
    pub agency: FieldValue,
    #[serde(alias = "href")]
    pub link: FieldValue,
    pub image_url: FieldValue,
}

impl RawListing {
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = FieldValue::text(model);
        self
    }

    pub fn with_price(mut self, price: &str) -> Self {
        self.price = FieldValue::text(price);
        self
    }

    pub fn with_year(mut self, year: &str) -> Self {
        self.year = FieldValue::text(year);
        self
    }

    pub fn with_owner_count(mut self, owner_count: &str) -> Self {
        self.owner_count = FieldValue::text(owner_count);
        self
    }

    pub fn with_marketing_text(mut self, text: &str) -> Self {
        self.marketing_text = FieldValue::text(text);
        self
    }

    pub fn with_agency(mut self, agency: &str) -> Self {
        self.agency = FieldValue::text(agency);
        self
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = FieldValue::text(link);
        self
    }

    pub fn with_image_url(mut self, image_url: &str) -> Self {
        self.image_url = FieldValue::text(image_url);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    Link,
    Fingerprint,
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Link => "link",
            Self::Fingerprint => "fingerprint",
        })
    }
}

/// Stable key of a listing. Equality and hashing look at the value only.
#[derive(Debug, Clone)]
pub struct ListingId {
    value: String,
    source: IdSource,
}

impl PartialEq for ListingId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for ListingId {}

impl Hash for ListingId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Serialize for ListingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl ListingId {
    pub fn new(value: impl Into<String>, source: IdSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> IdSource {
        self.source
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// One observed vehicle listing. Built by `RecordBuilder`, read-only after.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    id: ListingId,
    title: String,
    model: String,
    price: String,
    year: String,
    owner_count: String,
    marketing_text: String,
    agency: String,
    link: String,
    image_url: Option<String>,
    found_at: DateTime<Utc>,
}

impl ListingRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ListingId,
        model: String,
        price: String,
        year: String,
        owner_count: String,
        marketing_text: String,
        agency: String,
        link: String,
        image_url: Option<String>,
        found_at: DateTime<Utc>,
    ) -> Self {
        let title = compose_title(&model, &year, &owner_count, &marketing_text);
        Self {
            id,
            title,
            model,
            price,
            year,
            owner_count,
            marketing_text,
            agency,
            link,
            image_url,
            found_at,
        }
    }

    pub fn id(&self) -> &ListingId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn price(&self) -> &str {
        &self.price
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn owner_count(&self) -> &str {
        &self.owner_count
    }

    pub fn marketing_text(&self) -> &str {
        &self.marketing_text
    }

    pub fn agency(&self) -> &str {
        &self.agency
    }

    pub fn is_private_seller(&self) -> bool {
        self.agency == PRIVATE_SELLER
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn found_at(&self) -> DateTime<Utc> {
        self.found_at
    }
}

const MAX_TITLE_MARKETING_CHARS: usize = 80;

fn compose_title(model: &str, year: &str, owner_count: &str, marketing_text: &str) -> String {
    let mut parts = vec![model, year, owner_count];
    if marketing_text.chars().count() < MAX_TITLE_MARKETING_CHARS {
        parts.push(marketing_text);
    }
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" - ")
}
