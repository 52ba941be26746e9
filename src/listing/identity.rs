use sha2::{Digest, Sha256};

use super::types::{IdSource, ListingId};

/// Path segment that precedes the per-listing key in canonical item URLs,
/// e.g. `https://www.yad2.co.il/item/kdqeegdr?opened-from=feed`.
pub const ITEM_SEGMENT: &str = "item/";

const FINGERPRINT_HEX_LEN: usize = 8;

/// Displayed fields used when a listing has no usable link.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFields<'a> {
    pub link: &'a str,
    pub model: &'a str,
    pub price: &'a str,
    pub year: &'a str,
    pub owner_count: &'a str,
    pub marketing_text: &'a str,
    pub agency: &'a str,
}

pub fn resolve_id(fields: &IdentityFields<'_>) -> ListingId {
    match id_from_link(fields.link) {
        Some(id) => ListingId::new(id, IdSource::Link),
        None => ListingId::new(fingerprint(fields), IdSource::Fingerprint),
    }
}

/// Item key from the last `item/` segment, without query string or fragment.
pub fn id_from_link(link: &str) -> Option<String> {
    let start = link.rfind(ITEM_SEGMENT)? + ITEM_SEGMENT.len();
    let tail = &link[start..];
    let end = tail
        .find(|c| matches!(c, '?' | '#' | '/'))
        .unwrap_or(tail.len());
    let id = &tail[..end];

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Not unique: two listings with identical displayed fields collide.
pub fn fingerprint(fields: &IdentityFields<'_>) -> String {
    let content = [
        fields.model,
        fields.price,
        fields.year,
        fields.owner_count,
        fields.marketing_text,
        fields.agency,
    ]
    .join("_");

    let digest = Sha256::digest(content.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
