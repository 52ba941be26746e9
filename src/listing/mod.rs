pub mod builder;
pub mod identity;
pub mod types;

pub use builder::{BuildError, BuildOutcome, RecordBuilder};
pub use identity::{resolve_id, IdentityFields};
pub use types::{
    FieldReason, FieldValue, IdSource, ListingId, ListingRecord, RawListing, PRIVATE_SELLER,
};
