pub mod feed;

pub use feed::{JsonFeedSource, ListingSource};
