pub mod novelty;
pub mod seen_store;

pub use novelty::{filter_new, truncate_batch};
pub use seen_store::{SeenState, SeenStore};
