use crate::listing::ListingRecord;

use super::seen_store::SeenState;

/// Caps the acquired batch before novelty filtering, so fewer than `max`
/// listings may end up new.
pub fn truncate_batch<T>(mut records: Vec<T>, max: usize) -> Vec<T> {
    if records.len() > max {
        tracing::debug!("Truncating batch of {} listings to {}", records.len(), max);
        records.truncate(max);
    }
    records
}

/// Returns the listings not yet in `state`, in input order, marking each as
/// seen. A repeated id within the batch keeps only its first occurrence.
pub fn filter_new(state: &mut SeenState, records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let total = records.len();
    let new_records: Vec<ListingRecord> = records
        .into_iter()
        .filter(|record| {
            let fresh = state.mark_seen(record.id().as_str());
            if !fresh {
                tracing::debug!("Already seen: {} ({})", record.id(), record.model());
            }
            fresh
        })
        .collect();

    tracing::info!(
        "🔎 {} of {} listings are new (seen-set now {})",
        new_records.len(),
        total,
        state.len()
    );
    new_records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{RawListing, RecordBuilder};

    fn listing(id: &str, model: &str) -> ListingRecord {
        let raw = RawListing::default()
            .with_model(model)
            .with_price("45,000")
            .with_link(&format!("https://www.yad2.co.il/item/{}?spot=standard", id));
        RecordBuilder::default().build(&raw).unwrap().record
    }

    fn ids(records: &[ListingRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id().as_str()).collect()
    }

    #[test]
    fn test_known_listing_is_dropped() {
        let mut state = SeenState::new();
        state.mark_seen("abc123");

        let batch = vec![listing("abc123", "Peugeot 3008"), listing("xyz789", "Ford Focus")];
        let new_records = filter_new(&mut state, batch);

        assert_eq!(ids(&new_records), vec!["xyz789"]);
        assert_eq!(new_records[0].model(), "Ford Focus");
        assert_eq!(state.ids().collect::<Vec<_>>(), vec!["abc123", "xyz789"]);
    }

    #[test]
    fn test_second_pass_is_empty() {
        let mut state = SeenState::new();
        let batch = vec![listing("a1", "Ford Focus"), listing("b2", "Suzuki Crossover")];

        assert_eq!(filter_new(&mut state, batch.clone()).len(), 2);
        assert!(filter_new(&mut state, batch).is_empty());
    }

    #[test]
    fn test_order_and_in_batch_duplicates() {
        let mut state = SeenState::new();
        let batch = vec![
            listing("c3", "Ford Focus"),
            listing("a1", "Peugeot 3008"),
            listing("c3", "Ford Focus (repost)"),
            listing("b2", "Suzuki Crossover"),
        ];

        let new_records = filter_new(&mut state, batch);
        assert_eq!(ids(&new_records), vec!["c3", "a1", "b2"]);
        assert_eq!(new_records[0].model(), "Ford Focus");
    }

    #[test]
    fn test_truncate_applies_before_filtering() {
        let mut state = SeenState::new();
        state.mark_seen("a1");
        let batch = vec![listing("a1", "x"), listing("b2", "y"), listing("c3", "z")];

        let capped = truncate_batch(batch, 2);
        let new_records = filter_new(&mut state, capped);
        assert_eq!(ids(&new_records), vec!["b2"]);
        assert!(!state.contains("c3"));
    }
}
