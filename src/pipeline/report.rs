use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::notify::ChannelKind;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Listings delivered by the source.
    pub acquired: usize,
    /// Listings left after the per-check cap.
    pub considered: usize,
    /// Listings dropped because no identity could be derived.
    pub rejected: usize,
    pub new_ids: Vec<String>,
    pub notified: Vec<ChannelKind>,
    #[serde(skip)]
    pub failed: Vec<(ChannelKind, String)>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            acquired: 0,
            considered: 0,
            rejected: 0,
            new_ids: Vec::new(),
            notified: Vec::new(),
            failed: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "acquired {}, considered {}, rejected {}, new {}",
            self.acquired,
            self.considered,
            self.rejected,
            self.new_ids.len()
        );
        if !self.notified.is_empty() {
            let channels: Vec<String> = self.notified.iter().map(|c| c.to_string()).collect();
            summary.push_str(&format!(", notified via {}", channels.join("+")));
        }
        if self.has_failures() {
            let failed: Vec<String> = self.failed.iter().map(|(c, _)| c.to_string()).collect();
            summary.push_str(&format!(", failed: {}", failed.join("+")));
        }
        summary
    }
}
