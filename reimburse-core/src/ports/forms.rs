//! Form response source port
//!
//! The form service exposes paginated responses per campaign. The engine
//! only needs "give me every response in this status group"; pagination,
//! authentication and shape tolerance belong to the adapter.

use chrono::{DateTime, FixedOffset};

use crate::domain::result::{Outcome, Result};
use crate::domain::RawRecord;

/// Which responses to pull for a campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseQuery {
    /// Responses still waiting on approval
    Pending,
    /// Responses completed inside a window
    Archived {
        completed_at_start: DateTime<FixedOffset>,
        completed_at_end: DateTime<FixedOffset>,
    },
}

impl ResponseQuery {
    pub fn status_group(&self) -> &'static str {
        match self {
            ResponseQuery::Pending => "pending",
            ResponseQuery::Archived { .. } => "archived",
        }
    }
}

/// Form response source trait
///
/// `Err` is reserved for failures that must stop the run (bad credentials).
/// Anything else comes back as a degraded outcome carrying whatever pages
/// were collected before the failure.
pub trait FormResponseSource: Send + Sync {
    /// Source name for logs (e.g., "informed")
    fn name(&self) -> &str;

    /// Fetch every response for a campaign
    fn fetch_responses(
        &self,
        campaign_id: u64,
        query: &ResponseQuery,
    ) -> Result<Outcome<Vec<RawRecord>>>;
}
