//! Dashboard aggregation. Everything here is a view derived from the
//! append-only logs; nothing is authoritative state.

use serde::Serialize;
use std::collections::HashMap;

use crate::model::DonationLog;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_points: i64,
    pub donation_count: usize,
    pub chat_count: i64,
    pub preferred_shrine: Option<i32>,
}

/// The shrine this guest has donated to most often. Ties break toward the
/// smaller shrine id so the result is stable across runs.
pub fn preferred_shrine(donations: &[DonationLog]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for donation in donations {
        *counts.entry(donation.shrine_id).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(shrine_id, _)| shrine_id)
}

pub fn summarize(donations: &[DonationLog], chat_count: i64) -> DashboardStats {
    DashboardStats {
        total_points: donations.iter().map(|d| d.point as i64).sum(),
        donation_count: donations.len(),
        chat_count,
        preferred_shrine: preferred_shrine(donations),
    }
}
