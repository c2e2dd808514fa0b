//! The daily prayer protocol: once per guest per calendar day, a fixed
//! bonus. The store's unique (guest_id, prayer_date) index is the only
//! correctness guarantee; the local cache is advisory and exists so a guest
//! with an unreachable store still gets an answer instead of an error.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::model::{NewDonationLog, NewPrayerRecord, EVENT_DAILY_PRAYER_BONUS};
use crate::store::GuestStore;

/// Bonus awarded for the daily ritual. One constant for every guest and
/// every day; no scaling, no streaks.
pub const DAILY_PRAYER_BONUS: i32 = 10;

/// Today's calendar date in UTC, day granularity.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPrayerStatus {
    pub has_prayed_today: bool,
    pub bonus_points: i32,
    pub last_prayer_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClaimOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            total_points: None,
            error: Some(error.into()),
        }
    }
}

/// Local cache of claim state plus the session-scoped prompt marker, keyed
/// by (guest, date) so one day never leaks into another. Lives for the
/// process lifetime; it provides no cross-process exclusion.
#[derive(Default)]
pub struct PrayerCache {
    claimed: Mutex<HashSet<(String, NaiveDate)>>,
    prompted: Mutex<HashSet<(String, NaiveDate)>>,
}

impl PrayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_claimed(&self, guest_id: &str, date: NaiveDate) {
        self.claimed
            .lock()
            .unwrap()
            .insert((guest_id.to_string(), date));
    }

    pub fn has_claimed(&self, guest_id: &str, date: NaiveDate) -> bool {
        self.claimed
            .lock()
            .unwrap()
            .contains(&(guest_id.to_string(), date))
    }

    /// True the first time it is asked for a given (guest, date) in this
    /// process, false afterwards. Gates re-prompting only; eligibility is
    /// always decided by `check_status`.
    pub fn first_prompt_today(&self, guest_id: &str, date: NaiveDate) -> bool {
        self.prompted
            .lock()
            .unwrap()
            .insert((guest_id.to_string(), date))
    }
}

/// Reports whether the guest has already completed today's ritual. Never
/// fails: an unreachable store falls back to the local cache, and an empty
/// cache defaults to not-yet-prayed so the guest is allowed to attempt a
/// claim (the insert's unique index catches a stale answer).
pub fn check_status(
    store: &dyn GuestStore,
    cache: &PrayerCache,
    guest_id: &str,
    today: NaiveDate,
) -> DailyPrayerStatus {
    match store.find_prayer_record(guest_id, today) {
        Ok(record) => {
            let has_prayed = record
                .as_ref()
                .map(|r| r.completed_at.is_some())
                .unwrap_or(false);
            if has_prayed {
                // Write-through on read, so the cache can answer if the
                // store goes away later today.
                cache.mark_claimed(guest_id, today);
            }
            DailyPrayerStatus {
                has_prayed_today: has_prayed,
                bonus_points: DAILY_PRAYER_BONUS,
                last_prayer_date: record.map(|r| r.prayer_date),
            }
        }
        Err(err) => {
            tracing::warn!(guest_id, %err, "prayer status lookup failed, using local cache");
            DailyPrayerStatus {
                has_prayed_today: cache.has_claimed(guest_id, today),
                bonus_points: DAILY_PRAYER_BONUS,
                last_prayer_date: None,
            }
        }
    }
}

/// Records today's ritual. The tracker insert is the durability boundary:
/// once it succeeds the claim is complete, and a duplicate (guest, date)
/// pair is rejected by the store and reported as a failed claim. The bonus
/// ledger entry is best-effort and the shrine on it is informational only.
pub fn complete_claim(
    store: &dyn GuestStore,
    cache: &PrayerCache,
    guest_id: &str,
    shrine_id: i32,
    today: NaiveDate,
) -> ClaimOutcome {
    let now = Utc::now().naive_utc();

    if let Err(err) = store.insert_prayer_record(NewPrayerRecord {
        guest_id: guest_id.to_string(),
        prayer_date: today,
        bonus_points: DAILY_PRAYER_BONUS,
        completed_at: Some(now),
        created_at: now,
    }) {
        tracing::warn!(guest_id, %today, %err, "daily prayer claim rejected");
        return ClaimOutcome::failed(err.to_string());
    }

    if let Err(err) = store.insert_donation(NewDonationLog {
        guest_id: guest_id.to_string(),
        shrine_id,
        point: DAILY_PRAYER_BONUS,
        event_type: EVENT_DAILY_PRAYER_BONUS.to_string(),
        created_at: now,
    }) {
        // The ritual already counts; the bonus just won't show up in the
        // donation ledger.
        tracing::warn!(guest_id, %err, "bonus ledger write failed after claim");
    }

    cache.mark_claimed(guest_id, today);

    ClaimOutcome {
        success: true,
        total_points: Some(DAILY_PRAYER_BONUS),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date literal")
    }

    #[test]
    fn test_claim_then_duplicate_claim() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        let first = complete_claim(&store, &cache, "g1", 1, today);
        assert!(first.success);
        assert_eq!(first.total_points, Some(10));

        // Same guest, same day, any shrine: the unique constraint rejects
        // the second tracker insert.
        let second = complete_claim(&store, &cache, "g1", 3, today);
        assert!(!second.success);
        assert!(second.error.is_some());

        // Exactly one bonus made it into the ledger.
        let bonuses = store
            .donation_rows()
            .iter()
            .filter(|d| d.event_type == EVENT_DAILY_PRAYER_BONUS)
            .count();
        assert_eq!(bonuses, 1);
    }

    #[test]
    fn test_status_flips_after_claim() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        let before = check_status(&store, &cache, "g1", today);
        assert!(!before.has_prayed_today);
        assert_eq!(before.bonus_points, DAILY_PRAYER_BONUS);
        assert_eq!(before.last_prayer_date, None);

        assert!(complete_claim(&store, &cache, "g1", 1, today).success);

        let after = check_status(&store, &cache, "g1", today);
        assert!(after.has_prayed_today);
        assert_eq!(after.bonus_points, DAILY_PRAYER_BONUS);
        assert_eq!(after.last_prayer_date, Some(today));
    }

    #[test]
    fn test_no_cross_day_leakage() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();

        assert!(complete_claim(&store, &cache, "g1", 1, date("2024-01-01")).success);

        let next_day = check_status(&store, &cache, "g1", date("2024-01-02"));
        assert!(!next_day.has_prayed_today);

        // And the next day can be claimed on its own.
        assert!(complete_claim(&store, &cache, "g1", 1, date("2024-01-02")).success);
    }

    #[test]
    fn test_status_falls_back_to_cache_when_store_is_down() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        // Nothing cached, store down: default to not-yet-prayed.
        store.set_fail_reads(true);
        let cold = check_status(&store, &cache, "g1", today);
        assert!(!cold.has_prayed_today);

        // A claim while the store is reachable warms the cache.
        store.set_fail_reads(false);
        assert!(complete_claim(&store, &cache, "g1", 1, today).success);
        store.set_fail_reads(true);

        let cached = check_status(&store, &cache, "g1", today);
        assert!(cached.has_prayed_today);

        // The cache entry is keyed by date; another day still reads false.
        let other_day = check_status(&store, &cache, "g1", date("2024-01-02"));
        assert!(!other_day.has_prayed_today);
    }

    #[test]
    fn test_status_read_warms_cache() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        // Claimed through a different session: cache here knows nothing.
        let other_cache = PrayerCache::new();
        assert!(complete_claim(&store, &other_cache, "g1", 1, today).success);
        assert!(!cache.has_claimed("g1", today));

        // One successful status read writes the completion through.
        assert!(check_status(&store, &cache, "g1", today).has_prayed_today);

        store.set_fail_reads(true);
        assert!(check_status(&store, &cache, "g1", today).has_prayed_today);
    }

    #[test]
    fn test_claim_survives_ledger_failure() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        store.set_fail_donations(true);
        let outcome = complete_claim(&store, &cache, "g1", 1, today);

        // The tracker row is the claim; the ledger entry is best-effort.
        assert!(outcome.success);
        assert_eq!(outcome.total_points, Some(DAILY_PRAYER_BONUS));
        assert!(store.donation_rows().is_empty());
        assert!(cache.has_claimed("g1", today));
        assert!(check_status(&store, &cache, "g1", today).has_prayed_today);
    }

    #[test]
    fn test_claim_fails_when_tracker_write_fails() {
        let store = MemoryStore::new();
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        store.set_fail_writes(true);
        let outcome = complete_claim(&store, &cache, "g1", 1, today);

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        // Nothing after the failed durability boundary runs.
        assert!(!cache.has_claimed("g1", today));
    }

    #[test]
    fn test_concurrent_claims_yield_one_success() {
        let store = Arc::new(MemoryStore::new());
        let today = date("2024-01-01");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    // Separate sessions: each has its own local cache.
                    let cache = PrayerCache::new();
                    complete_claim(store.as_ref(), &cache, "g1", 1, today).success
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .filter(|&success| success)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_prompt_marker_is_session_scoped() {
        let cache = PrayerCache::new();
        let today = date("2024-01-01");

        assert!(cache.first_prompt_today("g1", today));
        assert!(!cache.first_prompt_today("g1", today));

        // Independent per guest and per day.
        assert!(cache.first_prompt_today("g2", today));
        assert!(cache.first_prompt_today("g1", date("2024-01-02")));

        // A fresh session prompts again.
        let next_session = PrayerCache::new();
        assert!(next_session.first_prompt_today("g1", today));
    }
}
