use chrono::NaiveDate;
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::DatabaseErrorKind;
use diesel::SqliteConnection;
use thiserror::Error;

use crate::model::{
    DonationLog, GuestUser, NewChatLog, NewDonationLog, NewGuestUser, NewPrayerRecord,
    PrayerRecord,
};
use crate::schema::{chat_logs, donation_logs, prayer_tracker, users};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Failure taxonomy of the persistent store. "Row not found" is not an
/// error anywhere in this contract; queries that may come up empty return
/// `Option`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the query failed outright.
    /// Callers recover via local caches or safe defaults.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A uniqueness constraint rejected the write.
    #[error("duplicate record")]
    Duplicate,
}

fn map_db_err(err: diesel::result::Error) -> StoreError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::Duplicate
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// The persistence contract consumed by the resolver, the prayer protocol,
/// and the chat orchestrator. Constructed once at startup and passed in
/// explicitly; handing out `Arc<dyn GuestStore>` keeps the protocol code
/// testable against an in-memory double.
pub trait GuestStore: Send + Sync {
    /// Creates the guest row if it doesn't exist yet. Idempotent.
    fn ensure_guest(&self, guest_id: &str) -> Result<(), StoreError>;

    fn insert_donation(&self, row: NewDonationLog) -> Result<(), StoreError>;

    /// All donation events for a guest, most recent first.
    fn donations_for_guest(&self, guest_id: &str) -> Result<Vec<DonationLog>, StoreError>;

    /// Sum of all donation points for a guest. Totals are always derived
    /// from the event log; nothing stores a running total.
    fn donation_total_for_guest(&self, guest_id: &str) -> Result<i64, StoreError>;

    fn insert_chat_log(&self, row: NewChatLog) -> Result<(), StoreError>;

    fn chat_count_for_guest(&self, guest_id: &str) -> Result<i64, StoreError>;

    /// Looks up the tracker row for (guest, date). `Ok(None)` is the
    /// expected outcome before the first claim of the day.
    fn find_prayer_record(
        &self,
        guest_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PrayerRecord>, StoreError>;

    /// Inserts the tracker row for a claim. The unique index on
    /// (guest_id, prayer_date) makes this the sole arbiter of the
    /// once-per-day invariant; a duplicate maps to `StoreError::Duplicate`.
    fn insert_prayer_record(&self, row: NewPrayerRecord) -> Result<(), StoreError>;
}

/// Production store over the pooled sqlite database.
pub struct DieselStore {
    pool: DbPool,
}

impl DieselStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>, StoreError>
    {
        self.pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl GuestStore for DieselStore {
    fn ensure_guest(&self, guest_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;

        let existing: Option<GuestUser> = users::table
            .filter(users::id.eq(guest_id))
            .select(GuestUser::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_db_err)?;
        if existing.is_some() {
            return Ok(());
        }

        let result = diesel::insert_into(users::table)
            .values(&NewGuestUser {
                id: guest_id.to_string(),
                created_at: chrono::Utc::now().naive_utc(),
            })
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_db_err);
        match result {
            // Lost a race against another session registering the same
            // guest; the row exists, which is all we wanted.
            Err(StoreError::Duplicate) => Ok(()),
            other => other,
        }
    }

    fn insert_donation(&self, row: NewDonationLog) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(donation_logs::table)
            .values(&row)
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_db_err)
    }

    fn donations_for_guest(&self, guest_id: &str) -> Result<Vec<DonationLog>, StoreError> {
        let mut conn = self.conn()?;
        donation_logs::table
            .filter(donation_logs::guest_id.eq(guest_id))
            .order(donation_logs::created_at.desc())
            .select(DonationLog::as_select())
            .load(&mut conn)
            .map_err(map_db_err)
    }

    fn donation_total_for_guest(&self, guest_id: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        let total: Option<i64> = donation_logs::table
            .filter(donation_logs::guest_id.eq(guest_id))
            .select(sum(donation_logs::point))
            .get_result(&mut conn)
            .map_err(map_db_err)?;
        Ok(total.unwrap_or(0))
    }

    fn insert_chat_log(&self, row: NewChatLog) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(chat_logs::table)
            .values(&row)
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_db_err)
    }

    fn chat_count_for_guest(&self, guest_id: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        chat_logs::table
            .filter(chat_logs::guest_id.eq(guest_id))
            .count()
            .get_result(&mut conn)
            .map_err(map_db_err)
    }

    fn find_prayer_record(
        &self,
        guest_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PrayerRecord>, StoreError> {
        let mut conn = self.conn()?;
        prayer_tracker::table
            .filter(
                prayer_tracker::guest_id
                    .eq(guest_id)
                    .and(prayer_tracker::prayer_date.eq(date)),
            )
            .select(PrayerRecord::as_select())
            .first(&mut conn)
            .optional()
            .map_err(map_db_err)
    }

    fn insert_prayer_record(&self, row: NewPrayerRecord) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::insert_into(prayer_tracker::table)
            .values(&row)
            .execute(&mut conn)
            .map(|_| ())
            .map_err(map_db_err)
    }
}
