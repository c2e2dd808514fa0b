use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

/// Donation event kind for an ordinary donation.
pub const EVENT_PRAYER: &str = "prayer";
/// Donation event kind for the once-daily ritual reward.
pub const EVENT_DAILY_PRAYER_BONUS: &str = "daily_prayer_bonus";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
pub struct GuestUser {
    pub id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct NewGuestUser {
    pub id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::donation_logs)]
#[diesel(check_for_backend(Sqlite))]
pub struct DonationLog {
    pub id: i32,
    pub guest_id: String,
    pub shrine_id: i32,
    pub point: i32,
    pub event_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::donation_logs)]
pub struct NewDonationLog {
    pub guest_id: String,
    pub shrine_id: i32,
    pub point: i32,
    pub event_type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::chat_logs)]
pub struct ChatLog {
    pub id: i32,
    pub guest_id: String,
    pub oshigami_id: i32,
    pub user_message: String,
    pub ai_reply: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::chat_logs)]
pub struct NewChatLog {
    pub guest_id: String,
    pub oshigami_id: i32,
    pub user_message: String,
    pub ai_reply: String,
    pub created_at: NaiveDateTime,
}

/// One row per (guest, calendar day). `completed_at` is set at claim time;
/// the unique index on (guest_id, prayer_date) is what makes the ritual
/// once-per-day.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::prayer_tracker)]
pub struct PrayerRecord {
    pub id: i32,
    pub guest_id: String,
    pub prayer_date: NaiveDate,
    pub bonus_points: i32,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::prayer_tracker)]
pub struct NewPrayerRecord {
    pub guest_id: String,
    pub prayer_date: NaiveDate,
    pub bonus_points: i32,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}
