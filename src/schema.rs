// Hand-maintained to match the tables created by `init_schema` in lib.rs.

diesel::table! {
    users (id) {
        id -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    donation_logs (id) {
        id -> Integer,
        guest_id -> Text,
        shrine_id -> Integer,
        point -> Integer,
        event_type -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    chat_logs (id) {
        id -> Integer,
        guest_id -> Text,
        oshigami_id -> Integer,
        user_message -> Text,
        ai_reply -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    prayer_tracker (id) {
        id -> Integer,
        guest_id -> Text,
        prayer_date -> Date,
        bonus_points -> Integer,
        completed_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(users, donation_logs, chat_logs, prayer_tracker,);
