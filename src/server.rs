//! Thin HTTP surface over the components. Every handler resolves the guest
//! from the durable `guest_id` cookie, minting one when absent, and pushes
//! blocking database work through `spawn_blocking`. Degraded outcomes are
//! reported in the response body; no failure here maps to an HTTP error.

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::chat::{self, ChatEngine};
use crate::config::AppConfig;
use crate::identity::GuestResolver;
use crate::model::{NewDonationLog, EVENT_PRAYER};
use crate::personas::{self, OSHIGAMI, SHRINES};
use crate::prayer::{self, PrayerCache};
use crate::stats::{self, DashboardStats};
use crate::store::{DbPool, DieselStore, GuestStore};

const GUEST_COOKIE: &str = "guest_id";

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn GuestStore>,
    resolver: Arc<GuestResolver>,
    cache: Arc<PrayerCache>,
    chat: Arc<ChatEngine>,
}

impl AppState {
    pub fn new(pool: DbPool, config: &AppConfig) -> Self {
        Self::with_store(Arc::new(DieselStore::new(pool)), config)
    }

    pub fn with_store(store: Arc<dyn GuestStore>, config: &AppConfig) -> Self {
        Self {
            resolver: Arc::new(GuestResolver::new(Arc::clone(&store))),
            cache: Arc::new(PrayerCache::new()),
            chat: Arc::new(ChatEngine::new(config.ai.clone())),
            store,
        }
    }
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/guest", get(get_guest))
        .route("/api/oshigami", get(list_oshigami))
        .route("/api/shrines", get(list_shrines))
        .route("/api/prayer/status", get(prayer_status))
        .route("/api/prayer/complete", post(complete_prayer))
        .route("/api/donations", post(donate))
        .route("/api/chat", post(chat_message))
        .route("/api/dashboard", get(dashboard))
        .with_state(state)
}

fn guest_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix("guest_id=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

async fn resolve_guest(state: &AppState, headers: &HeaderMap) -> String {
    let existing = guest_id_from_headers(headers);
    let resolver = Arc::clone(&state.resolver);
    match tokio::task::spawn_blocking(move || resolver.resolve(existing.as_deref())).await {
        Ok(guest_id) => guest_id,
        Err(err) => {
            tracing::warn!(%err, "identity task failed, minting an unregistered id");
            Uuid::new_v4().to_string()
        }
    }
}

/// Re-issues the durable cookie on every response so the identifier
/// outlives browser sessions.
fn json_with_guest_cookie<T: Serialize>(guest_id: &str, body: T) -> Response {
    let cookie = format!(
        "{}={}; Max-Age=31536000; Path=/; SameSite=Lax",
        GUEST_COOKIE, guest_id
    );
    let mut response = Json(body).into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

#[derive(Serialize)]
struct GuestBody {
    guest_id: String,
    total_points: i64,
}

async fn get_guest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let guest_id = resolve_guest(&state, &headers).await;

    let store = Arc::clone(&state.store);
    let guest = guest_id.clone();
    let total_points = tokio::task::spawn_blocking(move || store.donation_total_for_guest(&guest))
        .await
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "points task failed");
            Ok(0)
        })
        .unwrap_or_else(|err| {
            tracing::warn!(%guest_id, %err, "points lookup failed, showing zero");
            0
        });

    json_with_guest_cookie(
        &guest_id,
        GuestBody {
            guest_id: guest_id.clone(),
            total_points,
        },
    )
}

async fn list_oshigami() -> Json<&'static [personas::Oshigami]> {
    Json(OSHIGAMI)
}

async fn list_shrines() -> Json<&'static [personas::Shrine]> {
    Json(SHRINES)
}

#[derive(Serialize)]
struct PrayerStatusBody {
    has_prayed_today: bool,
    bonus_points: i32,
    last_prayer_date: Option<NaiveDate>,
    /// Whether this is the first status check of the session for today,
    /// i.e. whether a prompt should be shown at all. Gates re-prompting
    /// only; `has_prayed_today` is the eligibility answer.
    show_prompt: bool,
}

async fn prayer_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let guest_id = resolve_guest(&state, &headers).await;
    let today = prayer::today_utc();

    let store = Arc::clone(&state.store);
    let cache = Arc::clone(&state.cache);
    let guest = guest_id.clone();
    let status = tokio::task::spawn_blocking(move || {
        prayer::check_status(store.as_ref(), &cache, &guest, today)
    })
    .await
    .unwrap_or_else(|err| {
        tracing::warn!(%err, "prayer status task failed, defaulting to not prayed");
        prayer::DailyPrayerStatus {
            has_prayed_today: false,
            bonus_points: prayer::DAILY_PRAYER_BONUS,
            last_prayer_date: None,
        }
    });

    let first_prompt = state.cache.first_prompt_today(&guest_id, today);
    json_with_guest_cookie(
        &guest_id,
        PrayerStatusBody {
            show_prompt: first_prompt && !status.has_prayed_today,
            has_prayed_today: status.has_prayed_today,
            bonus_points: status.bonus_points,
            last_prayer_date: status.last_prayer_date,
        },
    )
}

#[derive(Deserialize)]
struct CompletePrayerRequest {
    shrine_id: i32,
}

async fn complete_prayer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompletePrayerRequest>,
) -> Response {
    let guest_id = resolve_guest(&state, &headers).await;
    let today = prayer::today_utc();

    let store = Arc::clone(&state.store);
    let cache = Arc::clone(&state.cache);
    let guest = guest_id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        prayer::complete_claim(store.as_ref(), &cache, &guest, request.shrine_id, today)
    })
    .await
    .unwrap_or_else(|err| {
        tracing::warn!(%err, "claim task failed");
        prayer::ClaimOutcome {
            success: false,
            total_points: None,
            error: Some("claim could not be processed".to_string()),
        }
    });

    json_with_guest_cookie(&guest_id, outcome)
}

#[derive(Deserialize)]
struct DonationRequest {
    shrine_id: i32,
    point: i32,
}

#[derive(Serialize)]
struct DonationBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DonationBody {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            total_points: None,
            error: Some(error.into()),
        }
    }
}

async fn donate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DonationRequest>,
) -> Response {
    let guest_id = resolve_guest(&state, &headers).await;

    if request.point < 1 {
        return json_with_guest_cookie(
            &guest_id,
            DonationBody::failed("point must be a positive integer"),
        );
    }
    if personas::shrine_by_id(request.shrine_id).is_none() {
        return json_with_guest_cookie(&guest_id, DonationBody::failed("unknown shrine"));
    }

    let store = Arc::clone(&state.store);
    let guest = guest_id.clone();
    let body = tokio::task::spawn_blocking(move || {
        let row = NewDonationLog {
            guest_id: guest.clone(),
            shrine_id: request.shrine_id,
            point: request.point,
            event_type: EVENT_PRAYER.to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        if let Err(err) = store.insert_donation(row) {
            tracing::warn!(guest_id = %guest, %err, "donation insert failed");
            return DonationBody::failed("donation could not be recorded, please retry");
        }
        let total_points = match store.donation_total_for_guest(&guest) {
            Ok(total) => Some(total),
            Err(err) => {
                tracing::warn!(guest_id = %guest, %err, "points lookup failed after donation");
                None
            }
        };
        DonationBody {
            success: true,
            total_points,
            error: None,
        }
    })
    .await
    .unwrap_or_else(|err| {
        tracing::warn!(%err, "donation task failed");
        DonationBody::failed("donation could not be recorded, please retry")
    });

    json_with_guest_cookie(&guest_id, body)
}

#[derive(Deserialize)]
struct ChatRequest {
    oshigami_id: i32,
    message: String,
}

#[derive(Serialize)]
struct ChatErrorBody {
    error: String,
}

async fn chat_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let guest_id = resolve_guest(&state, &headers).await;

    let message = request.message.trim();
    if message.is_empty() {
        return json_with_guest_cookie(
            &guest_id,
            ChatErrorBody {
                error: "message must not be empty".to_string(),
            },
        );
    }

    let reply = chat::chat_with_oshigami(
        &state.chat,
        Arc::clone(&state.store),
        &guest_id,
        request.oshigami_id,
        message,
    )
    .await;

    json_with_guest_cookie(&guest_id, reply)
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let guest_id = resolve_guest(&state, &headers).await;

    let store = Arc::clone(&state.store);
    let guest = guest_id.clone();
    let body = tokio::task::spawn_blocking(move || -> DashboardStats {
        let donations = match store.donations_for_guest(&guest) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(guest_id = %guest, %err, "donation history unavailable");
                Vec::new()
            }
        };
        let chat_count = match store.chat_count_for_guest(&guest) {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(guest_id = %guest, %err, "chat count unavailable");
                0
            }
        };
        stats::summarize(&donations, chat_count)
    })
    .await
    .unwrap_or_else(|err| {
        tracing::warn!(%err, "dashboard task failed");
        stats::summarize(&[], 0)
    });

    json_with_guest_cookie(&guest_id, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_guest_cookie_parsing() {
        let headers = headers_with_cookie("theme=dark; guest_id=abc-123; lang=en");
        assert_eq!(guest_id_from_headers(&headers).as_deref(), Some("abc-123"));

        let headers = headers_with_cookie("theme=dark");
        assert_eq!(guest_id_from_headers(&headers), None);

        // An empty value reads as absent so a fresh id gets minted.
        let headers = headers_with_cookie("guest_id=");
        assert_eq!(guest_id_from_headers(&headers), None);

        assert_eq!(guest_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_guest_cookie_is_durable() {
        let response = json_with_guest_cookie("abc-123", serde_json::json!({"ok": true}));
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("cookie header")
            .to_str()
            .expect("ascii cookie");
        assert!(cookie.starts_with("guest_id=abc-123"));
        assert!(cookie.contains("Max-Age=31536000"));
    }
}
