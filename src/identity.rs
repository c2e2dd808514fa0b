use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::store::GuestStore;

/// Resolves the stable anonymous identifier for a session. The identifier
/// itself is client-held (the HTTP layer keeps it in a durable cookie);
/// this type owns the best-effort remote registration that backs it.
pub struct GuestResolver {
    store: Arc<dyn GuestStore>,
    verified: Mutex<HashSet<String>>,
}

impl GuestResolver {
    pub fn new(store: Arc<dyn GuestStore>) -> Self {
        Self {
            store,
            verified: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the guest identifier for this session, generating a fresh
    /// one when none was presented. Registration failures are logged and
    /// swallowed: the locally-held identifier is always returned, so an
    /// unavailable store never blocks the guest. A verified set keeps the
    /// remote write to at most one successful attempt per cold start per
    /// guest; after a failure the next call simply retries (the write is
    /// idempotent).
    pub fn resolve(&self, existing: Option<&str>) -> String {
        let guest_id = match existing {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        if self.verified.lock().unwrap().contains(&guest_id) {
            return guest_id;
        }

        match self.store.ensure_guest(&guest_id) {
            Ok(()) => {
                self.verified.lock().unwrap().insert(guest_id.clone());
            }
            Err(err) => {
                tracing::warn!(%guest_id, %err, "guest registration failed, continuing locally");
            }
        }

        guest_id
    }
}
