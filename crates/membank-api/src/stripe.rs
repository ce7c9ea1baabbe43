//! Stripe webhook receiver.
//!
//! Deliveries are verified (when a secret is configured), deduplicated by
//! event id and tallied by type. Nothing is forwarded anywhere; the ledger
//! only lives as long as the server process.

use crate::server::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (either direction) of a signed timestamp.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Header carrying `t=<unix secs>,v1=<hex signature>`.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// How long a processed event id is remembered. Stripe retries a failed
/// delivery for up to three days.
pub const DEDUP_WINDOW_SECS: i64 = 3 * 24 * 3600;

/// Upper bound on remembered event ids.
pub const MAX_TRACKED_EVENTS: usize = 10_000;

/// Monitor operation name for webhook deliveries.
const WEBHOOK_OPERATION: &str = "stripe.webhook";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    Missing,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("timestamp outside the {SIGNATURE_TOLERANCE_SECS}s tolerance")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

/// HMAC-SHA256 of `"<timestamp>.<body>"`, hex encoded.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a `Stripe-Signature` header value against `body` at time `now`.
///
/// Any of several `v1` entries may match.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }
    let expected = sign_payload(secret, timestamp, body);
    let matched = signatures
        .iter()
        .any(|sig| bool::from(subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), sig.as_bytes())));
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// The fields of a Stripe event the ledger needs.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
}

/// Deliveries counted by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StripeCounters {
    pub payments_succeeded: u64,
    pub payments_failed: u64,
    pub subscriptions_created: u64,
    pub subscriptions_updated: u64,
    pub subscriptions_deleted: u64,
    pub invoices_paid: u64,
    pub invoices_failed: u64,
    pub ignored: u64,
}

impl StripeCounters {
    fn count(&mut self, event_type: &str) {
        let slot = match event_type {
            "payment_intent.succeeded" | "charge.succeeded" => &mut self.payments_succeeded,
            "payment_intent.payment_failed" | "charge.failed" => &mut self.payments_failed,
            "customer.subscription.created" => &mut self.subscriptions_created,
            "customer.subscription.updated" => &mut self.subscriptions_updated,
            "customer.subscription.deleted" => &mut self.subscriptions_deleted,
            "invoice.paid" | "invoice.payment_succeeded" => &mut self.invoices_paid,
            "invoice.payment_failed" => &mut self.invoices_failed,
            _ => &mut self.ignored,
        };
        *slot += 1;
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    counters: StripeCounters,
    events_processed: u64,
    last_event_at: Option<DateTime<Utc>>,
}

/// In-memory record of processed webhook events.
///
/// Event ids are remembered for [`DEDUP_WINDOW_SECS`], and at most
/// [`MAX_TRACKED_EVENTS`] of them are kept; the oldest go first.
#[derive(Debug)]
pub struct StripeLedger {
    seen: DashMap<String, DateTime<Utc>>,
    state: Mutex<LedgerState>,
    window: Duration,
    capacity: usize,
}

impl Default for StripeLedger {
    fn default() -> Self {
        Self::with_limits(Duration::seconds(DEDUP_WINDOW_SECS), MAX_TRACKED_EVENTS)
    }
}

impl StripeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(window: Duration, capacity: usize) -> Self {
        Self {
            seen: DashMap::new(),
            state: Mutex::new(LedgerState::default()),
            window,
            capacity: capacity.max(1),
        }
    }

    /// Event ids currently remembered for deduplication.
    pub fn tracked_events(&self) -> usize {
        self.seen.len()
    }

    /// Count `event`. Returns `false` for an id seen within the window.
    pub fn apply(&self, event: &StripeEvent, now: DateTime<Utc>) -> bool {
        match self.seen.entry(event.id.clone()) {
            Entry::Occupied(mut seen) => {
                if now - *seen.get() < self.window {
                    return false;
                }
                seen.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        self.evict(now);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.counters.count(&event.event_type);
        state.events_processed += 1;
        state.last_event_at = Some(now);
        true
    }

    fn evict(&self, now: DateTime<Utc>) {
        if self.seen.len() <= self.capacity {
            return;
        }
        self.seen.retain(|_, at| now - *at < self.window);
        let excess = self.seen.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }
        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .seen
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);
        for (id, _) in by_age.into_iter().take(excess) {
            self.seen.remove(&id);
        }
    }

    pub fn counters(&self) -> StripeCounters {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .counters
            .clone()
    }

    pub fn events_processed(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).events_processed
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).last_event_at
    }
}

fn bad_request(message: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message.to_string()})),
    )
}

fn receive(state: &AppState, headers: &HeaderMap, body: &[u8]) -> (StatusCode, Json<serde_json::Value>) {
    if let Some(secret) = state.membank.config().api.stripe_webhook_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(SignatureError::Missing)
            .and_then(|h| verify_signature(secret, h, body, Utc::now().timestamp()));
        if let Err(e) = header {
            warn!(error = %e, "Rejected Stripe webhook");
            return bad_request(e);
        }
    }

    let event: StripeEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Malformed Stripe event");
            return bad_request(format!("malformed event: {e}"));
        }
    };

    if !state.stripe.apply(&event, Utc::now()) {
        debug!(id = %event.id, "Duplicate Stripe event");
        return (
            StatusCode::OK,
            Json(serde_json::json!({"received": true, "duplicate": true})),
        );
    }
    info!(id = %event.id, event_type = %event.event_type, "Stripe event processed");
    (StatusCode::OK, Json(serde_json::json!({"received": true})))
}

/// POST /api/stripe/webhook
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let start = Instant::now();
    let response = receive(&state, &headers, &body);
    let elapsed = start.elapsed().as_millis() as u64;
    if let Err(e) = state
        .membank
        .monitor()
        .record(WEBHOOK_OPERATION, elapsed, response.0.is_success())
    {
        warn!(error = %e, "Failed to record webhook metric");
    }
    response
}

/// GET /api/stripe/health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "events_processed": state.stripe.events_processed(),
        "last_event_at": state.stripe.last_event_at(),
    }))
}

/// GET /api/stripe/metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stripe.counters())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip_and_tolerance() {
        let body = br#"{"id":"evt_1","type":"invoice.paid"}"#;
        let sig = sign_payload("whsec", 1_700_000_000, body);
        let header = format!("t=1700000000,v1={sig}");
        assert_eq!(verify_signature("whsec", &header, body, 1_700_000_100), Ok(()));
        assert_eq!(
            verify_signature("whsec", &header, body, 1_700_000_301),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature("other", &header, body, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("whsec", "v1=abc", body, 0),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = b"{}";
        let sig = sign_payload("whsec", 10, body);
        let header = format!("t=10, v1=deadbeef, v1={sig}");
        assert!(verify_signature("whsec", &header, body, 10).is_ok());
    }

    #[test]
    fn test_ledger_dedup_and_counts() {
        let ledger = StripeLedger::new();
        let now = Utc::now();
        let event = |id: &str, ty: &str| StripeEvent {
            id: id.to_string(),
            event_type: ty.to_string(),
        };
        assert!(ledger.apply(&event("evt_1", "payment_intent.succeeded"), now));
        assert!(!ledger.apply(&event("evt_1", "payment_intent.succeeded"), now));
        assert!(ledger.apply(&event("evt_2", "customer.subscription.deleted"), now));
        assert!(ledger.apply(&event("evt_3", "customer.created"), now));

        let counters = ledger.counters();
        assert_eq!(counters.payments_succeeded, 1);
        assert_eq!(counters.subscriptions_deleted, 1);
        assert_eq!(counters.ignored, 1);
        assert_eq!(ledger.events_processed(), 3);
        assert_eq!(ledger.last_event_at(), Some(now));
    }

    #[test]
    fn test_ledger_forgets_old_event_ids() {
        let ledger = StripeLedger::with_limits(Duration::seconds(60), 3);
        let start = Utc::now();
        let event = |id: &str| StripeEvent {
            id: id.to_string(),
            event_type: "invoice.paid".to_string(),
        };
        for (i, id) in ["evt_1", "evt_2", "evt_3", "evt_4"].iter().enumerate() {
            assert!(ledger.apply(&event(id), start + Duration::seconds(i as i64)));
        }
        // Over capacity: the oldest id was dropped, the rest still dedupe.
        assert_eq!(ledger.tracked_events(), 3);
        assert!(!ledger.apply(&event("evt_4"), start + Duration::seconds(5)));
        assert!(ledger.apply(&event("evt_1"), start + Duration::seconds(5)));

        // Past the window an id is accepted again.
        let later = start + Duration::seconds(120);
        assert!(ledger.apply(&event("evt_4"), later));
        assert!(ledger.tracked_events() <= 3);
        assert_eq!(ledger.events_processed(), 6);
    }
}
