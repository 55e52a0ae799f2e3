use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use malblock_reputation::{current_verdict, ReputationRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::SharedState;

/// Query parameters for the identity listing.
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    /// Only return identities whose current verdict matches.
    pub blocked: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct IdentityView {
    pub identity: String,
    pub blocked: bool,
    pub requests: BTreeMap<&'static str, u64>,
    pub total_requests: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub idle_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct IdentityList {
    pub total: usize,
    pub identities: Vec<IdentityView>,
}

impl IdentityView {
    fn new(identity: String, record: &ReputationRecord, blocked: bool, now: Instant) -> Self {
        let wall_now = Utc::now();
        let wall = |at: Instant| {
            let ago = now.saturating_duration_since(at);
            chrono::Duration::from_std(ago)
                .ok()
                .and_then(|ago| wall_now.checked_sub_signed(ago))
                .unwrap_or(wall_now)
        };

        Self {
            identity,
            blocked,
            requests: record
                .counts
                .iter()
                .map(|(category, count)| (category.as_label(), count))
                .collect(),
            total_requests: record.total_requests(),
            first_seen: wall(record.first_seen),
            last_seen: wall(record.last_seen),
            idle_secs: record.idle_for(now).as_secs(),
        }
    }
}

/// GET /api/identities
///
/// Lists tracked identities, most recently active first. `?blocked=true`
/// narrows the list to identities that would currently be rejected.
pub async fn list_identities(
    State(state): State<SharedState>,
    Query(params): Query<IdentityQuery>,
) -> Json<IdentityList> {
    let now = Instant::now();
    let policy = state.store.policy();

    let mut identities: Vec<IdentityView> = state
        .store
        .snapshot()
        .into_iter()
        .filter_map(|(identity, record)| {
            let blocked = current_verdict(policy, &record, now);
            match params.blocked {
                Some(wanted) if wanted != blocked => None,
                _ => Some(IdentityView::new(identity, &record, blocked, now)),
            }
        })
        .collect();
    identities.sort_by(|a, b| {
        b.last_seen
            .cmp(&a.last_seen)
            .then_with(|| a.identity.cmp(&b.identity))
    });

    Json(IdentityList {
        total: identities.len(),
        identities,
    })
}

/// GET /api/identities/{identity}
pub async fn get_identity(
    State(state): State<SharedState>,
    Path(identity): Path<String>,
) -> Result<Json<IdentityView>, (StatusCode, Json<Value>)> {
    let now = Instant::now();
    match state.store.get(&identity) {
        Some(record) => {
            let blocked = current_verdict(state.store.policy(), &record, now);
            Ok(Json(IdentityView::new(identity, &record, blocked, now)))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "message": format!("identity {} is not tracked", identity)
            })),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use malblock_common::Category;
    use std::time::Duration;

    /// Drive one identity over the auth-enumeration threshold.
    fn block(state: &SharedState, identity: &str) {
        let t0 = Instant::now() - Duration::from_secs(30);
        for i in 0..5u64 {
            state
                .store
                .observe_at(identity, Category::AuthEnumeration, t0 + Duration::from_secs(i * 5))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_list_and_filter() {
        let state = test_state();
        block(&state, "198.51.100.1");
        state.store.observe("198.51.100.2", Category::Spam).unwrap();

        let Json(all) = list_identities(State(state.clone()), Query(IdentityQuery::default())).await;
        assert_eq!(all.total, 2);

        let Json(blocked) = list_identities(
            State(state.clone()),
            Query(IdentityQuery {
                blocked: Some(true),
            }),
        )
        .await;
        assert_eq!(blocked.total, 1);
        assert_eq!(blocked.identities[0].identity, "198.51.100.1");
        assert_eq!(blocked.identities[0].requests["auth_enumeration"], 5);

        let Json(clean) = list_identities(
            State(state),
            Query(IdentityQuery {
                blocked: Some(false),
            }),
        )
        .await;
        assert_eq!(clean.total, 1);
        assert_eq!(clean.identities[0].identity, "198.51.100.2");
    }

    #[tokio::test]
    async fn test_get_identity() {
        let state = test_state();
        block(&state, "198.51.100.1");

        let Json(view) = get_identity(State(state.clone()), Path("198.51.100.1".to_string()))
            .await
            .unwrap();
        assert!(view.blocked);
        assert_eq!(view.total_requests, 5);
        assert!(view.first_seen <= view.last_seen);

        let (status, _) = get_identity(State(state), Path("192.0.2.1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
