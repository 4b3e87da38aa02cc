//! Route-based visibility.
//!
//! Administrators see every route. Everyone else sees the routes assigned to
//! them, and records are tied to a route directly, through their client, or
//! through a parent record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{descriptor_for, flexible, EntityKind, RecordId};
use crate::remote::FieldFilter;
use crate::sync::RouteRef;

/// Longest chain followed when inheriting a route (item → settlement → client).
const MAX_RESOLVE_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Restricted,
}

/// The person operating the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: RecordId,
    pub role: Role,
    #[serde(default)]
    pub routes: BTreeSet<RecordId>,
}

impl Operator {
    #[must_use]
    pub fn administrator(id: RecordId) -> Self {
        Self {
            id,
            role: Role::Administrator,
            routes: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn restricted(id: RecordId, routes: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            id,
            role: Role::Restricted,
            routes: routes.into_iter().collect(),
        }
    }
}

/// Routes visible to the caller of a pull or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    /// `None` means unrestricted
    routes: Option<BTreeSet<RecordId>>,
    allow_unknown: bool,
}

impl TenantScope {
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            routes: None,
            allow_unknown: false,
        }
    }

    #[must_use]
    pub fn restricted(routes: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            routes: Some(routes.into_iter().collect()),
            allow_unknown: false,
        }
    }

    #[must_use]
    pub fn from_operator(operator: &Operator) -> Self {
        match operator.role {
            Role::Administrator => Self::unrestricted(),
            Role::Restricted => Self::restricted(operator.routes.iter().copied()),
        }
    }

    /// Bootstrap mode: accept records whose route cannot be resolved yet.
    #[must_use]
    pub const fn allow_unknown_routes(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    #[must_use]
    pub const fn allows_unknown(&self) -> bool {
        self.allow_unknown
    }

    #[must_use]
    pub const fn is_unrestricted(&self) -> bool {
        self.routes.is_none()
    }

    /// Whether route filtering is effectively off. A restricted operator with
    /// no routes sees everything during bootstrap.
    #[must_use]
    pub fn sees_everything(&self) -> bool {
        match &self.routes {
            None => true,
            Some(routes) => routes.is_empty() && self.allow_unknown,
        }
    }

    #[must_use]
    pub fn contains(&self, route_id: RecordId) -> bool {
        self.sees_everything()
            || self
                .routes
                .as_ref()
                .is_some_and(|routes| routes.contains(&route_id))
    }

    /// Assigned routes in ascending order (empty when unrestricted).
    #[must_use]
    pub fn route_ids(&self) -> Vec<RecordId> {
        self.routes
            .as_ref()
            .map(|routes| routes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Decide on a resolved route reference.
    #[must_use]
    pub fn admits(&self, resolution: Resolution) -> bool {
        match resolution {
            Resolution::Unscoped => true,
            Resolution::Route(route_id) => self.contains(route_id),
            Resolution::Unresolved => self.sees_everything() || self.allow_unknown,
        }
    }

    /// Remote query filters covering this scope.
    ///
    /// Entities without a route field, and callers who see everything, get a
    /// single unfiltered query. Otherwise the assigned routes are split into
    /// `IN` queries of at most `chunk` ids. A restricted caller with no routes
    /// gets no query at all.
    #[must_use]
    pub fn query_filters(&self, route_field: Option<&str>, chunk: usize) -> Vec<Option<FieldFilter>> {
        let Some(field) = route_field else {
            return vec![None];
        };
        if self.sees_everything() {
            return vec![None];
        }

        self.route_ids()
            .chunks(chunk.max(1))
            .map(|ids| Some(FieldFilter::one_of(field, ids.iter().copied())))
            .collect()
    }
}

impl Default for TenantScope {
    fn default() -> Self {
        Self::unrestricted()
    }
}

/// Outcome of following a route reference through local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Route(RecordId),
    Unscoped,
    Unresolved,
}

/// Resolve a record's route through local rows.
pub async fn resolve(store: &dyn LocalStore, route_ref: RouteRef) -> Result<Resolution> {
    let mut current = route_ref;
    for _ in 0..=MAX_RESOLVE_DEPTH {
        match current {
            RouteRef::Route(route_id) => return Ok(Resolution::Route(route_id)),
            RouteRef::Unscoped => return Ok(Resolution::Unscoped),
            RouteRef::Unknown => return Ok(Resolution::Unresolved),
            RouteRef::Via(kind, id) => {
                let Some(record) = store.get(kind, id).await? else {
                    debug!(entity = %kind, id, "Route holder not found locally");
                    return Ok(Resolution::Unresolved);
                };
                current = inherited_ref(kind, id, &record.payload);
            }
        }
    }
    Ok(Resolution::Unresolved)
}

/// Route reference of a stored record, read from its payload.
fn inherited_ref(kind: EntityKind, id: RecordId, payload: &crate::remote::Document) -> RouteRef {
    let field = |name: &str| {
        payload
            .get(name)
            .and_then(flexible::value_to_i64)
            .filter(|id| *id != 0)
    };

    if kind == EntityKind::Route {
        return RouteRef::Route(id);
    }
    if let Some(route_id) = field("route_id") {
        return RouteRef::Route(route_id);
    }
    if let Some(client_id) = field("client_id") {
        return RouteRef::Via(EntityKind::Client, client_id);
    }
    if let Some(parent) = descriptor_for(kind).parent {
        if let Some(parent_id) = payload.get(parent.field).and_then(flexible::value_to_i64) {
            return RouteRef::Via(parent.kind, parent_id);
        }
    }
    if kind == EntityKind::Table && payload.get("client_id").is_none_or(Value::is_null) {
        return RouteRef::Unscoped;
    }
    RouteRef::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlLocalStore, LocalRecord};
    use serde_json::json;

    fn doc(value: Value) -> crate::remote::Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn operator_roles_map_to_scopes() {
        let admin = TenantScope::from_operator(&Operator::administrator(1));
        assert!(admin.is_unrestricted());
        assert!(admin.contains(99));

        let restricted = TenantScope::from_operator(&Operator::restricted(2, [1, 3]));
        assert!(restricted.contains(1));
        assert!(!restricted.contains(2));
        assert_eq!(restricted.route_ids(), vec![1, 3]);
    }

    #[test]
    fn unresolved_routes_need_bootstrap_mode() {
        let strict = TenantScope::restricted([1]);
        assert!(!strict.admits(Resolution::Unresolved));
        assert!(strict.admits(Resolution::Unscoped));

        let bootstrap = strict.allow_unknown_routes(true);
        assert!(bootstrap.admits(Resolution::Unresolved));
        assert!(!bootstrap.admits(Resolution::Route(2)));
    }

    #[test]
    fn operator_without_routes_sees_everything_only_in_bootstrap() {
        let strict = TenantScope::restricted([]);
        assert!(!strict.contains(1));
        assert!(strict.query_filters(Some("route_id"), 10).is_empty());

        let bootstrap = TenantScope::restricted([]).allow_unknown_routes(true);
        assert!(bootstrap.contains(1));
        assert_eq!(bootstrap.query_filters(Some("route_id"), 10), vec![None]);
    }

    #[test]
    fn query_filters_are_chunked() {
        let scope = TenantScope::restricted(1..=25);
        let filters = scope.query_filters(Some("route_id"), 10);
        assert_eq!(filters.len(), 3);
        match filters[2].as_ref().unwrap() {
            FieldFilter::In { field, values } => {
                assert_eq!(field, "route_id");
                assert_eq!(values.len(), 5);
            }
            other => panic!("unexpected filter: {other:?}"),
        }

        assert_eq!(scope.query_filters(None, 10), vec![None]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolves_through_parent_and_client() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlLocalStore::new(db.connection().clone());
        store
            .upsert(
                EntityKind::Client,
                &LocalRecord::local(5, 1, doc(json!({"id": 5, "route_id": 2}))),
            )
            .await
            .unwrap();
        store
            .upsert(
                EntityKind::Settlement,
                &LocalRecord::local(7, 1, doc(json!({"id": 7, "client_id": 5, "route_id": null}))),
            )
            .await
            .unwrap();

        let resolution = resolve(&store, RouteRef::Via(EntityKind::Settlement, 7))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Route(2));

        let missing = resolve(&store, RouteRef::Via(EntityKind::Settlement, 8))
            .await
            .unwrap();
        assert_eq!(missing, Resolution::Unresolved);
    }
}
