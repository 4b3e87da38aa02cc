//! Per-entity configuration consumed by the generic sync engine.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::assets::AssetField;
use crate::models::{EntityKind, RecordId};

/// A remote key that maps onto a canonical local field.
///
/// Aliases are resolved once when a remote document is mapped, and only
/// when the canonical key is absent.
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

/// A flag that must not regress from `true` to `false` on pull.
///
/// When the local row has `flag == true` and the incoming document does not,
/// the local flag and its companion fields are kept.
#[derive(Debug, Clone, Copy)]
pub struct ProtectedField {
    pub flag: &'static str,
    pub companions: &'static [&'static str],
}

/// Child entities are synced through their parent's handler.
#[derive(Debug, Clone, Copy)]
pub struct ParentLink {
    pub kind: EntityKind,
    pub field: &'static str,
}

/// Static description of an entity type.
#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    /// Remote document field holding the route id, used to scope queries.
    pub route_field: Option<&'static str>,
    pub aliases: &'static [FieldAlias],
    pub protected: &'static [ProtectedField],
    pub assets: &'static [AssetField],
    pub parent: Option<ParentLink>,
}

impl EntityDescriptor {
    pub const fn collection(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// How a record is tied to a route, for tenant scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRef {
    /// The record names its route directly.
    Route(RecordId),
    /// The route is inherited from another local record (client, parent).
    Via(EntityKind, RecordId),
    /// The record should carry a route but does not.
    Unknown,
    /// The entity is shared by every route (vehicles, stock, categories).
    Unscoped,
}

impl RouteRef {
    /// Prefer an explicit route, fall back to the client's route.
    pub const fn route_or_client(route_id: Option<RecordId>, client_id: Option<RecordId>) -> Self {
        match (route_id, client_id) {
            (Some(route_id), _) => Self::Route(route_id),
            (None, Some(client_id)) => Self::Via(EntityKind::Client, client_id),
            (None, None) => Self::Unknown,
        }
    }
}

/// What to do when an optional reference is missing locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Substitute the first route of the caller's scope that exists locally.
    FirstRouteInScope,
    /// Drop the reference.
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    Required,
    Optional(Fallback),
}

/// A foreign key of a concrete record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: Option<RecordId>,
    pub rule: KeyRule,
}

impl ForeignKey {
    pub fn required(field: &'static str, kind: EntityKind, id: impl Into<Option<RecordId>>) -> Self {
        Self {
            field,
            kind,
            id: id.into().filter(|id| *id != 0),
            rule: KeyRule::Required,
        }
    }

    pub fn optional(
        field: &'static str,
        kind: EntityKind,
        id: Option<RecordId>,
        fallback: Fallback,
    ) -> Self {
        Self {
            field,
            kind,
            id: id.filter(|id| *id != 0),
            rule: KeyRule::Optional(fallback),
        }
    }
}

/// A domain record the engine can move between stores.
///
/// The typed struct is the mapping between the remote document and the local
/// row: documents are normalized through the descriptor's aliases and then
/// deserialized into `Self`, which validates them.
pub trait SyncEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn descriptor() -> &'static EntityDescriptor;

    fn id(&self) -> RecordId;

    /// Last modification in epoch milliseconds.
    fn updated_at(&self) -> i64;

    fn route_ref(&self) -> RouteRef {
        RouteRef::Unscoped
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        Vec::new()
    }
}
