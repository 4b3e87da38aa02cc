//! Route model

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, FieldAlias, RouteRef, SyncEntity};

static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Route,
    route_field: Some("id"),
    aliases: &[
        FieldAlias {
            field: "name",
            aliases: &["nome"],
        },
        FieldAlias {
            field: "active",
            aliases: &["ativa"],
        },
        FieldAlias {
            field: "current_cycle",
            aliases: &["currentCycle", "cicloAcertoAtual"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: None,
};

/// A collection route. Every scoped record belongs to exactly one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cities: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub current_cycle: i64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

const fn default_true() -> bool {
    true
}

impl SyncEntity for Route {
    fn descriptor() -> &'static EntityDescriptor {
        &DESCRIPTOR
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::Route(self.id)
    }
}
