//! Settlement cycle model

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, FieldAlias, ForeignKey, RouteRef, SyncEntity};

static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Cycle,
    route_field: Some("route_id"),
    aliases: &[
        FieldAlias {
            field: "route_id",
            aliases: &["routeId", "rotaId"],
        },
        FieldAlias {
            field: "number",
            aliases: &["numeroCiclo"],
        },
        FieldAlias {
            field: "year",
            aliases: &["ano"],
        },
        FieldAlias {
            field: "started_at",
            aliases: &["startedAt", "dataInicio"],
        },
        FieldAlias {
            field: "ended_at",
            aliases: &["endedAt", "dataFim"],
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

/// A numbered collection round of a route within a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub route_id: RecordId,
    pub number: i64,
    pub year: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub started_at: i64,
    #[serde(default, deserialize_with = "flexible::opt_millis")]
    pub ended_at: Option<i64>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Cycle {
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
        RouteRef::Route(self.route_id)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::required("route_id", EntityKind::Route, self.route_id)]
    }
}
