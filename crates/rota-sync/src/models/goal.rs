//! Goal models

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, FieldAlias, ForeignKey, RouteRef, SyncEntity};

static GOAL: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Goal,
    route_field: Some("route_id"),
    aliases: &[
        FieldAlias {
            field: "route_id",
            aliases: &["routeId", "rotaId"],
        },
        FieldAlias {
            field: "goal_type",
            aliases: &["goalType", "tipoMeta"],
        },
        FieldAlias {
            field: "target",
            aliases: &["valorMeta"],
        },
        FieldAlias {
            field: "current",
            aliases: &["valorAtual"],
        },
        FieldAlias {
            field: "active",
            aliases: &["ativo"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataCriacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: None,
};

static COLLABORATOR_GOAL: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::CollaboratorGoal,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "collaborator_id",
            aliases: &["collaboratorId", "colaboradorId"],
        },
        FieldAlias {
            field: "goal_id",
            aliases: &["goalId", "metaId"],
        },
        FieldAlias {
            field: "achieved",
            aliases: &["valorAtingido"],
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

/// Target for a route (revenue, clients visited, tables placed, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub route_id: RecordId,
    #[serde(default)]
    pub goal_type: String,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub current: f64,
    #[serde(default)]
    pub active: bool,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Goal {
    fn descriptor() -> &'static EntityDescriptor {
        &GOAL
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

/// A collaborator's share of a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorGoal {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub collaborator_id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub goal_id: RecordId,
    #[serde(default)]
    pub achieved: f64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for CollaboratorGoal {
    fn descriptor() -> &'static EntityDescriptor {
        &COLLABORATOR_GOAL
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::Via(EntityKind::Goal, self.goal_id)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![
            ForeignKey::required("collaborator_id", EntityKind::Collaborator, self.collaborator_id),
            ForeignKey::required("goal_id", EntityKind::Goal, self.goal_id),
        ]
    }
}
