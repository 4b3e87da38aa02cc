//! Pool table model

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, Fallback, FieldAlias, ForeignKey, RouteRef, SyncEntity};

static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Table,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "number",
            aliases: &["numero"],
        },
        FieldAlias {
            field: "client_id",
            aliases: &["clientId", "clienteId"],
        },
        FieldAlias {
            field: "table_type",
            aliases: &["tableType", "tipoMesa"],
        },
        FieldAlias {
            field: "size",
            aliases: &["tamanho"],
        },
        FieldAlias {
            field: "condition",
            aliases: &["estadoConservacao"],
        },
        FieldAlias {
            field: "initial_reading",
            aliases: &["initialReading", "relogioInicial"],
        },
        FieldAlias {
            field: "last_reading",
            aliases: &["lastReading", "relogioFinal"],
        },
        FieldAlias {
            field: "active",
            aliases: &["ativa"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataUltimaAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: None,
};

/// A rentable table. Tables without a client sit in the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub number: String,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub client_id: Option<RecordId>,
    #[serde(default)]
    pub table_type: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub initial_reading: i64,
    #[serde(default)]
    pub last_reading: i64,
    #[serde(default)]
    pub active: bool,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl Table {
    /// Whether the table is unassigned (in the warehouse).
    #[must_use]
    pub const fn in_warehouse(&self) -> bool {
        self.client_id.is_none()
    }
}

impl SyncEntity for Table {
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
        // warehouse tables are shared by every route
        self.client_id
            .map_or(RouteRef::Unscoped, |client_id| RouteRef::Via(EntityKind::Client, client_id))
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::optional(
            "client_id",
            EntityKind::Client,
            self.client_id,
            Fallback::Clear,
        )]
    }
}
