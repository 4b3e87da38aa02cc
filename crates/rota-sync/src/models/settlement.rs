//! Settlement models
//!
//! A settlement is the periodic visit where table readings are collected and
//! the client pays for the plays since the previous visit.

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::assets::AssetField;
use crate::sync::{
    EntityDescriptor, Fallback, FieldAlias, ForeignKey, ParentLink, RouteRef, SyncEntity,
};

static SETTLEMENT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Settlement,
    route_field: Some("route_id"),
    aliases: &[
        FieldAlias {
            field: "client_id",
            aliases: &["clientId", "clienteId"],
        },
        FieldAlias {
            field: "collaborator_id",
            aliases: &["collaboratorId", "colaboradorId"],
        },
        FieldAlias {
            field: "route_id",
            aliases: &["routeId", "rotaId"],
        },
        FieldAlias {
            field: "cycle_id",
            aliases: &["cycleId", "cicloId"],
        },
        FieldAlias {
            field: "settled_at",
            aliases: &["settledAt", "dataAcerto"],
        },
        FieldAlias {
            field: "total",
            aliases: &["valorTotal"],
        },
        FieldAlias {
            field: "discount",
            aliases: &["desconto"],
        },
        FieldAlias {
            field: "received",
            aliases: &["valorRecebido"],
        },
        FieldAlias {
            field: "previous_debt",
            aliases: &["previousDebt", "debitoAnterior"],
        },
        FieldAlias {
            field: "current_debt",
            aliases: &["currentDebt", "debitoAtual"],
        },
        FieldAlias {
            field: "notes",
            aliases: &["observacoes"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataFinalizacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: None,
};

static ITEM: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::SettlementItem,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "settlement_id",
            aliases: &["settlementId", "acertoId"],
        },
        FieldAlias {
            field: "table_id",
            aliases: &["tableId", "mesaId"],
        },
        FieldAlias {
            field: "initial_reading",
            aliases: &["initialReading", "relogioInicial"],
        },
        FieldAlias {
            field: "final_reading",
            aliases: &["finalReading", "relogioFinal"],
        },
        FieldAlias {
            field: "plays",
            aliases: &["fichasJogadas"],
        },
        FieldAlias {
            field: "subtotal",
            aliases: &["valorFinal"],
        },
        FieldAlias {
            field: "final_reading_photo",
            aliases: &["finalReadingPhoto", "fotoRelogioFinal"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[AssetField {
        field: "final_reading_photo",
        folder: "settlement_items",
    }],
    parent: Some(ParentLink {
        kind: EntityKind::Settlement,
        field: "settlement_id",
    }),
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub client_id: RecordId,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub collaborator_id: Option<RecordId>,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub route_id: Option<RecordId>,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub cycle_id: Option<RecordId>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub settled_at: i64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub received: f64,
    #[serde(default)]
    pub previous_debt: f64,
    #[serde(default)]
    pub current_debt: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Settlement {
    fn descriptor() -> &'static EntityDescriptor {
        &SETTLEMENT
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::route_or_client(self.route_id, Some(self.client_id))
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![
            ForeignKey::required("client_id", EntityKind::Client, self.client_id),
            ForeignKey::optional(
                "collaborator_id",
                EntityKind::Collaborator,
                self.collaborator_id,
                Fallback::Clear,
            ),
            ForeignKey::optional("cycle_id", EntityKind::Cycle, self.cycle_id, Fallback::Clear),
        ]
    }
}

/// One table's readings within a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementItem {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub settlement_id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub table_id: RecordId,
    #[serde(default)]
    pub initial_reading: i64,
    #[serde(default)]
    pub final_reading: i64,
    #[serde(default)]
    pub plays: i64,
    #[serde(default)]
    pub subtotal: f64,
    /// Local path or remote URL of the meter photo
    #[serde(default)]
    pub final_reading_photo: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for SettlementItem {
    fn descriptor() -> &'static EntityDescriptor {
        &ITEM
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::Via(EntityKind::Settlement, self.settlement_id)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![
            ForeignKey::required("settlement_id", EntityKind::Settlement, self.settlement_id),
            ForeignKey::required("table_id", EntityKind::Table, self.table_id),
        ]
    }
}
