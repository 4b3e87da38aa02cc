//! Stock item model

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, FieldAlias, SyncEntity};

static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::StockItem,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "name",
            aliases: &["nome"],
        },
        FieldAlias {
            field: "category",
            aliases: &["categoria"],
        },
        FieldAlias {
            field: "quantity",
            aliases: &["quantidade"],
        },
        FieldAlias {
            field: "unit_price",
            aliases: &["unitPrice", "precoUnitario"],
        },
        FieldAlias {
            field: "supplier",
            aliases: &["fornecedor"],
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

/// Warehouse inventory (cloths, cues, spare parts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for StockItem {
    fn descriptor() -> &'static EntityDescriptor {
        &DESCRIPTOR
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}
