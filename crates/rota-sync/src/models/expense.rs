//! Expense models

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::assets::AssetField;
use crate::sync::{EntityDescriptor, Fallback, FieldAlias, ForeignKey, RouteRef, SyncEntity};

static CATEGORY: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::ExpenseCategory,
    route_field: None,
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
            field: "updated_at",
            aliases: &["updatedAt", "dataAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: None,
};

static TYPE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::ExpenseType,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "category_id",
            aliases: &["categoryId", "categoriaId"],
        },
        FieldAlias {
            field: "name",
            aliases: &["nome"],
        },
        FieldAlias {
            field: "active",
            aliases: &["ativo"],
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

static EXPENSE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Expense,
    route_field: Some("route_id"),
    aliases: &[
        FieldAlias {
            field: "route_id",
            aliases: &["routeId", "rotaId"],
        },
        FieldAlias {
            field: "cycle_id",
            aliases: &["cycleId", "cicloId"],
        },
        FieldAlias {
            field: "vehicle_id",
            aliases: &["vehicleId", "veiculoId"],
        },
        FieldAlias {
            field: "description",
            aliases: &["descricao"],
        },
        FieldAlias {
            field: "amount",
            aliases: &["valor"],
        },
        FieldAlias {
            field: "category",
            aliases: &["categoria"],
        },
        FieldAlias {
            field: "expense_type",
            aliases: &["expenseType", "tipoDespesa"],
        },
        FieldAlias {
            field: "spent_at",
            aliases: &["spentAt", "dataHora"],
        },
        FieldAlias {
            field: "origin",
            aliases: &["origemLancamento"],
        },
        FieldAlias {
            field: "odometer_km",
            aliases: &["odometerKm", "kmRodado"],
        },
        FieldAlias {
            field: "liters",
            aliases: &["litrosAbastecidos"],
        },
        FieldAlias {
            field: "receipt_photo",
            aliases: &["receiptPhoto", "fotoComprovante"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[AssetField {
        field: "receipt_photo",
        folder: "expenses",
    }],
    parent: None,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseCategory {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for ExpenseCategory {
    fn descriptor() -> &'static EntityDescriptor {
        &CATEGORY
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseType {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub category_id: RecordId,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for ExpenseType {
    fn descriptor() -> &'static EntityDescriptor {
        &TYPE
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::required("category_id", EntityKind::ExpenseCategory, self.category_id)]
    }
}

/// A route or company expense, optionally tied to a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub route_id: Option<RecordId>,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub cycle_id: Option<RecordId>,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub vehicle_id: Option<RecordId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub expense_type: String,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub spent_at: i64,
    /// `ROUTE` for field expenses, `GLOBAL` for company expenses
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub odometer_km: Option<i64>,
    #[serde(default)]
    pub liters: Option<f64>,
    #[serde(default)]
    pub receipt_photo: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Expense {
    fn descriptor() -> &'static EntityDescriptor {
        &EXPENSE
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        self.route_id.map_or(RouteRef::Unknown, RouteRef::Route)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![
            ForeignKey::optional("route_id", EntityKind::Route, self.route_id, Fallback::Clear),
            ForeignKey::optional("cycle_id", EntityKind::Cycle, self.cycle_id, Fallback::Clear),
            ForeignKey::optional(
                "vehicle_id",
                EntityKind::Vehicle,
                self.vehicle_id,
                Fallback::Clear,
            ),
        ]
    }
}
