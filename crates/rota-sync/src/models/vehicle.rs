//! Fleet models

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, FieldAlias, ForeignKey, SyncEntity};

static VEHICLE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Vehicle,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "plate",
            aliases: &["placa"],
        },
        FieldAlias {
            field: "model",
            aliases: &["modelo"],
        },
        FieldAlias {
            field: "brand",
            aliases: &["marca"],
        },
        FieldAlias {
            field: "year",
            aliases: &["anoModelo"],
        },
        FieldAlias {
            field: "odometer_km",
            aliases: &["odometerKm", "kmAtual"],
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

static FUEL_RECORD: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::FuelRecord,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "vehicle_id",
            aliases: &["vehicleId", "veiculoId"],
        },
        FieldAlias {
            field: "liters",
            aliases: &["litros"],
        },
        FieldAlias {
            field: "amount",
            aliases: &["valor"],
        },
        FieldAlias {
            field: "odometer_km",
            aliases: &["odometerKm", "km"],
        },
        FieldAlias {
            field: "fueled_at",
            aliases: &["fueledAt", "dataAbastecimento"],
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

static MAINTENANCE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::VehicleMaintenance,
    route_field: None,
    aliases: &[
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
            field: "odometer_km",
            aliases: &["odometerKm", "km"],
        },
        FieldAlias {
            field: "performed_at",
            aliases: &["performedAt", "dataManutencao"],
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub plate: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub odometer_km: i64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Vehicle {
    fn descriptor() -> &'static EntityDescriptor {
        &VEHICLE
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelRecord {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub vehicle_id: RecordId,
    #[serde(default)]
    pub liters: f64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub odometer_km: i64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub fueled_at: i64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for FuelRecord {
    fn descriptor() -> &'static EntityDescriptor {
        &FUEL_RECORD
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::required("vehicle_id", EntityKind::Vehicle, self.vehicle_id)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleMaintenance {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub vehicle_id: RecordId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub odometer_km: i64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub performed_at: i64,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for VehicleMaintenance {
    fn descriptor() -> &'static EntityDescriptor {
        &MAINTENANCE
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::required("vehicle_id", EntityKind::Vehicle, self.vehicle_id)]
    }
}
