//! Entity kinds known to the sync engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Every entity type that moves between the local store and the remote
/// document store.
///
/// The string form doubles as the remote collection name and as the key of
/// the entity's sync metadata row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Route,
    Collaborator,
    CollaboratorRoute,
    Client,
    Table,
    Contract,
    ContractAddendum,
    Settlement,
    SettlementItem,
    ExpenseCategory,
    ExpenseType,
    Cycle,
    Expense,
    Goal,
    CollaboratorGoal,
    Vehicle,
    FuelRecord,
    VehicleMaintenance,
    StockItem,
}

impl EntityKind {
    /// All kinds, in dependency order (referenced kinds first).
    pub const ALL: [Self; 19] = [
        Self::Route,
        Self::Collaborator,
        Self::CollaboratorRoute,
        Self::Client,
        Self::Table,
        Self::Contract,
        Self::ContractAddendum,
        Self::ExpenseCategory,
        Self::ExpenseType,
        Self::Cycle,
        Self::Vehicle,
        Self::Settlement,
        Self::SettlementItem,
        Self::Expense,
        Self::Goal,
        Self::CollaboratorGoal,
        Self::FuelRecord,
        Self::VehicleMaintenance,
        Self::StockItem,
    ];

    /// Remote collection name and metadata key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Route => "routes",
            Self::Collaborator => "collaborators",
            Self::CollaboratorRoute => "collaborator_routes",
            Self::Client => "clients",
            Self::Table => "tables",
            Self::Contract => "contracts",
            Self::ContractAddendum => "contract_addenda",
            Self::Settlement => "settlements",
            Self::SettlementItem => "settlement_items",
            Self::ExpenseCategory => "expense_categories",
            Self::ExpenseType => "expense_types",
            Self::Cycle => "cycles",
            Self::Expense => "expenses",
            Self::Goal => "goals",
            Self::CollaboratorGoal => "collaborator_goals",
            Self::Vehicle => "vehicles",
            Self::FuelRecord => "fuel_records",
            Self::VehicleMaintenance => "vehicle_maintenance",
            Self::StockItem => "stock_items",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown entity kind: {s}")))
    }
}
