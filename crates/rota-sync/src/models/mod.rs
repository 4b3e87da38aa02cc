//! Data models for rota-sync

pub mod flexible;

mod client;
mod collaborator;
mod contract;
mod cycle;
mod expense;
mod goal;
mod kind;
mod route;
mod settlement;
mod stock;
mod table;
mod vehicle;

pub use client::Client;
pub use collaborator::{Collaborator, CollaboratorRoute};
pub use contract::{Contract, ContractAddendum};
pub use cycle::Cycle;
pub use expense::{Expense, ExpenseCategory, ExpenseType};
pub use goal::{CollaboratorGoal, Goal};
pub use kind::EntityKind;
pub use route::Route;
pub use settlement::{Settlement, SettlementItem};
pub use stock::StockItem;
pub use table::Table;
pub use vehicle::{FuelRecord, Vehicle, VehicleMaintenance};

use crate::sync::{EntityDescriptor, SyncEntity};

/// Numeric identifier shared by the local row and the remote document.
pub type RecordId = i64;

/// Descriptor of any entity kind.
#[must_use]
pub fn descriptor_for(kind: EntityKind) -> &'static EntityDescriptor {
    match kind {
        EntityKind::Route => Route::descriptor(),
        EntityKind::Collaborator => Collaborator::descriptor(),
        EntityKind::CollaboratorRoute => CollaboratorRoute::descriptor(),
        EntityKind::Client => Client::descriptor(),
        EntityKind::Table => Table::descriptor(),
        EntityKind::Contract => Contract::descriptor(),
        EntityKind::ContractAddendum => ContractAddendum::descriptor(),
        EntityKind::Settlement => Settlement::descriptor(),
        EntityKind::SettlementItem => SettlementItem::descriptor(),
        EntityKind::ExpenseCategory => ExpenseCategory::descriptor(),
        EntityKind::ExpenseType => ExpenseType::descriptor(),
        EntityKind::Cycle => Cycle::descriptor(),
        EntityKind::Expense => Expense::descriptor(),
        EntityKind::Goal => Goal::descriptor(),
        EntityKind::CollaboratorGoal => CollaboratorGoal::descriptor(),
        EntityKind::Vehicle => Vehicle::descriptor(),
        EntityKind::FuelRecord => FuelRecord::descriptor(),
        EntityKind::VehicleMaintenance => VehicleMaintenance::descriptor(),
        EntityKind::StockItem => StockItem::descriptor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptors_match_their_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(descriptor_for(kind).kind, kind);
        }
    }

    #[test]
    fn children_point_at_their_parent() {
        let item = descriptor_for(EntityKind::SettlementItem);
        let parent = item.parent.unwrap();
        assert_eq!(parent.kind, EntityKind::Settlement);
        assert_eq!(parent.field, "settlement_id");

        let addendum = descriptor_for(EntityKind::ContractAddendum);
        assert_eq!(addendum.parent.unwrap().kind, EntityKind::Contract);
    }

    #[test]
    fn table_without_client_is_in_warehouse() {
        let table: Table =
            serde_json::from_value(json!({"id": 4, "number": "M-04", "client_id": 0})).unwrap();
        assert!(table.in_warehouse());
        assert_eq!(table.route_ref(), crate::sync::RouteRef::Unscoped);
    }

    #[test]
    fn settlement_route_falls_back_to_client() {
        let settlement: Settlement =
            serde_json::from_value(json!({"id": 1, "client_id": "12"})).unwrap();
        assert_eq!(
            settlement.route_ref(),
            crate::sync::RouteRef::Via(EntityKind::Client, 12)
        );
    }
}
