//! Handler wiring and the dependency-ordered sync round.

use std::sync::Arc;

use tracing::{info, warn};

use super::engine::{ChildSync, EntitySync, SyncContext};
use super::{SyncError, SyncHandler, SyncReport};
use crate::models::{
    Client, Collaborator, CollaboratorGoal, CollaboratorRoute, Contract, ContractAddendum, Cycle,
    EntityKind, Expense, ExpenseCategory, ExpenseType, FuelRecord, Goal, Route, Settlement,
    SettlementItem, StockItem, Table, Vehicle, VehicleMaintenance,
};
use crate::sync::SyncEntity;
use crate::tenant::TenantScope;

/// Result of one entity type in a sync round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySummary {
    pub entity: EntityKind,
    /// `None` when the round stopped before reaching this entity
    pub pull: Option<Result<SyncReport, SyncError>>,
    pub push: Option<Result<SyncReport, SyncError>>,
}

impl EntitySummary {
    const fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            pull: None,
            push: None,
        }
    }

    /// Records synced in both directions, children included.
    #[must_use]
    pub fn synced(&self) -> usize {
        [&self.pull, &self.push]
            .into_iter()
            .filter_map(|result| result.as_ref().and_then(|result| result.as_ref().ok()))
            .map(|report| report.synced + report.child_synced())
            .sum()
    }

    /// Whether both directions ran without any error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        [&self.pull, &self.push].into_iter().all(|result| {
            matches!(result, Some(Ok(report)) if !report.has_errors())
        })
    }
}

/// Every top-level handler, in dependency order. Settlement items and
/// contract addenda are reached through their parents.
pub struct SyncRegistry {
    handlers: Vec<Arc<dyn SyncHandler>>,
}

impl SyncRegistry {
    pub fn new(ctx: &SyncContext) -> Self {
        let handlers: Vec<Arc<dyn SyncHandler>> = vec![
            handler::<Route>(ctx),
            handler::<Collaborator>(ctx),
            handler::<CollaboratorRoute>(ctx),
            handler::<Client>(ctx),
            handler::<Table>(ctx),
            Arc::new(
                EntitySync::<Contract>::new(ctx.clone()).with_child(child::<ContractAddendum>(ctx)),
            ),
            handler::<ExpenseCategory>(ctx),
            handler::<ExpenseType>(ctx),
            handler::<Cycle>(ctx),
            handler::<Vehicle>(ctx),
            Arc::new(
                EntitySync::<Settlement>::new(ctx.clone()).with_child(child::<SettlementItem>(ctx)),
            ),
            handler::<Expense>(ctx),
            handler::<Goal>(ctx),
            handler::<CollaboratorGoal>(ctx),
            handler::<FuelRecord>(ctx),
            handler::<VehicleMaintenance>(ctx),
            handler::<StockItem>(ctx),
        ];
        Self { handlers }
    }

    /// Handler of a top-level kind.
    #[must_use]
    pub fn handler(&self, kind: EntityKind) -> Option<Arc<dyn SyncHandler>> {
        self.handlers
            .iter()
            .find(|handler| handler.kind() == kind)
            .cloned()
    }

    /// Top-level kinds in the order they are synced.
    #[must_use]
    pub fn kinds(&self) -> Vec<EntityKind> {
        self.handlers.iter().map(|handler| handler.kind()).collect()
    }

    /// Pull every entity type, then push every entity type.
    ///
    /// Referenced types go first in both passes. The round stops at the first
    /// connectivity failure; other batch failures only affect their entity.
    pub async fn sync_all(&self, scope: &TenantScope) -> Vec<EntitySummary> {
        let mut summaries: Vec<EntitySummary> = self
            .handlers
            .iter()
            .map(|handler| EntitySummary::new(handler.kind()))
            .collect();

        for (handler, summary) in self.handlers.iter().zip(summaries.iter_mut()) {
            let result = handler.pull(scope, None).await;
            let offline = matches!(result, Err(SyncError::Connectivity));
            if let Err(error) = &result {
                warn!(entity = %handler.kind(), %error, "Pull failed");
            }
            summary.pull = Some(result);
            if offline {
                return summaries;
            }
        }

        for (handler, summary) in self.handlers.iter().zip(summaries.iter_mut()) {
            let result = handler.push(scope).await;
            let offline = matches!(result, Err(SyncError::Connectivity));
            if let Err(error) = &result {
                warn!(entity = %handler.kind(), %error, "Push failed");
            }
            summary.push = Some(result);
            if offline {
                return summaries;
            }
        }

        let synced: usize = summaries.iter().map(EntitySummary::synced).sum();
        let clean = summaries.iter().filter(|summary| summary.is_clean()).count();
        info!(synced, clean, entities = summaries.len(), "Sync round complete");
        summaries
    }
}

fn handler<T: SyncEntity>(ctx: &SyncContext) -> Arc<dyn SyncHandler> {
    Arc::new(EntitySync::<T>::new(ctx.clone()))
}

fn child<T: SyncEntity>(ctx: &SyncContext) -> Arc<dyn ChildSync> {
    Arc::new(EntitySync::<T>::new(ctx.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptor_for;
    use crate::sync::tests::harness;

    #[tokio::test(flavor = "multi_thread")]
    async fn registry_covers_every_kind_once() {
        let device = harness::Device::new().await;
        let registry = SyncRegistry::new(&device.ctx);
        let kinds = registry.kinds();

        assert_eq!(kinds.len(), 17);
        for kind in EntityKind::ALL {
            let top_level = descriptor_for(kind).parent.is_none();
            assert_eq!(kinds.contains(&kind), top_level, "{kind}");
        }
        assert!(registry.handler(EntityKind::SettlementItem).is_none());
        assert_eq!(
            registry.handler(EntityKind::Settlement).unwrap().kind(),
            EntityKind::Settlement
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn registry_order_follows_dependency_order() {
        let device = harness::Device::new().await;
        let kinds = SyncRegistry::new(&device.ctx).kinds();
        let expected: Vec<EntityKind> = EntityKind::ALL
            .into_iter()
            .filter(|kind| descriptor_for(*kind).parent.is_none())
            .collect();
        assert_eq!(kinds, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_all_stops_when_offline() {
        let device = harness::Device::new().await;
        device.connectivity.set(false);

        let summaries = SyncRegistry::new(&device.ctx)
            .sync_all(&TenantScope::unrestricted())
            .await;
        assert_eq!(summaries[0].pull, Some(Err(SyncError::Connectivity)));
        assert!(summaries[1..].iter().all(|summary| summary.pull.is_none()));
        assert!(summaries.iter().all(|summary| summary.push.is_none()));
    }
}
