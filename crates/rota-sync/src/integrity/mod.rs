//! Foreign-key existence checks before a record is accepted.

use serde_json::Value;
use tracing::warn;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{EntityKind, RecordId};
use crate::remote::Document;
use crate::sync::{Fallback, ForeignKey, KeyRule};
use crate::tenant::TenantScope;

/// Replacement applied to an optional reference that points nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution {
    pub field: &'static str,
    pub original: Option<RecordId>,
    pub replacement: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass { substitutions: Vec<Substitution> },
    Reject { missing: Vec<ForeignKey> },
}

impl Verdict {
    /// Describe the missing references of a rejected record.
    #[must_use]
    pub fn describe_missing(&self) -> String {
        match self {
            Self::Pass { .. } => String::new(),
            Self::Reject { missing } => missing
                .iter()
                .map(|key| match key.id {
                    Some(id) => format!("{} {id} ({})", key.kind, key.field),
                    None => format!("{} (no {})", key.kind, key.field),
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Check every foreign key of a record against the local store.
///
/// Missing required keys reject the record. Missing optional keys are
/// replaced by their fallback.
pub async fn check(
    store: &dyn LocalStore,
    scope: &TenantScope,
    keys: &[ForeignKey],
) -> Result<Verdict> {
    let mut missing = Vec::new();
    let mut substitutions = Vec::new();

    for key in keys {
        let present = match key.id {
            Some(id) => store.exists(key.kind, id).await?,
            None => false,
        };
        if present {
            continue;
        }

        match key.rule {
            KeyRule::Required => missing.push(*key),
            KeyRule::Optional(fallback) => {
                let replacement = match fallback {
                    Fallback::Clear => None,
                    Fallback::FirstRouteInScope => first_local_route(store, scope).await?,
                };
                if replacement != key.id {
                    substitutions.push(Substitution {
                        field: key.field,
                        original: key.id,
                        replacement,
                    });
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(Verdict::Pass { substitutions })
    } else {
        Ok(Verdict::Reject { missing })
    }
}

async fn first_local_route(store: &dyn LocalStore, scope: &TenantScope) -> Result<Option<RecordId>> {
    for route_id in scope.route_ids() {
        if store.exists(EntityKind::Route, route_id).await? {
            return Ok(Some(route_id));
        }
    }
    Ok(None)
}

/// Write substitutions into a canonical document.
pub fn apply(kind: EntityKind, id: RecordId, substitutions: &[Substitution], document: &mut Document) {
    for substitution in substitutions {
        warn!(
            entity = %kind,
            id,
            field = substitution.field,
            original = ?substitution.original,
            replacement = ?substitution.replacement,
            "Optional reference missing locally, using fallback"
        );
        let value = substitution.replacement.map_or(Value::Null, Value::from);
        document.insert(substitution.field.to_string(), value);
    }
}
