//! Client model

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::sync::{EntityDescriptor, Fallback, FieldAlias, ForeignKey, RouteRef, SyncEntity};

static DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Client,
    route_field: Some("route_id"),
    aliases: &[
        FieldAlias {
            field: "name",
            aliases: &["nome"],
        },
        FieldAlias {
            field: "route_id",
            aliases: &["routeId", "rotaId"],
        },
        FieldAlias {
            field: "document",
            aliases: &["cpfCnpj"],
        },
        FieldAlias {
            field: "phone",
            aliases: &["telefone"],
        },
        FieldAlias {
            field: "address",
            aliases: &["endereco"],
        },
        FieldAlias {
            field: "city",
            aliases: &["cidade"],
        },
        FieldAlias {
            field: "price_per_play",
            aliases: &["pricePerPlay", "valorFicha"],
        },
        FieldAlias {
            field: "debt",
            aliases: &["debitoAtual"],
        },
        FieldAlias {
            field: "active",
            aliases: &["ativo"],
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

/// A venue that rents tables. Its route decides who may see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default, deserialize_with = "flexible::opt_id")]
    pub route_id: Option<RecordId>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub price_per_play: f64,
    #[serde(default)]
    pub debt: f64,
    #[serde(default)]
    pub active: bool,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Client {
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
        self.route_id.map_or(RouteRef::Unknown, RouteRef::Route)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::optional(
            "route_id",
            EntityKind::Route,
            self.route_id,
            Fallback::FirstRouteInScope,
        )]
    }
}
