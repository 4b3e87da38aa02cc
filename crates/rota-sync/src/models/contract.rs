//! Rental contract models

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::assets::AssetField;
use crate::sync::{EntityDescriptor, FieldAlias, ForeignKey, ParentLink, RouteRef, SyncEntity};

static CONTRACT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Contract,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "number",
            aliases: &["numeroContrato"],
        },
        FieldAlias {
            field: "client_id",
            aliases: &["clientId", "clienteId"],
        },
        FieldAlias {
            field: "status",
            aliases: &["situacao"],
        },
        FieldAlias {
            field: "monthly_value",
            aliases: &["monthlyValue", "valorMensal"],
        },
        FieldAlias {
            field: "signed_at",
            aliases: &["signedAt", "dataAssinatura"],
        },
        FieldAlias {
            field: "signature",
            aliases: &["assinaturaLocatario"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[AssetField {
        field: "signature",
        folder: "contracts",
    }],
    parent: None,
};

static ADDENDUM: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::ContractAddendum,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "contract_id",
            aliases: &["contractId", "contratoId"],
        },
        FieldAlias {
            field: "number",
            aliases: &["numeroAditivo"],
        },
        FieldAlias {
            field: "description",
            aliases: &["observacoes"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataAtualizacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: Some(ParentLink {
        kind: EntityKind::Contract,
        field: "contract_id",
    }),
};

/// Rental agreement between the business and a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(default)]
    pub number: String,
    #[serde(deserialize_with = "flexible::id")]
    pub client_id: RecordId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub monthly_value: f64,
    #[serde(default, deserialize_with = "flexible::opt_millis")]
    pub signed_at: Option<i64>,
    /// Local path or remote URL of the signature image
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Contract {
    fn descriptor() -> &'static EntityDescriptor {
        &CONTRACT
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::Via(EntityKind::Client, self.client_id)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::required("client_id", EntityKind::Client, self.client_id)]
    }
}

/// Amendment to a contract. Synced through its contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAddendum {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub contract_id: RecordId,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for ContractAddendum {
    fn descriptor() -> &'static EntityDescriptor {
        &ADDENDUM
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::Via(EntityKind::Contract, self.contract_id)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![ForeignKey::required("contract_id", EntityKind::Contract, self.contract_id)]
    }
}
