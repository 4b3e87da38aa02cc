//! Collaborator (field operator) models

use serde::{Deserialize, Serialize};

use super::{flexible, EntityKind, RecordId};
use crate::assets::AssetField;
use crate::sync::{EntityDescriptor, FieldAlias, ForeignKey, ProtectedField, RouteRef, SyncEntity};

static COLLABORATOR: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Collaborator,
    route_field: None,
    aliases: &[
        FieldAlias {
            field: "name",
            aliases: &["nome"],
        },
        FieldAlias {
            field: "phone",
            aliases: &["telefone"],
        },
        FieldAlias {
            field: "access_level",
            aliases: &["accessLevel", "nivelAcesso"],
        },
        FieldAlias {
            field: "active",
            aliases: &["ativo"],
        },
        FieldAlias {
            field: "approved",
            aliases: &["aprovado"],
        },
        FieldAlias {
            field: "approved_at",
            aliases: &["approvedAt", "dataAprovacao"],
        },
        FieldAlias {
            field: "approved_by",
            aliases: &["approvedBy", "aprovadoPor"],
        },
        FieldAlias {
            field: "auth_uid",
            aliases: &["authUid", "firebaseUid"],
        },
        FieldAlias {
            field: "photo",
            aliases: &["fotoPerfil", "photoUrl"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataUltimaAtualizacao"],
        },
    ],
    protected: &[ProtectedField {
        flag: "approved",
        companions: &["approved_at", "approved_by"],
    }],
    assets: &[AssetField {
        field: "photo",
        folder: "collaborators",
    }],
    parent: None,
};

static COLLABORATOR_ROUTE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::CollaboratorRoute,
    route_field: Some("route_id"),
    aliases: &[
        FieldAlias {
            field: "collaborator_id",
            aliases: &["collaboratorId", "colaboradorId"],
        },
        FieldAlias {
            field: "route_id",
            aliases: &["routeId", "rotaId"],
        },
        FieldAlias {
            field: "primary",
            aliases: &["responsavelPrincipal"],
        },
        FieldAlias {
            field: "updated_at",
            aliases: &["updatedAt", "dataVinculacao"],
        },
    ],
    protected: &[],
    assets: &[],
    parent: None,
};

/// A person working the routes. Approval is granted by an administrator
/// and must never be revoked by a stale device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub access_level: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub approved: bool,
    #[serde(default, deserialize_with = "flexible::opt_millis")]
    pub approved_at: Option<i64>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub auth_uid: Option<String>,
    /// Local path or remote URL of the profile photo
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for Collaborator {
    fn descriptor() -> &'static EntityDescriptor {
        &COLLABORATOR
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Assignment of a collaborator to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorRoute {
    #[serde(deserialize_with = "flexible::id")]
    pub id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub collaborator_id: RecordId,
    #[serde(deserialize_with = "flexible::id")]
    pub route_id: RecordId,
    #[serde(default)]
    pub primary: bool,
    #[serde(default, deserialize_with = "flexible::millis")]
    pub updated_at: i64,
}

impl SyncEntity for CollaboratorRoute {
    fn descriptor() -> &'static EntityDescriptor {
        &COLLABORATOR_ROUTE
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn route_ref(&self) -> RouteRef {
        RouteRef::Route(self.route_id)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        vec![
            ForeignKey::required("collaborator_id", EntityKind::Collaborator, self.collaborator_id),
            ForeignKey::required("route_id", EntityKind::Route, self.route_id),
        ]
    }
}
