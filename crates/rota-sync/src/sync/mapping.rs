//! Conversion between remote documents, typed entities and local rows.

use serde_json::Value;
use thiserror::Error;

use super::entity::{EntityDescriptor, SyncEntity};
use crate::models::{flexible, RecordId};
use crate::remote::{Document, RemoteDocument, SERVER_TIMESTAMP_FIELD};

/// Legacy spellings of the record id.
const ID_ALIASES: &[&str] = &["roomId", "room_id"];

/// Why a remote document could not be mapped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MappingError(pub String);

/// Rename aliased keys to their canonical field.
///
/// An alias only applies when the canonical key is absent; the canonical
/// spelling always wins.
pub fn normalize_aliases(descriptor: &EntityDescriptor, document: &mut Document) {
    for alias in descriptor.aliases {
        if document.contains_key(alias.field) {
            continue;
        }
        if let Some(value) = alias
            .aliases
            .iter()
            .find_map(|key| document.get(*key).cloned())
        {
            document.insert(alias.field.to_string(), value);
        }
    }
}

/// Resolve the record id: the `id` field, a legacy alias, or the document key.
pub fn resolve_id(document: &RemoteDocument) -> Option<RecordId> {
    std::iter::once("id")
        .chain(ID_ALIASES.iter().copied())
        .find_map(|key| document.data.get(key).and_then(flexible::value_to_i64))
        .or_else(|| document.id.trim().parse().ok())
        .filter(|id| *id != 0)
}

/// Normalize a remote document into the canonical local document shape.
pub fn canonical_document(
    descriptor: &EntityDescriptor,
    remote: &RemoteDocument,
) -> Result<(RecordId, Document), MappingError> {
    let id = resolve_id(remote).ok_or_else(|| {
        MappingError(format!(
            "{} document '{}' has no usable id",
            descriptor.kind, remote.id
        ))
    })?;

    let mut document = remote.data.clone();
    normalize_aliases(descriptor, &mut document);
    document.insert("id".to_string(), Value::from(id));
    for key in ID_ALIASES {
        document.remove(*key);
    }
    document.remove(SERVER_TIMESTAMP_FIELD);
    Ok((id, document))
}

/// Decode a canonical document into the typed entity.
pub fn decode<T: SyncEntity>(document: &Document) -> Result<T, MappingError> {
    serde_json::from_value(Value::Object(document.clone())).map_err(|error| {
        MappingError(format!(
            "{} document {} is malformed: {error}",
            T::descriptor().kind,
            document.get("id").cloned().unwrap_or(Value::Null)
        ))
    })
}

/// Encode a typed entity, keeping unknown local fields (asset side channels)
/// from `base`.
pub fn encode<T: SyncEntity>(entity: &T, base: Option<&Document>) -> Result<Document, MappingError> {
    let value = serde_json::to_value(entity)
        .map_err(|error| MappingError(format!("failed to encode {}: {error}", T::descriptor().kind)))?;
    let Value::Object(encoded) = value else {
        return Err(MappingError(format!(
            "{} did not encode to an object",
            T::descriptor().kind
        )));
    };

    let mut document = base.cloned().unwrap_or_default();
    document.extend(encoded);
    Ok(document)
}

/// Keep protected flags that are set locally but not in the incoming document.
pub fn preserve_protected(descriptor: &EntityDescriptor, local: &Document, incoming: &mut Document) {
    for protected in descriptor.protected {
        let locally_set = local.get(protected.flag).and_then(Value::as_bool) == Some(true);
        let incoming_set = incoming.get(protected.flag).and_then(Value::as_bool) == Some(true);
        if !locally_set || incoming_set {
            continue;
        }

        incoming.insert(protected.flag.to_string(), Value::Bool(true));
        for companion in protected.companions {
            match local.get(*companion) {
                Some(value) => incoming.insert((*companion).to_string(), value.clone()),
                None => incoming.remove(*companion),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Client, Collaborator, EntityKind};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn aliases_fill_missing_canonical_fields() {
        let remote = RemoteDocument::new(
            "12",
            doc(json!({"nome": "Bar Central", "rotaId": "3", "last_modified": 50})),
        );

        let (id, document) = canonical_document(Client::descriptor(), &remote).unwrap();
        assert_eq!(id, 12);
        assert_eq!(document["name"], json!("Bar Central"));
        assert!(!document.contains_key("last_modified"));

        let client: Client = decode(&document).unwrap();
        assert_eq!(client.route_id, Some(3));
    }

    #[test]
    fn canonical_field_beats_alias() {
        let mut document = doc(json!({"name": "new", "nome": "old"}));
        normalize_aliases(Client::descriptor(), &mut document);
        assert_eq!(document["name"], json!("new"));
    }

    #[test]
    fn id_comes_from_legacy_key_or_document_key() {
        let legacy = RemoteDocument::new("abc", doc(json!({"roomId": 44})));
        assert_eq!(resolve_id(&legacy), Some(44));

        let keyed = RemoteDocument::new("45", Document::new());
        assert_eq!(resolve_id(&keyed), Some(45));

        let hopeless = RemoteDocument::new("auto-generated", Document::new());
        assert_eq!(resolve_id(&hopeless), None);
    }

    #[test]
    fn malformed_document_is_a_mapping_error() {
        let document = doc(json!({"id": 1}));
        let err = decode::<Client>(&document).unwrap_err();
        assert!(err.0.contains("clients"));

        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err.clone());
        assert_eq!(boxed.to_string(), err.0);
    }

    #[test]
    fn approval_is_never_revoked_by_incoming_document() {
        let local = doc(json!({"approved": true, "approved_at": 10, "approved_by": "admin"}));
        let mut incoming = doc(json!({"approved": false, "approved_at": null, "name": "Ana"}));

        preserve_protected(Collaborator::descriptor(), &local, &mut incoming);
        assert_eq!(incoming["approved"], json!(true));
        assert_eq!(incoming["approved_at"], json!(10));
        assert_eq!(incoming["approved_by"], json!("admin"));
        assert_eq!(incoming["name"], json!("Ana"));
    }

    #[test]
    fn encode_keeps_local_side_channels() {
        let client: Client =
            serde_json::from_value(json!({"id": 1, "name": "Bar", "route_id": 2})).unwrap();
        let base = doc(json!({"photo_url": "https://blob.test/x.png"}));

        let document = encode(&client, Some(&base)).unwrap();
        assert_eq!(document["photo_url"], json!("https://blob.test/x.png"));
        assert_eq!(document["name"], json!("Bar"));
        assert_eq!(Client::descriptor().kind, EntityKind::Client);
    }
}
