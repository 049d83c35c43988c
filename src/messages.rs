//! Outbound messages.
//!
//! Every message is self-describing JSON with a `kind` discriminator, e.g.
//! `{"kind":"lifetime_scope_ending","lifetime_scope_id":3}`.

use serde::{Deserialize, Serialize};

use crate::identity::ObjectId;
use crate::model::{
    ComponentModel, ErrorModel, InstanceLookupModel, LifetimeScopeModel, RegistrationSourceModel,
    ResolveOperationModel, TypeModel,
};

/// One event, as seen by a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    TypeDiscovered {
        type_model: TypeModel,
    },
    ComponentAdded {
        component: ComponentModel,
    },
    RegistrationSourceAdded {
        source: RegistrationSourceModel,
    },
    LifetimeScopeBeginning {
        lifetime_scope: LifetimeScopeModel,
    },
    LifetimeScopeEnding {
        lifetime_scope_id: ObjectId,
    },
    ResolveOperationBeginning {
        resolve_operation: ResolveOperationModel,
    },
    ResolveOperationEnding {
        resolve_operation_id: ObjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorModel>,
    },
    InstanceLookupBeginning {
        instance_lookup: InstanceLookupModel,
    },
    InstanceLookupEnding {
        instance_lookup_id: ObjectId,
        new_instance_activated: bool,
    },
    InstanceLookupCompletionBeginning {
        instance_lookup_id: ObjectId,
    },
    InstanceLookupCompletionEnding {
        instance_lookup_id: ObjectId,
    },
}

impl Message {
    /// The `kind` discriminator of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::TypeDiscovered { .. } => "type_discovered",
            Message::ComponentAdded { .. } => "component_added",
            Message::RegistrationSourceAdded { .. } => "registration_source_added",
            Message::LifetimeScopeBeginning { .. } => "lifetime_scope_beginning",
            Message::LifetimeScopeEnding { .. } => "lifetime_scope_ending",
            Message::ResolveOperationBeginning { .. } => "resolve_operation_beginning",
            Message::ResolveOperationEnding { .. } => "resolve_operation_ending",
            Message::InstanceLookupBeginning { .. } => "instance_lookup_beginning",
            Message::InstanceLookupEnding { .. } => "instance_lookup_ending",
            Message::InstanceLookupCompletionBeginning { .. } => "instance_lookup_completion_beginning",
            Message::InstanceLookupCompletionEnding { .. } => "instance_lookup_completion_ending",
        }
    }

    /// Id of the scope, operation or lookup the message is about, if any.
    pub fn subject_id(&self) -> Option<ObjectId> {
        match self {
            Message::TypeDiscovered { type_model } => Some(type_model.id),
            Message::ComponentAdded { component } => Some(component.id),
            Message::RegistrationSourceAdded { source } => Some(source.id),
            Message::LifetimeScopeBeginning { lifetime_scope } => Some(lifetime_scope.id),
            Message::LifetimeScopeEnding { lifetime_scope_id } => Some(*lifetime_scope_id),
            Message::ResolveOperationBeginning { resolve_operation } => Some(resolve_operation.id),
            Message::ResolveOperationEnding {
                resolve_operation_id, ..
            } => Some(*resolve_operation_id),
            Message::InstanceLookupBeginning { instance_lookup } => Some(instance_lookup.id),
            Message::InstanceLookupEnding {
                instance_lookup_id, ..
            }
            | Message::InstanceLookupCompletionBeginning { instance_lookup_id }
            | Message::InstanceLookupCompletionEnding { instance_lookup_id } => Some(*instance_lookup_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ending_without_error_omits_field() {
        let message = Message::ResolveOperationEnding {
            resolve_operation_id: ObjectId(9),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "kind": "resolve_operation_ending", "resolve_operation_id": 9 })
        );
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let messages = vec![
            Message::LifetimeScopeEnding {
                lifetime_scope_id: ObjectId(1),
            },
            Message::InstanceLookupEnding {
                instance_lookup_id: ObjectId(2),
                new_instance_activated: true,
            },
            Message::InstanceLookupCompletionEnding {
                instance_lookup_id: ObjectId(2),
            },
            Message::ResolveOperationEnding {
                resolve_operation_id: ObjectId(3),
                error: Some(ErrorModel {
                    kind: "x::Boom".into(),
                    message: "boom".into(),
                }),
            },
        ];
        for message in messages {
            let value = serde_json::to_value(&message).unwrap();
            assert_eq!(value["kind"], message.kind());
            let back: Message = serde_json::from_value(value).unwrap();
            assert_eq!(back, message);
        }
    }

    #[test]
    fn test_scope_beginning_shape() {
        let message = Message::LifetimeScopeBeginning {
            lifetime_scope: LifetimeScopeModel {
                id: ObjectId(4),
                parent_id: Some(ObjectId(1)),
                tag: None,
                sequence: 2,
            },
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "kind": "lifetime_scope_beginning",
                "lifetime_scope": { "id": 4, "parent_id": 1, "tag": null, "sequence": 2 }
            })
        );
        assert_eq!(message.subject_id(), Some(ObjectId(4)));
    }
}
