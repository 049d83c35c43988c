//! Model records describing the container to a consumer.
//!
//! Structural models (types, components, registration sources) are sent once
//! and referenced by id afterwards. Runtime models (scopes, operations,
//! lookups) describe one object each and carry the ids of their parents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::ObjectId;
use crate::lifetime::{Lifetime, Ownership};
use crate::type_name::TypeKind;

/// A Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeModel {
    pub id: ObjectId,
    /// Display name with shortened paths, e.g. `Vec<String>`
    pub name: String,
    /// `std::any::type_name` of the type
    pub full_name: String,
    pub kind: TypeKind,
    pub module: Option<String>,
    /// Crate the type is declared in, when the name carries one
    pub crate_name: Option<String>,
    pub generic_definition: Option<String>,
    pub generic_arguments: Vec<String>,
}

/// One service a component satisfies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceModel {
    pub type_id: ObjectId,
    pub key: Option<String>,
    pub description: String,
}

/// How a component's instances are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivatorModel {
    Factory,
    ProvidedInstance,
    /// Produced by a registration generated from a source
    Generated,
}

/// A declared dependency of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyModel {
    pub type_id: ObjectId,
    pub kind: crate::registration::DependencyKind,
    pub name: Option<String>,
}

/// A registered component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentModel {
    pub id: ObjectId,
    pub description: String,
    pub limit_type_id: ObjectId,
    pub services: Vec<ServiceModel>,
    pub lifetime: Lifetime,
    pub ownership: Ownership,
    pub activator: ActivatorModel,
    pub dependencies: Vec<DependencyModel>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// The registration source that generated the component
    pub source_id: Option<ObjectId>,
}

/// A registration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSourceModel {
    pub id: ObjectId,
    pub type_name: String,
    pub description: String,
    pub is_adapter: bool,
}

/// A lifetime scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeScopeModel {
    pub id: ObjectId,
    /// None for a root scope, or a scope attached without its parent
    pub parent_id: Option<ObjectId>,
    pub tag: Option<String>,
    /// Order in which the bridge saw scopes begin, starting at 1
    pub sequence: u64,
}

/// Call stack captured when a resolve operation began.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub frames: Vec<String>,
}

/// A top-level resolve operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOperationModel {
    pub id: ObjectId,
    pub lifetime_scope_id: ObjectId,
    /// Service that was requested
    pub requested: String,
    pub call_stack: Option<StackSnapshot>,
}

/// One component activation attempt inside an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceLookupModel {
    pub id: ObjectId,
    pub resolve_operation_id: ObjectId,
    pub component_id: ObjectId,
    /// Scope sharing the instance, when the bridge has announced it
    pub activation_scope_id: Option<ObjectId>,
}

/// An error that ended a resolve operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorModel {
    /// Qualified kind of the error
    pub kind: String,
    pub message: String,
}

impl From<&crate::error::DiError> for ErrorModel {
    fn from(error: &crate::error::DiError) -> Self {
        Self {
            kind: error.kind_name().to_string(),
            message: error.to_string(),
        }
    }
}
