//! Structural model builder.
//!
//! Turns container objects into model records. Type models are memoized so
//! each distinct type is described once; every other model is built fresh
//! and refers to what it depends on by id.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use crate::container::{InstanceLookup, ResolveOperation, ScopeCore};
use crate::error::{WhiteboxError, WhiteboxResult};
use crate::identity::{IdTracker, ObjectId};
use crate::model::{
    ActivatorModel, ComponentModel, DependencyModel, InstanceLookupModel, LifetimeScopeModel,
    RegistrationSourceModel, ResolveOperationModel, ServiceModel, StackSnapshot, TypeModel,
};
use crate::registration::{ActivatorKind, ComponentRegistration};
use crate::service::TypeDescriptor;
use crate::sources::RegistrationSource;
use crate::type_name::parse_type_name;

/// Builds model records, using an [`IdTracker`] for object identities.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{IdTracker, ModelMapper, TypeDescriptor};
/// use std::sync::Arc;
///
/// let mapper = ModelMapper::new(Arc::new(IdTracker::new()));
/// let (model, new) = mapper.get_or_add_type_model(&TypeDescriptor::of::<Vec<String>>());
/// assert!(new);
/// assert_eq!(model.name, "Vec<String>");
///
/// let (again, new) = mapper.get_or_add_type_model(&TypeDescriptor::of::<Vec<String>>());
/// assert!(!new);
/// assert_eq!(again.id, model.id);
/// ```
pub struct ModelMapper {
    tracker: Arc<IdTracker>,
    types: Mutex<AHashMap<TypeId, Arc<TypeModel>>>,
    scope_sequence: AtomicU64,
}

impl ModelMapper {
    pub fn new(tracker: Arc<IdTracker>) -> Self {
        Self {
            tracker,
            types: Mutex::new(AHashMap::new()),
            scope_sequence: AtomicU64::new(0),
        }
    }

    pub fn tracker(&self) -> &Arc<IdTracker> {
        &self.tracker
    }

    /// The model of `ty`, built on first request. The flag is true for the
    /// one call that built it, even when callers race.
    pub fn get_or_add_type_model(&self, ty: &TypeDescriptor) -> (Arc<TypeModel>, bool) {
        let mut types = self.types.lock();
        if let Some(model) = types.get(&ty.type_id()) {
            return (model.clone(), false);
        }
        let parts = parse_type_name(ty.name());
        let model = Arc::new(TypeModel {
            id: self.tracker.allocate(),
            name: parts.short_name,
            full_name: ty.name().to_string(),
            kind: parts.kind,
            module: parts.module,
            crate_name: parts.crate_name,
            generic_definition: parts.generic_definition,
            generic_arguments: parts.generic_arguments,
        });
        types.insert(ty.type_id(), model.clone());
        (model, true)
    }

    /// Id of an already described type.
    pub fn type_id_of(&self, ty: &TypeDescriptor) -> WhiteboxResult<ObjectId> {
        self.types
            .lock()
            .get(&ty.type_id())
            .map(|model| model.id)
            .ok_or_else(|| WhiteboxError::ContractViolation(format!("type {} was never described", ty)))
    }

    /// Every type a consumer needs described before it can understand the
    /// component: implementation type, service types and declared
    /// dependencies, in first-seen order without duplicates.
    pub fn referenced_types(&self, registration: &ComponentRegistration) -> Vec<TypeDescriptor> {
        let mut seen = AHashSet::new();
        std::iter::once(registration.limit_type())
            .chain(registration.services().iter().map(|s| s.service_type()))
            .chain(registration.dependencies().iter().map(|d| d.ty))
            .filter(|ty| seen.insert(ty.type_id()))
            .collect()
    }

    /// Model of a component. Its referenced types must be described first.
    pub fn component_model(&self, registration: &Arc<ComponentRegistration>) -> WhiteboxResult<ComponentModel> {
        let (id, _) = self.tracker.get_or_assign_id(registration);

        let services = registration
            .services()
            .iter()
            .map(|service| {
                Ok(ServiceModel {
                    type_id: self.type_id_of(&service.service_type())?,
                    key: service.service_key().map(str::to_string),
                    description: service.to_string(),
                })
            })
            .collect::<WhiteboxResult<Vec<_>>>()?;

        let dependencies = registration
            .dependencies()
            .iter()
            .map(|dependency| {
                Ok(DependencyModel {
                    type_id: self.type_id_of(&dependency.ty)?,
                    kind: dependency.kind,
                    name: dependency.name.map(str::to_string),
                })
            })
            .collect::<WhiteboxResult<Vec<_>>>()?;

        let activator = match (registration.generated_by(), registration.activator_kind()) {
            (Some(_), _) => ActivatorModel::Generated,
            (None, ActivatorKind::Factory) => ActivatorModel::Factory,
            (None, ActivatorKind::ProvidedInstance) => ActivatorModel::ProvidedInstance,
        };

        Ok(ComponentModel {
            id,
            description: registration.description(),
            limit_type_id: self.type_id_of(&registration.limit_type())?,
            services,
            lifetime: registration.lifetime(),
            ownership: registration.ownership(),
            activator,
            dependencies,
            metadata: registration.metadata().clone(),
            source_id: registration
                .generated_by()
                .and_then(|source| self.tracker.id_of(source)),
        })
    }

    pub fn registration_source_model(&self, source: &Arc<dyn RegistrationSource>) -> RegistrationSourceModel {
        let (id, _) = self.tracker.get_or_assign_id(source);
        RegistrationSourceModel {
            id,
            type_name: source.source_type_name().to_string(),
            description: source.description(),
            is_adapter: source.is_adapter_for_individual_components(),
        }
    }

    /// Model of a scope whose parent, if any, was already described as `parent`.
    pub fn lifetime_scope_model(&self, scope: &Arc<ScopeCore>, parent: Option<&LifetimeScopeModel>) -> LifetimeScopeModel {
        let (id, _) = self.tracker.get_or_assign_id(scope);
        LifetimeScopeModel {
            id,
            parent_id: parent.map(|p| p.id),
            tag: scope.tag().map(str::to_string),
            sequence: self.scope_sequence.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    pub fn resolve_operation_model(
        &self,
        operation: &Arc<ResolveOperation>,
        scope: &LifetimeScopeModel,
        call_stack: Option<StackSnapshot>,
    ) -> ResolveOperationModel {
        let (id, _) = self.tracker.get_or_assign_id(operation);
        ResolveOperationModel {
            id,
            lifetime_scope_id: scope.id,
            requested: operation.service().to_string(),
            call_stack,
        }
    }

    /// Model of a lookup. Its component must be described first.
    pub fn instance_lookup_model(
        &self,
        lookup: &Arc<InstanceLookup>,
        operation: &ResolveOperationModel,
    ) -> WhiteboxResult<InstanceLookupModel> {
        let component_id = self.tracker.id_of(lookup.registration()).ok_or_else(|| {
            WhiteboxError::ContractViolation(format!(
                "component {} was never described",
                lookup.registration().limit_type()
            ))
        })?;
        let (id, _) = self.tracker.get_or_assign_id(lookup);
        Ok(InstanceLookupModel {
            id,
            resolve_operation_id: operation.id,
            component_id,
            activation_scope_id: self.tracker.id_of(lookup.activation_scope()),
        })
    }

    /// Number of described types.
    pub fn type_count(&self) -> usize {
        self.types.lock().len()
    }
}

impl std::fmt::Debug for ModelMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelMapper")
            .field("tracker", &self.tracker)
            .field("types", &self.type_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::Lifetime;
    use crate::service::Service;

    struct A;
    struct B;
    struct D;
    trait Named: Send + Sync {}
    impl Named for B {}

    fn mapper() -> ModelMapper {
        ModelMapper::new(Arc::new(IdTracker::new()))
    }

    #[test]
    fn test_referenced_types_are_deduplicated_in_order() {
        let mut registration = ComponentRegistration::factory(Lifetime::Transient, |_| Ok(B));
        registration
            .edit::<B>()
            .as_self()
            .as_trait::<dyn Named>(|b| b as Arc<dyn Named>)
            .depends_on::<A>()
            .property::<D>("d")
            .depends_on::<A>();

        let types = mapper().referenced_types(&registration);
        assert_eq!(
            types,
            vec![
                TypeDescriptor::of::<B>(),
                TypeDescriptor::of::<dyn Named>(),
                TypeDescriptor::of::<A>(),
                TypeDescriptor::of::<D>(),
            ]
        );
    }

    #[test]
    fn test_component_model_requires_described_types() {
        let mapper = mapper();
        let registration = Arc::new(ComponentRegistration::factory(Lifetime::Scoped, |_| Ok(A)));
        let err = mapper.component_model(&registration).unwrap_err();
        assert!(matches!(err, WhiteboxError::ContractViolation(_)));

        for ty in mapper.referenced_types(&registration) {
            mapper.get_or_add_type_model(&ty);
        }
        let model = mapper.component_model(&registration).unwrap();
        assert_eq!(model.lifetime, Lifetime::Scoped);
        assert_eq!(model.activator, ActivatorModel::Factory);
        assert_eq!(model.services.len(), 1);
        assert_eq!(model.services[0].type_id, model.limit_type_id);
        assert_eq!(model.services[0].key, None);
    }

    #[test]
    fn test_component_model_carries_metadata_and_keys() {
        let mapper = mapper();
        let mut registration = ComponentRegistration::instance(A);
        registration
            .edit::<A>()
            .keyed("primary")
            .with_metadata("M", 42)
            .with_metadata("N", "B!");
        let registration = Arc::new(registration);
        for ty in mapper.referenced_types(&registration) {
            mapper.get_or_add_type_model(&ty);
        }

        let model = mapper.component_model(&registration).unwrap();
        assert_eq!(model.activator, ActivatorModel::ProvidedInstance);
        assert_eq!(model.services[0].key.as_deref(), Some("primary"));
        assert_eq!(model.metadata["M"], serde_json::json!(42));
        assert_eq!(model.metadata["N"], serde_json::json!("B!"));
        assert_eq!(registration.services(), &[Service::keyed::<A>("primary")]);
    }

    #[test]
    fn test_type_model_memoized_under_races() {
        let mapper = mapper();
        let new_count: usize = crossbeam_utils::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|_| mapper.get_or_add_type_model(&TypeDescriptor::of::<D>()).1 as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        })
        .unwrap();
        assert_eq!(new_count, 1);
        assert_eq!(mapper.type_count(), 1);
    }

    #[test]
    fn test_type_model_describes_generics() {
        let (model, _) = mapper().get_or_add_type_model(&TypeDescriptor::of::<Option<Vec<u8>>>());
        assert_eq!(model.name, "Option<Vec<u8>>");
        assert_eq!(model.crate_name.as_deref(), Some("core"));
        assert_eq!(model.generic_definition.as_deref(), Some("core::option::Option"));
        assert_eq!(model.generic_arguments, vec!["alloc::vec::Vec<u8>"]);
    }
}
