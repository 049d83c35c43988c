//! Component registrations and the registry that holds them.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::container::ResolveContext;
use crate::error::{DiError, DiResult};
use crate::lifetime::{Lifetime, Ownership};
use crate::observer::{ContainerListener, ContainerListeners};
use crate::service::{Service, TypeDescriptor};
use crate::sources::RegistrationSource;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

type Activator = Arc<dyn for<'a> Fn(&ResolveContext<'a>) -> DiResult<AnyArc> + Send + Sync>;
type Caster = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;

/// How a dependency reaches the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Needed to construct the component
    Constructor,
    /// Injected into a field after construction
    Property,
}

/// A dependency declared on a registration.
///
/// Rust has no constructor reflection, so registrations declare the types
/// their factory resolves. Declarations drive the structural model only; the
/// factory still resolves whatever it wants at activation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub ty: TypeDescriptor,
    /// Field name for property dependencies
    pub name: Option<&'static str>,
}

/// Where instances of a component come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivatorKind {
    /// A factory closure creates instances
    Factory,
    /// A single instance was handed to the container
    ProvidedInstance,
}

/// One registered component.
///
/// Registrations are immutable once handed to a container. They are shared
/// behind `Arc`, and the profiling bridge identifies them by that allocation.
pub struct ComponentRegistration {
    limit_type: TypeDescriptor,
    services: Vec<Service>,
    implicit_self_service: bool,
    casters: AHashMap<TypeId, Caster>,
    lifetime: Lifetime,
    ownership: Ownership,
    activator_kind: ActivatorKind,
    dependencies: Vec<Dependency>,
    metadata: BTreeMap<String, serde_json::Value>,
    generated_by: Option<Arc<dyn RegistrationSource>>,
    activator: Activator,
    /// Singleton cache - OnceCell for lock-free access after initialization
    pub(crate) singleton: OnceCell<AnyArc>,
}

impl ComponentRegistration {
    fn with_activator(
        limit_type: TypeDescriptor,
        lifetime: Lifetime,
        ownership: Ownership,
        activator_kind: ActivatorKind,
        activator: Activator,
    ) -> Self {
        Self {
            limit_type,
            services: vec![Service::Typed(limit_type)],
            implicit_self_service: true,
            casters: AHashMap::new(),
            lifetime,
            ownership,
            activator_kind,
            dependencies: Vec::new(),
            metadata: BTreeMap::new(),
            generated_by: None,
            activator,
            singleton: OnceCell::new(),
        }
    }

    /// Creates a registration whose instances come from `factory`.
    ///
    /// Errors from nested resolution propagate unchanged through `?`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_whitebox::{ComponentRegistration, Lifetime, Service};
    ///
    /// struct Clock;
    /// let registration = ComponentRegistration::factory(Lifetime::Transient, |_| Ok(Clock));
    /// assert_eq!(registration.services(), &[Service::of::<Clock>()]);
    /// assert_eq!(registration.lifetime(), Lifetime::Transient);
    /// ```
    pub fn factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let activator = move |ctx: &ResolveContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(ctx)?))
        };
        Self::with_activator(
            TypeDescriptor::of::<T>(),
            lifetime,
            Ownership::OwnedByLifetimeScope,
            ActivatorKind::Factory,
            Arc::new(activator),
        )
    }

    /// Creates a registration whose factory fails with its own error type.
    ///
    /// A returned error becomes [`DiError::Activation`] carrying the error's
    /// type name and message, except a `DiError`, which passes through as is.
    pub fn fallible<T, E, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> Result<T, E> + Send + Sync + 'static,
    {
        let activator = move |ctx: &ResolveContext<'_>| -> DiResult<AnyArc> {
            match factory(ctx) {
                Ok(value) => Ok(Arc::new(value)),
                Err(err) => {
                    if let Some(di) = (&err as &dyn Any).downcast_ref::<DiError>() {
                        return Err(di.clone());
                    }
                    Err(DiError::Activation {
                        component: std::any::type_name::<T>(),
                        kind: std::any::type_name::<E>(),
                        message: err.to_string(),
                    })
                }
            }
        };
        Self::with_activator(
            TypeDescriptor::of::<T>(),
            lifetime,
            Ownership::OwnedByLifetimeScope,
            ActivatorKind::Factory,
            Arc::new(activator),
        )
    }

    /// Creates a registration around an existing instance.
    ///
    /// The instance is externally owned and shared; lookups never report it as
    /// newly activated.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        let value: AnyArc = Arc::new(value);
        let activator = move |_: &ResolveContext<'_>| -> DiResult<AnyArc> { Ok(value.clone()) };
        Self::with_activator(
            TypeDescriptor::of::<T>(),
            Lifetime::Singleton,
            Ownership::ExternallyOwned,
            ActivatorKind::ProvidedInstance,
            Arc::new(activator),
        )
    }

    /// Fluent editing of a registration whose limit type is `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the registration's limit type.
    pub fn edit<T: Send + Sync + 'static>(&mut self) -> RegistrationBuilder<'_, T> {
        assert_eq!(
            self.limit_type,
            TypeDescriptor::of::<T>(),
            "registration for {} edited as {}",
            self.limit_type,
            std::any::type_name::<T>()
        );
        RegistrationBuilder::new(self)
    }

    /// Implementation type of the component.
    pub fn limit_type(&self) -> TypeDescriptor {
        self.limit_type
    }

    /// Services the component can satisfy.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn activator_kind(&self) -> ActivatorKind {
        self.activator_kind
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Metadata attached at registration time.
    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// The registration source that generated this registration, if any.
    pub fn generated_by(&self) -> Option<&Arc<dyn RegistrationSource>> {
        self.generated_by.as_ref()
    }

    /// Human readable summary, e.g. `Activator = Foo (Factory), Services = [Foo]`.
    pub fn description(&self) -> String {
        let services: Vec<String> = self.services.iter().map(|s| s.to_string()).collect();
        format!(
            "Activator = {} ({:?}), Services = [{}], Lifetime = {:?}, Ownership = {:?}",
            self.limit_type,
            self.activator_kind,
            services.join(", "),
            self.lifetime,
            self.ownership
        )
    }

    pub(crate) fn activate(&self, ctx: &ResolveContext<'_>) -> DiResult<AnyArc> {
        (self.activator)(ctx)
    }

    /// Converts an activated instance into the shape `service` is stored as.
    pub(crate) fn instance_for(&self, instance: AnyArc, service: &Service) -> DiResult<AnyArc> {
        let ty = service.service_type();
        if ty == self.limit_type {
            return Ok(instance);
        }
        match self.casters.get(&ty.type_id()) {
            Some(cast) => cast(instance),
            None => Err(DiError::TypeMismatch(ty.name())),
        }
    }

    pub(crate) fn set_generated_by(&mut self, source: Arc<dyn RegistrationSource>) {
        self.generated_by = Some(source);
    }

    fn add_service(&mut self, service: Service) {
        if self.implicit_self_service {
            self.services.clear();
            self.implicit_self_service = false;
        }
        if !self.services.contains(&service) {
            self.services.push(service);
        }
    }
}

impl fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("limit_type", &self.limit_type)
            .field("services", &self.services)
            .field("lifetime", &self.lifetime)
            .field("ownership", &self.ownership)
            .field("activator_kind", &self.activator_kind)
            .field("dependencies", &self.dependencies)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Fluent configuration of a [`ComponentRegistration`] with limit type `T`.
///
/// # Examples
///
/// ```rust
/// use ferrous_whitebox::{ContainerBuilder, DependencyKind, Resolver};
///
/// struct A;
/// struct D;
/// struct B;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton(|_| Ok(A));
/// builder.register_singleton(|_| Ok(D));
/// builder
///     .register_transient(|ctx| {
///         let _a = ctx.resolve::<A>()?;
///         Ok(B)
///     })
///     .depends_on::<A>()
///     .property::<D>("d")
///     .with_metadata("M", 42)
///     .with_metadata("N", "B!");
///
/// let container = builder.build();
/// assert!(container.root().resolve::<B>().is_ok());
/// ```
pub struct RegistrationBuilder<'a, T> {
    registration: &'a mut ComponentRegistration,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> RegistrationBuilder<'a, T> {
    pub(crate) fn new(registration: &'a mut ComponentRegistration) -> Self {
        Self {
            registration,
            _marker: PhantomData,
        }
    }

    /// Exposes the component as its own type. Implied until another service is added.
    pub fn as_self(self) -> Self {
        self.registration.add_service(Service::of::<T>());
        self
    }

    /// Exposes the component under `key`.
    pub fn keyed(self, key: &'static str) -> Self {
        self.registration.add_service(Service::keyed::<T>(key));
        self
    }

    /// Exposes the component as the trait object `I`.
    ///
    /// `cast` performs the unsizing coercion, typically `|c| c as Arc<dyn I>`.
    pub fn as_trait<I>(self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let caster = move |instance: AnyArc| -> DiResult<AnyArc> {
            let concrete = instance
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            Ok(Arc::new(cast(concrete)))
        };
        let service = Service::of::<I>();
        self.registration
            .casters
            .insert(service.service_type().type_id(), Arc::new(caster));
        self.registration.add_service(service);
        self
    }

    /// Declares a dependency the factory resolves to construct the component.
    pub fn depends_on<D: ?Sized + 'static>(self) -> Self {
        self.registration.dependencies.push(Dependency {
            kind: DependencyKind::Constructor,
            ty: TypeDescriptor::of::<D>(),
            name: None,
        });
        self
    }

    /// Declares a dependency injected into the field `name`.
    pub fn property<D: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.registration.dependencies.push(Dependency {
            kind: DependencyKind::Property,
            ty: TypeDescriptor::of::<D>(),
            name: Some(name),
        });
        self
    }

    /// Attaches a metadata entry; a repeated key replaces the earlier value.
    pub fn with_metadata(self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.registration.metadata.insert(key.into(), value.into());
        self
    }

    /// Marks instances as owned outside the container.
    pub fn externally_owned(self) -> Self {
        self.registration.ownership = Ownership::ExternallyOwned;
        self
    }
}

#[derive(Default)]
struct RegistryState {
    registrations: Vec<Arc<ComponentRegistration>>,
    /// Last registration for a service wins
    defaults: AHashMap<Service, Arc<ComponentRegistration>>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    /// Allocation addresses of `registrations`
    owned: AHashSet<usize>,
}

impl RegistryState {
    fn insert(&mut self, registration: Arc<ComponentRegistration>) {
        for service in registration.services() {
            self.defaults.insert(*service, registration.clone());
        }
        self.owned.insert(Arc::as_ptr(&registration) as usize);
        self.registrations.push(registration);
    }
}

/// Component registry, optionally layered over a parent scope's registry.
///
/// Each layer owns the listeners added where it was built. A registration
/// made in a layer is announced to the listeners of that layer and of every
/// parent layer, so listeners added for a child scope go away with it.
///
/// Listeners are told about every registration and source while the write
/// lock is held, so no lookup can observe a registration before its
/// announcement has been handed out.
pub(crate) struct Registry {
    parent: Option<Arc<Registry>>,
    state: RwLock<RegistryState>,
    listeners: ContainerListeners,
}

impl Registry {
    pub(crate) fn new(parent: Option<Arc<Registry>>) -> Self {
        Self {
            parent,
            state: RwLock::new(RegistryState::default()),
            listeners: ContainerListeners::default(),
        }
    }

    /// Listeners owned by this layer only.
    pub(crate) fn listeners(&self) -> &ContainerListeners {
        &self.listeners
    }

    /// Adds `listener` to this layer unless this layer or a parent already
    /// has it. Returns whether it was added.
    pub(crate) fn add_listener(&self, listener: Arc<dyn ContainerListener>) -> bool {
        if self.has_listener(&listener) {
            return false;
        }
        self.listeners.add(listener);
        true
    }

    fn has_listener(&self, listener: &Arc<dyn ContainerListener>) -> bool {
        self.listeners.contains(listener)
            || self
                .parent
                .as_ref()
                .map_or(false, |parent| parent.has_listener(listener))
    }

    /// Listeners of this layer and its parents, outermost first.
    fn visible_listeners(&self) -> Vec<Arc<dyn ContainerListener>> {
        let mut all = self
            .parent
            .as_ref()
            .map(|parent| parent.visible_listeners())
            .unwrap_or_default();
        all.extend(self.listeners.snapshot());
        all
    }

    fn announce_registration(&self, registration: &Arc<ComponentRegistration>) {
        for listener in self.visible_listeners() {
            listener.component_registration_attached(registration);
        }
    }

    pub(crate) fn register(&self, registration: ComponentRegistration) -> Arc<ComponentRegistration> {
        let registration = Arc::new(registration);
        let mut state = self.state.write();
        state.insert(registration.clone());
        self.announce_registration(&registration);
        registration
    }

    pub(crate) fn add_source(&self, source: Arc<dyn RegistrationSource>) {
        let mut state = self.state.write();
        state.sources.push(source.clone());
        for listener in self.visible_listeners() {
            listener.registration_source_attached(&source);
        }
    }

    /// Finds the registration for `service`, asking registration sources when
    /// no explicit registration exists.
    pub(crate) fn registration_for(&self, service: &Service) -> Option<Arc<ComponentRegistration>> {
        self.find(service).or_else(|| self.generate(service))
    }

    fn find(&self, service: &Service) -> Option<Arc<ComponentRegistration>> {
        if let Some(found) = self.state.read().defaults.get(service).cloned() {
            return Some(found);
        }
        self.parent.as_ref().and_then(|parent| parent.find(service))
    }

    fn generate(&self, service: &Service) -> Option<Arc<ComponentRegistration>> {
        {
            let mut state = self.state.write();
            // Another thread may have generated it while we waited
            if let Some(found) = state.defaults.get(service).cloned() {
                return Some(found);
            }
            let sources = state.sources.clone();
            for source in sources {
                let mut found = None;
                for mut generated in source.registrations_for(service) {
                    generated.set_generated_by(source.clone());
                    let generated = Arc::new(generated);
                    state.insert(generated.clone());
                    self.announce_registration(&generated);
                    if generated.services().contains(service) {
                        found = Some(generated);
                    }
                }
                if found.is_some() {
                    return found;
                }
            }
        }
        self.parent.as_ref().and_then(|parent| parent.generate(service))
    }

    /// Whether `registration` lives in this layer rather than a parent's.
    pub(crate) fn owns(&self, registration: &Arc<ComponentRegistration>) -> bool {
        self.state
            .read()
            .owned
            .contains(&(Arc::as_ptr(registration) as usize))
    }

    /// Registrations visible from this registry, parents first.
    pub(crate) fn visible_registrations(&self) -> Vec<Arc<ComponentRegistration>> {
        let mut all = self
            .parent
            .as_ref()
            .map(|parent| parent.visible_registrations())
            .unwrap_or_default();
        all.extend(self.state.read().registrations.iter().cloned());
        all
    }

    /// Sources visible from this registry, parents first.
    pub(crate) fn visible_sources(&self) -> Vec<Arc<dyn RegistrationSource>> {
        let mut all = self
            .parent
            .as_ref()
            .map(|parent| parent.visible_sources())
            .unwrap_or_default();
        all.extend(self.state.read().sources.iter().cloned());
        all
    }
}
