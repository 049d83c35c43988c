//! The observed container.
//!
//! A compact dependency injection container whose registration and
//! resolution pipeline reports every step through the listener traits in
//! [`crate::observer`]. The profiling bridge is one such listener; anything
//! else implementing the traits sees the same events.

use std::sync::Arc;

use crate::error::DiResult;
use crate::lifetime::Lifetime;
use crate::observer::ContainerListener;
use crate::registration::{ComponentRegistration, RegistrationBuilder, Registry};
use crate::sources::RegistrationSource;

mod module;
mod operation;
mod scope;

pub use module::Module;
pub use operation::{InstanceLookup, ResolveContext, ResolveOperation};
pub use scope::{LifetimeScope, ScopeCore, ROOT_TAG};

/// Collects registrations, registration sources and listeners, then builds a
/// [`Container`].
///
/// The same builder type configures the extra registrations of a child scope
/// (see [`LifetimeScope::begin_scope_with`]).
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// struct Database;
/// struct Repository {
///     db: Arc<Database>,
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton(|_| Ok(Database));
/// builder
///     .register_transient(|ctx| Ok(Repository { db: ctx.resolve::<Database>()? }))
///     .depends_on::<Database>();
///
/// let container = builder.build();
/// let first = container.root().resolve::<Repository>().unwrap();
/// let second = container.root().resolve::<Repository>().unwrap();
/// assert!(!Arc::ptr_eq(&first, &second));
/// assert!(Arc::ptr_eq(&first.db, &second.db));
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    registrations: Vec<ComponentRegistration>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    listeners: Vec<Arc<dyn ContainerListener>>,
}

impl ContainerBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    // ----- Component Registrations -----

    /// Registers a component built by `factory`, shared through the root scope.
    pub fn register_singleton<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory(Lifetime::Singleton, factory)
    }

    /// Registers a component built by `factory`, shared per lifetime scope.
    pub fn register_scoped<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory(Lifetime::Scoped, factory)
    }

    /// Registers a component built by `factory` on every lookup.
    pub fn register_transient<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory(Lifetime::Transient, factory)
    }

    /// Registers a factory component with an explicit lifetime.
    pub fn register_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.push(ComponentRegistration::factory(lifetime, factory))
    }

    /// Registers a factory that fails with its own error type.
    ///
    /// ```
    /// use ferrous_whitebox::{ContainerBuilder, DiError, Lifetime, Resolver};
    ///
    /// struct Connection;
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register_fallible(Lifetime::Transient, |_| -> Result<Connection, std::io::Error> {
    ///     Err(std::io::Error::new(std::io::ErrorKind::Other, "refused"))
    /// });
    ///
    /// let container = builder.build();
    /// match container.root().resolve::<Connection>() {
    ///     Err(DiError::Activation { kind, message, .. }) => {
    ///         assert_eq!(kind, "std::io::error::Error");
    ///         assert_eq!(message, "refused");
    ///     }
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn register_fallible<T, E, F>(&mut self, lifetime: Lifetime, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.push(ComponentRegistration::fallible(lifetime, factory))
    }

    /// Registers an existing instance. It is externally owned and shared.
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, value: T) -> RegistrationBuilder<'_, T> {
        self.push(ComponentRegistration::instance(value))
    }

    /// Registers a prepared registration.
    pub fn register_component(&mut self, registration: ComponentRegistration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    /// Registers a source consulted for services without a registration.
    pub fn register_source(&mut self, source: impl RegistrationSource) -> &mut Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Registers a shared source.
    pub fn register_source_arc(&mut self, source: Arc<dyn RegistrationSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Lets `module` add its registrations and listeners.
    pub fn register_module<M: Module + ?Sized>(&mut self, module: &M) -> &mut Self {
        module.load(self);
        self
    }

    /// Attaches a listener for registration-time events.
    pub fn add_listener(&mut self, listener: Arc<dyn ContainerListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    fn push<T: Send + Sync + 'static>(&mut self, registration: ComponentRegistration) -> RegistrationBuilder<'_, T> {
        let slot = self.registrations.len();
        self.registrations.push(registration);
        RegistrationBuilder::new(&mut self.registrations[slot])
    }

    /// Builds the container.
    ///
    /// Listeners see every registration, in registration order, then every
    /// source, then the root scope.
    pub fn build(self) -> Container {
        let registry = Arc::new(Registry::new(None));
        self.populate(&registry);

        let root = LifetimeScope::root(registry.clone());
        tracing::debug!("container built");
        registry.listeners().container_built(&root);
        Container { root }
    }

    /// Moves everything into `registry`, announcing it to the listeners of
    /// `registry` and its parents. A listener a parent already has is not
    /// added again.
    pub(crate) fn populate(self, registry: &Registry) {
        for listener in self.listeners {
            registry.add_listener(listener);
        }
        for registration in self.registrations {
            registry.register(registration);
        }
        for source in self.sources {
            registry.add_source(source);
        }
    }
}

/// A built container. Owns the root lifetime scope, which ends when the
/// container is dropped.
#[derive(Debug)]
pub struct Container {
    root: LifetimeScope,
}

impl Container {
    /// The root lifetime scope.
    pub fn root(&self) -> &LifetimeScope {
        &self.root
    }

    /// Begins a child of the root scope.
    pub fn begin_scope(&self) -> LifetimeScope {
        self.root.begin_scope()
    }

    /// Begins a tagged child of the root scope.
    pub fn begin_tagged_scope(&self, tag: impl Into<String>) -> LifetimeScope {
        self.root.begin_tagged_scope(tag)
    }
}
