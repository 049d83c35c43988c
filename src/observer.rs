//! Container extension points.
//!
//! The observed container reports its lifecycle through four listener
//! traits, one per emitting object. Listeners are attached with an explicit
//! `subscribe` call on the emitter and receive the emitter itself with every
//! callback, so an implementation can carry its own context (for example the
//! model of its parent) instead of capturing shared state.
//!
//! Callbacks run synchronously on the thread doing the container work. Keep
//! implementations lightweight; queue expensive work elsewhere.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::container::{InstanceLookup, LifetimeScope, ResolveOperation, ScopeCore};
use crate::error::DiError;
use crate::registration::ComponentRegistration;
use crate::sources::RegistrationSource;

/// Registration-time hooks, fired independently of any scope.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{
///     ComponentRegistration, ContainerBuilder, ContainerListener, RegistrationSource,
/// };
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct CountingListener {
///     registrations: AtomicUsize,
/// }
///
/// impl ContainerListener for CountingListener {
///     fn component_registration_attached(&self, _registration: &Arc<ComponentRegistration>) {
///         self.registrations.fetch_add(1, Ordering::SeqCst);
///     }
///
///     fn registration_source_attached(&self, _source: &Arc<dyn RegistrationSource>) {}
/// }
///
/// let listener = Arc::new(CountingListener::default());
/// let mut builder = ContainerBuilder::new();
/// builder.add_listener(listener.clone());
/// builder.register_instance(1u8);
/// builder.register_instance(2u16);
/// let _container = builder.build();
///
/// assert_eq!(listener.registrations.load(Ordering::SeqCst), 2);
/// ```
pub trait ContainerListener: Send + Sync {
    /// A component registration became visible to resolution.
    fn component_registration_attached(&self, registration: &Arc<ComponentRegistration>);

    /// A registration source became available.
    fn registration_source_attached(&self, source: &Arc<dyn RegistrationSource>);

    /// The builder this listener was added to finished building. `scope` is
    /// the root scope, or the child scope when the builder configured one.
    fn container_built(&self, _scope: &LifetimeScope) {}
}

/// Lifetime hooks on a scope.
pub trait ScopeListener: Send + Sync {
    /// A child scope of `parent` began. Fired before the child is handed out.
    fn child_scope_beginning(&self, parent: &Arc<ScopeCore>, child: &Arc<ScopeCore>);

    /// A top-level resolve started on `scope`.
    fn resolve_operation_beginning(&self, scope: &Arc<ScopeCore>, operation: &Arc<ResolveOperation>);

    /// The scope is ending. Fired exactly once.
    fn scope_ending(&self, scope: &Arc<ScopeCore>);
}

/// Lifetime hooks on a resolve operation.
pub trait OperationListener: Send + Sync {
    /// The operation started activating a component.
    fn instance_lookup_beginning(&self, operation: &Arc<ResolveOperation>, lookup: &Arc<InstanceLookup>);

    /// The operation finished; `error` is the failure it ended with, if any.
    ///
    /// Fired exactly once, including when a factory panicked.
    fn operation_ending(&self, operation: &Arc<ResolveOperation>, error: Option<&DiError>);
}

/// Lifetime hooks on an instance lookup.
pub trait LookupListener: Send + Sync {
    /// The lookup produced an instance, or failed.
    ///
    /// `new_instance` is true only when a component was activated, as opposed
    /// to a shared instance being reused. Failed lookups report false.
    fn instance_lookup_ending(&self, lookup: &Arc<InstanceLookup>, new_instance: bool);

    /// Post-activation completion started. Only successful lookups complete.
    fn completion_beginning(&self, _lookup: &Arc<InstanceLookup>) {}

    /// Post-activation completion finished.
    fn completion_ending(&self, _lookup: &Arc<InstanceLookup>) {}
}

/// Listeners subscribed to one emitter.
///
/// Emitters take a snapshot before firing so a callback may subscribe further
/// listeners without deadlocking.
pub(crate) struct Listeners<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> Listeners<L> {
    pub(crate) fn add(&self, listener: Arc<L>) {
        self.listeners.write().push(listener);
    }

    /// Whether this exact listener allocation is subscribed.
    pub(crate) fn contains(&self, listener: &Arc<L>) -> bool {
        let wanted = Arc::as_ptr(listener) as *const ();
        self.listeners
            .read()
            .iter()
            .any(|existing| Arc::as_ptr(existing) as *const () == wanted)
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.read().clone()
    }

    pub(crate) fn clear(&self) {
        self.listeners.write().clear();
    }
}

pub(crate) type ContainerListeners = Listeners<dyn ContainerListener>;

impl Listeners<dyn ContainerListener> {
    pub(crate) fn container_built(&self, root: &LifetimeScope) {
        for listener in self.snapshot() {
            listener.container_built(root);
        }
    }
}
