//! Lifetime scopes: instance sharing and the scope lifecycle events.

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use super::operation::ResolveOperation;
use super::ContainerBuilder;
use crate::error::{DiError, DiResult};
use crate::observer::{Listeners, ScopeListener};
use crate::registration::{AnyArc, ComponentRegistration, Registry};
use crate::service::Service;
use crate::traits::ResolverCore;

/// Tag carried by every container's root scope.
pub const ROOT_TAG: &str = "root";

/// Shared state of one lifetime scope.
///
/// Listener callbacks receive scopes as `&Arc<ScopeCore>`: the allocation is
/// the scope's identity. The user-facing handle is [`LifetimeScope`].
pub struct ScopeCore {
    parent: Option<Arc<ScopeCore>>,
    tag: Option<String>,
    registry: Arc<Registry>,
    /// Shared instances keyed by registration address
    shared: Mutex<AHashMap<usize, AnyArc>>,
    listeners: Listeners<dyn ScopeListener>,
    /// Held shared while events that must precede the ending fire, and
    /// exclusively while the scope is marked ended
    lifecycle: RwLock<()>,
    ended: AtomicBool,
}

impl ScopeCore {
    fn new(parent: Option<Arc<ScopeCore>>, tag: Option<String>, registry: Arc<Registry>) -> Self {
        Self {
            parent,
            tag,
            registry,
            shared: Mutex::new(AHashMap::new()),
            listeners: Listeners::default(),
            lifecycle: RwLock::new(()),
            ended: AtomicBool::new(false),
        }
    }

    pub fn parent(&self) -> Option<&Arc<ScopeCore>> {
        self.parent.as_ref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// The outermost ancestor of this scope.
    pub fn root(self: &Arc<Self>) -> Arc<ScopeCore> {
        let mut current = self.clone();
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        current
    }

    /// Subscribes `listener` to this scope's lifecycle events.
    ///
    /// Returns false, without subscribing, when the scope has already ended.
    /// A listener that was subscribed always receives `scope_ending`.
    pub fn subscribe(&self, listener: Arc<dyn ScopeListener>) -> bool {
        let _lifecycle = self.lifecycle.read_recursive();
        if self.is_ended() {
            return false;
        }
        self.listeners.add(listener);
        true
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub(crate) fn resolve(self: &Arc<Self>, service: &Service) -> DiResult<AnyArc> {
        let operation = {
            let _lifecycle = self.lifecycle.read_recursive();
            if self.is_ended() {
                return Err(DiError::ScopeEnded);
            }
            let operation = Arc::new(ResolveOperation::new(self.clone(), *service));
            for listener in self.listeners.snapshot() {
                listener.resolve_operation_beginning(self, &operation);
            }
            operation
        };
        operation.execute()
    }

    /// The scope that shares instances of `registration` for lookups in this one.
    ///
    /// Singletons live in the outermost scope that can see their registration;
    /// everything else is shared (if at all) by the resolving scope.
    pub(crate) fn sharing_scope(self: &Arc<Self>, registration: &Arc<ComponentRegistration>) -> Arc<ScopeCore> {
        let mut owner = None;
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if scope.registry.owns(registration) {
                current = scope.parent.clone();
                owner = Some(scope);
            } else if owner.is_some() {
                break;
            } else {
                current = scope.parent.clone();
            }
        }
        owner.unwrap_or_else(|| self.root())
    }

    /// Returns the instance this scope shares for `registration`, creating it
    /// with `create` on first use. The flag is true when `create` produced it.
    pub(crate) fn shared_instance(
        &self,
        registration: &Arc<ComponentRegistration>,
        create: impl FnOnce() -> DiResult<AnyArc>,
    ) -> DiResult<(AnyArc, bool)> {
        let key = Arc::as_ptr(registration) as usize;
        if let Some(existing) = self.shared.lock().get(&key) {
            return Ok((existing.clone(), false));
        }

        // Create without holding the lock; nested lookups may need it
        let created = create()?;

        match self.shared.lock().entry(key) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                slot.insert(created.clone());
                Ok((created, true))
            }
        }
    }

    fn begin_child(self: &Arc<Self>, tag: Option<String>, registry: Arc<Registry>) -> Arc<ScopeCore> {
        if self.is_ended() {
            tracing::warn!(parent_tag = ?self.tag, "beginning a child of an ended lifetime scope");
        }
        let child = Arc::new(ScopeCore::new(Some(self.clone()), tag, registry));
        let _lifecycle = self.lifecycle.read_recursive();
        for listener in self.listeners.snapshot() {
            listener.child_scope_beginning(self, &child);
        }
        child
    }

    /// Marks the scope ended, then tells its listeners. Resolutions and child
    /// scopes that began before the mark have announced themselves by then;
    /// later ones see the scope ended. Must not be called from a listener
    /// callback fired by this scope.
    fn end(self: &Arc<Self>) {
        {
            let _lifecycle = self.lifecycle.write();
            if self.ended.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        for listener in self.listeners.snapshot() {
            listener.scope_ending(self);
        }
        self.listeners.clear();
        self.shared.lock().clear();
    }
}

impl fmt::Debug for ScopeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeCore")
            .field("tag", &self.tag)
            .field("is_root", &self.is_root())
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Handle to a lifetime scope.
///
/// A scope caches the instances of scoped components it resolves and owns
/// nested child scopes. It ends when [`end`](LifetimeScope::end) is called or
/// when the handle is dropped, whichever comes first; an ended scope refuses
/// further resolution with [`DiError::ScopeEnded`].
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{ContainerBuilder, DiError, Resolver};
/// use std::sync::Arc;
///
/// struct RequestContext;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_scoped(|_| Ok(RequestContext));
/// let container = builder.build();
///
/// let request = container.root().begin_tagged_scope("request");
/// assert_eq!(request.tag(), Some("request"));
///
/// let first = request.resolve::<RequestContext>().unwrap();
/// let second = request.resolve::<RequestContext>().unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
///
/// request.end();
/// assert!(matches!(request.resolve::<RequestContext>(), Err(DiError::ScopeEnded)));
/// ```
pub struct LifetimeScope {
    core: Arc<ScopeCore>,
}

impl LifetimeScope {
    pub(crate) fn root(registry: Arc<Registry>) -> Self {
        Self {
            core: Arc::new(ScopeCore::new(None, Some(ROOT_TAG.to_string()), registry)),
        }
    }

    /// The shared scope state, as listeners see it.
    pub fn core(&self) -> &Arc<ScopeCore> {
        &self.core
    }

    pub fn tag(&self) -> Option<&str> {
        self.core.tag()
    }

    pub fn is_ended(&self) -> bool {
        self.core.is_ended()
    }

    /// Subscribes `listener` to this scope's lifecycle events. Returns false
    /// when the scope has already ended.
    pub fn subscribe(&self, listener: Arc<dyn ScopeListener>) -> bool {
        self.core.subscribe(listener)
    }

    /// Begins an untagged child scope.
    pub fn begin_scope(&self) -> LifetimeScope {
        self.begin_child(None, None::<fn(&mut ContainerBuilder)>)
    }

    /// Begins a child scope carrying `tag`.
    pub fn begin_tagged_scope(&self, tag: impl Into<String>) -> LifetimeScope {
        self.begin_child(Some(tag.into()), None::<fn(&mut ContainerBuilder)>)
    }

    /// Begins a child scope with registrations of its own, layered over this
    /// scope's registrations.
    ///
    /// Container listeners added by `configure` hear about registrations made
    /// in the child and its descendants, and their `container_built` callback
    /// receives the child. They are released with the child's registrations.
    ///
    /// ```
    /// use ferrous_whitebox::{ContainerBuilder, Resolver};
    ///
    /// struct Handler;
    ///
    /// let container = ContainerBuilder::new().build();
    /// let child = container.root().begin_scope_with(|builder| {
    ///     builder.register_transient(|_| Ok(Handler));
    /// });
    ///
    /// assert!(child.resolve::<Handler>().is_ok());
    /// assert!(container.root().resolve::<Handler>().is_err());
    /// ```
    pub fn begin_scope_with(&self, configure: impl FnOnce(&mut ContainerBuilder)) -> LifetimeScope {
        self.begin_child(None, Some(configure))
    }

    /// Begins a tagged child scope with registrations of its own.
    pub fn begin_tagged_scope_with(
        &self,
        tag: impl Into<String>,
        configure: impl FnOnce(&mut ContainerBuilder),
    ) -> LifetimeScope {
        self.begin_child(Some(tag.into()), Some(configure))
    }

    fn begin_child<C>(&self, tag: Option<String>, configure: Option<C>) -> LifetimeScope
    where
        C: FnOnce(&mut ContainerBuilder),
    {
        let mut started = Vec::new();
        let registry = match configure {
            Some(configure) => {
                let mut builder = ContainerBuilder::new();
                configure(&mut builder);
                started = builder.listeners.clone();
                let registry = Arc::new(Registry::new(Some(self.core.registry.clone())));
                builder.populate(&registry);
                registry
            }
            None => self.core.registry.clone(),
        };
        let child = LifetimeScope {
            core: self.core.begin_child(tag, registry),
        };
        // Listeners added by the child's own builder start with the child
        for listener in started {
            listener.container_built(&child);
        }
        child
    }

    /// Ends the scope. Idempotent; also happens on drop.
    pub fn end(&self) {
        self.core.end();
    }
}

impl ResolverCore for LifetimeScope {
    fn resolve_service(&self, service: &Service) -> DiResult<AnyArc> {
        self.core.resolve(service)
    }

    fn is_registered(&self, service: &Service) -> bool {
        self.core.registry.registration_for(service).is_some()
    }
}

impl Drop for LifetimeScope {
    fn drop(&mut self) {
        self.core.end();
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ContainerListener;
    use crate::sources::{FnSource, RegistrationSource};
    use crate::traits::Resolver;
    use crate::{MemoryQueue, ProfilingBridge};
    use std::sync::atomic::AtomicUsize;

    struct Widget;
    struct Gadget;

    #[derive(Default)]
    struct CountingListener {
        registrations: AtomicUsize,
    }

    impl ContainerListener for CountingListener {
        fn component_registration_attached(&self, _registration: &Arc<ComponentRegistration>) {
            self.registrations.fetch_add(1, Ordering::SeqCst);
        }

        fn registration_source_attached(&self, _source: &Arc<dyn RegistrationSource>) {}
    }

    fn root_listener_count(scope: &LifetimeScope) -> usize {
        scope.core().root().registry().listeners().len()
    }

    #[test]
    fn test_child_builder_listeners_do_not_outlive_the_child() {
        let bridge = ProfilingBridge::new(MemoryQueue::new());
        let container = ContainerBuilder::new().build();

        for _ in 0..1000 {
            let child = container.root().begin_scope_with(|builder| {
                builder.register_module(&bridge);
            });
            assert_eq!(child.core().registry().listeners().len(), 1);
            child.end();
        }
        assert_eq!(root_listener_count(container.root()), 0);
    }

    #[test]
    fn test_container_listener_is_not_repeated_in_children() {
        let bridge = ProfilingBridge::new(MemoryQueue::new());
        let mut builder = ContainerBuilder::new();
        builder.register_module(&bridge);
        builder.register_module(&bridge);
        let container = builder.build();
        assert_eq!(root_listener_count(container.root()), 1);

        let scope = container.begin_scope();
        for _ in 0..10 {
            let child = scope.begin_scope_with(|builder| {
                builder.register_module(&bridge);
            });
            assert_eq!(child.core().registry().listeners().len(), 0);
            bridge.attach_to_scope(&child);
            bridge.attach_to_scope(&scope);
        }
        assert_eq!(root_listener_count(container.root()), 1);
    }

    #[test]
    fn test_child_listeners_hear_child_registrations_only_while_alive() {
        let counter = Arc::new(CountingListener::default());
        let mut builder = ContainerBuilder::new();
        builder.register_source(FnSource::new("gadgets", |service: &Service| {
            if *service == Service::of::<Gadget>() {
                vec![ComponentRegistration::factory(crate::Lifetime::Transient, |_| Ok(Gadget))]
            } else {
                Vec::new()
            }
        }));
        let container = builder.build();

        let child = container.root().begin_scope_with(|builder| {
            builder.add_listener(counter.clone());
            builder.register_transient(|_| Ok(Widget));
        });
        assert_eq!(counter.registrations.load(Ordering::SeqCst), 1);
        drop(child);

        // Generated in the root registry after the child is gone
        assert!(container.root().resolve::<Gadget>().is_ok());
        assert_eq!(counter.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(root_listener_count(container.root()), 0);
    }

    #[test]
    fn test_ended_scope_refuses_subscriptions() {
        struct Quiet;
        impl ScopeListener for Quiet {
            fn child_scope_beginning(&self, _parent: &Arc<ScopeCore>, _child: &Arc<ScopeCore>) {}
            fn resolve_operation_beginning(&self, _scope: &Arc<ScopeCore>, _operation: &Arc<ResolveOperation>) {}
            fn scope_ending(&self, _scope: &Arc<ScopeCore>) {}
        }

        let container = ContainerBuilder::new().build();
        let scope = container.begin_scope();
        assert!(scope.subscribe(Arc::new(Quiet)));
        scope.end();
        assert!(!scope.subscribe(Arc::new(Quiet)));
    }
}
