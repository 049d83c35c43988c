//! Resolve operations and the instance lookups inside them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use super::scope::ScopeCore;
use crate::error::{DiError, DiResult};
use crate::lifetime::Lifetime;
use crate::observer::{Listeners, LookupListener, OperationListener};
use crate::registration::{ActivatorKind, AnyArc, ComponentRegistration};
use crate::service::Service;
use crate::traits::ResolverCore;

#[derive(Default)]
struct OperationState {
    /// Components being activated, outermost first
    activation_stack: Vec<&'static str>,
    /// Lookups that produced an instance, in the order they finished
    completed: Vec<Arc<InstanceLookup>>,
}

/// One top-level request to a lifetime scope.
///
/// Every component activation the request triggers, including nested ones
/// performed by factories through their [`ResolveContext`], is an
/// [`InstanceLookup`] of this operation.
pub struct ResolveOperation {
    scope: Arc<ScopeCore>,
    service: Service,
    listeners: Listeners<dyn OperationListener>,
    state: Mutex<OperationState>,
}

impl ResolveOperation {
    pub(crate) fn new(scope: Arc<ScopeCore>, service: Service) -> Self {
        Self {
            scope,
            service,
            listeners: Listeners::default(),
            state: Mutex::new(OperationState::default()),
        }
    }

    /// The scope the request was made on.
    pub fn scope(&self) -> &Arc<ScopeCore> {
        &self.scope
    }

    /// The requested service.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Subscribes `listener` to this operation's events.
    pub fn subscribe(&self, listener: Arc<dyn OperationListener>) {
        self.listeners.add(listener);
    }

    pub(crate) fn execute(self: &Arc<Self>) -> DiResult<AnyArc> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.get_or_create_instance(&self.scope, &self.service)
        }));

        match outcome {
            Ok(Ok(instance)) => {
                let completed = std::mem::take(&mut self.state.lock().completed);
                for lookup in &completed {
                    lookup.complete();
                }
                self.end(None);
                Ok(instance)
            }
            Ok(Err(err)) => {
                self.state.lock().completed.clear();
                self.end(Some(&err));
                Err(err)
            }
            Err(payload) => {
                self.state.lock().completed.clear();
                let err = DiError::FactoryPanic {
                    component: self.service.display_name(),
                    message: panic_message(payload.as_ref()),
                };
                self.end(Some(&err));
                panic::resume_unwind(payload)
            }
        }
    }

    fn end(self: &Arc<Self>, error: Option<&DiError>) {
        for listener in self.listeners.snapshot() {
            listener.operation_ending(self, error);
        }
        self.listeners.clear();
    }

    pub(crate) fn get_or_create_instance(
        self: &Arc<Self>,
        scope: &Arc<ScopeCore>,
        service: &Service,
    ) -> DiResult<AnyArc> {
        let registration = scope
            .registry()
            .registration_for(service)
            .ok_or(DiError::NotFound(service.display_name()))?;
        let _frame = ActivationFrame::push(self, registration.limit_type().name())?;

        let activation_scope = match registration.lifetime() {
            Lifetime::Singleton => scope.sharing_scope(&registration),
            Lifetime::Scoped | Lifetime::Transient => scope.clone(),
        };

        let lookup = Arc::new(InstanceLookup {
            registration: registration.clone(),
            service: *service,
            activation_scope: activation_scope.clone(),
            listeners: Listeners::default(),
        });
        for listener in self.listeners.snapshot() {
            listener.instance_lookup_beginning(self, &lookup);
        }

        let mut ending = LookupEnding {
            lookup: &lookup,
            fired: false,
        };
        let (instance, new_instance) = self.activate(&registration, &activation_scope)?;
        ending.fire(new_instance);

        self.state.lock().completed.push(lookup.clone());
        registration.instance_for(instance, service)
    }

    fn activate(
        self: &Arc<Self>,
        registration: &Arc<ComponentRegistration>,
        scope: &Arc<ScopeCore>,
    ) -> DiResult<(AnyArc, bool)> {
        let ctx = ResolveContext {
            operation: self,
            scope,
        };

        if registration.activator_kind() == ActivatorKind::ProvidedInstance {
            return Ok((registration.activate(&ctx)?, false));
        }

        match registration.lifetime() {
            Lifetime::Transient => Ok((registration.activate(&ctx)?, true)),
            Lifetime::Scoped => scope.shared_instance(registration, || registration.activate(&ctx)),
            Lifetime::Singleton => {
                if let Some(existing) = registration.singleton.get() {
                    return Ok((existing.clone(), false));
                }
                let created = registration.activate(&ctx)?;
                // A concurrent operation may have stored its instance first
                let mut won = false;
                let stored = registration
                    .singleton
                    .get_or_init(|| {
                        won = true;
                        created
                    })
                    .clone();
                Ok((stored, won))
            }
        }
    }
}

impl fmt::Debug for ResolveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOperation")
            .field("service", &self.service)
            .field("scope", &self.scope)
            .finish()
    }
}

/// One attempt to obtain an instance of a single component.
pub struct InstanceLookup {
    registration: Arc<ComponentRegistration>,
    service: Service,
    activation_scope: Arc<ScopeCore>,
    listeners: Listeners<dyn LookupListener>,
}

impl InstanceLookup {
    /// The component being looked up.
    pub fn registration(&self) -> &Arc<ComponentRegistration> {
        &self.registration
    }

    /// The service the component was requested as.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// The scope whose cache shares the instance.
    pub fn activation_scope(&self) -> &Arc<ScopeCore> {
        &self.activation_scope
    }

    /// Subscribes `listener` to this lookup's events.
    pub fn subscribe(&self, listener: Arc<dyn LookupListener>) {
        self.listeners.add(listener);
    }

    fn complete(self: &Arc<Self>) {
        let listeners = self.listeners.snapshot();
        for listener in &listeners {
            listener.completion_beginning(self);
        }
        for listener in &listeners {
            listener.completion_ending(self);
        }
        self.listeners.clear();
    }
}

impl fmt::Debug for InstanceLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceLookup")
            .field("component", &self.registration.limit_type())
            .field("service", &self.service)
            .finish()
    }
}

/// Fires the lookup ending event exactly once; a failed or panicking
/// activation reports no new instance.
struct LookupEnding<'a> {
    lookup: &'a Arc<InstanceLookup>,
    fired: bool,
}

impl LookupEnding<'_> {
    fn fire(&mut self, new_instance: bool) {
        self.fired = true;
        for listener in self.lookup.listeners.snapshot() {
            listener.instance_lookup_ending(self.lookup, new_instance);
        }
    }
}

impl Drop for LookupEnding<'_> {
    fn drop(&mut self) {
        if !self.fired {
            self.fire(false);
        }
    }
}

/// Activation stack entry for circular dependency detection.
struct ActivationFrame<'a> {
    operation: &'a ResolveOperation,
}

impl<'a> ActivationFrame<'a> {
    fn push(operation: &'a ResolveOperation, component: &'static str) -> DiResult<Self> {
        let mut state = operation.state.lock();
        // Circular detection BEFORE pushing the new name
        if state.activation_stack.contains(&component) {
            let mut path = state.activation_stack.clone();
            path.push(component);
            return Err(DiError::Circular(path));
        }
        state.activation_stack.push(component);
        Ok(Self { operation })
    }
}

impl Drop for ActivationFrame<'_> {
    fn drop(&mut self) {
        self.operation.state.lock().activation_stack.pop();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Resolver handed to factories.
///
/// Resolutions made through the context are instance lookups of the running
/// operation, performed from the scope that shares the component being
/// activated: a singleton's dependencies come from the scope that owns the
/// singleton, never from the requesting child.
pub struct ResolveContext<'a> {
    operation: &'a Arc<ResolveOperation>,
    scope: &'a Arc<ScopeCore>,
}

impl<'a> ResolveContext<'a> {
    /// The operation this activation belongs to.
    pub fn operation(&self) -> &Arc<ResolveOperation> {
        self.operation
    }

    /// The scope dependencies are resolved from.
    pub fn scope(&self) -> &Arc<ScopeCore> {
        self.scope
    }
}

impl ResolverCore for ResolveContext<'_> {
    fn resolve_service(&self, service: &Service) -> DiResult<AnyArc> {
        self.operation.get_or_create_instance(self.scope, service)
    }

    fn is_registered(&self, service: &Service) -> bool {
        self.scope.registry().registration_for(service).is_some()
    }
}
