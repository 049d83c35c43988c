//! The profiling bridge: container events in, ordered messages out.
//!
//! The bridge listens to registration-time events on the container and
//! attaches a small listener value to every scope, operation and lookup it
//! sees. Each attachment carries the model of the object it was attached
//! for, so child events are built from an explicit parent instead of shared
//! lookups.
//!
//! Messages about one object follow causal order: a scope's beginning
//! precedes its children and its operations, an operation's beginning
//! precedes its lookups, and every ending follows its beginning. Messages of
//! unrelated operations on different threads interleave freely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::WhiteboxOptions;
use crate::container::{ContainerBuilder, InstanceLookup, LifetimeScope, Module, ResolveOperation, ScopeCore};
use crate::error::{DiError, WhiteboxError};
use crate::identity::{IdTracker, ObjectId};
use crate::mapper::ModelMapper;
use crate::messages::Message;
use crate::model::{ErrorModel, LifetimeScopeModel, ResolveOperationModel};
use crate::observer::{ContainerListener, LookupListener, OperationListener, ScopeListener};
use crate::queue::WriteQueue;
use crate::registration::ComponentRegistration;
use crate::sources::RegistrationSource;
use crate::stack::{BacktraceCapture, NoStackCapture, StackCapture};

/// Observes a container and streams what it does to a [`WriteQueue`].
///
/// Install it on a builder (it is a [`Module`]), or attach it to a running
/// scope with [`attach_to_scope`](ProfilingBridge::attach_to_scope). Clones
/// share all state, so a clone can be registered in a child scope's builder
/// to observe that scope from the point it begins.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{ContainerBuilder, MemoryQueue, Message, ProfilingBridge, Resolver};
/// use std::sync::Arc;
///
/// struct A;
///
/// let queue = Arc::new(MemoryQueue::new());
/// let bridge = ProfilingBridge::new(queue.clone());
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_module(&bridge);
/// builder.register_singleton(|_| Ok(A));
/// let container = builder.build();
/// container.root().resolve::<A>().unwrap();
///
/// let kinds: Vec<&str> = queue.snapshot().iter().map(Message::kind).collect();
/// assert_eq!(
///     kinds,
///     [
///         "type_discovered",
///         "component_added",
///         "lifetime_scope_beginning",
///         "resolve_operation_beginning",
///         "instance_lookup_beginning",
///         "instance_lookup_ending",
///         "instance_lookup_completion_beginning",
///         "instance_lookup_completion_ending",
///         "resolve_operation_ending",
///     ]
/// );
/// ```
#[derive(Clone)]
pub struct ProfilingBridge {
    core: Arc<BridgeCore>,
    /// The one listener allocation every clone installs, so registries can
    /// tell the bridge is already listening
    listener: Arc<dyn ContainerListener>,
}

struct BridgeCore {
    queue: Arc<dyn WriteQueue>,
    mapper: ModelMapper,
    stack: Box<dyn StackCapture>,
    options: WhiteboxOptions,
    /// Held exclusively while describing structure so a type is described
    /// before any component that references it, whichever thread sees it
    /// first. Lookups of described components only share it.
    structure: RwLock<()>,
    sent: AtomicU64,
    dropped: AtomicU64,
    violations: AtomicU64,
}

impl ProfilingBridge {
    /// A bridge with default options.
    pub fn new(queue: impl WriteQueue + 'static) -> Self {
        Self::with_options(queue, WhiteboxOptions::default())
    }

    /// A bridge configured by `options`.
    pub fn with_options(queue: impl WriteQueue + 'static, options: WhiteboxOptions) -> Self {
        let stack: Box<dyn StackCapture> = if options.capture_stack_traces {
            Box::new(BacktraceCapture::new(options.max_stack_frames))
        } else {
            Box::new(NoStackCapture)
        };
        Self::build(Arc::new(queue), options, stack)
    }

    /// A bridge with a custom stack capture.
    pub fn with_stack_capture(
        queue: impl WriteQueue + 'static,
        options: WhiteboxOptions,
        stack: impl StackCapture + 'static,
    ) -> Self {
        Self::build(Arc::new(queue), options, Box::new(stack))
    }

    fn build(queue: Arc<dyn WriteQueue>, options: WhiteboxOptions, stack: Box<dyn StackCapture>) -> Self {
        let core = Arc::new(BridgeCore {
            queue,
            mapper: ModelMapper::new(Arc::new(IdTracker::new())),
            stack,
            options,
            structure: RwLock::new(()),
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            violations: AtomicU64::new(0),
        });
        Self {
            listener: Arc::new(StructureListener { bridge: core.clone() }),
            core,
        }
    }

    /// Registers the bridge as a listener of `builder`.
    pub fn install(&self, builder: &mut ContainerBuilder) {
        builder.add_listener(self.listener.clone());
    }

    /// Starts observing a running scope and its future children.
    ///
    /// Registrations and sources visible from the scope are described first.
    /// The scope is announced without a parent, since the bridge did not see
    /// its parent begin. Attaching to a scope already observed, or to one
    /// that has ended, announces nothing.
    pub fn attach_to_scope(&self, scope: &LifetimeScope) {
        if scope.is_ended() {
            tracing::debug!(tag = ?scope.tag(), "not attaching to an ended lifetime scope");
            return;
        }
        let registry = scope.core().registry();
        if !registry.add_listener(self.listener.clone()) {
            tracing::trace!("already listening to the scope's registrations");
        }
        for source in registry.visible_sources() {
            self.core.announce_source(&source);
        }
        for registration in registry.visible_registrations() {
            self.core.announce_component(&registration);
        }
        self.core.attach_scope(scope.core(), None);
    }

    pub fn options(&self) -> &WhiteboxOptions {
        &self.core.options
    }

    pub fn mapper(&self) -> &ModelMapper {
        &self.core.mapper
    }

    pub fn tracker(&self) -> &IdTracker {
        self.core.mapper.tracker()
    }

    /// Messages the queue accepted.
    pub fn sent_messages(&self) -> u64 {
        self.core.sent.load(Ordering::Relaxed)
    }

    /// Messages the queue rejected.
    pub fn dropped_messages(&self) -> u64 {
        self.core.dropped.load(Ordering::Relaxed)
    }

    /// Events that could not be described and were skipped.
    pub fn contract_violations(&self) -> u64 {
        self.core.violations.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ProfilingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingBridge")
            .field("options", &self.core.options)
            .field("mapper", &self.core.mapper)
            .field("sent", &self.sent_messages())
            .field("dropped", &self.dropped_messages())
            .finish()
    }
}

impl Module for ProfilingBridge {
    fn load(&self, builder: &mut ContainerBuilder) {
        self.install(builder);
    }
}

struct StructureListener {
    bridge: Arc<BridgeCore>,
}

impl ContainerListener for StructureListener {
    fn component_registration_attached(&self, registration: &Arc<ComponentRegistration>) {
        self.bridge.announce_component(registration);
    }

    fn registration_source_attached(&self, source: &Arc<dyn RegistrationSource>) {
        self.bridge.announce_source(source);
    }

    fn container_built(&self, scope: &LifetimeScope) {
        self.bridge.attach_scope(scope.core(), None);
    }
}

impl BridgeCore {
    fn send(&self, message: Message) {
        if self.options.trace_messages {
            tracing::trace!(?message, "whitebox message");
        }
        let kind = message.kind();
        match self.queue.enqueue(message) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, kind, "whitebox message dropped");
            }
        }
    }

    fn violation(&self, error: WhiteboxError) {
        self.violations.fetch_add(1, Ordering::Relaxed);
        tracing::error!(%error, "whitebox event skipped");
    }

    fn tracker(&self) -> &IdTracker {
        self.mapper.tracker()
    }

    /// Describes a component and the types it references. Idempotent.
    fn announce_component(&self, registration: &Arc<ComponentRegistration>) {
        {
            // Ids are assigned under the write lock, so an id seen here
            // belongs to a component whose announcement is already out
            let _described = self.structure.read();
            if self.tracker().id_of(registration).is_some() {
                return;
            }
        }
        let _structure = self.structure.write();
        let (_, new) = self.tracker().get_or_assign_id(registration);
        if !new {
            return;
        }
        for ty in self.mapper.referenced_types(registration) {
            let (type_model, new) = self.mapper.get_or_add_type_model(&ty);
            if new {
                self.send(Message::TypeDiscovered {
                    type_model: (*type_model).clone(),
                });
            }
        }
        match self.mapper.component_model(registration) {
            Ok(component) => self.send(Message::ComponentAdded { component }),
            Err(e) => self.violation(e),
        }
    }

    /// Describes a registration source. Idempotent.
    fn announce_source(&self, source: &Arc<dyn RegistrationSource>) {
        let _structure = self.structure.write();
        let (_, new) = self.tracker().get_or_assign_id(source);
        if new {
            self.send(Message::RegistrationSourceAdded {
                source: self.mapper.registration_source_model(source),
            });
        }
    }

    fn attach_scope(self: &Arc<Self>, scope: &Arc<ScopeCore>, parent: Option<&LifetimeScopeModel>) {
        if scope.is_ended() {
            return;
        }
        let (_, new) = self.tracker().get_or_assign_id(scope);
        if !new {
            return;
        }
        let model = self.mapper.lifetime_scope_model(scope, parent);
        tracing::debug!(id = %model.id, parent = ?model.parent_id, tag = ?model.tag, "attached to lifetime scope");
        self.send(Message::LifetimeScopeBeginning {
            lifetime_scope: model.clone(),
        });
        let attachment = Arc::new(ScopeAttachment {
            bridge: self.clone(),
            model,
        });
        if !scope.subscribe(attachment.clone()) {
            // Ended while being announced
            attachment.scope_ending(scope);
        }
    }

    fn attach_operation(self: &Arc<Self>, operation: &Arc<ResolveOperation>, scope: &LifetimeScopeModel) {
        let model = self
            .mapper
            .resolve_operation_model(operation, scope, self.stack.capture());
        self.send(Message::ResolveOperationBeginning {
            resolve_operation: model.clone(),
        });
        operation.subscribe(Arc::new(OperationAttachment {
            bridge: self.clone(),
            model,
        }));
    }

    fn attach_lookup(self: &Arc<Self>, lookup: &Arc<InstanceLookup>, operation: &ResolveOperationModel) {
        // Registrations made where the bridge was not listening are described late
        self.announce_component(lookup.registration());
        match self.mapper.instance_lookup_model(lookup, operation) {
            Ok(model) => {
                let id = model.id;
                self.send(Message::InstanceLookupBeginning { instance_lookup: model });
                lookup.subscribe(Arc::new(LookupAttachment {
                    bridge: self.clone(),
                    id,
                }));
            }
            Err(e) => self.violation(e),
        }
    }
}

struct ScopeAttachment {
    bridge: Arc<BridgeCore>,
    model: LifetimeScopeModel,
}

impl ScopeListener for ScopeAttachment {
    fn child_scope_beginning(&self, _parent: &Arc<ScopeCore>, child: &Arc<ScopeCore>) {
        self.bridge.attach_scope(child, Some(&self.model));
    }

    fn resolve_operation_beginning(&self, _scope: &Arc<ScopeCore>, operation: &Arc<ResolveOperation>) {
        self.bridge.attach_operation(operation, &self.model);
    }

    fn scope_ending(&self, scope: &Arc<ScopeCore>) {
        self.bridge.send(Message::LifetimeScopeEnding {
            lifetime_scope_id: self.model.id,
        });
        let tracker = self.bridge.tracker();
        tracker.forget_id(scope);
        // Registrations of child scopes that are gone by now
        let purged = tracker.purge_expired();
        tracing::debug!(id = %self.model.id, purged, "lifetime scope ended");
    }
}

struct OperationAttachment {
    bridge: Arc<BridgeCore>,
    model: ResolveOperationModel,
}

impl OperationListener for OperationAttachment {
    fn instance_lookup_beginning(&self, _operation: &Arc<ResolveOperation>, lookup: &Arc<InstanceLookup>) {
        self.bridge.attach_lookup(lookup, &self.model);
    }

    fn operation_ending(&self, operation: &Arc<ResolveOperation>, error: Option<&DiError>) {
        self.bridge.send(Message::ResolveOperationEnding {
            resolve_operation_id: self.model.id,
            error: error.map(ErrorModel::from),
        });
        self.bridge.tracker().forget_id(operation);
    }
}

struct LookupAttachment {
    bridge: Arc<BridgeCore>,
    id: ObjectId,
}

impl LookupListener for LookupAttachment {
    fn instance_lookup_ending(&self, lookup: &Arc<InstanceLookup>, new_instance: bool) {
        self.bridge.send(Message::InstanceLookupEnding {
            instance_lookup_id: self.id,
            new_instance_activated: new_instance,
        });
        self.bridge.tracker().forget_id(lookup);
    }

    fn completion_beginning(&self, _lookup: &Arc<InstanceLookup>) {
        self.bridge.send(Message::InstanceLookupCompletionBeginning {
            instance_lookup_id: self.id,
        });
    }

    fn completion_ending(&self, _lookup: &Arc<InstanceLookup>) {
        self.bridge.send(Message::InstanceLookupCompletionEnding {
            instance_lookup_id: self.id,
        });
    }
}
