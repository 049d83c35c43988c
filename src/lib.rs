//! # ferrous-whitebox
//!
//! Live introspection for a dependency injection container.
//!
//! The crate contains a compact DI container whose lifecycle (scopes, resolve
//! operations, instance lookups) is observable through listener traits, and a
//! [`ProfilingBridge`] that turns those events into an ordered stream of
//! [`Message`]s for a visualizer or log sink.
//!
//! ## Features
//!
//! - **Stable identities**: every scope, operation and lookup gets an id that
//!   is never reused
//! - **Structural model**: types, components and registration sources are
//!   described once and referenced by id afterwards
//! - **Causal ordering**: parents are announced before their children, endings
//!   after their beginnings, across threads
//! - **Pluggable transport**: any [`WriteQueue`]; memory, channel and JSON-lines
//!   sinks included
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_whitebox::{ContainerBuilder, MemoryQueue, Message, ProfilingBridge, Resolver};
//! use std::sync::Arc;
//!
//! struct A;
//! struct B {
//!     a: Arc<A>,
//! }
//!
//! let queue = Arc::new(MemoryQueue::new());
//! let bridge = ProfilingBridge::new(queue.clone());
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_module(&bridge);
//! builder.register_transient(|_| Ok(A));
//! builder
//!     .register_transient(|ctx| Ok(B { a: ctx.resolve::<A>()? }))
//!     .depends_on::<A>();
//!
//! let container = builder.build();
//! let b = container.root().resolve::<B>().unwrap();
//! let _a = &b.a;
//!
//! let messages = queue.snapshot();
//! assert_eq!(messages[0].kind(), "type_discovered");
//! assert_eq!(messages.last().map(Message::kind), Some("resolve_operation_ending"));
//! ```
//!
//! ## Observing child scopes
//!
//! A bridge installed on the container follows every child scope. A clone
//! registered in a child scope's own builder observes just that scope:
//!
//! ```rust
//! use ferrous_whitebox::{ContainerBuilder, MemoryQueue, ProfilingBridge, Resolver};
//! use std::sync::Arc;
//!
//! struct F;
//!
//! let queue = Arc::new(MemoryQueue::new());
//! let bridge = ProfilingBridge::new(queue.clone());
//! let container = ContainerBuilder::new().build();
//!
//! let child = container.root().begin_tagged_scope_with("service", |builder| {
//!     builder.register_module(&bridge);
//!     builder.register_transient(|_| Ok(F));
//! });
//! child.resolve::<F>().unwrap();
//! assert!(bridge.sent_messages() > 0);
//! ```

// Module declarations
pub mod bridge;
pub mod config;
pub mod container;
pub mod error;
pub mod identity;
pub mod lifetime;
pub mod mapper;
pub mod messages;
pub mod model;
pub mod observer;
pub mod queue;
pub mod service;
pub mod sources;
pub mod stack;
pub mod traits;
pub mod type_name;

// Internal modules
mod registration;

// Re-export core types
pub use bridge::ProfilingBridge;
pub use config::WhiteboxOptions;
pub use container::{
    Container, ContainerBuilder, InstanceLookup, LifetimeScope, Module, ResolveContext, ResolveOperation,
    ScopeCore, ROOT_TAG,
};
pub use error::{DiError, DiResult, QueueError, WhiteboxError, WhiteboxResult};
pub use identity::{IdTracker, ObjectId};
pub use lifetime::{Lifetime, Ownership};
pub use mapper::ModelMapper;
pub use messages::Message;
pub use model::{
    ActivatorModel, ComponentModel, DependencyModel, ErrorModel, InstanceLookupModel, LifetimeScopeModel,
    RegistrationSourceModel, ResolveOperationModel, ServiceModel, StackSnapshot, TypeModel,
};
pub use observer::{ContainerListener, LookupListener, OperationListener, ScopeListener};
pub use queue::{ChannelQueue, JsonLinesQueue, MemoryQueue, WriteQueue};
pub use registration::{ActivatorKind, ComponentRegistration, Dependency, DependencyKind, RegistrationBuilder};
pub use service::{Service, TypeDescriptor};
pub use sources::{FnSource, RegistrationSource};
pub use stack::{BacktraceCapture, NoStackCapture, StackCapture};
pub use traits::{Resolver, ResolverCore};
