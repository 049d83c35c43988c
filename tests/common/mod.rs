//! Shared helpers for the integration tests.

#![allow(dead_code)]

use ferrous_whitebox::{
    ContainerBuilder, MemoryQueue, Message, ObjectId, ProfilingBridge, WhiteboxOptions,
};
use std::collections::HashSet;
use std::sync::Arc;

/// A builder with a bridge already installed, writing to a memory queue.
pub fn profiled_builder() -> (ContainerBuilder, Arc<MemoryQueue>, ProfilingBridge) {
    let (queue, bridge) = bridge();
    let mut builder = ContainerBuilder::new();
    builder.register_module(&bridge);
    (builder, queue, bridge)
}

/// A bridge without stack capture, writing to a memory queue.
pub fn bridge() -> (Arc<MemoryQueue>, ProfilingBridge) {
    let queue = Arc::new(MemoryQueue::new());
    let options = WhiteboxOptions {
        capture_stack_traces: false,
        ..WhiteboxOptions::default()
    };
    let bridge = ProfilingBridge::with_options(queue.clone(), options);
    (queue, bridge)
}

pub fn kinds(messages: &[Message]) -> Vec<&'static str> {
    messages.iter().map(Message::kind).collect()
}

/// Messages from the first resolve operation beginning onwards.
pub fn runtime_part(messages: &[Message]) -> &[Message] {
    let start = messages
        .iter()
        .position(|m| matches!(m, Message::ResolveOperationBeginning { .. }))
        .unwrap_or(messages.len());
    &messages[start..]
}

/// Checks that every message only refers to objects that were announced
/// before it, and that nothing is announced or ended twice.
pub fn assert_causal(messages: &[Message]) {
    let mut types = HashSet::new();
    let mut components = HashSet::new();
    let mut sources = HashSet::new();
    let mut live_scopes = HashSet::new();
    let mut live_operations = HashSet::new();
    let mut live_lookups = HashSet::new();
    let mut ended_lookups = HashSet::new();
    let mut seen_ids: HashSet<ObjectId> = HashSet::new();

    for (index, message) in messages.iter().enumerate() {
        let at = |what: &str| format!("message {} ({}): {}", index, message.kind(), what);
        match message {
            Message::TypeDiscovered { type_model } => {
                assert!(seen_ids.insert(type_model.id), "{}", at("id reused"));
                types.insert(type_model.id);
            }
            Message::ComponentAdded { component } => {
                assert!(seen_ids.insert(component.id), "{}", at("id reused"));
                assert!(types.contains(&component.limit_type_id), "{}", at("limit type not described"));
                for service in &component.services {
                    assert!(types.contains(&service.type_id), "{}", at("service type not described"));
                }
                for dependency in &component.dependencies {
                    assert!(types.contains(&dependency.type_id), "{}", at("dependency type not described"));
                }
                if let Some(source) = component.source_id {
                    assert!(sources.contains(&source), "{}", at("source not described"));
                }
                components.insert(component.id);
            }
            Message::RegistrationSourceAdded { source } => {
                assert!(seen_ids.insert(source.id), "{}", at("id reused"));
                sources.insert(source.id);
            }
            Message::LifetimeScopeBeginning { lifetime_scope } => {
                assert!(seen_ids.insert(lifetime_scope.id), "{}", at("id reused"));
                if let Some(parent) = lifetime_scope.parent_id {
                    assert!(live_scopes.contains(&parent), "{}", at("parent scope not live"));
                }
                live_scopes.insert(lifetime_scope.id);
            }
            Message::LifetimeScopeEnding { lifetime_scope_id } => {
                assert!(live_scopes.remove(lifetime_scope_id), "{}", at("scope not live"));
            }
            Message::ResolveOperationBeginning { resolve_operation } => {
                assert!(seen_ids.insert(resolve_operation.id), "{}", at("id reused"));
                assert!(
                    live_scopes.contains(&resolve_operation.lifetime_scope_id),
                    "{}",
                    at("scope not live")
                );
                live_operations.insert(resolve_operation.id);
            }
            Message::ResolveOperationEnding { resolve_operation_id, .. } => {
                assert!(live_operations.remove(resolve_operation_id), "{}", at("operation not live"));
            }
            Message::InstanceLookupBeginning { instance_lookup } => {
                assert!(seen_ids.insert(instance_lookup.id), "{}", at("id reused"));
                assert!(
                    live_operations.contains(&instance_lookup.resolve_operation_id),
                    "{}",
                    at("operation not live")
                );
                assert!(components.contains(&instance_lookup.component_id), "{}", at("component not described"));
                live_lookups.insert(instance_lookup.id);
            }
            Message::InstanceLookupEnding { instance_lookup_id, .. } => {
                assert!(live_lookups.remove(instance_lookup_id), "{}", at("lookup not live"));
                ended_lookups.insert(*instance_lookup_id);
            }
            Message::InstanceLookupCompletionBeginning { instance_lookup_id }
            | Message::InstanceLookupCompletionEnding { instance_lookup_id } => {
                assert!(ended_lookups.contains(instance_lookup_id), "{}", at("lookup has not ended"));
            }
        }
    }
}
