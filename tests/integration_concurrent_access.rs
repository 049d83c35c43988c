//! Concurrent access integration tests
//!
//! These tests drive the observed container from many threads at once and
//! check that the resulting message stream stays causally ordered.

mod common;

use common::{assert_causal, bridge, profiled_builder};
use ferrous_whitebox::{
    ComponentRegistration, ContainerBuilder, DiError, FnSource, Lifetime, Message, ObjectId, Resolver, Service,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};

// ===== Test Services =====

struct Config;

struct Repository {
    _config: Arc<Config>,
}

struct Handler {
    _repository: Arc<Repository>,
}

struct Generated(usize);

const THREADS: usize = 8;
const RESOLUTIONS_PER_THREAD: usize = 16;

fn register_services(builder: &mut ContainerBuilder) {
    builder.register_singleton(|_| Ok(Config));
    builder
        .register_scoped(|ctx| Ok(Repository { _config: ctx.resolve::<Config>()? }))
        .depends_on::<Config>();
    builder
        .register_transient(|ctx| Ok(Handler { _repository: ctx.resolve::<Repository>()? }))
        .depends_on::<Repository>();
}

#[test]
fn test_concurrent_resolutions_stay_causal() {
    let (mut builder, queue, bridge) = profiled_builder();
    register_services(&mut builder);
    let container = builder.build();
    let barrier = Barrier::new(THREADS);

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                let scope = container.begin_scope();
                barrier.wait();
                for _ in 0..RESOLUTIONS_PER_THREAD {
                    scope.resolve::<Handler>().unwrap();
                }
            });
        }
    })
    .unwrap();

    let messages = queue.snapshot();
    assert_causal(&messages);

    let operations: HashSet<ObjectId> = messages
        .iter()
        .filter_map(|m| match m {
            Message::ResolveOperationEnding { resolve_operation_id, error } => {
                assert!(error.is_none());
                Some(*resolve_operation_id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(operations.len(), THREADS * RESOLUTIONS_PER_THREAD);

    // Config lookups happen only when a scope first builds its repository
    let config_type = messages
        .iter()
        .find_map(|m| match m {
            Message::TypeDiscovered { type_model } if type_model.full_name == std::any::type_name::<Config>() => {
                Some(type_model.id)
            }
            _ => None,
        })
        .unwrap();
    let config_component = messages
        .iter()
        .find_map(|m| match m {
            Message::ComponentAdded { component } if component.limit_type_id == config_type => Some(component.id),
            _ => None,
        })
        .unwrap();
    let config_lookups: HashSet<ObjectId> = messages
        .iter()
        .filter_map(|m| match m {
            Message::InstanceLookupBeginning { instance_lookup } if instance_lookup.component_id == config_component => {
                Some(instance_lookup.id)
            }
            _ => None,
        })
        .collect();
    let new_configs = messages
        .iter()
        .filter(|m| match m {
            Message::InstanceLookupEnding {
                instance_lookup_id,
                new_instance_activated,
            } => *new_instance_activated && config_lookups.contains(instance_lookup_id),
            _ => false,
        })
        .count();
    assert_eq!(config_lookups.len(), THREADS);
    assert_eq!(new_configs, 1);

    // Only structural identities and the root scope remain tracked
    assert_eq!(bridge.tracker().len(), 4);
}

#[test]
fn test_concurrent_generation_announces_once() {
    let (mut builder, queue, _bridge) = profiled_builder();
    builder.register_source(FnSource::new("generated", |service: &Service| {
        if *service == Service::of::<Generated>() {
            vec![ComponentRegistration::factory(Lifetime::Transient, |_| Ok(Generated(1)))]
        } else {
            Vec::new()
        }
    }));
    let container = builder.build();
    let barrier = Barrier::new(THREADS);

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                assert_eq!(container.root().resolve::<Generated>().unwrap().0, 1);
            });
        }
    })
    .unwrap();

    let messages = queue.snapshot();
    let components = messages
        .iter()
        .filter(|m| matches!(m, Message::ComponentAdded { .. }))
        .count();
    assert_eq!(components, 1);
    assert_causal(&messages);
}

#[test]
fn test_concurrent_scopes_get_distinct_ids() {
    let (queue, bridge) = bridge();
    let mut builder = ContainerBuilder::new();
    builder.register_module(&bridge);
    let container = builder.build();

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                for _ in 0..RESOLUTIONS_PER_THREAD {
                    let outer = container.begin_scope();
                    let _inner = outer.begin_tagged_scope("inner");
                }
            });
        }
    })
    .unwrap();

    let messages = queue.snapshot();
    let sequences: HashSet<u64> = messages
        .iter()
        .filter_map(|m| match m {
            Message::LifetimeScopeBeginning { lifetime_scope } => Some(lifetime_scope.sequence),
            _ => None,
        })
        .collect();
    assert_eq!(sequences.len(), 1 + 2 * THREADS * RESOLUTIONS_PER_THREAD);
    assert_causal(&messages);
}

#[test]
fn test_ending_races_with_resolution() {
    let (mut builder, queue, _bridge) = profiled_builder();
    register_services(&mut builder);
    let container = builder.build();

    for _ in 0..32 {
        let scope = container.begin_scope();
        let barrier = Barrier::new(THREADS + 1);
        crossbeam_utils::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|_| {
                    barrier.wait();
                    for _ in 0..RESOLUTIONS_PER_THREAD {
                        match scope.resolve::<Handler>() {
                            Ok(_) => {}
                            Err(DiError::ScopeEnded) => break,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                });
            }
            barrier.wait();
            scope.end();
        })
        .unwrap();
    }

    // No operation begins on a scope whose ending was already reported
    assert_causal(&queue.snapshot());
}

#[test]
fn test_late_component_description_is_causal() {
    let mut builder = ContainerBuilder::new();
    register_services(&mut builder);
    let container = builder.build();

    // Only the child's builder carries the bridge, so every root component
    // is described by the first lookup that reaches it
    let (queue, bridge) = bridge();
    let child = container.root().begin_scope_with(|builder| {
        builder.register_module(&bridge);
    });
    let barrier = Barrier::new(THREADS);

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                for _ in 0..RESOLUTIONS_PER_THREAD {
                    child.resolve::<Handler>().unwrap();
                }
            });
        }
    })
    .unwrap();

    let messages = queue.snapshot();
    let components = messages
        .iter()
        .filter(|m| matches!(m, Message::ComponentAdded { .. }))
        .count();
    assert_eq!(components, 3);
    assert_causal(&messages);
}

// ===== Scope Trees =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_scope_trees_are_reported_consistently(
        parents in prop::collection::vec(any::<prop::sample::Index>(), 1..24),
        drop_reversed in any::<bool>(),
        resolve_in in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let (mut builder, queue, bridge) = profiled_builder();
        register_services(&mut builder);
        let container = builder.build();

        // scopes[0] stands for the root
        let mut scopes: Vec<ferrous_whitebox::LifetimeScope> = Vec::new();
        let mut expected_parent = Vec::new();
        for parent in &parents {
            let index = parent.index(scopes.len() + 1);
            let scope = if index == 0 {
                container.begin_scope()
            } else {
                scopes[index - 1].begin_scope()
            };
            scopes.push(scope);
            expected_parent.push(index);
        }
        for target in &resolve_in {
            let scope = &scopes[target.index(scopes.len())];
            prop_assert!(scope.resolve::<Handler>().is_ok());
        }

        if drop_reversed {
            while scopes.pop().is_some() {}
        } else {
            scopes.drain(..).for_each(drop);
        }
        drop(container);

        let messages = queue.snapshot();
        assert_causal(&messages);

        let beginnings: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                Message::LifetimeScopeBeginning { lifetime_scope } => Some(lifetime_scope.clone()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(beginnings.len(), parents.len() + 1);
        for (position, parent_index) in expected_parent.iter().enumerate() {
            let scope = &beginnings[position + 1];
            prop_assert_eq!(scope.parent_id, Some(beginnings[*parent_index].id));
            prop_assert_eq!(scope.sequence, position as u64 + 2);
        }

        let endings = messages
            .iter()
            .filter(|m| matches!(m, Message::LifetimeScopeEnding { .. }))
            .count();
        prop_assert_eq!(endings, parents.len() + 1);

        // Every runtime identity was released
        prop_assert_eq!(bridge.tracker().len(), 3);
    }
}
