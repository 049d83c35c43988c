use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_whitebox::*;
use std::sync::Arc;

struct Leaf;

struct Middle {
    _leaf: Arc<Leaf>,
}

struct Root {
    _middle: Arc<Middle>,
}

fn builder() -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    builder.register_singleton(|_| Ok(Leaf));
    builder
        .register_scoped(|ctx| Ok(Middle { _leaf: ctx.resolve::<Leaf>()? }))
        .depends_on::<Leaf>();
    builder
        .register_transient(|ctx| Ok(Root { _middle: ctx.resolve::<Middle>()? }))
        .depends_on::<Middle>();
    builder
}

fn quiet_options() -> WhiteboxOptions {
    WhiteboxOptions {
        capture_stack_traces: false,
        ..WhiteboxOptions::default()
    }
}

// ===== Resolution Overhead =====

fn bench_resolve_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_chain");

    let plain = builder().build();
    let scope = plain.begin_scope();
    group.bench_function(BenchmarkId::new("observed", "none"), |b| {
        b.iter(|| black_box(scope.resolve::<Root>().unwrap()))
    });

    let (queue, receiver) = ChannelQueue::unbounded();
    let bridge = ProfilingBridge::with_options(queue, quiet_options());
    let mut observed = builder();
    observed.register_module(&bridge);
    let observed = observed.build();
    let scope = observed.begin_scope();
    group.bench_function(BenchmarkId::new("observed", "bridge"), |b| {
        b.iter(|| {
            black_box(scope.resolve::<Root>().unwrap());
            receiver.try_iter().for_each(drop);
        })
    });

    let (queue, receiver) = ChannelQueue::unbounded();
    let bridge = ProfilingBridge::new(queue);
    let mut traced = builder();
    traced.register_module(&bridge);
    let traced = traced.build();
    let scope = traced.begin_scope();
    group.bench_function(BenchmarkId::new("observed", "bridge_with_stacks"), |b| {
        b.iter(|| {
            black_box(scope.resolve::<Root>().unwrap());
            receiver.try_iter().for_each(drop);
        })
    });

    group.finish();
}

// ===== Scope Churn =====

fn bench_scope_churn(c: &mut Criterion) {
    let (queue, receiver) = ChannelQueue::unbounded();
    let bridge = ProfilingBridge::with_options(queue, quiet_options());
    let mut builder = builder();
    builder.register_module(&bridge);
    let container = builder.build();

    c.bench_function("scope_begin_resolve_end", |b| {
        b.iter(|| {
            let scope = container.begin_scope();
            black_box(scope.resolve::<Root>().unwrap());
            drop(scope);
            receiver.try_iter().for_each(drop);
        })
    });
}

// ===== Model Building =====

fn bench_serialize_messages(c: &mut Criterion) {
    let queue = Arc::new(MemoryQueue::new());
    let bridge = ProfilingBridge::with_options(queue.clone(), quiet_options());
    let mut builder = builder();
    builder.register_module(&bridge);
    let container = builder.build();
    container.root().resolve::<Root>().unwrap();
    let messages = queue.drain();

    c.bench_function("serialize_message_batch", |b| {
        b.iter(|| {
            for message in &messages {
                black_box(serde_json::to_vec(message).unwrap());
            }
        })
    });
}

fn bench_type_name_parsing(c: &mut Criterion) {
    let name = std::any::type_name::<std::collections::HashMap<String, Vec<Arc<dyn Fn(u8) -> u8 + Send>>>>();
    c.bench_function("parse_type_name_nested", |b| {
        b.iter(|| black_box(type_name::parse_type_name(black_box(name))))
    });
}

criterion_group!(
    benches,
    bench_resolve_overhead,
    bench_scope_churn,
    bench_serialize_messages,
    bench_type_name_parsing
);
criterion_main!(benches);
