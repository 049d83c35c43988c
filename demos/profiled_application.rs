//! A small application observed by the profiling bridge.
//!
//! Messages go to stdout as JSON lines; the bridge's own diagnostics go to
//! stderr, filtered by `RUST_LOG`. Bridge options are read from `WHITEBOX_*`
//! environment variables.
//!
//! ```text
//! RUST_LOG=ferrous_whitebox=debug cargo run --example profiled_application
//! ```

use ferrous_whitebox::{
    ComponentRegistration, ContainerBuilder, FnSource, JsonLinesQueue, Lifetime, ProfilingBridge, Resolver,
    Service, WhiteboxOptions,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug)]
struct A;

#[derive(Debug)]
struct B {
    _a: Arc<A>,
    _d: Arc<D>,
}

#[derive(Debug)]
struct C {
    _b: Arc<B>,
}

#[derive(Debug)]
struct D;

#[derive(Debug)]
struct G<T, U>(PhantomData<(T, U)>);

#[derive(Debug)]
struct F {
    _a: Arc<A>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("started");

    let options = WhiteboxOptions::from_env()?;
    let bridge = ProfilingBridge::with_options(JsonLinesQueue::new(std::io::stdout()), options);

    let mut builder = ContainerBuilder::new();
    builder.register_module(&bridge);
    builder.register_singleton(|_| Ok(A));
    builder
        .register_transient(|ctx| {
            Ok(B {
                _a: ctx.resolve::<A>()?,
                _d: ctx.resolve::<D>()?,
            })
        })
        .depends_on::<A>()
        .property::<D>("d");
    builder
        .register_transient(|ctx| Ok(C { _b: ctx.resolve::<B>()? }))
        .depends_on::<B>()
        .with_metadata("M", 42)
        .with_metadata("N", "B!");
    builder.register_singleton(|_| Ok(D));
    builder.register_source(FnSource::new("G<T, U>", |service: &Service| {
        if *service == Service::of::<G<i32, String>>() {
            vec![ComponentRegistration::factory(Lifetime::Transient, |_| {
                Ok(G::<i32, String>(PhantomData))
            })]
        } else {
            Vec::new()
        }
    }));

    let container = builder.build();

    {
        let ls1 = container.begin_scope();
        let o1 = ls1.resolve::<C>()?;
        tracing::info!(?o1, "resolved");
    }

    {
        let ls2 = container.begin_scope();
        let o = ls2.resolve::<C>()?;
        tracing::info!(?o, "resolved");

        let g = ls2.resolve::<G<i32, String>>()?;
        tracing::info!(?g, "resolved");
    }

    {
        let child_bridge = bridge.clone();
        let ls3 = container.root().begin_tagged_scope_with("service", move |x| {
            x.register_module(&child_bridge);
            x.register_transient(|ctx| Ok(F { _a: ctx.resolve::<A>()? }))
                .depends_on::<A>();
        });
        let f = ls3.resolve::<F>()?;
        tracing::info!(?f, "resolved");
    }

    drop(container);
    tracing::info!(
        sent = bridge.sent_messages(),
        dropped = bridge.dropped_messages(),
        "done"
    );
    Ok(())
}
