//! Core traits for the observed container.

mod resolver;

pub use resolver::{Resolver, ResolverCore};
