//! Component lifetime and ownership definitions.

use serde::{Deserialize, Serialize};

/// Component lifetimes controlling instance sharing
///
/// Decides which scope caches an activated instance, and therefore whether a
/// later instance lookup reports a new activation or a reuse.
///
/// # Examples
///
/// ```rust
/// use ferrous_whitebox::{ContainerBuilder, Lifetime, Resolver};
///
/// struct Database { url: String }
/// struct Repository;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_singleton(|_| Ok(Database { url: "postgres://localhost".into() }));
/// builder.register_scoped(|_| Ok(Repository));
///
/// let container = builder.build();
/// let first = container.root().begin_scope();
/// let second = container.root().begin_scope();
///
/// // Singleton: same instance in every scope
/// let db1 = first.resolve::<Database>().unwrap();
/// let db2 = second.resolve::<Database>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: one per scope
/// let repo1 = first.resolve::<Repository>().unwrap();
/// let repo2 = second.resolve::<Repository>().unwrap();
/// assert!(!std::sync::Arc::ptr_eq(&repo1, &repo2));
/// assert_eq!(Lifetime::Scoped, Lifetime::Scoped);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Single instance shared through the root scope
    Singleton,
    /// Single instance per lifetime scope
    Scoped,
    /// New instance per lookup, never shared
    Transient,
}

/// Who is responsible for the end of an instance's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// Created by the container, released with its owning scope
    OwnedByLifetimeScope,
    /// Supplied from outside (provided instances)
    ExternallyOwned,
}
