//! Modules: reusable bundles of registrations and listeners.

use super::ContainerBuilder;

/// A reusable unit of container configuration.
///
/// # Example
///
/// ```rust
/// use ferrous_whitebox::{ContainerBuilder, Module, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService {
///     config: Arc<UserConfig>,
/// }
///
/// struct UserModule;
///
/// impl Module for UserModule {
///     fn load(&self, builder: &mut ContainerBuilder) {
///         builder.register_instance(UserConfig::default());
///         builder
///             .register_scoped(|ctx| Ok(UserService { config: ctx.resolve::<UserConfig>()? }))
///             .depends_on::<UserConfig>();
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_module(&UserModule);
/// let container = builder.build();
/// assert!(container.root().resolve::<UserService>().is_ok());
/// ```
pub trait Module {
    /// Adds this module's registrations, sources and listeners to `builder`.
    fn load(&self, builder: &mut ContainerBuilder);
}
