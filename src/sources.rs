//! Registration sources: rules that generate registrations on demand.

use std::fmt;

use crate::registration::ComponentRegistration;
use crate::service::Service;

/// A rule that can supply registrations for services nobody registered
/// explicitly, such as every instantiation of a generic type.
///
/// A source is consulted the first time a service has no registration. The
/// registrations it returns are added to the registry that owns the source
/// and announced to container listeners before the triggering lookup uses
/// them; later lookups find them directly.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{
///     ComponentRegistration, ContainerBuilder, Lifetime, RegistrationSource, Resolver, Service,
/// };
///
/// struct Greeting(&'static str);
///
/// struct GreetingSource;
///
/// impl RegistrationSource for GreetingSource {
///     fn registrations_for(&self, service: &Service) -> Vec<ComponentRegistration> {
///         if *service == Service::of::<Greeting>() {
///             vec![ComponentRegistration::factory(Lifetime::Singleton, |_| Ok(Greeting("hello")))]
///         } else {
///             Vec::new()
///         }
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_source(GreetingSource);
/// let container = builder.build();
///
/// assert_eq!(container.root().resolve::<Greeting>().unwrap().0, "hello");
/// ```
pub trait RegistrationSource: Send + Sync + 'static {
    /// Registrations able to satisfy `service`. Empty when the source does not apply.
    fn registrations_for(&self, service: &Service) -> Vec<ComponentRegistration>;

    /// Whether the source wraps existing registrations (adapters, decorators)
    /// rather than supplying components of its own.
    fn is_adapter_for_individual_components(&self) -> bool {
        false
    }

    /// Human readable description.
    fn description(&self) -> String {
        self.source_type_name().to_string()
    }

    /// Type name reported for the source.
    fn source_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Registration source backed by a closure.
///
/// ```
/// use ferrous_whitebox::{ComponentRegistration, FnSource, Lifetime, RegistrationSource, Service};
///
/// let source = FnSource::new("numbers", |service: &Service| {
///     if *service == Service::of::<u64>() {
///         vec![ComponentRegistration::instance(7u64)]
///     } else {
///         Vec::new()
///     }
/// });
/// assert_eq!(source.description(), "numbers");
/// assert_eq!(source.registrations_for(&Service::of::<u64>()).len(), 1);
/// assert!(source.registrations_for(&Service::of::<u8>()).is_empty());
/// ```
pub struct FnSource<F> {
    description: String,
    generate: F,
}

impl<F> FnSource<F>
where
    F: Fn(&Service) -> Vec<ComponentRegistration> + Send + Sync + 'static,
{
    pub fn new(description: impl Into<String>, generate: F) -> Self {
        Self {
            description: description.into(),
            generate,
        }
    }
}

impl<F> RegistrationSource for FnSource<F>
where
    F: Fn(&Service) -> Vec<ComponentRegistration> + Send + Sync + 'static,
{
    fn registrations_for(&self, service: &Service) -> Vec<ComponentRegistration> {
        (self.generate)(service)
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn source_type_name(&self) -> &'static str {
        "ferrous_whitebox::sources::FnSource"
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource")
            .field("description", &self.description)
            .finish()
    }
}
