//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::service::Service;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by lifetime scopes (each call is one resolve operation) and by
/// the [`ResolveContext`](crate::ResolveContext) handed to factories (each
/// call is a nested instance lookup inside the running operation).
///
/// Most users should use the [`Resolver`] trait instead, which provides the
/// typed methods built on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service as a type-erased instance.
    ///
    /// Concrete services come back as `Arc<T>`; trait-object services come back
    /// as `Arc<Arc<dyn Trait>>`.
    fn resolve_service(&self, service: &Service) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Whether a registration (or a registration source) can supply `service`.
    fn is_registered(&self, service: &Service) -> bool;
}

/// High-level resolver interface with generic methods for type-safe resolution.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::{ContainerBuilder, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {}", msg)
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(42usize);
/// builder
///     .register_singleton(|_| Ok(ConsoleLogger))
///     .as_trait::<dyn Logger>(|logger| logger as Arc<dyn Logger>);
///
/// let container = builder.build();
/// let scope = container.root();
///
/// assert_eq!(*scope.resolve::<usize>().unwrap(), 42);
/// let logger = scope.resolve_trait::<dyn Logger>().unwrap();
/// assert_eq!(logger.log("hi"), "LOG: hi");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn resolve<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_service(&Service::of::<T>())?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete service registered under `key`.
    fn resolve_keyed<T: Send + Sync + 'static>(&self, key: &'static str) -> DiResult<Arc<T>> {
        let any = self.resolve_service(&Service::keyed::<T>(key))?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a trait-object service.
    fn resolve_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_service(&Service::of::<T>())?;
        // Trait services are stored as Arc<Arc<dyn Trait>>
        any.downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete service, returning `None` when nothing supplies it.
    ///
    /// Failures other than a missing registration are still errors.
    fn resolve_optional<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        if !self.is_registered(&Service::of::<T>()) {
            return Ok(None);
        }
        self.resolve::<T>().map(Some)
    }

    /// Resolves a concrete service type, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved.
    fn resolve_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.resolve::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
