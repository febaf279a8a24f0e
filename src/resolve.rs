//! Type keys, provider traits and the injection error
//!
//! A provider is the unit stored in an [Injector](crate::Injector): it knows which type it
//! provides and how to produce a value of that type on demand.
//!
//! * The [Provide] trait describes a blocking provider, usable from any resolution path.
//! * The [ProvideAsync] trait describes a suspending provider, which may await before
//!   yielding its value. It can only be used from an asynchronous resolution path.
//! * The [Provider] enum tags a shared provider with one of these two flavours. The tag is
//!   selected when the provider is registered and never inspected at call time.
//!   A relay implements both traits and follows whatever it forwards to on each call.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Identify the type of a provided value.
///
/// Two keys are equal when they describe the same type; the type name is only kept
/// for diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Errors triggered while resolving dependencies
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("Type '{0}' has no provider")]
    Unresolved(TypeKey),
    #[error("Asynchronous provider for '{0}' can not be used synchronously")]
    AsyncInSyncContext(TypeKey),
    #[error("Scope '{0}' is no longer attached to a live scope tree")]
    Detached(String),
}

pub type InjectionResult<T> = Result<T, InjectionError>;

/// Provide an instance of a given type without suspending
///
/// This trait allows to use a uniform API for both
/// shared components (the provider holds the singleton)
/// and on-demand instances (the provider is a factory).
pub trait Provide<T>: Send + Sync {
    fn provide(&self) -> InjectionResult<T>;
}

/// Provide an instance of a given type, possibly suspending until it is ready
#[async_trait]
pub trait ProvideAsync<T>: Send + Sync {
    async fn provide_async(&self) -> InjectionResult<T>;
}

/// Shared provider tagged with its resolution flavour
pub enum Provider<T> {
    Blocking(Arc<dyn Provide<T>>),
    Suspending(Arc<dyn ProvideAsync<T>>),
    /// Both paths of a single forwarding provider
    Relay(Arc<dyn Provide<T>>, Arc<dyn ProvideAsync<T>>),
}

impl<T: 'static> Provider<T> {
    pub fn blocking(provider: impl Provide<T> + 'static) -> Self {
        Provider::Blocking(Arc::new(provider))
    }

    pub fn suspending(provider: impl ProvideAsync<T> + 'static) -> Self {
        Provider::Suspending(Arc::new(provider))
    }

    pub fn relay<P: Provide<T> + ProvideAsync<T> + 'static>(provider: P) -> Self {
        let provider = Arc::new(provider);
        Provider::Relay(provider.clone(), provider)
    }

    /// The key under which this provider is naturally registered
    pub fn provides(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    /// A relay counts as blocking: it may still fail if what it forwards to suspends
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Provider::Suspending(_))
    }

    /// Obtain a value on a blocking path.
    ///
    /// Suspending providers can not produce a value here and fail immediately.
    pub fn provide(&self) -> InjectionResult<T> {
        match self {
            Provider::Blocking(p) | Provider::Relay(p, _) => p.provide(),
            Provider::Suspending(_) => Err(InjectionError::AsyncInSyncContext(self.provides())),
        }
    }

    /// Obtain a value on a suspending path.
    pub async fn provide_async(&self) -> InjectionResult<T> {
        match self {
            Provider::Blocking(p) => p.provide(),
            Provider::Suspending(p) | Provider::Relay(_, p) => p.provide_async().await,
        }
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        match self {
            Provider::Blocking(p) => Provider::Blocking(p.clone()),
            Provider::Suspending(p) => Provider::Suspending(p.clone()),
            Provider::Relay(b, s) => Provider::Relay(b.clone(), s.clone()),
        }
    }
}

impl<T: 'static> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flavour = match self {
            Provider::Blocking(_) => "Blocking",
            Provider::Suspending(_) => "Suspending",
            Provider::Relay(..) => "Relay",
        };
        write!(f, "Provider::{}<{}>", flavour, self.provides())
    }
}
