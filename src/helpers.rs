use std::sync::Arc;

use async_trait::async_trait;

use crate::inject::WeakInjector;
use crate::{Injector, InjectionResult, Provide, ProvideAsync, Provider, TypeKey};

/// Generic clone-based provider for a value which is ready at registration time
pub struct ValueProvider<T>(T);

impl<T> ValueProvider<T> {
    pub fn new(data: T) -> Self {
        ValueProvider(data)
    }
}

impl<T: Clone + Send + Sync> Provide<T> for ValueProvider<T> {
    fn provide(&self) -> InjectionResult<T> {
        Ok(self.0.clone())
    }
}

/// Lazy singleton on top of a blocking source.
///
/// The source is called on first demand only, a failed attempt leaves the cell empty.
/// Cycles are not detected: a singleton which depends on itself blocks forever on its own cell.
pub struct SingletonProvider<T> {
    cell: once_cell::sync::OnceCell<T>,
    source: Arc<dyn Provide<T>>,
}

impl<T> SingletonProvider<T> {
    pub fn new(source: impl Provide<T> + 'static) -> Self {
        Self {
            cell: once_cell::sync::OnceCell::new(),
            source: Arc::new(source),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Provide<T> for SingletonProvider<T> {
    fn provide(&self) -> InjectionResult<T> {
        self.cell
            .get_or_try_init(|| {
                tracing::trace!(provides = %TypeKey::of::<T>(), "initialising singleton");
                self.source.provide()
            })
            .cloned()
    }
}

/// Lazy singleton on top of a suspending source
pub struct SingletonAsyncProvider<T> {
    cell: tokio::sync::OnceCell<T>,
    source: Arc<dyn ProvideAsync<T>>,
}

impl<T> SingletonAsyncProvider<T> {
    pub fn new(source: impl ProvideAsync<T> + 'static) -> Self {
        Self {
            cell: tokio::sync::OnceCell::new(),
            source: Arc::new(source),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ProvideAsync<T> for SingletonAsyncProvider<T> {
    async fn provide_async(&self) -> InjectionResult<T> {
        self.cell
            .get_or_try_init(|| {
                tracing::trace!(provides = %TypeKey::of::<T>(), "initialising async singleton");
                self.source.provide_async()
            })
            .await
            .cloned()
    }
}

/// Convert the values of another provider.
///
/// Used to wrap constructed services in a shared pointer.
pub struct MapProvider<S, B> {
    source: Provider<S>,
    convert: Arc<dyn Fn(S) -> B + Send + Sync>,
}

impl<S, B> MapProvider<S, B> {
    pub fn new(source: Provider<S>, convert: impl Fn(S) -> B + Send + Sync + 'static) -> Self {
        Self {
            source,
            convert: Arc::new(convert),
        }
    }
}

impl<S: Send + 'static, B: Send + 'static> Provide<B> for MapProvider<S, B> {
    fn provide(&self) -> InjectionResult<B> {
        self.source.provide().map(|s| (self.convert)(s))
    }
}

/// Serve a supertype by resolving its concrete type in the owning scope on each call.
///
/// The provider of ```S``` is looked up when a value is requested, so a later registration
/// of ```S``` is picked up, and a suspending ```S``` is only usable on the async path.
pub struct UpcastProvider<S, B> {
    scope: WeakInjector,
    convert: Arc<dyn Fn(S) -> B + Send + Sync>,
}

impl<S, B> UpcastProvider<S, B> {
    pub fn new(scope: &Injector, convert: impl Fn(S) -> B + Send + Sync + 'static) -> Self {
        Self {
            scope: scope.downgrade(),
            convert: Arc::new(convert),
        }
    }
}

impl<S: 'static, B: 'static> Provide<B> for UpcastProvider<S, B> {
    fn provide(&self) -> InjectionResult<B> {
        let s = self.scope.upgrade()?.get_provided::<S>()?;
        Ok((self.convert)(s))
    }
}

#[async_trait]
impl<S: Send + 'static, B: Send + 'static> ProvideAsync<B> for UpcastProvider<S, B> {
    async fn provide_async(&self) -> InjectionResult<B> {
        let scope = self.scope.upgrade()?;
        let s = scope.get_provided_async::<S>().await?;
        Ok((self.convert)(s))
    }
}

/// Declare that the provider of a concrete type also provides some of its supertypes.
///
/// Each ```$Sub => $Base``` pair calls [Injector::bind](crate::Injector::bind) with an implicit
/// coercion, typically from ```Arc<Concrete>``` to ```Arc<dyn Trait>```.
/// The provider for ```$Sub``` must already be reachable from the injector.
#[macro_export]
macro_rules! bind {
    ($injector: expr $(, $Sub:ty => $Base:ty)+ $(,)?) => {
        $crate::InjectionResult::Ok(())
        $(
            .and_then(|_| $injector.bind::<$Sub, $Base, _>(|sub: $Sub| -> $Base { sub }))
        )+
    };
}
