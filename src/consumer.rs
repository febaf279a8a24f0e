//! Callables bound to a scope
//!
//! A consumer wraps a callable whose parameters are [Dependencies]. When called, the
//! arguments which were not given explicitly are obtained from the scope the consumer
//! was bound to. A [Consumer] resolves them on a blocking path, an [AsyncConsumer]
//! may suspend on each asynchronous provider.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::inject::WeakInjector;
use crate::*;

/// A callable with injected arguments
pub struct Consumer<F, Args, Ret> {
    target: Arc<F>,
    scope: WeakInjector,
    _signature: PhantomData<fn(Args) -> Ret>,
}

impl<F, Args, Ret> Consumer<F, Args, Ret>
where
    F: Callable<Args, Ret>,
    Args: Dependencies,
{
    pub(crate) fn new(target: F, injector: &Injector) -> Self {
        Self {
            target: Arc::new(target),
            scope: injector.downgrade(),
            _signature: PhantomData,
        }
    }

    /// Call the target after injecting all of its arguments
    pub fn call(&self) -> InjectionResult<Ret> {
        self.call_with(Args::Partial::default())
    }

    /// Call the target with some explicit arguments.
    ///
    /// The injector is not consulted for the arguments given as ```Some(value)```.
    pub fn call_with(&self, explicit: Args::Partial) -> InjectionResult<Ret> {
        let injector = self.injector()?;
        let args = Args::resolve(&injector, explicit)?;
        Ok(self.target.as_ref().call(args))
    }

    /// The scope providing the missing arguments
    pub fn injector(&self) -> InjectionResult<Injector> {
        self.scope.upgrade()
    }

    pub fn target(&self) -> &F {
        &self.target
    }
}

impl<F, Args, Ret> Clone for Consumer<F, Args, Ret> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            scope: self.scope.clone(),
            _signature: PhantomData,
        }
    }
}

/// A consumer is a factory for the return type of its target
impl<F, Args, Ret> Provide<Ret> for Consumer<F, Args, Ret>
where
    F: Callable<Args, Ret> + Send + Sync,
    Args: Dependencies,
{
    fn provide(&self) -> InjectionResult<Ret> {
        self.call()
    }
}

/// An asynchronous callable with injected arguments
pub struct AsyncConsumer<F, Args, Fut> {
    target: Arc<F>,
    scope: WeakInjector,
    _signature: PhantomData<fn(Args) -> Fut>,
}

impl<F, Args, Fut> AsyncConsumer<F, Args, Fut>
where
    F: Callable<Args, Fut>,
    Args: Dependencies,
    Fut: Future,
{
    pub(crate) fn new(target: F, injector: &Injector) -> Self {
        Self {
            target: Arc::new(target),
            scope: injector.downgrade(),
            _signature: PhantomData,
        }
    }

    /// Inject all arguments, then await the target
    pub async fn call(&self) -> InjectionResult<Fut::Output> {
        self.call_with(Args::Partial::default()).await
    }

    /// Inject the missing arguments, then await the target
    pub async fn call_with(&self, explicit: Args::Partial) -> InjectionResult<Fut::Output> {
        let injector = self.injector()?;
        let args = Args::resolve_async(&injector, explicit).await?;
        Ok(self.target.as_ref().call(args).await)
    }

    pub fn injector(&self) -> InjectionResult<Injector> {
        self.scope.upgrade()
    }

    pub fn target(&self) -> &F {
        &self.target
    }
}

impl<F, Args, Fut> Clone for AsyncConsumer<F, Args, Fut> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            scope: self.scope.clone(),
            _signature: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Args, Fut> ProvideAsync<Fut::Output> for AsyncConsumer<F, Args, Fut>
where
    F: Callable<Args, Fut> + Send + Sync,
    Args: Dependencies,
    Fut: Future + Send,
    Fut::Output: Send,
{
    async fn provide_async(&self) -> InjectionResult<Fut::Output> {
        self.call().await
    }
}

/// Turn a callable into a [Consumer].
///
/// Implemented for plain functions of up to 10 parameters, next to [Callable].
/// Consumers are returned unchanged: they stay bound to their original scope.
pub trait IntoConsumer<Args, Ret> {
    type Target: Callable<Args, Ret>;

    fn into_consumer(self, injector: &Injector) -> Consumer<Self::Target, Args, Ret>;
}

impl<F, Args, Ret> IntoConsumer<Args, Ret> for Consumer<F, Args, Ret>
where
    F: Callable<Args, Ret>,
{
    type Target = F;

    fn into_consumer(self, _injector: &Injector) -> Self {
        self
    }
}

/// Turn an asynchronous callable into an [AsyncConsumer]
pub trait IntoAsyncConsumer<Args, Fut> {
    type Target: Callable<Args, Fut>;

    fn into_async_consumer(self, injector: &Injector) -> AsyncConsumer<Self::Target, Args, Fut>;
}

impl<F, Args, Fut> IntoAsyncConsumer<Args, Fut> for AsyncConsumer<F, Args, Fut>
where
    F: Callable<Args, Fut>,
{
    type Target = F;

    fn into_async_consumer(self, _injector: &Injector) -> Self {
        self
    }
}
