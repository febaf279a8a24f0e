use std::any::Any;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;

use crate::helpers::{MapProvider, SingletonAsyncProvider, SingletonProvider, UpcastProvider, ValueProvider};
use crate::*;

/// A scope in the injection tree.
///
/// Each injector holds its own provider registrations and falls back to its parent for
/// missing types. Providers obtained from an ancestor are cached locally, and dropped again
/// when a registration for the same type is added closer to the requesting scope.
///
/// This is a cheap handle: clones refer to the same scope and compare equal.
#[derive(Clone)]
pub struct Injector {
    node: Arc<Node>,
}

struct Node {
    name: String,
    parent: Option<Weak<Node>>,
    children: Mutex<HashMap<String, Injector>>,
    providers: RwLock<TypeMap>,
}

impl Injector {
    /// Create a new root scope, separated from any other tree
    pub fn new() -> Self {
        Self::with_parent("", None)
    }

    fn with_parent(name: &str, parent: Option<&Injector>) -> Self {
        Self {
            node: Arc::new(Node {
                name: name.to_string(),
                parent: parent.map(|p| Arc::downgrade(&p.node)),
                children: Mutex::default(),
                providers: RwLock::default(),
            }),
        }
    }

    /// Last segment of the scope name, empty for a root
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Dotted name of this scope, from the root
    pub fn path(&self) -> String {
        let mut names = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(inj) = cur {
            if !inj.is_root() {
                names.push(inj.name().to_string());
            }
            cur = inj.parent();
        }
        names.reverse();
        names.join(".")
    }

    pub fn parent(&self) -> Option<Injector> {
        self.node
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|node| Injector { node })
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    /// Get or create a descendant scope.
    ///
    /// The dotted name is split to walk the scope tree, creating missing nodes on the way.
    /// Empty segments are skipped, an empty name returns this scope.
    pub fn get_child(&self, name: &str) -> Injector {
        name.split('.')
            .filter(|part| !part.is_empty())
            .fold(self.clone(), |inj, part| inj.child(part))
    }

    fn child(&self, name: &str) -> Injector {
        let mut children = self.node.children.lock().unwrap_or_else(PoisonError::into_inner);
        children
            .entry(name.to_string())
            .or_insert_with(|| {
                let child = Injector::with_parent(name, Some(self));
                tracing::debug!(scope = %child.path(), "created scope");
                child
            })
            .clone()
    }

    fn children(&self) -> Vec<Injector> {
        let children = self.node.children.lock().unwrap_or_else(PoisonError::into_inner);
        children.values().cloned().collect()
    }

    pub(crate) fn downgrade(&self) -> WeakInjector {
        WeakInjector {
            node: Arc::downgrade(&self.node),
            path: self.path(),
        }
    }

    fn read_map(&self) -> RwLockReadGuard<'_, TypeMap> {
        self.node.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, TypeMap> {
        self.node.providers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a provider for its type in this scope.
    ///
    /// An existing registration for the same type is replaced. Descendant scopes which
    /// cached a provider for this type from an ancestor forget it.
    pub fn register<T: 'static>(&self, provider: Provider<T>) {
        let key = provider.provides();
        let replaced = self.write_map().insert(key, Origin::Registered, provider);
        if replaced == Some(Origin::Registered) {
            tracing::debug!(scope = %self.path(), provides = %key, "replaced provider");
        } else {
            tracing::debug!(scope = %self.path(), provides = %key, "registered provider");
        }
        self.forget_delegated(key);
    }

    fn forget_delegated(&self, key: TypeKey) {
        for child in self.children() {
            if child.write_map().remove_delegated(key) {
                tracing::debug!(scope = %child.path(), provides = %key, "dropped cached provider");
            }
            child.forget_delegated(key);
        }
    }

    /// Get a provider for the target type.
    ///
    /// Look in this scope first, then walk up the ancestors. A provider found in an
    /// ancestor is cached in this scope. A scope whose parent was dropped is detached.
    pub fn get_provider<T: 'static>(&self) -> InjectionResult<Provider<T>> {
        let key = TypeKey::of::<T>();
        if let Some(provider) = self.read_map().get::<T>() {
            return Ok(provider);
        }
        let parent = match &self.node.parent {
            None => return Err(InjectionError::Unresolved(key)),
            Some(parent) => parent.upgrade().map(|node| Injector { node }),
        };
        let parent = parent.ok_or_else(|| InjectionError::Detached(self.path()))?;
        let provider = parent.get_provider::<T>()?;
        tracing::trace!(scope = %self.path(), provides = %key, "caching provider from parent scope");
        self.write_map().insert_delegated(key, provider.clone());
        Ok(provider)
    }

    /// Obtain an instance of the target type on a blocking path
    pub fn get_provided<T: 'static>(&self) -> InjectionResult<T> {
        self.get_provider::<T>()?.provide()
    }

    /// Obtain an instance of the target type, suspending if its provider needs to
    pub async fn get_provided_async<T: 'static>(&self) -> InjectionResult<T> {
        let provider = self.get_provider::<T>()?;
        provider.provide_async().await
    }

    /// Register a ready value, cloned for each consumer
    pub fn instance<T: Clone + Send + Sync + 'static>(&self, value: T) {
        self.register(Provider::blocking(ValueProvider::new(value)));
    }

    /// Bind a callable to this scope: its missing arguments will be injected
    pub fn consumer<C, Args, Ret>(&self, target: C) -> Consumer<C::Target, Args, Ret>
    where
        C: IntoConsumer<Args, Ret>,
    {
        target.into_consumer(self)
    }

    /// Bind an asynchronous callable to this scope
    pub fn async_consumer<C, Args, Fut>(&self, target: C) -> AsyncConsumer<C::Target, Args, Fut>
    where
        C: IntoAsyncConsumer<Args, Fut>,
    {
        target.into_async_consumer(self)
    }

    /// Use the return value of a callable as a lazy singleton.
    ///
    /// The callable is bound to this scope and returned for direct use.
    pub fn provider<C, Args, T>(&self, target: C) -> Consumer<C::Target, Args, T>
    where
        C: IntoConsumer<Args, T>,
        C::Target: Send + Sync + 'static,
        Args: Dependencies,
        T: Clone + Send + Sync + 'static,
    {
        let consumer = self.consumer(target);
        self.register(Provider::blocking(SingletonProvider::new(consumer.clone())));
        consumer
    }

    /// Call a function every time its return type is injected
    pub fn factory<C, Args, T>(&self, target: C) -> Consumer<C::Target, Args, T>
    where
        C: IntoConsumer<Args, T>,
        C::Target: Send + Sync + 'static,
        Args: Dependencies,
        T: 'static,
    {
        let consumer = self.consumer(target);
        self.register(Provider::blocking(consumer.clone()));
        consumer
    }

    /// Use the output of an asynchronous callable as a lazy singleton
    pub fn async_provider<C, Args, Fut>(&self, target: C) -> AsyncConsumer<C::Target, Args, Fut>
    where
        C: IntoAsyncConsumer<Args, Fut>,
        C::Target: Send + Sync + 'static,
        Args: Dependencies,
        Fut: Future + Send + 'static,
        Fut::Output: Clone + Send + Sync + 'static,
    {
        let consumer = self.async_consumer(target);
        self.register(Provider::suspending(SingletonAsyncProvider::new(consumer.clone())));
        consumer
    }

    /// Await an asynchronous callable every time its output type is injected
    pub fn async_factory<C, Args, Fut>(&self, target: C) -> AsyncConsumer<C::Target, Args, Fut>
    where
        C: IntoAsyncConsumer<Args, Fut>,
        C::Target: Send + Sync + 'static,
        Args: Dependencies,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let consumer = self.async_consumer(target);
        self.register(Provider::suspending(consumer.clone()));
        consumer
    }

    /// Provide a shared singleton built by an injected constructor.
    ///
    /// The constructed value is registered as ```Arc<T>```.
    pub fn service<C, Args, T>(&self, constructor: C) -> Consumer<C::Target, Args, T>
    where
        C: IntoConsumer<Args, T>,
        C::Target: Send + Sync + 'static,
        Args: Dependencies,
        T: Send + Sync + 'static,
    {
        let consumer = self.consumer(constructor);
        let shared = MapProvider::new(Provider::blocking(consumer.clone()), Arc::new);
        self.register(Provider::blocking(SingletonProvider::new(shared)));
        consumer
    }

    /// Expose the provider of ```S``` as a provider of its supertype ```B```.
    ///
    /// ```S``` must be reachable now. Each request for ```B``` resolves ```S``` again from this
    /// scope, so singletons keep their identity and a later registration of ```S``` is followed.
    /// Requests for ```S``` are never satisfied by providers of ```B```.
    pub fn bind<S, B, F>(&self, convert: F) -> InjectionResult<()>
    where
        S: Send + 'static,
        B: Send + 'static,
        F: Fn(S) -> B + Send + Sync + 'static,
    {
        self.get_provider::<S>()?;
        let provider = Provider::relay(UpcastProvider::new(self, convert));
        tracing::debug!(scope = %self.path(), provides = %TypeKey::of::<S>(), supertype = %provider.provides(), "bound supertype");
        self.register(provider);
        Ok(())
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Injector {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Injector {}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("path", &self.path())
            .field("providers", &self.read_map().0.len())
            .finish()
    }
}

/// Non-owning reference to a scope, held by consumers
#[derive(Clone)]
pub(crate) struct WeakInjector {
    node: Weak<Node>,
    path: String,
}

impl WeakInjector {
    pub(crate) fn upgrade(&self) -> InjectionResult<Injector> {
        self.node
            .upgrade()
            .map(|node| Injector { node })
            .ok_or_else(|| InjectionError::Detached(self.path.clone()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Registered,
    Delegated,
}

struct TypeMapEntry {
    origin: Origin,
    provider: Box<dyn Any + Send + Sync>,
}

/// Store providers of [Any] type
#[derive(Default)]
struct TypeMap(HashMap<TypeKey, TypeMapEntry>);

impl TypeMap {
    fn get<T: 'static>(&self) -> Option<Provider<T>> {
        self.0
            .get(&TypeKey::of::<T>())
            .and_then(|entry| entry.provider.downcast_ref::<Provider<T>>())
            .cloned()
    }

    /// Store a provider, return the origin of the replaced entry if any
    fn insert<T: 'static>(&mut self, key: TypeKey, origin: Origin, provider: Provider<T>) -> Option<Origin> {
        let entry = TypeMapEntry {
            origin,
            provider: Box::new(provider),
        };
        self.0.insert(key, entry).map(|old| old.origin)
    }

    /// Cache a provider obtained from an ancestor, unless the spot was filled meanwhile
    fn insert_delegated<T: 'static>(&mut self, key: TypeKey, provider: Provider<T>) {
        if let Entry::Vacant(v) = self.0.entry(key) {
            v.insert(TypeMapEntry {
                origin: Origin::Delegated,
                provider: Box::new(provider),
            });
        }
    }

    fn remove_delegated(&mut self, key: TypeKey) -> bool {
        match self.0.entry(key) {
            Entry::Occupied(o) if o.get().origin == Origin::Delegated => {
                o.remove();
                true
            }
            _ => false,
        }
    }
}

/*
 * The following is used to inject up to 10 parameters into any function
 * inspired by https://nickbryan.co.uk/software/using-a-type-map-for-dependency-injection-in-rust/
 */

/// A Callable has a ```call``` function with a single argument and a single return type.
///
/// This trait is implemented for all functions with up to 10 arguments, using a tuple to
/// wrap them all in a single type.
pub trait Callable<Args, Ret> {
    fn call(&self, args: Args) -> Ret;
}

/// Tuple of parameter types which can be filled by an [Injector]
///
/// The ```Partial``` tuple wraps each parameter in an [Option]: explicit values are used
/// as they are, missing ones are resolved in the scope chain, in parameter order.
#[async_trait]
pub trait Dependencies: Sized + Send + 'static {
    type Partial: Default + Send;

    fn resolve(injector: &Injector, explicit: Self::Partial) -> InjectionResult<Self>;

    async fn resolve_async(injector: &Injector, explicit: Self::Partial) -> InjectionResult<Self>;
}

macro_rules! callable_tuple ({ $($param:ident)* } => {
    impl<Func, Ret, $($param,)*> Callable<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret,
    {
        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Ret {
            (self)($($param,)*)
        }
    }

    impl<Func, Ret, $($param: Send + 'static,)*> IntoConsumer<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret,
    {
        type Target = Func;

        fn into_consumer(self, injector: &Injector) -> Consumer<Func, ($($param,)*), Ret> {
            Consumer::new(self, injector)
        }
    }

    impl<Func, Fut, $($param: Send + 'static,)*> IntoAsyncConsumer<($($param,)*), Fut> for Func
    where
        Func: Fn($($param),*) -> Fut,
        Fut: Future,
    {
        type Target = Func;

        fn into_async_consumer(self, injector: &Injector) -> AsyncConsumer<Func, ($($param,)*), Fut> {
            AsyncConsumer::new(self, injector)
        }
    }

    #[allow(non_snake_case, unused_variables)]
    #[async_trait]
    impl<$($param: Send + 'static,)*> Dependencies for ($($param,)*) {
        type Partial = ($(Option<$param>,)*);

        fn resolve(injector: &Injector, explicit: Self::Partial) -> InjectionResult<Self> {
            let ($($param,)*) = explicit;
            Ok(($(
                match $param {
                    Some(value) => value,
                    None => injector.get_provided::<$param>()?,
                },
            )*))
        }

        async fn resolve_async(injector: &Injector, explicit: Self::Partial) -> InjectionResult<Self> {
            let ($($param,)*) = explicit;
            Ok(($(
                match $param {
                    Some(value) => value,
                    None => injector.get_provided_async::<$param>().await?,
                },
            )*))
        }
    }
});

callable_tuple! {}
callable_tuple! { A }
callable_tuple! { A B }
callable_tuple! { A B C }
callable_tuple! { A B C D }
callable_tuple! { A B C D E }
callable_tuple! { A B C D E F }
callable_tuple! { A B C D E F G }
callable_tuple! { A B C D E F G H }
callable_tuple! { A B C D E F G H I }
callable_tuple! { A B C D E F G H I J }
