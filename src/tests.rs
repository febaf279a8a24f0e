use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

#[derive(Debug)]
struct A;
#[derive(Debug)]
struct B;
#[derive(Debug)]
struct C;

trait Animal: Send + Sync {
    fn name(&self) -> &str;
}

struct Dog;

impl Animal for Dog {
    fn name(&self) -> &str {
        "dog"
    }
}

struct Config(String);

struct Repository {
    config: Arc<Config>,
}

fn same_object<T: ?Sized, U: ?Sized>(left: &Arc<T>, right: &Arc<U>) -> bool {
    Arc::as_ptr(left).cast::<()>() == Arc::as_ptr(right).cast::<()>()
}

#[test]
fn provide_consume_default() -> InjectionResult<()> {
    let injector = Injector::new();
    let (a, b, c) = (Arc::new(A), Arc::new(B), Arc::new(C));
    let provider_calls = Arc::new(AtomicUsize::new(0));
    let factory_calls = Arc::new(AtomicUsize::new(0));

    // consumers resolve their arguments when called, not when bound
    let consume = injector.consumer(|a: Arc<A>, b: Arc<B>, c: Arc<C>| (a, b, c));

    {
        let (a, calls) = (a.clone(), provider_calls.clone());
        injector.provider(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            a.clone()
        });
    }
    {
        let (c, calls) = (c.clone(), factory_calls.clone());
        injector.factory(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            c.clone()
        });
    }

    for _ in 0..2 {
        let (a_, b_, c_) = consume.call_with((None, Some(b.clone()), None))?;
        assert!(Arc::ptr_eq(&a_, &a));
        assert!(Arc::ptr_eq(&b_, &b));
        assert!(Arc::ptr_eq(&c_, &c));
    }
    consume.call_with((Some(a.clone()), Some(b.clone()), Some(c.clone())))?;

    assert_eq!(provider_calls.load(Ordering::SeqCst), 1);
    assert_eq!(factory_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn singleton_keeps_identity() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.provider(|| Arc::new(A));

    let a1: Arc<A> = injector.get_provided()?;
    let a2: Arc<A> = injector.get_provided()?;
    assert!(Arc::ptr_eq(&a1, &a2));
    Ok(())
}

#[test]
fn factory_builds_fresh_values() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.factory(|| Arc::new(A));

    let a1: Arc<A> = injector.get_provided()?;
    let a2: Arc<A> = injector.get_provided()?;
    assert!(!Arc::ptr_eq(&a1, &a2));
    Ok(())
}

#[test]
fn explicit_arguments_skip_the_injector() -> InjectionResult<()> {
    let injector = Injector::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    injector.provider(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Arc::new(A)
    });

    let consume = injector.consumer(|a: Arc<A>| a);
    let other = Arc::new(A);
    let used = consume.call_with((Some(other.clone()),))?;

    assert!(Arc::ptr_eq(&used, &other));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn missing_provider_fails() {
    let injector = Injector::new();
    let consume = injector.consumer(|_a: Arc<A>, _b: Arc<B>| ());
    injector.provider(|| Arc::new(A));

    let err = consume.call().unwrap_err();
    assert!(matches!(err, InjectionError::Unresolved(key) if key == TypeKey::of::<Arc<B>>()));
    assert!(err.to_string().contains("B"));
}

#[test]
fn error_names_the_type() {
    let err = InjectionError::Unresolved(TypeKey::of::<u32>());
    assert_eq!(err.to_string(), "Type 'u32' has no provider");
}

#[test]
fn last_registration_wins() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.instance(1u32);
    injector.instance(2u32);
    assert_eq!(injector.get_provided::<u32>()?, 2);
    Ok(())
}

#[test]
fn provider_arguments_are_injected() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.instance(Arc::new(Config("db".to_string())));
    injector.provider(|config: Arc<Config>| format!("{}://localhost", config.0));

    assert_eq!(injector.get_provided::<String>()?, "db://localhost");
    Ok(())
}

#[test]
fn inject_inherited() -> InjectionResult<()> {
    let injector = Injector::new();
    let consume = injector.consumer(|animal: Arc<dyn Animal>| animal);
    injector.provider(|| Arc::new(Dog));
    bind!(injector, Arc<Dog> => Arc<dyn Animal>)?;

    let animal = consume.call()?;
    let dog: Arc<Dog> = injector.get_provided()?;
    assert_eq!(animal.name(), "dog");
    assert!(same_object(&animal, &dog));
    Ok(())
}

#[test]
fn supertype_follows_a_new_registration() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.provider(|| Arc::new(Dog));
    bind!(injector, Arc<Dog> => Arc<dyn Animal>)?;
    let first: Arc<dyn Animal> = injector.get_provided()?;

    let second = Arc::new(Dog);
    injector.instance(second.clone());
    let animal: Arc<dyn Animal> = injector.get_provided()?;
    assert!(same_object(&animal, &second));
    assert!(!same_object(&animal, &first));
    Ok(())
}

#[test]
fn supertype_bound_in_a_child_follows_the_root() -> InjectionResult<()> {
    let root = Injector::new();
    let child = root.get_child("c");
    root.instance(Arc::new(Dog));
    bind!(child, Arc<Dog> => Arc<dyn Animal>)?;

    let second = Arc::new(Dog);
    root.instance(second.clone());
    let animal: Arc<dyn Animal> = child.get_provided()?;
    assert!(same_object(&animal, &second));
    Ok(())
}

#[test]
fn supertype_does_not_provide_subtype() {
    let injector = Injector::new();
    let consume = injector.consumer(|dog: Arc<Dog>| dog);
    injector.provider(|| -> Arc<dyn Animal> { Arc::new(Dog) });

    assert!(matches!(consume.call(), Err(InjectionError::Unresolved(_))));
}

#[test]
fn bind_requires_a_provider() {
    let injector = Injector::new();
    let result = bind!(injector, Arc<Dog> => Arc<dyn Animal>);
    assert!(matches!(result, Err(InjectionError::Unresolved(key)) if key == TypeKey::of::<Arc<Dog>>()));
}

#[test]
fn build_scoped_injector() {
    let registry = Registry::new();
    let e = registry.get_injector("q.w.e");
    let d = registry.get_injector("q.w.d");
    assert_eq!(e.name(), "e");
    assert_eq!(d.name(), "d");
    assert_eq!(e.path(), "q.w.e");

    let w = e.parent().unwrap();
    assert_eq!(w.name(), "w");
    assert_eq!(Some(&w), d.parent().as_ref());

    let q = w.parent().unwrap();
    assert_eq!(q.name(), "q");
    let root = q.parent().unwrap();
    assert!(root.is_root());
    assert_eq!(&root, registry.root());
    assert_eq!(registry.get_injector(""), root);
}

#[test]
fn scope_lookup_is_idempotent() {
    let registry = Registry::new();
    assert_eq!(registry.get_injector("a.b"), registry.get_injector("a.b"));
    assert_eq!(registry.get_injector("a..b"), registry.get_injector("a.b"));
    assert_eq!(registry.get_child("a").get_child("b"), registry.get_injector("a.b"));
    assert_ne!(registry.get_injector("a"), registry.get_injector("b"));

    let a = registry.get_injector("a");
    assert_eq!(a.get_child(""), a);
}

#[test]
fn ancestors_are_visible_to_descendants() -> InjectionResult<()> {
    let registry = Registry::new();
    let web = registry.get_injector("app.web");
    registry.instance(Arc::new(A));
    web.instance(Arc::new(B));

    let from_child = web.consumer(|a: Arc<A>, b: Arc<B>| (a, b));
    from_child.call()?;

    let from_root = registry.consumer(|b: Arc<B>| b);
    assert!(matches!(from_root.call(), Err(InjectionError::Unresolved(_))));
    Ok(())
}

#[test]
fn closer_registration_replaces_cached_provider() -> InjectionResult<()> {
    let registry = Registry::new();
    let leaf = registry.get_injector("a.b");
    registry.instance(1u32);
    assert_eq!(leaf.get_provided::<u32>()?, 1);

    registry.get_injector("a").instance(2u32);
    assert_eq!(leaf.get_provided::<u32>()?, 2);

    // a new root registration does not shadow the closer one
    registry.instance(3u32);
    assert_eq!(leaf.get_provided::<u32>()?, 2);
    assert_eq!(registry.get_provided::<u32>()?, 3);
    Ok(())
}

#[test]
fn providers_resolve_in_their_own_scope() -> InjectionResult<()> {
    let registry = Registry::new();
    let child = registry.get_injector("child");
    registry.instance(1u32);
    registry.factory(|n: u32| format!("n={}", n));
    child.instance(2u32);

    assert_eq!(child.get_provided::<String>()?, "n=1");
    Ok(())
}

#[test]
fn rewrapping_a_consumer_keeps_its_scope() -> InjectionResult<()> {
    let root = Injector::new();
    let other = root.get_child("other");
    root.instance(1u32);
    other.instance(2u32);

    let consume = root.consumer(|n: u32| n);
    let same = other.consumer(consume.clone());
    assert_eq!(same.call()?, 1);
    assert_eq!(same.injector()?, root);
    Ok(())
}

#[test]
fn dropped_scope_detaches_consumers() {
    let consume = {
        let injector = Injector::new();
        injector.instance(1u32);
        injector.consumer(|n: u32| n)
    };
    assert!(matches!(consume.call(), Err(InjectionError::Detached(_))));
}

#[test]
fn dropped_parent_detaches_its_children() {
    let child = {
        let root = Injector::new();
        root.instance(1u32);
        root.get_child("a.b")
    };
    assert!(!child.is_root());
    assert!(matches!(child.get_provided::<u32>(), Err(InjectionError::Detached(_))));
}

#[test]
fn service_is_a_shared_singleton() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.instance(Arc::new(Config("db".to_string())));
    injector.service(|config: Arc<Config>| Repository { config });

    let r1: Arc<Repository> = injector.get_provided()?;
    let r2: Arc<Repository> = injector.get_provided()?;
    assert!(Arc::ptr_eq(&r1, &r2));
    assert_eq!(r1.config.0, "db");
    Ok(())
}

struct StorageModule {
    url: &'static str,
}

impl Module for StorageModule {
    fn configure(&self, injector: &Injector) -> InjectionResult<()> {
        injector.instance(Arc::new(Config(self.url.to_string())));
        injector.service(|config: Arc<Config>| Repository { config });
        Ok(())
    }
}

#[test]
fn install_modules() -> InjectionResult<()> {
    let registry = Registry::new();
    let scope = registry.get_injector("storage");
    scope
        .install(&StorageModule { url: "mem://" })?
        .install(&|injector: &Injector| {
            injector.provider(|| Arc::new(Dog));
            bind!(injector, Arc<Dog> => Arc<dyn Animal>)
        })?;

    let repo: Arc<Repository> = scope.get_provided()?;
    assert_eq!(repo.config.0, "mem://");
    let animal: Arc<dyn Animal> = scope.get_provided()?;
    assert_eq!(animal.name(), "dog");
    Ok(())
}

#[test]
fn provider_reports_its_type() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.instance(1u32);
    let provider = injector.get_provider::<u32>()?;
    assert!(provider.is_blocking());
    assert_eq!(provider.provides(), TypeKey::of::<u32>());
    assert_eq!(provider.provide()?, 1);
    Ok(())
}

#[test]
fn injector_is_shareable() -> InjectionResult<()> {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Injector>();
    assert_send_sync::<Registry>();

    let registry = Registry::new();
    registry.provider(|| Arc::new(A));
    let scope = registry.get_injector("worker");
    let resolved = std::thread::scope(|s| {
        let handle = s.spawn(|| scope.get_provided::<Arc<A>>());
        handle.join().unwrap()
    })?;
    assert!(Arc::ptr_eq(&resolved, &registry.get_provided::<Arc<A>>()?));
    Ok(())
}

#[tokio::test]
async fn async_provide_consume_default() -> InjectionResult<()> {
    let injector = Injector::new();
    let (a, b, c) = (Arc::new(A), Arc::new(B), Arc::new(C));
    let provider_calls = Arc::new(AtomicUsize::new(0));
    let factory_calls = Arc::new(AtomicUsize::new(0));

    let consume = injector.async_consumer(|a: Arc<A>, b: Arc<B>, c: Arc<C>| async move { (a, b, c) });

    {
        let (a, calls) = (a.clone(), provider_calls.clone());
        injector.async_provider(move || {
            let (a, calls) = (a.clone(), calls.clone());
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                a
            }
        });
    }
    {
        let (c, calls) = (c.clone(), factory_calls.clone());
        injector.async_factory(move || {
            let (c, calls) = (c.clone(), calls.clone());
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                c
            }
        });
    }

    for _ in 0..2 {
        let (a_, b_, c_) = consume.call_with((None, Some(b.clone()), None)).await?;
        assert!(Arc::ptr_eq(&a_, &a));
        assert!(Arc::ptr_eq(&b_, &b));
        assert!(Arc::ptr_eq(&c_, &c));
    }
    consume
        .call_with((Some(a.clone()), Some(b.clone()), Some(c.clone())))
        .await?;

    assert_eq!(provider_calls.load(Ordering::SeqCst), 1);
    assert_eq!(factory_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn async_missing_provider_fails() {
    let injector = Injector::new();
    let consume = injector.async_consumer(|_a: Arc<A>, _b: Arc<B>| async {});
    injector.async_provider(|| async { Arc::new(A) });

    let result = consume.call().await;
    assert!(matches!(result, Err(InjectionError::Unresolved(key)) if key == TypeKey::of::<Arc<B>>()));
}

#[tokio::test]
async fn async_provider_needs_async_path() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.async_provider(|| async { 5u32 });

    assert!(matches!(
        injector.get_provided::<u32>(),
        Err(InjectionError::AsyncInSyncContext(key)) if key == TypeKey::of::<u32>()
    ));
    let consume = injector.consumer(|n: u32| n + 1);
    assert!(matches!(consume.call(), Err(InjectionError::AsyncInSyncContext(_))));

    assert_eq!(injector.get_provided_async::<u32>().await?, 5);
    Ok(())
}

#[tokio::test]
async fn blocking_provider_on_async_path() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.provider(|| 7u32);

    let consume = injector.async_consumer(|n: u32| async move { n + 1 });
    assert_eq!(consume.call().await?, 8);
    Ok(())
}

#[tokio::test]
async fn async_providers_chain() -> InjectionResult<()> {
    let registry = Registry::new();
    let scope = registry.get_injector("jobs");
    registry.async_provider(|| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Arc::new(Config("queue".to_string()))
    });
    scope.async_factory(|config: Arc<Config>| async move { format!("{}-worker", config.0) });

    assert_eq!(scope.get_provided_async::<String>().await?, "queue-worker");
    Ok(())
}

#[tokio::test]
async fn async_singleton_is_built_once() -> InjectionResult<()> {
    let injector = Injector::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    injector.async_provider(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Arc::new(A)
        }
    });

    let (a1, a2) = tokio::join!(
        injector.get_provided_async::<Arc<A>>(),
        injector.get_provided_async::<Arc<A>>()
    );
    assert!(Arc::ptr_eq(&a1?, &a2?));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn rewrapping_an_async_consumer_keeps_its_scope() -> InjectionResult<()> {
    let root = Injector::new();
    let other = root.get_child("other");
    root.instance(1u32);
    other.instance(2u32);

    let consume = root.async_consumer(|n: u32| async move { n });
    let same = other.async_consumer(consume.clone());
    assert_eq!(same.call().await?, 1);
    assert_eq!(same.injector()?, root);
    Ok(())
}

#[tokio::test]
async fn async_supertype_binding() -> InjectionResult<()> {
    let injector = Injector::new();
    injector.async_provider(|| async { Arc::new(Dog) });
    bind!(injector, Arc<Dog> => Arc<dyn Animal>)?;

    assert!(matches!(
        injector.get_provided::<Arc<dyn Animal>>(),
        Err(InjectionError::AsyncInSyncContext(_))
    ));
    let animal: Arc<dyn Animal> = injector.get_provided_async().await?;
    let dog: Arc<Dog> = injector.get_provided_async().await?;
    assert!(same_object(&animal, &dog));
    Ok(())
}
