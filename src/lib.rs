//! Scoped provider/consumer dependency injection.
//!
//! Functions declare the values they need as typed parameters. An [Injector] fills the
//! parameters which were not given explicitly, using the providers registered for their types.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use serp::*;
//! // Define traits and implementors
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "Hello world".to_string()
//!     }
//! }
//!
//! # fn main() -> Result<(), InjectionError> {
//! let registry = Registry::new();
//!
//! // Register a lazy singleton and expose it as a trait object
//! registry.provider(|| Arc::new(English));
//! bind!(registry, Arc<English> => Arc<dyn Greeter>)?;
//!
//! // Bind a function to the scope: its parameter is injected when not given
//! let shout = registry.consumer(|greeter: Arc<dyn Greeter>| greeter.greet().to_uppercase());
//! assert_eq!(shout.call()?, "HELLO WORLD");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! * The ```Provide<T>``` and ```ProvideAsync<T>``` traits indicate that a struct can produce an
//!   instance of the target type, without or with suspension.
//!   The provider can be either a singleton of the target type or a factory for on-demand instances.
//! * A ```Consumer``` binds a callable to an injector. Its parameter types form a tuple implementing
//!   ```Dependencies```, which resolves each missing argument through the injector.
//!   A consumer is itself a factory for its return type.
//! * The ```Injector``` is a scope in a tree. It stores at most one provider per type and
//!   delegates missing types to its ancestors, caching the result.
//! * The ```Registry``` owns the root of a scope tree and finds nested scopes by dotted name.

mod consumer;
mod helpers;
mod inject;
mod registry;
mod resolve;

pub use consumer::{AsyncConsumer, Consumer, IntoAsyncConsumer, IntoConsumer};
pub use helpers::{MapProvider, SingletonAsyncProvider, SingletonProvider, UpcastProvider, ValueProvider};
pub use inject::{Callable, Dependencies, Injector};
pub use registry::{Module, Registry};
pub use resolve::{InjectionError, InjectionResult, Provide, ProvideAsync, Provider, TypeKey};

#[cfg(test)]
mod tests;
