use std::any::type_name;
use std::ops::Deref;

use crate::{InjectionResult, Injector};

/// Root of a scope tree.
///
/// The registry is created once by the application and handed down to the code that
/// needs a scope. It dereferences to its root [Injector], so the registration and
/// resolution methods of the root are available directly.
#[derive(Debug, Default)]
pub struct Registry {
    root: Injector,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Injector {
        &self.root
    }

    /// Get a scope by its dotted name, creating it if needed.
    ///
    /// The empty name denotes the root.
    pub fn get_injector(&self, name: &str) -> Injector {
        if name.is_empty() {
            return self.root.clone();
        }
        self.root.get_child(name)
    }
}

impl Deref for Registry {
    type Target = Injector;

    fn deref(&self) -> &Injector {
        &self.root
    }
}

/// A reusable set of registrations
pub trait Module {
    fn configure(&self, injector: &Injector) -> InjectionResult<()>;
}

impl<F> Module for F
where
    F: Fn(&Injector) -> InjectionResult<()>,
{
    fn configure(&self, injector: &Injector) -> InjectionResult<()> {
        self(injector)
    }
}

impl Injector {
    /// Apply the registrations of a module to this scope
    pub fn install<M: Module>(&self, module: &M) -> InjectionResult<&Self> {
        tracing::debug!(scope = %self.path(), module = type_name::<M>(), "installing module");
        module.configure(self)?;
        Ok(self)
    }
}
