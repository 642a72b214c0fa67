//! Ordered collection of service definitions.
//!
//! Registration order is the startup order: the coordination service is
//! registered before the services that need it reachable, the image
//! registry before anything that pulls internal images. The registry is an
//! explicit object constructed by the caller and handed to the supervisor;
//! there is no ambient global set of well-known services.

use crate::definition::ServiceDefinition;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Service definitions keyed by name, in registration order.
#[derive(Default)]
pub struct Registry {
    defs: Vec<Arc<ServiceDefinition>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Fails with [`Error::DuplicateService`] when the
    /// name is already taken; the first registration is unaffected.
    pub fn register(&mut self, def: ServiceDefinition) -> Result<()> {
        let name = def.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateService(name));
        }
        self.index.insert(name, self.defs.len());
        self.defs.push(Arc::new(def));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ServiceDefinition>> {
        self.index.get(name).map(|&i| Arc::clone(&self.defs[i]))
    }

    /// All definitions in registration order.
    pub fn all(&self) -> Vec<Arc<ServiceDefinition>> {
        self.defs.iter().map(Arc::clone).collect()
    }

    /// The named definitions, in registration order (not request order, so a
    /// subset start still honors dependency ordering). Fails with
    /// [`Error::UnknownService`] on the first name that doesn't resolve;
    /// unknown names are never silently dropped.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<ServiceDefinition>>> {
        let mut wanted = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            match self.index.get(name) {
                Some(&i) => wanted.push(i),
                None => return Err(Error::UnknownService(name.to_string())),
            }
        }
        wanted.sort_unstable();
        wanted.dedup();
        Ok(wanted.into_iter().map(|i| Arc::clone(&self.defs[i])).collect())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("services", &self.names()).finish()
    }
}
