//! Component registry.

use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use crate::{component::ComponentDefinition, error::RuntimeError};

/// Registered component definitions, by unique name, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    definitions: Vec<Rc<ComponentDefinition>>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// # Errors
    ///
    /// `DuplicateName` if a definition with the same name exists. The
    /// registry is unchanged in that case.
    pub fn register(
        &mut self,
        definition: ComponentDefinition,
    ) -> Result<Rc<ComponentDefinition>, RuntimeError> {
        let name = definition.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RuntimeError::DuplicateName { name });
        }

        let definition = Rc::new(definition);
        self.by_name.insert(name.clone(), self.definitions.len());
        self.definitions.push(Rc::clone(&definition));
        debug!(component = %name, "registered component");
        Ok(definition)
    }

    /// Look up a definition by name.
    pub fn get(&self, name: &str) -> Option<Rc<ComponentDefinition>> {
        self.by_name.get(name).map(|&index| Rc::clone(&self.definitions[index]))
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|definition| definition.name().to_string()).collect()
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
