//! Type registry: type tag -> factory of fresh, empty values.
//!
//! Populate at process start (`&mut self`), then share read-only behind an
//! `Arc`. Lookups never mutate the registry.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::command::{Command, CommandPayload};
use crate::event::{EventData, EventPayload};

pub type Factory<D> = Arc<dyn Fn() -> Box<D> + Send + Sync>;

/// Registry of event payload types, keyed by event type.
pub type EventDataRegistry = Registry<dyn EventData>;

/// Registry of command types, keyed by command type.
pub type CommandRegistry = Registry<dyn Command>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("type not registered: {0}")]
    Unregistered(String),

    #[error("type already registered: {0}")]
    AlreadyRegistered(String),

    #[error("attempt to register an empty type name")]
    EmptyTypeName,
}

pub struct Registry<D: ?Sized> {
    factories: HashMap<String, Factory<D>>,
}

impl<D: ?Sized> Registry<D> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `type_name`.
    pub fn register_with<F>(
        &mut self,
        type_name: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<D> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(RegistryError::EmptyTypeName);
        }
        if self.factories.contains_key(&type_name) {
            return Err(RegistryError::AlreadyRegistered(type_name));
        }

        tracing::debug!(type_name = %type_name, "registered type");
        self.factories.insert(type_name, Arc::new(factory));
        Ok(())
    }

    /// A fresh, empty instance of `type_name`.
    pub fn create(&self, type_name: &str) -> Result<Box<D>, RegistryError> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::Unregistered(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<D: ?Sized> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ?Sized> core::fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl Registry<dyn EventData> {
    /// Register `T` under `T::EVENT_TYPE`.
    pub fn register<T: EventPayload>(&mut self) -> Result<(), RegistryError> {
        self.register_with(T::EVENT_TYPE, || -> Box<dyn EventData> { Box::new(T::default()) })
    }
}

impl Registry<dyn Command> {
    /// Register `T` under `T::COMMAND_TYPE`.
    pub fn register<T: CommandPayload>(&mut self) -> Result<(), RegistryError> {
        self.register_with(T::COMMAND_TYPE, || -> Box<dyn Command> { Box::new(T::default()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Deposited {
        amount: i64,
    }

    impl EventPayload for Deposited {
        const EVENT_TYPE: &'static str = "deposited";
    }

    #[derive(Debug, Default, Deserialize)]
    struct Deposit {
        #[allow(dead_code)]
        amount: i64,
    }

    impl CommandPayload for Deposit {
        const COMMAND_TYPE: &'static str = "deposit";
    }

    #[test]
    fn create_returns_fresh_instances() {
        let mut registry = EventDataRegistry::new();
        registry.register::<Deposited>().unwrap();

        let mut first = registry.create("deposited").unwrap();
        first.decode_json(r#"{"amount":5}"#).unwrap();

        let second = registry.create("deposited").unwrap();
        assert_eq!(second.downcast_ref::<Deposited>(), Some(&Deposited::default()));
        assert_eq!(first.downcast_ref::<Deposited>(), Some(&Deposited { amount: 5 }));
    }

    #[test]
    fn unknown_type_is_unregistered() {
        let registry = CommandRegistry::new();
        let err = registry.create("deposit").unwrap_err();
        assert_eq!(err, RegistryError::Unregistered("deposit".into()));
        assert_eq!(err.to_string(), "type not registered: deposit");
    }

    #[test]
    fn duplicate_and_empty_names_are_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register::<Deposit>().unwrap();
        assert_eq!(
            registry.register::<Deposit>(),
            Err(RegistryError::AlreadyRegistered("deposit".into()))
        );
        assert_eq!(
            registry.register_with("", || -> Box<dyn Command> { Box::new(Deposit::default()) }),
            Err(RegistryError::EmptyTypeName)
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("deposit"));
    }

    #[test]
    fn type_names_are_sorted() {
        let mut registry = CommandRegistry::new();
        registry
            .register_with("b", || -> Box<dyn Command> { Box::new(Deposit::default()) })
            .unwrap();
        registry
            .register_with("a", || -> Box<dyn Command> { Box::new(Deposit::default()) })
            .unwrap();
        assert_eq!(registry.type_names(), vec!["a", "b"]);
        assert!(!registry.is_empty());
    }
}
