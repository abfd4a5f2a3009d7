//! ACL type registry
//!
//! Maps type names used in `acl` declarations to prototype instances. The
//! registry is filled once during startup, then only read: every
//! declaration asks it for a fresh node of the named type.

use super::node::{AclNode, AclType};
use crate::error::{AclError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static GLOBAL: OnceLock<Arc<AclRegistry>> = OnceLock::new();

/// Prototype lookup by type name
#[derive(Debug, Default)]
pub struct AclRegistry {
    prototypes: BTreeMap<&'static str, Box<dyn AclType>>,
}

impl AclRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in ACL type
    pub fn with_builtin_types() -> Result<Self> {
        let mut registry = Self::new();
        crate::types::register_builtin(&mut registry)?;
        Ok(registry)
    }

    /// Register a prototype under its type name
    ///
    /// Each name may be registered once; a second registration is rejected
    /// and leaves the first in place.
    pub fn register(&mut self, prototype: Box<dyn AclType>) -> Result<()> {
        let name = prototype.type_string();
        if self.prototypes.contains_key(name) {
            return Err(AclError::DuplicateType(name.to_string()));
        }
        debug!(acl_type = name, "Registered ACL type");
        self.prototypes.insert(name, prototype);
        Ok(())
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.prototypes.contains_key(type_name)
    }

    /// A fresh, unconfigured node of the named type
    pub fn factory(&self, type_name: &str) -> Result<AclNode> {
        self.prototypes
            .get(type_name)
            .map(|prototype| AclNode::new(prototype.clone_unconfigured()))
            .ok_or_else(|| AclError::UnknownType(type_name.to_string()))
    }

    /// Registered type names in sorted order
    pub fn type_names(&self) -> Vec<&'static str> {
        self.prototypes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Make this registry the process-wide one
    ///
    /// Only the first call succeeds.
    pub fn install(self) -> Result<Arc<AclRegistry>> {
        let registry = Arc::new(self);
        GLOBAL
            .set(Arc::clone(&registry))
            .map_err(|_| AclError::RegistryInstalled)?;
        Ok(registry)
    }

    /// The process-wide registry, once installed
    pub fn global() -> Option<Arc<AclRegistry>> {
        GLOBAL.get().cloned()
    }
}
