//! In-memory settings store.
//!
//! Keeps keys in a map and enforces locks by rejecting writes to locked keys, the way a variable policy protected
//! key behaves in firmware. Useful for hosted tooling and tests.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{
    collections::{BTreeMap, BTreeSet},
    string::{String, ToString},
    vec::Vec,
};
use core::cell::RefCell;

use r_efi::efi;

use crate::storage::{SettingsStore, StoredVariable, VariableLock};

/// A [`SettingsStore`] and [`VariableLock`] backed by memory.
#[derive(Debug, Default)]
pub struct MemoryVariableStore {
    variables: RefCell<BTreeMap<String, StoredVariable>>,
    locked: RefCell<BTreeSet<String>>,
}

impl MemoryVariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored bytes of `name`, if present.
    pub fn value(&self, name: &str) -> Option<Vec<u8>> {
        self.variables.borrow().get(name).map(|variable| variable.data.clone())
    }

    /// Returns true if `name` has been locked.
    pub fn is_locked(&self, name: &str) -> bool {
        self.locked.borrow().contains(name)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.variables.borrow().len()
    }

    /// Returns true when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.variables.borrow().is_empty()
    }
}

impl SettingsStore for MemoryVariableStore {
    fn get_variable(&self, name: &str) -> Result<StoredVariable, efi::Status> {
        self.variables.borrow().get(name).cloned().ok_or(efi::Status::NOT_FOUND)
    }

    fn set_variable(&self, name: &str, data: &[u8], attributes: u32) -> Result<(), efi::Status> {
        if self.is_locked(name) {
            return Err(efi::Status::WRITE_PROTECTED);
        }

        let mut variables = self.variables.borrow_mut();
        // Writing zero bytes deletes the key, as SetVariable does.
        if data.is_empty() {
            return variables.remove(name).map(|_| ()).ok_or(efi::Status::NOT_FOUND);
        }
        variables.insert(name.to_string(), StoredVariable { data: data.to_vec(), attributes });
        Ok(())
    }
}

impl VariableLock for MemoryVariableStore {
    fn lock_variable(&self, name: &str) -> Result<(), efi::Status> {
        self.locked.borrow_mut().insert(name.to_string());
        Ok(())
    }
}
