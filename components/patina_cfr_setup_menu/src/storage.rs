//! Settings store binding for CFR options.
//!
//! Every stateful option is backed by one settings key. [`SettingsBinding::ensure`] creates the key with the
//! option's default the first time the option is seen and never touches it afterwards, so values chosen by the user
//! survive later boots. Read-only options additionally get a lock registered for their key.
//!
//! The store and lock service are collaborators: [`runtime::RuntimeVariableStore`] and
//! [`policy::VariablePolicyLock`] talk to firmware, [`memory::MemoryVariableStore`] keeps everything in memory.
//!
//! ## Logging
//!
//! Store decisions are logged at `debug` level and failures at `warn` level using the `cfr` log target.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
pub mod memory;
pub mod policy;
pub mod runtime;

use alloc::vec::Vec;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use r_efi::efi;

use crate::{cfr::OptionFlags, error::CfrError};

/// Value and attributes of a stored settings key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVariable {
    /// Stored bytes.
    pub data: Vec<u8>,
    /// UEFI variable attributes the key was created with.
    pub attributes: u32,
}

/// Persistent key/value settings store.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait SettingsStore {
    /// Reads a key.
    ///
    /// # Returns
    /// - `Ok(StoredVariable)` with the current value and attributes
    /// - `Err(efi::Status::NOT_FOUND)` if the key does not exist
    /// - `Err(status)` for any other failure
    fn get_variable(&self, name: &str) -> Result<StoredVariable, efi::Status>;

    /// Creates or replaces a key.
    ///
    /// A locked key is rejected with `efi::Status::WRITE_PROTECTED`.
    fn set_variable(&self, name: &str, data: &[u8], attributes: u32) -> Result<(), efi::Status>;
}

/// Service that makes a settings key immutable.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait VariableLock {
    /// Registers a lock-now policy for `name`.
    fn lock_variable(&self, name: &str) -> Result<(), efi::Status>;
}

/// Attributes a key is created with for an option carrying `flags`.
pub fn variable_attributes(flags: OptionFlags) -> u32 {
    let mut attributes = efi::VARIABLE_BOOTSERVICE_ACCESS;
    if !flags.contains(OptionFlags::VOLATILE) {
        attributes |= efi::VARIABLE_NON_VOLATILE;
    }
    if flags.contains(OptionFlags::RUNTIME) {
        attributes |= efi::VARIABLE_RUNTIME_ACCESS;
    }
    attributes
}

/// Binds options to their backing keys.
pub struct SettingsBinding<'a> {
    store: &'a dyn SettingsStore,
    lock: Option<&'a dyn VariableLock>,
}

impl<'a> SettingsBinding<'a> {
    /// Creates a binding over `store`. Read-only options are locked through `lock` when one is available.
    pub fn new(store: &'a dyn SettingsStore, lock: Option<&'a dyn VariableLock>) -> Self {
        Self { store, lock }
    }

    /// Makes sure `key` exists, creating it with `default` if it does not.
    ///
    /// Returns the size of the value now associated with the key: the existing value's size when the key was
    /// already present, otherwise the size of `default`. Store and lock failures are logged and otherwise ignored.
    pub fn ensure(&self, key: &str, default: &[u8], flags: OptionFlags) -> usize {
        let stored_len = match self.store.get_variable(key) {
            Ok(existing) => {
                log::debug!(target: "cfr", "Keeping existing value of \"{key}\" ({} bytes)", existing.data.len());
                existing.data.len()
            }
            Err(status) if status == efi::Status::NOT_FOUND => {
                let attributes = variable_attributes(flags);
                match self.store.set_variable(key, default, attributes) {
                    Ok(()) => log::debug!(
                        target: "cfr",
                        "Created \"{key}\" with its default ({} bytes, attributes {attributes:#x})",
                        default.len()
                    ),
                    Err(status) => log::warn!(target: "cfr", "Failed to create \"{key}\": {status:?}"),
                }
                default.len()
            }
            Err(status) => {
                log::warn!(target: "cfr", "Failed to read \"{key}\": {status:?}");
                default.len()
            }
        };

        if flags.contains(OptionFlags::READONLY) {
            self.lock(key);
        }

        stored_len
    }

    fn lock(&self, key: &str) {
        let Some(lock) = self.lock else {
            log::warn!(target: "cfr", "No lock service available, \"{key}\" stays writable");
            return;
        };
        if let Err(status) = lock.lock_variable(key) {
            log::warn!(target: "cfr", "Failed to lock variable \"{key}\": {}", CfrError::LockRegistrationFailed(status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use mockall::predicate::eq;

    #[test]
    fn test_variable_attributes() {
        assert_eq!(variable_attributes(OptionFlags::empty()), 0x3);
        assert_eq!(variable_attributes(OptionFlags::VOLATILE), 0x2);
        assert_eq!(variable_attributes(OptionFlags::RUNTIME), 0x7);
        assert_eq!(variable_attributes(OptionFlags::VOLATILE | OptionFlags::RUNTIME), 0x6);
    }

    #[test]
    fn test_ensure_creates_missing_key() {
        let mut store = MockSettingsStore::new();
        store.expect_get_variable().with(eq("fast_boot")).times(1).returning(|_| Err(efi::Status::NOT_FOUND));
        store
            .expect_set_variable()
            .withf(|name, data, attributes| name == "fast_boot" && data == [1, 0, 0, 0] && *attributes == 0x3)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let binding = SettingsBinding::new(&store, None);
        assert_eq!(binding.ensure("fast_boot", &[1, 0, 0, 0], OptionFlags::empty()), 4);
    }

    #[test]
    fn test_ensure_keeps_existing_key() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get_variable()
            .times(1)
            .returning(|_| Ok(StoredVariable { data: vec![0x41, 0, 0x42, 0, 0x43, 0, 0, 0], attributes: 0x3 }));
        store.expect_set_variable().never();

        let binding = SettingsBinding::new(&store, None);
        assert_eq!(binding.ensure("hostname", &[0x41, 0, 0, 0], OptionFlags::empty()), 8);
    }

    #[test]
    fn test_ensure_does_not_write_on_read_failure() {
        let mut store = MockSettingsStore::new();
        store.expect_get_variable().returning(|_| Err(efi::Status::DEVICE_ERROR));
        store.expect_set_variable().never();

        let binding = SettingsBinding::new(&store, None);
        assert_eq!(binding.ensure("k", &[0; 4], OptionFlags::empty()), 4);
    }

    #[test]
    fn test_ensure_locks_read_only_keys() {
        let mut store = MockSettingsStore::new();
        store.expect_get_variable().returning(|_| Err(efi::Status::NOT_FOUND));
        store.expect_set_variable().returning(|_, _, _| Err(efi::Status::OUT_OF_RESOURCES));
        let mut lock = MockVariableLock::new();
        lock.expect_lock_variable().with(eq("me_state")).times(1).returning(|_| Err(efi::Status::ACCESS_DENIED));

        // Neither the failed write nor the failed lock is fatal.
        let binding = SettingsBinding::new(&store, Some(&lock));
        assert_eq!(binding.ensure("me_state", &[2, 0, 0, 0], OptionFlags::READONLY), 4);
    }

    #[test]
    fn test_ensure_does_not_lock_writable_keys() {
        let mut store = MockSettingsStore::new();
        store.expect_get_variable().returning(|_| Ok(StoredVariable { data: vec![0; 4], attributes: 0x3 }));
        let mut lock = MockVariableLock::new();
        lock.expect_lock_variable().never();

        let binding = SettingsBinding::new(&store, Some(&lock));
        binding.ensure("k", &[0; 4], OptionFlags::GRAYOUT);
    }
}
