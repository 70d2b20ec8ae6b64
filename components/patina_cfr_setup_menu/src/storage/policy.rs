//! Settings key locking through the EDK II variable policy protocol.
//!
//! A lock is a `VARIABLE_POLICY_ENTRY` with the lock-now policy type and no size or attribute constraints. The
//! entry is followed by the UCS-2 variable name it applies to.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;
use core::ffi::c_void;

use r_efi::efi;
use scroll::{Pwrite, LE};

use crate::storage::{runtime::variable_name, VariableLock};

/// GUID for the EDKII Variable Policy Protocol.
pub const EDKII_VARIABLE_POLICY_PROTOCOL_GUID: efi::Guid =
    efi::Guid::from_fields(0x81d1675c, 0x86f6, 0x48df, 0xbd, 0x95, &[0x9a, 0x6e, 0x4f, 0x09, 0x25, 0xc3]);

/// Revision of the policy entry layout built here.
pub const VARIABLE_POLICY_ENTRY_REVISION: u32 = 0x0001_0000;

/// Policy type that locks the variable as soon as the policy is registered.
pub const VARIABLE_POLICY_TYPE_LOCK_NOW: u8 = 1;

/// Size of the fixed part of a policy entry.
pub const VARIABLE_POLICY_ENTRY_HEADER_SIZE: usize = 4 + 2 + 2 + 16 + 4 * 4 + 1 + 3;

/// Disables policy enforcement.
pub type DisableVariablePolicy = unsafe extern "efiapi" fn() -> efi::Status;

/// Reports whether policy enforcement is enabled.
pub type IsVariablePolicyEnabled = unsafe extern "efiapi" fn(state: *mut efi::Boolean) -> efi::Status;

/// Registers one policy entry.
pub type RegisterVariablePolicy = unsafe extern "efiapi" fn(policy_entry: *const c_void) -> efi::Status;

/// Copies every registered policy into a caller buffer.
pub type DumpVariablePolicy = unsafe extern "efiapi" fn(policy: *mut u8, size: *mut u32) -> efi::Status;

/// Prevents further policy changes.
pub type LockVariablePolicy = unsafe extern "efiapi" fn() -> efi::Status;

/// EDKII defined Variable Policy Protocol structure.
#[repr(C)]
pub struct EdkiiVariablePolicy {
    /// Protocol revision.
    pub revision: u64,
    /// Disables policy enforcement.
    pub disable_variable_policy: DisableVariablePolicy,
    /// Reports whether policy enforcement is enabled.
    pub is_variable_policy_enabled: IsVariablePolicyEnabled,
    /// Registers one policy entry.
    pub register_variable_policy: RegisterVariablePolicy,
    /// Copies every registered policy into a caller buffer.
    pub dump_variable_policy: DumpVariablePolicy,
    /// Prevents further policy changes.
    pub lock_variable_policy: LockVariablePolicy,
}

/// Builds a lock-now `VARIABLE_POLICY_ENTRY` for `name` in `namespace`.
pub fn lock_now_policy_entry(namespace: &efi::Guid, name: &str) -> Result<Vec<u8>, efi::Status> {
    let name: Vec<u8> = variable_name(name).iter().flat_map(|c| c.to_le_bytes()).collect();
    let size = VARIABLE_POLICY_ENTRY_HEADER_SIZE + name.len();
    let entry_size = u16::try_from(size).map_err(|_| efi::Status::INVALID_PARAMETER)?;

    let mut entry = alloc::vec![0u8; size];
    write_policy_entry(&mut entry, entry_size, namespace, &name).map_err(|_| efi::Status::BAD_BUFFER_SIZE)?;
    Ok(entry)
}

fn write_policy_entry(dest: &mut [u8], size: u16, namespace: &efi::Guid, name: &[u8]) -> Result<usize, scroll::Error> {
    let mut offset = 0;
    dest.gwrite_with(VARIABLE_POLICY_ENTRY_REVISION, &mut offset, LE)?;
    dest.gwrite_with(size, &mut offset, LE)?;
    // OffsetToName: lock-now policies carry no policy data, so the name follows the header.
    dest.gwrite_with(VARIABLE_POLICY_ENTRY_HEADER_SIZE as u16, &mut offset, LE)?;
    dest.gwrite_with(&namespace.as_bytes()[..], &mut offset, ())?;
    dest.gwrite_with(0u32, &mut offset, LE)?; // MinSize
    dest.gwrite_with(u32::MAX, &mut offset, LE)?; // MaxSize
    dest.gwrite_with(0u32, &mut offset, LE)?; // AttributesMustHave
    dest.gwrite_with(0u32, &mut offset, LE)?; // AttributesCantHave
    dest.gwrite_with(VARIABLE_POLICY_TYPE_LOCK_NOW, &mut offset, LE)?;
    dest.gwrite_with(&[0u8; 3][..], &mut offset, ())?;
    dest.gwrite_with(name, &mut offset, ())?;
    Ok(offset)
}

/// A [`VariableLock`] that registers lock-now policies with the variable policy protocol.
pub struct VariablePolicyLock<'a> {
    protocol: &'a EdkiiVariablePolicy,
    namespace: efi::Guid,
}

impl<'a> VariablePolicyLock<'a> {
    /// Creates a lock service for keys in `namespace`.
    pub fn new(protocol: &'a EdkiiVariablePolicy, namespace: efi::Guid) -> Self {
        Self { protocol, namespace }
    }
}

impl VariableLock for VariablePolicyLock<'_> {
    fn lock_variable(&self, name: &str) -> Result<(), efi::Status> {
        let entry = lock_now_policy_entry(&self.namespace, name)?;

        // The protocol reads u32 fields from the entry, so hand it a 4-byte aligned copy.
        let aligned: Vec<u32> = entry
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect();

        // SAFETY: the entry is fully initialized, sized as declared in its header and outlives the call.
        let status = unsafe { (self.protocol.register_variable_policy)(aligned.as_ptr() as *const c_void) };
        if status.is_error() {
            Err(status)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::COREBOOT_NV_DATA_GUID;

    unsafe extern "efiapi" fn mock_disable() -> efi::Status {
        efi::Status::UNSUPPORTED
    }

    unsafe extern "efiapi" fn mock_is_enabled(_state: *mut efi::Boolean) -> efi::Status {
        efi::Status::UNSUPPORTED
    }

    unsafe extern "efiapi" fn mock_dump(_policy: *mut u8, _size: *mut u32) -> efi::Status {
        efi::Status::UNSUPPORTED
    }

    unsafe extern "efiapi" fn mock_register_accept(policy_entry: *const c_void) -> efi::Status {
        let entry = policy_entry as *const u8;
        let size = u16::from_le_bytes([*entry.add(4), *entry.add(5)]) as usize;
        let bytes = core::slice::from_raw_parts(entry, size);

        assert_eq!(&bytes[0..4], &VARIABLE_POLICY_ENTRY_REVISION.to_le_bytes());
        assert_eq!(&bytes[8..24], &COREBOOT_NV_DATA_GUID.as_bytes()[..]);
        assert_eq!(bytes[40], VARIABLE_POLICY_TYPE_LOCK_NOW);
        assert_eq!(&bytes[44..], &[b'k', 0, b'1', 0, 0, 0]);
        efi::Status::SUCCESS
    }

    unsafe extern "efiapi" fn mock_register_reject(_policy_entry: *const c_void) -> efi::Status {
        efi::Status::ALREADY_STARTED
    }

    fn protocol(register: RegisterVariablePolicy) -> EdkiiVariablePolicy {
        EdkiiVariablePolicy {
            revision: 0x10000,
            disable_variable_policy: mock_disable,
            is_variable_policy_enabled: mock_is_enabled,
            register_variable_policy: register,
            dump_variable_policy: mock_dump,
            lock_variable_policy: mock_disable,
        }
    }

    #[test]
    fn test_policy_entry_layout() {
        let entry = lock_now_policy_entry(&COREBOOT_NV_DATA_GUID, "ab").unwrap();

        assert_eq!(VARIABLE_POLICY_ENTRY_HEADER_SIZE, 44);
        assert_eq!(entry.len(), 50);
        assert_eq!(&entry[4..6], &50u16.to_le_bytes());
        assert_eq!(&entry[6..8], &44u16.to_le_bytes());
        assert_eq!(&entry[24..28], &0u32.to_le_bytes());
        assert_eq!(&entry[28..32], &u32::MAX.to_le_bytes());
        assert_eq!(&entry[32..40], &[0; 8]);
        assert_eq!(&entry[40..44], &[1, 0, 0, 0]);
        assert_eq!(&entry[44..], &[b'a', 0, b'b', 0, 0, 0]);
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let name = "x".repeat(0x8000);
        assert_eq!(lock_now_policy_entry(&COREBOOT_NV_DATA_GUID, &name), Err(efi::Status::INVALID_PARAMETER));
    }

    #[test]
    fn test_lock_variable_registers_policy() {
        let protocol = protocol(mock_register_accept);
        let lock = VariablePolicyLock::new(&protocol, COREBOOT_NV_DATA_GUID);
        assert_eq!(lock.lock_variable("k1"), Ok(()));
    }

    #[test]
    fn test_lock_variable_reports_failure() {
        let protocol = protocol(mock_register_reject);
        let lock = VariablePolicyLock::new(&protocol, COREBOOT_NV_DATA_GUID);
        assert_eq!(lock.lock_variable("k1"), Err(efi::Status::ALREADY_STARTED));
    }
}
