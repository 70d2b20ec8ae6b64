//! Settings store over the UEFI variable runtime services.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{vec, vec::Vec};
use core::{ffi::c_void, iter, ptr};

use r_efi::efi;

use crate::storage::{SettingsStore, StoredVariable};

/// Converts a key to the NUL terminated UCS-2 form UEFI variable names use.
pub fn variable_name(name: &str) -> Vec<u16> {
    name.encode_utf16().chain(iter::once(0)).collect()
}

/// A [`SettingsStore`] keeping every key as a UEFI variable in one namespace.
pub struct RuntimeVariableStore<'a> {
    runtime_services: &'a efi::RuntimeServices,
    namespace: efi::Guid,
}

impl<'a> RuntimeVariableStore<'a> {
    /// Creates a store over `runtime_services` using `namespace` as the vendor GUID of every key.
    pub fn new(runtime_services: &'a efi::RuntimeServices, namespace: efi::Guid) -> Self {
        Self { runtime_services, namespace }
    }

    fn get_variable_raw(
        &self,
        name: &mut [u16],
        attributes: &mut u32,
        data_size: &mut usize,
        data: *mut c_void,
    ) -> efi::Status {
        let get_variable = self.runtime_services.get_variable;
        if get_variable as usize == 0 {
            debug_assert!(false, "GetVariable has not initialized in the Runtime Services Table.");
            return efi::Status::NOT_FOUND;
        }
        let mut namespace = self.namespace;
        get_variable(name.as_mut_ptr(), ptr::addr_of_mut!(namespace), attributes, data_size, data)
    }
}

impl SettingsStore for RuntimeVariableStore<'_> {
    fn get_variable(&self, name: &str) -> Result<StoredVariable, efi::Status> {
        let mut name = variable_name(name);
        let mut attributes = 0u32;

        // Probe the size first, then read into a buffer of that size.
        let mut data_size = 0usize;
        let status = self.get_variable_raw(&mut name, &mut attributes, &mut data_size, ptr::null_mut());
        if status == efi::Status::SUCCESS {
            return Ok(StoredVariable { data: Vec::new(), attributes });
        }
        if status != efi::Status::BUFFER_TOO_SMALL {
            return Err(status);
        }

        let mut data = vec![0u8; data_size];
        let status =
            self.get_variable_raw(&mut name, &mut attributes, &mut data_size, data.as_mut_ptr() as *mut c_void);
        if status.is_error() {
            return Err(status);
        }
        data.truncate(data_size);

        Ok(StoredVariable { data, attributes })
    }

    fn set_variable(&self, name: &str, data: &[u8], attributes: u32) -> Result<(), efi::Status> {
        let set_variable = self.runtime_services.set_variable;
        if set_variable as usize == 0 {
            debug_assert!(false, "SetVariable has not initialized in the Runtime Services Table.");
            return Err(efi::Status::NOT_FOUND);
        }

        let mut name = variable_name(name);
        let mut namespace = self.namespace;
        let status = set_variable(
            name.as_mut_ptr(),
            ptr::addr_of_mut!(namespace),
            attributes,
            data.len(),
            data.as_ptr() as *mut c_void,
        );

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
    use core::mem;

    macro_rules! runtime_services {
        ($($efi_services:ident = $efi_service_fn:ident),*) => {{
            unsafe {
                #[allow(unused_mut)]
                let mut rs = mem::MaybeUninit::<efi::RuntimeServices>::zeroed();
                $(
                rs.assume_init_mut().$efi_services = $efi_service_fn;
                )*
                rs.assume_init()
            }
        }};
    }

    const FAST_BOOT_VALUE: [u8; 4] = [1, 0, 0, 0];
    const FAST_BOOT_ATTRIBUTES: u32 = 0x3;

    unsafe fn name_matches(name: *const u16, expected: &str) -> bool {
        let expected = variable_name(expected);
        expected.iter().enumerate().all(|(i, &c)| *name.add(i) == c)
    }

    /// Mocks the GetVariable() runtime service
    ///
    /// Knows a single variable, `fast_boot`, in the coreboot NV data namespace.
    extern "efiapi" fn mock_efi_get_variable(
        name: *mut u16,
        namespace: *mut efi::Guid,
        attributes: *mut u32,
        data_size: *mut usize,
        data: *mut c_void,
    ) -> efi::Status {
        unsafe {
            assert_eq!(*namespace, COREBOOT_NV_DATA_GUID);
            if !name_matches(name, "fast_boot") {
                return efi::Status::NOT_FOUND;
            }

            *attributes = FAST_BOOT_ATTRIBUTES;
            if *data_size < FAST_BOOT_VALUE.len() {
                *data_size = FAST_BOOT_VALUE.len();
                return efi::Status::BUFFER_TOO_SMALL;
            }

            *data_size = FAST_BOOT_VALUE.len();
            ptr::copy_nonoverlapping(FAST_BOOT_VALUE.as_ptr(), data as *mut u8, FAST_BOOT_VALUE.len());
        }

        efi::Status::SUCCESS
    }

    /// Mocks the SetVariable() runtime service
    ///
    /// Accepts `hostname` with a UCS-2 "A" and reports every other name as write protected.
    extern "efiapi" fn mock_efi_set_variable(
        name: *mut u16,
        namespace: *mut efi::Guid,
        attributes: u32,
        data_size: usize,
        data: *mut c_void,
    ) -> efi::Status {
        unsafe {
            assert_eq!(*namespace, COREBOOT_NV_DATA_GUID);
            if !name_matches(name, "hostname") {
                return efi::Status::WRITE_PROTECTED;
            }

            assert_eq!(attributes, 0x7);
            assert_eq!(data_size, 4);
            assert_eq!(core::slice::from_raw_parts(data as *const u8, data_size), &[0x41, 0, 0, 0]);
        }

        efi::Status::SUCCESS
    }

    #[test]
    fn test_variable_name_is_terminated() {
        assert_eq!(variable_name("ab"), [0x61, 0x62, 0]);
        assert_eq!(variable_name(""), [0]);
    }

    #[test]
    fn test_get_variable_probes_then_reads() {
        let rs = runtime_services!(get_variable = mock_efi_get_variable);
        let store = RuntimeVariableStore::new(&rs, COREBOOT_NV_DATA_GUID);

        let variable = store.get_variable("fast_boot").unwrap();
        assert_eq!(variable.data, FAST_BOOT_VALUE);
        assert_eq!(variable.attributes, FAST_BOOT_ATTRIBUTES);
    }

    #[test]
    fn test_get_variable_not_found() {
        let rs = runtime_services!(get_variable = mock_efi_get_variable);
        let store = RuntimeVariableStore::new(&rs, COREBOOT_NV_DATA_GUID);

        assert_eq!(store.get_variable("missing"), Err(efi::Status::NOT_FOUND));
    }

    #[test]
    fn test_set_variable() {
        let rs = runtime_services!(set_variable = mock_efi_set_variable);
        let store = RuntimeVariableStore::new(&rs, COREBOOT_NV_DATA_GUID);

        assert_eq!(store.set_variable("hostname", &[0x41, 0, 0, 0], 0x7), Ok(()));
        assert_eq!(store.set_variable("locked", &[0], 0x3), Err(efi::Status::WRITE_PROTECTED));
    }
}
