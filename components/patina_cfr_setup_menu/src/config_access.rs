//! Configuration exchange between the form browser and the settings store.
//!
//! Requests and responses use the HII config string format:
//!
//! ```text
//! GUID=<hex>&NAME=<hex>&PATH=<hex>[&OFFSET=<hex>&WIDTH=<hex>[&VALUE=<hex>]]*
//! ```
//!
//! `NAME` selects the settings key. Every setup menu question has a variable store of its own, so one request always
//! maps to exactly one key. Conversion between the block of stored bytes and the `OFFSET/WIDTH/VALUE` part of the
//! string is delegated to a [`ConfigRouting`] implementation such as [`routing::BlockConfigCodec`].
//!
//! ## Logging
//!
//! Requests are logged at `debug` level using the `cfr` log target.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
pub mod routing;

use alloc::{string::String, vec::Vec};

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use r_efi::efi;

use crate::{
    error::{CfrError, Result},
    storage::SettingsStore,
};

/// Converts between stored bytes and config strings.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait ConfigRouting {
    /// Serializes the parts of `block` selected by `request` into a config response.
    fn block_to_config(&self, request: &str, block: &[u8]) -> core::result::Result<String, efi::Status>;

    /// Applies the values of `configuration` to `block`. The length of `block` never changes.
    fn config_to_block(&self, configuration: &str, block: &mut [u8]) -> core::result::Result<(), efi::Status>;
}

/// Decodes the settings key named by the `NAME` field of a config string.
///
/// The value is hex text of UCS-2 characters, each printed most significant byte first. It runs up to the next
/// `&` or to the end of the string.
pub fn parse_variable_name(config: &str) -> Result<String> {
    const NAME_FIELD: &str = "&NAME=";

    let start = config.find(NAME_FIELD).ok_or(CfrError::InvalidRequest)? + NAME_FIELD.len();
    let value = &config[start..];
    let value = value.split('&').next().unwrap_or(value);

    let bytes = hex::decode(value).map_err(|_| CfrError::InvalidRequest)?;
    if bytes.len() % 2 != 0 {
        return Err(CfrError::InvalidRequest);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    if units.is_empty() {
        return Err(CfrError::InvalidRequest);
    }

    char::decode_utf16(units).collect::<core::result::Result<String, _>>().map_err(|_| CfrError::InvalidRequest)
}

fn store_error(status: efi::Status) -> CfrError {
    if status == efi::Status::NOT_FOUND {
        CfrError::KeyNotFound
    } else {
        CfrError::Store(status)
    }
}

/// Serves config requests for setup menu questions out of a settings store.
pub struct ConfigAccess<'a> {
    store: &'a dyn SettingsStore,
    routing: &'a dyn ConfigRouting,
}

impl<'a> ConfigAccess<'a> {
    /// Creates a bridge over `store` using `routing` for value conversion.
    pub fn new(store: &'a dyn SettingsStore, routing: &'a dyn ConfigRouting) -> Self {
        Self { store, routing }
    }

    /// Returns the current value of the key named by `request`, serialized as a config response.
    pub fn extract_config(&self, request: &str) -> Result<String> {
        let key = parse_variable_name(request)?;
        log::debug!(target: "cfr", "Extract config for \"{key}\"");

        let variable = self.store.get_variable(&key).map_err(store_error)?;
        self.routing.block_to_config(request, &variable.data).map_err(|status| {
            log::warn!(target: "cfr", "Failed to serialize \"{key}\": {status:?}");
            CfrError::InvalidRequest
        })
    }

    /// Applies the values carried by `configuration` to the key it names.
    ///
    /// The new value is decoded over a copy of the current one, so its length and attributes are preserved. A key
    /// that rejects the write because it is locked is not an error: the value simply stays as it was.
    pub fn route_config(&self, configuration: &str) -> Result<()> {
        let key = parse_variable_name(configuration)?;
        log::debug!(target: "cfr", "Route config for \"{key}\"");

        let current = self.store.get_variable(&key).map_err(store_error)?;
        let mut block = current.data.clone();
        self.routing.config_to_block(configuration, &mut block).map_err(|status| {
            log::warn!(target: "cfr", "Failed to decode new value of \"{key}\": {status:?}");
            CfrError::InvalidRequest
        })?;

        match self.store.set_variable(&key, &block, current.attributes) {
            Ok(()) => Ok(()),
            Err(status) if status == efi::Status::WRITE_PROTECTED => {
                log::info!(target: "cfr", "\"{key}\" not updated: {}", CfrError::StoreWriteRejected);
                Ok(())
            }
            Err(status) => Err(CfrError::Store(status)),
        }
    }
}
