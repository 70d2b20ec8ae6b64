//! Composes well-formed CFR records.
//!
//! The builder appends fields in the order they are given and patches the record `size` when the record is built,
//! so nested records are produced by building the child first and appending its bytes to the parent. VarBinary
//! payloads are padded to a 4-byte boundary the way boot loader producers lay them out.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use crate::cfr::{align4, tag, OptionFlags, OptionKind, RECORD_HEADER_SIZE};

/// Offset of `dependency_id` within an option head.
const DEPENDENCY_ID_OFFSET: usize = RECORD_HEADER_SIZE + 8;

/// Builder for a single CFR record and its children.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    bytes: Vec<u8>,
}

impl RecordBuilder {
    /// Starts a record with the given tag and an empty payload.
    pub fn new(tag: u32) -> Self {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&tag.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        Self { bytes }
    }

    /// Starts an option record with its common head. The dependency id is zero until set.
    ///
    /// Numeric kinds still need their default value appended with [`RecordBuilder::default_value`].
    pub fn option(kind: OptionKind, object_id: u64, flags: OptionFlags) -> Self {
        Self::new(kind.tag()).u64(object_id).u64(0).u32(flags.bits())
    }

    /// Starts a form record with its title.
    pub fn form(object_id: u64, flags: OptionFlags, title: &str) -> Self {
        Self::option(OptionKind::Form, object_id, flags).text(tag::VARCHAR_UI_NAME, title)
    }

    /// Sets `dependency_id` of an option head.
    pub fn dependency_id(mut self, dependency_id: u64) -> Self {
        if let Some(field) = self.bytes.get_mut(DEPENDENCY_ID_OFFSET..DEPENDENCY_ID_OFFSET + 8) {
            field.copy_from_slice(&dependency_id.to_le_bytes());
        }
        self
    }

    /// Appends a `u32`.
    pub fn u32(mut self, value: u32) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends a `u64`.
    pub fn u64(mut self, value: u64) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends the `default_value` of an enum, number or bool option.
    pub fn default_value(self, value: u32) -> Self {
        self.u32(value)
    }

    /// Appends `data_length`, `data` and padding, turning this record into a VarBinary.
    pub fn var_binary_payload(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(data);
        self.bytes.resize(align4(self.bytes.len()), 0);
        self
    }

    /// Appends a VarBinary child record.
    pub fn var_binary(self, tag: u32, data: &[u8]) -> Self {
        let child = RecordBuilder::new(tag).var_binary_payload(data).build();
        self.raw(&child)
    }

    /// Appends a NUL terminated text child record.
    pub fn text(self, tag: u32, text: &str) -> Self {
        let mut data = Vec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        data.push(0);
        self.var_binary(tag, &data)
    }

    /// Appends a dependency-values child record.
    pub fn dependency_values(self, values: &[u32]) -> Self {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.var_binary(tag::VARBINARY_DEP_VALUES, &data)
    }

    /// Appends an enum value child record.
    pub fn enum_value(self, value: u32, label: &str) -> Self {
        let child = RecordBuilder::new(tag::ENUM_VALUE).u32(value).text(tag::VARCHAR_UI_NAME, label).build();
        self.raw(&child)
    }

    /// Appends a complete nested record.
    pub fn child(self, record: &[u8]) -> Self {
        self.raw(record)
    }

    /// Appends arbitrary bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Finishes the record, writing its total size into the header.
    pub fn build(mut self) -> Vec<u8> {
        let size = self.bytes.len() as u32;
        self.bytes[4..RECORD_HEADER_SIZE].copy_from_slice(&size.to_le_bytes());
        self.bytes
    }
}
