//! Error types and conversions for the CFR setup menu crate.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use core::fmt::{self, Display};

use r_efi::efi;

/// A specialized [`Result`](core::result::Result) type for CFR operations.
pub type Result<T> = core::result::Result<T, CfrError>;

/// Error definitions for CFR decoding, menu compilation and configuration exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfrError {
    /// A required field was missing, a record declared an impossible size, or the consumed length of a record did
    /// not line up with its declared size.
    MalformedRecord {
        /// Offset of the offending record within the buffer being decoded.
        offset: usize,
        /// Tag found at that offset.
        tag: u32,
        /// Short description of what was wrong.
        reason: &'static str,
    },
    /// A header or a declared length would read past the end of the buffer.
    TruncatedBuffer {
        /// Offset at which the read was attempted.
        offset: usize,
        /// Number of bytes that were left at that offset.
        available: usize,
    },
    /// A structurally valid record carried a tag that is not handled here. Recoverable by skipping `size` bytes.
    UnknownTag {
        /// Offset of the record.
        offset: usize,
        /// Unrecognized tag.
        tag: u32,
        /// Declared size of the record.
        size: u32,
    },
    /// An option's object id maps past the last usable question id. Recoverable by skipping the option.
    QuestionIdOutOfRange {
        /// Offset of the option record.
        offset: usize,
        /// Object id of the option.
        object_id: u64,
    },
    /// The settings key named by a request does not exist in the settings store.
    KeyNotFound,
    /// The settings store refused a write because the key is locked.
    StoreWriteRejected,
    /// A lock policy could not be registered for a read-only key.
    LockRegistrationFailed(efi::Status),
    /// A configuration request did not contain a decodable key name or value field.
    InvalidRequest,
    /// Any other settings store failure.
    Store(efi::Status),
}

impl CfrError {
    /// Returns true if the error only affects the record it was raised for.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CfrError::UnknownTag { .. } | CfrError::QuestionIdOutOfRange { .. })
    }
}

impl Display for CfrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfrError::MalformedRecord { offset, tag, reason } => {
                write!(f, "Malformed CFR record {tag:#x} at offset {offset:#x}: {reason}")
            }
            CfrError::TruncatedBuffer { offset, available } => {
                write!(f, "CFR buffer truncated at offset {offset:#x} ({available:#x} bytes left)")
            }
            CfrError::UnknownTag { offset, tag, size } => {
                write!(f, "Unexpected CFR entry {tag:#x} (size {size:#x}) at offset {offset:#x}")
            }
            CfrError::QuestionIdOutOfRange { offset, object_id } => {
                write!(f, "Object id {object_id:#x} of the option at offset {offset:#x} is out of the question id range")
            }
            CfrError::KeyNotFound => write!(f, "Settings key not found"),
            CfrError::StoreWriteRejected => write!(f, "Settings key is write protected"),
            CfrError::LockRegistrationFailed(status) => write!(f, "Failed to lock settings key: {status:?}"),
            CfrError::InvalidRequest => write!(f, "Configuration request could not be parsed"),
            CfrError::Store(status) => write!(f, "Settings store error: {status:?}"),
        }
    }
}

impl core::error::Error for CfrError {}

impl From<CfrError> for efi::Status {
    fn from(value: CfrError) -> Self {
        match value {
            CfrError::MalformedRecord { .. } | CfrError::TruncatedBuffer { .. } => efi::Status::VOLUME_CORRUPTED,
            CfrError::UnknownTag { .. } => efi::Status::UNSUPPORTED,
            CfrError::QuestionIdOutOfRange { .. } => efi::Status::OUT_OF_RESOURCES,
            CfrError::KeyNotFound => efi::Status::NOT_FOUND,
            CfrError::StoreWriteRejected => efi::Status::WRITE_PROTECTED,
            CfrError::InvalidRequest => efi::Status::INVALID_PARAMETER,
            CfrError::LockRegistrationFailed(status) | CfrError::Store(status) => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::format;

    #[test]
    fn test_convert_error_to_status() {
        let truncated = CfrError::TruncatedBuffer { offset: 0x10, available: 2 };
        assert_eq!(efi::Status::from(truncated), efi::Status::VOLUME_CORRUPTED);
        assert_eq!(efi::Status::from(CfrError::KeyNotFound), efi::Status::NOT_FOUND);
        assert_eq!(efi::Status::from(CfrError::InvalidRequest), efi::Status::INVALID_PARAMETER);
        assert_eq!(efi::Status::from(CfrError::Store(efi::Status::DEVICE_ERROR)), efi::Status::DEVICE_ERROR);
    }

    #[test]
    fn test_record_local_errors_are_recoverable() {
        assert!(CfrError::UnknownTag { offset: 0, tag: 0x200, size: 8 }.is_recoverable());
        assert!(CfrError::QuestionIdOutOfRange { offset: 0x40, object_id: 0xe000 }.is_recoverable());
        assert!(!CfrError::MalformedRecord { offset: 0, tag: 0x101, reason: "x" }.is_recoverable());
        assert!(!CfrError::KeyNotFound.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = CfrError::UnknownTag { offset: 0x20, tag: 0x1ff, size: 0xc };
        assert_eq!(format!("{err}"), "Unexpected CFR entry 0x1ff (size 0xc) at offset 0x20");
    }
}
