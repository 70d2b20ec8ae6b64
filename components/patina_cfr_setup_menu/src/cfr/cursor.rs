//! Forward-only reader over a CFR byte buffer.
//!
//! CFR blobs come from the boot loader and are not trusted. Every length in a blob is checked against the bounds of
//! the slice the cursor was created over before any data is handed out, and every record handed out is a borrowed
//! view restricted to its own declared size. A cursor created over such a view can therefore never reach bytes that
//! belong to the parent or to a sibling record.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use scroll::{ctx::TryFromCtx, Endian, Pread, LE};

use crate::{
    cfr::{record::VarBinary, RECORD_HEADER_SIZE},
    error::{CfrError, Result},
};

/// The `tag` + `size` pair every CFR record starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pread)]
pub struct RecordHeader {
    /// Record type.
    pub tag: u32,
    /// Size of the record, including the header and all children.
    pub size: u32,
}

/// A record whose header has been validated against the enclosing buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    tag: u32,
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> RawRecord<'a> {
    /// The record tag.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Offset of the record relative to the start of the top-level buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Declared size of the record.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// All bytes of the record, header included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// A cursor over this record positioned at its first byte.
    pub fn cursor(&self) -> RecordCursor<'a> {
        RecordCursor { buffer: self.bytes, offset: 0, base: self.offset }
    }

    /// A cursor over this record positioned right after the `tag` + `size` header.
    pub fn body(&self) -> RecordCursor<'a> {
        RecordCursor { buffer: self.bytes, offset: RECORD_HEADER_SIZE, base: self.offset }
    }

    pub(crate) fn malformed(&self, reason: &'static str) -> CfrError {
        CfrError::MalformedRecord { offset: self.offset, tag: self.tag, reason }
    }
}

/// Position-tracking reader over a CFR buffer.
///
/// Optional fields are handled by asking for a record with a specific tag: if the next record carries a different
/// tag (or the cursor is at the end of its buffer) the field is reported as absent and the position is unchanged.
#[derive(Debug, Clone)]
pub struct RecordCursor<'a> {
    buffer: &'a [u8],
    offset: usize,
    base: usize,
}

impl<'a> RecordCursor<'a> {
    /// Creates a cursor at the start of `buffer`.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0, base: 0 }
    }

    /// Current position relative to the start of this cursor's buffer.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Current position relative to the start of the top-level buffer.
    pub fn absolute_position(&self) -> usize {
        self.base + self.offset
    }

    /// Number of bytes left in this cursor's buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    /// Returns true when every byte of the buffer has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn truncated(&self) -> CfrError {
        CfrError::TruncatedBuffer { offset: self.absolute_position(), available: self.remaining() }
    }

    /// Reads one little-endian value and advances past it.
    pub fn read<T>(&mut self) -> Result<T>
    where
        T: TryFromCtx<'a, Endian, Error = scroll::Error>,
    {
        let buffer: &'a [u8] = self.buffer;
        let mut offset = self.offset;
        let value = buffer.gread_with::<T>(&mut offset, LE).map_err(|_| self.truncated())?;
        self.offset = offset;
        Ok(value)
    }

    /// Hands out the next `length` bytes and advances past them.
    pub fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            return Err(self.truncated());
        }
        let bytes = &self.buffer[self.offset..self.offset + length];
        self.offset += length;
        Ok(bytes)
    }

    /// Skips `length` bytes.
    pub fn advance(&mut self, length: usize) -> Result<()> {
        self.take(length).map(|_| ())
    }

    /// Reads the header at the current position without advancing.
    ///
    /// Returns `Ok(None)` at the end of the buffer and `TruncatedBuffer` when fewer bytes than a header are left.
    pub fn peek_header(&self) -> Result<Option<RecordHeader>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.buffer.pread_with::<RecordHeader>(self.offset, LE).map(Some).map_err(|_| self.truncated())
    }

    fn checked_record(&self, header: RecordHeader) -> Result<RawRecord<'a>> {
        let size = header.size as usize;
        if size < RECORD_HEADER_SIZE {
            return Err(CfrError::MalformedRecord {
                offset: self.absolute_position(),
                tag: header.tag,
                reason: "record size is smaller than the record header",
            });
        }
        if size > self.remaining() {
            return Err(self.truncated());
        }
        Ok(RawRecord {
            tag: header.tag,
            offset: self.absolute_position(),
            bytes: &self.buffer[self.offset..self.offset + size],
        })
    }

    /// Returns the record at the current position, whatever its tag, without advancing.
    pub fn peek_record(&self) -> Result<Option<RawRecord<'a>>> {
        match self.peek_header()? {
            Some(header) => self.checked_record(header).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the record at the current position and advances past it.
    pub fn next_record(&mut self) -> Result<Option<RawRecord<'a>>> {
        let record = self.peek_record()?;
        if let Some(record) = record {
            self.offset += record.size();
        }
        Ok(record)
    }

    /// Returns the record at the current position if it carries `expected_tag`, advancing past it.
    ///
    /// A different tag, or the end of the buffer, yields `Ok(None)` without moving the cursor.
    pub fn read_record(&mut self, expected_tag: u32) -> Result<Option<RawRecord<'a>>> {
        match self.peek_header()? {
            Some(header) if header.tag == expected_tag => {
                let record = self.checked_record(header)?;
                self.offset += record.size();
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    /// Reads an optional VarBinary field.
    pub fn read_var_binary(&mut self, expected_tag: u32) -> Result<Option<VarBinary<'a>>> {
        match self.read_record(expected_tag)? {
            Some(record) => VarBinary::from_record(record).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a VarBinary field that must be present.
    pub fn expect_var_binary(&mut self, expected_tag: u32, reason: &'static str) -> Result<VarBinary<'a>> {
        match self.read_var_binary(expected_tag)? {
            Some(var_binary) => Ok(var_binary),
            None => Err(self.malformed(reason)),
        }
    }

    /// Fails unless every byte of the buffer has been consumed.
    pub fn expect_end(&self, reason: &'static str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.malformed(reason))
        }
    }

    fn malformed(&self, reason: &'static str) -> CfrError {
        let tag = match self.peek_header() {
            Ok(Some(header)) => header.tag,
            _ => 0,
        };
        CfrError::MalformedRecord { offset: self.absolute_position(), tag, reason }
    }
}
