//! Typed views over CFR records.
//!
//! Every view borrows from the buffer it was decoded from; nothing is copied except the small fixed heads.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use scroll::Pread;

use crate::{
    cfr::{
        cursor::{RawRecord, RecordCursor},
        align4, tag, OptionFlags, OptionKind, VARBINARY_HEADER_SIZE,
    },
    error::{CfrError, Result},
};

/// Fixed head shared by every option record, as laid out on the wire.
#[derive(Debug, Clone, Copy, Pread)]
struct WireOptionHeader {
    tag: u32,
    size: u32,
    object_id: u64,
    dependency_id: u64,
    flags: u32,
}

/// Decoded head of an option record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionHeader {
    /// Kind of the option.
    pub kind: OptionKind,
    /// Declared size of the record.
    pub size: u32,
    /// Identifier of this option, unique within a blob.
    pub object_id: u64,
    /// Object id of the option that gates this one. Zero when there is none.
    pub dependency_id: u64,
    /// Option flags. Unknown bits are retained.
    pub flags: OptionFlags,
}

/// A length-prefixed byte string (`tag | size | data_length | data | padding`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarBinary<'a> {
    tag: u32,
    offset: usize,
    data: &'a [u8],
}

impl<'a> VarBinary<'a> {
    /// Decodes a VarBinary from a record already restricted to its declared size.
    ///
    /// `data_length` must fit inside the record, and the record may only add padding up to the next 4-byte boundary.
    pub fn from_record(record: RawRecord<'a>) -> Result<Self> {
        let mut body = record.body();
        let data_length = body.read::<u32>()? as usize;
        let data = body.take(data_length)?;
        if record.size() != align4(VARBINARY_HEADER_SIZE + data_length) {
            return Err(record.malformed("size does not match the data length"));
        }
        Ok(Self { tag: record.tag(), offset: record.offset(), data })
    }

    /// Tag the value was stored under.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Offset of the record in the top-level buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Raw payload, `data_length` bytes long. Strings include their NUL terminator.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The declared payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The payload as text, cut at the first NUL.
    pub fn as_str(&self) -> Result<&'a str> {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        core::str::from_utf8(&self.data[..end]).map_err(|_| CfrError::MalformedRecord {
            offset: self.offset,
            tag: self.tag,
            reason: "text is not valid UTF-8",
        })
    }
}

/// Values of the dependency option under which an option is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyValues<'a>(VarBinary<'a>);

impl<'a> DependencyValues<'a> {
    /// Iterates the little-endian `u32` values. A trailing partial value is ignored.
    pub fn values(&self) -> impl Iterator<Item = u32> + 'a {
        self.0.data().chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }

    /// The underlying VarBinary.
    pub fn raw(&self) -> VarBinary<'a> {
        self.0
    }
}

/// One value/label pair of an enumeration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue<'a> {
    /// Value stored when this choice is selected.
    pub value: u32,
    /// Display label.
    pub label: VarBinary<'a>,
}

impl<'a> EnumValue<'a> {
    fn from_record(record: RawRecord<'a>) -> Result<Self> {
        let mut body = record.body();
        let value = body.read::<u32>()?;
        let label = body.expect_var_binary(tag::VARCHAR_UI_NAME, "enum value has no label")?;
        body.expect_end("enum value size does not match its fields")?;
        Ok(Self { value, label })
    }
}

/// A form record. Its children are not decoded here.
#[derive(Debug, Clone)]
pub struct FormOption<'a> {
    /// Fixed head.
    pub header: OptionHeader,
    /// Form title.
    pub title: VarBinary<'a>,
    /// Optional dependency values.
    pub dependency_values: Option<DependencyValues<'a>>,
    fields_len: usize,
    record: RawRecord<'a>,
}

impl<'a> FormOption<'a> {
    /// Number of bytes taken by the head, the title and the dependency values. Children start here.
    pub fn fields_len(&self) -> usize {
        self.fields_len
    }

    /// A cursor over the child records of this form.
    pub fn children(&self) -> RecordCursor<'a> {
        let mut cursor = self.record.cursor();
        // fields_len was produced by a cursor over the same record, so it is in bounds.
        let _ = cursor.advance(self.fields_len);
        cursor
    }
}

/// An enumeration, number or boolean option.
#[derive(Debug, Clone)]
pub struct NumericOption<'a> {
    /// Fixed head.
    pub header: OptionHeader,
    /// Default value.
    pub default_value: u32,
    /// Settings key.
    pub key: VarBinary<'a>,
    /// Display text.
    pub title: VarBinary<'a>,
    /// Optional help text.
    pub help: Option<VarBinary<'a>>,
    /// Optional dependency values.
    pub dependency_values: Option<DependencyValues<'a>>,
    /// Choices, only ever populated for enumerations.
    pub enum_values: Vec<EnumValue<'a>>,
}

/// A string option.
#[derive(Debug, Clone)]
pub struct StringOption<'a> {
    /// Fixed head.
    pub header: OptionHeader,
    /// Default text, including its terminator.
    pub default_value: VarBinary<'a>,
    /// Settings key.
    pub key: VarBinary<'a>,
    /// Display text.
    pub title: VarBinary<'a>,
    /// Optional help text.
    pub help: Option<VarBinary<'a>>,
    /// Optional dependency values.
    pub dependency_values: Option<DependencyValues<'a>>,
}

/// A comment: static text with no setting behind it.
#[derive(Debug, Clone)]
pub struct CommentOption<'a> {
    /// Fixed head.
    pub header: OptionHeader,
    /// Display text.
    pub title: VarBinary<'a>,
    /// Optional help text.
    pub help: Option<VarBinary<'a>>,
    /// Optional dependency values.
    pub dependency_values: Option<DependencyValues<'a>>,
}

/// A decoded option record.
#[derive(Debug, Clone)]
pub enum CfrRecord<'a> {
    /// [`tag::OPTION_FORM`]
    Form(FormOption<'a>),
    /// [`tag::OPTION_ENUM`]
    Enum(NumericOption<'a>),
    /// [`tag::OPTION_NUMBER`]
    Number(NumericOption<'a>),
    /// [`tag::OPTION_BOOL`]
    Bool(NumericOption<'a>),
    /// [`tag::OPTION_VARCHAR`]
    String(StringOption<'a>),
    /// [`tag::OPTION_COMMENT`]
    Comment(CommentOption<'a>),
}

impl<'a> CfrRecord<'a> {
    /// Decodes the option record at the start of `buffer`.
    pub fn from_bytes(buffer: &'a [u8]) -> Result<Self> {
        let mut cursor = RecordCursor::new(buffer);
        match cursor.next_record()? {
            Some(record) => Self::parse(record),
            None => Err(CfrError::TruncatedBuffer { offset: 0, available: 0 }),
        }
    }

    /// Decodes a validated record.
    ///
    /// Forms stop after their own fields. Every other kind must consume exactly its declared size.
    pub fn parse(record: RawRecord<'a>) -> Result<Self> {
        let Some(kind) = OptionKind::from_tag(record.tag()) else {
            return Err(CfrError::UnknownTag { offset: record.offset(), tag: record.tag(), size: record.size() as u32 });
        };
        if record.size() < kind.header_size() {
            return Err(record.malformed("record is smaller than its fixed head"));
        }

        let mut cursor = record.cursor();
        let wire: WireOptionHeader = cursor.read()?;
        let header = OptionHeader {
            kind,
            size: wire.size,
            object_id: wire.object_id,
            dependency_id: wire.dependency_id,
            flags: OptionFlags::from_bits_retain(wire.flags),
        };

        let parsed = match kind {
            OptionKind::Form => {
                let title = cursor.expect_var_binary(tag::VARCHAR_UI_NAME, "form has no title")?;
                let dependency_values = read_dependency_values(&mut cursor)?;
                return Ok(CfrRecord::Form(FormOption {
                    header,
                    title,
                    dependency_values,
                    fields_len: cursor.position(),
                    record,
                }));
            }
            OptionKind::Enum | OptionKind::Number | OptionKind::Bool => {
                let default_value = cursor.read::<u32>()?;
                let key = cursor.expect_var_binary(tag::VARCHAR_OPT_NAME, "option has no name")?;
                let title = cursor.expect_var_binary(tag::VARCHAR_UI_NAME, "option has no display text")?;
                let help = cursor.read_var_binary(tag::VARCHAR_UI_HELPTEXT)?;
                let dependency_values = read_dependency_values(&mut cursor)?;
                let mut enum_values = Vec::new();
                if kind == OptionKind::Enum {
                    while !cursor.is_empty() {
                        match cursor.read_record(tag::ENUM_VALUE)? {
                            Some(value) => enum_values.push(EnumValue::from_record(value)?),
                            None => return Err(record.malformed("expected an enum value")),
                        }
                    }
                }
                let option = NumericOption { header, default_value, key, title, help, dependency_values, enum_values };
                match kind {
                    OptionKind::Enum => CfrRecord::Enum(option),
                    OptionKind::Number => CfrRecord::Number(option),
                    _ => CfrRecord::Bool(option),
                }
            }
            OptionKind::String => {
                let default_value = cursor.expect_var_binary(tag::VARCHAR_DEF_VALUE, "string has no default value")?;
                let key = cursor.expect_var_binary(tag::VARCHAR_OPT_NAME, "option has no name")?;
                let title = cursor.expect_var_binary(tag::VARCHAR_UI_NAME, "option has no display text")?;
                let help = cursor.read_var_binary(tag::VARCHAR_UI_HELPTEXT)?;
                let dependency_values = read_dependency_values(&mut cursor)?;
                CfrRecord::String(StringOption { header, default_value, key, title, help, dependency_values })
            }
            OptionKind::Comment => {
                let title = cursor.expect_var_binary(tag::VARCHAR_UI_NAME, "comment has no display text")?;
                let help = cursor.read_var_binary(tag::VARCHAR_UI_HELPTEXT)?;
                let dependency_values = read_dependency_values(&mut cursor)?;
                CfrRecord::Comment(CommentOption { header, title, help, dependency_values })
            }
        };

        cursor.expect_end("consumed length does not match the declared size")?;
        Ok(parsed)
    }

    /// Fixed head of the record.
    pub fn header(&self) -> &OptionHeader {
        match self {
            CfrRecord::Form(form) => &form.header,
            CfrRecord::Enum(option) | CfrRecord::Number(option) | CfrRecord::Bool(option) => &option.header,
            CfrRecord::String(option) => &option.header,
            CfrRecord::Comment(option) => &option.header,
        }
    }

    /// Display text of the record.
    pub fn title(&self) -> VarBinary<'a> {
        match self {
            CfrRecord::Form(form) => form.title,
            CfrRecord::Enum(option) | CfrRecord::Number(option) | CfrRecord::Bool(option) => option.title,
            CfrRecord::String(option) => option.title,
            CfrRecord::Comment(option) => option.title,
        }
    }

    /// Settings key, for kinds that have one.
    pub fn key(&self) -> Option<VarBinary<'a>> {
        match self {
            CfrRecord::Enum(option) | CfrRecord::Number(option) | CfrRecord::Bool(option) => Some(option.key),
            CfrRecord::String(option) => Some(option.key),
            CfrRecord::Form(_) | CfrRecord::Comment(_) => None,
        }
    }
}

fn read_dependency_values<'a>(cursor: &mut RecordCursor<'a>) -> Result<Option<DependencyValues<'a>>> {
    Ok(cursor.read_var_binary(tag::VARBINARY_DEP_VALUES)?.map(DependencyValues))
}
