//! CFR (Configuration Form Representation) binary format.
//!
//! CFR records form a tree. Every record starts with a `tag` and a `size`, where `size` covers the record's own
//! fields plus all of its children. Variable-length members (names, help text, default strings, enumeration values)
//! are themselves records, so they cannot be described as fixed struct fields; they follow the fixed head in a
//! documented order and optional members are detected by their tag.
//!
//! ```text
//! Form       : head | UI_NAME | DEP_VALUES? | <option records>*
//! Enum       : head | default | OPT_NAME | UI_NAME | UI_HELPTEXT? | DEP_VALUES? | ENUM_VALUE*
//! Number/Bool: head | default | OPT_NAME | UI_NAME | UI_HELPTEXT? | DEP_VALUES?
//! Varchar    : head | DEF_VALUE | OPT_NAME | UI_NAME | UI_HELPTEXT? | DEP_VALUES?
//! Comment    : head | UI_NAME | UI_HELPTEXT? | DEP_VALUES?
//! ENUM_VALUE : tag | size | value | UI_NAME
//! VarBinary  : tag | size | data_length | data[data_length] | padding
//! ```
//!
//! All fields are little-endian and packed.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
pub mod cursor;
pub mod record;
pub mod writer;

use bitflags::bitflags;

pub use cursor::RecordCursor;
pub use record::{
    CfrRecord, CommentOption, DependencyValues, EnumValue, FormOption, NumericOption, OptionHeader, StringOption,
    VarBinary,
};

/// CFR record tags.
pub mod tag {
    /// Form, possibly nested inside another form.
    pub const OPTION_FORM: u32 = 0x0101;
    /// One value/label pair of an enumeration option.
    pub const ENUM_VALUE: u32 = 0x0102;
    /// Enumeration option.
    pub const OPTION_ENUM: u32 = 0x0103;
    /// Numeric option.
    pub const OPTION_NUMBER: u32 = 0x0104;
    /// Boolean option.
    pub const OPTION_BOOL: u32 = 0x0105;
    /// String option.
    pub const OPTION_VARCHAR: u32 = 0x0106;
    /// Settings key of an option.
    pub const VARCHAR_OPT_NAME: u32 = 0x0107;
    /// Display text.
    pub const VARCHAR_UI_NAME: u32 = 0x0108;
    /// Help text.
    pub const VARCHAR_UI_HELPTEXT: u32 = 0x0109;
    /// Default value of a string option.
    pub const VARCHAR_DEF_VALUE: u32 = 0x010a;
    /// Static text, never backed by a setting.
    pub const OPTION_COMMENT: u32 = 0x010b;
    /// Values of the dependency object that enable this option.
    pub const VARBINARY_DEP_VALUES: u32 = 0x010c;
}

/// Size of the `tag` + `size` pair every record starts with.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Size of the fixed part of a VarBinary record (`tag`, `size`, `data_length`).
pub const VARBINARY_HEADER_SIZE: usize = RECORD_HEADER_SIZE + 4;

/// Size of the fixed part of an EnumValue record (`tag`, `size`, `value`).
pub const ENUM_VALUE_HEADER_SIZE: usize = RECORD_HEADER_SIZE + 4;

/// Size of the fixed head shared by every option (`tag`, `size`, `object_id`, `dependency_id`, `flags`).
pub const OPTION_HEADER_SIZE: usize = RECORD_HEADER_SIZE + 8 + 8 + 4;

/// Size of the fixed head of enum, number and bool options (common head + `default_value`).
pub const NUMERIC_OPTION_HEADER_SIZE: usize = OPTION_HEADER_SIZE + 4;

bitflags! {
    /// Per-option flags (`enum cfr_option_flags`).
    ///
    /// Decoded with `from_bits_retain`, so bits from newer producers are carried through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OptionFlags: u32 {
        /// The setting can not be changed by the user.
        const READONLY = 1 << 0;
        /// The option is shown but disabled.
        const GRAYOUT = 1 << 1;
        /// The option is hidden.
        const SUPPRESS = 1 << 2;
        /// The setting does not survive a power cycle.
        const VOLATILE = 1 << 3;
        /// The setting is accessible after exit boot services.
        const RUNTIME = 1 << 4;
    }
}

/// Kind of an option record, derived from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// [`tag::OPTION_FORM`]
    Form,
    /// [`tag::OPTION_ENUM`]
    Enum,
    /// [`tag::OPTION_NUMBER`]
    Number,
    /// [`tag::OPTION_BOOL`]
    Bool,
    /// [`tag::OPTION_VARCHAR`]
    String,
    /// [`tag::OPTION_COMMENT`]
    Comment,
}

impl OptionKind {
    /// Maps an option tag to its kind. Returns `None` for auxiliary or unknown tags.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            tag::OPTION_FORM => Some(OptionKind::Form),
            tag::OPTION_ENUM => Some(OptionKind::Enum),
            tag::OPTION_NUMBER => Some(OptionKind::Number),
            tag::OPTION_BOOL => Some(OptionKind::Bool),
            tag::OPTION_VARCHAR => Some(OptionKind::String),
            tag::OPTION_COMMENT => Some(OptionKind::Comment),
            _ => None,
        }
    }

    /// The tag that encodes this kind.
    pub fn tag(&self) -> u32 {
        match self {
            OptionKind::Form => tag::OPTION_FORM,
            OptionKind::Enum => tag::OPTION_ENUM,
            OptionKind::Number => tag::OPTION_NUMBER,
            OptionKind::Bool => tag::OPTION_BOOL,
            OptionKind::String => tag::OPTION_VARCHAR,
            OptionKind::Comment => tag::OPTION_COMMENT,
        }
    }

    /// Size of the fixed head for this kind.
    pub fn header_size(&self) -> usize {
        match self {
            OptionKind::Enum | OptionKind::Number | OptionKind::Bool => NUMERIC_OPTION_HEADER_SIZE,
            OptionKind::Form | OptionKind::String | OptionKind::Comment => OPTION_HEADER_SIZE,
        }
    }
}

/// Rounds `value` up to the next multiple of 4, the alignment producers use for record sizes.
pub const fn align4(value: usize) -> usize {
    (value + 3) & !3
}
