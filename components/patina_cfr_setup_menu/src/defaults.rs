//! Lookup of option defaults straight from CFR forms.
//!
//! Code that runs before the setup menu has created its settings keys can ask for the default of an option here.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

use crate::{
    cfr::{cursor::RecordCursor, CfrRecord},
    error::{CfrError, Result},
};

enum Lookup {
    Found(Vec<u8>),
    NoDefault,
    Missing,
}

/// Returns the default value of the option whose key is `option_name`.
///
/// When `form_name` is given only the top-level form with that title is searched. Numeric options yield their
/// default as 4 little-endian bytes, string options the raw default data including its terminator. Forms and
/// comments have no default: naming one yields [`CfrError::KeyNotFound`], as does an unknown name. Forms that fail
/// to decode are logged and skipped.
pub fn option_default_value<'b, I>(forms: I, form_name: Option<&str>, option_name: &str) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'b [u8]>,
{
    for (index, blob) in forms.into_iter().enumerate() {
        match search_form(blob, form_name, option_name) {
            Ok(Lookup::Found(value)) => return Ok(value),
            Ok(Lookup::NoDefault) => return Err(CfrError::KeyNotFound),
            Ok(Lookup::Missing) => {}
            Err(err) => log::warn!(target: "cfr", "Skipped form {index} while looking up \"{option_name}\": {err}"),
        }
    }
    Err(CfrError::KeyNotFound)
}

fn search_form(blob: &[u8], form_name: Option<&str>, option_name: &str) -> Result<Lookup> {
    let Some(record) = RecordCursor::new(blob).next_record()? else {
        return Ok(Lookup::Missing);
    };
    let CfrRecord::Form(form) = CfrRecord::parse(record)? else {
        return Err(record.malformed("top-level record is not a form"));
    };
    if form_name.is_some_and(|name| form.title.as_str() != Ok(name)) {
        return Ok(Lookup::Missing);
    }

    let mut children = form.children();
    while let Some(child) = children.peek_record()? {
        let step = match CfrRecord::parse(child) {
            Ok(CfrRecord::Form(nested)) => {
                if nested.title.as_str()? == option_name {
                    return Ok(Lookup::NoDefault);
                }
                nested.fields_len()
            }
            Ok(CfrRecord::Enum(option)) | Ok(CfrRecord::Number(option)) | Ok(CfrRecord::Bool(option)) => {
                if option.key.as_str()? == option_name {
                    return Ok(Lookup::Found(option.default_value.to_le_bytes().to_vec()));
                }
                child.size()
            }
            Ok(CfrRecord::String(option)) => {
                if option.key.as_str()? == option_name {
                    return Ok(Lookup::Found(option.default_value.data().to_vec()));
                }
                child.size()
            }
            Ok(CfrRecord::Comment(_)) => child.size(),
            Err(err) if err.is_recoverable() => child.size(),
            Err(err) => return Err(err),
        };
        children.advance(step)?;
    }

    Ok(Lookup::Missing)
}
