//! `OFFSET/WIDTH/VALUE` block codec.
//!
//! Implements the block part of HII config strings. Each block names a byte range of the stored value; `VALUE` is
//! that range read as a little-endian number and printed as hex, most significant byte first.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{format, string::String, vec::Vec};

use r_efi::efi;

use crate::config_access::ConfigRouting;

const OFFSET_FIELD: &str = "&OFFSET=";

/// One `OFFSET=..&WIDTH=..[&VALUE=..]` element of a config string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block<'a> {
    offset_text: &'a str,
    width_text: &'a str,
    offset: usize,
    width: usize,
    value: Option<&'a str>,
}

impl Block<'_> {
    fn range(&self, len: usize) -> Result<core::ops::Range<usize>, efi::Status> {
        let end = self.offset.checked_add(self.width).ok_or(efi::Status::INVALID_PARAMETER)?;
        if end > len {
            return Err(efi::Status::INVALID_PARAMETER);
        }
        Ok(self.offset..end)
    }
}

/// Splits a config string into its header (everything before the first block) and its blocks.
fn split_config(config: &str) -> Result<(&str, Vec<Block<'_>>), efi::Status> {
    let Some(start) = config.find(OFFSET_FIELD) else {
        return Ok((config, Vec::new()));
    };
    let header = &config[..start];

    let mut blocks = Vec::new();
    let mut fields = config[start + 1..].split('&').peekable();
    while let Some(field) = fields.next() {
        let offset_text = field.strip_prefix("OFFSET=").ok_or(efi::Status::INVALID_PARAMETER)?;
        let width_text =
            fields.next().and_then(|field| field.strip_prefix("WIDTH=")).ok_or(efi::Status::INVALID_PARAMETER)?;
        let value = if fields.peek().is_some_and(|field| field.starts_with("VALUE=")) {
            fields.next().and_then(|field| field.strip_prefix("VALUE="))
        } else {
            None
        };
        blocks.push(Block {
            offset_text,
            width_text,
            offset: parse_hex(offset_text)?,
            width: parse_hex(width_text)?,
            value,
        });
    }

    Ok((header, blocks))
}

fn parse_hex(text: &str) -> Result<usize, efi::Status> {
    usize::from_str_radix(text, 16).map_err(|_| efi::Status::INVALID_PARAMETER)
}

fn encode_value(bytes: &[u8]) -> String {
    let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
    hex::encode(reversed)
}

fn decode_value(text: &str, width: usize) -> Result<Vec<u8>, efi::Status> {
    let padded;
    let text = if text.len() % 2 == 0 {
        text
    } else {
        padded = format!("0{text}");
        padded.as_str()
    };
    let mut bytes = hex::decode(text).map_err(|_| efi::Status::INVALID_PARAMETER)?;
    bytes.reverse();

    // Leading zero digits may make the text longer than the block, anything else may not.
    if bytes.len() > width {
        if bytes[width..].iter().any(|&b| b != 0) {
            return Err(efi::Status::INVALID_PARAMETER);
        }
        bytes.truncate(width);
    }
    bytes.resize(width, 0);
    Ok(bytes)
}

/// [`ConfigRouting`] implementation for plain byte blocks.
///
/// A request without any `OFFSET` element selects the whole stored value.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockConfigCodec;

impl ConfigRouting for BlockConfigCodec {
    fn block_to_config(&self, request: &str, block: &[u8]) -> Result<String, efi::Status> {
        let (header, blocks) = split_config(request)?;

        let mut response = String::from(header);
        if blocks.is_empty() {
            response.push_str(&format!("&OFFSET=0&WIDTH={:04x}&VALUE={}", block.len(), encode_value(block)));
            return Ok(response);
        }

        for element in blocks {
            let range = element.range(block.len())?;
            response.push_str(&format!(
                "&OFFSET={}&WIDTH={}&VALUE={}",
                element.offset_text,
                element.width_text,
                encode_value(&block[range])
            ));
        }
        Ok(response)
    }

    fn config_to_block(&self, configuration: &str, block: &mut [u8]) -> Result<(), efi::Status> {
        let (_, blocks) = split_config(configuration)?;
        for element in blocks {
            let Some(value) = element.value else {
                return Err(efi::Status::INVALID_PARAMETER);
            };
            let range = element.range(block.len())?;
            block[range].copy_from_slice(&decode_value(value, element.width)?);
        }
        Ok(())
    }
}
