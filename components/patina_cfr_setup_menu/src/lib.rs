//! ## CFR Background
//!
//! CFR (coreboot Form Representation) is a compact, binary description of the options a boot loader wants to expose
//! in the firmware setup menu. The boot loader hands over one blob per top-level form. Each blob is a tree of
//! little-endian, packed, tag-length records: forms contain options and nested forms, options carry their settings
//! key, display text, help text and default value as variable-length string records, and enumerations carry one
//! record per selectable value.
//!
//! This crate decodes those trees and turns every leaf option into a question of the setup form. Each question is
//! backed by a settings key of its own, created with the option's default the first time the menu is built and
//! locked when the option is read-only. The form browser reads and writes those keys through
//! [`config_access::ConfigAccess`].
//!
//! ## Examples and Usage
//!
//! ```rust
//! use patina_cfr_setup_menu::{
//!     cfr::{tag, writer::RecordBuilder, OptionFlags, OptionKind},
//!     component::{CfrSetupMenu, FormPublisher},
//!     config::SetupMenuConfig,
//!     config_access::routing::BlockConfigCodec,
//!     error::Result,
//!     storage::memory::MemoryVariableStore,
//!     ui::MenuElement,
//! };
//! use r_efi::efi;
//!
//! /// Publisher that only reports what it was given.
//! struct LogPublisher;
//!
//! impl FormPublisher for LogPublisher {
//!     fn update_form(&self, _formset_guid: &efi::Guid, form_id: u16, elements: &[MenuElement]) -> Result<()> {
//!         println!("form {form_id:#x}: {} elements", elements.len());
//!         Ok(())
//!     }
//! }
//!
//! let fast_boot = RecordBuilder::option(OptionKind::Bool, 1, OptionFlags::empty())
//!     .default_value(1)
//!     .text(tag::VARCHAR_OPT_NAME, "fast_boot")
//!     .text(tag::VARCHAR_UI_NAME, "Fast Boot")
//!     .build();
//! let form = RecordBuilder::form(0, OptionFlags::empty(), "Boot").child(&fast_boot).build();
//!
//! let store = MemoryVariableStore::new();
//! let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, Some(&store), &LogPublisher);
//! menu.publish([&form[..]]).unwrap();
//! assert_eq!(store.value("fast_boot").unwrap(), [1, 0, 0, 0]);
//!
//! let codec = BlockConfigCodec;
//! let access = menu.config_access(&codec);
//! access.route_config("GUID=00&NAME=0066006100730074005f0062006f006f0074&PATH=00&OFFSET=0&WIDTH=4&VALUE=0").unwrap();
//! assert_eq!(store.value("fast_boot").unwrap(), [0, 0, 0, 0]);
//! ```
//!
//! ## Logging
//!
//! Every module logs using the `cfr` log target.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
#![cfg_attr(all(not(feature = "std"), not(test), not(feature = "mockall")), no_std)]

extern crate alloc;

pub mod cfr;
pub mod compiler;
pub mod component;
pub mod config;
pub mod config_access;
pub mod defaults;
pub mod error;
pub mod storage;
pub mod ui;
