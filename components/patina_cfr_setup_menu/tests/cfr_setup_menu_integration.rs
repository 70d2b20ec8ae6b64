//! CFR Setup Menu Integration Tests
//!
//! Builds complete menus from CFR forms against the in-memory settings store and drives the configuration exchange
//! over the result. Set `RUST_LOG=cfr=trace` to see the component's log output.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent

use std::cell::Cell;

use patina_cfr_setup_menu::{
    cfr::{tag, writer::RecordBuilder, CfrRecord, OptionFlags, OptionKind},
    component::{CfrSetupMenu, FormPublisher},
    config::SetupMenuConfig,
    config_access::routing::BlockConfigCodec,
    defaults::option_default_value,
    error::{CfrError, Result},
    storage::{memory::MemoryVariableStore, SettingsStore, StoredVariable},
    ui::{ElementId, Guard, Heading, MenuElement},
};
use r_efi::efi;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct NullPublisher;

impl FormPublisher for NullPublisher {
    fn update_form(&self, _formset_guid: &efi::Guid, _form_id: u16, _elements: &[MenuElement]) -> Result<()> {
        Ok(())
    }
}

/// Counts writes reaching the wrapped store.
#[derive(Default)]
struct CountingStore {
    inner: MemoryVariableStore,
    writes: Cell<usize>,
}

impl SettingsStore for CountingStore {
    fn get_variable(&self, name: &str) -> core::result::Result<StoredVariable, efi::Status> {
        self.inner.get_variable(name)
    }

    fn set_variable(&self, name: &str, data: &[u8], attributes: u32) -> core::result::Result<(), efi::Status> {
        self.writes.set(self.writes.get() + 1);
        self.inner.set_variable(name, data, attributes)
    }
}

fn ucs2_hex(name: &str) -> String {
    name.encode_utf16().map(|unit| format!("{unit:04x}")).collect()
}

fn request(key: &str) -> String {
    format!("GUID=1d4caece5b33854684a0fc4a94eea085&NAME={}&PATH=0104", ucs2_hex(key))
}

/// A form with a comment, a boolean, a number, a read-only enumeration and a string, in that order.
fn boot_form() -> Vec<u8> {
    let comment = RecordBuilder::option(OptionKind::Comment, 1, OptionFlags::empty())
        .text(tag::VARCHAR_UI_NAME, "Boot options")
        .text(tag::VARCHAR_UI_HELPTEXT, "Changes apply on the next boot")
        .build();
    let fast_boot = RecordBuilder::option(OptionKind::Bool, 2, OptionFlags::empty())
        .default_value(1)
        .text(tag::VARCHAR_OPT_NAME, "fast_boot")
        .text(tag::VARCHAR_UI_NAME, "Fast Boot")
        .build();
    let timeout = RecordBuilder::option(OptionKind::Number, 3, OptionFlags::empty())
        .default_value(5)
        .text(tag::VARCHAR_OPT_NAME, "timeout")
        .text(tag::VARCHAR_UI_NAME, "Timeout")
        .build();
    let console = RecordBuilder::option(OptionKind::Enum, 4, OptionFlags::READONLY)
        .default_value(2)
        .text(tag::VARCHAR_OPT_NAME, "console")
        .text(tag::VARCHAR_UI_NAME, "Console")
        .enum_value(0, "Off")
        .enum_value(1, "Serial")
        .enum_value(2, "Graphics")
        .build();
    let hostname = RecordBuilder::option(OptionKind::String, 5, OptionFlags::empty())
        .text(tag::VARCHAR_DEF_VALUE, "node")
        .text(tag::VARCHAR_OPT_NAME, "hostname")
        .text(tag::VARCHAR_UI_NAME, "Host name")
        .build();

    RecordBuilder::form(0, OptionFlags::empty(), "Boot")
        .child(&comment)
        .child(&fast_boot)
        .child(&timeout)
        .child(&console)
        .child(&hostname)
        .build()
}

#[test]
fn test_document_order_is_preserved() {
    init_logging();
    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, Some(&store), &NullPublisher);

    let form = boot_form();
    let elements = menu.build([&form[..]]);

    let kinds: Vec<&str> = elements
        .iter()
        .filter_map(|element| match element.unguarded() {
            MenuElement::Text { .. } => Some("text"),
            MenuElement::CheckBox { .. } => Some("checkbox"),
            MenuElement::Numeric { .. } => Some("numeric"),
            MenuElement::OneOf { .. } => Some("oneof"),
            MenuElement::String { .. } => Some("string"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, ["text", "checkbox", "numeric", "oneof", "string"]);
    assert_eq!(elements[1], MenuElement::Subtitle { prompt: "Boot".into(), level: Heading::Form });
}

#[test]
fn test_enum_choices_in_document_order() {
    init_logging();
    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, Some(&store), &NullPublisher);

    let form = boot_form();
    let elements = menu.build([&form[..]]);

    let Some(MenuElement::OneOf { default, choices, .. }) =
        elements.iter().map(MenuElement::unguarded).find(|element| matches!(element, MenuElement::OneOf { .. }))
    else {
        panic!("expected a one-of element")
    };
    assert_eq!(*default, 2);
    let labels: Vec<(u32, &str)> = choices.iter().map(|choice| (choice.value, choice.label.as_str())).collect();
    assert_eq!(labels, [(0, "Off"), (1, "Serial"), (2, "Graphics")]);

    // The enum record ends exactly after its third value.
    let CfrRecord::Form(boot) = CfrRecord::from_bytes(&form).unwrap() else { panic!("expected a form") };
    let mut children = boot.children();
    let console = loop {
        let child = children.next_record().unwrap().expect("enum option not found");
        if let CfrRecord::Enum(option) = CfrRecord::parse(child).unwrap() {
            break option;
        }
    };
    let console_end = children.absolute_position();
    let last_label = console.enum_values[2].label;
    assert_eq!(last_label.offset() + 12 + last_label.len().next_multiple_of(4), console_end);
}

#[test]
fn test_defaults_are_materialized_once() {
    init_logging();
    let store = CountingStore::default();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, None, &NullPublisher);
    let form = boot_form();

    menu.build([&form[..]]);
    assert_eq!(store.writes.get(), 4);
    assert_eq!(store.inner.value("timeout").unwrap(), [5, 0, 0, 0]);

    store.set_variable("timeout", &[30, 0, 0, 0], efi::VARIABLE_BOOTSERVICE_ACCESS).unwrap();
    let first = menu.build([&form[..]]);
    let second = menu.build([&form[..]]);

    assert_eq!(store.writes.get(), 5);
    assert_eq!(store.inner.value("timeout").unwrap(), [30, 0, 0, 0]);
    assert_eq!(first, second);
}

#[test]
fn test_default_lookup_matches_created_keys() {
    init_logging();
    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, None, &NullPublisher);
    let form = boot_form();
    menu.build([&form[..]]);

    assert_eq!(option_default_value([&form[..]], Some("Boot"), "console").unwrap(), store.value("console").unwrap());
    assert_eq!(option_default_value([&form[..]], None, "hostname").unwrap(), b"node\0");
    assert_eq!(option_default_value([&form[..]], Some("Setup"), "console"), Err(CfrError::KeyNotFound));
}

#[test]
fn test_grayed_and_suppressed_option_is_wrapped_twice() {
    init_logging();
    let hidden = RecordBuilder::option(OptionKind::Bool, 1, OptionFlags::GRAYOUT | OptionFlags::SUPPRESS)
        .default_value(0)
        .text(tag::VARCHAR_OPT_NAME, "hidden")
        .text(tag::VARCHAR_UI_NAME, "Hidden")
        .build();
    let form = RecordBuilder::form(0, OptionFlags::GRAYOUT, "Main").child(&hidden).build();

    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, None, &NullPublisher);
    let elements = menu.build([&form[..]]);

    assert_eq!(elements[1].guards(), [Guard::GrayOutIf]);
    assert_eq!(elements[2], MenuElement::VarStore { id: ElementId(0x1001), name: "hidden".into(), size: 4 });
    assert_eq!(elements[3].guards(), [Guard::SuppressIf, Guard::GrayOutIf]);
    assert!(matches!(elements[3].unguarded(), MenuElement::CheckBox { default: false, .. }));
}

#[test]
fn test_var_binary_overrun_is_truncated() {
    init_logging();
    let mut record = RecordBuilder::option(OptionKind::Bool, 1, OptionFlags::empty())
        .default_value(0)
        .text(tag::VARCHAR_OPT_NAME, "a")
        .text(tag::VARCHAR_UI_NAME, "A")
        .build();
    // The name record starts right after the 32 byte numeric head; make it claim far more than the option holds.
    record[36..40].copy_from_slice(&0x100u32.to_le_bytes());
    // Bytes past the option must not satisfy the claim.
    let mut buffer = record.clone();
    buffer.extend_from_slice(&[0u8; 0x200]);

    let result = CfrRecord::from_bytes(&buffer);
    assert!(matches!(result, Err(CfrError::TruncatedBuffer { offset: 32, .. })), "{result:?}");
}

#[test]
fn test_unknown_record_leaves_stream_unchanged() {
    init_logging();
    let option = RecordBuilder::option(OptionKind::Bool, 1, OptionFlags::empty())
        .default_value(0)
        .text(tag::VARCHAR_OPT_NAME, "a")
        .text(tag::VARCHAR_UI_NAME, "A")
        .build();
    let future = RecordBuilder::new(0x2000).u32(7).u64(8).build();
    let plain = RecordBuilder::form(0, OptionFlags::empty(), "Main").child(&option).build();
    let extended = RecordBuilder::form(0, OptionFlags::empty(), "Main").child(&future).child(&option).build();

    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, None, &NullPublisher);

    assert_eq!(menu.build([&plain[..]]), menu.build([&extended[..]]));
}

#[test]
fn test_exchange_round_trip() {
    init_logging();
    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, Some(&store), &NullPublisher);
    let form = boot_form();
    menu.build([&form[..]]);

    let codec = BlockConfigCodec;
    let access = menu.config_access(&codec);

    let request = request("timeout");
    assert_eq!(access.extract_config(&request).unwrap(), format!("{request}&OFFSET=0&WIDTH=0004&VALUE=00000005"));

    access.route_config(&format!("{request}&OFFSET=0&WIDTH=0004&VALUE=0000001e")).unwrap();
    assert_eq!(store.value("timeout").unwrap(), [0x1e, 0, 0, 0]);
    assert_eq!(access.extract_config(&request).unwrap(), format!("{request}&OFFSET=0&WIDTH=0004&VALUE=0000001e"));
}

#[test]
fn test_read_only_key_ignores_updates() {
    init_logging();
    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, Some(&store), &NullPublisher);
    let form = boot_form();
    menu.build([&form[..]]);
    assert!(store.is_locked("console"));

    let codec = BlockConfigCodec;
    let access = menu.config_access(&codec);
    let request = request("console");

    assert_eq!(access.route_config(&format!("{request}&OFFSET=0&WIDTH=0004&VALUE=00000000")), Ok(()));
    assert_eq!(store.value("console").unwrap(), [2, 0, 0, 0]);
}

#[test]
fn test_unknown_key_is_reported() {
    init_logging();
    let store = MemoryVariableStore::new();
    let menu = CfrSetupMenu::new(SetupMenuConfig::default(), &store, None, &NullPublisher);
    let codec = BlockConfigCodec;
    let access = menu.config_access(&codec);

    assert_eq!(access.extract_config(&request("missing")), Err(CfrError::KeyNotFound));
    assert_eq!(access.route_config(&request("")), Err(CfrError::InvalidRequest));
}
