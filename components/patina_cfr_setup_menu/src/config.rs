//! CFR Setup Menu Configuration
//!
//! Platform-fixed values used while building the setup menu. The defaults match the coreboot CFR producer and the
//! setup menu form set shipped with the payload, so most platforms never need to change them.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use r_efi::efi;

/// Namespace of every settings key created from CFR options (coreboot NV data GUID).
pub const COREBOOT_NV_DATA_GUID: efi::Guid =
    efi::Guid::from_fields(0xceae4c1d, 0x335b, 0x4685, 0xa4, 0xa0, &[0xfc, 0x4a, 0x94, 0xee, 0xa0, 0x85]);

/// GUID of the setup menu form set.
pub const SETUP_MENU_FORMSET_GUID: efi::Guid =
    efi::Guid::from_fields(0x93e6fcd9, 0x8e17, 0x43df, 0xb7, 0xf0, &[0x91, 0x3e, 0x58, 0xb1, 0xa7, 0x89]);

/// Form id of the setup menu form.
pub const SETUP_MENU_FORM_ID: u16 = 0x0001;

/// Label opening the dynamically generated region of the form.
pub const LABEL_RT_COMP_START: u16 = 0x0001;

/// Label closing the dynamically generated region. Also the highest usable question id.
pub const LABEL_RT_COMP_END: u16 = 0xefff;

/// First question id. An option's question id is this plus its object id.
pub const CFR_COMPONENT_START: u16 = 0x1000;

/// Setup menu configuration.
#[derive(Debug, Clone)]
pub struct SetupMenuConfig {
    /// Namespace of the settings keys.
    pub variable_guid: efi::Guid,
    /// Form set the menu is published into.
    pub formset_guid: efi::Guid,
    /// Form the menu is published into.
    pub form_id: u16,
    /// First question id.
    pub component_start: u16,
    /// Last usable question id, also the end label number.
    pub component_end: u16,
    /// Label number opening the generated region.
    pub start_label: u16,
    /// Longest accepted string default, in bytes.
    pub max_string_default_len: usize,
    /// Stored in place of an empty string default.
    pub empty_string_placeholder: &'static str,
}

impl Default for SetupMenuConfig {
    fn default() -> Self {
        SetupMenuConfig {
            variable_guid: COREBOOT_NV_DATA_GUID,
            formset_guid: SETUP_MENU_FORMSET_GUID,
            form_id: SETUP_MENU_FORM_ID,
            component_start: CFR_COMPONENT_START,
            component_end: LABEL_RT_COMP_END,
            start_label: LABEL_RT_COMP_START,
            max_string_default_len: 0xFF,
            empty_string_placeholder: "INVALID",
        }
    }
}
