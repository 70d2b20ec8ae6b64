//! CFR Setup Menu Component
//!
//! Builds the runtime part of the setup form from the CFR forms handed over by the boot loader and publishes it
//! between the start and end labels of the form. The same settings store backs the configuration exchange of the
//! published questions, see [`CfrSetupMenu::config_access`].
//!
//! ## Logging
//!
//! Detailed logging is available for this component using the `cfr` log target.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::vec::Vec;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use r_efi::efi;

use crate::{
    compiler::FormCompiler,
    config::SetupMenuConfig,
    config_access::{ConfigAccess, ConfigRouting},
    error::Result,
    storage::{SettingsBinding, SettingsStore, VariableLock},
    ui::MenuElement,
};

/// Hands a compiled element stream to the form browser.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait FormPublisher {
    /// Replaces the content between the labels of form `form_id` in the form set `formset_guid` with `elements`.
    ///
    /// The first and last element of `elements` are the start and end labels.
    fn update_form(&self, formset_guid: &efi::Guid, form_id: u16, elements: &[MenuElement]) -> Result<()>;
}

/// The setup menu component.
pub struct CfrSetupMenu<'a> {
    config: SetupMenuConfig,
    store: &'a dyn SettingsStore,
    lock: Option<&'a dyn VariableLock>,
    publisher: &'a dyn FormPublisher,
}

impl<'a> CfrSetupMenu<'a> {
    /// Creates the component. Without a lock service read-only options stay writable.
    pub fn new(
        config: SetupMenuConfig,
        store: &'a dyn SettingsStore,
        lock: Option<&'a dyn VariableLock>,
        publisher: &'a dyn FormPublisher,
    ) -> Self {
        Self { config, store, lock, publisher }
    }

    /// The active configuration.
    pub fn config(&self) -> &SetupMenuConfig {
        &self.config
    }

    /// Compiles `forms` into the label-delimited element stream without publishing it.
    pub fn build<'b, I>(&self, forms: I) -> Vec<MenuElement>
    where
        I: IntoIterator<Item = &'b [u8]>,
    {
        let compiler = FormCompiler::new(&self.config, SettingsBinding::new(self.store, self.lock));

        let mut elements = Vec::new();
        elements.push(MenuElement::Label(self.config.start_label));
        elements.extend(compiler.compile_forms(forms));
        elements.push(MenuElement::Label(self.config.component_end));
        elements
    }

    /// Compiles `forms` and publishes the result. Returns the number of elements published.
    pub fn publish<'b, I>(&self, forms: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'b [u8]>,
    {
        let elements = self.build(forms);
        log::info!(
            target: "cfr",
            "Publishing {} elements to form {:#x}",
            elements.len(),
            self.config.form_id
        );
        self.publisher.update_form(&self.config.formset_guid, self.config.form_id, &elements).inspect_err(|err| {
            log::error!(target: "cfr", "Failed to publish setup menu: {err}");
        })?;
        Ok(elements.len())
    }

    /// Configuration exchange for the published questions, backed by the component's settings store.
    pub fn config_access<'r>(&self, routing: &'r dyn ConfigRouting) -> ConfigAccess<'r>
    where
        'a: 'r,
    {
        ConfigAccess::new(self.store, routing)
    }
}
