//! Compiles CFR forms into setup menu elements.
//!
//! Each top-level form is walked in document order. Options are fully decoded and validated before anything is
//! written to the settings store, so a malformed option never leaves a half-created key behind. A malformed or
//! truncated record aborts the rest of its top-level form; elements already produced for that form are kept and
//! the closing separator is still emitted, so the next form starts on a clean line. Records with an unknown tag and
//! options whose object id does not map to a usable question id are logged and skipped on their own.
//!
//! Nested forms are flattened: a nested form contributes a second-level heading and its children follow it as
//! siblings of the nested form itself.
//!
//! ## Logging
//!
//! Per-form and per-option progress is logged at `info` level using the `cfr` log target. Skipped records and
//! aborted forms are logged at `error` level.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::iter;

use crate::{
    cfr::{
        cursor::RecordCursor, CfrRecord, CommentOption, DependencyValues, FormOption, NumericOption, OptionHeader,
        OptionKind, StringOption, VarBinary,
    },
    config::SetupMenuConfig,
    error::{CfrError, Result},
    storage::SettingsBinding,
    ui::{Choice, ElementId, Heading, MenuElement, Question, QuestionFlags},
};

/// Turns CFR form blobs into an ordered stream of [`MenuElement`]s.
pub struct FormCompiler<'a> {
    config: &'a SetupMenuConfig,
    binding: SettingsBinding<'a>,
}

impl<'a> FormCompiler<'a> {
    /// Creates a compiler that binds stateful options through `binding`.
    pub fn new(config: &'a SetupMenuConfig, binding: SettingsBinding<'a>) -> Self {
        Self { config, binding }
    }

    /// Compiles every form in order. A form that fails to decode is logged and compilation continues with the next.
    pub fn compile_forms<'b, I>(&self, forms: I) -> Vec<MenuElement>
    where
        I: IntoIterator<Item = &'b [u8]>,
    {
        let mut elements = Vec::new();
        for (index, form) in forms.into_iter().enumerate() {
            if let Err(err) = self.compile_form(form, &mut elements) {
                log::error!(target: "cfr", "Aborted form {index}: {err}");
            }
            elements.push(MenuElement::Separator);
        }
        elements
    }

    /// Compiles one top-level form, appending its elements to `out`. The closing separator is not included.
    pub fn compile_form(&self, blob: &[u8], out: &mut Vec<MenuElement>) -> Result<()> {
        let mut cursor = RecordCursor::new(blob);
        let Some(record) = cursor.next_record()? else {
            return Err(CfrError::TruncatedBuffer { offset: 0, available: 0 });
        };
        let CfrRecord::Form(form) = CfrRecord::parse(record)? else {
            return Err(record.malformed("top-level record is not a form"));
        };

        log::info!(
            target: "cfr",
            "Process form[{}] \"{}\" of size {:#x}",
            form.header.object_id,
            form.title.as_str()?,
            form.header.size
        );
        out.push(self.heading(&form, Heading::Form)?);

        let mut children = form.children();
        while let Some(child) = children.peek_record()? {
            let compiled = match CfrRecord::parse(child) {
                Ok(CfrRecord::Form(nested)) => {
                    log::info!(target: "cfr", "Nested form[{}], will produce subtitle", nested.header.object_id);
                    out.push(self.heading(&nested, Heading::NestedForm)?);
                    children.advance(nested.fields_len())?;
                    continue;
                }
                Ok(CfrRecord::Enum(option)) | Ok(CfrRecord::Number(option)) | Ok(CfrRecord::Bool(option)) => {
                    self.compile_numeric(&option, child.offset(), out)
                }
                Ok(CfrRecord::String(option)) => self.compile_string(&option, child.offset(), out),
                Ok(CfrRecord::Comment(option)) => self.compile_comment(&option, out),
                Err(err) => Err(err),
            };
            match compiled {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => log::error!(target: "cfr", "{err}, skipped"),
                Err(err) => return Err(err),
            }
            children.advance(child.size())?;
        }

        Ok(())
    }

    fn heading(&self, form: &FormOption<'_>, level: Heading) -> Result<MenuElement> {
        let prompt = form.title.as_str()?.to_string();
        Ok(MenuElement::Subtitle { prompt, level }.guarded(form.header.flags))
    }

    fn element_id(&self, header: &OptionHeader, offset: usize) -> Result<ElementId> {
        ElementId::for_object(header.object_id, self.config.component_start, self.config.component_end)
            .ok_or(CfrError::QuestionIdOutOfRange { offset, object_id: header.object_id })
    }

    fn question(
        &self,
        id: ElementId,
        key: &str,
        title: VarBinary<'_>,
        help: Option<VarBinary<'_>>,
        header: &OptionHeader,
    ) -> Result<Question> {
        Ok(Question {
            id,
            key: key.to_string(),
            prompt: title.as_str()?.to_string(),
            help: help.map(|help| help.as_str().map(ToString::to_string)).transpose()?,
            flags: QuestionFlags::for_option(header.flags),
        })
    }

    fn log_dependency(&self, header: &OptionHeader, values: Option<DependencyValues<'_>>) {
        if let Some(values) = values {
            log::debug!(
                target: "cfr",
                "Option[{}] depends on option[{}] ({} values), shown unconditionally",
                header.object_id,
                header.dependency_id,
                values.values().count()
            );
        }
    }

    fn compile_numeric(&self, option: &NumericOption<'_>, offset: usize, out: &mut Vec<MenuElement>) -> Result<()> {
        let header = &option.header;
        let id = self.element_id(header, offset)?;
        let key = option.key.as_str()?;
        let question = self.question(id, key, option.title, option.help, header)?;
        let choices = option
            .enum_values
            .iter()
            .map(|choice| Ok(Choice { value: choice.value, label: choice.label.as_str()?.to_string() }))
            .collect::<Result<Vec<_>>>()?;

        log::info!(target: "cfr", "Process option[{}] \"{key}\" of size {:#x}", header.object_id, header.size);
        self.log_dependency(header, option.dependency_values);

        let size = self.binding.ensure(key, &option.default_value.to_le_bytes(), header.flags);
        out.push(MenuElement::VarStore { id, name: key.to_string(), size });

        let default = option.default_value;
        let element = match header.kind {
            OptionKind::Enum => MenuElement::OneOf { question, default, choices },
            OptionKind::Bool => MenuElement::CheckBox { question, default: default != 0 },
            _ => MenuElement::Numeric { question, default, minimum: 0, maximum: u32::MAX, step: 0 },
        };
        out.push(element.guarded(header.flags));
        Ok(())
    }

    fn compile_string(&self, option: &StringOption<'_>, offset: usize, out: &mut Vec<MenuElement>) -> Result<()> {
        let header = &option.header;
        if option.default_value.len() > self.config.max_string_default_len {
            log::error!(
                target: "cfr",
                "Default value length {:#x} of option[{}] is too long, skipped",
                option.default_value.len(),
                header.object_id
            );
            return Ok(());
        }

        let id = self.element_id(header, offset)?;
        let key = option.key.as_str()?;
        let question = self.question(id, key, option.title, option.help, header)?;
        // A default of only a terminator is treated as empty.
        let default = match option.default_value.len() {
            0 | 1 => self.config.empty_string_placeholder,
            _ => option.default_value.as_str()?,
        };

        log::info!(target: "cfr", "Process option[{}] \"{key}\" of size {:#x}", header.object_id, header.size);
        self.log_dependency(header, option.dependency_values);

        let stored_default: Vec<u8> =
            default.encode_utf16().chain(iter::once(0)).flat_map(u16::to_le_bytes).collect();
        let size = self.binding.ensure(key, &stored_default, header.flags);
        out.push(MenuElement::VarStore { id, name: key.to_string(), size });

        let default_chars = default.encode_utf16().count();
        let stored_chars = (size / 2).saturating_sub(1);
        let element = MenuElement::String {
            question,
            default: String::from(default),
            min_size: 0,
            max_size: default_chars.max(stored_chars),
        };
        out.push(element.guarded(header.flags));
        Ok(())
    }

    fn compile_comment(&self, option: &CommentOption<'_>, out: &mut Vec<MenuElement>) -> Result<()> {
        log::info!(target: "cfr", "Process comment[{}] of size {:#x}", option.header.object_id, option.header.size);
        self.log_dependency(&option.header, option.dependency_values);

        let element = MenuElement::Text {
            prompt: option.title.as_str()?.to_string(),
            help: option.help.map(|help| help.as_str().map(ToString::to_string)).transpose()?,
        };
        out.push(element.guarded(option.header.flags));
        Ok(())
    }
}
