//! Setup menu UI descriptor elements.
//!
//! The compiler produces a flat, ordered stream of [`MenuElement`]s that a form browser renders. Visibility guards
//! wrap the element they apply to, so a suppressed and grayed-out option is a `SuppressIf` guard containing a
//! `GrayOutIf` guard containing the option itself.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::{boxed::Box, string::String, vec::Vec};

use bitflags::bitflags;

use crate::cfr::OptionFlags;

/// Question and variable store identifier of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u16);

impl ElementId {
    /// Maps a CFR object id into the `base..=end` identifier space.
    ///
    /// Returns `None` when the resulting identifier does not fit.
    pub fn for_object(object_id: u64, base: u16, end: u16) -> Option<Self> {
        let id = object_id.checked_add(base as u64)?;
        if id > end as u64 {
            return None;
        }
        Some(ElementId(id as u16))
    }
}

bitflags! {
    /// Flags carried by every interactive element.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QuestionFlags: u8 {
        /// The browser does not allow the value to be changed.
        const READ_ONLY = 0x01;
        /// Changing the value requires a reset to take effect.
        const RESET_REQUIRED = 0x10;
    }
}

impl QuestionFlags {
    /// Question flags for an option with the given CFR flags.
    pub fn for_option(flags: OptionFlags) -> Self {
        if flags.contains(OptionFlags::READONLY) {
            QuestionFlags::RESET_REQUIRED | QuestionFlags::READ_ONLY
        } else {
            QuestionFlags::RESET_REQUIRED
        }
    }
}

/// Common part of an interactive element bound to a settings key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question id, equal to the variable store id.
    pub id: ElementId,
    /// Settings key backing the question.
    pub key: String,
    /// Display text.
    pub prompt: String,
    /// Help text, if any.
    pub help: Option<String>,
    /// Question flags.
    pub flags: QuestionFlags,
}

/// One selectable entry of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Stored value.
    pub value: u32,
    /// Display label.
    pub label: String,
}

/// Level of a section heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    /// Title of a top-level form.
    Form,
    /// Title of a form nested inside another one.
    NestedForm,
}

/// Kind of visibility guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The wrapped element is hidden while the condition holds.
    SuppressIf,
    /// The wrapped element is shown but disabled while the condition holds.
    GrayOutIf,
}

/// Condition of a visibility guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Always holds.
    True,
}

/// One element of the setup form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuElement {
    /// Marker label delimiting the dynamically generated region of the form.
    Label(u16),
    /// Section heading.
    Subtitle {
        /// Heading text.
        prompt: String,
        /// Heading level.
        level: Heading,
    },
    /// Blank line closing a top-level form.
    Separator,
    /// Declares the settings key a question is stored in.
    VarStore {
        /// Variable store id, equal to the question id.
        id: ElementId,
        /// Settings key.
        name: String,
        /// Size of the stored value in bytes.
        size: usize,
    },
    /// 32-bit numeric entry.
    Numeric {
        /// Question.
        question: Question,
        /// Default value.
        default: u32,
        /// Smallest accepted value.
        minimum: u32,
        /// Largest accepted value.
        maximum: u32,
        /// Increment, zero for free entry.
        step: u32,
    },
    /// Selection among enumerated values.
    OneOf {
        /// Question.
        question: Question,
        /// Default value.
        default: u32,
        /// Choices in document order.
        choices: Vec<Choice>,
    },
    /// Boolean toggle.
    CheckBox {
        /// Question.
        question: Question,
        /// Default state.
        default: bool,
    },
    /// Free text entry.
    String {
        /// Question.
        question: Question,
        /// Default text.
        default: String,
        /// Minimum length in characters.
        min_size: usize,
        /// Maximum length in characters, terminator excluded.
        max_size: usize,
    },
    /// Static text.
    Text {
        /// Display text.
        prompt: String,
        /// Help text, if any.
        help: Option<String>,
    },
    /// An element behind a visibility guard.
    Guarded {
        /// Guard kind.
        guard: Guard,
        /// Guard condition.
        condition: Condition,
        /// Wrapped element.
        element: Box<MenuElement>,
    },
}

impl MenuElement {
    /// Wraps `self` in the guards requested by `flags`: `SuppressIf` outermost, `GrayOutIf` inside it.
    pub fn guarded(self, flags: OptionFlags) -> Self {
        let mut element = self;
        if flags.contains(OptionFlags::GRAYOUT) {
            element = MenuElement::Guarded {
                guard: Guard::GrayOutIf,
                condition: Condition::True,
                element: Box::new(element),
            };
        }
        if flags.contains(OptionFlags::SUPPRESS) {
            element = MenuElement::Guarded {
                guard: Guard::SuppressIf,
                condition: Condition::True,
                element: Box::new(element),
            };
        }
        element
    }

    /// The element with every guard removed.
    pub fn unguarded(&self) -> &MenuElement {
        let mut element = self;
        while let MenuElement::Guarded { element: inner, .. } = element {
            element = inner;
        }
        element
    }

    /// Guards around the element, outermost first.
    pub fn guards(&self) -> Vec<Guard> {
        let mut guards = Vec::new();
        let mut element = self;
        while let MenuElement::Guarded { guard, element: inner, .. } = element {
            guards.push(*guard);
            element = inner;
        }
        guards
    }

    /// The question of an interactive element, looking through guards.
    pub fn question(&self) -> Option<&Question> {
        match self.unguarded() {
            MenuElement::Numeric { question, .. }
            | MenuElement::OneOf { question, .. }
            | MenuElement::CheckBox { question, .. }
            | MenuElement::String { question, .. } => Some(question),
            _ => None,
        }
    }
}
