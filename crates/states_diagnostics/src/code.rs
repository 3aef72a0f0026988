//! Stable identifiers for each kind of finding, such as `E001` or `W003`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::severity::Severity;

/// Family of a code; decides its letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// `E`: blocks simulation.
    Error,
    /// `W`: suspicious modeling.
    Warning,
    /// `N`: informational.
    Note,
}

impl Category {
    /// The code letter.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Note => 'N',
        }
    }

    /// The severity findings of this family are reported with.
    pub fn severity(self) -> Severity {
        match self {
            Category::Error => Severity::Error,
            Category::Warning => Severity::Warning,
            Category::Note => Severity::Note,
        }
    }
}

/// A category letter plus a number, rendered as `W004`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Family of the code.
    pub category: Category,
    /// Number within the family.
    pub number: u16,
}

impl DiagnosticCode {
    /// Usable in `const` items, so checks can name their codes up front.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
