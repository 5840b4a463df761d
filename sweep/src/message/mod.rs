//! # Message module
//!
//! Module dedicated to message management. The provider features and
//! engines reside in their own modules: [`search`], [`size`] and
//! [`delete`].

pub mod delete;
pub mod search;
pub mod size;

use std::fmt;

/// The provider-assigned identifier of a message.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Id(String);

impl Id {
    pub fn new(id: impl ToString) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Id {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}
