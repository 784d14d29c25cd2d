//! External names: references to functions and data defined outside the
//! function being compiled. These surface in relocation records.

use std::fmt;

/// The name of an external symbol, function or data object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternalName {
    /// A name in an application-defined namespace.
    User {
        /// Arbitrary namespace tag chosen by the IR producer.
        namespace: u32,
        /// Arbitrary index within the namespace.
        index: u32,
    },
    /// A named symbol, resolved by the linker.
    Symbol(String),
}

impl ExternalName {
    /// Create a new user external name.
    pub fn user(namespace: u32, index: u32) -> Self {
        ExternalName::User { namespace, index }
    }

    /// Create a symbol name.
    pub fn symbol(name: impl Into<String>) -> Self {
        ExternalName::Symbol(name.into())
    }
}

impl fmt::Display for ExternalName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExternalName::User { namespace, index } => write!(f, "u{}:{}", namespace, index),
            ExternalName::Symbol(sym) => write!(f, "%{}", sym),
        }
    }
}
