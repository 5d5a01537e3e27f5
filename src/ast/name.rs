//! Class names.

use serde::{Deserialize, Serialize};

/// The name of a class, in UpperCamelCase.
///
/// Names are ordered by their string form; the class table interns them to
/// numeric handles, so this type stays a plain owned string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassName(String);

impl ClassName {
    /// Create a class name.
    ///
    /// Panics if the name is empty, does not start with an uppercase ASCII
    /// letter, or contains anything but ASCII alphanumerics.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(
            name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                && name.chars().all(|c| c.is_ascii_alphanumeric()),
            "not a valid class name: {name:?}"
        );
        Self(name)
    }

    /// The string form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The root of every class hierarchy.
    #[must_use]
    pub fn component() -> Self {
        Self::new("Component")
    }

    /// The metaclass: `Class<Foo>` is the type of the class `Foo` itself.
    #[must_use]
    pub fn class() -> Self {
        Self::new("Class")
    }

    /// The no-op component kind; gaining one does nothing.
    #[must_use]
    pub fn ok() -> Self {
        Self::new("Ok")
    }
}

impl std::fmt::Display for ClassName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
