use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "unit.cancel").
/// A special wildcard permission `"*"` grants every capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allow everything.
pub const WILDCARD: Permission = Permission::from_static("*");

/// Release a hold the actor does not own.
pub const RELEASE_OVERRIDE: Permission = Permission::from_static("unit.release.override");

/// Advance a unit more than one step along the sale lifecycle.
pub const ADVANCE_SKIP: Permission = Permission::from_static("unit.advance.skip");

/// Move a non-terminal unit to `cancelled`.
pub const CANCEL: Permission = Permission::from_static("unit.cancel");
