use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// RBAC role carried in tokens.
///
/// Societies use three: `admin` (society owner), `client` (operator who
/// records day-to-day entries) and `member` (read-only self service). The
/// type stays open so new roles need no code change here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const CLIENT: &'static str = "client";
    pub const MEMBER: &'static str = "member";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    pub fn client() -> Self {
        Self::new(Self::CLIENT)
    }

    pub fn member() -> Self {
        Self::new(Self::MEMBER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
