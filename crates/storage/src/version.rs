use std::fmt;

use serde::{Deserialize, Serialize};

/// Version id a protocol starts out with.
pub const DEFAULT_VERSION: &str = "1.0";

/// Identifier of a protocol version, shaped as `"<major>.<minor>"`.
/// 協定版本的識別碼，格式為 `"<major>.<minor>"`。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Builds an id from its numeric components.
    /// 由主/次版本號組成識別碼。
    pub fn new(major: u32, minor: u32) -> Self {
        Self(format!("{major}.{minor}"))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strict parse of the `"<major>.<minor>"` components.
    /// 嚴格解析 `"<major>.<minor>"` 的兩段數字。
    pub fn parse(&self) -> Option<(u32, u32)> {
        let (major, minor) = self.0.split_once('.')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }

    /// Ordering key: ids that fail to parse sort as `(0, 0)` rather than
    /// erroring, so a hand-edited index never breaks listings.
    /// 排序鍵；無法解析的識別碼視為 `(0, 0)`，不會造成錯誤。
    ///
    /// `VersionId` intentionally has no `Ord` impl: distinct malformed ids
    /// share this key, which would make `Ord` disagree with `Eq`.
    pub fn sort_key(&self) -> (u32, u32) {
        self.parse().unwrap_or((0, 0))
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self(DEFAULT_VERSION.to_string())
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
