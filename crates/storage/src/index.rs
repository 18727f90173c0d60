use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::version::VersionId;

/// Root index recording the user-defined display order of models.
/// 紀錄模型顯示順序的根索引。
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ModelIndex {
    #[serde(default)]
    pub models: Vec<String>,
}

/// Per-model record of the user-defined protocol order.
/// 每個模型底下協定的使用者自訂順序。
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProtocolOrder {
    #[serde(default)]
    pub protocols: Vec<String>,
}

/// Per-protocol version bookkeeping: the known ids and the current pointer.
/// 每個協定的版本索引：已知的版本識別碼與目前指標。
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VersionIndex {
    #[serde(default)]
    pub versions: Vec<VersionId>,
    #[serde(default)]
    pub current: VersionId,
}

impl VersionIndex {
    /// Index seeded for a freshly initialized protocol: a single `"1.0"`
    /// version that is also current.
    /// 新協定的初始索引：僅含 `"1.0"` 並以其為目前版本。
    pub fn initial() -> Self {
        Self {
            versions: vec![VersionId::default()],
            current: VersionId::default(),
        }
    }

    pub fn contains(&self, version: &VersionId) -> bool {
        self.versions.iter().any(|existing| existing == version)
    }

    /// Version ids sorted ascending by their `(major, minor)` pair.
    /// 依 `(major, minor)` 數值遞增排序的版本識別碼。
    pub fn sorted_versions(&self) -> Vec<VersionId> {
        let mut versions = self.versions.clone();
        versions.sort_by_key(|version| version.sort_key());
        versions
    }

    /// The pointer reads should resolve: the stored `current` when it is a
    /// member, otherwise the first sorted version, otherwise `"1.0"`.
    /// 讀取時實際採用的指標；`current` 不在清單內時退回第一個排序版本。
    pub fn effective_current(&self) -> VersionId {
        if self.contains(&self.current) {
            return self.current.clone();
        }
        self.sorted_versions().into_iter().next().unwrap_or_default()
    }

    /// Highest registered version by numeric order.
    pub fn highest(&self) -> Option<VersionId> {
        self.versions
            .iter()
            .max_by_key(|version| version.sort_key())
            .cloned()
    }
}

/// How a load obtained its value.
/// 載入結果的來源分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Parsed from an existing file.
    Stored,
    /// Backing file absent; the default value was substituted.
    AbsentDefaulted,
    /// Backing file present but unreadable or unparsable; the default value
    /// was substituted.
    CorruptDefaulted,
}

/// A loaded record together with how it was obtained. Read paths never fail;
/// the provenance lets callers and tests tell the self-healed cases apart.
/// 載入的紀錄連同其來源；讀取永不失敗，來源欄位用於區分自我修復情形。
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Loaded<T> {
    pub fn stored(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Stored,
        }
    }

    pub fn absent(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::AbsentDefaulted,
        }
    }

    pub fn corrupt(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::CorruptDefaulted,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.provenance == Provenance::Stored
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Reads a JSON record, classifying the result instead of erroring: a missing
/// file and a corrupt file both default, corrupt ones with a warning.
/// 讀取 JSON 紀錄並分類結果；缺檔與壞檔皆回退為預設值，壞檔會記錄警告。
pub(crate) fn load_record<T: DeserializeOwned + Default>(path: &Path) -> Loaded<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Loaded::absent(T::default());
        }
        Err(err) => {
            warn!("reading index {} failed: {err}", path.display());
            return Loaded::corrupt(T::default());
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Loaded::stored(value),
        Err(err) => {
            warn!("index {} is unparsable: {err}", path.display());
            Loaded::corrupt(T::default())
        }
    }
}
