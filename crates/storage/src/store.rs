use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::index::{load_record, Loaded, ModelIndex, ProtocolOrder, VersionIndex};
use crate::util::write_atomic;
use crate::version::VersionId;

const MODELS_FILE: &str = "models.json";
const ORDER_FILE: &str = "order.json";
const VERSIONS_FILE: &str = "versions.json";

/// Models seeded on first launch, before the user has created any.
/// 首次啟動時預先建立的模型。
const SEED_MODELS: [&str; 3] = ["chatgpt", "claude", "copilot"];

/// Errors surfaced by mutating store operations. Read paths self-heal and
/// log instead; a failed write must never be silently swallowed.
/// 變更性操作的錯誤型別；讀取路徑自我修復並記錄，寫入失敗絕不吞掉。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage IO error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode index {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-system backed hierarchy of models, their protocols, and each
/// protocol's versioned text content. Constructed against an explicit base
/// directory; callers own the instance and pass it where it is needed.
/// 以檔案系統儲存模型／協定／版本階層；以明確的根目錄建構，由呼叫端持有。
///
/// Layout under the base directory:
///
/// ```text
/// models.json                      {"models": ["m1", ...]}
/// <model>/order.json               {"protocols": ["p1", ...]}
/// <model>/<protocol>.txt           legacy flat content (pre-migration)
/// <model>/<protocol>/versions.json {"versions": ["1.0", ...], "current": "1.0"}
/// <model>/<protocol>/<version>.txt text content of that version
/// ```
#[derive(Debug, Clone)]
pub struct ProtocolStore {
    base: PathBuf,
}

impl ProtocolStore {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn models_path(&self) -> PathBuf {
        self.base.join(MODELS_FILE)
    }

    fn model_dir(&self, model: &str) -> PathBuf {
        self.base.join(model)
    }

    fn order_path(&self, model: &str) -> PathBuf {
        self.model_dir(model).join(ORDER_FILE)
    }

    fn legacy_protocol_path(&self, model: &str, protocol: &str) -> PathBuf {
        self.model_dir(model).join(format!("{protocol}.txt"))
    }

    fn protocol_dir(&self, model: &str, protocol: &str) -> PathBuf {
        self.model_dir(model).join(protocol)
    }

    fn versions_path(&self, model: &str, protocol: &str) -> PathBuf {
        self.protocol_dir(model, protocol).join(VERSIONS_FILE)
    }

    fn version_file(&self, model: &str, protocol: &str, version: &VersionId) -> PathBuf {
        self.protocol_dir(model, protocol)
            .join(format!("{}.txt", version.as_str()))
    }

    fn write_index<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &json)?;
        Ok(())
    }

    // ---- model ordering -------------------------------------------------

    /// Loads the ordered model names, seeding the sample set when the index
    /// has never been written. Never fails; unreadable indexes yield an
    /// empty list.
    /// 載入模型順序；索引不存在時播種範例模型，讀取失敗回傳空清單。
    pub fn load_models(&self) -> Vec<String> {
        self.load_models_checked().into_value().models
    }

    /// Same as [`load_models`](Self::load_models), reporting how the index
    /// was obtained.
    pub fn load_models_checked(&self) -> Loaded<ModelIndex> {
        let path = self.models_path();
        if !path.exists() {
            let seeded = ModelIndex {
                models: SEED_MODELS.map(String::from).to_vec(),
            };
            if let Err(err) = self.initialize_models(&seeded) {
                warn!("seeding model index at {} failed: {err}", path.display());
            }
            return Loaded::absent(seeded);
        }
        load_record(&path)
    }

    fn initialize_models(&self, index: &ModelIndex) -> Result<(), StoreError> {
        self.save_models(&index.models)?;
        for model in &index.models {
            fs::create_dir_all(self.model_dir(model))?;
            self.save_protocol_order(model, &[])?;
        }
        Ok(())
    }

    /// Persists the model order verbatim.
    /// 依原樣保存模型順序。
    pub fn save_models(&self, models: &[String]) -> Result<(), StoreError> {
        let index = ModelIndex {
            models: models.to_vec(),
        };
        self.write_index(&self.models_path(), &index)
    }

    // ---- model operations -----------------------------------------------

    /// Adds a model; `Ok(false)` when the name is already present.
    /// 新增模型；名稱已存在時回傳 `Ok(false)`。
    pub fn add_model(&self, name: &str) -> Result<bool, StoreError> {
        let mut models = self.load_models();
        if models.iter().any(|model| model == name) {
            return Ok(false);
        }
        models.push(name.to_string());
        self.save_models(&models)?;
        fs::create_dir_all(self.model_dir(name))?;
        self.save_protocol_order(name, &[])?;
        Ok(true)
    }

    /// Renames a model in place within the order, moving its directory.
    /// `Ok(false)` when `old` is absent or `new` already taken.
    /// 原位更名模型並搬移其目錄；來源不存在或目標已存在時回傳 `Ok(false)`。
    pub fn rename_model(&self, old: &str, new: &str) -> Result<bool, StoreError> {
        let mut models = self.load_models();
        let Some(slot) = models.iter().position(|model| model == old) else {
            return Ok(false);
        };
        if models.iter().any(|model| model == new) {
            return Ok(false);
        }

        let old_dir = self.model_dir(old);
        if old_dir.exists() {
            // The directory rename and the index rewrite below are two
            // independent filesystem operations; a crash between them leaves
            // them out of sync.
            fs::rename(&old_dir, self.model_dir(new))?;
        } else {
            fs::create_dir_all(self.model_dir(new))?;
        }

        models[slot] = new.to_string();
        self.save_models(&models)?;
        Ok(true)
    }

    /// Deletes a model and everything beneath it.
    /// 刪除模型及其整個目錄樹。
    pub fn delete_model(&self, name: &str) -> Result<bool, StoreError> {
        let mut models = self.load_models();
        let Some(slot) = models.iter().position(|model| model == name) else {
            return Ok(false);
        };
        models.remove(slot);
        self.save_models(&models)?;

        let dir = self.model_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(true)
    }

    // ---- protocol ordering ----------------------------------------------

    /// Loads a model's protocol order, creating an empty record on first
    /// access. Never fails.
    /// 載入協定順序；首次存取時自動建立空紀錄，永不失敗。
    pub fn load_protocol_order(&self, model: &str) -> Vec<String> {
        self.load_protocol_order_checked(model).into_value().protocols
    }

    /// Same as [`load_protocol_order`](Self::load_protocol_order), reporting
    /// how the record was obtained.
    pub fn load_protocol_order_checked(&self, model: &str) -> Loaded<ProtocolOrder> {
        let path = self.order_path(model);
        if !path.exists() {
            if let Err(err) = self.save_protocol_order(model, &[]) {
                warn!(
                    "creating protocol order at {} failed: {err}",
                    path.display()
                );
            }
            return Loaded::absent(ProtocolOrder::default());
        }
        load_record(&path)
    }

    /// Persists a model's protocol order verbatim.
    pub fn save_protocol_order(&self, model: &str, protocols: &[String]) -> Result<(), StoreError> {
        let order = ProtocolOrder {
            protocols: protocols.to_vec(),
        };
        self.write_index(&self.order_path(model), &order)
    }

    // ---- protocol operations --------------------------------------------

    /// Adds a protocol under a model, initializing its versioned form.
    /// `Ok(false)` when the name is already present.
    /// 在模型下新增協定並初始化版本結構；名稱已存在時回傳 `Ok(false)`。
    pub fn add_protocol(&self, model: &str, protocol: &str) -> Result<bool, StoreError> {
        let mut protocols = self.load_protocol_order(model);
        if protocols.iter().any(|existing| existing == protocol) {
            return Ok(false);
        }
        protocols.push(protocol.to_string());
        self.save_protocol_order(model, &protocols)?;
        self.ensure_protocol_versions(model, protocol)?;
        Ok(true)
    }

    /// Renames a protocol in place within the order. Handles all three
    /// on-disk shapes: a versioned directory, a legacy flat file, or neither
    /// (a fresh empty protocol is synthesized under the new name).
    /// 原位更名協定；同時處理版本目錄、舊式單檔或兩者皆無的情形。
    pub fn rename_protocol(
        &self,
        model: &str,
        old: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut protocols = self.load_protocol_order(model);
        let Some(slot) = protocols.iter().position(|existing| existing == old) else {
            return Ok(false);
        };
        if protocols.iter().any(|existing| existing == new) {
            return Ok(false);
        }

        let mut moved = false;
        let old_dir = self.protocol_dir(model, old);
        if old_dir.exists() {
            fs::rename(&old_dir, self.protocol_dir(model, new))?;
            moved = true;
        }
        let old_file = self.legacy_protocol_path(model, old);
        if old_file.exists() {
            fs::rename(&old_file, self.legacy_protocol_path(model, new))?;
            moved = true;
        }
        if !moved {
            self.ensure_protocol_versions(model, new)?;
        }

        protocols[slot] = new.to_string();
        self.save_protocol_order(model, &protocols)?;
        Ok(true)
    }

    /// Deletes a protocol, removing whichever on-disk shapes exist.
    /// 刪除協定；版本目錄與舊式單檔都會被清除。
    pub fn delete_protocol(&self, model: &str, protocol: &str) -> Result<bool, StoreError> {
        let mut protocols = self.load_protocol_order(model);
        let Some(slot) = protocols.iter().position(|existing| existing == protocol) else {
            return Ok(false);
        };
        protocols.remove(slot);
        self.save_protocol_order(model, &protocols)?;

        let dir = self.protocol_dir(model, protocol);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        let legacy = self.legacy_protocol_path(model, protocol);
        if legacy.exists() {
            fs::remove_file(&legacy)?;
        }
        Ok(true)
    }

    // ---- versioning -----------------------------------------------------

    /// Idempotent upgrade to the versioned layout. No-op when the version
    /// index file exists. Otherwise migrates the legacy flat file into
    /// version `"1.0"` (or creates an empty one) and writes the initial
    /// index. The legacy file is deleted last, so an interrupted migration
    /// re-runs cleanly.
    /// 將協定升級為版本化結構的冪等操作；舊式單檔最後才刪除，中斷後可重跑。
    pub fn ensure_protocol_versions(&self, model: &str, protocol: &str) -> Result<(), StoreError> {
        let index_path = self.versions_path(model, protocol);
        if index_path.exists() {
            return Ok(());
        }

        let legacy = self.legacy_protocol_path(model, protocol);
        let migrating = legacy.exists();
        let content = if migrating {
            fs::read_to_string(&legacy)?
        } else {
            String::new()
        };

        let initial = VersionId::default();
        write_atomic(
            &self.version_file(model, protocol, &initial),
            content.as_bytes(),
        )?;
        self.write_index(&index_path, &VersionIndex::initial())?;

        if migrating {
            fs::remove_file(&legacy)?;
            info!("migrated legacy protocol {model}/{protocol} to versioned layout");
        }
        Ok(())
    }

    /// Loads a protocol's version index, reporting how it was obtained.
    /// Missing and corrupt indexes default to an empty record.
    pub fn load_version_index(&self, model: &str, protocol: &str) -> Loaded<VersionIndex> {
        load_record(&self.versions_path(model, protocol))
    }

    /// Version ids sorted ascending by `(major, minor)`. Never fails; a
    /// missing or unreadable index lists nothing.
    /// 依數值排序的版本識別碼；索引缺失或損毀時回傳空清單。
    pub fn list_versions(&self, model: &str, protocol: &str) -> Vec<VersionId> {
        self.load_version_index(model, protocol)
            .into_value()
            .sorted_versions()
    }

    /// The version reads resolve to when none is named. Falls back to the
    /// first sorted version when the stored pointer is stale, and to
    /// `"1.0"` when the index is missing or unreadable.
    /// 未指名版本時的預設版本；指標失效時退回第一個排序版本。
    pub fn get_current_version(&self, model: &str, protocol: &str) -> VersionId {
        self.load_version_index(model, protocol)
            .into_value()
            .effective_current()
    }

    /// Repoints `current`. `Ok(false)` when the index is absent, unreadable,
    /// or `version` is not a member.
    /// 重新指定目前版本；索引不可用或版本不在清單內時回傳 `Ok(false)`。
    pub fn set_current_version(
        &self,
        model: &str,
        protocol: &str,
        version: &VersionId,
    ) -> Result<bool, StoreError> {
        let loaded = self.load_version_index(model, protocol);
        if !loaded.is_stored() {
            return Ok(false);
        }
        let mut index = loaded.into_value();
        if !index.contains(version) {
            return Ok(false);
        }
        index.current = version.clone();
        self.write_index(&self.versions_path(model, protocol), &index)?;
        Ok(true)
    }

    /// Creates the next version after the highest registered one, copying
    /// content from `base_version` when given and known, else from the
    /// current version, else starting empty. Returns the new id, or `None`
    /// on any failure (logged): a missing index, an unreadable base file,
    /// or an I/O error.
    /// 在最高版本之後建立新版本；任何失敗（已記錄）都回傳 `None`。
    pub fn create_new_version(
        &self,
        model: &str,
        protocol: &str,
        base_version: Option<&VersionId>,
    ) -> Option<VersionId> {
        let loaded = self.load_version_index(model, protocol);
        if !loaded.is_stored() {
            warn!("cannot create a version for {model}/{protocol}: no readable version index");
            return None;
        }
        let mut index = loaded.into_value();

        let (major, minor) = index
            .highest()
            .map(|version| version.sort_key())
            .unwrap_or((1, 0));
        let mut candidate = VersionId::new(major, minor + 1);
        if index.contains(&candidate) {
            candidate = VersionId::new(major, minor + 2);
        }

        let source = match base_version {
            Some(base) if index.contains(base) => Some(base.clone()),
            _ => {
                let current = index.effective_current();
                index.contains(&current).then_some(current)
            }
        };
        let content = match source {
            Some(version) => {
                match fs::read_to_string(self.version_file(model, protocol, &version)) {
                    Ok(content) => content,
                    Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
                    Err(err) => {
                        warn!("reading base version {version} of {model}/{protocol} failed: {err}");
                        return None;
                    }
                }
            }
            None => String::new(),
        };

        if let Err(err) = write_atomic(
            &self.version_file(model, protocol, &candidate),
            content.as_bytes(),
        ) {
            warn!("writing version {candidate} of {model}/{protocol} failed: {err}");
            return None;
        }
        index.versions.push(candidate.clone());
        if let Err(err) = self.write_index(&self.versions_path(model, protocol), &index) {
            warn!("updating version index of {model}/{protocol} failed: {err}");
            return None;
        }
        Some(candidate)
    }

    /// Reads a version's content, migrating the protocol first if needed.
    /// `None` resolves to the current version. Never fails; a missing or
    /// unreadable file reads as empty.
    /// 讀取版本內容（必要時先遷移）；檔案缺失或不可讀時回傳空字串。
    pub fn read_version(
        &self,
        model: &str,
        protocol: &str,
        version: Option<&VersionId>,
    ) -> String {
        if let Err(err) = self.ensure_protocol_versions(model, protocol) {
            warn!("version upgrade of {model}/{protocol} failed: {err}");
        }
        let version = match version {
            Some(version) => version.clone(),
            None => self.get_current_version(model, protocol),
        };
        match fs::read_to_string(self.version_file(model, protocol, &version)) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!("reading version {version} of {model}/{protocol} failed: {err}");
                }
                String::new()
            }
        }
    }

    /// Atomically writes a version's content, migrating the protocol first
    /// if needed. Writing an id the index does not list is allowed (the file
    /// stays invisible to [`list_versions`](Self::list_versions) until
    /// registered) and warns.
    /// 原子寫入版本內容（必要時先遷移）；寫入未登錄的版本會記錄警告。
    pub fn write_version(
        &self,
        model: &str,
        protocol: &str,
        version: &VersionId,
        content: &str,
    ) -> Result<(), StoreError> {
        self.ensure_protocol_versions(model, protocol)?;
        if !self
            .load_version_index(model, protocol)
            .into_value()
            .contains(version)
        {
            warn!("writing unlisted version {version} of {model}/{protocol}");
        }
        write_atomic(
            &self.version_file(model, protocol, version),
            content.as_bytes(),
        )?;
        Ok(())
    }
}
