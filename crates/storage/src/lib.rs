//! File-backed storage core for ProtoClip's model/protocol/version hierarchy.
//! ProtoClip 模型／協定／版本階層的檔案儲存核心模組。

mod util;

pub mod index;
pub mod logging;
pub mod store;
pub mod version;

pub use index::{Loaded, ModelIndex, ProtocolOrder, Provenance, VersionIndex};
pub use store::{ProtocolStore, StoreError};
pub use version::{VersionId, DEFAULT_VERSION};
