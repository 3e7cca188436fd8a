// 💾 Persistence - the whole dataset lives in one document
//
// Backends only know how to load and replace that document. The record store decides
// when to save and how failures are handled.

use crate::error::Result;
use crate::records::Dataset;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Address of the dataset document: `<collection>/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKey {
    pub collection: String,
    pub name: String,
}

impl DocumentKey {
    pub fn new(collection: &str, name: &str) -> Self {
        DocumentKey {
            collection: collection.to_string(),
            name: name.to_string(),
        }
    }
}

pub trait DocumentStore: Send {
    /// `Ok(None)` when the document has never been written
    fn load(&self) -> Result<Option<Dataset>>;

    /// Replace the stored document with `dataset`
    fn save(&self, dataset: &Dataset) -> Result<()>;

    fn describe(&self) -> String;
}

// ============================================================================
// JSON FILE BACKEND
// ============================================================================

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Document stored at `<data_dir>/<collection>/<name>.json`
    pub fn new(data_dir: &Path, key: DocumentKey) -> Self {
        let path = data_dir
            .join(&key.collection)
            .join(format!("{}.json", key.name));
        JsonFileStore { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Option<Dataset>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let dataset = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "dataset loaded");
        Ok(Some(dataset))
    }

    fn save(&self, dataset: &Dataset) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write next to the target and rename so readers never see half a document
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(dataset)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "dataset saved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}
