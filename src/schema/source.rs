//! Where schema documents come from.
//!
//! The store never touches the filesystem directly. It asks a `SchemaSource`
//! to find the document for a runner id and to hand over its current text.
//! `WorkspaceSource` is the on-disk implementation; editor integrations can
//! push unsaved buffer contents into its overlay.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;

use super::error::{SchemaError, SchemaResult};

/// Identity of a schema document (its path). Compared, never dereferenced
/// by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentId(PathBuf);

impl DocumentId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Lookup and text access for schema documents.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Find the schema document for a runner id, if any exists.
    async fn locate(&self, runner_id: &str) -> SchemaResult<Option<DocumentId>>;

    /// Current text of a located document.
    async fn read(&self, document: &DocumentId) -> SchemaResult<String>;
}

/// Schema documents under `<root>/**/<schema_dir>/<runnerId>.json`.
pub struct WorkspaceSource {
    root: PathBuf,
    schema_dir: String,
    overlay: RwLock<HashMap<DocumentId, String>>,
}

impl WorkspaceSource {
    pub fn new(root: impl Into<PathBuf>, schema_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            schema_dir: schema_dir.into(),
            overlay: RwLock::new(HashMap::new()),
        }
    }

    /// Serve `text` instead of the file contents until the document is closed.
    pub fn open_document(&self, document: DocumentId, text: String) {
        if let Ok(mut overlay) = self.overlay.write() {
            overlay.insert(document, text);
        }
    }

    pub fn close_document(&self, document: &DocumentId) {
        if let Ok(mut overlay) = self.overlay.write() {
            overlay.remove(document);
        }
    }

    fn pattern(&self, runner_id: &str) -> String {
        let base = self.root.display().to_string();
        let base = glob::Pattern::escape(base.trim_end_matches('/').trim_end_matches('\\'));
        let dir = self.schema_dir.trim_matches('/');
        format!(
            "{base}/**/{dir}/{}.json",
            glob::Pattern::escape(runner_id)
        )
    }
}

#[async_trait]
impl SchemaSource for WorkspaceSource {
    async fn locate(&self, runner_id: &str) -> SchemaResult<Option<DocumentId>> {
        let pattern = self.pattern(runner_id);
        let entries =
            glob::glob(&pattern).map_err(|e| SchemaError::InvalidPattern(format!("{pattern}: {e}")))?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!("Skipping unreadable path during schema search: {e}");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        matches.sort();

        Ok(matches.into_iter().next().map(DocumentId::new))
    }

    async fn read(&self, document: &DocumentId) -> SchemaResult<String> {
        if let Ok(overlay) = self.overlay.read() {
            if let Some(text) = overlay.get(document) {
                return Ok(text.clone());
            }
        }
        Ok(tokio::fs::read_to_string(document.path()).await?)
    }
}
