//! JSON file state store
//!
//! Layout: `{root}/{scope}/{id}.json`. Ids are escaped so any string maps to
//! a distinct, flat file name. Writes go to a temporary file that is renamed
//! over the target, so readers never see a half-written document.
//!
//! A commit stages every document as a temporary file first. Only when all
//! of them are on disk are the targets swapped in; the previous documents
//! are kept aside until the last rename succeeds and restored otherwise.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use supportbot_core::{StateBag, StateScope, StateStore, StateWrite, StoreError};

/// State stored as JSON documents under a directory
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// Open a store rooted at `root`, creating the scope directories
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        for scope in StateScope::all() {
            tokio::fs::create_dir_all(root.join(scope.as_str())).await?;
        }
        tracing::info!(root = %root.display(), "File state store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, scope: StateScope, id: &str) -> PathBuf {
        self.root
            .join(scope.as_str())
            .join(format!("{}.json", escape_id(id)))
    }
}

fn side_path(path: &Path, kind: &str) -> PathBuf {
    path.with_extension(format!("json.{}.{}", Uuid::new_v4().simple(), kind))
}

/// A document written to its temporary path, waiting to be swapped in
struct Staged {
    tmp: PathBuf,
    target: PathBuf,
    backup: Option<PathBuf>,
}

async fn discard(staged: &[Staged]) {
    for entry in staged {
        let _ = tokio::fs::remove_file(&entry.tmp).await;
    }
}

/// Undo swapped-in documents, newest first
async fn restore(swapped: &[Staged]) {
    for entry in swapped.iter().rev() {
        match &entry.backup {
            Some(backup) => {
                let _ = tokio::fs::rename(backup, &entry.target).await;
            }
            None => {
                let _ = tokio::fs::remove_file(&entry.target).await;
            }
        }
    }
}

async fn swap_in(entry: &mut Staged) -> std::io::Result<()> {
    if tokio::fs::try_exists(&entry.target).await? {
        let backup = side_path(&entry.target, "bak");
        tokio::fs::rename(&entry.target, &backup).await?;
        entry.backup = Some(backup);
    }
    if let Err(e) = tokio::fs::rename(&entry.tmp, &entry.target).await {
        if let Some(backup) = entry.backup.take() {
            let _ = tokio::fs::rename(&backup, &entry.target).await;
        }
        return Err(e);
    }
    Ok(())
}

/// Escape an id into a file stem
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `~xx`. The empty id maps to `~`.
fn escape_id(id: &str) -> String {
    if id.is_empty() {
        return "~".to_string();
    }
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("~{:02x}", byte));
        }
    }
    out
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, scope: StateScope, id: &str) -> Result<StateBag, StoreError> {
        let path = self.path_for(scope, id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StateBag::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, scope: StateScope, id: &str, bag: StateBag) -> Result<(), StoreError> {
        let path = self.path_for(scope, id);
        let bytes = serde_json::to_vec_pretty(&bag)?;

        let tmp = side_path(&path, "tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(scope = %scope, id, bytes = bytes.len(), "State written");
        Ok(())
    }

    async fn commit(&self, writes: Vec<StateWrite>) -> Result<(), StoreError> {
        let mut documents = Vec::with_capacity(writes.len());
        for write in &writes {
            documents.push(serde_json::to_vec_pretty(&write.bag)?);
        }

        let mut staged = Vec::with_capacity(writes.len());
        for (write, bytes) in writes.iter().zip(&documents) {
            let target = self.path_for(write.scope, &write.id);
            let tmp = side_path(&target, "tmp");
            if let Err(e) = tokio::fs::write(&tmp, bytes).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                discard(&staged).await;
                return Err(e.into());
            }
            staged.push(Staged {
                tmp,
                target,
                backup: None,
            });
        }

        let mut swapped: Vec<Staged> = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();
        while let Some(mut entry) = pending.next() {
            if let Err(e) = swap_in(&mut entry).await {
                let rest: Vec<Staged> = std::iter::once(entry).chain(pending).collect();
                discard(&rest).await;
                restore(&swapped).await;
                tracing::warn!(error = %e, writes = writes.len(), "State commit rolled back");
                return Err(e.into());
            }
            swapped.push(entry);
        }

        for entry in &swapped {
            if let Some(backup) = &entry.backup {
                let _ = tokio::fs::remove_file(backup).await;
            }
        }
        tracing::trace!(writes = writes.len(), "State committed");
        Ok(())
    }

    async fn delete(&self, scope: StateScope, id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(scope, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn backend(&self) -> &str {
        "file"
    }
}
