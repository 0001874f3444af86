//! Durable registry on the local filesystem.
//!
//! # Layout
//!
//! ```text
//! {root}/
//!   {store-name}/
//!     {sha256(identifier)}.json   # status, headers, base64 body, stored_at
//! ```
//!
//! Entries are written to a uniquely named temp file and renamed into place,
//! so readers only ever see a complete entry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use super::{StoreRegistry, VersionStore};
use crate::error::{StoreError, StoreResult};
use crate::request::Identifier;
use crate::response::StoredResponse;

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    identifier: Identifier,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    stored_at: DateTime<Utc>,
}

impl EntryRecord {
    fn from_stored(response: &StoredResponse) -> Self {
        Self {
            identifier: response.identifier.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body: BASE64.encode(&response.body),
            stored_at: response.stored_at,
        }
    }

    fn into_stored(self) -> StoreResult<StoredResponse> {
        let body = BASE64.decode(&self.body).map_err(|e| StoreError::Corrupt {
            identifier: self.identifier.to_string(),
            message: format!("invalid body encoding: {}", e),
        })?;
        Ok(StoredResponse {
            identifier: self.identifier,
            status: self.status,
            headers: self.headers,
            body,
            stored_at: self.stored_at,
        })
    }
}

/// Directory names keep `[A-Za-z0-9._-]` and percent-encode everything else.
fn encode_store_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            b'.' if !out.is_empty() => out.push('.'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Inverse of [`encode_store_name`]. Directory names that encoding could not
/// have produced are rejected, so every listed name maps back to its own
/// directory.
fn decode_store_name(dir_name: &str) -> Option<String> {
    let name = percent_decode(dir_name)?;
    (encode_store_name(&name) == dir_name).then_some(name)
}

fn percent_decode(dir_name: &str) -> Option<String> {
    let bytes = dir_name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = dir_name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn entry_file_name(identifier: &Identifier) -> String {
    let digest = Sha256::digest(identifier.as_str().as_bytes());
    format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION)
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
}

fn map_io(e: std::io::Error) -> StoreError {
    let unavailable = matches!(
        e.kind(),
        ErrorKind::PermissionDenied
            | ErrorKind::StorageFull
            | ErrorKind::FilesystemQuotaExceeded
            | ErrorKind::ReadOnlyFilesystem
    );
    if unavailable {
        StoreError::Unavailable {
            message: e.to_string(),
        }
    } else {
        StoreError::Io(e)
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> StoreResult<()> {
    // Unique temp name so concurrent writers of one identifier never share a file
    let temp_path = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));

    if let Err(e) = fs::write(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(map_io(e));
    }
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(map_io(e));
    }
    Ok(())
}

/// Registry rooted at a directory. Clones share the same root.
#[derive(Debug, Clone)]
pub struct FsRegistry {
    root: PathBuf,
}

impl FsRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> PathBuf {
        self.root.join(encode_store_name(name))
    }
}

#[derive(Debug, Clone)]
pub struct FsStore {
    name: String,
    dir: PathBuf,
}

impl FsStore {
    fn entry_path(&self, identifier: &Identifier) -> PathBuf {
        self.dir.join(entry_file_name(identifier))
    }

    async fn entry_paths(&self) -> StoreResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(map_io(e)),
        };
        while let Some(entry) = dir.next_entry().await.map_err(map_io)? {
            let path = entry.path();
            if is_entry_file(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn read_record(&self, path: &Path) -> StoreResult<Option<EntryRecord>> {
        let contents = match fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_io(e)),
        };
        let record: EntryRecord =
            serde_json::from_slice(&contents).map_err(|e| StoreError::Corrupt {
                identifier: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(record))
    }
}

#[async_trait]
impl StoreRegistry for FsRegistry {
    type Store = FsStore;

    async fn open(&self, name: &str) -> StoreResult<FsStore> {
        let dir = self.store_dir(name);
        fs::create_dir_all(&dir).await.map_err(map_io)?;
        Ok(FsStore {
            name: name.to_string(),
            dir,
        })
    }

    async fn list_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(map_io(e)),
        };
        while let Some(entry) = dir.next_entry().await.map_err(map_io)? {
            if !entry.file_type().await.map_err(map_io)?.is_dir() {
                continue;
            }
            let dir_name = entry.file_name();
            match dir_name.to_str().and_then(decode_store_name) {
                Some(name) => names.push(name),
                None => debug!(dir = ?dir_name, "Skipping directory that is not a store"),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        match fs::remove_dir_all(self.store_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io(e)),
        }
    }
}

#[async_trait]
impl VersionStore for FsStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, identifier: &Identifier) -> StoreResult<Option<StoredResponse>> {
        match self.read_record(&self.entry_path(identifier)).await? {
            Some(record) => record.into_stored().map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, response: StoredResponse) -> StoreResult<()> {
        let record = EntryRecord::from_stored(&response);
        let contents = serde_json::to_vec(&record).map_err(|e| StoreError::Corrupt {
            identifier: response.identifier.to_string(),
            message: e.to_string(),
        })?;
        // The store may have been pruned since it was opened
        fs::create_dir_all(&self.dir).await.map_err(map_io)?;
        write_atomic(&self.entry_path(&response.identifier), &contents).await?;
        debug!(store = %self.name, identifier = %response.identifier, "Stored entry");
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<Identifier>> {
        let mut keys = Vec::new();
        for path in self.entry_paths().await? {
            if let Some(record) = self.read_record(&path).await? {
                keys.push(record.identifier);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.entry_paths().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_encoding_round_trips() {
        for name in ["offcache-v1.2.0", "app v2", "../escape", "café"] {
            let encoded = encode_store_name(name);
            assert!(!encoded.contains('/'));
            assert!(!encoded.starts_with('.'));
            assert_eq!(decode_store_name(&encoded).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_foreign_directory_names_are_not_stores() {
        for dir_name in [".old", "cache~old", "app%2fv1", "app%2", "%zz"] {
            assert_eq!(decode_store_name(dir_name), None, "{dir_name}");
        }
    }

    #[test]
    fn test_storage_exhaustion_is_unavailable() {
        for kind in [
            ErrorKind::PermissionDenied,
            ErrorKind::StorageFull,
            ErrorKind::ReadOnlyFilesystem,
        ] {
            let err = map_io(std::io::Error::from(kind));
            assert!(matches!(err, StoreError::Unavailable { .. }), "{kind:?}");
        }
        assert!(matches!(
            map_io(std::io::Error::from(ErrorKind::InvalidData)),
            StoreError::Io(_)
        ));
    }

    #[test]
    fn test_plain_names_are_unchanged() {
        assert_eq!(encode_store_name("offcache-v1.2.0"), "offcache-v1.2.0");
    }

    #[test]
    fn test_entry_file_name_is_stable() {
        let a = entry_file_name(&Identifier::new("/index.html"));
        let b = entry_file_name(&Identifier::new("/index.html"));
        assert_eq!(a, b);
        assert!(a.ends_with(".json"));
        assert_ne!(a, entry_file_name(&Identifier::new("/other.html")));
    }
}
