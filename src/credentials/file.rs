use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::debug;

use super::{CredentialStore, TOKEN_KEY};
use crate::error::StoreError;

/// Directory under `$HOME` holding client state.
const STATE_DIR: &str = ".imagedrive";

/// File name of the credential document.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Owner read/write only.
#[cfg(unix)]
const CREDENTIALS_MODE: u32 = 0o600;

/// Default location of the credential file.
///
/// `$HOME/.imagedrive/credentials.json`, or `./.imagedrive/credentials.json`
/// when no home directory is known.
pub fn default_credentials_path() -> PathBuf {
    let base = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(STATE_DIR).join(CREDENTIALS_FILE)
}

/// File-backed credential store.
///
/// The file is a flat JSON object; the token is kept under [`TOKEN_KEY`] and
/// any other keys are preserved across writes. Writes go to a sibling temp
/// file which is then renamed over the original, so a reader sees either the
/// old or the new document. An in-process mutex serializes writers; the temp
/// name carries the process id so concurrent processes never share one. On
/// unix the file is readable by its owner only.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    identifier: String,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store backed by `path`. The file is created lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identifier = format!("file://{}", path.display());
        Self {
            path,
            identifier,
            lock: Mutex::new(()),
        }
    }

    /// Create a store at [`default_credentials_path`].
    pub fn at_default_location() -> Self {
        Self::new(default_credentials_path())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", self.path.display(), e))),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::Corrupt(format!(
                "{}: expected a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(StoreError::Corrupt(format!("{}: {}", self.path.display(), e))),
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        if doc.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::Io(format!("{}: {}", self.path.display(), e))),
            };
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let tmp = self.temp_path();
        Self::write_private(&tmp, &bytes).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io(format!("{}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Write `bytes` to `path` with owner-only permissions.
    fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(CREDENTIALS_MODE);
        }

        let mut file = options.open(path)?;

        // `mode` only applies on creation; a leftover temp file keeps its own.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(CREDENTIALS_MODE))?;
        }

        file.write_all(bytes)?;
        file.sync_all()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}.tmp", std::process::id()));
        PathBuf::from(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.read_document()?;

        Ok(doc
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_document()?;
        doc.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_document(&doc)?;

        debug!(store = %self.identifier, "Persisted token");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = match self.read_document() {
            Ok(doc) => doc,
            // A corrupt file cannot hold a usable token; drop it.
            Err(StoreError::Corrupt(_)) => Map::new(),
            Err(e) => return Err(e),
        };

        if doc.remove(TOKEN_KEY).is_none() && !doc.is_empty() {
            return Ok(());
        }
        self.write_document(&doc)?;

        debug!(store = %self.identifier, "Erased token");
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
