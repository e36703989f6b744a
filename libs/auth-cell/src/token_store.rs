use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use shared_models::auth::{BearerToken, TokenStore};

/// Storage key of the session token.
pub const TOKEN_KEY: &str = "token";

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<BearerToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: BearerToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<BearerToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<BearerToken> {
        self.slot().clone()
    }

    fn set(&self, token: &BearerToken) {
        *self.slot() = Some(token.clone());
    }

    fn clear(&self) {
        *self.slot() = None;
    }
}

/// Key-value JSON file on disk. The token lives under [`TOKEN_KEY`]; other
/// keys in the same file are left untouched.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Map<String, Value> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No token file at {}", self.path.display());
                return Map::new();
            }
            Err(e) => {
                warn!("Failed to read token file {}: {}", self.path.display(), e);
                return Map::new();
            }
        };

        match serde_json::from_str::<Map<String, Value>>(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                Map::new()
            }
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create token directory {}: {}", parent.display(), e);
                return;
            }
        }

        let contents = match serde_json::to_string_pretty(entries) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to serialize token file: {}", e);
                return;
            }
        };

        if let Err(e) = fs::write(&self.path, contents) {
            warn!("Failed to write token file {}: {}", self.path.display(), e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<BearerToken> {
        let _guard = self.lock();

        self.read_entries()
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|raw| !raw.is_empty())
            .map(BearerToken::from)
    }

    fn set(&self, token: &BearerToken) {
        let _guard = self.lock();

        let mut entries = self.read_entries();
        entries.insert(TOKEN_KEY.to_string(), Value::String(token.as_str().to_string()));
        self.write_entries(&entries);
    }

    fn clear(&self) {
        let _guard = self.lock();

        let mut entries = self.read_entries();
        if entries.remove(TOKEN_KEY).is_some() {
            self.write_entries(&entries);
        }
    }
}
