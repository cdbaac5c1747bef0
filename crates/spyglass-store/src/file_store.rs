//! Connection store file I/O.
//!
//! Reads and writes `~/.spyglass/connection.json` with secure file
//! permissions (0o600). Corrupt or unreadable files degrade to "nothing
//! stored" with a warning; store trouble never reaches the host app.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::store::ConnectionStore;

/// Default connection file name.
const CONNECTION_FILE_NAME: &str = "connection.json";

/// On-disk shape of the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionData {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection_url: Option<String>,
    #[serde(default)]
    last_updated: String,
}

impl Default for ConnectionData {
    fn default() -> Self {
        Self {
            version: 1,
            client_id: None,
            connection_url: None,
            last_updated: String::new(),
        }
    }
}

/// Get the connection file path under the given data directory.
pub fn connection_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONNECTION_FILE_NAME)
}

/// Resolve the default data directory (`~/.spyglass`).
pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".spyglass")
}

/// Load connection data from file (sync).
///
/// Returns `None` if the file doesn't exist or is invalid.
fn load_connection_data(path: &Path) -> Option<ConnectionData> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("failed to read connection file: {e}");
            return None;
        }
    };

    match serde_json::from_str::<ConnectionData>(&data) {
        Ok(data) if data.version == 1 => Some(data),
        Ok(data) => {
            tracing::warn!("unsupported connection store version: {}", data.version);
            None
        }
        Err(e) => {
            tracing::warn!("failed to parse connection file: {e}");
            None
        }
    }
}

/// Save connection data to file (sync).
///
/// Creates parent directories if needed. Sets file permissions to 0o600.
fn save_connection_data(path: &Path, data: &mut ConnectionData) -> Result<(), StoreError> {
    data.last_updated = chrono::Utc::now().to_rfc3339();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, &json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }

    Ok(())
}

/// File-backed [`ConnectionStore`].
pub struct FileConnectionStore {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileConnectionStore {
    /// Store at the default path (`~/.spyglass/connection.json`).
    #[must_use]
    pub fn new() -> Self {
        Self::at_path(connection_file_path(&default_data_dir()))
    }

    /// Store at an explicit file path.
    #[must_use]
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Path this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStore for FileConnectionStore {
    fn stored_connection_url(&self) -> Option<String> {
        let _guard = self.lock.lock();
        load_connection_data(&self.path)?
            .connection_url
            .filter(|url| !url.is_empty())
    }

    fn save_connection_url(&self, url: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut data = load_connection_data(&self.path).unwrap_or_default();
        data.connection_url = Some(url.to_owned());
        save_connection_data(&self.path, &mut data)
    }

    fn clear_connection_url(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let Some(mut data) = load_connection_data(&self.path) else {
            return Ok(());
        };
        data.connection_url = None;
        save_connection_data(&self.path, &mut data)
    }

    fn client_id(&self) -> String {
        let _guard = self.lock.lock();
        let mut data = load_connection_data(&self.path).unwrap_or_default();
        if let Some(id) = data.client_id.clone().filter(|id| !id.is_empty()) {
            return id;
        }

        let id = Uuid::now_v7().to_string();
        data.client_id = Some(id.clone());
        if let Err(e) = save_connection_data(&self.path, &mut data) {
            tracing::warn!("failed to persist client id: {e}");
        }
        id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
