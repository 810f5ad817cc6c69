use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Storage;

const APP_DIR: &str = env!("CARGO_PKG_NAME");

/// One JSON file per key inside a session-scoped directory.
///
/// The default directory sits under `$XDG_RUNTIME_DIR`, which the system
/// wipes when the user's last login session ends, so stored tokens share the
/// lifetime of the session rather than the disk.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    pub fn new(directory: PathBuf) -> Result<Self, String> {
        create_private_dir(&directory)?;
        Ok(FileStorage { directory })
    }

    /// Storage in the per-user runtime directory.
    pub fn in_runtime_dir() -> Result<Self, String> {
        Self::new(runtime_dir())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn item_path(&self, key: &str) -> Result<PathBuf, String> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(format!("Invalid storage key '{}'", key));
        }
        Ok(self.directory.join(format!("{}.json", key)))
    }
}

/// `$XDG_RUNTIME_DIR/dashauth`, or a per-user directory under the system
/// temp dir when no runtime dir is available.
pub fn runtime_dir() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(APP_DIR),
        _ => {
            let user = std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "default".to_string());
            std::env::temp_dir().join(format!("{}-{}", APP_DIR, user))
        }
    }
}

fn create_private_dir(directory: &Path) -> Result<(), String> {
    fs::create_dir_all(directory)
        .map_err(|e| format!("Failed to create directory {}: {}", directory.display(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(directory, fs::Permissions::from_mode(0o700)).map_err(|e| {
            format!(
                "Failed to restrict permissions on {}: {}",
                directory.display(),
                e
            )
        })?;
    }

    Ok(())
}

fn write_private_file(path: &Path, contents: &str) -> Result<(), String> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| format!("Failed to open {} for writing: {}", path.display(), e))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| format!("Failed to write to {}: {}", path.display(), e))
}

impl Storage for FileStorage {
    fn get_name(&self) -> &str {
        "session-file"
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, String> {
        let path = self.item_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), String> {
        let path = self.item_path(key)?;
        let staging = path.with_extension("json.tmp");

        write_private_file(&staging, value)?;
        // rename(2) replaces the target atomically on the same filesystem.
        fs::rename(&staging, &path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            format!("Failed to replace {}: {}", path.display(), e)
        })?;
        debug!("Stored item '{}' at {}", key, path.display());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), String> {
        let path = self.item_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("Failed to remove {}: {}", path.display(), e)),
        }
    }
}
