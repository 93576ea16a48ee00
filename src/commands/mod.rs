//! Command handlers for the `pantry` sandbox binary.
//!
//! Each invocation loads a JSON image of a [`MemoryStore`] from disk, signs
//! the given user in, runs one operation through a real [`Session`], waits
//! for the feeds to settle, and writes the image back.

mod account;
mod categories;
mod items;
mod shortcuts;

pub use account::{cmd_members, cmd_register, cmd_status};
pub use categories::{cmd_category_add, cmd_category_ls, cmd_category_rm};
pub use items::{cmd_add, cmd_clear_completed, cmd_ls, cmd_toggle, cmd_toggle_all};
pub use shortcuts::{cmd_shortcut_add, cmd_shortcut_clear, cmd_shortcut_ls, cmd_shortcut_rm, cmd_shortcut_tap};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, PANTRY_DIR};
use crate::error::{PantryError, Result};
use crate::identity::Identity;
use crate::remote::{MemoryStore, StoreDump};
use crate::session::{Session, SessionState};

/// Default location of the sandbox store image
pub fn default_data_path() -> PathBuf {
    PathBuf::from(PANTRY_DIR).join("sandbox.json")
}

/// Global options shared by every command
#[derive(Debug, Clone)]
pub struct SandboxOptions {
    pub data: PathBuf,
    pub user: Option<String>,
    pub email: Option<String>,
}

/// A store loaded from disk plus a session over it.
pub struct Sandbox {
    path: PathBuf,
    store: Arc<MemoryStore>,
    session: Session,
    uid: String,
    email: Option<String>,
}

impl Sandbox {
    /// Load the store image and build a session. The user is not signed in yet.
    pub fn open(options: &SandboxOptions) -> Result<Self> {
        let uid = options
            .user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PantryError::Config("--user is required".to_string()))?
            .to_string();
        let config = Config::load()?;
        let store = Arc::new(load_store(&options.data)?);
        let session = Session::new(store.clone(), config);
        Ok(Self {
            path: options.data.clone(),
            store,
            session,
            uid,
            email: options.email.clone(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Sign in and wait for the first snapshots. Fails unless the user ends
    /// up bound to a group.
    pub async fn bind(&self) -> Result<()> {
        self.session
            .handle_identity(Some(Identity::new(self.uid.clone(), self.email.clone())))
            .await?;
        self.session.flush().await;
        match self.session.session_state() {
            SessionState::Bound { .. } => Ok(()),
            other => Err(PantryError::Other(format!(
                "session for '{}' is not bound ({other:?})",
                self.uid
            ))),
        }
    }

    /// Let the feeds apply the effects of the last operation.
    pub async fn settle(&self) {
        self.session.flush().await;
    }

    /// Write the store image back to disk.
    pub fn save(&self) -> Result<()> {
        save_store(&self.path, &self.store.export())
    }
}

/// Load a store image; a missing file is an empty store.
pub fn load_store(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }
    let content = fs::read_to_string(path).map_err(|e| {
        PantryError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read sandbox data at {}: {}", path.display(), e),
        ))
    })?;
    let dump: StoreDump = serde_json::from_str(&content)?;
    Ok(MemoryStore::from_dump(dump))
}

pub fn save_store(path: &Path, dump: &StoreDump) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(dump)?;
    fs::write(path, content).map_err(|e| {
        PantryError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write sandbox data at {}: {}", path.display(), e),
        ))
    })
}

/// Print a JSON value the way every command does
pub(crate) fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
