#![allow(dead_code)]

use std::fs;
use std::process::{Command, Output};
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use pantry::remote::paths;
use pantry::{Config, Identity, MemoryStore, Session};

/// Helper struct to run pantry commands in an isolated temp directory
pub struct PantryTest {
    pub temp_dir: TempDir,
    binary_path: String,
}

impl PantryTest {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        PantryTest {
            temp_dir,
            binary_path: env!("CARGO_BIN_EXE_pantry").to_string(),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(&self.binary_path)
            .args(args)
            .current_dir(self.temp_dir.path())
            .env_remove("PANTRY_CONFIG")
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute pantry command")
    }

    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "Command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    pub fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "Expected command {:?} to fail, but it succeeded",
            args
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    /// Run as `user` with `--json` and parse stdout
    pub fn run_json(&self, user: &str, args: &[&str]) -> Value {
        let mut full = vec!["--user", user, "--json"];
        full.extend_from_slice(args);
        let stdout = self.run_success(&full);
        serde_json::from_str(&stdout).expect("Failed to parse JSON output")
    }

    pub fn sandbox_exists(&self) -> bool {
        self.temp_dir
            .path()
            .join(".pantry")
            .join("sandbox.json")
            .exists()
    }

    pub fn write_config(&self, content: &str) {
        let dir = self.temp_dir.path().join(".pantry");
        fs::create_dir_all(&dir).expect("Failed to create .pantry directory");
        fs::write(dir.join("config.yaml"), content).expect("Failed to write config file");
    }
}

impl Default for PantryTest {
    fn default() -> Self {
        Self::new()
    }
}

/// Store holding group `g1` with member `u1` (Ann), and user `u2` (Bob)
/// in group `g2`.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .put_document(
            &paths::group("g1"),
            json!({"name": "Home", "createdBy": "u1", "members": ["u1"]}),
        )
        .unwrap();
    store
        .put_document(
            &paths::user("u1"),
            json!({"email": "ann@example.com", "name": "Ann", "groupId": "g1"}),
        )
        .unwrap();
    store
        .put_document(
            &paths::group("g2"),
            json!({"name": "Cabin", "createdBy": "u2", "members": ["u2"]}),
        )
        .unwrap();
    store
        .put_document(
            &paths::user("u2"),
            json!({"email": "bob@example.com", "name": "Bob", "groupId": "g2"}),
        )
        .unwrap();
    store
}

pub fn ann() -> Identity {
    Identity::new("u1", Some("ann@example.com".to_string()))
}

pub fn bob() -> Identity {
    Identity::new("u2", Some("bob@example.com".to_string()))
}

/// A session for `identity`, bound and with initial snapshots applied.
pub async fn bound_session(store: &Arc<MemoryStore>, identity: Identity) -> Session {
    let session = Session::new(store.clone(), Config::default());
    session
        .handle_identity(Some(identity))
        .await
        .expect("Failed to bind session");
    session.flush().await;
    session
}

/// Seed an item document directly, bypassing validation.
pub fn put_item(store: &MemoryStore, group_id: &str, id: &str, name: &str, category: &str, checked: bool) {
    store
        .put_document(
            &paths::items(group_id).doc(id),
            json!({
                "name": name,
                "checked": checked,
                "addedByUid": "u1",
                "category": category,
            }),
        )
        .unwrap();
}

pub fn put_category(store: &MemoryStore, group_id: &str, id: &str, name: &str) {
    store
        .put_document(&paths::categories(group_id).doc(id), json!({ "name": name }))
        .unwrap();
}
