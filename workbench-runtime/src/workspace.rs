//! Per-session project workspaces.
//!
//! Each compile request gets a UUID-keyed directory under the workspace
//! root containing a generated Stylus project skeleton plus the user's
//! source. A workspace is exclusively owned by its session; deploy and
//! ABI export reuse it until the sweep removes it.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::config::WorkbenchConfig;
use crate::error::{Result, WorkbenchError};
use crate::templates;

/// A single file of a submitted multi-file project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
}

/// Sessions with a request currently running against their workspace.
/// The sweep never removes these, whatever their directory age.
static IN_FLIGHT: Lazy<DashMap<String, u64>> = Lazy::new(DashMap::new);

pub fn is_in_flight(session_id: &str) -> bool {
    IN_FLIGHT.contains_key(session_id)
}

/// Marks a session in-flight for its lifetime. When `remove_on_drop` is
/// still set at drop time the workspace directory is deleted as well,
/// the guaranteed-release path for requests that fail before the
/// workspace becomes useful to a later deploy.
pub struct SessionGuard {
    session_id: String,
    remove_on_drop: bool,
}

impl SessionGuard {
    pub fn begin(session_id: &str) -> Self {
        IN_FLIGHT.insert(session_id.to_string(), crate::util::now_ts());
        Self {
            session_id: session_id.to_string(),
            remove_on_drop: true,
        }
    }

    /// Retain the workspace past this request (deploy/export need it).
    pub fn keep(&mut self) {
        self.remove_on_drop = false;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        IN_FLIGHT.remove(&self.session_id);
        if self.remove_on_drop {
            let path = workspace_path(&self.session_id);
            if let Err(err) = std::fs::remove_dir_all(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove workspace {}: {err}", self.session_id);
                }
            }
        }
    }
}

pub fn workspace_path(session_id: &str) -> PathBuf {
    WorkbenchConfig::load().workspace_root.join(session_id)
}

fn path_in(root: &Path, session_id: &str) -> PathBuf {
    root.join(session_id)
}

/// Reject project paths that could escape the workspace.
fn validate_relative(path: &str) -> Result<PathBuf> {
    let rel = Path::new(path.trim_start_matches("./"));
    if rel.as_os_str().is_empty() {
        return Err(WorkbenchError::Validation("Empty project file path".into()));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(WorkbenchError::Validation(format!(
                    "Invalid project file path: {path}"
                )));
            }
        }
    }
    Ok(rel.to_path_buf())
}

async fn write_scaffold(project: &Path, src: &Path) -> Result<()> {
    tokio::fs::write(project.join("Cargo.toml"), templates::CARGO_TOML).await?;
    tokio::fs::write(
        project.join("rust-toolchain.toml"),
        templates::RUST_TOOLCHAIN_TOML,
    )
    .await?;
    tokio::fs::write(src.join("main.rs"), templates::MAIN_RS).await?;
    tokio::fs::write(project.join(".gitignore"), templates::GITIGNORE).await?;
    Ok(())
}

/// Scaffold a fresh workspace and write `source` as `src/lib.rs`.
pub async fn create(session_id: &str, source: &str) -> Result<PathBuf> {
    let config = WorkbenchConfig::load();
    create_in(&config.workspace_root, session_id, source).await
}

pub async fn create_in(root: &Path, session_id: &str, source: &str) -> Result<PathBuf> {
    let project = path_in(root, session_id);
    let src = project.join("src");
    tokio::fs::create_dir_all(&src).await?;
    write_scaffold(&project, &src).await?;
    tokio::fs::write(src.join("lib.rs"), source).await?;
    Ok(project)
}

/// Scaffold a workspace from a submitted multi-file project. Files the
/// submission does not provide (manifest, toolchain pin, entrypoint)
/// come from the embedded templates.
pub async fn create_multi(session_id: &str, files: &[ProjectFile]) -> Result<PathBuf> {
    let config = WorkbenchConfig::load();
    create_multi_in(&config.workspace_root, session_id, files).await
}

pub async fn create_multi_in(
    root: &Path,
    session_id: &str,
    files: &[ProjectFile],
) -> Result<PathBuf> {
    if files.is_empty() {
        return Err(WorkbenchError::Validation("No project files given".into()));
    }

    let project = path_in(root, session_id);
    let src = project.join("src");
    tokio::fs::create_dir_all(&src).await?;
    write_scaffold(&project, &src).await?;

    for file in files {
        let rel = validate_relative(&file.path)?;
        let dest = project.join(rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &file.content).await?;
    }
    Ok(project)
}

pub async fn exists(session_id: &str) -> bool {
    exists_in(&WorkbenchConfig::load().workspace_root, session_id).await
}

pub async fn exists_in(root: &Path, session_id: &str) -> bool {
    tokio::fs::metadata(path_in(root, session_id))
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Delete a session workspace. Idempotent; absent is not an error.
pub async fn remove(session_id: &str) -> Result<()> {
    remove_in(&WorkbenchConfig::load().workspace_root, session_id).await
}

pub async fn remove_in(root: &Path, session_id: &str) -> Result<()> {
    match tokio::fs::remove_dir_all(path_in(root, session_id)).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Remove every workspace whose mtime is older than `max_age_minutes`.
/// Individual failures are logged and skipped; returns the number removed.
pub fn sweep(max_age_minutes: u64) -> usize {
    sweep_in(
        &WorkbenchConfig::load().workspace_root,
        Duration::from_secs(max_age_minutes * 60),
    )
}

pub fn sweep_in(root: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        // No workspace root yet means nothing to sweep.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!("sweep: failed to read workspace root: {err}");
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let session_id = entry.file_name().to_string_lossy().to_string();
        if is_in_flight(&session_id) {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok());
        let stale = matches!(age, Some(age) if age > max_age);
        if !stale {
            continue;
        }

        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                info!("sweep: removed stale workspace {session_id}");
                removed += 1;
            }
            Err(err) => warn!("sweep: failed to remove {session_id}: {err}"),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let project = create_in(root, "session-a", "pub fn main() {}").await.unwrap();
        assert!(project.join("Cargo.toml").is_file());
        assert!(project.join("rust-toolchain.toml").is_file());
        assert!(project.join("src/lib.rs").is_file());
        assert!(project.join("src/main.rs").is_file());
        assert!(exists_in(root, "session-a").await);

        remove_in(root, "session-a").await.unwrap();
        assert!(!exists_in(root, "session-a").await);

        // Second remove is a no-op, not an error.
        remove_in(root, "session-a").await.unwrap();
    }

    #[tokio::test]
    async fn multi_file_create_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            ProjectFile {
                path: "src/lib.rs".into(),
                content: "// lib".into(),
            },
            ProjectFile {
                path: "src/utils/math.rs".into(),
                content: "// math".into(),
            },
        ];

        let project = create_multi_in(dir.path(), "session-b", &files)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(project.join("src/lib.rs")).unwrap(),
            "// lib"
        );
        assert!(project.join("src/utils/math.rs").is_file());
        // Scaffold files still present alongside the submission.
        assert!(project.join("Cargo.toml").is_file());
    }

    #[tokio::test]
    async fn multi_file_create_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![ProjectFile {
            path: "../outside.rs".into(),
            content: "bad".into(),
        }];

        let err = create_multi_in(dir.path(), "session-c", &files)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
    }

    #[test]
    fn sweep_removes_only_stale_directories() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("stale-session");
        let fresh = dir.path().join("fresh-session");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::create_dir_all(&fresh).unwrap();

        // Push the stale directory's mtime 31 minutes into the past.
        let past = SystemTime::now() - Duration::from_secs(31 * 60);
        let times = std::fs::FileTimes::new().set_modified(past);
        std::fs::File::open(&stale).unwrap().set_times(times).unwrap();

        let removed = sweep_in(dir.path(), Duration::from_secs(30 * 60));
        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn sweep_of_missing_root_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        assert_eq!(sweep_in(&missing, Duration::from_secs(60)), 0);
    }

    #[test]
    fn in_flight_sessions_survive_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let session = "guarded-session";
        let path = dir.path().join(session);
        std::fs::create_dir_all(&path).unwrap();

        let past = SystemTime::now() - Duration::from_secs(120 * 60);
        let times = std::fs::FileTimes::new().set_modified(past);
        std::fs::File::open(&path).unwrap().set_times(times).unwrap();

        IN_FLIGHT.insert(session.to_string(), crate::util::now_ts());
        let removed = sweep_in(dir.path(), Duration::from_secs(30 * 60));
        IN_FLIGHT.remove(session);

        assert_eq!(removed, 0);
        assert!(path.exists());
    }
}
