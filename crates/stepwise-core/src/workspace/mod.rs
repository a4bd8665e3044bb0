//! Per-activity scratch workspace: a fixed directory layout that is created
//! fresh for each activity invocation and torn down on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// How a [`Workspace`] should be rooted and seeded.
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    /// When `false`, the current working directory's contents are copied
    /// into the workspace before the command runs.
    pub nocopy: bool,

    /// When `true`, the workspace root is a stable local path rather than a
    /// fresh temporary directory. Used for debugging.
    pub local: bool,

    /// Root to use when `local` is set. Ignored otherwise.
    pub local_root: Option<PathBuf>,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            nocopy: false,
            local: false,
            local_root: None,
        }
    }
}

/// Errors creating or tearing down a [`Workspace`].
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy working directory contents into workspace: {0}")]
    Copy(#[source] std::io::Error),
}

/// A per-activity scratch tree with the fixed layout:
///
/// ```text
/// <root>/data/
/// <root>/store/
/// <root>/store/input/
/// <root>/store/output/
/// ```
///
/// The root is removed when this value is dropped, regardless of how control
/// leaves the scope that holds it (including panics unwinding through a
/// caller-supplied closure) — this is the Rust-idiomatic way to guarantee
/// cleanup on all exit paths.
pub struct Workspace {
    root: PathBuf,
    /// Present only for `local` workspaces, where the root must survive
    /// drop for debugging; cleanup is then the caller's responsibility.
    persistent: bool,
}

impl Workspace {
    /// Create the scratch tree for `uid` and seed it per `options`.
    ///
    /// `cwd` is the directory copied into the workspace when `!options.nocopy`
    /// — the invariant that "the command's working directory on entry equals
    /// the workspace root" is the caller's responsibility once this returns.
    pub fn enter(uid: &str, cwd: &Path, options: &WorkspaceOptions) -> Result<Self, WorkspaceError> {
        let root = if options.local {
            options
                .local_root
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join(format!("stepwise-local-{uid}")))
        } else {
            std::env::temp_dir().join(format!("stepwise-{uid}"))
        };

        for sub in ["data", "store", "store/input", "store/output"] {
            let path = root.join(sub);
            fs::create_dir_all(&path).map_err(|source| WorkspaceError::Create {
                path: path.clone(),
                source,
            })?;
        }

        if !options.nocopy {
            copy_dir_contents(cwd, &root).map_err(WorkspaceError::Copy)?;
        }

        debug!(%uid, root = %root.display(), local = options.local, "workspace entered");

        Ok(Self {
            root,
            persistent: options.local,
        })
    }

    /// The workspace root (the process's working directory on entry).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/data`.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// `<root>/store`.
    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    /// `<root>/store/input`.
    pub fn input_dir(&self) -> PathBuf {
        self.store_dir().join("input")
    }

    /// `<root>/store/output`.
    pub fn output_dir(&self) -> PathBuf {
        self.store_dir().join("output")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.persistent {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(root = %self.root.display(), error = %err, "failed to remove workspace root");
            }
        }
    }
}

fn copy_dir_contents(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry.path().strip_prefix(src).expect("walkdir yields paths under src");
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn enter_creates_fixed_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let options = WorkspaceOptions {
            nocopy: true,
            ..Default::default()
        };
        let ws = Workspace::enter("test-uid-1", tmp.path(), &options).unwrap();

        assert!(ws.data_dir().is_dir());
        assert!(ws.store_dir().is_dir());
        assert!(ws.input_dir().is_dir());
        assert!(ws.output_dir().is_dir());

        let root = ws.root().to_path_buf();
        drop(ws);
        assert!(!root.exists(), "workspace root should be removed on drop");
    }

    #[test]
    fn nocopy_false_copies_cwd_contents() {
        let cwd = tempfile::tempdir().unwrap();
        fs::write(cwd.path().join("seed.txt"), b"hello").unwrap();

        let options = WorkspaceOptions {
            nocopy: false,
            ..Default::default()
        };
        let ws = Workspace::enter("test-uid-2", cwd.path(), &options).unwrap();

        let copied = ws.root().join("seed.txt");
        assert_eq!(fs::read(copied).unwrap(), b"hello");
    }

    #[test]
    fn local_workspace_survives_drop() {
        let cwd = tempfile::tempdir().unwrap();
        let local_root = tempfile::tempdir().unwrap().into_path();

        let options = WorkspaceOptions {
            nocopy: true,
            local: true,
            local_root: Some(local_root.clone()),
        };
        let ws = Workspace::enter("test-uid-3", cwd.path(), &options).unwrap();
        let root = ws.root().to_path_buf();
        drop(ws);

        assert!(root.exists(), "local workspace must not be removed on drop");
        let _ = fs::remove_dir_all(&local_root);
    }
}
