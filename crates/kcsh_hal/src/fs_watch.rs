//! Filesystem change notification
//!
//! Watches a set of files through their parent directories so that
//! replace-by-rename edits and deletions are observed as well as in-place
//! writes. Everything below the `notify` callback is delivered to a caller
//! supplied sink; this module holds no policy about what a change means.

use crate::error::{HalError, HalResult};
use notify::event::{EventKind, RemoveKind};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Event delivered to the sink of a [`FileWatch`]
#[derive(Debug, Clone)]
pub enum FileEvent {
    /// One of the watched files was modified, replaced, moved or deleted
    Changed(PathBuf),
    /// The notification facility failed; no further events will follow
    Failed(HalError),
}

/// Live subscription; dropping it stops the underlying watcher.
pub struct FileWatch {
    _watcher: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

impl FileWatch {
    /// Directories the subscription is attached to
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl std::fmt::Debug for FileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatch").field("dirs", &self.dirs).finish()
    }
}

/// Directory -> file names watched inside it
type Targets = BTreeMap<PathBuf, Vec<OsString>>;

fn group_targets(paths: &[PathBuf]) -> HalResult<Targets> {
    let mut targets = Targets::new();
    for path in paths {
        let name = path
            .file_name()
            .ok_or_else(|| HalError::invalid(&format!("not a file path: {}", path.display())))?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = std::fs::canonicalize(&parent).map_err(|e| {
            HalError::io_error("canonicalize", Some(&parent.display().to_string()), e)
        })?;
        let names = targets.entry(dir).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_os_string());
        }
    }
    Ok(targets)
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

fn matches_target(targets: &Targets, path: &Path) -> bool {
    match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => targets
            .get(dir)
            .map(|names| names.iter().any(|n| n == name))
            .unwrap_or(false),
        _ => false,
    }
}

/// Start watching `paths`, calling `sink` from the notification thread.
///
/// Fails when no path can be watched, which callers treat as the facility
/// being unavailable.
pub fn watch_files<F>(paths: &[PathBuf], sink: F) -> HalResult<FileWatch>
where
    F: Fn(FileEvent) + Send + 'static,
{
    if paths.is_empty() {
        return Err(HalError::invalid("no paths to watch"));
    }

    let targets = group_targets(paths)?;
    let callback_targets = targets.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !is_relevant(&event.kind) {
                return;
            }
            for path in &event.paths {
                if matches_target(&callback_targets, path) {
                    sink(FileEvent::Changed(path.clone()));
                    return;
                }
                if matches!(event.kind, EventKind::Remove(RemoveKind::Folder | RemoveKind::Any))
                    && callback_targets.contains_key(path)
                {
                    let dirs = vec![path.display().to_string()];
                    sink(FileEvent::Failed(HalError::watch_error(
                        "watch",
                        &dirs,
                        "watched directory was removed",
                    )));
                    return;
                }
            }
        }
        Err(err) => sink(FileEvent::Failed(err.into())),
    })?;

    for dir in targets.keys() {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(dir = %dir.display(), "watching directory");
    }

    Ok(FileWatch {
        _watcher: watcher,
        dirs: targets.into_keys().collect(),
    })
}
