//! Bounded segment history per camera.

use std::path::PathBuf;
use std::time::SystemTime;

use camsim_core::Result;

use crate::naming::SegmentNamer;

/// Delete the oldest segments owned by `namer` until at most `keep` remain.
///
/// Only files matching the camera's own naming scheme are considered, so
/// cameras sharing a folder never prune each other. Ordering is by
/// modification time, which the synthesizer sets to the segment's start.
/// Returns the removed paths.
pub fn prune(namer: &SegmentNamer, keep: usize) -> Result<Vec<PathBuf>> {
    let mut segments: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(namer.folder())? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !namer.owns(name) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let mtime = meta.modified()?;
        segments.push((mtime, entry.path()));
    }

    if segments.len() <= keep {
        return Ok(Vec::new());
    }

    // Name breaks ties between files stamped within the same second.
    segments.sort();
    let excess = segments.len() - keep;

    let mut removed = Vec::with_capacity(excess);
    for (_, path) in segments.into_iter().take(excess) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}
