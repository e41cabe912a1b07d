//! Incremental build detection.
//!
//! A destination is stale when it is missing or strictly older than its
//! source. The check never runs a program, so the dev server can afford it
//! on every request.

use std::{path::Path, time::SystemTime};

/// Whether `dst` must be (re)built from `src`.
pub fn needs_build(src: &Path, dst: &Path, force: bool) -> bool {
    if force {
        return true;
    }
    let Some(dst_time) = modified(dst) else {
        return true;
    };
    // An unreadable source cannot be newer than anything.
    modified(src).is_some_and(|src_time| dst_time < src_time)
}

fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|meta| meta.modified()).ok()
}
