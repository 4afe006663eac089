//! Local path to object key mapping.
//!
//! Keys are built structurally from path components. Only the leading
//! relative segment is compared with the resolved content name, so a name that
//! happens to reappear deeper in the tree (or inside a file name) is left alone.

use std::path::{Component, Path};

use torunnel_config::normalize_prefix;

use crate::error::{FsOpsError, FsOpsResult};

/// Derive the object key for `local_file`.
///
/// `anchor` is the directory the transfer wrote into; the path relative to it
/// has its leading segment replaced by `logical_segment` when that segment
/// equals `resolved_name`. The result is prefixed with the normalised
/// `namespace_prefix` and uses `/` as its only separator.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] when `local_file` is not under
/// `anchor`, is not valid UTF-8, or when `logical_segment` is empty or
/// traverses upwards.
pub fn map_key(
    local_file: &Path,
    anchor: &Path,
    resolved_name: &str,
    logical_segment: &str,
    namespace_prefix: &str,
) -> FsOpsResult<String> {
    let relative = local_file.strip_prefix(anchor).map_err(|_| {
        FsOpsError::invalid_input(
            "local_path",
            "outside_anchor",
            local_file.to_string_lossy(),
        )
    })?;

    let mut segments = relative_segments(relative)?;
    if segments.is_empty() {
        return Err(FsOpsError::invalid_input(
            "local_path",
            "is_anchor",
            local_file.to_string_lossy(),
        ));
    }

    if segments[0] == resolved_name {
        let mut mapped = logical_segments(logical_segment)?;
        mapped.extend(segments.into_iter().skip(1));
        segments = mapped;
    }

    Ok(format!(
        "{}{}",
        normalize_prefix(namespace_prefix),
        segments.join("/")
    ))
}

fn relative_segments(relative: &Path) -> FsOpsResult<Vec<String>> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    FsOpsError::invalid_input("local_path", "non_utf8", part.to_string_lossy())
                })?;
                segments.extend(split_segments(part).map(str::to_string));
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FsOpsError::invalid_input(
                    "local_path",
                    "not_relative",
                    relative.to_string_lossy(),
                ));
            }
        }
    }
    Ok(segments)
}

fn logical_segments(logical_segment: &str) -> FsOpsResult<Vec<String>> {
    let segments: Vec<String> = split_segments(logical_segment)
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        return Err(FsOpsError::invalid_input(
            "logical_segment",
            "must_not_be_empty",
            logical_segment,
        ));
    }
    if segments.iter().any(|segment| segment == "..") {
        return Err(FsOpsError::invalid_input(
            "logical_segment",
            "must_not_traverse",
            logical_segment,
        ));
    }
    Ok(segments)
}

fn split_segments(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
}

/// Check a user-supplied logical path before any work starts.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] when the segment is empty or contains `..`.
pub fn validate_logical_segment(logical_segment: &str) -> FsOpsResult<()> {
    logical_segments(logical_segment).map(|_| ())
}
