//! Tar archives for COPY uploads.
//!
//! [`plan_archive`] resolves COPY sources against the build context and
//! decides the entry names and the directory the archive is extracted into.
//! [`write_archive`] streams the entries into any async writer, usually one
//! half of the bounded transfer pipe.

use std::path::{Path, PathBuf};

use stevedore_core::error::{BuildError, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A single file or directory to put in the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    /// Path on the build host
    pub source: PathBuf,
    /// Path inside the archive, relative to the extraction directory
    pub name: PathBuf,
    pub is_dir: bool,
}

/// Where and what to upload for one COPY instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivePlan {
    /// Directory inside the container the archive is extracted into
    pub dest_dir: String,
    pub entries: Vec<ArchiveEntry>,
}

/// Resolve `sources` inside `context_dir` and lay them out for `dest`.
///
/// `dest` must already be absolute. A destination ending in `/` or a COPY
/// with several sources is treated as a directory; otherwise a single file
/// source is renamed to the destination's base name.
pub fn plan_archive(context_dir: &Path, sources: &[String], dest: &str) -> Result<ArchivePlan> {
    let context = context_dir.canonicalize().map_err(|e| {
        BuildError::invalid_args(
            "COPY",
            format!("invalid build context {}: {}", context_dir.display(), e),
        )
    })?;

    let resolved = sources
        .iter()
        .map(|src| resolve_source(&context, src))
        .collect::<Result<Vec<_>>>()?;

    let dest_is_dir = dest.ends_with('/') || sources.len() > 1;
    let mut entries = Vec::new();

    if !dest_is_dir && !resolved[0].is_dir() {
        let dest_path = Path::new(dest);
        let name = dest_path.file_name().ok_or_else(|| {
            BuildError::invalid_args("COPY", format!("invalid destination '{}'", dest))
        })?;
        let dest_dir = dest_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        entries.push(ArchiveEntry {
            source: resolved[0].clone(),
            name: PathBuf::from(name),
            is_dir: false,
        });
        return Ok(ArchivePlan { dest_dir, entries });
    }

    for source in &resolved {
        if source.is_dir() {
            walk_dir(source, source, &mut entries)?;
        } else {
            let name = source.file_name().ok_or_else(|| {
                BuildError::invalid_args("COPY", format!("invalid source {}", source.display()))
            })?;
            entries.push(ArchiveEntry {
                source: source.clone(),
                name: PathBuf::from(name),
                is_dir: false,
            });
        }
    }

    let trimmed = dest.trim_end_matches('/');
    let dest_dir = if trimmed.is_empty() { "/" } else { trimmed };

    Ok(ArchivePlan {
        dest_dir: dest_dir.to_string(),
        entries,
    })
}

/// Resolve a COPY source, refusing paths that leave the build context.
fn resolve_source(context: &Path, src: &str) -> Result<PathBuf> {
    let path = context.join(src.trim_start_matches('/'));
    let canonical = path.canonicalize().map_err(|_| {
        BuildError::invalid_args(
            "COPY",
            format!(
                "source not found: {} (in context {})",
                src,
                context.display()
            ),
        )
    })?;

    if !canonical.starts_with(context) {
        return Err(BuildError::invalid_args(
            "COPY",
            format!("source {} is outside the build context", src),
        ));
    }
    Ok(canonical)
}

/// Recursively collect the contents of `current`, named relative to `root`.
///
/// Symlinks are recorded as links and never descended into, so nothing
/// outside the build context is reachable through them.
fn walk_dir(root: &Path, current: &Path, entries: &mut Vec<ArchiveEntry>) -> Result<()> {
    let read_dir = std::fs::read_dir(current).map_err(|e| archive_error(current, e))?;

    let mut children = read_dir
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| archive_error(current, e))?;
    // Sort for deterministic archives
    children.sort();

    for path in children {
        let relative = path
            .strip_prefix(root)
            .map_err(|e| archive_error(&path, e))?
            .to_path_buf();
        let is_dir = std::fs::symlink_metadata(&path)
            .map_err(|e| archive_error(&path, e))?
            .is_dir();

        entries.push(ArchiveEntry {
            source: path.clone(),
            name: relative,
            is_dir,
        });

        if is_dir {
            walk_dir(root, &path, entries)?;
        }
    }
    Ok(())
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> BuildError {
    BuildError::Archive {
        instruction: "COPY".to_string(),
        source_path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Write `entries` as a tar stream into `writer` and shut it down.
///
/// Shutting the writer down is what signals end-of-archive to a pipe
/// reader; an error from a closed pipe means the consumer went away.
pub async fn write_archive<W>(entries: Vec<ArchiveEntry>, writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut builder = tokio_tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for entry in &entries {
        if entry.is_dir {
            builder.append_dir(&entry.name, &entry.source).await?;
        } else {
            builder
                .append_path_with_name(&entry.source, &entry.name)
                .await?;
        }
    }

    let mut writer = builder.into_inner().await?;
    writer.shutdown().await?;
    Ok(())
}
