use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::fs_utils::remove_dir_if_exists;

/// Payload-irrelevant members, matched against the first path component
/// below the archive's top-level directory.
const EXCLUDED_PREFIXES: [&str; 3] = [".github", ".gitignore", ".gitattributes"];

pub(crate) fn is_excluded(rel: &Path) -> bool {
    let Some(Component::Normal(first)) = rel.components().next() else {
        return false;
    };
    let first = first.to_string_lossy();
    first == ".git"
        || EXCLUDED_PREFIXES
            .iter()
            .any(|prefix| first.starts_with(prefix))
}

struct Member {
    index: usize,
    path: PathBuf,
    is_dir: bool,
}

/// Extracts `archive_path` into a fresh `staging_dir` and renames the
/// archive's single top-level directory to `package_id`. Returns the
/// resulting package directory.
pub fn unpack_archive(archive_path: &Path, staging_dir: &Path, package_id: &str) -> Result<PathBuf> {
    remove_dir_if_exists(staging_dir)
        .with_context(|| format!("failed to remove stale staging dir: {}", staging_dir.display()))?;
    fs::create_dir_all(staging_dir)
        .with_context(|| format!("failed to create {}", staging_dir.display()))?;

    let file = fs::File::open(archive_path)
        .with_context(|| format!("failed to open archive {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("invalid zip archive: {}", archive_path.display()))?;

    let (top, members) = plan_members(&mut archive)?;

    let mut skipped = 0_usize;
    for member in members {
        let rel = member.path.strip_prefix(&top).unwrap_or(&member.path);
        if is_excluded(rel) {
            skipped += 1;
            continue;
        }
        let out_path = staging_dir.join(&member.path);
        if member.is_dir {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut entry = archive
            .by_index(member.index)
            .with_context(|| format!("failed to read archive member {}", member.path.display()))?;
        let mut out = fs::File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to extract {}", member.path.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) =
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
            {
                debug!(
                    path = %out_path.display(),
                    mode = format_args!("{:o}", mode & 0o777),
                    error = %err,
                    "failed to restore file permissions"
                );
            }
        }
    }

    let extracted = staging_dir.join(&top);
    let package_dir = staging_dir.join(package_id);
    if extracted != package_dir {
        fs::rename(&extracted, &package_dir).with_context(|| {
            format!(
                "failed to rename {} to {}",
                extracted.display(),
                package_dir.display()
            )
        })?;
    }
    debug!(
        archive = %archive_path.display(),
        skipped,
        path = %package_dir.display(),
        "unpacked archive"
    );
    Ok(package_dir)
}

/// Validates every member path and finds the shared top-level directory.
fn plan_members(archive: &mut zip::ZipArchive<fs::File>) -> Result<(OsString, Vec<Member>)> {
    let mut top: Option<OsString> = None;
    let mut members = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read archive member #{index}"))?;
        let Some(path) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(anyhow!(
                "archive member '{}' escapes the extraction directory",
                entry.name()
            ));
        };
        let mut components = path.components();
        let Some(Component::Normal(first)) = components.next() else {
            continue;
        };
        let is_dir = entry.is_dir();
        if components.next().is_none() && !is_dir {
            return Err(anyhow!(
                "archive member '{}' is not inside a top-level directory",
                entry.name()
            ));
        }

        match &top {
            Some(existing) if existing.as_os_str() != first => {
                return Err(anyhow!(
                    "archive has more than one top-level directory: '{}' and '{}'",
                    existing.to_string_lossy(),
                    first.to_string_lossy()
                ));
            }
            Some(_) => {}
            None => top = Some(first.to_os_string()),
        }

        members.push(Member {
            index,
            path,
            is_dir,
        });
    }

    let top = top.ok_or_else(|| anyhow!("archive contains no entries"))?;
    Ok((top, members))
}
