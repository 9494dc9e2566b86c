//! Host-side filesystem helpers.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Recursively copy a directory tree.
///
/// Handles what `fs::copy` alone does not:
/// - nested directories
/// - symbolic links (preserved, not followed)
/// - file permissions (carried over by `fs::copy`)
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)
            .with_context(|| format!("creating directory '{}'", dst.display()))?;
    }

    for entry in
        fs::read_dir(src).with_context(|| format!("reading directory '{}'", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            let link_target = fs::read_link(&src_path)?;
            if dst_path.exists() || dst_path.is_symlink() {
                fs::remove_file(&dst_path)?;
            }
            std::os::unix::fs::symlink(&link_target, &dst_path)
                .with_context(|| format!("creating symlink '{}'", dst_path.display()))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("copying '{}'", src_path.display()))?;
        }
    }

    Ok(())
}

/// Delete `dir` if present and recreate it empty.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("removing '{}'", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("creating '{}'", dir.display()))?;
    Ok(())
}
