//! Shared header synchronization (`update` subcommand).
//!
//! Copies the libc public headers into the userland include tree so
//! target makefiles can resolve them through `qorIncludePath`.

use anyhow::{bail, Context};

use crate::env::QorEnv;
use crate::error::{Error, Result};
use crate::fsutil::copy_dir_recursive;

/// Sync `libc/include` into `qor-userland/include/libc`.
pub fn update_headers(env: &QorEnv) -> Result<()> {
    println!("Updating Headers");

    let src = env.libc_include_dir();
    let dest = env.libc_include_dest();

    let copy = || -> anyhow::Result<()> {
        if !src.is_dir() {
            bail!("libc include tree not found at '{}'", src.display());
        }
        std::fs::create_dir_all(&dest)
            .with_context(|| format!("creating '{}'", dest.display()))?;
        copy_dir_recursive(&src, &dest)
            .with_context(|| format!("syncing headers into '{}'", dest.display()))
    };

    copy().map_err(Error::Host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_update_headers_copies_tree() {
        let temp = TempDir::new().unwrap();
        let env = QorEnv::new(temp.path().to_path_buf());

        fs::create_dir_all(temp.path().join("libc/include/sys")).unwrap();
        fs::write(temp.path().join("libc/include/stdio.h"), "// stdio").unwrap();
        fs::write(temp.path().join("libc/include/sys/types.h"), "// types").unwrap();

        update_headers(&env).unwrap();

        let dest = temp.path().join("qor-userland/include/libc");
        assert!(dest.join("stdio.h").is_file());
        assert!(dest.join("sys/types.h").is_file());
    }

    #[test]
    fn test_update_headers_overwrites_stale_copy() {
        let temp = TempDir::new().unwrap();
        let env = QorEnv::new(temp.path().to_path_buf());

        fs::create_dir_all(temp.path().join("libc/include")).unwrap();
        fs::write(temp.path().join("libc/include/stdio.h"), "new").unwrap();

        let dest = temp.path().join("qor-userland/include/libc");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stdio.h"), "old").unwrap();

        update_headers(&env).unwrap();

        assert_eq!(fs::read_to_string(dest.join("stdio.h")).unwrap(), "new");
    }

    #[test]
    fn test_update_headers_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let env = QorEnv::new(temp.path().to_path_buf());

        let result = update_headers(&env);
        assert!(matches!(result, Err(Error::Host(_))));
    }
}
