//! Declarative target registry.
//!
//! Targets are declared in `qor-userland/build.json` as an ordered list
//! of records. The whole list is validated at load time and rejected
//! wholesale on the first malformed record; no external process is
//! spawned for a registry that does not parse.
//!
//! Declaration order is significant: builds, hooks, cleans, and deploy
//! copies all walk the registry in this order.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::env::QorEnv;
use crate::error::{Error, Result};

/// One buildable unit of the userland.
///
/// Field names match the descriptor keys used by the makefile tree
/// (`make-path`, `bin-path`, `output-path`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Display identifier, e.g. "LibC".
    pub name: String,
    /// Directory containing the target's Makefile, relative to the
    /// project root.
    #[serde(rename = "make-path")]
    pub make_path: String,
    /// Produced artifact, relative to the project root.
    #[serde(rename = "bin-path")]
    pub bin_path: String,
    /// Absolute destination inside the deployed filesystem.
    #[serde(rename = "output-path")]
    pub output_path: String,
    /// Shell actions run in order after a successful rebuild.
    #[serde(default)]
    pub postbuild: Vec<String>,
}

impl Target {
    /// Build directory on the host.
    pub fn build_dir(&self, env: &QorEnv) -> PathBuf {
        env.root().join(&self.make_path)
    }

    /// Artifact location on the host.
    pub fn artifact_path(&self, env: &QorEnv) -> PathBuf {
        env.root().join(&self.bin_path)
    }

    /// Destination of the artifact under the mounted root.
    pub fn deploy_dest(&self, mountpoint: &Path) -> PathBuf {
        mountpoint.join(self.output_path.trim_start_matches('/'))
    }
}

/// Immutable, ordered sequence of validated targets.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Vec<Target>,
}

impl TargetRegistry {
    /// Load and validate the descriptor at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let config_err = |reason: String| Error::Config {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading '{}'", path.display()))
            .map_err(|e| config_err(format!("{e:#}")))?;

        let targets: Vec<Target> =
            serde_json::from_str(&raw).map_err(|e| config_err(e.to_string()))?;

        for target in &targets {
            validate(target).map_err(|reason| config_err(reason))?;
        }

        Ok(Self { targets })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Target> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> IntoIterator for &'a TargetRegistry {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

fn validate(target: &Target) -> std::result::Result<(), String> {
    if target.name.trim().is_empty() {
        return Err("target with empty 'name'".to_string());
    }
    for (field, value) in [
        ("make-path", &target.make_path),
        ("bin-path", &target.bin_path),
        ("output-path", &target.output_path),
    ] {
        if value.trim().is_empty() {
            return Err(format!("target '{}' has empty '{}'", target.name, field));
        }
    }
    if !target.output_path.starts_with('/') {
        return Err(format!(
            "target '{}' has non-absolute 'output-path' '{}'",
            target.name, target.output_path
        ));
    }
    for (index, action) in target.postbuild.iter().enumerate() {
        if action.trim().is_empty() {
            return Err(format!(
                "target '{}' has empty postbuild action at index {}",
                target.name, index
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_descriptor(temp: &TempDir, content: &str) -> PathBuf {
        let path = temp.path().join("build.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_valid_descriptor() {
        let temp = TempDir::new().unwrap();
        let path = write_descriptor(
            &temp,
            r#"[
                {"name": "LibC", "make-path": "libc", "bin-path": "libc/bin/libc.a",
                 "output-path": "/lib/libc.a",
                 "postbuild": ["cp libc/bin/libc.a qor-userland/lib/libc.a"]},
                {"name": "Shell", "make-path": "userland/shell",
                 "bin-path": "userland/shell/bin/shell", "output-path": "/bin/shell"}
            ]"#,
        );

        let registry = TargetRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 2);

        // Declaration order is preserved.
        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["LibC", "Shell"]);

        let libc = registry.iter().next().unwrap();
        assert_eq!(libc.postbuild.len(), 1);
        assert!(registry.iter().nth(1).unwrap().postbuild.is_empty());
    }

    #[test]
    fn test_load_missing_field_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_descriptor(
            &temp,
            r#"[{"name": "LibC", "make-path": "libc", "bin-path": "libc/bin/libc.a"}]"#,
        );
        let err = TargetRegistry::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid target descriptor"));
    }

    #[test]
    fn test_load_unknown_field_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_descriptor(
            &temp,
            r#"[{"name": "LibC", "make-path": "libc", "bin-path": "b",
                "output-path": "/lib/libc.a", "makepath": "typo"}]"#,
        );
        assert!(TargetRegistry::load(&path).is_err());
    }

    #[test]
    fn test_relative_output_path_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_descriptor(
            &temp,
            r#"[{"name": "LibC", "make-path": "libc", "bin-path": "b",
                "output-path": "lib/libc.a"}]"#,
        );
        let err = TargetRegistry::load(&path).unwrap_err();
        assert!(err.to_string().contains("non-absolute"));
    }

    #[test]
    fn test_empty_postbuild_action_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_descriptor(
            &temp,
            r#"[{"name": "LibC", "make-path": "libc", "bin-path": "b",
                "output-path": "/lib/libc.a", "postbuild": ["cp a b", "  "]}]"#,
        );
        let err = TargetRegistry::load(&path).unwrap_err();
        assert!(err.to_string().contains("postbuild"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = TargetRegistry::load(Path::new("/nonexistent_path_12345/build.json"));
        assert!(matches!(result, Err(crate::error::Error::Config { .. })));
    }

    #[test]
    fn test_deploy_dest_mapping() {
        let target = Target {
            name: "LibC".into(),
            make_path: "libc".into(),
            bin_path: "libc/bin/libc.a".into(),
            output_path: "/lib/libc.a".into(),
            postbuild: vec![],
        };
        assert_eq!(
            target.deploy_dest(Path::new("/mnt")),
            PathBuf::from("/mnt/lib/libc.a")
        );
    }
}
