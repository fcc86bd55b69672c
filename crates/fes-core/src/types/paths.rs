//! Absolute path table shared with every plugin.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::env::Env;

/// Absolute paths to the source tree and the generated/temporary directories.
///
/// Serialized in camelCase because plugins read and rewrite it through the
/// `modifyPaths` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paths {
    /// Project root.
    pub cwd: PathBuf,
    /// `<cwd>/src`.
    pub abs_src_path: PathBuf,
    /// `<cwd>/src/pages`.
    pub abs_pages_path: PathBuf,
    /// Directory for generated files, `.fes` or `.fes-production` under `src`.
    pub abs_tmp_path: PathBuf,
    /// Bundle output directory.
    pub abs_output_path: PathBuf,
    /// `<cwd>/node_modules`.
    pub abs_node_modules_path: PathBuf,
}

impl Paths {
    /// Derives the default path table for a project root.
    pub fn resolve(cwd: &Path, env: Env) -> Self {
        let abs_src_path = cwd.join("src");
        let tmp_dir = if env.is_production() {
            ".fes-production"
        } else {
            ".fes"
        };

        Self {
            cwd: cwd.to_path_buf(),
            abs_pages_path: abs_src_path.join("pages"),
            abs_tmp_path: abs_src_path.join(tmp_dir),
            abs_output_path: cwd.join("dist"),
            abs_node_modules_path: cwd.join("node_modules"),
            abs_src_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_path_depends_on_env() {
        let dev = Paths::resolve(Path::new("/app"), Env::Development);
        let prod = Paths::resolve(Path::new("/app"), Env::Production);
        assert_eq!(dev.abs_tmp_path, PathBuf::from("/app/src/.fes"));
        assert_eq!(prod.abs_tmp_path, PathBuf::from("/app/src/.fes-production"));
        assert_eq!(dev.abs_output_path, PathBuf::from("/app/dist"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let paths = Paths::resolve(Path::new("/app"), Env::Development);
        let json = serde_json::to_value(&paths).unwrap();
        assert_eq!(json["absTmpPath"], serde_json::json!("/app/src/.fes"));
    }
}
