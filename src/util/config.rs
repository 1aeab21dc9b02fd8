//! Configuration file support for kazel.
//!
//! The configuration lives next to the workspace root, by default in
//! `.kazelcfg.json`. A `.toml` extension selects TOML instead of JSON.
//! Keys use the PascalCase spelling of the original JSON files; snake_case
//! spellings are accepted as aliases.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default configuration file name, relative to the workspace root.
pub const CONFIG_FILE: &str = ".kazelcfg.json";

/// kazel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Config {
    /// Import path prefix of the workspace's own packages
    #[serde(alias = "go_prefix")]
    pub go_prefix: String,

    /// Directories to generate Go rules for, relative to the root
    #[serde(alias = "src_dirs")]
    pub src_dirs: Vec<String>,

    /// Regexes of root-relative directories to skip
    #[serde(alias = "skipped_paths")]
    pub skipped_paths: Vec<String>,

    /// Generate `package-srcs` / `all-srcs` filegroups
    #[serde(alias = "add_sources_rules")]
    pub add_sources_rules: bool,

    /// One BUILD file per vendored package instead of `vendor/BUILD`
    #[serde(alias = "vendor_multiple_build_files")]
    pub vendor_multiple_build_files: bool,

    /// Target operating system for build constraints
    #[serde(rename = "GoOS", alias = "goos")]
    pub goos: String,

    /// Target architecture for build constraints
    #[serde(rename = "GoArch", alias = "goarch")]
    pub goarch: String,

    /// Extra satisfied build tags
    #[serde(alias = "build_tags")]
    pub build_tags: Vec<String>,

    /// Whether cgo files are buildable
    #[serde(alias = "cgo_enabled")]
    pub cgo_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            go_prefix: String::new(),
            src_dirs: vec![".".to_string()],
            skipped_paths: Vec::new(),
            add_sources_rules: false,
            vendor_multiple_build_files: false,
            goos: "linux".to_string(),
            goarch: "amd64".to_string(),
            build_tags: Vec::new(),
            cgo_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let mut config: Config = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        };

        if config.src_dirs.is_empty() {
            config.src_dirs = vec![".".to_string()];
        }
        config
            .skip_patterns()
            .with_context(|| format!("invalid SkippedPaths in {}", path.display()))?;
        Ok(config)
    }

    /// Compile the skip regexes.
    pub fn skip_patterns(&self) -> Result<Vec<Regex>> {
        self.skipped_paths
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid regex `{}`", p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.src_dirs, vec!["."]);
        assert_eq!(config.goos, "linux");
        assert_eq!(config.goarch, "amd64");
        assert!(config.cgo_enabled);
        assert!(!config.add_sources_rules);
    }

    #[test]
    fn test_config_load_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{
                "GoPrefix": "k8s.io/kubernetes",
                "SkippedPaths": ["^_.*"],
                "AddSourcesRules": true,
                "GoOS": "darwin"
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.go_prefix, "k8s.io/kubernetes");
        assert_eq!(config.skipped_paths, vec!["^_.*"]);
        assert!(config.add_sources_rules);
        assert_eq!(config.goos, "darwin");
        assert_eq!(config.src_dirs, vec!["."]);
    }

    #[test]
    fn test_config_load_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kazel.toml");
        std::fs::write(
            &path,
            r#"
go_prefix = "example.com/repo"
src_dirs = ["cmd", "pkg"]
vendor_multiple_build_files = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.go_prefix, "example.com/repo");
        assert_eq!(config.src_dirs, vec!["cmd", "pkg"]);
        assert!(config.vendor_multiple_build_files);
    }

    #[test]
    fn test_invalid_skip_regex_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"SkippedPaths": ["("]}"#).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid SkippedPaths"));
    }

    #[test]
    fn test_missing_config_names_path() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join(CONFIG_FILE)).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }
}
