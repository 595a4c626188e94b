//! Configuration for dailybatch.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (`--config`, `--log-dir`, `--profile`)
//! 2. Environment variables (DAILYBATCH_CONFIG, DAILYBATCH_LOG_DIR, DAILYBATCH_PROFILE)
//! 3. Config file (.dailybatch/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .dailybatch/config.yaml
//! - Falls back to ~/.dailybatch/config.yaml
//! - Relative paths in the file resolve against the project root (the
//!   parent of `.dailybatch/`), or the file's own directory otherwise

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::WorkerSettings;
use crate::domain::Catalog;

/// Directory holding the config file
pub const CONFIG_DIR: &str = ".dailybatch";

/// Config file name inside `CONFIG_DIR`
pub const CONFIG_FILE: &str = "config.yaml";

pub const ENV_CONFIG: &str = "DAILYBATCH_CONFIG";
pub const ENV_LOG_DIR: &str = "DAILYBATCH_LOG_DIR";
pub const ENV_PROFILE: &str = "DAILYBATCH_PROFILE";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    /// Directory for per-day logs and lock files
    pub log_dir: Option<String>,
    /// Profile used when none is requested
    pub default_profile: Option<String>,
    pub worker: WorkerConfig,
    /// Named, ordered process type catalogs
    #[serde(default)]
    pub profiles: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<String>,
    /// 0 disables the per-step deadline
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,
}

fn default_step_timeout() -> u64 {
    7200
} // 2 hours

/// Settings read from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub config: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub profile: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            config: var(ENV_CONFIG).map(PathBuf::from),
            log_dir: var(ENV_LOG_DIR).map(PathBuf::from),
            profile: var(ENV_PROFILE),
        }
    }
}

/// Resolved configuration with absolute paths and validated catalogs
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Path to the config file that was loaded
    pub config_file: PathBuf,
    /// Schema version declared by the file
    pub version: String,
    /// Directory for batch_<date>.log and batch_<date>.lock
    pub log_dir: PathBuf,
    /// How to launch the worker
    pub worker: WorkerSettings,
    /// Validated catalogs by profile name
    pub profiles: BTreeMap<String, Catalog>,
    /// Profile used when none is requested
    pub default_profile: Option<String>,
}

impl ResolvedConfig {
    /// Locate and load configuration (explicit path, env, then discovery)
    pub fn load(explicit: Option<&Path>, env: &EnvOverrides) -> Result<Self> {
        let path = match explicit.or(env.config.as_deref()) {
            Some(path) => path.to_path_buf(),
            None => find_config_file().with_context(|| {
                format!(
                    "No configuration found. Create {}/{} or pass --config",
                    CONFIG_DIR, CONFIG_FILE
                )
            })?,
        };

        Self::from_file(&path, env)
    }

    /// Load a specific config file
    pub fn from_file(path: &Path, env: &EnvOverrides) -> Result<Self> {
        let config = load_config_file(path)?;
        Self::resolve(config, path, env)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn resolve(config: ConfigFile, config_path: &Path, env: &EnvOverrides) -> Result<Self> {
        let base_dir = base_directory(config_path);

        let log_dir = if let Some(ref dir) = env.log_dir {
            dir.clone()
        } else if let Some(ref dir) = config.log_dir {
            resolve_path(&base_dir, dir)
        } else {
            base_dir.join("logs")
        };

        if config.worker.program.trim().is_empty() {
            anyhow::bail!("worker.program cannot be empty");
        }

        let mut worker = WorkerSettings::new(config.worker.program.trim());
        if let Some(args) = config.worker.args {
            worker = worker.with_args(args);
        }
        if let Some(ref dir) = config.worker.working_dir {
            worker = worker.with_working_dir(resolve_path(&base_dir, dir));
        }
        if config.worker.step_timeout_seconds > 0 {
            worker = worker.with_step_timeout(Duration::from_secs(config.worker.step_timeout_seconds));
        }

        let mut profiles = BTreeMap::new();
        for (name, names) in config.profiles {
            let catalog = Catalog::from_names(&names)
                .with_context(|| format!("Invalid profile '{}'", name))?;
            profiles.insert(name, catalog);
        }

        if let Some(ref name) = config.default_profile {
            if !profiles.contains_key(name) {
                anyhow::bail!("Default profile '{}' is not defined", name);
            }
        }
        // An env profile is only checked when a catalog is selected, so
        // `profiles` still works with a stale DAILYBATCH_PROFILE
        let default_profile = env.profile.clone().or(config.default_profile);

        Ok(Self {
            config_file: config_path.to_path_buf(),
            version: config.version,
            log_dir,
            worker,
            profiles,
            default_profile,
        })
    }

    /// Pick a catalog: explicit profile, then the default, then the only one
    pub fn select_catalog(&self, profile: Option<&str>) -> Result<(&str, &Catalog)> {
        let name = match profile.or(self.default_profile.as_deref()) {
            Some(name) => name,
            None if self.profiles.len() == 1 => self
                .profiles
                .keys()
                .next()
                .map(String::as_str)
                .unwrap_or_default(),
            None if self.profiles.is_empty() => {
                anyhow::bail!("No profiles configured; pass --process-types")
            }
            None => anyhow::bail!(
                "Several profiles configured ({}); choose one with --profile",
                self.profile_names().join(", ")
            ),
        };

        self.profiles
            .get_key_value(name)
            .map(|(name, catalog)| (name.as_str(), catalog))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Profile '{}' not found. Available: {}",
                    name,
                    self.profile_names().join(", ")
                )
            })
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse config YAML content
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    serde_yaml::from_str(content).context("Failed to parse config YAML")
}

/// Directory that relative paths in a config file are resolved against
fn base_directory(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));

    // .dailybatch/config.yaml resolves against the project root
    if parent.file_name().map(|n| n == CONFIG_DIR).unwrap_or(false) {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Resolve a path that may be relative to the config base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const EXAMPLE_CONFIG: &str = include_str!("../config/dailybatch.example.yaml");

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", content).unwrap();
        config_path
    }

    #[test]
    fn test_example_config_catalogs() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), EXAMPLE_CONFIG);

        let config = ResolvedConfig::from_file(&path, &EnvOverrides::default()).unwrap();

        assert_eq!(config.profile_names(), vec!["catalog-a", "catalog-b"]);
        assert_eq!(
            config.profiles["catalog-a"].to_string(),
            "DELETE_OLDDATA, RECEIVE_UNIVERSE, RECEIVE_ACCOUNT, RECEIVE_CUSTMERFND"
        );
        assert_eq!(config.profiles["catalog-b"].len(), 8);
        assert_eq!(
            config.profiles["catalog-b"].as_slice().last().unwrap().as_str(),
            "SEND_MP_INFO_EOF"
        );
    }

    #[test]
    fn test_paths_resolve_against_project_root() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
log_dir: var/log
worker:
  program: python3
  working_dir: worker
"#,
        );

        let config = ResolvedConfig::from_file(&path, &EnvOverrides::default()).unwrap();

        assert_eq!(config.log_dir, temp.path().join("var/log"));
        assert_eq!(config.worker.working_dir, Some(temp.path().join("worker")));
        assert_eq!(config.worker.step_timeout, Some(Duration::from_secs(7200)));
        assert_eq!(config.worker.args, WorkerSettings::new("python3").args);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = parse_config(
            r#"
version: "1.0"
worker:
  program: ./run.sh
  step_timeout_seconds: 0
"#,
        )
        .unwrap();
        let resolved =
            ResolvedConfig::resolve(config, Path::new("/etc/dailybatch.yaml"), &EnvOverrides::default())
                .unwrap();

        assert_eq!(resolved.worker.step_timeout, None);
        assert_eq!(resolved.log_dir, PathBuf::from("/etc/logs"));
    }

    #[test]
    fn test_env_overrides() {
        let config = parse_config(EXAMPLE_CONFIG).unwrap();
        let env = EnvOverrides {
            config: None,
            log_dir: Some(PathBuf::from("/var/log/batch")),
            profile: Some("catalog-b".to_string()),
        };

        let resolved = ResolvedConfig::resolve(config, Path::new("/srv/batch.yaml"), &env).unwrap();

        assert_eq!(resolved.log_dir, PathBuf::from("/var/log/batch"));
        let (name, catalog) = resolved.select_catalog(None).unwrap();
        assert_eq!(name, "catalog-b");
        assert_eq!(catalog.as_slice()[0].as_str(), "RECEIVE_UNIVERSE");
    }

    #[test]
    fn test_unknown_env_profile_fails_only_on_selection() {
        let config = parse_config(EXAMPLE_CONFIG).unwrap();
        let env = EnvOverrides {
            profile: Some("catalog-z".to_string()),
            ..Default::default()
        };

        let resolved = ResolvedConfig::resolve(config, Path::new("/srv/batch.yaml"), &env).unwrap();

        assert_eq!(resolved.profile_names(), vec!["catalog-a", "catalog-b"]);
        let err = resolved.select_catalog(None).unwrap_err();
        assert!(err.to_string().contains("Profile 'catalog-z' not found"));
        assert_eq!(resolved.select_catalog(Some("catalog-a")).unwrap().0, "catalog-a");
    }

    #[test]
    fn test_invalid_profiles_rejected() {
        let duplicate = parse_config(
            r#"
version: "1.0"
worker:
  program: python3
profiles:
  broken: [RECEIVE_UNIVERSE, RECEIVE_UNIVERSE]
"#,
        )
        .unwrap();
        let err = ResolvedConfig::resolve(duplicate, Path::new("/x/c.yaml"), &EnvOverrides::default())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("appears more than once"));

        let empty = parse_config(
            r#"
version: "1.0"
worker:
  program: python3
profiles:
  nothing: []
"#,
        )
        .unwrap();
        assert!(ResolvedConfig::resolve(empty, Path::new("/x/c.yaml"), &EnvOverrides::default()).is_err());

        let missing_default = parse_config(
            r#"
version: "1.0"
default_profile: nope
worker:
  program: python3
profiles:
  only: [SEND_REPORT]
"#,
        )
        .unwrap();
        assert!(
            ResolvedConfig::resolve(missing_default, Path::new("/x/c.yaml"), &EnvOverrides::default())
                .is_err()
        );
    }

    #[test]
    fn test_select_catalog_rules() {
        let config = parse_config(
            r#"
version: "1.0"
worker:
  program: python3
profiles:
  first: [A, B]
  second: [C]
"#,
        )
        .unwrap();
        let resolved =
            ResolvedConfig::resolve(config, Path::new("/x/c.yaml"), &EnvOverrides::default()).unwrap();

        // Two profiles and no default: ambiguous
        assert!(resolved.select_catalog(None).is_err());
        assert_eq!(resolved.select_catalog(Some("second")).unwrap().0, "second");
        assert!(resolved.select_catalog(Some("third")).is_err());

        let single = parse_config(
            r#"
version: "1.0"
worker:
  program: python3
profiles:
  only: [A]
"#,
        )
        .unwrap();
        let resolved =
            ResolvedConfig::resolve(single, Path::new("/x/c.yaml"), &EnvOverrides::default()).unwrap();
        assert_eq!(resolved.select_catalog(None).unwrap().0, "only");
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
