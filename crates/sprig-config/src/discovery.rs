//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/sprig/config.toml` (user config, or `$SPRIG_CONFIG_DIR/config.toml`)
//! 2. `./sprig.toml` (project-local)
//! 3. Environment variables (`DATABASE_URL`, `OPENAI_API_KEY`, ...)

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SprigConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "sprig.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "sprig";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "SPRIG_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: SprigConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems that did not stop loading (unreadable layers, bad env values).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration from all layers, reading the process environment.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |key| std::env::var(key).ok())
}

/// Load configuration with explicit control over the user config directory
/// and the environment.
///
/// `config_dir` overrides both `SPRIG_CONFIG_DIR` and the platform default.
pub fn load_config_with_options<F>(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = SprigConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    warnings.extend(config.apply_env(env));
    if file_supplies_key(&sources) {
        warnings.push(
            "An API key is stored in a config file; prefer the OPENAI_API_KEY environment variable"
                .to_string(),
        );
    }

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Whether any loaded file stores an API key in plaintext.
fn file_supplies_key(sources: &[ConfigSource]) -> bool {
    sources.iter().any(|s| {
        s.loaded
            && load_config_file(&s.path)
                .ok()
                .and_then(|c| c.llm)
                .is_some_and(|l| l.api_key.is_some())
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<SprigConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    SprigConfig::from_toml(&contents)
}

/// Save configuration to a file, creating parent directories.
pub fn save_config(config: &SprigConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// The sprig config directory.
///
/// Checks `SPRIG_CONFIG_DIR` first, then the platform default
/// (`~/.config/sprig` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut SprigConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DATABASE_URL_ENV;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), no_env).unwrap();
        assert_eq!(loaded.config, SprigConfig::default());
        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.sources.len(), 2);
    }

    #[test]
    fn test_project_overrides_user() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            user.path().join("config.toml"),
            "[database]\ngraph = \"user_graph\"\n[insights]\nbatch_limit = 10\n",
        )
        .unwrap();
        std::fs::write(
            project.path().join("sprig.toml"),
            "[database]\ngraph = \"project_graph\"\n",
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), no_env).unwrap();
        assert_eq!(loaded.config.database().graph, "project_graph");
        assert_eq!(loaded.config.insights().batch_limit, 10);
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_env_beats_files() {
        let user = TempDir::new().unwrap();
        std::fs::write(
            user.path().join("config.toml"),
            "[database]\nurl = \"postgres://file/db\"\n",
        )
        .unwrap();
        let project = TempDir::new().unwrap();

        let loaded = load_config_with_options(Some(project.path()), Some(user.path()), |k| {
            (k == DATABASE_URL_ENV).then(|| "postgres://env/db".to_string())
        })
        .unwrap();
        assert_eq!(
            loaded.config.database().require_url().unwrap(),
            "postgres://env/db"
        );
    }

    #[test]
    fn test_broken_layer_is_a_warning() {
        let user = TempDir::new().unwrap();
        std::fs::write(user.path().join("config.toml"), "[database\n").unwrap();
        let project = TempDir::new().unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), no_env).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_plaintext_key_warns() {
        let user = TempDir::new().unwrap();
        std::fs::write(user.path().join("config.toml"), "[llm]\napi_key = \"sk-x\"\n").unwrap();
        let project = TempDir::new().unwrap();

        let loaded =
            load_config_with_options(Some(project.path()), Some(user.path()), no_env).unwrap();
        assert!(loaded.warnings.iter().any(|w| w.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = SprigConfig::new();
        config.database = Some(crate::DatabaseConfig {
            url: None,
            graph: "saved".to_string(),
        });

        save_config(&config, &path).unwrap();
        assert_eq!(load_config_file(&path).unwrap(), config);
    }
}
