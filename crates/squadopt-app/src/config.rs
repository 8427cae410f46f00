// Configuration loading and parsing (squadopt.toml).

use serde::Deserialize;
use squadopt_core::{Formation, OptimizerParams};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the single config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "squadopt.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub budget: BudgetConfig,
    pub optimizer: OptimizerConfig,
    /// Formations in enumeration order.
    pub formations: Vec<Formation>,
    pub data_paths: DataPaths,
    /// Player ids that are never selected.
    pub exclusions: HashSet<String>,
    pub availability: AvailabilityConfig,
}

// ---------------------------------------------------------------------------
// squadopt.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire squadopt.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    budget: BudgetConfig,
    #[serde(default)]
    optimizer: OptimizerSection,
    formations: FormationsSection,
    data_paths: DataPaths,
    #[serde(default)]
    exclusions: ExclusionsSection,
    #[serde(default)]
    availability: AvailabilityConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BudgetConfig {
    /// Budget for the general mode when the caller supplies none.
    pub default: u32,
    /// Constant budget for the fixed-budget auto-exclude mode.
    pub fixed: u32,
}

/// `[optimizer]`: the objective parameters plus driver settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct OptimizerSection {
    #[serde(flatten)]
    params: OptimizerParams,
    parallel: bool,
    exact_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct FormationsSection {
    order: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExclusionsSection {
    #[serde(default)]
    ids: Vec<String>,
}

/// The public optimizer config assembled from the `[optimizer]` section.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub params: OptimizerParams,
    pub parallel: bool,
    pub exact_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityConfig {
    /// Lower-cased status values treated as unfit.
    pub unavailable: Vec<String>,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        AvailabilityConfig {
            unavailable: vec!["injured".into(), "suspended".into(), "unavailable".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/squadopt.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_config_file(&base_dir.join("config").join(CONFIG_FILE))
}

/// Load and validate a config file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    assemble(file)
}

fn assemble(file: ConfigFile) -> Result<Config, ConfigError> {
    let formations = parse_formations(&file.formations.order)?;

    let optimizer = OptimizerConfig {
        params: file.optimizer.params,
        parallel: file.optimizer.parallel,
        exact_timeout_ms: file.optimizer.exact_timeout_ms,
    };

    let availability = AvailabilityConfig {
        unavailable: file
            .availability
            .unavailable
            .iter()
            .map(|s| s.trim().to_lowercase())
            .collect(),
    };

    let config = Config {
        budget: file.budget,
        optimizer,
        formations,
        data_paths: file.data_paths,
        exclusions: file
            .exclusions
            .ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .collect(),
        availability,
    };

    validate(&config)?;

    Ok(config)
}

fn parse_formations(tags: &[String]) -> Result<Vec<Formation>, ConfigError> {
    if tags.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "formations.order".into(),
            message: "must list at least one formation".into(),
        });
    }

    let mut formations: Vec<Formation> = Vec::with_capacity(tags.len());
    for tag in tags {
        let formation = Formation::parse(tag).map_err(|e| ConfigError::ValidationError {
            field: "formations.order".into(),
            message: e.to_string(),
        })?;
        if formations.iter().any(|f| f.tag == formation.tag) {
            return Err(ConfigError::ValidationError {
                field: "formations.order".into(),
                message: format!("duplicate formation `{}`", formation.tag),
            });
        }
        formations.push(formation);
    }
    Ok(formations)
}

/// Seed `config/squadopt.toml` from `defaults/squadopt.toml` on first run.
/// Returns the written path, or `None` when a config file is already there.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let mut reader = std::fs::File::open(&source).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!(
            "no config/{CONFIG_FILE} in {} and cannot read {}: {e}",
            base_dir.display(),
            source.display()
        ),
    })?;

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", dir.display()),
        })?;
    }

    // create_new so a file written since the check above is left alone.
    let mut writer = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to create {}: {e}", target.display()),
            })
        }
    };
    std::io::copy(&mut reader, &mut writer).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to write {}: {e}", target.display()),
    })?;

    Ok(Some(target))
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Seeds the config file from defaults before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let budgets: &[(&str, u32)] = &[
        ("budget.default", config.budget.default),
        ("budget.fixed", config.budget.fixed),
    ];
    for (name, val) in budgets {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be greater than 0".into(),
            });
        }
    }

    config
        .optimizer
        .params
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: "optimizer".into(),
            message: e.to_string(),
        })?;

    if config.optimizer.exact_timeout_ms == Some(0) {
        return Err(ConfigError::ValidationError {
            field: "optimizer.exact_timeout_ms".into(),
            message: "must be > 0 when set".into(),
        });
    }

    if config.data_paths.players.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.players".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
