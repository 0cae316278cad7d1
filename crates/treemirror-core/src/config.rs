//! Configuration module for treemirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! The older one-line-per-root format (`source => target`) is still accepted.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::RootDescriptor;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for treemirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source/target pairs to mirror, in display order.
    pub roots: Vec<RootConfig>,
    pub queue: QueueConfig,
    pub mirror: MirrorConfig,
    pub logging: LoggingConfig,
}

/// One mirrored directory pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Directory to watch.
    pub source: PathBuf,
    /// Directory receiving the mirror.
    pub target: PathBuf,
    /// Display label; defaults to the source directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Action queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Milliseconds an action waits before it may run, so bursts coalesce.
    pub debounce_ms: u64,
}

/// Copy/delete engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Operations slower than this (milliseconds) show their elapsed time.
    pub slow_threshold_ms: u64,
    /// Attempts per file when the copy hits a sharing/permission violation.
    pub copy_retries: u32,
    /// Milliseconds to wait between copy attempts.
    pub retry_pause_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for QueueConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: 500,
            copy_retries: 3,
            retry_pause_ms: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl MirrorConfig {
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Load the legacy arrow-list format from `path`.
    ///
    /// Returns the parsed configuration plus one [`ValidationError`] per
    /// malformed line; malformed lines are skipped.
    pub fn load_arrow_list(path: &Path) -> anyhow::Result<(Self, Vec<ValidationError>)> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse_arrow_list(&content))
    }

    /// Parse the legacy format: one `source => target` pair per line.
    ///
    /// Blank lines and lines starting with `#` are ignored. Whitespace
    /// around either side of the arrow is trimmed.
    pub fn parse_arrow_list(content: &str) -> (Self, Vec<ValidationError>) {
        let mut config = Config::default();
        let mut errors = Vec::new();

        for (number, line) in content.lines().enumerate() {
            let number = number + 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once("=>") {
                Some((source, target))
                    if !source.trim().is_empty() && !target.trim().is_empty() =>
                {
                    config.roots.push(RootConfig {
                        source: PathBuf::from(source.trim()),
                        target: PathBuf::from(target.trim()),
                        label: None,
                    });
                }
                _ => errors.push(ValidationError {
                    field: format!("line {number}"),
                    message: "does not match pattern (source => target)".into(),
                }),
            }
        }

        (config, errors)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/treemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("treemirror")
            .join("config.yaml")
    }

    /// Location of the legacy arrow-list file, `~/.treemirror`.
    pub fn legacy_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".treemirror")
    }

    /// Root descriptors in configuration order, indexed from 1.
    pub fn descriptors(&self) -> Vec<RootDescriptor> {
        self.roots
            .iter()
            .enumerate()
            .map(|(i, root)| root.descriptor(i + 1))
            .collect()
    }
}

impl RootConfig {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    /// Build the runtime descriptor for this root at `index`.
    pub fn descriptor(&self, index: usize) -> RootDescriptor {
        let label = self.label.clone().unwrap_or_else(|| {
            self.source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.source.display().to_string())
        });
        RootDescriptor::new(index, label, self.source.clone(), self.target.clone())
    }

    /// Check the directories on disk.
    ///
    /// The source must exist and be a directory; the target must exist, be a
    /// directory and not be read-only.
    pub fn check(&self) -> Result<(), RootCheckError> {
        let source = std::fs::metadata(&self.source)
            .map_err(|_| RootCheckError::SourceNotFound(self.source.clone()))?;
        if !source.is_dir() {
            return Err(RootCheckError::SourceNotDirectory(self.source.clone()));
        }

        let target = std::fs::metadata(&self.target)
            .map_err(|_| RootCheckError::TargetNotFound(self.target.clone()))?;
        if !target.is_dir() {
            return Err(RootCheckError::TargetNotDirectory(self.target.clone()));
        }
        if target.permissions().readonly() {
            return Err(RootCheckError::TargetNotWritable(self.target.clone()));
        }

        Ok(())
    }
}

/// Problems found when checking a root's directories on disk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RootCheckError {
    #[error("Source folder not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Source is not a folder: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("Target folder not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("Target is not a folder: {}", .0.display())]
    TargetNotDirectory(PathBuf),

    #[error("Target is not writable: {}", .0.display())]
    TargetNotWritable(PathBuf),
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"queue.debounce_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Directory checks
    /// that touch the disk are left to [`RootConfig::check`].
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- roots ---
        if self.roots.is_empty() {
            errors.push(ValidationError {
                field: "roots".into(),
                message: "at least one root must be configured".into(),
            });
        }
        for (i, root) in self.roots.iter().enumerate() {
            if lexically_within(&root.target, &root.source) {
                errors.push(ValidationError {
                    field: format!("roots[{i}].target"),
                    message: format!(
                        "target {} lies inside source {}",
                        root.target.display(),
                        root.source.display()
                    ),
                });
            }
            if lexically_within(&root.source, &root.target) {
                errors.push(ValidationError {
                    field: format!("roots[{i}].source"),
                    message: format!(
                        "source {} lies inside target {}",
                        root.source.display(),
                        root.target.display()
                    ),
                });
            }
        }

        // --- queue ---
        if self.queue.debounce_ms == 0 {
            errors.push(ValidationError {
                field: "queue.debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- mirror ---
        if self.mirror.copy_retries == 0 {
            errors.push(ValidationError {
                field: "mirror.copy_retries".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

/// Component-wise containment after dropping `.` components.
fn lexically_within(path: &Path, ancestor: &Path) -> bool {
    let clean = |p: &Path| -> PathBuf {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    clean(path).starts_with(clean(ancestor))
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use treemirror_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .root("/home/user/src", "/mnt/backup/src")
///     .queue_debounce_ms(250)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- roots ---

    pub fn root(mut self, source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        self.config.roots.push(RootConfig::new(source, target));
        self
    }

    pub fn labelled_root(
        mut self,
        label: impl Into<String>,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        let mut root = RootConfig::new(source, target);
        root.label = Some(label.into());
        self.config.roots.push(root);
        self
    }

    // --- queue ---

    pub fn queue_debounce_ms(mut self, ms: u64) -> Self {
        self.config.queue.debounce_ms = ms;
        self
    }

    // --- mirror ---

    pub fn mirror_slow_threshold_ms(mut self, ms: u64) -> Self {
        self.config.mirror.slow_threshold_ms = ms;
        self
    }

    pub fn mirror_copy_retries(mut self, n: u32) -> Self {
        self.config.mirror.copy_retries = n;
        self
    }

    pub fn mirror_retry_pause_ms(mut self, ms: u64) -> Self {
        self.config.mirror.retry_pause_ms = ms;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
