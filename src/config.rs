use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

/// Custom deserializer that handles port as both number and string
///
/// Accepts:
/// - `port: 5432` (number)
/// - `port: "5432"` (string that parses to number)
/// - `port: ${DB_PORT}` (env var substituted to either)
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        String(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => Ok(n),
        PortValue::String(s) => s
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid port number: '{}'", s))),
    }
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
    /// Wait applied after a failed crop lookup, instead of the full interval.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

fn default_interval_seconds() -> u64 {
    300 // 5 minutes
}

fn default_initial_delay() -> u64 {
    5
}

fn default_retry_delay() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            initial_delay_seconds: default_initial_delay(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_abnormal_probability")]
    pub abnormal_probability: f64,
    /// Marker file that forces the next generated log to be abnormal.
    #[serde(default)]
    pub trigger_file: Option<PathBuf>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_abnormal_probability() -> f64 {
    0.20
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            abnormal_probability: default_abnormal_probability(),
            trigger_file: None,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Most recent `window_size` logs across every crop.
    #[default]
    Global,
    /// Most recent `window_size` logs of each eligible crop.
    PerCrop,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_window_size")]
    pub window_size: u32,
    #[serde(default)]
    pub window: WindowMode,
}

fn default_window_size() -> u32 {
    60
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window: WindowMode::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    #[serde(default = "default_bootstrap_samples")]
    pub bootstrap_samples: usize,
    #[serde(default = "default_model_seed")]
    pub seed: u64,
    /// Fraction of each feature's healthy span added on both sides of the envelope.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

/// Smallest bootstrap set whose healthy half reliably spans the normal ranges.
pub const MIN_BOOTSTRAP_SAMPLES: usize = 100;

fn default_model_path() -> PathBuf {
    PathBuf::from("models/pond_health_model.json")
}

fn default_bootstrap_samples() -> usize {
    400
}

fn default_model_seed() -> u64 {
    42
}

fn default_tolerance() -> f64 {
    0.05
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            bootstrap_samples: default_bootstrap_samples(),
            seed: default_model_seed(),
            tolerance: default_tolerance(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, substituting `${VAR}` references first.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Non-empty connection target
    /// - Positive time intervals
    /// - Probabilities and fractions within range
    fn validate(&self) -> Result<()> {
        let fields_to_check = [
            ("DB_HOST", &self.database.host),
            ("DB_NAME", &self.database.name),
            ("DB_USER", &self.database.user),
            ("DB_PASSWORD", &self.database.password),
        ];

        for (field_name, value) in &fields_to_check {
            if value.contains("${") {
                return Err(AppError::Config(format!(
                    "{} environment variable is not set. \
                     Please set it or create a .env file. \
                     See .env.example for required variables.",
                    field_name
                )));
            }
        }

        if self.database.host.is_empty() {
            return Err(AppError::Config(
                "Database host cannot be empty".to_string(),
            ));
        }

        if self.database.name.is_empty() {
            return Err(AppError::Config(
                "Database name cannot be empty".to_string(),
            ));
        }

        if self.database.user.is_empty() {
            return Err(AppError::Config(
                "Database user cannot be empty".to_string(),
            ));
        }

        if self.database.port == 0 {
            return Err(AppError::Config("Database port cannot be 0".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "Database max_connections must be at least 1".to_string(),
            ));
        }

        if self.database.max_connections > 100 {
            return Err(AppError::Config(format!(
                "Database max_connections {} seems too high, maximum recommended is 100",
                self.database.max_connections
            )));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(AppError::Config(
                "Scheduler interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.retry_delay_seconds == 0
            || self.scheduler.retry_delay_seconds >= self.scheduler.interval_seconds
        {
            return Err(AppError::Config(format!(
                "Scheduler retry_delay_seconds must be between 1 and interval_seconds ({}), got {}",
                self.scheduler.interval_seconds, self.scheduler.retry_delay_seconds
            )));
        }

        if self.scheduler.interval_seconds < 10 {
            tracing::warn!(
                "Scheduler interval of {} seconds is very short, consider using at least 10 seconds",
                self.scheduler.interval_seconds
            );
        }

        if !(0.0..=1.0).contains(&self.simulation.abnormal_probability) {
            return Err(AppError::Config(format!(
                "Simulation abnormal_probability must be within [0, 1], got {}",
                self.simulation.abnormal_probability
            )));
        }

        if self.report.window_size == 0 {
            return Err(AppError::Config(
                "Report window_size must be at least 1".to_string(),
            ));
        }

        if self.model.bootstrap_samples < MIN_BOOTSTRAP_SAMPLES {
            return Err(AppError::Config(format!(
                "Model bootstrap_samples must be at least {}, got {}",
                MIN_BOOTSTRAP_SAMPLES, self.model.bootstrap_samples
            )));
        }

        if !(0.0..1.0).contains(&self.model.tolerance) {
            return Err(AppError::Config(format!(
                "Model tolerance must be within [0, 1), got {}",
                self.model.tolerance
            )));
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid substitution pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
