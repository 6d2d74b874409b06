use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Contents of `loadscene.toml` / `loadscene.json`.
///
/// Every field is optional; environments and settings declared here are
/// merged over the built-in tables, replacing entries with the same name.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub scene: Option<String>,
    pub tests: Option<String>,
    pub environment: Option<String>,
    pub setting: Option<String>,
    pub reports_dir: Option<String>,
    pub lenient_selection: Option<bool>,
    pub environments: Option<BTreeMap<String, EnvironmentConfig>>,
    pub settings: Option<BTreeMap<String, TestSettingConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub base_url: String,
    pub timeout: Option<DurationValue>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Name of the process variable holding the username.
    pub username_env: Option<String>,
    /// Name of the process variable holding the password.
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestSettingConfig {
    pub description: Option<String>,
    #[serde(alias = "sleepDuration")]
    pub sleep_duration: Option<f64>,
    pub scenarios: BTreeMap<String, ScenarioSpec>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
}

/// Executor shape of one scenario. Duration fields stay as written so they
/// can be echoed verbatim into reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
pub enum ScenarioSpec {
    ConstantVus {
        vus: u64,
        duration: String,
    },
    RampingVus {
        #[serde(alias = "startVUs")]
        start_vus: u64,
        stages: Vec<Stage>,
    },
    ConstantArrivalRate {
        rate: u64,
        #[serde(alias = "timeUnit", default = "default_time_unit")]
        time_unit: String,
        duration: String,
        #[serde(alias = "preAllocatedVUs")]
        pre_allocated_vus: u64,
        #[serde(alias = "maxVUs")]
        max_vus: u64,
    },
}

fn default_time_unit() -> String {
    "1s".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub duration: String,
    pub target: u64,
}

impl ScenarioSpec {
    #[must_use]
    pub const fn executor(&self) -> &'static str {
        match self {
            ScenarioSpec::ConstantVus { .. } => "constant-vus",
            ScenarioSpec::RampingVus { .. } => "ramping-vus",
            ScenarioSpec::ConstantArrivalRate { .. } => "constant-arrival-rate",
        }
    }

    /// Highest number of VUs this scenario may run at once.
    #[must_use]
    pub fn max_vus(&self) -> u64 {
        match self {
            ScenarioSpec::ConstantVus { vus, .. } => *vus,
            ScenarioSpec::RampingVus { start_vus, stages } => stages
                .iter()
                .map(|stage| stage.target)
                .fold(*start_vus, u64::max),
            ScenarioSpec::ConstantArrivalRate { max_vus, .. } => *max_vus,
        }
    }

    /// Total wall-clock time the scenario is scheduled for.
    ///
    /// # Errors
    ///
    /// Returns an error when any duration string is malformed.
    pub fn total_duration(&self) -> Result<Duration, ConfigError> {
        match self {
            ScenarioSpec::ConstantVus { duration, .. }
            | ScenarioSpec::ConstantArrivalRate { duration, .. } => {
                super::parse_duration_value(duration)
            }
            ScenarioSpec::RampingVus { stages, .. } => {
                stages.iter().try_fold(Duration::ZERO, |total, stage| {
                    let stage_duration = super::parse_duration_value(&stage.duration)?;
                    total
                        .checked_add(stage_duration)
                        .ok_or(ConfigError::DurationOverflow)
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ConfigError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ConfigError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => super::parse_duration_value(text),
        }
    }
}
