use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;
use crate::metrics::Threshold;

use super::types::{ConfigFile, EnvironmentConfig, ScenarioSpec, Stage, TestSettingConfig};

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_SETTING: &str = "default";

/// Request timeout applied when an environment does not set one.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Upper bound for the `start_vus` derived from `--users` on ramping scenarios.
const MAX_DERIVED_START_VUS: u64 = 10;

const PLACEHOLDER_USERNAME: &str = "PLACEHOLDER_USERNAME";
const PLACEHOLDER_PASSWORD: &str = "PLACEHOLDER_PASSWORD";

struct BuiltinEnvironment {
    name: &'static str,
    base_url: &'static str,
    credential_prefix: &'static str,
}

const BUILTIN_ENVIRONMENTS: [BuiltinEnvironment; 4] = [
    BuiltinEnvironment {
        name: "development",
        base_url: "https://isp-api-dev.horixon-t8.com",
        credential_prefix: "DEV",
    },
    BuiltinEnvironment {
        name: "staging",
        base_url: "https://isp-api-uat.horixon-t8.com",
        credential_prefix: "STAGING",
    },
    BuiltinEnvironment {
        name: "preprod",
        base_url: "https://isp-api-preprod.horixon-t8.com",
        credential_prefix: "PREPROD",
    },
    BuiltinEnvironment {
        name: "production",
        base_url: "http://isp-api.dhipaya.co.th",
        credential_prefix: "PROD",
    },
];

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Builds credentials, returning `None` when either part is missing,
    /// blank, or still a placeholder value.
    #[must_use]
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        let username = username.filter(|value| usable(value, PLACEHOLDER_USERNAME))?;
        let password = password.filter(|value| usable(value, PLACEHOLDER_PASSWORD))?;
        Some(Self { username, password })
    }
}

fn usable(value: &str, placeholder: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != placeholder
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub base_url: String,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

/// A named load profile: executor shapes, thresholds and think time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSetting {
    pub name: String,
    pub description: String,
    /// Think time in seconds applied after every probe.
    pub sleep_duration: f64,
    pub scenarios: BTreeMap<String, ScenarioSpec>,
    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl TestSetting {
    #[must_use]
    pub fn think_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.sleep_duration).unwrap_or(Duration::ZERO)
    }

    /// Peak VU count across all scenarios. Scenarios run concurrently, so
    /// their peaks add up.
    #[must_use]
    pub fn max_vus(&self) -> u64 {
        self.scenarios
            .values()
            .map(ScenarioSpec::max_vus)
            .fold(0, u64::saturating_add)
    }

    /// Parses every threshold expression of this setting.
    ///
    /// # Errors
    ///
    /// Returns the first expression that cannot be parsed.
    pub fn parsed_thresholds(&self) -> Result<Vec<Threshold>, ConfigError> {
        let mut parsed = Vec::new();
        for (metric, expressions) in &self.thresholds {
            for expression in expressions {
                parsed.push(Threshold::parse(metric, expression)?);
            }
        }
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios.is_empty() {
            return Err(ConfigError::SettingWithoutScenarios {
                name: self.name.clone(),
            });
        }
        for (scenario_name, scenario) in &self.scenarios {
            if let ScenarioSpec::RampingVus { stages, .. } = scenario
                && stages.is_empty()
            {
                return Err(ConfigError::ScenarioMissingField {
                    scenario: scenario_name.clone(),
                    executor: scenario.executor(),
                    field: "stages",
                });
            }
            scenario.total_duration()?;
        }
        self.parsed_thresholds()?;
        Ok(())
    }
}

/// Names of every known environment, built-in first then config-only ones.
#[must_use]
pub fn environment_names(file: Option<&ConfigFile>) -> Vec<String> {
    let mut names: Vec<String> = BUILTIN_ENVIRONMENTS
        .iter()
        .map(|builtin| builtin.name.to_owned())
        .collect();
    if let Some(extra) = file.and_then(|file| file.environments.as_ref()) {
        for name in extra.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Resolves an environment by name. `lookup` reads process variables; it is
/// injected so credential handling can be exercised without touching the
/// real environment.
///
/// # Errors
///
/// Returns an error when the environment is unknown or its timeout is invalid.
pub fn resolve_environment<F>(
    name: &str,
    file: Option<&ConfigFile>,
    lookup: F,
) -> Result<Environment, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(config) = file
        .and_then(|file| file.environments.as_ref())
        .and_then(|environments| environments.get(name))
    {
        return environment_from_config(name, config, &lookup);
    }

    let builtin = BUILTIN_ENVIRONMENTS
        .iter()
        .find(|builtin| builtin.name == name)
        .ok_or_else(|| ConfigError::UnknownEnvironment {
            name: name.to_owned(),
            available: environment_names(file).join(", "),
        })?;

    let credentials = Credentials::from_parts(
        lookup(&format!("{}_TEST_USERNAME", builtin.credential_prefix)),
        lookup(&format!("{}_TEST_PASSWORD", builtin.credential_prefix)),
    );

    Ok(Environment {
        name: builtin.name.to_owned(),
        base_url: builtin.base_url.to_owned(),
        timeout: DEFAULT_TIMEOUT,
        credentials,
    })
}

fn environment_from_config<F>(
    name: &str,
    config: &EnvironmentConfig,
    lookup: &F,
) -> Result<Environment, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let timeout = match config.timeout.as_ref() {
        Some(value) => value.to_duration()?,
        None => DEFAULT_TIMEOUT,
    };
    let username = config
        .username
        .clone()
        .or_else(|| config.username_env.as_deref().and_then(lookup));
    let password = config
        .password
        .clone()
        .or_else(|| config.password_env.as_deref().and_then(lookup));

    Ok(Environment {
        name: name.to_owned(),
        base_url: config.base_url.clone(),
        timeout,
        credentials: Credentials::from_parts(username, password),
    })
}

fn standard_thresholds() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "http_req_duration".to_owned(),
            vec![
                "p(50)<1500".to_owned(),
                "p(95)<3000".to_owned(),
                "p(99)<5000".to_owned(),
            ],
        ),
        ("http_req_failed".to_owned(), vec!["rate<0.01".to_owned()]),
    ])
}

fn stages(pairs: &[(&str, u64)]) -> Vec<Stage> {
    pairs
        .iter()
        .map(|(duration, target)| Stage {
            duration: (*duration).to_owned(),
            target: *target,
        })
        .collect()
}

fn setting(
    name: &str,
    description: &str,
    sleep_duration: f64,
    scenario_name: &str,
    scenario: ScenarioSpec,
) -> TestSetting {
    TestSetting {
        name: name.to_owned(),
        description: description.to_owned(),
        sleep_duration,
        scenarios: BTreeMap::from([(scenario_name.to_owned(), scenario)]),
        thresholds: standard_thresholds(),
    }
}

/// The built-in test settings table, in display order.
#[must_use]
pub fn builtin_settings() -> Vec<TestSetting> {
    vec![
        setting(
            "default",
            "Basic load test with steady 1 req/s",
            1.0,
            "default",
            ScenarioSpec::ConstantArrivalRate {
                rate: 1,
                time_unit: "1s".to_owned(),
                duration: "30s".to_owned(),
                pre_allocated_vus: 1,
                max_vus: 5,
            },
        ),
        setting(
            "constant-vus",
            "Fixed single user load test",
            2.0,
            "constant_load",
            ScenarioSpec::ConstantVus {
                vus: 1,
                duration: "30s".to_owned(),
            },
        ),
        setting(
            "ramping-vus",
            "Gradual load increase/decrease",
            1.5,
            "ramping_load",
            ScenarioSpec::RampingVus {
                start_vus: 1,
                stages: stages(&[("10s", 5), ("20s", 10), ("10s", 0)]),
            },
        ),
        setting(
            "light",
            "Moderate load for everyday scenarios",
            1.0,
            "light_load",
            ScenarioSpec::ConstantArrivalRate {
                rate: 5,
                time_unit: "1s".to_owned(),
                duration: "2m".to_owned(),
                pre_allocated_vus: 10,
                max_vus: 20,
            },
        ),
        setting(
            "heavy",
            "High stress test with fast interactions",
            0.5,
            "heavy_load",
            ScenarioSpec::RampingVus {
                start_vus: 10,
                stages: stages(&[("2m", 100), ("5m", 300), ("10m", 500), ("3m", 0)]),
            },
        ),
        setting(
            "spike",
            "Sudden traffic spike simulation",
            1.0,
            "spike_test",
            ScenarioSpec::RampingVus {
                start_vus: 10,
                stages: stages(&[("1m", 50), ("30s", 1000), ("30s", 50), ("1m", 0)]),
            },
        ),
    ]
}

#[must_use]
pub fn setting_names(file: Option<&ConfigFile>) -> Vec<String> {
    let mut names: Vec<String> = builtin_settings()
        .into_iter()
        .map(|setting| setting.name)
        .collect();
    if let Some(extra) = file.and_then(|file| file.settings.as_ref()) {
        for name in extra.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Resolves and validates a test setting by name.
///
/// # Errors
///
/// Returns an error when the setting is unknown or fails validation.
pub fn resolve_setting(name: &str, file: Option<&ConfigFile>) -> Result<TestSetting, ConfigError> {
    let resolved = match file
        .and_then(|file| file.settings.as_ref())
        .and_then(|settings| settings.get(name))
    {
        Some(config) => setting_from_config(name, config),
        None => builtin_settings()
            .into_iter()
            .find(|setting| setting.name == name)
            .ok_or_else(|| ConfigError::UnknownSetting {
                name: name.to_owned(),
                available: setting_names(file).join(", "),
            })?,
    };
    resolved.validate()?;
    Ok(resolved)
}

fn setting_from_config(name: &str, config: &TestSettingConfig) -> TestSetting {
    TestSetting {
        name: name.to_owned(),
        description: config.description.clone().unwrap_or_default(),
        sleep_duration: config.sleep_duration.unwrap_or(1.0).max(0.0),
        scenarios: config.scenarios.clone(),
        thresholds: config.thresholds.clone(),
    }
}

/// Applies `--users` / `--duration` overrides to every scenario.
///
/// `users` replaces `vus` on constant-VU scenarios and sets `start_vus` to
/// `min(users / 10, 10)` on ramping ones. `duration` replaces the duration of
/// every scenario that has one; ramping stages keep their own lengths.
///
/// # Errors
///
/// Returns an error when the duration override is not a valid duration.
pub fn apply_overrides(
    setting: &mut TestSetting,
    users: Option<u64>,
    duration: Option<&str>,
) -> Result<(), ConfigError> {
    if let Some(duration) = duration {
        super::parse_duration_value(duration)?;
    }

    for scenario in setting.scenarios.values_mut() {
        match scenario {
            ScenarioSpec::ConstantVus {
                vus,
                duration: scenario_duration,
            } => {
                if let Some(users) = users {
                    *vus = users;
                }
                if let Some(duration) = duration {
                    duration.clone_into(scenario_duration);
                }
            }
            ScenarioSpec::RampingVus { start_vus, .. } => {
                if let Some(users) = users {
                    *start_vus = (users / 10).min(MAX_DERIVED_START_VUS);
                }
            }
            ScenarioSpec::ConstantArrivalRate {
                duration: scenario_duration,
                ..
            } => {
                if let Some(duration) = duration {
                    duration.clone_into(scenario_duration);
                }
            }
        }
    }
    Ok(())
}
