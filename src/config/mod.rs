//! Configuration loading: config files, environments and test settings.
mod loader;
mod parse;
mod settings;
pub mod types;

#[cfg(test)]
mod tests;

pub use loader::{DEFAULT_CONFIG_FILES, load_config};
pub use settings::{
    Credentials, DEFAULT_ENVIRONMENT, DEFAULT_SETTING, Environment, TestSetting, apply_overrides,
    builtin_settings, environment_names, resolve_environment, resolve_setting, setting_names,
};
pub use types::{ConfigFile, ScenarioSpec, Stage};

#[cfg(test)]
pub(crate) use loader::load_config_file;
pub(crate) use parse::parse_duration_value;
