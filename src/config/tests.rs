use super::{
    ScenarioSpec, apply_overrides, load_config_file, parse_duration_value, resolve_environment,
    resolve_setting, setting_names,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::tempdir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn parse_toml_config_with_custom_setting() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("loadscene.toml");
    let content = r#"
environment = "local"
setting = "smoke"

[environments.local]
base_url = "http://127.0.0.1:8080"
timeout = "5s"
username = "tester"
password = "secret"

[settings.smoke]
description = "Quick smoke run"
sleep_duration = 0.25
thresholds = { http_req_failed = ["rate<0.05"] }

[settings.smoke.scenarios.main]
executor = "constant-vus"
vus = 2
duration = "10s"
"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_file(&path).map_err(|err| err.to_string())?;
    if config.environment.as_deref() != Some("local") {
        return Err("Unexpected environment".to_owned());
    }

    let environment = resolve_environment("local", Some(&config), env_from(&[]))
        .map_err(|err| err.to_string())?;
    if environment.base_url != "http://127.0.0.1:8080" {
        return Err(format!("Unexpected base url: {}", environment.base_url));
    }
    if environment.timeout != Duration::from_secs(5) {
        return Err(format!("Unexpected timeout: {:?}", environment.timeout));
    }
    if environment.credentials.is_none() {
        return Err("Expected credentials".to_owned());
    }

    let setting = resolve_setting("smoke", Some(&config)).map_err(|err| err.to_string())?;
    if setting.think_time() != Duration::from_millis(250) {
        return Err(format!("Unexpected think time: {:?}", setting.think_time()));
    }
    match setting.scenarios.get("main") {
        Some(ScenarioSpec::ConstantVus { vus: 2, duration }) if duration == "10s" => Ok(()),
        other => Err(format!("Unexpected scenario: {:?}", other)),
    }
}

#[test]
fn parse_json_config_accepts_camel_case_scenarios() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("loadscene.json");
    let content = r#"{
  "settings": {
    "burst": {
      "sleepDuration": 1,
      "scenarios": {
        "burst": {
          "executor": "constant-arrival-rate",
          "rate": 3,
          "timeUnit": "1s",
          "duration": "20s",
          "preAllocatedVUs": 2,
          "maxVUs": 4
        }
      }
    }
  }
}"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_file(&path).map_err(|err| err.to_string())?;
    let setting = resolve_setting("burst", Some(&config)).map_err(|err| err.to_string())?;
    if setting.max_vus() != 4 {
        return Err(format!("Unexpected max vus: {}", setting.max_vus()));
    }
    if !setting_names(Some(&config)).contains(&"burst".to_owned()) {
        return Err("Expected burst in setting names".to_owned());
    }
    Ok(())
}

#[test]
fn max_vus_adds_up_concurrent_scenarios() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("loadscene.toml");
    let content = r#"
[settings.mixed.scenarios.browse]
executor = "constant-vus"
vus = 3
duration = "10s"

[settings.mixed.scenarios.ramp]
executor = "ramping-vus"
start_vus = 1
stages = [{ duration = "5s", target = 6 }, { duration = "5s", target = 2 }]

[settings.mixed.scenarios.arrivals]
executor = "constant-arrival-rate"
rate = 2
duration = "10s"
pre_allocated_vus = 1
max_vus = 4
"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_file(&path).map_err(|err| err.to_string())?;
    let setting = resolve_setting("mixed", Some(&config)).map_err(|err| err.to_string())?;
    if setting.max_vus() != 13 {
        return Err(format!("Expected 3 + 6 + 4 VUs, got {}", setting.max_vus()));
    }
    Ok(())
}

#[test]
fn load_config_rejects_unknown_extension() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("loadscene.yaml");
    std::fs::write(&path, "scene: homepage").map_err(|err| format!("write failed: {}", err))?;
    match load_config_file(&path) {
        Err(err) if err.to_string().contains("yaml") => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected unsupported extension error".to_owned()),
    }
}

#[test]
fn builtin_environment_reads_prefixed_credentials() -> Result<(), String> {
    let lookup = env_from(&[
        ("STAGING_TEST_USERNAME", "qa"),
        ("STAGING_TEST_PASSWORD", "pw"),
    ]);
    let environment =
        resolve_environment("staging", None, lookup).map_err(|err| err.to_string())?;
    let credentials = environment
        .credentials
        .ok_or_else(|| "Expected credentials".to_owned())?;
    if credentials.username != "qa" || credentials.password != "pw" {
        return Err("Unexpected credentials".to_owned());
    }
    if environment.timeout != Duration::from_millis(60_000) {
        return Err("Unexpected default timeout".to_owned());
    }
    Ok(())
}

#[test]
fn placeholder_or_missing_credentials_are_dropped() -> Result<(), String> {
    let placeholder = env_from(&[
        ("DEV_TEST_USERNAME", "PLACEHOLDER_USERNAME"),
        ("DEV_TEST_PASSWORD", "pw"),
    ]);
    let environment =
        resolve_environment("development", None, placeholder).map_err(|err| err.to_string())?;
    if environment.credentials.is_some() {
        return Err("Placeholder username must not produce credentials".to_owned());
    }

    let missing_password = env_from(&[("PROD_TEST_USERNAME", "qa")]);
    let environment = resolve_environment("production", None, missing_password)
        .map_err(|err| err.to_string())?;
    if environment.credentials.is_some() {
        return Err("Missing password must not produce credentials".to_owned());
    }
    Ok(())
}

#[test]
fn unknown_environment_lists_available_names() -> Result<(), String> {
    match resolve_environment("qa", None, env_from(&[])) {
        Err(err) if err.to_string().contains("development") => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected unknown environment error".to_owned()),
    }
}

#[test]
fn builtin_settings_all_validate() -> Result<(), String> {
    for name in setting_names(None) {
        let setting = resolve_setting(&name, None).map_err(|err| err.to_string())?;
        if setting.thresholds.get("http_req_failed") != Some(&vec!["rate<0.01".to_owned()]) {
            return Err(format!("Unexpected thresholds for {}", name));
        }
    }
    let spike = resolve_setting("spike", None).map_err(|err| err.to_string())?;
    if spike.max_vus() != 1000 {
        return Err(format!("Unexpected spike max vus: {}", spike.max_vus()));
    }
    Ok(())
}

#[test]
fn users_override_sets_vus_and_caps_start_vus() -> Result<(), String> {
    let mut constant = resolve_setting("constant-vus", None).map_err(|err| err.to_string())?;
    apply_overrides(&mut constant, Some(25), Some("45s")).map_err(|err| err.to_string())?;
    match constant.scenarios.get("constant_load") {
        Some(ScenarioSpec::ConstantVus { vus: 25, duration }) if duration == "45s" => {}
        other => return Err(format!("Unexpected constant scenario: {:?}", other)),
    }

    let mut heavy = resolve_setting("heavy", None).map_err(|err| err.to_string())?;
    apply_overrides(&mut heavy, Some(500), Some("1m")).map_err(|err| err.to_string())?;
    match heavy.scenarios.get("heavy_load") {
        Some(ScenarioSpec::RampingVus { start_vus: 10, stages }) if stages.len() == 4 => {}
        other => return Err(format!("Unexpected heavy scenario: {:?}", other)),
    }

    let mut ramping = resolve_setting("ramping-vus", None).map_err(|err| err.to_string())?;
    apply_overrides(&mut ramping, Some(30), None).map_err(|err| err.to_string())?;
    match ramping.scenarios.get("ramping_load") {
        Some(ScenarioSpec::RampingVus { start_vus: 3, .. }) => Ok(()),
        other => Err(format!("Unexpected ramping scenario: {:?}", other)),
    }
}

#[test]
fn duration_override_rejects_invalid_value() -> Result<(), String> {
    let mut setting = resolve_setting("default", None).map_err(|err| err.to_string())?;
    if apply_overrides(&mut setting, None, Some("soon")).is_ok() {
        return Err("Expected invalid duration override to fail".to_owned());
    }
    Ok(())
}

#[test]
fn parse_duration_value_accepts_units() -> Result<(), String> {
    let cases = [
        ("10s", Duration::from_secs(10)),
        ("500ms", Duration::from_millis(500)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3600)),
        ("15", Duration::from_secs(15)),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration_value(input).map_err(|err| err.to_string())?;
        if parsed != expected {
            return Err(format!("{} parsed as {:?}", input, parsed));
        }
    }
    Ok(())
}

#[test]
fn parse_duration_value_rejects_invalid() -> Result<(), String> {
    for input in ["", "abc", "10d", "0s"] {
        if parse_duration_value(input).is_ok() {
            return Err(format!("Expected '{}' to be rejected", input));
        }
    }
    Ok(())
}
