use chrono::{DateTime, Local};

use crate::catalog::{Scene, TestDescriptor};

/// Name of the selected tests as used in report file names: the test
/// identifier for a single test, `all-tests` for the whole scene, otherwise
/// `tests-` followed by the ordinals.
#[must_use]
pub fn selection_name(selected: &[TestDescriptor], scene_tests: &[TestDescriptor]) -> String {
    if let [single] = selected {
        return single.identifier.clone();
    }
    let covers_scene = scene_tests.len() == selected.len()
        && scene_tests
            .iter()
            .all(|test| selected.iter().any(|chosen| chosen.identifier == test.identifier));
    if covers_scene {
        return "all-tests".to_owned();
    }
    let ordinals: Vec<String> = selected
        .iter()
        .map(|test| test.ordinal.to_string())
        .collect();
    format!("tests-{}", ordinals.join("-"))
}

/// `{environment}_{YYYYMMDDHHMMSS}_{scene}_{testName}` in local time.
#[must_use]
pub fn report_base_name(
    environment: &str,
    generated_at: &DateTime<Local>,
    scene: Scene,
    test_name: &str,
) -> String {
    format!(
        "{}_{}_{}_{}",
        sanitize(environment),
        generated_at.format("%Y%m%d%H%M%S"),
        scene,
        sanitize(test_name)
    )
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}
