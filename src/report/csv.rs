use crate::metrics::{MetricValues, MetricsSnapshot, names};

use super::RunMetadata;
use super::format::{csv_field, fixed2, percent};

/// One header line and one data line. HTTP columns are always present so
/// rows from different runs line up; a missing metric leaves its cell empty.
pub(super) fn render(snapshot: &MetricsSnapshot, metadata: &RunMetadata, generated: &str) -> String {
    let mut columns: Vec<(String, String)> = vec![
        ("timestamp".to_owned(), generated.to_owned()),
        ("scene".to_owned(), metadata.scene.to_string()),
        ("test_name".to_owned(), metadata.test_name.clone()),
        (
            "test_setting_name".to_owned(),
            metadata.test_setting.name.clone(),
        ),
        (
            "test_setting_description".to_owned(),
            metadata.test_setting.description.clone(),
        ),
        ("environment".to_owned(), metadata.environment.clone()),
        (
            "test_start_time".to_owned(),
            metadata.test_start_time.clone(),
        ),
        (
            "test_end_time".to_owned(),
            metadata.test_end_time().unwrap_or_default().to_owned(),
        ),
    ];

    let duration = snapshot.metric(names::HTTP_REQ_DURATION);
    let reqs = snapshot.metric(names::HTTP_REQS);
    let http = [
        ("http_req_duration_avg", duration.and_then(|values| values.avg)),
        ("http_req_duration_p95", duration.and_then(|values| values.p95)),
        ("http_req_duration_min", duration.and_then(|values| values.min)),
        ("http_req_duration_max", duration.and_then(|values| values.max)),
    ];
    for (name, value) in http {
        columns.push((name.to_owned(), rounded(value)));
    }
    columns.push((
        "http_req_failed_rate".to_owned(),
        snapshot
            .metric(names::HTTP_REQ_FAILED)
            .and_then(|values| values.rate)
            .map(percent)
            .unwrap_or_default(),
    ));
    columns.push((
        "http_reqs_count".to_owned(),
        number(reqs.and_then(|values| values.count)),
    ));
    columns.push((
        "http_reqs_rate".to_owned(),
        rounded(reqs.and_then(|values| values.rate)),
    ));
    columns.push((
        "vus_max".to_owned(),
        number(
            snapshot
                .metric(names::VUS_MAX)
                .and_then(|values| values.value.or(values.max)),
        ),
    ));

    for name in snapshot.custom_metric_names() {
        if let Some(values) = snapshot.metric(name) {
            custom_columns(&mut columns, name, values);
        }
    }

    let (header, row): (Vec<String>, Vec<String>) = columns
        .into_iter()
        .map(|(name, value)| (csv_field(&name), csv_field(&value)))
        .unzip();
    format!("{}\n{}\n", header.join(","), row.join(","))
}

fn custom_columns(columns: &mut Vec<(String, String)>, name: &str, values: &MetricValues) {
    if let Some(rate) = values.rate {
        columns.push((format!("{}_rate", name), percent(rate)));
    }
    if let Some(avg) = values.avg {
        columns.push((format!("{}_avg", name), fixed2(avg)));
    }
    if let Some(count) = values.count {
        columns.push((format!("{}_count", name), count.to_string()));
    }
    if let Some(p95) = values.p95 {
        columns.push((format!("{}_p95", name), fixed2(p95)));
    }
}

/// Counts and VU numbers are written as recorded.
fn number(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

/// Durations and per-second rates are written with two decimals.
fn rounded(value: Option<f64>) -> String {
    value.map(fixed2).unwrap_or_default()
}
