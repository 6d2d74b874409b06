use crate::error::AppResult;
use crate::metrics::{MetricsSnapshot, names};

use super::RunMetadata;
use super::format::{CustomDisplay, fixed2, percent, write_line};

const RULE_WIDE: usize = 50;
const RULE_NARROW: usize = 30;

/// Plain-text console summary of a run.
pub(super) fn render(
    snapshot: &MetricsSnapshot,
    metadata: &RunMetadata,
    generated: &str,
) -> AppResult<String> {
    let mut output = String::new();
    let wide = "=".repeat(RULE_WIDE);
    let narrow = "-".repeat(RULE_NARROW);

    write_line(&mut output, "")?;
    write_line(&mut output, "LOAD TEST SUMMARY")?;
    write_line(&mut output, &wide)?;
    write_line(&mut output, &format!("Generated: {}", generated))?;
    write_line(
        &mut output,
        &format!("Scene: {} | Test: {}", metadata.scene, metadata.test_name),
    )?;
    write_line(
        &mut output,
        &format!(
            "Setting: {} - {}",
            metadata.test_setting.name, metadata.test_setting.description
        ),
    )?;
    write_line(&mut output, &format!("Environment: {}", metadata.environment))?;
    write_line(
        &mut output,
        &format!(
            "Started: {} | Ended: {}",
            metadata.test_start_time,
            metadata.test_end_time().unwrap_or("-")
        ),
    )?;
    write_line(
        &mut output,
        &format!(
            "Duration: {}s",
            fixed2(snapshot.state.test_run_duration_ms / 1000.0)
        ),
    )?;
    let max_vus = snapshot
        .metric(names::VUS_MAX)
        .and_then(|values| values.value.or(values.max))
        .unwrap_or(0.0);
    write_line(&mut output, &format!("Max VUs: {}", max_vus))?;

    write_line(&mut output, "")?;
    write_line(&mut output, "HTTP METRICS")?;
    write_line(&mut output, &narrow)?;
    let requests = snapshot.metric(names::HTTP_REQS).and_then(|values| values.count);
    let failed = snapshot.metric(names::HTTP_REQ_FAILED).and_then(|values| values.rate);
    let duration = snapshot.metric(names::HTTP_REQ_DURATION);
    write_line(
        &mut output,
        &format!("Total Requests: {}", requests.unwrap_or(0.0)),
    )?;
    write_line(
        &mut output,
        &format!("Failed Requests: {}%", percent(failed.unwrap_or(0.0))),
    )?;
    write_line(
        &mut output,
        &format!(
            "Avg Response Time: {}ms",
            fixed2(duration.and_then(|values| values.avg).unwrap_or(0.0))
        ),
    )?;
    write_line(
        &mut output,
        &format!(
            "95th Percentile: {}ms",
            fixed2(duration.and_then(|values| values.p95).unwrap_or(0.0))
        ),
    )?;

    let custom: Vec<(&str, CustomDisplay)> = snapshot
        .custom_metric_names()
        .into_iter()
        .filter_map(|name| {
            let values = snapshot.metric(name)?;
            CustomDisplay::for_metric(name, values).map(|display| (name, display))
        })
        .collect();
    if !custom.is_empty() {
        write_line(&mut output, "")?;
        write_line(&mut output, "CUSTOM METRICS")?;
        write_line(&mut output, &narrow)?;
        for (name, display) in custom {
            write_line(&mut output, &format!("{}: {}", name, display.render()))?;
        }
    }

    let mut evaluated = snapshot
        .metrics
        .iter()
        .flat_map(|(name, summary)| {
            summary
                .thresholds
                .iter()
                .map(move |(expression, status)| (name, expression, status.ok))
        })
        .peekable();
    if evaluated.peek().is_some() {
        write_line(&mut output, "")?;
        write_line(&mut output, "THRESHOLDS")?;
        write_line(&mut output, &narrow)?;
        for (name, expression, ok) in evaluated {
            let verdict = if ok { "PASS" } else { "FAIL" };
            write_line(
                &mut output,
                &format!("{} {}: {}", verdict, name, expression),
            )?;
        }
    }

    write_line(&mut output, &wide)?;
    Ok(output)
}
