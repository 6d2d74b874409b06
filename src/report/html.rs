use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::config::ScenarioSpec;
use crate::error::AppResult;
use crate::metrics::{MetricsSnapshot, names};
use crate::orchestrator::{BODY_EXCERPT_LIMIT, ErrorLogEntry};

use super::RunMetadata;
use super::format::{CustomDisplay, fixed2, percent, write_line};

/// Error rate under which a custom `_errors` metric is shown as passing.
const ERROR_RATE_PASS: f64 = 0.05;

const STYLE: &str = "body{font-family:sans-serif;margin:0;background:#f4f6f8;color:#222}\
.container{max-width:1100px;margin:0 auto;padding:24px}\
.header{background:#2c3e50;color:#fff;padding:24px;border-radius:6px}\
.metrics-grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(180px,1fr));gap:12px;margin:20px 0}\
.metric-card{background:#fff;border-radius:6px;padding:16px;box-shadow:0 1px 3px rgba(0,0,0,.1)}\
.metric-value{font-size:1.6em;font-weight:bold}\
.section{background:#fff;border-radius:6px;padding:16px;margin:20px 0}\
.threshold-pass{color:#27ae60}.threshold-fail{color:#c0392b}\
.error-entry{border-left:4px solid #c0392b;padding:8px 12px;margin:10px 0;background:#fdf2f2}\
pre{white-space:pre-wrap;word-break:break-all}\
.footer{text-align:center;color:#777;font-size:.9em}";

/// Standalone HTML report with metric cards, configuration and error log.
pub(super) fn render(
    snapshot: &MetricsSnapshot,
    metadata: &RunMetadata,
    error_log: &[ErrorLogEntry],
    generated: &str,
) -> AppResult<String> {
    let mut output = String::new();
    write_line(&mut output, "<!DOCTYPE html>")?;
    write_line(&mut output, "<html lang=\"en\">")?;
    write_line(&mut output, "<head>")?;
    write_line(&mut output, "<meta charset=\"utf-8\">")?;
    write_line(
        &mut output,
        &format!(
            "<title>Load Test Report - {} / {}</title>",
            metadata.scene,
            encode_text(&metadata.test_name)
        ),
    )?;
    write_line(&mut output, &format!("<style>{}</style>", STYLE))?;
    write_line(&mut output, "</head>")?;
    write_line(&mut output, "<body>")?;
    write_line(&mut output, "<div class=\"container\">")?;

    header(&mut output, metadata, generated)?;
    metric_cards(&mut output, snapshot)?;
    custom_metrics(&mut output, snapshot)?;
    configuration(&mut output, metadata)?;
    threshold_results(&mut output, snapshot)?;
    errors(&mut output, error_log)?;

    write_line(
        &mut output,
        &format!(
            "<p class=\"footer\">Generated by loadscene on {}</p>",
            encode_text(generated)
        ),
    )?;
    write_line(&mut output, "</div>")?;
    write_line(&mut output, "</body>")?;
    write_line(&mut output, "</html>")?;
    Ok(output)
}

fn header(output: &mut String, metadata: &RunMetadata, generated: &str) -> AppResult<()> {
    write_line(output, "<div class=\"header\">")?;
    write_line(output, "<h1>Load Test Report</h1>")?;
    let rows = [
        ("Scene", metadata.scene.to_string()),
        ("Test", metadata.test_name.clone()),
        ("Setting", metadata.test_setting.name.clone()),
        ("Environment", metadata.environment.clone()),
        ("Started", metadata.test_start_time.clone()),
        (
            "Ended",
            metadata.test_end_time().unwrap_or("-").to_owned(),
        ),
        ("Generated", generated.to_owned()),
    ];
    for (label, value) in rows {
        write_line(
            output,
            &format!("<p><strong>{}:</strong> {}</p>", label, encode_text(&value)),
        )?;
    }
    write_line(output, "</div>")
}

fn card(output: &mut String, value: &str, label: &str) -> AppResult<()> {
    write_line(
        output,
        &format!(
            "<div class=\"metric-card\"><div class=\"metric-value\">{}</div><div>{}</div></div>",
            encode_text(value),
            label
        ),
    )
}

fn metric_cards(output: &mut String, snapshot: &MetricsSnapshot) -> AppResult<()> {
    let duration = snapshot.metric(names::HTTP_REQ_DURATION);
    let max_vus = snapshot
        .metric(names::VUS_MAX)
        .and_then(|values| values.value.or(values.max))
        .unwrap_or(0.0);
    let requests = snapshot
        .metric(names::HTTP_REQS)
        .and_then(|values| values.count)
        .unwrap_or(0.0);
    let failed = snapshot
        .metric(names::HTTP_REQ_FAILED)
        .and_then(|values| values.rate)
        .unwrap_or(0.0);

    write_line(output, "<div class=\"metrics-grid\">")?;
    card(
        output,
        &format!("{}s", fixed2(snapshot.state.test_run_duration_ms / 1000.0)),
        "Test Duration",
    )?;
    card(output, &max_vus.to_string(), "Max Virtual Users")?;
    card(output, &requests.to_string(), "Total Requests")?;
    card(output, &format!("{}%", percent(failed)), "Failed Requests")?;
    card(
        output,
        &format!(
            "{}ms",
            fixed2(duration.and_then(|values| values.avg).unwrap_or(0.0))
        ),
        "Avg Response Time",
    )?;
    card(
        output,
        &format!(
            "{}ms",
            fixed2(duration.and_then(|values| values.p95).unwrap_or(0.0))
        ),
        "95th Percentile",
    )?;
    write_line(output, "</div>")
}

fn custom_metrics(output: &mut String, snapshot: &MetricsSnapshot) -> AppResult<()> {
    let names = snapshot.custom_metric_names();
    if names.is_empty() {
        return Ok(());
    }
    write_line(output, "<div class=\"section\">")?;
    write_line(output, "<h2>Custom Metrics</h2>")?;
    write_line(output, "<div class=\"metrics-grid\">")?;
    for name in names {
        let Some(display) = snapshot
            .metric(name)
            .and_then(|values| CustomDisplay::for_metric(name, values))
        else {
            continue;
        };
        let class = match display {
            CustomDisplay::Percent(rate) if rate < ERROR_RATE_PASS => " threshold-pass",
            CustomDisplay::Percent(_) => " threshold-fail",
            CustomDisplay::Millis(_) | CustomDisplay::Count(_) => "",
        };
        write_line(
            output,
            &format!(
                "<div class=\"metric-card\" title=\"{}\"><div class=\"metric-value{}\">{}</div><div>{}</div></div>",
                encode_double_quoted_attribute(name),
                class,
                encode_text(&display.render()),
                encode_text(name)
            ),
        )?;
    }
    write_line(output, "</div>")?;
    write_line(output, "</div>")
}

fn scenario_lines(spec: &ScenarioSpec) -> Vec<String> {
    let mut lines = vec![format!("Executor: {}", spec.executor())];
    match spec {
        ScenarioSpec::ConstantVus { vus, duration } => {
            lines.push(format!("VUs: {}", vus));
            lines.push(format!("Duration: {}", duration));
        }
        ScenarioSpec::RampingVus { start_vus, stages } => {
            lines.push(format!("Start VUs: {}", start_vus));
            for stage in stages {
                lines.push(format!(
                    "Stage - Duration: {}, Target: {} VUs",
                    stage.duration, stage.target
                ));
            }
        }
        ScenarioSpec::ConstantArrivalRate {
            rate,
            time_unit,
            duration,
            pre_allocated_vus,
            max_vus,
        } => {
            lines.push(format!("Rate: {}/{}", rate, time_unit));
            lines.push(format!("Duration: {}", duration));
            lines.push(format!("Pre-allocated VUs: {}", pre_allocated_vus));
            lines.push(format!("Max VUs: {}", max_vus));
        }
    }
    lines
}

fn configuration(output: &mut String, metadata: &RunMetadata) -> AppResult<()> {
    let setting = &metadata.test_setting;
    write_line(output, "<div class=\"section\">")?;
    write_line(output, "<h2>Test Configuration</h2>")?;
    write_line(
        output,
        &format!(
            "<p><strong>Setting:</strong> {} - {}</p>",
            encode_text(&setting.name),
            encode_text(&setting.description)
        ),
    )?;
    write_line(
        output,
        &format!(
            "<p><strong>Sleep Duration:</strong> {}s</p>",
            setting.sleep_duration
        ),
    )?;
    for (name, spec) in &setting.scenarios {
        write_line(output, &format!("<h3>Scenario: {}</h3>", encode_text(name)))?;
        write_line(output, "<ul>")?;
        for line in scenario_lines(spec) {
            write_line(output, &format!("<li>{}</li>", encode_text(&line)))?;
        }
        write_line(output, "</ul>")?;
    }
    if !setting.thresholds.is_empty() {
        write_line(output, "<h3>Thresholds</h3>")?;
        write_line(output, "<ul>")?;
        for (metric, expressions) in &setting.thresholds {
            write_line(
                output,
                &format!(
                    "<li><strong>{}:</strong> {}</li>",
                    encode_text(metric),
                    encode_text(&expressions.join(", "))
                ),
            )?;
        }
        write_line(output, "</ul>")?;
    }
    write_line(output, "</div>")
}

fn threshold_results(output: &mut String, snapshot: &MetricsSnapshot) -> AppResult<()> {
    let results: Vec<(&String, &String, bool)> = snapshot
        .metrics
        .iter()
        .flat_map(|(name, summary)| {
            summary
                .thresholds
                .iter()
                .map(move |(expression, status)| (name, expression, status.ok))
        })
        .collect();
    if results.is_empty() {
        return Ok(());
    }
    write_line(output, "<div class=\"section\">")?;
    write_line(output, "<h2>Threshold Results</h2>")?;
    write_line(output, "<ul>")?;
    for (name, expression, ok) in results {
        let (class, verdict) = if ok {
            ("threshold-pass", "PASS")
        } else {
            ("threshold-fail", "FAIL")
        };
        write_line(
            output,
            &format!(
                "<li class=\"{}\">{} {}: {}</li>",
                class,
                verdict,
                encode_text(name),
                encode_text(expression)
            ),
        )?;
    }
    write_line(output, "</ul>")?;
    write_line(output, "</div>")
}

fn errors(output: &mut String, error_log: &[ErrorLogEntry]) -> AppResult<()> {
    write_line(output, "<div class=\"section\">")?;
    write_line(
        output,
        &format!("<h2>Error Logs ({})</h2>", error_log.len()),
    )?;
    if error_log.is_empty() {
        write_line(output, "<p>No errors detected during test execution</p>")?;
        return write_line(output, "</div>");
    }
    for entry in error_log {
        write_line(output, "<div class=\"error-entry\">")?;
        write_line(
            output,
            &format!(
                "<p><strong>{} - VU{} - {}/{}</strong></p>",
                encode_text(&entry.timestamp),
                entry.vu_id,
                entry.scene,
                encode_text(&entry.test)
            ),
        )?;
        write_line(
            output,
            &format!("<p>Error: {}</p>", encode_text(&entry.message)),
        )?;
        if let Some(status) = entry.http_status {
            write_line(output, &format!("<p>HTTP Status: {}</p>", status))?;
        }
        if let Some(body) = entry.body_excerpt.as_deref() {
            let excerpt: String = body.chars().take(BODY_EXCERPT_LIMIT).collect();
            write_line(
                output,
                &format!("<pre>{}</pre>", encode_text(&excerpt)),
            )?;
        }
        write_line(output, "</div>")?;
    }
    write_line(output, "</div>")
}
