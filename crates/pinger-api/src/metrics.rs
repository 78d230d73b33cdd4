use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

fn family(out: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
    let _ = writeln!(out, "# HELP {} {}", name, help);
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    family(out, name, "gauge", help);
    let _ = writeln!(out, "{} {}", name, value);
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    family(out, name, "counter", help);
    let _ = writeln!(out, "{}_total {}", name, value);
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = &state.scheduler;
    let status = scheduler.status().await;
    let stats = status.stats;
    let mut out = String::with_capacity(2048);

    family(&mut out, "pinger_info", "info", "Information about the pinger");
    let _ = writeln!(
        out,
        "pinger_info{{started=\"{}\",schedule=\"{}\"}} 1",
        status.started_at.to_rfc3339(),
        status.schedule
    );

    gauge(
        &mut out,
        "pinger_uptime_seconds",
        "Time since the pinger started",
        format!("{:.3}", status.uptime_secs),
    );
    gauge(
        &mut out,
        "pinger_interval_seconds",
        "Seconds between scheduled cycles",
        status.interval_secs,
    );
    gauge(
        &mut out,
        "pinger_monitored_urls",
        "Number of configured target URLs",
        scheduler.configured_urls().len(),
    );
    gauge(
        &mut out,
        "pinger_webhooks",
        "Number of configured webhook endpoints",
        scheduler.webhook_urls().len(),
    );
    gauge(
        &mut out,
        "pinger_last_cycle_targets",
        "Targets probed in the most recent cycle",
        stats.last_cycle_total,
    );
    gauge(
        &mut out,
        "pinger_last_cycle_successful",
        "Targets that responded in the most recent cycle",
        stats.last_cycle_success,
    );

    counter(&mut out, "pinger_cycles", "Ping cycles completed", stats.cycles);
    counter(&mut out, "pinger_probes", "Probes sent", stats.probes);
    counter(
        &mut out,
        "pinger_probe_failures",
        "Probes that ended in an error",
        stats.probe_failures,
    );
    counter(
        &mut out,
        "pinger_notifications",
        "Notifications handed to the webhook dispatcher",
        stats.notifications,
    );
    counter(
        &mut out,
        "pinger_webhook_deliveries",
        "Webhook POSTs accepted by their endpoint",
        stats.webhook_deliveries,
    );
    counter(
        &mut out,
        "pinger_webhook_failures",
        "Webhook POSTs that failed",
        stats.webhook_failures,
    );

    if let Some(t) = status.last_run_at {
        let secs = t.timestamp() as f64 + (t.timestamp_subsec_millis() as f64 / 1000.0);
        gauge(
            &mut out,
            "pinger_last_run_timestamp_seconds",
            "Unix timestamp of the last cycle start",
            format!("{:.3}", secs),
        );
    }

    let _ = writeln!(out, "# EOF");

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
