// Prometheus metrics for the command gateway
//
// Exposed on the optional /metrics endpoint:
// - Tool calls by tool and outcome (counter)
// - Denials by reason (counter)
// - Timeouts by CLI family (counter)
// - Command duration by CLI family (histogram)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref TOOL_CALLS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("tool_calls_total", "Total number of MCP tool calls"),
        &["tool", "status"]
    ).expect("Failed to create tool calls metric");

    pub static ref COMMAND_DENIALS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("command_denials_total", "Commands refused by the access policy"),
        &["reason"]
    ).expect("Failed to create command denials metric");

    pub static ref COMMAND_TIMEOUTS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("command_timeouts_total", "Commands killed at their deadline"),
        &["family"]
    ).expect("Failed to create command timeouts metric");

    pub static ref COMMAND_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("command_duration_seconds", "Wall time of executed commands"),
        &["family"]
    ).expect("Failed to create command duration metric");
}

/// Register all metrics; safe to call more than once
pub fn init() -> prometheus::Result<()> {
    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(TOOL_CALLS_TOTAL.clone()),
        Box::new(COMMAND_DENIALS_TOTAL.clone()),
        Box::new(COMMAND_TIMEOUTS_TOTAL.clone()),
        Box::new(COMMAND_DURATION_SECONDS.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub fn record_tool_call(tool: &str, status: &str) {
    TOOL_CALLS_TOTAL.with_label_values(&[tool, status]).inc();
}

pub fn record_denial(reason: &str) {
    COMMAND_DENIALS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_timeout(family: &str) {
    COMMAND_TIMEOUTS_TOTAL.with_label_values(&[family]).inc();
}

pub fn observe_command_duration(family: &str, seconds: f64) {
    COMMAND_DURATION_SECONDS
        .with_label_values(&[family])
        .observe(seconds);
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
