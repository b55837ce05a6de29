use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use callguard::config::WrapperSettings;
use callguard::wrap::GuardConfig;
use callguard::{debounce, guard, throttle};

/// Replays scripted call timelines through the callguard wrappers.
#[derive(Debug, Parser)]
#[command(name = "callguard-demo", version, about)]
struct Args {
    /// Which wrapper to exercise
    #[arg(value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// YAML settings file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Guard,
    Throttle,
    Debounce,
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Starting callguard demo");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = match &args.config {
        Some(path) => WrapperSettings::from_file(path)?,
        None => WrapperSettings::default(),
    };

    if matches!(args.scenario, Scenario::Guard | Scenario::All) {
        run_guard(&settings).await;
    }
    if matches!(args.scenario, Scenario::Throttle | Scenario::All) {
        run_throttle(&settings).await;
    }
    if matches!(args.scenario, Scenario::Debounce | Scenario::All) {
        run_debounce(&settings).await;
    }

    info!("Callguard demo finished");
    Ok(())
}

/// Call a guarded function one more time than its limit allows.
async fn run_guard(settings: &WrapperSettings) {
    let attempts = settings.guard.invocation_limit.saturating_add(1);
    let config: GuardConfig<String, String> = settings.guard.clone().into();
    let config = config
        .arguments(vec!["bound".to_string()])
        .on_timeout(|| warn!("Guarded function was never called before its deadline"));

    let guarded = guard(
        |scope: &String, args: &[String]| format!("{}({})", scope, args.join(", ")),
        config,
    );

    info!(
        invocation_limit = settings.guard.invocation_limit,
        time_limit = ?settings.guard.time_limit(),
        "Running guard scenario"
    );

    if let Some(extender) = guarded.extender() {
        if let Some(time_limit) = settings.guard.time_limit() {
            match extender.extend(time_limit) {
                Ok(()) => info!(time_limit_ms = time_limit.as_millis() as u64, "Extended deadline"),
                Err(e) => warn!(error = %e, "Could not extend deadline"),
            }
        }
    }

    for attempt in 1..=attempts {
        match guarded.call("demo".to_string(), vec![format!("call {}", attempt)]) {
            Ok(Some(output)) => info!(attempt, output = %output, "Guarded call ran"),
            Ok(None) => info!(attempt, "Guarded call deferred or dropped"),
            Err(e) => warn!(attempt, error = %e, "Guarded call refused"),
        }
    }

    // Let delayed calls land before moving on.
    sleep(settings.guard.delay() + Duration::from_millis(10)).await;
}

/// Calls at 0, 100, 100 and 300 ms against the configured threshold.
async fn run_throttle(settings: &WrapperSettings) {
    let start = Instant::now();
    let throttled = throttle(
        move |_: &(), args: &[u64]| {
            info!(
                requested_at_ms = args[0],
                ran_at_ms = start.elapsed().as_millis() as u64,
                "Throttled function ran"
            );
        },
        settings.throttle.threshold(),
    );

    info!(threshold = ?throttled.threshold(), "Running throttle scenario");

    let mut now_ms = 0;
    for at_ms in [0, 100, 100, 300] {
        sleep(Duration::from_millis(at_ms - now_ms)).await;
        now_ms = at_ms;
        throttled.call((), vec![at_ms]);
    }

    sleep(throttled.threshold() * 2).await;
}

/// Calls at 0, 50 and 100 ms against the configured quiet period.
async fn run_debounce(settings: &WrapperSettings) {
    let start = Instant::now();
    let debounced = debounce(
        move |_: &(), args: &[u64]| {
            info!(
                requested_at_ms = args[0],
                ran_at_ms = start.elapsed().as_millis() as u64,
                "Debounced function ran"
            );
        },
        settings.debounce.quiet_period(),
    );

    info!(quiet_period = ?debounced.quiet_period(), "Running debounce scenario");

    let mut now_ms = 0;
    for at_ms in [0, 50, 100] {
        sleep(Duration::from_millis(at_ms - now_ms)).await;
        now_ms = at_ms;
        debounced.call((), vec![at_ms]);
    }

    sleep(debounced.quiet_period() + Duration::from_millis(50)).await;
}
