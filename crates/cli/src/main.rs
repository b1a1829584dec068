//! callsim: call-center dispatch and escalation simulator
//!
//! Thin command-line wrapper over `callsim-dispatch-engine`: parses flags,
//! optionally loads a TOML configuration file, wires up tracing, runs one
//! simulation to completion, and prints a text or JSON summary. Ctrl-C
//! interrupts cleanly: in-flight calls are abandoned and every employee is
//! released before the process exits.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use callsim_dispatch_engine::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Call-center dispatch and escalation simulator", long_about = None)]
struct Args {
    /// Path to a TOML configuration file (missing sections use defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of random-duration calls to simulate
    #[arg(short = 'n', long, default_value = "10")]
    calls: usize,

    /// Comma-separated fixed service durations in ms (overrides --calls)
    #[arg(long, value_delimiter = ',')]
    durations: Option<Vec<u64>>,

    /// Seed for the duration generator, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Everything one run produced, for the `--json` summary
#[derive(Serialize)]
struct RunSummary {
    config: EngineConfig,
    stats: EngineStats,
    assignments: Vec<AssignmentRecord>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("callsim={}", log_level).parse()?)
                .add_directive(format!("callsim_dispatch_engine={}", log_level).parse()?),
        )
        .init();

    let config = load_config(args.config.as_deref())?;
    info!(
        "☎️ callsim starting: {} workers, {} queue slots, roster {}/{}/{}",
        config.dispatcher.worker_count,
        config.dispatcher.admission_queue_capacity,
        config.roster.frontline,
        config.roster.supervisor,
        config.roster.senior
    );

    let recorder = Arc::new(MemoryRecorder::new());
    let engine = DispatchEngine::builder(config.clone())
        .with_recorder(Arc::clone(&recorder) as Arc<dyn AssignmentRecorder>)
        .build()?;

    let source = build_source(&args, &config.calls)?;
    drive(Arc::clone(&engine), source, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    let stats = engine.stats().await;
    if args.json {
        let summary = RunSummary {
            config,
            stats,
            assignments: recorder.records(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&stats, &recorder.records());
    }
    Ok(())
}

/// Feed the source through the engine, racing the run against an interrupt
///
/// The feed runs as its own task, so an interrupt never cancels a submission
/// halfway through: a dispatch that started completes its accounting before
/// the engine winds down.
async fn drive(
    engine: Arc<DispatchEngine>,
    source: Box<dyn CallSource>,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let mut feed = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run(source).await }
    });
    tokio::select! {
        outcome = &mut feed => {
            outcome??;
            engine.drain().await?;
        }
        _ = interrupt => {
            warn!("⚠️ interrupted; abandoning in-flight calls");
            engine.shutdown().await?;
            let _ = feed.await;
        }
    }
    Ok(())
}

/// Read the configuration file, or fall back to the defaults
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let config: EngineConfig =
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Choose the call source the flags describe
fn build_source(args: &Args, durations: &CallDurationConfig) -> anyhow::Result<Box<dyn CallSource>> {
    if let Some(list) = &args.durations {
        anyhow::ensure!(
            list.iter().all(|&ms| ms > 0),
            "service durations must be positive"
        );
        info!("🎬 fixed scenario: {} calls", list.len());
        return Ok(Box::new(FixedCallSource::new(list.clone())));
    }

    let min = durations.min_duration_ms;
    let spread = durations.max_duration_spread_ms;
    match args.seed {
        Some(seed) => {
            info!(
                "🎬 {} random calls in [{}, {}] ms, seed {}",
                args.calls,
                min,
                durations.max_duration_ms(),
                seed
            );
            Ok(Box::new(RandomCallSource::with_seed(
                args.calls, min, spread, seed,
            )))
        }
        None => {
            info!(
                "🎬 {} random calls in [{}, {}] ms",
                args.calls,
                min,
                durations.max_duration_ms()
            );
            Ok(Box::new(RandomCallSource::new(args.calls, min, spread)))
        }
    }
}

fn print_summary(stats: &EngineStats, assignments: &[AssignmentRecord]) {
    println!();
    println!("📊 Run summary");
    println!(
        "   submitted {}   accepted {}   dropped {}",
        stats.calls_submitted, stats.calls_accepted, stats.calls_dropped
    );
    println!(
        "   served {}   (frontline {} / supervisor {} / senior {})",
        stats.calls_served,
        stats.assignments_by_tier.frontline,
        stats.assignments_by_tier.supervisor,
        stats.assignments_by_tier.senior
    );
    println!("   abandoned {}", stats.calls_abandoned);

    if !assignments.is_empty() {
        println!();
        println!("   completion order:");
        for record in assignments {
            println!(
                "   {:>3}. call {} → {} ({})",
                record.sequence_index + 1,
                record.call_id,
                record.employee_id,
                record.tier
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_file_fills_in_defaults() {
        let parsed: EngineConfig = toml::from_str("[roster]\nfrontline = 2\n").expect("parse");
        assert_eq!(parsed.roster.frontline, 2);
        assert_eq!(parsed.roster.supervisor, 3);
        assert_eq!(parsed.dispatcher.worker_count, 10);
        assert_eq!(parsed.escalation.backoff_interval_ms, 500);
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let args = Args::parse_from(["callsim", "--durations", "100,0,300"]);
        let result = build_source(&args, &CallDurationConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_fixed_durations_override_the_call_count() {
        let args = Args::parse_from(["callsim", "-n", "99", "--durations", "100,200"]);
        let mut source = build_source(&args, &CallDurationConfig::default()).expect("source");
        assert!(source.next_call().is_some());
        assert!(source.next_call().is_some());
        assert!(source.next_call().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_an_interrupt_mid_run_keeps_admission_accounting_exact() {
        let mut config = EngineConfig::default();
        config.dispatcher.worker_count = 1;
        config.dispatcher.admission_queue_capacity = 2;
        config.roster.frontline = 1;
        config.roster.supervisor = 0;
        config.roster.senior = 0;

        let engine = DispatchEngine::new(config).expect("engine");
        let source: Box<dyn CallSource> =
            Box::new(FixedCallSource::new([600_000, 600_000, 600_000, 600_000, 600_000]));

        // The feed saturates admission and parks in the rejection cooldown;
        // the interrupt lands while calls 2 and 3 are still queued.
        drive(
            Arc::clone(&engine),
            source,
            tokio::time::sleep(std::time::Duration::from_millis(5)),
        )
        .await
        .expect("drive");

        let stats = engine.stats().await;
        assert_eq!(stats.calls_submitted, 4);
        assert_eq!(stats.calls_accepted, 3);
        assert_eq!(stats.calls_dropped, 1);
        assert_eq!(stats.calls_served, 0);
        assert_eq!(stats.calls_abandoned, stats.calls_accepted);
    }
}
