//! Run a grid sweep against the in-process local backend and print the
//! ranked results.
//!
//! ```sh
//! RUST_LOG=info cargo run -p hs-runner --example local_sweep
//! ```

use std::collections::HashMap;

use hs_runner::{ExecutionBackend, LocalBackend, LocalBackendConfig, Sweep, SweepConfig};
use hs_search::SearchSpace;
use hs_types::Goal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let space = SearchSpace::new()
        .add_choice(
            "learning_rate",
            vec![
                serde_json::json!(0.0005),
                serde_json::json!(0.005),
                serde_json::json!(0.02),
            ],
        )
        .add_choice(
            "min_size",
            vec![serde_json::json!(600), serde_json::json!(800)],
        );

    let config = SweepConfig::new("local_detection_sweep", space)
        .with_concurrency(2)
        .with_goal("accuracy", Goal::Maximize)
        .with_poll_interval(10, 100);

    // Stand-in for the real training job: accuracy peaks at a moderate
    // learning rate and benefits from the larger input size.
    let mut backend = LocalBackend::new(
        LocalBackendConfig {
            auto_complete: true,
            ..Default::default()
        },
        |args| {
            let lr = args
                .get("learning_rate")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let min_size = args.get("min_size").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let lr_score = 1.0 - ((lr.ln() - 0.005f64.ln()).abs() / 10.0);
            let size_score = if min_size >= 800.0 { 0.05 } else { 0.0 };
            let mut metrics = HashMap::new();
            metrics.insert("accuracy".to_string(), lr_score + size_score);
            Ok(metrics)
        },
    );
    backend.connect().await?;

    let mut sweep = Sweep::new(config)?;
    let report = sweep.run(&mut backend).await?;

    println!("runs (best first):");
    for run in &report.runs {
        println!(
            "  #{:<2} {:?} metric={:?} params={:?}",
            run.run_number, run.status, run.metric, run.parameters
        );
    }

    if let Some(best) = report.best() {
        println!(
            "best run: #{} metric={:.4}",
            best.run_number,
            best.metric.unwrap_or(f64::NAN)
        );
    }

    backend.disconnect().await?;
    Ok(())
}
