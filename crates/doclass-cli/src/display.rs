//! Human-readable reports for the CLI.
//!
//! Tables go to stdout; logs go to stderr through tracing.

use std::path::Path;

use doclass_ai::{Dataset, TrainingOutcome, TrialResult};
use doclass_core::{ClassifyResponse, GatewayResponse};

use crate::embed::DatasetStats;

const TOP_FEATURES: usize = 10;
const TOP_TRIALS: usize = 5;

// ── Dataset ──

pub fn print_dataset_summary(path: &Path, stats: &DatasetStats) {
    println!("=== Dataset {} ===", path.display());
    println!("  {:<26} {}", "examples", stats.examples);
    println!("  {:<26} {}", "dimension", stats.dim);
    println!("  {:<26} {:.1}s", "elapsed", stats.elapsed_secs);
    println!();
    println!("Labels");
    for (label, n) in &stats.class_counts {
        println!("  {:<26} {}", label, n);
    }
}

// ── Training ──

pub fn print_training_report(outcome: &TrainingOutcome, dataset: &Dataset) {
    println!("=== Training ===");
    println!("  {:<26} {}", "examples", dataset.len());
    println!("  {:<26} {}", "labels", dataset.labels.labels().join(", "));
    println!("  {:<26} {}", "train", outcome.train_size);
    println!("  {:<26} {}", "held out", outcome.holdout_size);
    println!("  {:<26} {}", "trials", outcome.study.len());
    println!();

    print_top_trials(outcome.study.trials());

    if let Some(best) = outcome.study.best() {
        println!(
            "Best trial #{} (validation accuracy {:.4})",
            best.number, best.validation_accuracy
        );
        for (name, value) in &best.params {
            println!("  {:<26} {}", name, value);
        }
        println!();
    }

    println!("Held-out accuracy: {:.4}", outcome.holdout_accuracy);
    println!();

    if !outcome.predictions.is_empty() {
        println!("Sample predictions");
        println!("  {:<26} {}", "true", "predicted");
        for pair in &outcome.predictions {
            let mark = if pair.true_label == pair.predicted_label { "" } else { "  ✗" };
            println!("  {:<26} {}{}", pair.true_label, pair.predicted_label, mark);
        }
        println!();
    }

    let used: Vec<_> = outcome
        .feature_importance
        .iter()
        .filter(|(_, splits)| *splits > 0)
        .take(TOP_FEATURES)
        .collect();
    if !used.is_empty() {
        println!("Top features (split count)");
        for (feature, splits) in used {
            println!("  {:<26} {}", format!("feature {feature}"), splits);
        }
    }
}

fn print_top_trials(trials: &[TrialResult]) {
    let mut ranked: Vec<&TrialResult> = trials.iter().collect();
    ranked.sort_by(|a, b| {
        b.validation_accuracy
            .total_cmp(&a.validation_accuracy)
            .then(a.number.cmp(&b.number))
    });
    if ranked.is_empty() {
        return;
    }

    println!("Top trials");
    for t in ranked.iter().take(TOP_TRIALS) {
        let boosting = t
            .params
            .get("boosting_type")
            .map(ToString::to_string)
            .unwrap_or_default();
        let rounds = t
            .params
            .get("num_round")
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "  #{:<4} {:.4}  {:<5} rounds={}",
            t.number, t.validation_accuracy, boosting, rounds
        );
    }
    if ranked.len() > TOP_TRIALS {
        println!("  ... and {} more", ranked.len() - TOP_TRIALS);
    }
    println!();
}

// ── Inference ──

pub fn print_gateway_response(response: &GatewayResponse) {
    let envelope = serde_json::json!({
        "statusCode": response.status_code,
        "body": response.body,
    });
    println!("{envelope}");
    match response.classification() {
        Ok(result) if response.is_success() => print_classification(&result),
        _ => {
            if let Ok(err) = response.error_body() {
                eprintln!("error ({}): {}", response.status_code, err.error);
            }
        }
    }
}

pub fn print_classification(result: &ClassifyResponse) {
    println!("  {:<26} {}", "message", result.message);
    println!("  {:<26} {}", "label", result.label);
}
