//! Agreement Report Binary
//!
//! Aligns the rater documents of a JSON request and prints the agreement
//! result as JSON on stdout.
//!
//! ## Request
//!
//! ```json
//! {
//!   "adapters": [{"layer": "NamedEntity", "kind": {"type": "span"},
//!                 "features": [{"name": "value", "kind": {"type": "single"}}]}],
//!   "layer": "NamedEntity",
//!   "feature": "value",
//!   "measure": "cohen_kappa",
//!   "traits": {"exclude_incomplete": true},
//!   "raters": [{"rater": "alice", "documents": [...]}]
//! }
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin agreement-report --features cli -- request.json --pairwise
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use annotation_agreement::{
    AgreementTraits, CodingAgreementMeasure, CodingStatistic, CohenKappa, DiffAdapter, DiffResult,
    FleissKappa, InMemoryDocument, KrippendorffAlphaNominal, KrippendorffAlphaUnitizing, PositionAligner,
    RaterId, UnitizingAgreementMeasure,
};

#[derive(Parser)]
#[command(name = "agreement-report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-annotator diff and inter-rater agreement", long_about = None)]
struct Cli {
    /// Path to the JSON request
    request: PathBuf,

    /// Override the measure named in the request
    #[arg(short, long, value_enum)]
    measure: Option<MeasureName>,

    /// Compute one coefficient per rater pair
    #[arg(long)]
    pairwise: bool,

    /// Worker threads for pairwise computation
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Print the configuration set dump to stderr
    #[arg(long)]
    dump: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
enum MeasureName {
    CohenKappa,
    FleissKappa,
    KrippendorffAlphaNominal,
    KrippendorffAlphaUnitizing,
}

#[derive(Debug, Deserialize)]
struct Request {
    adapters: Vec<DiffAdapter>,
    layer: String,
    feature: String,
    measure: Option<MeasureName>,
    #[serde(default)]
    traits: AgreementTraits,
    raters: Vec<RaterDocuments>,
}

#[derive(Debug, Deserialize)]
struct RaterDocuments {
    rater: RaterId,
    documents: Vec<InMemoryDocument>,
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agreement_report=info,annotation_agreement=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let request: Request = serde_json::from_str(&std::fs::read_to_string(&cli.request)?)?;
    let measure = cli
        .measure
        .or(request.measure)
        .ok_or("no measure given on the command line or in the request")?;

    let inputs: Vec<(RaterId, &InMemoryDocument)> = request
        .raters
        .iter()
        .flat_map(|r| r.documents.iter().map(move |d| (r.rater.clone(), d)))
        .collect();

    info!(
        raters = request.raters.len(),
        documents = inputs.len(),
        measure = ?measure,
        layer = %request.layer,
        feature = %request.feature,
        "Computing agreement"
    );

    let diff = PositionAligner::new(request.adapters.clone())?.align(&inputs)?;
    if cli.dump {
        eprint!("{}", diff.print());
    }

    let output = match measure {
        MeasureName::CohenKappa => coding(CohenKappa, &request, &cli, &diff)?,
        MeasureName::FleissKappa => coding(FleissKappa, &request, &cli, &diff)?,
        MeasureName::KrippendorffAlphaNominal => coding(KrippendorffAlphaNominal, &request, &cli, &diff)?,
        MeasureName::KrippendorffAlphaUnitizing => {
            let measure = UnitizingAgreementMeasure::new(
                KrippendorffAlphaUnitizing,
                request.layer.as_str(),
                request.feature.as_str(),
                request.traits.clone(),
            )
            .with_threads(cli.threads);
            if cli.pairwise {
                serde_json::to_value(measure.pairwise(&diff, &inputs)?)?
            } else {
                serde_json::to_value(measure.full(&diff, &inputs)?)?
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn coding<S: CodingStatistic>(
    statistic: S,
    request: &Request,
    cli: &Cli,
    diff: &DiffResult,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let measure = CodingAgreementMeasure::new(
        statistic,
        request.layer.as_str(),
        request.feature.as_str(),
        request.traits.clone(),
    )
    .with_threads(cli.threads);
    let value = if cli.pairwise {
        serde_json::to_value(measure.pairwise(diff)?)?
    } else {
        serde_json::to_value(measure.full(diff)?)?
    };
    Ok(value)
}
