use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod dataset;
mod error;
mod extract;
mod grid;
mod metrics;
mod models;
mod narrative;
mod report;
mod rules;
mod score;

use models::NormalizedDataset;
use narrative::{NarrativeConfig, OpenAiClient};

#[derive(Parser)]
#[command(name = "event-insights")]
#[command(
    about = "Compile event workbooks, score engagement and draft an AI narrative report",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ExtractArgs {
    /// Folder holding the per-event "Event Management" workbooks
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Where the compiled dataset is written
    #[arg(long, default_value = "data/compiled_events.xlsx")]
    out: PathBuf,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[arg(long, default_value = "data/compiled_events.xlsx")]
    dataset: PathBuf,
    #[arg(long, default_value = "dashboard/data/analysis_results.json")]
    out: PathBuf,
    #[arg(long, env = "EVENT_ORG_NAME", default_value = "Your Organization")]
    org_name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan workbooks and write the compiled events dataset
    Extract(ExtractArgs),
    /// Compute metrics, request the narrative and write the results document
    Analyze(AnalyzeArgs),
    /// Extract then analyze
    Run {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long, default_value = "data/compiled_events.xlsx")]
        dataset: PathBuf,
        #[arg(long, default_value = "dashboard/data/analysis_results.json")]
        out: PathBuf,
        #[arg(long, env = "EVENT_ORG_NAME", default_value = "Your Organization")]
        org_name: String,
    },
    /// Write the compiled events as a flat CSV file
    Export {
        #[arg(long, default_value = "data/compiled_events.xlsx")]
        dataset: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => {
            run_extract(&args)?;
        }
        Commands::Analyze(args) => {
            run_analyze(&args).await?;
        }
        Commands::Run {
            data_dir,
            dataset,
            out,
            org_name,
        } => {
            let compiled = run_extract(&ExtractArgs {
                data_dir,
                out: dataset.clone(),
            })?;
            if compiled.is_empty() {
                anyhow::bail!("no events were extracted; nothing to analyze");
            }
            run_analyze(&AnalyzeArgs {
                dataset,
                out,
                org_name,
            })
            .await?;
        }
        Commands::Export {
            dataset: dataset_path,
            csv,
        } => {
            let compiled = dataset::read_dataset(&dataset_path)?;
            let rows = dataset::export_csv(&compiled, &csv)?;
            println!("Exported {rows} events to {}.", csv.display());
        }
    }

    Ok(())
}

fn run_extract(args: &ExtractArgs) -> anyhow::Result<NormalizedDataset> {
    let compiled = extract::extract_all(&args.data_dir)?;

    if compiled.is_empty() {
        println!(
            "No events found. Make sure your Event Management workbooks are in {}.",
            args.data_dir.display()
        );
    }

    dataset::write_dataset(&compiled, &args.out)?;
    print_compiled(&compiled, &args.out);
    Ok(compiled)
}

fn print_compiled(compiled: &NormalizedDataset, out: &Path) {
    println!("Compiled data saved to {}.", out.display());
    println!("Total events: {}", compiled.events.len());
    for event in &compiled.events {
        let date = event
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undated".to_string());
        let actual = event
            .actual_attendance
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let budget = event
            .total_budget
            .map(|b| format!("${b:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "- {} ({}, {}) attended {} budget {}",
            event.name, event.event_type, date, actual, budget
        );
    }

    let demographics = compiled.demographics.non_zero();
    if !demographics.is_empty() {
        println!("Aggregate demographics:");
        for (category, count) in demographics.iter() {
            println!("  {}: {}", category.label(), count);
        }
    }
}

async fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<()> {
    let config = NarrativeConfig::from_env().context("text-generation service is not configured")?;
    let client = OpenAiClient::new(config);
    tracing::info!(org = %args.org_name, model = client.model(), "starting analysis");

    let result = report::run_analysis(&args.dataset, &args.out, &args.org_name, &client)
        .await
        .context("analysis failed")?;

    let summary = &result.data_summary;
    println!("Total events: {}", summary.total_events);
    println!("Total attendees: {}", summary.total_attendees);
    println!("Average attendance: {:.0}", summary.avg_attendance);
    println!("Overall attendance rate: {:.1}%", summary.attendance_rate);
    if let Some(total_budget) = summary.total_budget {
        println!("Total budget: ${total_budget:.2}");
    }
    if let Some(cpa) = summary.cost_per_attendee {
        println!("Cost per attendee: ${cpa:.2}");
    }
    println!(
        "Engagement score: {:.1} ({})",
        result.engagement_score.score, result.engagement_score.grade
    );
    println!("Results written to {}.", args.out.display());

    Ok(())
}
