//! jobbot: job offer recommendations for job seekers

use chrono::{Local, NaiveDate};
use clap::Parser;
use colored::Colorize;
use jobbot::availability::expire_offers;
use jobbot::cli::{Cli, Commands, ConfigAction, ModelAction};
use jobbot::config::Config;
use jobbot::error::{JobbotError, Result};
use jobbot::output::{ConsoleFormatter, OutputFormatter, ReportWriter, UserReport};
use jobbot::pipeline::{load_inputs, score_latest, Pipeline, RunOptions, RunReport, RunStatus};
use jobbot::processing::embedding_manager::EmbeddingModelManager;
use jobbot::processing::embeddings::StaticEmbedder;
use jobbot::processing::preprocessor::Preprocessor;
use jobbot::processing::retriever::MatchRetriever;
use log::error;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config, cli.config).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config: Config, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Run {
            skip_availability,
            skip_preprocess,
            date,
        } => {
            config.ensure_dirs()?;
            let embedder = StaticEmbedder::from_config(&config).await?;
            let pipeline = Pipeline::new(&config, &embedder);
            let options = RunOptions {
                skip_preprocess,
                skip_availability,
            };

            let report = pipeline.run(run_date(date), options).await?;
            print_run_report(&report);
        }

        Commands::Preprocess { date } => {
            let summary = Preprocessor::new(&config)?.run(run_date(date))?;
            println!("🧹 {} scraped postings processed", summary.scraped);
            println!("   Kept: {}", summary.kept);
            println!("   Outside recency window: {}", summary.outside_window);
            println!("   Excluded companies: {}", summary.excluded_company);
            println!("   Duplicates: {}", summary.duplicates);
            println!("   Rejected: {}", summary.rejected.len());
        }

        Commands::Expire => {
            let report = expire_offers(&config).await?;
            println!("🔎 Checked {} offers", report.checked);
            println!("   Kept: {}", report.kept);
            println!("   Expired: {}", report.expired.len());
            if !report.unknown.is_empty() {
                println!("   {} {}", "Could not check:".yellow(), report.unknown.len());
            }
        }

        Commands::Embed { date } => {
            config.ensure_dirs()?;
            let embedder = StaticEmbedder::from_config(&config).await?;
            let pipeline = Pipeline::new(&config, &embedder);
            let inputs = load_inputs(&config)?;
            let (seekers, jobs) = pipeline.embed(&inputs, run_date(date))?;

            for outcome in [&seekers, &jobs] {
                println!(
                    "🧠 {}: {} rows ({} embedded, {} carried over, {} deferred, {} skipped)",
                    outcome.snapshot.kind,
                    outcome.snapshot.len(),
                    outcome.embedded.len(),
                    outcome.carried_over,
                    outcome.deferred,
                    outcome.skipped.len()
                );
            }
        }

        Commands::Match { date } => {
            let summary = score_latest(&config, run_date(date))?;
            println!("🎯 {} seekers scored, {} matches", summary.seekers_scored, summary.matches);
            if !summary.skipped.is_empty() {
                println!("   {} {}", "Skipped:".yellow(), summary.skipped.len());
            }
        }

        Commands::Recommend { user, save } => {
            let retriever = MatchRetriever::new(
                &config.paths.job_offers,
                &config.paths.matches,
                config.matching.match_id_separator,
            );
            let recommendations = retriever.get_last_matches(&user)?;
            let report = UserReport::new(user, today(), recommendations);
            print!("{}", ConsoleFormatter::new(true).format_report(&report)?);

            if save {
                let path = ReportWriter::new(&config.paths.output_dir, config.output.format).save(&report)?;
                println!("📁 Saved to: {}", path.display());
            }
        }

        Commands::Models { action } => {
            let mut manager = EmbeddingModelManager::new(config.paths.models_dir.clone()).await?;
            match action {
                ModelAction::List => {
                    println!("📚 Known Embedding Models\n");
                    for model in manager.list_known_models() {
                        let marker = if model.repo_id == config.embedding.model { " (configured)" } else { "" };
                        println!("  • {} ({}) - {} MB, {} dims{}", model.name, model.repo_id, model.size_mb, model.dimensions, marker);
                        println!("    {}", model.description);
                    }
                }

                ModelAction::Download { model } => {
                    let model = model.unwrap_or_else(|| config.embedding.model.clone());
                    println!("⬇️  Fetching model: {}", model);
                    let path = manager.ensure_model_available(&model).await?;
                    println!("✅ Model '{}' is ready", model);
                    println!("📁 Location: {}", path.display());
                }
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                let content = toml::to_string_pretty(&config)
                    .map_err(|e| JobbotError::Configuration(format!("Failed to serialize config: {}", e)))?;
                println!("⚙️  Current Configuration\n");
                println!("{}", content);
            }

            Some(ConfigAction::Reset) => {
                println!("🔄 Resetting configuration to defaults...");
                match &config_path {
                    Some(path) => Config::default().save_to(path)?,
                    None => Config::default().save()?,
                }
                println!("✅ Configuration reset successfully!");
            }

            Some(ConfigAction::Path) => {
                let path = config_path.unwrap_or_else(Config::config_path);
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn run_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(today)
}

fn print_run_report(report: &RunReport) {
    println!("\n📊 Run {}", report.run_date);
    println!("   Seekers snapshot: {} rows ({} new)", report.seekers.rows, report.seekers.embedded);
    println!(
        "   Jobs snapshot: {} rows ({} new, {} deferred)",
        report.jobs.rows, report.jobs.embedded, report.jobs.deferred
    );
    println!("   Matches: {}", report.matching.matches);
    for path in &report.reports {
        println!("   📁 {}", path.display());
    }

    match report.status() {
        RunStatus::Success => println!("{}", "✅ Run completed".green()),
        RunStatus::PartialFailure => {
            println!(
                "{}",
                format!("⚠️  Run completed with {} skipped entities", report.skip_count()).yellow()
            );
            let ids: Vec<String> = report.failed_ids().into_iter().collect();
            println!("   Failed ids: {}", ids.join(", "));
        }
    }
}
