//! CLI interface for the job recommender

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jobbot")]
#[command(about = "Job offer recommendations for job seekers")]
#[command(long_about = "Match job seekers with fresh job offers using categorical filters and skill/role embeddings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole pipeline: preprocess, expire, embed, match, publish reports
    Run {
        /// Skip the HTTP availability check of stored offers
        #[arg(long)]
        skip_availability: bool,

        /// Skip merging freshly scraped postings into the offers store
        #[arg(long)]
        skip_preprocess: bool,

        /// Run date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Merge scraped postings into the job offers store
    Preprocess {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Drop stored offers whose posting is gone
    Expire,

    /// Bring the seeker and job embedding snapshots up to date
    Embed {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Score seekers against the latest snapshots and replace the matches store
    Match {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show the last recommendations of a job seeker
    Recommend {
        /// Job seeker id
        #[arg(short, long)]
        user: String,

        /// Also write the report file in the configured format
        #[arg(short, long)]
        save: bool,
    },

    /// Model management commands
    Models {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ModelAction {
    /// List known embedding models
    List,

    /// Download an embedding model (defaults to the configured one)
    Download {
        /// Model name, HuggingFace repo ID or local folder
        model: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from(["jobbot", "--verbose", "run", "--skip-availability", "--date", "2024-08-01"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                skip_availability,
                skip_preprocess,
                date,
            } => {
                assert!(skip_availability);
                assert!(!skip_preprocess);
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 8, 1));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_recommend_requires_user() {
        assert!(Cli::try_parse_from(["jobbot", "recommend"]).is_err());
        let cli = Cli::try_parse_from(["jobbot", "recommend", "--user", "user1"]).unwrap();
        assert!(matches!(cli.command, Commands::Recommend { ref user, save: false } if user == "user1"));
    }
}
