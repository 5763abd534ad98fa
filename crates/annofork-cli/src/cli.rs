//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "annofork",
    version,
    about = "Fork, annotate and reconcile per-reviewer copies of a CSV post dataset"
)]
pub(crate) struct Cli {
    /// Dataset root (the folder holding Data/ and Users/)
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub(crate) root: PathBuf,

    /// TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List reviewers that have a workspace
    Reviewers,

    /// Create a reviewer workspace from the shared data
    Fork {
        /// Reviewer name
        reviewer: String,
    },

    /// Print a reviewer's annotations
    Show {
        /// Reviewer name
        reviewer: String,
        /// Show this author's trajectory instead of users.csv
        #[arg(long)]
        author: Option<String>,
        /// Print the whole table as JSON with typed values
        #[arg(long)]
        json: bool,
    },

    /// Set notes on a users.csv row, or on a trajectory row with --row
    Note {
        /// Reviewer name
        reviewer: String,
        /// Author key
        author: String,
        /// Note text; empty clears it
        text: String,
        /// 1-based row in the author's trajectory file
        #[arg(long)]
        row: Option<usize>,
    },

    /// Set structured judgments on a trajectory row
    Judge(JudgeArgs),

    /// Send a reviewer's columns back to the shared data
    Reconcile {
        /// Reviewer name
        reviewer: String,
    },
}

/// Options left out keep their stored value
#[derive(Debug, Args)]
pub(crate) struct JudgeArgs {
    /// Reviewer name
    pub(crate) reviewer: String,
    /// Author whose trajectory holds the row
    pub(crate) author: String,
    /// 1-based row in the trajectory file
    #[arg(long)]
    pub(crate) row: usize,
    /// Topic (repeatable)
    #[arg(long = "topic")]
    pub(crate) topics: Vec<String>,
    #[arg(long)]
    pub(crate) specific_topic: Option<String>,
    #[arg(long)]
    pub(crate) belief_degree: Option<String>,
    #[arg(long)]
    pub(crate) belief_comments: Option<String>,
    /// Reaction seen in comments (repeatable)
    #[arg(long = "reaction")]
    pub(crate) comment_reactions: Vec<String>,
    #[arg(long)]
    pub(crate) reaction_comments: Option<String>,
    /// Source cited (repeatable)
    #[arg(long = "source")]
    pub(crate) sources_used: Vec<String>,
    #[arg(long)]
    pub(crate) source_comments: Option<String>,
}
