use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use draglog_types::{RecordKind, Score, Selector};

#[derive(Parser, Debug)]
#[command(
    name = "draglog",
    about = "DragLog: provenance and reliability ledger for retrieval pipelines",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured mode
    #[arg(long, global = true)]
    pub mode: Option<ModeArg>,

    /// Remote ledger API (implies --mode remote unless --mode is given)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Directory holding the local append log and snapshot trail
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    Local,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reset the ledger, seeding reliability sources as ID=SCORE pairs
    InitSources(InitSourcesArgs),
    /// Record a transformation event
    Log(EventArgs),
    /// Record a feedback note
    Feedback(EventArgs),
    /// Manage reliability sources
    Source(SourceArgs),
    /// List every live record of a kind
    Records(RecordsArgs),
    /// Show the current version of a record
    Show(ShowArgs),
    /// List live records of any kind matching a field selector
    Query(QueryArgs),
    /// Show every version of a record
    History(HistoryArgs),
    /// Delete a log or feedback record (local mode)
    Delete(DeleteArgs),
    /// Checkpoint reliability scores to the snapshot trail (local mode)
    Dump,
    /// List snapshot trail checkpoints (local mode)
    Snapshots,
}

#[derive(Args, Debug)]
pub struct InitSourcesArgs {
    #[arg(value_parser = parse_source)]
    pub sources: Vec<(String, Score)>,
}

#[derive(Args, Debug)]
pub struct EventArgs {
    /// Record ID
    pub id: String,
    #[arg(long)]
    pub logger: String,
    #[arg(long, default_value = "")]
    pub input: String,
    #[arg(long, default_value = "")]
    pub input_from: String,
    #[arg(long, default_value = "")]
    pub output: String,
    #[arg(long, default_value = "")]
    pub output_to: String,
    /// Event time; defaults to now
    #[arg(long)]
    pub timestamp: Option<String>,
    #[arg(long, default_value = "")]
    pub reserved: String,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    #[command(subcommand)]
    pub action: SourceAction,
}

#[derive(Subcommand, Debug)]
pub enum SourceAction {
    /// Register a data source at the default score
    Create {
        id: String,
        /// Precomputed content digest
        #[arg(long, conflicts_with = "file")]
        digest: Option<String>,
        /// Hash this file's content as the digest
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "")]
        reserved: String,
    },
    /// Adjust a source's score by AMOUNT, or set it with --absolute
    Update {
        id: String,
        #[arg(allow_negative_numbers = true, value_parser = parse_score)]
        amount: Score,
        #[arg(long)]
        absolute: bool,
        #[arg(long, default_value = "")]
        info: String,
    },
    /// Print a source's current score
    Get { id: String },
}

#[derive(Args, Debug)]
pub struct RecordsArgs {
    pub kind: RecordKind,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub kind: RecordKind,
    pub id: String,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// e.g. '{"selector":{"loggerID":"reranker0"}}' or '{"type":"log"}'
    #[arg(value_parser = parse_selector)]
    pub selector: Selector,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,
}

fn parse_source(s: &str) -> Result<(String, Score), String> {
    let (id, score) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=SCORE, got {s:?}"))?;
    if id.is_empty() {
        return Err(format!("empty source ID in {s:?}"));
    }
    let score = parse_score(score).map_err(|e| format!("invalid score in {s:?}: {e}"))?;
    Ok((id.to_string(), score))
}

/// Scores must be finite; NaN and infinities cannot be stored.
fn parse_score(s: &str) -> Result<Score, String> {
    let score = s.parse::<Score>().map_err(|e| e.to_string())?;
    if !score.is_finite() {
        return Err(format!("{s} is not a finite number"));
    }
    Ok(score)
}

fn parse_selector(s: &str) -> Result<Selector, String> {
    Selector::parse(s).map_err(|e| e.to_string())
}
