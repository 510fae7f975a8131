use std::collections::BTreeMap;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;

use draglog_client::{ClientConfig, DragLogClient, Mode};
use draglog_ledger::{LedgerConfig, SnapshotTrail};
use draglog_types::{EventRecord, HistoryEntry, RecordKind, ReliabilityUpdate};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Snapshots => cmd_snapshots(&config, format),
        command => {
            let mut client = DragLogClient::from_config(&config)?;
            dispatch(&mut client, command, format)
        }
    }
}

/// Config file first, then command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(dir) = &cli.log_dir {
        let sync_every_write = config.ledger.sync_every_write;
        config.ledger = LedgerConfig {
            sync_every_write,
            ..LedgerConfig::in_dir(dir)
        };
    }
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
        config.mode = Mode::Remote;
    }
    if let Some(mode) = cli.mode {
        config.mode = match mode {
            ModeArg::Local => Mode::Local,
            ModeArg::Remote => Mode::Remote,
        };
    }
    Ok(config)
}

fn dispatch(client: &mut DragLogClient, command: Command, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Command::InitSources(args) => cmd_init_sources(client, args),
        Command::Log(args) => {
            let record = event_record(RecordKind::Log, args);
            let id = record.record_id.clone();
            client.create_log_record(record)?;
            println!("{} Logged {}", "✓".green().bold(), id.yellow());
            Ok(())
        }
        Command::Feedback(args) => {
            let record = event_record(RecordKind::Feedback, args);
            let id = record.record_id.clone();
            client.create_feedback_record(record)?;
            println!("{} Feedback {}", "✓".green().bold(), id.yellow());
            Ok(())
        }
        Command::Source(args) => cmd_source(client, args.action, format),
        Command::Records(args) => {
            let records = client.get_all_records(args.kind)?;
            print_records(&records, format)
        }
        Command::Show(args) => {
            let record = client.get_record(args.kind, &args.id)?;
            print_records(std::slice::from_ref(&record), format)
        }
        Command::Query(args) => {
            let records = client.query_records(&args.selector)?;
            print_records(&records, format)
        }
        Command::History(args) => {
            let history = client.get_history_for_record(&args.id)?;
            print_history(&args.id, &history, format)
        }
        Command::Delete(args) => {
            client.delete_record(&args.id)?;
            println!("Deleted {}", args.id.yellow());
            Ok(())
        }
        Command::Dump => {
            client.dump_reliability_records()?;
            println!("{} Reliability snapshot written", "✓".green().bold());
            Ok(())
        }
        Command::Snapshots => bail!("snapshots are read from the trail file, not the ledger"),
    }
}

fn cmd_init_sources(client: &mut DragLogClient, args: InitSourcesArgs) -> anyhow::Result<()> {
    let sources: BTreeMap<_, _> = args.sources.into_iter().collect();
    let count = sources.len();
    client.init_ledger(sources)?;
    println!("{} Ledger initialized ({} sources, {} mode)", "✓".green().bold(), count, client.mode());
    Ok(())
}

fn cmd_source(client: &mut DragLogClient, action: SourceAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        SourceAction::Create { id, digest, file, reserved } => {
            let digest = match file {
                Some(path) => {
                    let content = std::fs::read(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    client.register_source(&id, &content, &reserved)?
                }
                None => {
                    let digest = digest.unwrap_or_default();
                    client.create_reliability_record(&id, &digest, &reserved)?;
                    digest
                }
            };
            println!("{} Source {} registered", "✓".green().bold(), id.yellow());
            if !digest.is_empty() {
                println!("  Digest: {}", digest.dimmed());
            }
        }
        SourceAction::Update { id, amount, absolute, info } => {
            let update = if absolute {
                ReliabilityUpdate::absolute(&id, amount)
            } else {
                ReliabilityUpdate::delta(&id, amount)
            };
            client.update_reliability_record(update.with_info(info))?;
            let verb = if absolute { "set to" } else { "adjusted by" };
            println!("Source {} {} {}", id.yellow(), verb, amount.to_string().bold());
        }
        SourceAction::Get { id } => {
            let record = client.get_record(RecordKind::Reliability, &id)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", json!({ "logID": id, "reliabilityScore": record.reliability_score }))
                }
                OutputFormat::Text => println!("{} {}", id.yellow(), record.reliability_score),
            }
        }
    }
    Ok(())
}

fn cmd_snapshots(config: &ClientConfig, format: OutputFormat) -> anyhow::Result<()> {
    if config.mode == Mode::Remote {
        bail!("the snapshot trail only exists in local mode");
    }
    let entries = SnapshotTrail::open(&config.ledger.snapshot_path)?.entries()?;
    match format {
        OutputFormat::Json => {
            let value: Vec<_> = entries
                .iter()
                .map(|e| json!({ "feedback": e.feedback, "scores": e.scores }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No snapshots.");
            }
            for (i, entry) in entries.iter().enumerate() {
                let note = if entry.feedback.is_empty() { "(initial)" } else { entry.feedback.as_str() };
                println!("{} {}", format!("#{i}").yellow(), note.bold());
                for (source, score) in &entry.scores {
                    println!("  {source}: {score}");
                }
            }
        }
    }
    Ok(())
}

fn event_record(kind: RecordKind, args: EventArgs) -> EventRecord {
    let mut record = EventRecord::event(kind, args.id, args.logger);
    record.input = args.input;
    record.input_from = args.input_from;
    record.output = args.output;
    record.output_to = args.output_to;
    record.timestamp = args
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    record.reserved = args.reserved;
    record
}

fn print_records(records: &[EventRecord], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No records.");
    }
    for r in records {
        match r.kind {
            RecordKind::Reliability => {
                println!("{}  {}  score {}", r.record_id.yellow().bold(), r.kind.to_string().cyan(), r.reliability_score)
            }
            _ => {
                println!("{}  {}  by {}", r.record_id.yellow().bold(), r.kind.to_string().cyan(), r.logger_id);
                if !r.input_from.is_empty() || !r.output_to.is_empty() {
                    println!("  {} → {}", r.input_from, r.output_to);
                }
            }
        }
        if !r.timestamp.is_empty() {
            println!("  {}", r.timestamp.dimmed());
        }
    }
    Ok(())
}

fn print_history(id: &str, history: &[HistoryEntry], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("No history for {}.", id.yellow());
    }
    for entry in history {
        let tx: String = entry.transaction_id().chars().take(12).collect();
        match entry.record() {
            Some(r) if r.kind == RecordKind::Reliability => {
                println!("{}  {}  score {}", entry.timestamp(), tx.dimmed(), r.reliability_score)
            }
            Some(r) => println!("{}  {}  {}", entry.timestamp(), tx.dimmed(), r.kind),
            None => println!("{}  {}  {}", entry.timestamp(), tx.dimmed(), "deleted".red()),
        }
    }
    Ok(())
}
