use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use shelter_sync::logging::{init_logging, LogConfig};
use shelter_sync::{
    newer_than_days, residency_days, Collaborators, CsvStore, Event, EventSource, HttpUpdateSink,
    JsonFileSource, LogUpdateSink, NoScoring, PublishedScoring, RecordSource, ScoringSource,
    ShelterluvClient, SqliteStore, StaticScoring, StaticSource, SyncConfig, SyncEngine,
    SyncReport, TabularStore, UpdateSink,
};

#[derive(Debug, Parser)]
#[command(name = "shelter-sync")]
#[command(about = "Sync shelter animal records into the volunteer tables")]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(long, global = true, env = "SHELTER_SYNC_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one full sync
    Sync(SyncArgs),
    /// Print total days in custody for one animal
    Residency(ResidencyArgs),
    /// List animals that arrived in the last N days
    Recent(RecentArgs),
}

#[derive(Debug, Args)]
struct FeedArgs {
    /// Read records from a JSON file instead of the API
    #[arg(long)]
    records: Option<PathBuf>,

    /// Events file (internal id -> events) to pair with --records
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// csv:<dir> or sqlite:<file>
    #[arg(long, value_parser = parse_store)]
    store: StoreTarget,

    #[command(flatten)]
    feed: FeedArgs,

    /// Published scores as JSON; defaults to the record attributes
    #[arg(long)]
    scores: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    include_unavailable: bool,

    /// Compute and log, write nothing
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ResidencyArgs {
    animal_id: String,

    #[command(flatten)]
    feed: FeedArgs,
}

#[derive(Debug, Args)]
struct RecentArgs {
    #[arg(long, default_value_t = 7)]
    days: i64,

    #[command(flatten)]
    feed: FeedArgs,
}

#[derive(Debug, Clone)]
enum StoreTarget {
    Csv(PathBuf),
    Sqlite(PathBuf),
}

fn parse_store(value: &str) -> std::result::Result<StoreTarget, String> {
    match value.split_once(':') {
        Some(("csv", dir)) if !dir.is_empty() => Ok(StoreTarget::Csv(PathBuf::from(dir))),
        Some(("sqlite", file)) if !file.is_empty() => Ok(StoreTarget::Sqlite(PathBuf::from(file))),
        _ => Err(format!("expected csv:<dir> or sqlite:<file>, got '{}'", value)),
    }
}

/// Where records and events come from
enum Feed {
    Api(ShelterluvClient),
    File(JsonFileSource),
}

impl Feed {
    fn open(args: &FeedArgs, config: &SyncConfig) -> Result<Self> {
        match &args.records {
            Some(path) => {
                let mut source = JsonFileSource::new(path);
                if let Some(events) = &args.events {
                    source = source.with_events(events)?;
                }
                Ok(Feed::File(source))
            }
            None => Ok(Feed::Api(ShelterluvClient::from_config(config)?)),
        }
    }

    fn records(&self) -> &dyn RecordSource {
        match self {
            Feed::Api(client) => client,
            Feed::File(file) => file,
        }
    }

    fn events(&self) -> &dyn EventSource {
        match self {
            Feed::Api(client) => client,
            Feed::File(file) => file,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig {
        verbose: cli.verbose,
        log_file: cli.log_file.clone(),
    })?;

    let config = match &cli.config {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SyncConfig::default(),
    };

    let now = chrono::Utc::now().timestamp();

    match cli.command {
        Command::Sync(args) => run_sync(args, config, now),
        Command::Residency(args) => run_residency(args, &config, now),
        Command::Recent(args) => run_recent(args, &config, now),
    }
}

fn run_sync(args: SyncArgs, config: SyncConfig, now: i64) -> Result<()> {
    let include_unavailable = args.include_unavailable || config.eligibility.include_unavailable;
    let config = config.with_include_unavailable(include_unavailable);
    let feed = Feed::open(&args.feed, &config)?;

    println!("🐕 Shelter Sync");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Fetch once: the snapshot feeds both the engine and the published scores
    let snapshot = StaticSource::from_batch(feed.records().fetch_animals()?);

    let scoring: Box<dyn ScoringSource> = match (&args.scores, config.compare_scores) {
        (_, false) => Box::new(NoScoring),
        (Some(path), true) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read scores {}", path.display()))?;
            let scores: StaticScoring = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse scores {}", path.display()))?;
            Box::new(scores)
        }
        (None, true) => Box::new(PublishedScoring::from_records(snapshot.records())),
    };

    let updates: Box<dyn UpdateSink> = match &config.update_url {
        Some(url) => Box::new(HttpUpdateSink::new(url)),
        None => Box::new(LogUpdateSink),
    };

    let mut store: Box<dyn TabularStore> = match &args.store {
        StoreTarget::Csv(dir) => Box::new(CsvStore::open(dir)?),
        StoreTarget::Sqlite(file) => Box::new(SqliteStore::open(file)?),
    };

    let engine = SyncEngine::new(
        config,
        Collaborators {
            records: &snapshot,
            events: feed.events(),
            scoring: scoring.as_ref(),
            updates: updates.as_ref(),
        },
    )?;

    let report = engine.run(store.as_mut(), now, args.dry_run)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("\n📊 Sync report{}", if report.dry_run { " (dry run)" } else { "" });
    println!("   Fetched:      {}", report.fetched);
    println!("   Active:       {}", report.active);
    println!("   Excluded:     {}", report.excluded_total());
    for (reason, count) in &report.excluded {
        println!("     - {}: {}", reason, count);
    }
    println!("   Archived:     {}", report.archived.len());
    for name in &report.archived {
        println!("     - {}", name);
    }
    println!("   Pruned:       {}", report.pruned.len());
    println!("   Mismatched:   {}", report.mismatched.len());
    println!("   Updates sent: {}", report.updates_pushed);

    if !report.skipped.is_empty() {
        println!("\n⚠️  Skipped {} animal(s):", report.skipped.len());
        for skipped in &report.skipped {
            println!("     - {}: {}", skipped.name, skipped.reason);
        }
    }
}

fn run_residency(args: ResidencyArgs, config: &SyncConfig, now: i64) -> Result<()> {
    let feed = Feed::open(&args.feed, config)?;
    let events = feed.events().fetch_events(&args.animal_id)?;
    println!("{}", residency_line(&args.animal_id, &events, now)?);
    Ok(())
}

/// An empty log is zero days; the warning flags a possibly wrong id
fn residency_line(animal_id: &str, events: &[Event], now: i64) -> Result<String> {
    if events.is_empty() {
        warn!(animal_id, "no events found, check the internal id");
    }
    let days = residency_days(events, now)?;
    Ok(format!("{} day(s) in custody for {} ({} events)", days, animal_id, events.len()))
}

fn run_recent(args: RecentArgs, config: &SyncConfig, now: i64) -> Result<()> {
    let feed = Feed::open(&args.feed, config)?;
    let batch = feed.records().fetch_animals()?;
    for rejected in &batch.rejected {
        warn!(animal = %rejected.name, reason = %rejected.reason, "skipping unreadable record");
    }
    let recent = newer_than_days(&batch.records, args.days, now);

    println!("🆕 {} arrival(s) in the last {} day(s)", recent.len(), args.days);
    for intake in &recent {
        println!(
            "   {} | {} | {} | {} | {}",
            intake.name, intake.breed, intake.age, intake.sex, intake.location
        );
    }
    Ok(())
}
