use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fight_settlement::config::Config;
use fight_settlement::progression::{month_window, ProgressionEngine};
use fight_settlement::settlement::finalize_fight_result;
use fight_settlement::snapshot::SnapshotBuilder;
use fight_settlement::store::Store;
use fight_settlement::types::{ResultPayload, SnapshotType};

#[derive(Parser)]
#[command(name = "fight-settlement", about = "Settle fight results, run progression and leaderboard jobs")]
struct Cli {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema.
    Init,
    /// Enter (or correct) a fight result and settle its picks.
    Finalize {
        fight_id: i64,
        /// Fighter id, "draw" or "no_contest".
        #[arg(long)]
        winner: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        round: u32,
        #[arg(long, default_value = "")]
        time: String,
        #[arg(long, default_value = "")]
        referee: String,
    },
    /// Run progression for a calendar month or an explicit date range.
    Progression {
        /// Calendar month, YYYY-MM.
        #[arg(long, conflicts_with_all = ["start", "end"])]
        month: Option<String>,
        /// First day of the window, YYYY-MM-DD.
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Last day of the window (inclusive), YYYY-MM-DD.
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Only this user instead of everyone.
        #[arg(long)]
        user: Option<i64>,
    },
    /// Build a leaderboard snapshot.
    Snapshot {
        #[arg(value_parser = parse_snapshot_type)]
        kind: SnapshotType,
        #[arg(long)]
        event: Option<i64>,
    },
    /// Close an event and record its snapshot.
    CloseEvent { event_id: i64 },
    /// Print a fighter's fight history and record.
    History { fighter_id: i64 },
}

fn parse_snapshot_type(s: &str) -> Result<SnapshotType, String> {
    SnapshotType::parse(s).ok_or_else(|| format!("unknown snapshot type {s:?} (event|monthly|weekly)"))
}

fn parse_month(s: &str) -> Result<(i64, i64)> {
    let (year, month) = s
        .split_once('-')
        .with_context(|| format!("month must look like YYYY-MM, got {s:?}"))?;
    let year: i32 = year.parse().with_context(|| format!("bad year in {s:?}"))?;
    let month: u32 = month.parse().with_context(|| format!("bad month in {s:?}"))?;
    month_window(year, month).with_context(|| format!("no such month {s:?}"))
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("date must look like YYYY-MM-DD, got {s:?}"))
}

/// Inclusive unix-second window from the progression arguments.
fn progression_window(month: Option<&str>, start: Option<&str>, end: Option<&str>) -> Result<(i64, i64)> {
    match (month, start, end) {
        (Some(month), _, _) => parse_month(month),
        (None, Some(start), Some(end)) => {
            let start = parse_day(start)?;
            let end = parse_day(end)?;
            if end < start {
                bail!("window end {end} is before start {start}");
            }
            let from = start.and_time(NaiveTime::MIN).and_utc().timestamp();
            let to = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
            Ok((from, to))
        }
        _ => bail!("pass --month or both --start and --end"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fight_settlement=info"));
    match &config.database.log_file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {path}"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}


#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Config::load_env_file();
    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config)?;

    let db_path = config.database_path();
    let store = Store::open(&db_path).with_context(|| format!("Failed to open database: {db_path}"))?;

    match cli.command {
        Command::Init => {
            println!("schema ready at {db_path}");
        }
        Command::Finalize {
            fight_id,
            winner,
            method,
            round,
            time,
            referee,
        } => {
            let payload = ResultPayload {
                winner: Some(winner),
                method,
                round,
                time,
                referee,
            };
            let result = finalize_fight_result(&store, fight_id, &payload).await?;
            print_json(&result)?;
        }
        Command::Progression {
            month,
            start,
            end,
            user,
        } => {
            let (start, end) = progression_window(month.as_deref(), start.as_deref(), end.as_deref())?;
            let engine = ProgressionEngine::new(&store, &store, &config.progression, config.batch.max_concurrency);
            match user {
                Some(user_id) => print_json(&engine.calculate_user_progression(user_id, start, end).await?)?,
                None => print_json(&engine.run_monthly_progression(start, end).await?)?,
            }
        }
        Command::Snapshot { kind, event } => {
            let builder = SnapshotBuilder::new(&store, &config.leaderboard, config.batch.max_concurrency);
            print_json(&builder.create_leaderboard_snapshot(kind, event).await?)?;
        }
        Command::CloseEvent { event_id } => {
            let builder = SnapshotBuilder::new(&store, &config.leaderboard, config.batch.max_concurrency);
            print_json(&builder.close_event(event_id).await?)?;
        }
        Command::History { fighter_id } => {
            let record = store.fighter_record(fighter_id).await?;
            let history = store.fight_history_for(fighter_id).await?;
            print_json(&serde_json::json!({ "record": record, "history": history }))?;
        }
    }

    Ok(())
}
