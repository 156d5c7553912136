use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pulsering_store::{SampleQuery, Store};
use pulsering_types::{Aggregation, MetricKind, MetricSample};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "pulsering")]
#[command(author, version, about = "CLI for the pulsering health data store", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Database file (overrides config and the platform default)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User id (overrides the config default)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON batch of samples for one metric
    Import {
        /// JSON file holding an array of {timestamp, value, secondary?}
        file: PathBuf,

        /// Metric kind (heart_rate, steps, blood_pressure, ...)
        #[arg(short, long)]
        metric: MetricKind,

        /// Batch time as epoch seconds (defaults to now)
        #[arg(short, long)]
        batch_time: Option<i64>,
    },

    /// Show the most recent sample for a metric
    Latest {
        /// Metric kind
        #[arg(short, long)]
        metric: MetricKind,

        /// Show the whole most recent ingestion batch instead
        #[arg(long)]
        batch: bool,
    },

    /// List samples in a time range
    Range {
        /// Metric kind
        #[arg(short, long)]
        metric: MetricKind,

        /// Lower bound, epoch seconds (inclusive)
        #[arg(long)]
        since: Option<i64>,

        /// Upper bound, epoch seconds (inclusive)
        #[arg(long)]
        until: Option<i64>,

        /// Maximum number of rows (0 for all)
        #[arg(short, long, default_value = "0")]
        limit: u32,
    },

    /// Show daily summaries over a day range
    Daily {
        /// Metric kind
        #[arg(short, long)]
        metric: MetricKind,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: String,

        /// Last day, YYYY-MM-DD (defaults to FROM)
        #[arg(long)]
        to: Option<String>,
    },

    /// Recompute daily summaries over a day range (Ctrl-C rolls back)
    Recompute {
        /// Metric kind
        #[arg(short, long)]
        metric: MetricKind,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: String,

        /// Last day, YYYY-MM-DD (defaults to FROM)
        #[arg(long)]
        to: Option<String>,
    },

    /// List sleep sessions, or the segments of one session
    Sleep {
        /// Session start lower bound, epoch seconds
        #[arg(long)]
        since: Option<i64>,

        /// Session start upper bound, epoch seconds
        #[arg(long)]
        until: Option<i64>,

        /// Show the stage segments of this session id instead
        #[arg(long)]
        segments: Option<String>,
    },

    /// List ECG readings, or show one with its waveform decoded
    Ecg {
        /// Show the reading recorded at this timestamp key
        #[arg(long)]
        show: Option<String>,
    },

    /// Count records not yet acknowledged by the remote
    Pending,

    /// Delete stored data
    Purge {
        /// Delete one metric's samples and summaries
        #[arg(short, long)]
        metric: Option<MetricKind>,

        /// Delete everything in the database
        #[arg(long)]
        all: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load();

    // Config commands never touch the database
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Path => {
                println!("{}", Config::path().display());
                Ok(())
            }
            ConfigAction::Init => {
                Config::default().save()?;
                println!("Wrote {}", Config::path().display());
                Ok(())
            }
        };
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    tracing::debug!("Opening database at {}", db_path.display());
    let store = Store::open(&db_path)?;

    let user = cli
        .user
        .clone()
        .or_else(|| config.user.clone())
        .context("No user id given (pass --user or set `user` in the config file)")?;

    match cli.command {
        Commands::Import {
            file,
            metric,
            batch_time,
        } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let batch: Vec<MetricSample> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;

            // Drop already-present timestamps up front so the outcome
            // reflects this file rather than the whole history.
            let existing = store.existing_timestamps(&user, metric)?;
            let (fresh, known): (Vec<_>, Vec<_>) = batch
                .into_iter()
                .partition(|s| !existing.contains(&s.timestamp));

            let batch_time = batch_time.unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp());
            let outcome = store.insert_batch(&user, metric, &fresh, batch_time)?;

            println!(
                "{}: {} inserted, {} already present, {} rejected",
                metric,
                outcome.inserted,
                known.len() + outcome.duplicates,
                outcome.rejected
            );
        }

        Commands::Latest { metric, batch } => {
            if batch {
                let samples = store.latest_batch(&user, metric)?;
                if samples.is_empty() {
                    println!("--");
                } else {
                    for sample in &samples {
                        println!("{}  {}", format_ts(sample.timestamp), format_value(metric, sample.value, sample.secondary));
                    }
                }
            } else {
                match store.latest_sample(&user, metric)? {
                    Some(sample) => println!(
                        "{}  {}",
                        format_ts(sample.timestamp),
                        format_value(metric, sample.value, sample.secondary)
                    ),
                    None => println!("--"),
                }
            }
        }

        Commands::Range {
            metric,
            since,
            until,
            limit,
        } => {
            let mut query = SampleQuery::new().user(&user).metric(metric).oldest_first();
            if let Some(since) = since {
                query = query.since(since);
            }
            if let Some(until) = until {
                query = query.until(until);
            }
            if limit > 0 {
                query = query.limit(limit);
            }

            let samples = store.query_samples(&query)?;
            for sample in &samples {
                println!(
                    "{}  {}{}",
                    format_ts(sample.timestamp),
                    format_value(metric, sample.value, sample.secondary),
                    if sample.synced { "" } else { "  (pending)" }
                );
            }
            if samples.is_empty() {
                println!("--");
            }
        }

        Commands::Daily { metric, from, to } => {
            let to = to.unwrap_or_else(|| from.clone());
            let summaries = store.query_daily(&user, metric, &from, &to)?;
            if summaries.is_empty() {
                println!("--");
            }
            for s in &summaries {
                match metric.aggregation() {
                    Aggregation::Sum => {
                        println!("{}  {:.0} {} ({} samples)", s.day, s.sum_value, metric.unit(), s.sample_count);
                    }
                    Aggregation::MinMaxAvg => {
                        print!(
                            "{}  min {:.1}  max {:.1}  avg {:.1} {}",
                            s.day, s.min_value, s.max_value, s.avg_value, metric.unit()
                        );
                        if let Some(avg) = s.secondary_avg {
                            print!("  (secondary avg {:.1})", avg);
                        }
                        println!("  ({} samples)", s.sample_count);
                    }
                }
            }
        }

        Commands::Recompute { metric, from, to } => {
            let to = to.unwrap_or_else(|| from.clone());
            let days = day_range(&from, &to)?;

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, rolling back");
                    signal_cancel.cancel();
                }
            });

            let processed = tokio::task::spawn_blocking(move || {
                store.recompute_days(&user, metric, &days, &cancel)
            })
            .await??;
            println!("Recomputed {} day(s)", processed);
        }

        Commands::Sleep {
            since,
            until,
            segments,
        } => {
            if let Some(session_id) = segments {
                let segments = store.session_segments(&session_id)?;
                if segments.is_empty() {
                    println!("--");
                }
                for seg in &segments {
                    println!(
                        "{} - {}  {:>5}s  {}",
                        format_ts(seg.start_time),
                        format_ts(seg.end_time),
                        seg.duration,
                        seg.stage
                    );
                }
            } else {
                let sessions =
                    store.query_sessions(&user, since.unwrap_or(0), until.unwrap_or(i64::MAX))?;
                if sessions.is_empty() {
                    println!("--");
                }
                for s in &sessions {
                    println!(
                        "{}  {} - {}  total {}m (deep {}m, light {}m, rem {}m, awake {}m)",
                        s.id,
                        format_ts(s.start_time),
                        format_ts(s.end_time),
                        s.total_seconds / 60,
                        s.deep_seconds / 60,
                        s.light_seconds / 60,
                        s.rem_seconds / 60,
                        s.awake_seconds / 60,
                    );
                }
            }
        }

        Commands::Ecg { show } => {
            if let Some(recorded_at) = show {
                match store.get_ecg(&user, &recorded_at)? {
                    Some(ecg) => {
                        let waveform = ecg.waveform()?;
                        println!("{}  {}", ecg.recorded_at, ecg.diagnosis);
                        println!(
                            "hrv {}  load {}  pressure {}  body {}",
                            ecg.hrv_index, ecg.load_index, ecg.pressure_index, ecg.body_index
                        );
                        println!("{} waveform samples", waveform.len());
                    }
                    None => println!("--"),
                }
            } else {
                let readings = store.list_ecg(&user)?;
                if readings.is_empty() {
                    println!("--");
                }
                for ecg in &readings {
                    println!("{}  {}", ecg.recorded_at, ecg.diagnosis);
                }
            }
        }

        Commands::Pending => {
            let mut total = 0usize;
            for kind in MetricKind::ALL {
                let count = store.pending_samples(&user, kind, u32::MAX)?.len();
                if count > 0 {
                    println!("{:<24} {}", kind.to_string(), count);
                }
                total += count;
            }
            let sessions = store.pending_sessions(&user, u32::MAX)?.len();
            if sessions > 0 {
                println!("{:<24} {}", "sleep sessions", sessions);
            }
            let ecg = store.pending_ecg(&user, u32::MAX)?.len();
            if ecg > 0 {
                println!("{:<24} {}", "ecg readings", ecg);
            }
            println!("{:<24} {}", "total", total + sessions + ecg);
        }

        Commands::Purge { metric, all } => match (metric, all) {
            (Some(metric), false) => {
                let removed = store.purge_metric(&user, metric)?;
                println!("Removed {} {} sample(s)", removed, metric);
            }
            (None, true) => {
                store.purge_all()?;
                println!("Database cleared");
            }
            _ => bail!("Pass exactly one of --metric or --all"),
        },

        Commands::Config { .. } => unreachable!(),
    }

    Ok(())
}

/// Render epoch seconds as a human-readable UTC timestamp.
fn format_ts(ts: i64) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|t| t.format(&fmt).ok())
        .unwrap_or_else(|| ts.to_string())
}

/// Render a sample value with its unit, pairing the secondary when present.
fn format_value(metric: MetricKind, value: f64, secondary: Option<f64>) -> String {
    match secondary {
        Some(secondary) => format!("{:.0}/{:.0} {}", value, secondary, metric.unit()),
        None => format!("{:.1} {}", value, metric.unit()),
    }
}

/// Expand an inclusive `YYYY-MM-DD` range into individual day keys.
fn day_range(from: &str, to: &str) -> Result<Vec<String>> {
    let fmt = format_description!("[year]-[month]-[day]");
    let mut day = Date::parse(from, &fmt).with_context(|| format!("Invalid day: {from}"))?;
    let end = Date::parse(to, &fmt).with_context(|| format!("Invalid day: {to}"))?;
    if day > end {
        bail!("Range start {from} is after end {to}");
    }

    let mut days = Vec::new();
    loop {
        days.push(day.format(&fmt)?);
        if day == end {
            break;
        }
        day = day.next_day().context("Date out of range")?;
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(1_699_920_000), "2023-11-14 00:00:00");
    }

    #[test]
    fn test_format_value_paired() {
        assert_eq!(
            format_value(MetricKind::BloodPressure, 120.0, Some(80.0)),
            "120/80 mmHg"
        );
    }

    #[test]
    fn test_day_range_inclusive() {
        let days = day_range("2023-11-14", "2023-11-16").unwrap();
        assert_eq!(days, vec!["2023-11-14", "2023-11-15", "2023-11-16"]);
    }

    #[test]
    fn test_day_range_single_day() {
        let days = day_range("2023-11-14", "2023-11-14").unwrap();
        assert_eq!(days, vec!["2023-11-14"]);
    }

    #[test]
    fn test_day_range_rejects_inverted() {
        assert!(day_range("2023-11-16", "2023-11-14").is_err());
    }
}
