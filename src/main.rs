use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use contest_draw::config::AppConfig;
use contest_draw::{
    clear_entries, count_entries, draw, export_csv, import_csv, list_entries, list_winners,
    open_database, recent_events, reset_selection, telemetry, DrawRng, EligibilityPolicy,
};
use rusqlite::Connection;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "contest-draw",
    about = "Import contest entries, run auditable winner draws and export the results",
    version
)]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Eligibility policy: criteria, attendance or open (overrides DRAW_POLICY)
    #[arg(long, global = true)]
    policy: Option<EligibilityPolicy>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import entries from a CSV file
    Import(ImportArgs),
    /// Draw winners from the eligible, unselected pool
    Draw(DrawArgs),
    /// Clear every selection so another draw can run
    Reset,
    /// List all entries, newest first
    Entries,
    /// List the current winners
    Winners,
    /// Export every entry as CSV
    Export {
        /// Output file (stdout when omitted)
        path: Option<PathBuf>,
    },
    /// Delete every entry
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show the audit trail
    Events {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// CSV file with a header row
    path: PathBuf,
    /// Do not look up existing handles first; the unique constraint still rejects repeats
    #[arg(long)]
    allow_duplicates: bool,
}

#[derive(Args, Debug)]
struct DrawArgs {
    /// Winners to pick (defaults to MAX_WINNERS)
    #[arg(long)]
    max_winners: Option<usize>,
    /// Replay a draw from a recorded seed label
    #[arg(long)]
    seed: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.telemetry).context("failed to initialise logging")?;

    if let Some(path) = cli.database {
        config.database_path = path;
    }
    if let Some(policy) = cli.policy {
        config.draw.policy = policy;
    }
    debug!(database = %config.database_path.display(), policy = %config.draw.policy, "configuration loaded");

    let mut conn = open_database(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    match cli.command {
        Command::Import(args) => run_import(&mut conn, args),
        Command::Draw(args) => run_draw(&mut conn, &config, args),
        Command::Reset => {
            let cleared = reset_selection(&mut conn)?;
            println!("🔄 Selection reset ({} entries cleared)", cleared);
            Ok(())
        }
        Command::Entries => print_entries(&conn),
        Command::Winners => print_winners(&conn),
        Command::Export { path } => run_export(&conn, path),
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete every entry without --yes");
            }
            let deleted = clear_entries(&mut conn)?;
            println!("🗑️  Deleted {} entries", deleted);
            Ok(())
        }
        Command::Events { limit } => print_events(&conn, limit),
    }
}

fn run_import(conn: &mut Connection, args: ImportArgs) -> Result<()> {
    let summary = import_csv(conn, &args.path, !args.allow_duplicates)
        .with_context(|| format!("failed to import {}", args.path.display()))?;

    println!("📂 Imported {}", args.path.display());
    println!("   ✓ Added:   {}", summary.added);
    println!("   ✓ Skipped: {}", summary.skipped);
    println!("   ✓ Total entries: {}", count_entries(conn)?);
    Ok(())
}

fn run_draw(conn: &mut Connection, config: &AppConfig, args: DrawArgs) -> Result<()> {
    let max_winners = args.max_winners.unwrap_or(config.draw.max_winners);
    let mut rng = match args.seed {
        Some(seed) => DrawRng::from_seed(&seed),
        None => DrawRng::from_entropy(),
    };

    let outcome = draw(conn, config.draw.policy, max_winners, &mut rng)?;

    println!("🎲 Draw ({} policy, seed {})", outcome.policy, outcome.seed);
    println!("   Eligible pool: {}", outcome.pool_size);
    if outcome.winners.is_empty() {
        println!("   No eligible entries left to draw");
    }
    for (place, winner) in outcome.winners.iter().enumerate() {
        println!("   {}. {} (@{})", place + 1, winner.display_name(), winner.handle);
    }
    Ok(())
}

fn print_entries(conn: &Connection) -> Result<()> {
    let entries = list_entries(conn)?;
    println!("📋 {} entries", entries.len());
    for e in &entries {
        let criteria: String = e.criteria.iter().map(|c| if *c { '1' } else { '0' }).collect();
        println!(
            "   {:>5}  {:<24} {:<24} criteria={} present={} selected={}",
            e.id,
            e.handle,
            e.display_name(),
            criteria,
            e.in_attendance,
            e.is_selected
        );
    }
    Ok(())
}

fn print_winners(conn: &Connection) -> Result<()> {
    let winners = list_winners(conn)?;
    println!("🏆 {} winners", winners.len());
    for w in &winners {
        println!("   {} (@{})", w.display_name(), w.handle);
    }
    Ok(())
}

fn run_export(conn: &Connection, path: Option<PathBuf>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let rows = export_csv(conn, BufWriter::new(file))?;
            println!("📤 Exported {} entries to {}", rows, path.display());
        }
        None => {
            export_csv(conn, io::stdout().lock())?;
        }
    }
    Ok(())
}

fn print_events(conn: &Connection, limit: usize) -> Result<()> {
    for event in recent_events(conn, limit)? {
        println!(
            "{}  {:<16} {}:{}  {}  by {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.data,
            event.actor
        );
    }
    Ok(())
}
