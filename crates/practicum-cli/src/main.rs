//! Practicum CLI
//!
//! Command-line front end for the hour tracker:
//! - Logging hours per date and category (`log`)
//! - Reviewing one day's entries (`day`)
//! - Running totals and licensure progress (`totals`)
//! - Consistency checks between entries and totals (`audit`)

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use practicum_model::{
    DateKey, EntryDetails, FormField, HourCategory, PriorHours, SessionState, UserId,
};
use practicum_storage::{FileStore, HourLedger};

#[derive(Parser)]
#[command(name = "practicum")]
#[command(author, version, about = "Track practicum hours toward licensure")]
struct Cli {
    /// Store directory (falls back to $PRACTICUM_STORE, then ./hours).
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// User the command acts for (falls back to $PRACTICUM_USER).
    #[arg(long, short = 'u', global = true)]
    user: Option<String>,

    /// Verbose tracing to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log hours for one category on one date.
    ///
    /// Re-logging the same date and category overwrites the hours and
    /// merges the detail fields; the running totals move by the
    /// difference, never by the raw amount twice.
    Log(LogArgs),

    /// Show the entries stored for one date.
    Day {
        /// Date to show (YYYY-MM-DD or `Mon Apr 01 2024`); today if omitted.
        #[arg(long)]
        date: Option<DateKey>,
    },

    /// Show running totals and hours remaining toward licensure.
    Totals,

    /// Check stored totals against the entries they summarize.
    Audit {
        /// Rewrite drifted totals with the recomputed values.
        #[arg(long)]
        repair: bool,
        /// Audit every user in the store, not just the active one.
        #[arg(long)]
        all: bool,
    },

    /// Fold the journal into snapshot files and truncate it.
    Compact,
}

#[derive(Args)]
struct LogArgs {
    /// Hour category: direct, indirect, or supervision.
    #[arg(long, short)]
    category: HourCategory,

    /// Hours to record; unparseable input counts as zero.
    #[arg(long)]
    hours: String,

    /// Date logged against (YYYY-MM-DD or `Mon Apr 01 2024`); today if omitted.
    #[arg(long)]
    date: Option<DateKey>,

    /// Session modality (In-person, Telehealth, Phone).
    #[arg(long)]
    modality: Option<String>,

    /// Client population (Adults, Children, Adolescents, Elderly).
    #[arg(long)]
    population: Option<String>,

    /// Treatment setting (Private Practice, Hospital, Community Center, School).
    #[arg(long)]
    setting: Option<String>,

    /// Primary diagnosis (Depression, Anxiety, PTSD, Substance Abuse, Other).
    #[arg(long)]
    diagnosis: Option<String>,

    /// Free-text client concerns.
    #[arg(long)]
    concerns: Option<String>,

    /// Supervisor name (supervision hours only).
    #[arg(long)]
    supervisor: Option<String>,

    /// Topics discussed (supervision hours only).
    #[arg(long)]
    topics: Option<String>,
}

/// Route library warnings to stderr; `--debug` opens the firehose.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_store_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os("PRACTICUM_STORE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./hours"))
}

fn resolve_user(flag: Option<String>) -> Result<UserId> {
    let raw = flag
        .or_else(|| env::var("PRACTICUM_USER").ok())
        .unwrap_or_else(|| "default".to_string());
    Ok(UserId::new(raw)?)
}

fn today() -> DateKey {
    DateKey::new(chrono::Local::now().date_naive())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let store_dir = resolve_store_dir(cli.store_dir);
    let user = resolve_user(cli.user)?;
    let ledger = practicum_storage::open_ledger(&store_dir)?;

    match cli.command {
        Commands::Log(args) => cmd_log(&ledger, &user, args)?,
        Commands::Day { date } => cmd_day(&ledger, &user, date.unwrap_or_else(today))?,
        Commands::Totals => cmd_totals(&ledger, &user)?,
        Commands::Audit { repair, all } => cmd_audit(&ledger, &user, repair, all)?,
        Commands::Compact => {
            ledger.store().compact()?;
            println!("{} journal folded into snapshots", "ok".green().bold());
        }
    }
    Ok(())
}

fn cmd_log(ledger: &HourLedger<FileStore>, user: &UserId, args: LogArgs) -> Result<()> {
    let date = args.date.unwrap_or_else(today);
    let fetched = ledger.entries_for_date(user, date)?;

    let mut session = SessionState::new();
    session.select_date(date, fetched);
    session.choose_category(args.category);
    session.set_field(FormField::Hours, args.hours);
    let staged = [
        (FormField::Modality, args.modality),
        (FormField::Population, args.population),
        (FormField::Setting, args.setting),
        (FormField::Diagnosis, args.diagnosis),
        (FormField::ClientConcerns, args.concerns),
        (FormField::SupervisorName, args.supervisor),
        (FormField::TopicsDiscussed, args.topics),
    ];
    for (field, value) in staged {
        if let Some(value) = value {
            session.set_field(field, value);
        }
    }

    let submission = session.build_submission(user)?;
    let receipt = ledger.submit(&submission)?;

    println!(
        "{} {} {} on {}",
        "Logged".green().bold(),
        receipt.new_hours,
        receipt.category.label().to_lowercase(),
        receipt.date
    );
    match receipt.prior {
        PriorHours::Absent => {
            println!("  {} new entry (delta {:+})", "→".cyan(), receipt.delta);
        }
        PriorHours::Present(previous) => {
            println!(
                "  {} replaced {} (delta {:+})",
                "→".cyan(),
                previous,
                receipt.delta
            );
        }
    }
    if receipt.created_totals {
        println!("  {} totals row created", "→".cyan());
    }
    println!(
        "  {} {} total now {}",
        "→".cyan(),
        receipt.category,
        receipt.totals.get(receipt.category)
    );
    Ok(())
}

fn cmd_day(ledger: &HourLedger<FileStore>, user: &UserId, date: DateKey) -> Result<()> {
    let day = ledger.entries_for_date(user, date)?;
    if day.is_empty() {
        println!("{} no entries for {}", "info:".yellow().bold(), date);
        return Ok(());
    }
    println!("{} {} ({})", "Entries".green().bold(), date, user);
    for entry in day.iter() {
        println!("  {:<18} {:>6.2}", entry.category.label(), entry.hours);
        print_details(&entry.details);
    }
    Ok(())
}

fn print_details(details: &EntryDetails) {
    let fields = [
        ("modality", &details.modality),
        ("population", &details.population),
        ("setting", &details.setting),
        ("diagnosis", &details.diagnosis),
        ("concerns", &details.client_concerns),
        ("supervisor", &details.supervisor_name),
        ("topics", &details.topics_discussed),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("    {:<12} {}", label, value);
        }
    }
}

fn cmd_totals(ledger: &HourLedger<FileStore>, user: &UserId) -> Result<()> {
    let progress = ledger.progress(user)?;
    println!("{} ({})", "Running Totals".green().bold(), user);
    for category in HourCategory::ALL {
        println!(
            "  {:<18} {:>8.1} logged  {:>8.1} remaining",
            category.label(),
            progress.logged.get(category),
            progress.remaining(category)
        );
    }
    Ok(())
}

fn cmd_audit(
    ledger: &HourLedger<FileStore>,
    user: &UserId,
    repair: bool,
    all: bool,
) -> Result<()> {
    let users = if all {
        ledger.users()?
    } else {
        vec![user.clone()]
    };
    if users.is_empty() {
        println!("{} store has no users", "info:".yellow().bold());
        return Ok(());
    }

    let mut drifted = 0usize;
    for audited in users {
        let report = if repair {
            ledger.repair_user(&audited)?
        } else {
            ledger.audit_user(&audited)?
        };
        if report.is_clean() && !report.repaired {
            println!("{} {}", "ok".green().bold(), audited);
            continue;
        }
        drifted += 1;
        let verdict = if report.repaired {
            "repaired".green().bold()
        } else {
            "DRIFT".red().bold()
        };
        println!("{} {}", verdict, audited);
        for category in HourCategory::ALL {
            let drift = report.drift(category);
            if drift.abs() > f64::EPSILON {
                println!(
                    "  {:<18} stored {:>8.2}  recomputed {:>8.2}  ({:+.2})",
                    category.label(),
                    report.stored.get(category),
                    report.recomputed.get(category),
                    drift
                );
            }
        }
    }

    if drifted > 0 && !repair {
        anyhow::bail!("{drifted} user(s) have drifted totals (rerun with --repair)");
    }
    Ok(())
}
