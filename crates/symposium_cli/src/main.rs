//! SYMPOSIUM CLI
//!
//! Runs dining tables from the command line and prints their wiring.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod profile;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use console::style;
use profile::Profile;
use std::path::PathBuf;
use std::time::Duration;
use symposium_core::Topology;
use symposium_sim::{Harness, HarnessError, RunMode, RunReport, Scenario};
use symposium_table::{DelayRange, FairnessMode};
use tracing_subscriber::EnvFilter;

/// Exit code for a run that hit its timeout
const EXIT_LIVENESS: i32 = 2;

#[derive(Parser)]
#[command(name = "symposium")]
#[command(about = "SYMPOSIUM - deadlock-free dining philosophers", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a table and report meals
    Dine(DineArgs),
    /// Print the wiring and acquisition order of a ring
    Topology {
        /// Number of seats
        #[arg(short, long, default_value_t = 5)]
        seats: usize,
    },
}

#[derive(clap::Args)]
struct DineArgs {
    /// JSON profile; flags override its values
    #[arg(short, long)]
    profile: Option<PathBuf>,
    /// Number of seats
    #[arg(short, long)]
    seats: Option<usize>,
    /// Table variant
    #[arg(long)]
    scenario: Option<Scenario>,
    /// Serve fork waiters in arrival order
    #[arg(long)]
    fair: bool,
    /// Run for this many milliseconds
    #[arg(long, conflicts_with_all = ["meals", "min_meals"])]
    duration_ms: Option<u64>,
    /// Run until this many meals in total
    #[arg(long, conflicts_with = "min_meals")]
    meals: Option<u64>,
    /// Run until every philosopher ate this many meals
    #[arg(long)]
    min_meals: Option<u64>,
    /// Fail the run after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Upper bound of random think time in milliseconds
    #[arg(long)]
    think_ms: Option<u64>,
    /// Upper bound of random eat time in milliseconds
    #[arg(long)]
    eat_ms: Option<u64>,
    /// Seed for think and eat delays
    #[arg(long)]
    seed: Option<u64>,
    /// Count fork holders and waits
    #[arg(long)]
    monitor: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl DineArgs {
    fn profile(&self) -> Result<Profile> {
        let mut profile = match &self.profile {
            Some(path) => Profile::load(path)?,
            None => Profile::default(),
        };

        if let Some(seats) = self.seats {
            profile.table.seats = seats;
        }
        if let Some(scenario) = self.scenario {
            profile.scenario = scenario;
        }
        if self.fair {
            profile.table.fairness = FairnessMode::Fifo;
        }
        if let Some(ms) = self.think_ms {
            profile.table.timing.think = DelayRange::up_to_millis(ms);
        }
        if let Some(ms) = self.eat_ms {
            profile.table.timing.eat = DelayRange::up_to_millis(ms);
        }
        if let Some(seed) = self.seed {
            profile.table.seed = seed;
        }
        if let Some(ms) = self.duration_ms {
            profile.run.mode = RunMode::Duration(Duration::from_millis(ms));
        }
        if let Some(meals) = self.meals {
            profile.run.mode = RunMode::TotalMeals(meals);
        }
        if let Some(meals) = self.min_meals {
            profile.run.mode = RunMode::MinMeals(meals);
        }
        if let Some(ms) = self.timeout_ms {
            profile.run.timeout = Duration::from_millis(ms);
        }
        profile.monitor |= self.monitor;
        Ok(profile)
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,symposium=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dine(args: DineArgs) -> Result<()> {
    let profile = args.profile()?;
    tracing::debug!(?profile, "profile resolved");
    let mut builder = profile.scenario.builder(profile.table.clone());
    if profile.monitor {
        builder = builder.with_monitor();
    }
    let table = builder.build()?;

    match Harness::new(profile.run.clone()).run(table).await {
        Ok(report) => {
            if args.json {
                println!("{}", report.to_json()?);
            } else {
                print_summary(&profile, &report);
            }
            if report.is_clean() {
                Ok(())
            } else {
                Err(eyre!(
                    "run finished with {} failed workers",
                    report.failures.len()
                ))
            }
        }
        Err(err @ HarnessError::Liveness { .. }) => {
            eprintln!("{} {err}", style("LIVENESS").red().bold());
            std::process::exit(EXIT_LIVENESS);
        }
        Err(err) => Err(err.into()),
    }
}

fn print_summary(profile: &Profile, report: &RunReport) {
    println!(
        "{} {} seats, {} forks, scenario {} ({})",
        style(report.run_id).cyan(),
        report.seats,
        report.fairness,
        style(profile.scenario).bold(),
        profile.scenario.description()
    );
    println!("  ran {} in {:?}", report.mode, report.elapsed);
    for (seat, meals) in report.meals.iter().enumerate() {
        println!("  P{seat:<3} {meals:>10} meals");
    }
    println!(
        "  total {} | min {} | max {} | {:.0} meals/s | fairness {:.3}",
        report.total_meals,
        report.min_meals,
        report.max_meals,
        report.throughput(),
        report.fairness_index()
    );
    if let Some(occupancy) = &report.occupancy {
        let verdict = if occupancy.is_exclusive() {
            style("exclusive").green()
        } else {
            style("VIOLATED").red().bold()
        };
        println!(
            "  forks {} | {} acquisitions | longest wait {:?}",
            verdict,
            occupancy.total_acquisitions(),
            occupancy.max_wait()
        );
    }
    for failure in &report.failures {
        println!("  {} {failure}", style("failed").yellow());
    }
}

fn topology(seats: usize) -> Result<()> {
    let topology = Topology::ring(seats)?;
    println!("{} seats, {} forks", topology.seats(), topology.seats());
    for wiring in topology.iter() {
        let marker = if wiring.is_reversed() {
            style("reversed").yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<4} left {:<4} right {:<4} takes {} then {} {}",
            wiring.philosopher.to_string(),
            wiring.left.to_string(),
            wiring.right.to_string(),
            wiring.first(),
            wiring.second(),
            marker
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.command {
        Commands::Dine(args) => dine(args).await,
        Commands::Topology { seats } => topology(seats),
    }
}
