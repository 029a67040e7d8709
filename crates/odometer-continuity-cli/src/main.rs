//! Odometer continuity CLI: `odo` command.
//!
//! Provides a command-line interface for recording vehicle trips,
//! previewing and applying odometer cascades, and reviewing continuity
//! breaks and trip anomalies.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;

use odometer_continuity::time::{micros_to_rfc3339, rfc3339_to_micros};
use odometer_continuity::{
    AnomalySeverity, CascadeResult, ContinuityResult, CorrectionOrchestrator, CorrectionOutcome,
    EngineConfig, FileTripStore, TripBuilder, TripEvaluation, TripId, TripStore, VehicleId,
};

type Orchestrator = CorrectionOrchestrator<FileTripStore>;

// ── Directory helpers ─────────────────────────────────────────────────────────

/// Resolve the data directory: `--data-dir`, then `$ODO_HOME`, then `~/.odometer`.
fn data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var("ODO_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME not set; pass --data-dir")?;
    Ok(PathBuf::from(home).join(".odometer"))
}

fn open(data_dir: &std::path::Path, config: Option<PathBuf>) -> Result<Orchestrator> {
    let config_path = config.unwrap_or_else(|| data_dir.join("config.json"));
    let config = EngineConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let store = FileTripStore::new(data_dir.join("trips")).context("failed to open trip store")?;
    debug!(
        "trip store at {}, config {}",
        store.base_dir().display(),
        config_path.display()
    );
    Ok(CorrectionOrchestrator::new(store, config))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Odometer continuity CLI: record trips, correct odometer readings with
/// cascading previews, and review implausible trips.
#[derive(Parser, Debug)]
#[command(
    name = "odo",
    about = "Odometer continuity CLI",
    version,
    long_about = "odo: odometer continuity CLI\n\nRecord vehicle trips, preview and apply cascading odometer corrections,\nand review continuity breaks and trip anomalies."
)]
struct Cli {
    /// Data directory (default: $ODO_HOME or ~/.odometer)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: {data-dir}/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record and list trips
    Trip {
        #[command(subcommand)]
        subcommand: TripCommands,
    },

    /// Change a trip's end reading and cascade the change downstream
    Edit {
        /// Vehicle the trip belongs to
        #[arg(long)]
        vehicle: String,

        /// Trip ID to edit
        #[arg(long)]
        trip: String,

        /// New end odometer reading (km)
        #[arg(long)]
        end_km: u64,

        /// Apply the previewed cascade (otherwise preview only)
        #[arg(long)]
        yes: bool,
    },

    /// Re-anchor a trip on its predecessor's end reading
    Relink {
        /// Vehicle the trip belongs to
        #[arg(long)]
        vehicle: String,

        /// Trip ID to relink
        #[arg(long)]
        trip: String,

        /// Apply the previewed cascade (otherwise preview only)
        #[arg(long)]
        yes: bool,
    },

    /// Report continuity breaks for a vehicle
    Check {
        /// Vehicle to check
        #[arg(long)]
        vehicle: String,
    },

    /// Report anomaly flags for a vehicle's trips
    Anomalies {
        /// Vehicle to evaluate
        #[arg(long)]
        vehicle: String,

        /// Show clean trips too
        #[arg(long)]
        all: bool,
    },

    /// List vehicles with recorded trips
    Vehicles,
}

#[derive(Subcommand, Debug)]
enum TripCommands {
    /// Record a new trip
    Add {
        /// Vehicle the trip belongs to
        #[arg(long)]
        vehicle: String,

        /// Trip start time (RFC 3339, e.g. 2024-03-01T08:30:00Z)
        #[arg(long)]
        started_at: String,

        /// Start odometer reading (km)
        #[arg(long)]
        start_km: u64,

        /// End odometer reading (km)
        #[arg(long)]
        end_km: u64,

        /// Fuel added on this trip
        #[arg(long)]
        fuel: Option<f64>,

        /// Readings were entered deliberately; never auto-adjust them
        #[arg(long)]
        manual: bool,
    },

    /// List a vehicle's trips in sequence order
    List {
        /// Vehicle to list
        #[arg(long)]
        vehicle: String,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;
    let json = cli.json;

    let result = data_dir(cli.data_dir).and_then(|dir| {
        let orch = open(&dir, cli.config)?;
        match cli.command {
            Commands::Trip { subcommand } => match subcommand {
                TripCommands::Add {
                    vehicle,
                    started_at,
                    start_km,
                    end_km,
                    fuel,
                    manual,
                } => cmd_trip_add(
                    &orch,
                    &vehicle,
                    &started_at,
                    start_km,
                    end_km,
                    fuel,
                    manual,
                    json,
                ),
                TripCommands::List { vehicle } => cmd_trip_list(&orch, &vehicle, json, verbose),
            },
            Commands::Edit {
                vehicle,
                trip,
                end_km,
                yes,
            } => cmd_edit(&orch, &vehicle, &trip, end_km, yes, json),
            Commands::Relink { vehicle, trip, yes } => cmd_relink(&orch, &vehicle, &trip, yes, json),
            Commands::Check { vehicle } => cmd_check(&orch, &vehicle, json, verbose),
            Commands::Anomalies { vehicle, all } => cmd_anomalies(&orch, &vehicle, all, json),
            Commands::Vehicles => cmd_vehicles(&orch, json),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

// ── Trip commands ─────────────────────────────────────────────────────────────

/// `odo trip add --vehicle V --started-at T --start-km N --end-km N`
#[allow(clippy::too_many_arguments)]
fn cmd_trip_add(
    orch: &Orchestrator,
    vehicle: &str,
    started_at: &str,
    start_km: u64,
    end_km: u64,
    fuel: Option<f64>,
    manual: bool,
    json: bool,
) -> Result<()> {
    let started_at = rfc3339_to_micros(started_at).context("--started-at must be RFC 3339")?;

    let mut builder = TripBuilder::new(VehicleId::new(vehicle), started_at, start_km, end_km)
        .manual_override(manual);
    if let Some(q) = fuel {
        builder = builder.fuel(q);
    }
    let trip = builder.build().context("invalid trip")?;

    let evaluation = orch
        .record_trip(trip.clone())
        .context("failed to record trip")?;

    if json {
        let out = serde_json::json!({ "trip": trip, "evaluation": evaluation });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Recorded trip {}", trip.id);
    println!("  Vehicle:  {}", trip.vehicle_id);
    println!("  Started:  {}", micros_to_rfc3339(trip.started_at));
    println!(
        "  Odometer: {} → {} km ({} km)",
        trip.start_km,
        trip.end_km,
        trip.distance_km()
    );
    if let Some(q) = trip.fuel_quantity {
        println!("  Fuel:     {q}");
    }
    if trip.is_manual_override {
        println!("  Manual override");
    }
    print_flags(&evaluation);

    Ok(())
}

/// `odo trip list --vehicle V`
fn cmd_trip_list(orch: &Orchestrator, vehicle: &str, json: bool, verbose: bool) -> Result<()> {
    let vehicle_id = VehicleId::new(vehicle);
    let trips = orch
        .store()
        .fetch_trips_for_vehicle(&vehicle_id)
        .context("failed to load trips")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&trips)?);
        return Ok(());
    }

    if trips.is_empty() {
        println!("No trips recorded for vehicle {vehicle}");
        return Ok(());
    }

    println!("Trips for vehicle {vehicle} ({}):", trips.len());
    for trip in &trips {
        let marker = if trip.is_manual_override { " [manual]" } else { "" };
        let fuel = trip
            .efficiency()
            .map(|e| format!("  {e:.2} km/unit"))
            .unwrap_or_default();
        println!(
            "  {}  {:>8} → {:>8} km  ({:>5} km){fuel}{marker}",
            trip.id,
            trip.start_km,
            trip.end_km,
            trip.distance_km()
        );
        if verbose {
            println!("      started {}", micros_to_rfc3339(trip.started_at));
        }
    }

    Ok(())
}

// ── Cascade commands ──────────────────────────────────────────────────────────

/// `odo edit --vehicle V --trip ID --end-km N [--yes]`
fn cmd_edit(
    orch: &Orchestrator,
    vehicle: &str,
    trip: &str,
    end_km: u64,
    yes: bool,
    json: bool,
) -> Result<()> {
    let vehicle_id = VehicleId::new(vehicle);
    let trip_id = TripId(trip.to_string());

    if !yes {
        let preview = orch
            .preview_edit(&vehicle_id, &trip_id, end_km)
            .map_err(|e| anyhow!("cannot edit {trip}: {e}"))?;
        print_cascade(&preview, json)?;
        if !json {
            println!("Preview only: re-run with --yes to apply.");
        }
        return Ok(());
    }

    let outcome = orch
        .edit_trip(&vehicle_id, &trip_id, end_km, |preview| {
            print_cascade(preview, json).is_ok()
        })
        .map_err(|e| anyhow!("cannot edit {trip}: {e}"))?;
    print_outcome(outcome.as_ref(), json)
}

/// `odo relink --vehicle V --trip ID [--yes]`
fn cmd_relink(orch: &Orchestrator, vehicle: &str, trip: &str, yes: bool, json: bool) -> Result<()> {
    let vehicle_id = VehicleId::new(vehicle);
    let trip_id = TripId(trip.to_string());

    if !yes {
        let preview = orch
            .preview_relink(&vehicle_id, &trip_id)
            .map_err(|e| anyhow!("cannot relink {trip}: {e}"))?;
        print_cascade(&preview, json)?;
        if !json {
            println!("Preview only: re-run with --yes to apply.");
        }
        return Ok(());
    }

    let outcome = orch
        .relink_trip(&vehicle_id, &trip_id, |preview| {
            print_cascade(preview, json).is_ok()
        })
        .map_err(|e| anyhow!("cannot relink {trip}: {e}"))?;
    print_outcome(outcome.as_ref(), json)
}

// ── Report commands ───────────────────────────────────────────────────────────

/// `odo check --vehicle V`
fn cmd_check(orch: &Orchestrator, vehicle: &str, json: bool, verbose: bool) -> Result<()> {
    let report = orch
        .continuity_report(&VehicleId::new(vehicle))
        .context("failed to build continuity report")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Continuity for vehicle {vehicle}");
    println!("  Trips:    {}", report.trip_count);
    println!("  Distance: {} km", report.total_distance_km);
    match &report.result {
        ContinuityResult::Continuous => println!("  Result:   continuous"),
        ContinuityResult::Broken {
            break_count,
            max_break_km,
        } => println!("  Result:   broken ({break_count} breaks, largest {max_break_km} km)"),
    }

    for b in &report.breaks {
        let boundary = if b.at_manual_boundary {
            " (manual checkpoint)"
        } else {
            ""
        };
        println!(
            "  {:?} {:?}: {} starts at {} km, expected {} km ({} km){boundary}",
            b.severity, b.kind, b.trip_id, b.actual_start_km, b.expected_start_km, b.magnitude_km
        );
        if verbose {
            println!("      after {}", b.previous_trip_id);
        }
    }

    Ok(())
}

/// `odo anomalies --vehicle V [--all]`
fn cmd_anomalies(orch: &Orchestrator, vehicle: &str, all: bool, json: bool) -> Result<()> {
    let evaluations = orch
        .evaluate_vehicle(&VehicleId::new(vehicle))
        .context("failed to evaluate trips")?;
    let shown: Vec<&TripEvaluation> = evaluations
        .iter()
        .filter(|e| all || !e.is_clean())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    let flagged = evaluations.iter().filter(|e| !e.is_clean()).count();
    println!(
        "Anomalies for vehicle {vehicle}: {flagged} of {} trips flagged",
        evaluations.len()
    );
    for evaluation in shown {
        let efficiency = evaluation
            .efficiency
            .map(|e| format!("{e:.2}"))
            .unwrap_or_else(|| "-".into());
        let baseline = evaluation
            .baseline_efficiency
            .map(|e| format!("{e:.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {}  efficiency {efficiency} (baseline {baseline})",
            evaluation.trip_id
        );
        print_flags(evaluation);
    }

    Ok(())
}

/// `odo vehicles`
fn cmd_vehicles(orch: &Orchestrator, json: bool) -> Result<()> {
    let vehicles = orch.store().list_vehicles().context("failed to list vehicles")?;

    let mut rows = Vec::with_capacity(vehicles.len());
    for vehicle_id in vehicles {
        let count = orch.store().fetch_trips_for_vehicle(&vehicle_id)?.len();
        rows.push((vehicle_id, count));
    }

    if json {
        let out: Vec<serde_json::Value> = rows
            .iter()
            .map(|(v, n)| serde_json::json!({ "vehicle_id": v, "trips": n }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No vehicles recorded (use `odo trip add` to start)");
    }
    for (vehicle_id, count) in rows {
        println!("  {vehicle_id}  {count} trips");
    }

    Ok(())
}

// ── Output helpers ────────────────────────────────────────────────────────────

fn print_cascade(preview: &CascadeResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(preview)?);
        return Ok(());
    }

    println!(
        "Cascade ({}) from {} on vehicle {}: delta {:+} km",
        preview.kind.as_tag(),
        preview.edited_trip_id,
        preview.vehicle_id,
        preview.delta_km
    );
    for row in &preview.rows {
        println!(
            "  {}  start {:>8} → {:>8}  end {:>8} → {:>8}",
            row.trip_id, row.current_start_km, row.new_start_km, row.current_end_km, row.new_end_km
        );
    }
    if let Some(stop) = &preview.stopped_at {
        println!("  Stopped at manual override {stop}; later trips unchanged");
    }
    Ok(())
}

fn print_outcome(outcome: Option<&CorrectionOutcome>, json: bool) -> Result<()> {
    let Some(outcome) = outcome else {
        println!("Not applied");
        return Ok(());
    };

    if json {
        let out = serde_json::json!({
            "vehicle_id": outcome.vehicle_id,
            "rows_written": outcome.rows_written(),
            "evaluations": outcome.evaluations,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if outcome.rows_written() == 0 {
        println!("Already applied; nothing changed");
    } else {
        println!("Applied: {} trips updated", outcome.rows_written());
    }
    for evaluation in &outcome.evaluations {
        if !evaluation.is_clean() {
            println!("  {}", evaluation.trip_id);
            print_flags(evaluation);
        }
    }
    Ok(())
}

fn print_flags(evaluation: &TripEvaluation) {
    for flag in &evaluation.flags {
        let severity = match flag.severity {
            AnomalySeverity::Warning => "warning",
            AnomalySeverity::Critical => "CRITICAL",
        };
        println!("    [{severity}] {}: {}", flag.kind.as_tag(), flag.reason);
    }
}
