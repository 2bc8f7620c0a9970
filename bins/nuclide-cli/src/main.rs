//! nuclide — command-line interface for the hot-lab inventory.
//!
//! Every command opens the JSON store under the configured data directory,
//! performs one operation through the inventory manager and prints the
//! result. Activities given on the command line may be in either unit; they
//! are converted exactly to the department unit before use.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use nuclide_core::isotopes;
use nuclide_core::types::{Isotope, WasteItem};
use nuclide_core::units::{Activity, DoseUnit};
use nuclide_decay::{current_activity, release_time, waste_activity_at};
use nuclide_inventory::{InventoryConfig, InventoryError, InventoryManager};
use tracing::debug;

/// Radiopharmaceutical decay and inventory accounting.
#[derive(Parser)]
#[command(name = "nuclide", version, about = "Hot-lab radiopharmaceutical inventory")]
struct Cli {
    /// Config file (default: <data dir>/nuclide.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory override.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format override ("text" or "json").
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered isotopes, or the built-in catalogue.
    Isotopes {
        #[arg(long)]
        catalogue: bool,
    },
    /// Start tracking an isotope.
    Register(RegisterArgs),
    /// Show current usable stock.
    Stock(StockArgs),
    /// List active vials with their current activity.
    Vials { isotope: String },
    /// Book in a delivered vial.
    Receive(ReceiveArgs),
    /// Dispense a patient dose.
    Withdraw(WithdrawArgs),
    /// Elute the installed generator.
    Elute(EluteArgs),
    /// Generator management.
    Generator {
        #[command(subcommand)]
        action: GeneratorAction,
    },
    /// Dispose of a vial by hand.
    Dispose { isotope: String, vial_id: String },
    /// Retire depleted vials (all isotopes when none is named).
    Sweep { isotope: Option<String> },
    /// Show the waste log.
    Waste(WasteArgs),
    /// Show the dose log.
    Doses {
        #[arg(long)]
        json: bool,
    },
    /// Convert an activity between mCi and MBq.
    Convert(ConvertArgs),
    /// Decay an activity forward in time.
    Activity(ActivityArgs),
}

#[derive(Subcommand)]
enum GeneratorAction {
    /// Install a generator for an isotope.
    Install { isotope: String, name: String },
    /// Replace the generator, retiring the old one's eluates.
    Replace { isotope: String, name: String },
    /// Remove the generator, retiring its eluates.
    Remove { isotope: String },
}

#[derive(Args)]
struct RegisterArgs {
    isotope: String,

    /// Half-life in hours (default: from the built-in catalogue).
    #[arg(long)]
    half_life: Option<f64>,
}

#[derive(Args)]
struct StockArgs {
    isotope: String,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReceiveArgs {
    isotope: String,

    /// Activity at the calibration time.
    #[arg(short, long)]
    activity: f64,

    /// Unit of `--activity` (default: department unit).
    #[arg(short, long)]
    unit: Option<DoseUnit>,

    /// Volume in mL.
    #[arg(short, long, default_value_t = 0.0)]
    volume: f64,

    #[arg(short, long, default_value = "")]
    label: String,

    /// Calibration time, RFC 3339 (default: now).
    #[arg(long)]
    calibrated_at: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct WithdrawArgs {
    isotope: String,

    #[arg(short, long)]
    activity: f64,

    #[arg(short, long)]
    unit: Option<DoseUnit>,

    /// Patient or order reference.
    #[arg(short, long)]
    patient: Option<String>,
}

#[derive(Args)]
struct EluteArgs {
    isotope: String,

    #[arg(short, long)]
    activity: f64,

    #[arg(short, long)]
    unit: Option<DoseUnit>,

    #[arg(short, long)]
    volume: f64,
}

#[derive(Args)]
struct WasteArgs {
    /// Only items past their decay-in-storage period.
    #[arg(long)]
    releasable: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ConvertArgs {
    value: f64,

    #[arg(long)]
    from: DoseUnit,

    #[arg(long)]
    to: DoseUnit,
}

#[derive(Args)]
struct ActivityArgs {
    /// Activity at calibration.
    amount: f64,

    /// Isotope name from the catalogue.
    #[arg(long, conflicts_with = "half_life")]
    isotope: Option<String>,

    /// Half-life in hours.
    #[arg(long)]
    half_life: Option<f64>,

    /// Hours elapsed since calibration.
    #[arg(long)]
    hours: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log_level, &config.log_format);
    debug!(data_dir = %config.data_dir.display(), unit = %config.unit, "configuration loaded");

    match cli.command {
        Commands::Convert(args) => return convert(args),
        Commands::Activity(args) => return activity(args),
        Commands::Isotopes { catalogue: true } => {
            for iso in isotopes::all() {
                println!("{:<8} {:>10.4} h", iso.name, iso.half_life_hours);
            }
            return Ok(());
        }
        _ => {}
    }

    let mgr = InventoryManager::with_json_store(config)
        .context("Failed to open inventory store")?;

    match cli.command {
        Commands::Isotopes { .. } => list_isotopes(&mgr),
        Commands::Register(args) => register(&mgr, args),
        Commands::Stock(args) => stock(&mgr, args),
        Commands::Vials { isotope } => vials(&mgr, &isotope),
        Commands::Receive(args) => receive(&mgr, args),
        Commands::Withdraw(args) => withdraw(&mgr, args),
        Commands::Elute(args) => elute(&mgr, args),
        Commands::Generator { action } => generator(&mgr, action),
        Commands::Dispose { isotope, vial_id } => {
            let item = mgr
                .dispose_vial(&isotope, &vial_id)
                .with_context(|| format!("Failed to dispose of vial {vial_id}"))?;
            print_waste(&[item], mgr.config().unit)
        }
        Commands::Sweep { isotope } => {
            let swept = match isotope {
                Some(iso) => mgr.sweep(&iso)?,
                None => mgr.sweep_all()?,
            };
            println!("Retired {} depleted vial(s)", swept.len());
            print_waste(&swept, mgr.config().unit)
        }
        Commands::Waste(args) => waste(&mgr, args),
        Commands::Doses { json } => doses(&mgr, json),
        Commands::Convert(_) | Commands::Activity(_) => Ok(()),
    }
}

fn load_config(cli: &Cli) -> Result<InventoryConfig> {
    let mut config = InventoryConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Initialize tracing with a level filter and "text" or "json" output.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so command output stays clean.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Express `value` (in `unit`, or the department unit) in the department unit.
fn to_department_unit(value: f64, unit: Option<DoseUnit>, department: DoseUnit) -> Result<f64> {
    let unit = unit.unwrap_or(department);
    let reading = Activity::from_value(value, unit)
        .and_then(|a| a.to_unit(department))
        .with_context(|| format!("Invalid activity {value} {unit}"))?;
    Ok(reading.value())
}

/// Register a catalogued isotope on first use.
fn ensure_registered(mgr: &InventoryManager, isotope: &str) -> Result<()> {
    match mgr.vials(isotope) {
        Ok(_) => Ok(()),
        Err(InventoryError::UnknownIsotope(_)) => {
            let Some(known) = isotopes::lookup(isotope) else {
                bail!("Unknown isotope {isotope}; register it with --half-life first");
            };
            if known.name != isotope {
                bail!("Isotope names are case-sensitive; did you mean {}?", known.name);
            }
            mgr.register_isotope(known)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn list_isotopes(mgr: &InventoryManager) -> Result<()> {
    let registered = mgr.isotopes();
    if registered.is_empty() {
        println!("No isotopes registered");
    }
    for iso in registered {
        let generator = mgr
            .generator(&iso.name)?
            .map(|g| format!("  generator: {}", g.name))
            .unwrap_or_default();
        println!("{:<8} {:>10.4} h{generator}", iso.name, iso.half_life_hours);
    }
    Ok(())
}

fn register(mgr: &InventoryManager, args: RegisterArgs) -> Result<()> {
    let isotope = match args.half_life {
        Some(h) => Isotope::new(args.isotope.clone(), h),
        None => isotopes::lookup(&args.isotope)
            .with_context(|| format!("{} is not catalogued; pass --half-life", args.isotope))?,
    };
    mgr.register_isotope(isotope.clone())
        .with_context(|| format!("Failed to register {}", isotope.name))?;
    println!("Registered {} (half-life {} h)", isotope.name, isotope.half_life_hours);
    Ok(())
}

fn stock(mgr: &InventoryManager, args: StockArgs) -> Result<()> {
    let report = mgr.stock_report(&args.isotope)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("{} at {}", report.isotope, report.at.format("%Y-%m-%d %H:%M"));
    println!("  Total:  {:.3} {}", report.total, report.unit);
    println!("  Volume: {:.2} mL in {} vial(s)", report.volume_ml, report.vial_count);
    if let Some(c) = report.concentration {
        println!("  Conc.:  {:.3} {}/mL", c, report.unit);
    }
    if report.low_stock {
        println!("  LOW STOCK");
    }
    Ok(())
}

fn vials(mgr: &InventoryManager, isotope: &str) -> Result<()> {
    let half_life = mgr
        .isotopes()
        .into_iter()
        .find(|i| i.name == isotope)
        .map(|i| i.half_life_hours)
        .with_context(|| format!("Unknown isotope {isotope}"))?;
    let unit = mgr.config().unit;
    let now = Utc::now();
    for vial in mgr.vials(isotope)? {
        let current = current_activity(&vial, half_life, now)?;
        println!(
            "{}  {:>10.3} {unit}  {:>7.2} mL  {}",
            vial.id, current, vial.initial_volume_ml, vial.label
        );
    }
    Ok(())
}

fn receive(mgr: &InventoryManager, args: ReceiveArgs) -> Result<()> {
    ensure_registered(mgr, &args.isotope)?;
    let amount = to_department_unit(args.activity, args.unit, mgr.config().unit)?;
    let vial = mgr
        .receive_vial(&args.isotope, amount, args.volume, &args.label, args.calibrated_at)
        .context("Failed to receive vial")?;
    println!("Received {} ({:.3} {})", vial.id, vial.initial_amount, mgr.config().unit);
    Ok(())
}

fn withdraw(mgr: &InventoryManager, args: WithdrawArgs) -> Result<()> {
    let requested = to_department_unit(args.activity, args.unit, mgr.config().unit)?;
    let dose = mgr
        .withdraw(&args.isotope, requested, args.patient)
        .context("Withdrawal rejected")?;
    println!("Dispensed {:.3} {} ({})", dose.activity, dose.unit, dose.id);
    if dose.volume_ml > 0.0 {
        println!("  Draw {:.2} mL", dose.volume_ml);
    }
    println!("  From: {}", dose.source_vials.join(", "));
    Ok(())
}

fn elute(mgr: &InventoryManager, args: EluteArgs) -> Result<()> {
    let activity = to_department_unit(args.activity, args.unit, mgr.config().unit)?;
    let vial = mgr
        .elute(&args.isotope, activity, args.volume)
        .context("Elution failed")?;
    println!("{} ({:.3} {} in {:.2} mL)", vial.label, vial.initial_amount, mgr.config().unit, vial.initial_volume_ml);
    Ok(())
}

fn generator(mgr: &InventoryManager, action: GeneratorAction) -> Result<()> {
    let unit = mgr.config().unit;
    match action {
        GeneratorAction::Install { isotope, name } => {
            ensure_registered(mgr, &isotope)?;
            let g = mgr.install_generator(&isotope, &name)?;
            println!("Installed {} ({})", g.name, g.id);
        }
        GeneratorAction::Replace { isotope, name } => {
            let (g, retired) = mgr.replace_generator(&isotope, &name)?;
            println!("Installed {} ({}), retired {} eluate(s)", g.name, g.id, retired.len());
            print_waste(&retired, unit)?;
        }
        GeneratorAction::Remove { isotope } => {
            let retired = mgr.remove_generator(&isotope)?;
            println!("Removed generator, retired {} eluate(s)", retired.len());
            print_waste(&retired, unit)?;
        }
    }
    Ok(())
}

fn waste(mgr: &InventoryManager, args: WasteArgs) -> Result<()> {
    let items = if args.releasable {
        mgr.releasable_waste()?
    } else {
        mgr.waste_log()
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    print_waste(&items, mgr.config().unit)
}

fn print_waste(items: &[WasteItem], unit: DoseUnit) -> Result<()> {
    let now = Utc::now();
    for item in items {
        println!("{}", waste_line(item, unit, now)?);
    }
    Ok(())
}

fn waste_line(item: &WasteItem, unit: DoseUnit, now: DateTime<Utc>) -> Result<String> {
    let left = waste_activity_at(item, now)
        .with_context(|| format!("Failed to decay waste item {}", item.id))?;
    let release = release_time(item)
        .with_context(|| format!("Failed to compute release time of {}", item.id))?;
    Ok(format!(
        "{}  {:<11} {:>10.3} {unit} -> {:>10.4} now, release {}  {}",
        item.id,
        item.source,
        item.activity,
        left,
        release.format("%Y-%m-%d %H:%M"),
        item.description
    ))
}

fn doses(mgr: &InventoryManager, json: bool) -> Result<()> {
    let log = mgr.dose_log();
    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
        return Ok(());
    }
    for dose in log {
        println!(
            "{}  {}  {:<7} {:>9.3} {}  {:.2} mL  {}",
            dose.dispensed_at.format("%Y-%m-%d %H:%M"),
            dose.id,
            dose.isotope,
            dose.activity,
            dose.unit,
            dose.volume_ml,
            dose.patient_ref.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn convert(args: ConvertArgs) -> Result<()> {
    let converted = Activity::from_value(args.value, args.from)
        .and_then(|a| a.to_unit(args.to))
        .context("Conversion failed")?;
    println!("{converted}");
    Ok(())
}

fn activity(args: ActivityArgs) -> Result<()> {
    use nuclide_core::traits::DecayCalculator;
    use nuclide_decay::DecayEngine;

    let half_life = match (args.isotope, args.half_life) {
        (Some(name), _) => {
            isotopes::lookup(&name)
                .with_context(|| format!("{name} is not catalogued"))?
                .half_life_hours
        }
        (None, Some(h)) => h,
        (None, None) => bail!("Pass --isotope or --half-life"),
    };
    let left = DecayEngine::new().activity_at(args.amount, args.hours, half_life)?;
    println!("{left:.6}");
    Ok(())
}
