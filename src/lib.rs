//! Labelport: import external label volumes into an annotation store.
//!
//! An import loads a label volume from one file or a numbered file sequence,
//! reconciles its geometry with an existing destination volume, remaps its
//! label identities into the destination's label range and writes it at an
//! offset, exactly once.
//!
//! # Modules
//!
//! - [`volume`]: Axes, regions, label histograms and destination stores
//! - [`reader`]: File readers and the reader registry
//! - [`pipeline`]: The read → cache → retag → reorder stage chain
//! - [`plan`]: Default offsets, label mappings, relabeling and import plans
//! - [`validation`]: Plan checking and error reporting
//! - [`commit`]: Writing a plan into the destination
//! - [`session`]: End-to-end import sessions
//! - [`error`]: Error types for labelport operations

pub mod commit;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod reader;
pub mod session;
pub mod validation;
pub mod volume;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

pub use error::LabelportError;

use plan::{CapacityPolicy, MappingOverride, OffsetOverride};
use reader::{NpyReader, VolumeReader};
use session::ImportOptions;
use volume::{AxisOrder, InMemoryVolume, Label};

/// The labelport CLI application.
#[derive(Parser)]
#[command(name = "labelport")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show the label statistics and the default plan for an import.
    Inspect(InspectArgs),
    /// Import a label volume into a destination volume.
    Import(ImportArgs),
}

/// Arguments shared by every subcommand.
#[derive(clap::Args)]
struct SourceArgs {
    /// Source files or directories. Several files stack along z.
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Destination label volume (.npy).
    #[arg(long)]
    dest: PathBuf,

    /// Axis keys of the destination, e.g. 'tzyxc' (default depends on rank).
    #[arg(long = "dest-axes")]
    dest_axes: Option<AxisOrder>,

    /// Axis keys of the source, overriding the reader's interpretation.
    #[arg(long)]
    axes: Option<AxisOrder>,

    /// Largest label id the destination can hold.
    #[arg(long = "max-labels", env = "LABELPORT_MAX_LABELS")]
    max_labels: Label,

    /// Directory that relative paths are resolved against.
    #[arg(long = "working-dir")]
    working_dir: Option<PathBuf>,

    /// Fail instead of collapsing labels onto background when the source
    /// has more labels than the destination can hold.
    #[arg(long)]
    strict_capacity: bool,

    /// Offset override, e.g. 'z=12'. May be repeated.
    #[arg(long = "offset", value_name = "AXIS=N")]
    offsets: Vec<OffsetOverride>,

    /// Mapping override, e.g. '5=2' or '5=off'. May be repeated.
    #[arg(long = "map", value_name = "LABEL=TARGET")]
    maps: Vec<MappingOverride>,

    /// Start from a plan exported with 'inspect --save-plan'.
    #[arg(long)]
    plan: Option<PathBuf>,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,

    /// Write the resolved plan as JSON.
    #[arg(long = "save-plan")]
    save_plan: Option<PathBuf>,
}

/// Arguments for the import subcommand.
#[derive(clap::Args)]
struct ImportArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Treat plan warnings as errors.
    #[arg(long)]
    strict: bool,

    /// Write the result here instead of overwriting the destination.
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Run the labelport CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LabelportError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Import(args)) => run_import(args),
        None => {
            println!("labelport {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Import external label volumes into an annotation store.");
            println!();
            println!("Run 'labelport --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), LabelportError> {
    if !matches!(args.output.as_str(), "text" | "json") {
        return Err(LabelportError::UnsupportedFormat(format!(
            "report output '{}' (supported: text, json)",
            args.output
        )));
    }

    let working_dir = args.source.working_dir.clone();
    let dest_path = session::resolve_path(&args.source.dest, working_dir.as_deref());
    let destination = load_destination(&dest_path, args.source.dest_axes.clone())?;
    let sources = args.source.sources.clone();
    let options = import_options(&args.source, false)?;

    let report = session::inspect(&sources, &destination, options)?;

    if let Some(path) = &args.save_plan {
        let path = session::resolve_path(path, working_dir.as_deref());
        plan::write_plan_json(&path, &report.plan)?;
        log::info!("plan written to {}", path.display());
    }

    match args.output.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&report).map_err(|source| {
                LabelportError::PlanJsonWrite {
                    path: PathBuf::from("<stdout>"),
                    source,
                }
            })?;
            println!("{}", json);
        }
        _ => print!("{}", report),
    }

    Ok(())
}

/// Execute the import subcommand.
fn run_import(args: ImportArgs) -> Result<(), LabelportError> {
    let working_dir = args.source.working_dir.clone();
    let dest_path = session::resolve_path(&args.source.dest, working_dir.as_deref());
    let mut destination = load_destination(&dest_path, args.source.dest_axes.clone())?;
    let sources = args.source.sources.clone();
    let options = import_options(&args.source, args.strict)?;

    let summary = session::import(&sources, &mut destination, options)?;

    let out_path = match &args.out {
        Some(out) => session::resolve_path(out, working_dir.as_deref()),
        None => dest_path,
    };
    destination.save_npy(&out_path)?;

    println!(
        "Imported {} element(s) into {:?}..{:?}{} -> {}",
        summary.elements,
        summary.start,
        summary.stop,
        if summary.relabeled { " (relabeled)" } else { "" },
        out_path.display()
    );
    Ok(())
}

fn import_options(args: &SourceArgs, strict: bool) -> Result<ImportOptions, LabelportError> {
    let plan = match &args.plan {
        Some(path) => Some(plan::read_plan_json(&session::resolve_path(
            path,
            args.working_dir.as_deref(),
        ))?),
        None => None,
    };

    Ok(ImportOptions {
        label_capacity: args.max_labels,
        capacity_policy: if args.strict_capacity {
            CapacityPolicy::Strict
        } else {
            CapacityPolicy::Clamp
        },
        source_axes: args.axes.clone(),
        working_directory: args.working_dir.clone(),
        plan,
        offset_overrides: args.offsets.clone(),
        mapping_overrides: args.maps.clone(),
        strict,
        ..Default::default()
    })
}

/// Loads a destination `.npy` volume, tagging it with `axes` or the default
/// axis order for its rank.
fn load_destination(
    path: &Path,
    axes: Option<AxisOrder>,
) -> Result<InMemoryVolume, LabelportError> {
    let data = NpyReader.read(path)?;
    let axes = match axes {
        Some(axes) => axes,
        None => AxisOrder::default_for_rank(data.ndim())?,
    };
    InMemoryVolume::new(data, axes)
}
