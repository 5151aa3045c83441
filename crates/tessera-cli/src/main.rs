//! tessera CLI - NURBS patch surface tessellator
//!
//! Reads a surface description (JSON or TOML, X3D field names) and writes
//! its triangle mesh as OBJ, STL or JSON.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{LevelFilter, Metadata, Record};
use std::path::{Path, PathBuf};

use tessera::{
    export, rebuild_coarse, tessellate, Direction, SurfaceDefinition, SurfaceSampler,
    TessellationConfig,
};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessellate NURBS patch surfaces into triangle meshes", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tessellate a surface file and export the mesh
    Tessellate {
        /// Surface description (.json or .toml)
        surface: PathBuf,
        /// Output file (format determined by extension: .obj, .stl, .json)
        #[arg(short, long)]
        output: PathBuf,
        /// Tessellation config (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Triangulate the control net instead of evaluating the surface
        #[arg(long)]
        coarse: bool,
    },
    /// Display information about a surface file
    Info {
        /// Surface description (.json or .toml)
        surface: PathBuf,
        /// Tessellation config (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // Only fails if a logger is already installed.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Tessellate {
            surface,
            output,
            config,
            coarse,
        } => {
            tessellate_file(&surface, &output, config.as_deref(), coarse)?;
        }
        Commands::Info { surface, config } => {
            show_info(&surface, config.as_deref())?;
        }
    }

    Ok(())
}

fn load_surface(path: &Path) -> Result<SurfaceDefinition> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let def = match ext.as_deref() {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("invalid surface JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("invalid surface TOML in {}", path.display()))?,
        _ => bail!(
            "unsupported surface format: {} (expected .json or .toml)",
            path.display()
        ),
    };
    Ok(def)
}

fn load_config(path: Option<&Path>) -> Result<TessellationConfig> {
    match path {
        Some(path) => TessellationConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(TessellationConfig::default()),
    }
}

fn tessellate_file(surface: &Path, output: &Path, config: Option<&Path>, coarse: bool) -> Result<()> {
    let def = load_surface(surface)?;
    let config = load_config(config)?;

    let mesh = if coarse {
        rebuild_coarse(&def)?
    } else {
        tessellate(&def, &config, None)?
    };
    if mesh.is_empty() {
        bail!("surface produced an empty mesh");
    }

    export::export(&mesh, output)?;
    println!(
        "Wrote {} triangles ({:?}) to {}",
        mesh.num_triangles(),
        mesh.kind,
        output.display()
    );
    Ok(())
}

fn show_info(surface: &Path, config: Option<&Path>) -> Result<()> {
    let def = load_surface(surface)?;
    let config = load_config(config)?;

    println!("File: {}", surface.display());
    println!("Control net: {} x {}", def.u_dimension, def.v_dimension);
    println!("Orders: u={} v={}", def.u_order, def.v_order);
    println!(
        "Rational: {}",
        if def.weight.is_empty() { "no" } else { "yes" }
    );
    for direction in [Direction::U, Direction::V] {
        let knots = if def.knots(direction).is_empty() {
            "clamped uniform"
        } else {
            "explicit"
        };
        let flag = match direction {
            Direction::U => def.u_closed,
            Direction::V => def.v_closed,
        };
        let closed = match (def.is_effectively_closed(direction), flag) {
            (true, _) => "closed",
            (false, true) => "closed flag ignored",
            (false, false) => "open",
        };
        println!("  {direction}: knots {knots}, {closed}");
    }

    match SurfaceSampler::new(&def, &config.sampling_options()) {
        Ok(sampler) => println!(
            "Samples: {} x {}",
            sampler.u_samples(),
            sampler.v_samples()
        ),
        Err(err) => println!("Samples: not evaluable ({err})"),
    }

    let mesh = tessellate(&def, &config, None)?;
    println!();
    println!("Mesh ({:?}):", mesh.kind);
    println!("  Vertices:  {}", mesh.num_vertices());
    println!("  Triangles: {}", mesh.num_triangles());
    if let Some((min, max)) = mesh.bounds() {
        println!(
            "  Bounds:    [{:.3}, {:.3}, {:.3}] - [{:.3}, {:.3}, {:.3}]",
            min[0], min[1], min[2], max[0], max[1], max[2]
        );
    }

    Ok(())
}
