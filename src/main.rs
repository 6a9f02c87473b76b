use clap::{ArgGroup, Parser};
use glycochem::{GlycoError, MassKind, Massive, Registry, Structure, glycoct};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Reads GlycoCT structures and prints them in canonical form, or weighs them
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("output").args(["canonical", "mass", "composition"])))]
struct Args {
    /// A file of GlycoCT structures separated by blank lines, or `-` to read from stdin
    input: PathBuf,
    /// Print each structure as canonical GlycoCT (the default)
    #[arg(long)]
    canonical: bool,
    /// Print the mass of each structure
    #[arg(long)]
    mass: bool,
    /// Print the elemental composition of each structure
    #[arg(long)]
    composition: bool,
    /// Use average, rather than monoisotopic, masses
    #[arg(long, requires = "mass")]
    average: bool,
    /// Print m/z for this charge state instead of a neutral mass
    #[arg(long, requires = "mass", allow_negative_numbers = true)]
    charge: Option<i64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let text = read_input(&args.input)?;
    let registry = Registry::default();

    let structures = glycoct::load_all(&registry, &text).map_err(unbox)?;
    debug!(count = structures.len(), "read structures");

    for (index, structure) in structures.iter().enumerate() {
        let output = if args.mass {
            let kind = if args.average {
                MassKind::Average
            } else {
                MassKind::Monoisotopic
            };
            let mass = match args.charge {
                Some(charge) => structure.mz(registry.atoms(), kind, charge),
                None => structure.mass(registry.atoms(), kind),
            };
            mass.map_err(unbox)?.to_string()
        } else if args.composition {
            structure.composition().to_string()
        } else {
            match structure {
                Structure::Graph(graph) => glycoct::dumps(graph),
                Structure::Bag(bag) => {
                    // NOTE: A bag has no bonds left to write, so the best we can do is list what's in it
                    let counts = bag.counts().iter().map(|(name, count)| format!("{count}x {name}\n"));
                    counts.collect()
                }
            }
        };

        if index > 0 && !(args.mass || args.composition) {
            println!();
        }
        print!("{output}");
        if args.mass || args.composition {
            println!();
        }
    }

    Ok(())
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).into_diagnostic()?;
        Ok(text)
    } else {
        std::fs::read_to_string(input)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", input.display()))
    }
}

fn unbox(error: Box<GlycoError>) -> miette::Report {
    miette::Report::new(*error)
}
