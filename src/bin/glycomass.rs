use glycochem::{GlycoError, MassKind, Massive, Registry, Result, Structure, derivatization, glycoct};
use miette::Report;
use rust_decimal::Decimal;
use rustyline::DefaultEditor;
use std::sync::LazyLock;
use tracing_subscriber::EnvFilter;

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::default);

// NOTE: Structures are entered on a single line, with `;` or spaces standing in for line breaks, like:
// `RES 1b:b-dglc-HEX-1:5 2s:n-acetyl LIN 1:1d(2+1)2n`
fn main() -> rustyline::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut rl = DefaultEditor::new()?;
    while let Ok(line) = rl.readline("GlycoCT: ") {
        if line.trim().is_empty() {
            continue;
        }
        rl.add_history_entry(&line)?;
        match glycan_info(&line) {
            Ok(info) => print!("{info}"),
            Err(error) => render_error(error),
        }
    }
    Ok(())
}

fn glycan_info(line: &str) -> Result<String> {
    let structure = glycoct::loads(&REGISTRY, line)?;
    let db = REGISTRY.atoms();

    let mono_mass = structure.mass(db, MassKind::Monoisotopic)?;
    let avg_mass = structure.mass(db, MassKind::Average)?;
    let (residues, permethylated) = match &structure {
        Structure::Graph(graph) => {
            let mut permethylated = graph.clone();
            derivatization::derivatize(&mut permethylated, &REGISTRY, "methyl")?;
            let mass = permethylated.mass(db, MassKind::Monoisotopic)?;
            (graph.order().to_string(), decimal_round_workaround(mass, 6))
        }
        // NOTE: Without bonds, there's no telling which sites are free
        Structure::Bag(bag) => (format!("{} (disconnected)", bag.len()), String::from("unknown")),
    };

    Ok(format!(
        "Composition: {}\nResidues: {residues}\nMonoisotopic Mass: {}\nAverage Mass: {}\n\
         Permethylated Mass: {permethylated}\n\n",
        structure.composition(),
        decimal_round_workaround(mono_mass, 6),
        decimal_round_workaround(avg_mass, 4),
    ))
}

fn render_error(error: Box<GlycoError>) {
    println!("{:?}", Report::new(*error));
}

// FIXME: Really this should be fixed in `rust_decimal`...
fn decimal_round_workaround(value: Decimal, decimal_points: u32) -> String {
    let value = value.round_dp(decimal_points);
    format!("{value}")
}
