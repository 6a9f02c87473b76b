//! Reading and writing the GlycoCT condensed format
//!
//! A stream may hold several structures, separated by blank lines. Each is read with a small state machine
//! (see [`reader`]) into sections, which are then expanded into a [`MoleculeGraph`]. Repeats are always unrolled, and
//! undetermined subtrees become ambiguous bonds

mod expansion;
mod reader;
pub(crate) mod writer;

// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use derive_more::IsVariant;

// Local Crate Imports
use crate::{Composition, Massive, MoleculeGraph, NodeKind, Registry, Result, errors::StructuralError};

// Re-exports
pub use writer::dumps;

// Public API ==========================================================================================================

/// Limits and fallbacks used while reading GlycoCT
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ReaderOptions {
    /// The most copies any single `REP` section may be expanded into
    pub max_repeat: usize,
    /// How deeply repeats may nest inside of one another
    pub max_depth: usize,
    /// The most nodes (residues and substituents) a single structure may expand into
    pub max_residues: usize,
    /// Expands every repeat this many times, instead of the lower bound it declares
    pub repeat_count: Option<usize>,
    /// Read disconnected structures as a [`ResidueBag`] instead of failing
    pub allow_composition: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_repeat: 1000,
            max_depth: 32,
            max_residues: 100_000,
            repeat_count: None,
            allow_composition: true,
        }
    }
}

/// One structure read from a GlycoCT stream
#[derive(Clone, Debug, IsVariant)]
pub enum Structure {
    Graph(MoleculeGraph),
    /// The pieces of a structure that never joined into a single graph
    Bag(ResidueBag),
}

impl Structure {
    #[must_use]
    pub const fn graph(&self) -> Option<&MoleculeGraph> {
        match self {
            Self::Graph(graph) => Some(graph),
            Self::Bag(_) => None,
        }
    }

    #[must_use]
    pub fn into_graph(self) -> Option<MoleculeGraph> {
        match self {
            Self::Graph(graph) => Some(graph),
            Self::Bag(_) => None,
        }
    }
}

impl Massive for Structure {
    fn composition(&self) -> Composition {
        match self {
            Self::Graph(graph) => graph.total_composition(),
            Self::Bag(bag) => bag.composition.clone(),
        }
    }
}

/// A count of residues (by descriptor) and free substituents (by name), plus their combined composition
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ResidueBag {
    counts: BTreeMap<String, usize>,
    composition: Composition,
}

impl ResidueBag {
    pub(crate) fn from_graph(graph: &MoleculeGraph) -> Self {
        let mut counts = BTreeMap::new();
        let mut composition = Composition::new();
        for node in graph.node_keys() {
            let name = match graph[node].kind() {
                NodeKind::Residue(residue) => Some(residue.to_string()),
                // NOTE: Substituents attached to a residue are counted as part of that residue's composition
                NodeKind::Terminal(terminal) => graph
                    .parents(node)
                    .next()
                    .is_none()
                    .then(|| terminal.name.clone()),
            };
            if let Some(name) = name {
                *counts.entry(name).or_default() += 1;
            }
            composition += graph[node].composition();
        }

        Self { counts, composition }
    }

    #[must_use]
    pub const fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// The total number of residues and free substituents in the bag
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.values().sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Massive for ResidueBag {
    fn composition(&self) -> Composition {
        self.composition.clone()
    }
}

/// Reads the first structure from `text`
pub fn loads(registry: &Registry, text: &str) -> Result<Structure> {
    loads_with(registry, text, &ReaderOptions::default())
}

pub fn loads_with(registry: &Registry, text: &str, options: &ReaderOptions) -> Result<Structure> {
    let document = reader::read(registry, text)?
        .into_iter()
        .next()
        .ok_or(StructuralError::EmptyStructure)?;
    expansion::expand(registry, options, &document)
}

/// Reads every blank-line-separated structure from `text`
pub fn load_all(registry: &Registry, text: &str) -> Result<Vec<Structure>> {
    load_all_with(registry, text, &ReaderOptions::default())
}

pub fn load_all_with(registry: &Registry, text: &str, options: &ReaderOptions) -> Result<Vec<Structure>> {
    reader::read(registry, text)?
        .iter()
        .map(|document| expansion::expand(registry, options, document))
        .collect()
}

// Module Tests ========================================================================================================
