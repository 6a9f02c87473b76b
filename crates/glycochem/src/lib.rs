//! Glycan graphs built from atom-conserving bonds, plus a reader, writer, and canonicalizer for GlycoCT

pub mod atoms;
pub mod canonical;
pub mod derivatization;
pub mod errors;
pub mod glycoct;
pub mod graph;
mod parsers;
pub mod registry;
pub mod serializers;
#[cfg(test)]
mod testing_tools;

// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use derive_more::IsVariant;
use rust_decimal::Decimal;
use serde::Serialize;

// FIXME: Work on what's publicly exported / part of the API! Maybe create a prelude?
pub use atoms::atomic_database::AtomicDatabase;
pub use errors::{GlycoError, Result};
pub use glycoct::{ReaderOptions, ResidueBag, Structure};
pub use graph::traversal::TraversalMethod;
pub use registry::Registry;
pub use serializers::SerializerRegistry;

// NOTE: Every type that needs to see the internals of another lives here, and the `impl` blocks live in the modules
// named after them. Nodes and bonds refer to each other only through arena keys owned by `MoleculeGraph`

// Atoms & Compositions ================================================================================================

/// A signed count of atoms, keyed by element symbol
///
/// Zero counts are never stored, so two compositions with the same atoms always compare equal
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize)]
pub struct Composition(BTreeMap<String, i64>);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, IsVariant, Serialize)]
pub enum MassKind {
    #[default]
    Monoisotopic,
    Average,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(test, derive(Serialize))]
struct Element {
    name: String,
    isotopes: Vec<Isotope>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(test, derive(Serialize))]
struct Isotope {
    mass_number: u32,
    relative_mass: Decimal,
    abundance: Option<Decimal>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(test, derive(Serialize))]
struct Particle {
    name: String,
    mass: Decimal,
    charge: i64,
}

// Anything with a composition can be weighed
pub trait Massive {
    fn composition(&self) -> Composition;

    fn mass(&self, db: &AtomicDatabase, kind: MassKind) -> Result<Decimal> {
        self.composition().mass(db, kind)
    }

    fn mz(&self, db: &AtomicDatabase, kind: MassKind, charge: i64) -> Result<Decimal> {
        self.composition().mz(db, kind, charge)
    }
}

// Graph Keys and Positions ============================================================================================

// NOTE: This underlying `Id` type is just a synonym since arena slots are never exposed, only the newtypes below
type Id = usize;

/// A handle to a node, valid only for the `MoleculeGraph` that issued it
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct NodeKey(Id);

/// A handle to a bond, valid only for the `MoleculeGraph` that issued it
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct BondKey(Id);

/// An attachment site on a node's backbone
///
/// `Unknown` sorts before every concrete position, matching the `-1` it's written as in GlycoCT
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, IsVariant, Serialize)]
pub enum Position {
    #[default]
    Unknown,
    Known(u16),
}

// Nodes ===============================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MoleculeNode {
    id: i64,
    kind: NodeKind,
    composition: Composition,
    // NOTE: Insertion order is significant here, since canonicalization works by re-ordering these lists
    links: Vec<(Position, BondKey)>,
    substituent_links: Vec<(Position, BondKey)>,
    degree: usize,
}

#[derive(Clone, Eq, PartialEq, Debug, IsVariant)]
pub enum NodeKind {
    Residue(Residue),
    Terminal(Terminal),
}

/// A monosaccharide and its ring / stereochemistry descriptors
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Residue {
    pub anomer: Anomer,
    pub configuration: Vec<Configuration>,
    pub stem: Vec<Stem>,
    pub superclass: SuperClass,
    /// `None` when unknown, and `Some(0)` for an open chain
    pub ring_start: Option<u16>,
    pub ring_end: Option<u16>,
    pub modifications: Vec<(Position, Modification)>,
}

/// A substituent hanging off of a residue, like an N-acetyl or sulfate group
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Terminal {
    pub name: String,
    pub derivatized: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, IsVariant, Serialize)]
pub enum Anomer {
    Alpha,
    Beta,
    Uncyclized,
    #[default]
    Unknown,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum Configuration {
    D,
    L,
    X,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum Stem {
    Gro,
    Ery,
    Rib,
    Ara,
    All,
    Alt,
    Glc,
    Man,
    Tre,
    Xyl,
    Lyx,
    Gul,
    Ido,
    Gal,
    Tal,
    Thr,
    X,
}

/// The number of backbone carbons, written as `HEX`, `PEN`, `S11`, and so on
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct SuperClass(u8);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, IsVariant, Serialize)]
pub enum Modification {
    Deoxygenated,
    Acidic,
    Alditol,
    Keto,
    Unsaturated,
    SpHybridized,
    Sp2Hybridized,
    Geminal,
}

// Bonds ===============================================================================================================

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Bond {
    id: i64,
    parent: NodeKey,
    child: NodeKey,
    parent_position: Position,
    child_position: Position,
    parent_loss: Composition,
    child_loss: Composition,
    label: Option<BranchLabel>,
    attached: bool,
    // NOTE: `Some` marks an ambiguous bond, whose current endpoints are just one of the candidate configurations
    choices: Option<Box<BondChoices>>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct BondChoices {
    pub parents: Vec<NodeKey>,
    pub children: Vec<NodeKey>,
    pub parent_positions: Vec<Position>,
    pub child_positions: Vec<Position>,
}

/// One concrete assignment of an ambiguous bond's endpoints
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BondConfiguration {
    pub parent: NodeKey,
    pub child: NodeKey,
    pub parent_position: Position,
    pub child_position: Position,
}

/// Names a bond by the branch it belongs to and how far along that branch it sits, like `-3` or `b2`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct BranchLabel {
    branch: char,
    depth: usize,
}

// Graphs ==============================================================================================================

/// An arena of nodes and bonds, reachable from a single root
#[derive(Clone, Debug, Default)]
pub struct MoleculeGraph {
    nodes: Vec<MoleculeNode>,
    bonds: Vec<Bond>,
    root: Option<NodeKey>,
    node_index: Option<Vec<NodeKey>>,
    bond_index: Option<Vec<BondKey>>,
    branch_lengths: BTreeMap<char, usize>,
    branch_parents: BTreeMap<char, char>,
}
