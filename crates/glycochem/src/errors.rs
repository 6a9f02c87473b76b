use miette::Diagnostic;
use thiserror::Error;

use crate::{Position, atoms::errors::AtomicLookupError};

pub use crate::parsers::errors::{GlycoErrorKind, MalformedInputError};

pub type Result<T, E = Box<GlycoError>> = std::result::Result<T, E>;

// FIXME: Check all of the errors returned from public API are wrapped in this!
#[derive(Debug, Diagnostic, Error)]
pub enum GlycoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    MalformedInput(#[from] MalformedInputError),

    #[error("the {section} section on line {line} is recognized, but not supported")]
    #[diagnostic(help("only RES, LIN, REP, and UND sections can currently be read"))]
    UnsupportedSection { section: String, line: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    StructuralConsistency(#[from] StructuralError),

    #[error("bond {bond} is already {state}")]
    BondState { bond: i64, state: &'static str },

    #[error(
        "none of the {candidates} candidate parent / child pairs of ambiguous bond {bond} have an open position"
    )]
    #[diagnostic(help("check that the allowed positions aren't already occupied by other bonds or modifications"))]
    AmbiguousResolution { bond: i64, candidates: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    AtomicLookup(#[from] AtomicLookupError),

    #[error("the substituent {name:?} could not be found in the supplied registry")]
    SubstituentLookup { name: String },

    #[error("the modification {code:?} could not be found in the supplied registry")]
    ModificationLookup { code: String },

    #[error("no serializer named {name:?} has been registered")]
    SerializerLookup { name: String },
}

/// Violations of the graph's structural rules, caught while building or expanding it
#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum StructuralError {
    #[error("position {position} is out of range for a residue with {carbons} carbons")]
    PositionOutOfRange { position: u16, carbons: u8 },

    #[error("node {0} does not belong to this graph")]
    UnknownNode(usize),

    #[error("bond {0} does not belong to this graph")]
    UnknownBond(usize),

    #[error("a node cannot be bonded to itself")]
    SelfBond,

    #[error("residue index {index} on line {line} was never defined")]
    UndefinedIndex { index: u32, line: usize },

    #[error("residue index {index} on line {line} has already been defined")]
    DuplicateIndex { index: u32, line: usize },

    #[error("repeat {repeat} is referenced, but no matching REP section was found")]
    UndefinedRepeat { repeat: u32 },

    #[error("repeat {repeat} contains itself")]
    RecursiveRepeat { repeat: u32 },

    #[error("repeat {repeat} declares a lower bound of {lower} above its upper bound of {upper}")]
    InvertedBounds { repeat: u32, lower: i64, upper: i64 },

    #[error("repeat {repeat} would be expanded {count} times, which exceeds the limit of {limit}")]
    #[diagnostic(help("raise `ReaderOptions::max_repeat` if this structure is genuinely this large"))]
    RepeatLimit { repeat: u32, count: usize, limit: usize },

    #[error("nested REP / UND sections exceed the maximum depth of {limit}")]
    NestingLimit { limit: usize },

    #[error("expanding this structure would create more than {limit} residues")]
    ResidueLimit { limit: usize },

    #[error("undetermined subtree {und} contains no residues")]
    EmptySubtree { und: u32 },

    #[error("an ambiguous bond needs at least one candidate for each endpoint and position")]
    EmptyChoices,

    #[error("the requested configuration isn't one of the candidates of ambiguous bond {bond}")]
    ConfigurationNotAllowed { bond: i64 },

    #[error("the structure is split into {components} disconnected pieces")]
    #[diagnostic(help("set `ReaderOptions::allow_composition` to read disconnected structures as a bag of residues"))]
    Disconnected { components: usize },

    #[error("the structure contains no residues")]
    EmptyStructure,
}

impl GlycoError {
    pub(crate) fn bond_state(bond: i64, attached: bool) -> Self {
        let state = if attached { "attached" } else { "detached" };

        Self::BondState { bond, state }
    }

    pub(crate) fn substituent_lookup(name: &str) -> Self {
        let name = name.to_owned();

        Self::SubstituentLookup { name }
    }

    pub(crate) fn modification_lookup(code: &str) -> Self {
        let code = code.to_owned();

        Self::ModificationLookup { code }
    }

    pub(crate) fn position_out_of_range(position: Position, carbons: u8) -> Self {
        let position = match position {
            Position::Known(p) => p,
            Position::Unknown => 0,
        };

        StructuralError::PositionOutOfRange { position, carbons }.into()
    }
}

impl From<StructuralError> for Box<GlycoError> {
    fn from(value: StructuralError) -> Self {
        Box::new(value.into())
    }
}

impl From<AtomicLookupError> for Box<GlycoError> {
    fn from(value: AtomicLookupError) -> Self {
        Box::new(value.into())
    }
}

impl From<MalformedInputError> for Box<GlycoError> {
    fn from(value: MalformedInputError) -> Self {
        Box::new(value.into())
    }
}
