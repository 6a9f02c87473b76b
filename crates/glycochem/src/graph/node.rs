// Standard Library Imports
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

// Local Crate Imports
use crate::{
    Anomer, BondKey, Composition, Configuration, GlycoError, Modification, MoleculeNode, NodeKind, Position, Residue,
    Result, Stem, SuperClass, Terminal,
    parsers::{
        errors::{MalformedInputError, final_parser},
        glycoct::residue_descriptor,
    },
};

// Descriptor Codes ====================================================================================================

impl Anomer {
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Alpha => 'a',
            Self::Beta => 'b',
            Self::Uncyclized => 'o',
            Self::Unknown => 'x',
        }
    }

    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'a' => Self::Alpha,
            'b' => Self::Beta,
            'o' => Self::Uncyclized,
            'x' => Self::Unknown,
            _ => return None,
        })
    }
}

impl Configuration {
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::D => 'd',
            Self::L => 'l',
            Self::X => 'x',
        }
    }

    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'd' => Self::D,
            'l' => Self::L,
            'x' => Self::X,
            _ => return None,
        })
    }
}

const STEMS: [(Stem, &str); 17] = [
    (Stem::Gro, "gro"),
    (Stem::Ery, "ery"),
    (Stem::Rib, "rib"),
    (Stem::Ara, "ara"),
    (Stem::All, "all"),
    (Stem::Alt, "alt"),
    (Stem::Glc, "glc"),
    (Stem::Man, "man"),
    (Stem::Tre, "tre"),
    (Stem::Xyl, "xyl"),
    (Stem::Lyx, "lyx"),
    (Stem::Gul, "gul"),
    (Stem::Ido, "ido"),
    (Stem::Gal, "gal"),
    (Stem::Tal, "tal"),
    (Stem::Thr, "thr"),
    (Stem::X, "x"),
];

impl Stem {
    #[must_use]
    pub fn code(self) -> &'static str {
        // NOTE: Every variant is listed in `STEMS`, so the fallback is never reached
        STEMS.iter().find(|&&(s, _)| s == self).map_or("x", |&(_, c)| c)
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        STEMS.iter().find(|&&(_, c)| c == code).map(|&(s, _)| s)
    }
}

const SUPERCLASS_NAMES: [&str; 9] = ["SUG", "TRI", "TET", "PEN", "HEX", "HEP", "OCT", "NON", "DEC"];

impl SuperClass {
    /// A superclass whose number of carbons isn't known, written as `X`
    pub const UNKNOWN: Self = Self(0);
    pub const PENTOSE: Self = Self(5);
    pub const HEXOSE: Self = Self(6);
    pub const NONOSE: Self = Self(9);

    /// Returns `None` unless `carbons` is between 2 and 20
    #[must_use]
    pub const fn new(carbons: u8) -> Option<Self> {
        if 2 <= carbons && carbons <= 20 {
            Some(Self(carbons))
        } else {
            None
        }
    }

    /// The number of backbone carbons, or 0 when unknown
    #[must_use]
    pub const fn carbons(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        if code == "X" {
            return Some(Self::UNKNOWN);
        }
        if let Some(carbons) = SUPERCLASS_NAMES.iter().position(|&n| n == code) {
            // NOTE: `SUG` is the two-carbon class, so names are offset by two from their index
            return u8::try_from(carbons + 2).ok().and_then(Self::new);
        }
        code.strip_prefix('S')
            .filter(|n| !n.starts_with('0'))
            .and_then(|n| n.parse().ok())
            .filter(|&n| n > 10)
            .and_then(Self::new)
    }
}

impl Display for SuperClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "X"),
            c @ 2..=10 => write!(f, "{}", SUPERCLASS_NAMES[usize::from(c - 2)]),
            c => write!(f, "S{c}"),
        }
    }
}

const MODIFICATIONS: [(Modification, &str); 8] = [
    (Modification::Deoxygenated, "d"),
    (Modification::Acidic, "a"),
    (Modification::Alditol, "aldi"),
    (Modification::Keto, "keto"),
    (Modification::Unsaturated, "en"),
    (Modification::SpHybridized, "sp"),
    (Modification::Sp2Hybridized, "sp2"),
    (Modification::Geminal, "geminal"),
];

impl Modification {
    #[must_use]
    pub fn code(self) -> &'static str {
        // NOTE: Every variant is listed in `MODIFICATIONS`, so the fallback is never reached
        MODIFICATIONS.iter().find(|&&(m, _)| m == self).map_or("", |&(_, c)| c)
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        MODIFICATIONS.iter().find(|&&(_, c)| c == code).map(|&(m, _)| m)
    }

    /// Modifications that change a carbon without claiming it as an attachment site
    pub(crate) const fn occupies_site(self) -> bool {
        !matches!(self, Self::Keto | Self::Alditol)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "-1"),
            Self::Known(p) => write!(f, "{p}"),
        }
    }
}

// Residue Descriptors =================================================================================================

impl Residue {
    /// A residue with no stem, configuration, or modifications, and unknown ring bounds
    #[must_use]
    pub const fn new(anomer: Anomer, superclass: SuperClass) -> Self {
        Self {
            anomer,
            configuration: Vec::new(),
            stem: Vec::new(),
            superclass,
            ring_start: None,
            ring_end: None,
            modifications: Vec::new(),
        }
    }

    #[must_use]
    pub const fn carbons(&self) -> u8 {
        self.superclass.carbons()
    }

    // NOTE: Without a known superclass, there's no upper bound to check against
    pub(crate) fn check_position(&self, position: Position) -> Result<()> {
        let out_of_range = |p: u16| p == 0 || (!self.superclass.is_unknown() && p > u16::from(self.carbons()));
        match position {
            Position::Known(p) if out_of_range(p) => {
                Err(GlycoError::position_out_of_range(position, self.carbons()).into())
            }
            _ => Ok(()),
        }
    }
}

impl Display for Residue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let ring = |r: Option<u16>| r.map_or_else(|| "x".to_owned(), |r| r.to_string());

        write!(f, "{}", self.anomer.code())?;
        for (configuration, stem) in self.configuration.iter().zip(&self.stem) {
            write!(f, "-{}{}", configuration.code(), stem.code())?;
        }
        write!(f, "-{}-{}:{}", self.superclass, ring(self.ring_start), ring(self.ring_end))?;
        for (position, modification) in &self.modifications {
            write!(f, "|{position}:{}", modification.code())?;
        }
        Ok(())
    }
}

impl FromStr for Residue {
    type Err = Box<GlycoError>;

    /// Parses the part of a GlycoCT residue line after the `1b:`, like `b-dglc-HEX-1:5|6:a`
    fn from_str(s: &str) -> Result<Self> {
        final_parser(residue_descriptor)(s)
            .map_err(|e| MalformedInputError::new("residue", s, 1, "RES", 0, e).into())
    }
}

// Nodes ===============================================================================================================

impl MoleculeNode {
    pub(crate) const fn new(id: i64, kind: NodeKind, composition: Composition) -> Self {
        Self {
            id,
            kind,
            composition,
            links: Vec::new(),
            substituent_links: Vec::new(),
            degree: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    pub const fn residue(&self) -> Option<&Residue> {
        match &self.kind {
            NodeKind::Residue(r) => Some(r),
            NodeKind::Terminal(_) => None,
        }
    }

    #[must_use]
    pub const fn terminal(&self) -> Option<&Terminal> {
        match &self.kind {
            NodeKind::Terminal(t) => Some(t),
            NodeKind::Residue(_) => None,
        }
    }

    /// The node's composition, net of whatever its bonds have removed from it
    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Backbone bonds, keyed by this node's side of the attachment
    #[must_use]
    pub fn links(&self) -> &[(Position, BondKey)] {
        &self.links
    }

    #[must_use]
    pub fn substituent_links(&self) -> &[(Position, BondKey)] {
        &self.substituent_links
    }

    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// The positions on this node that another bond could be placed at, and how many existing bonds sit at an
    /// unknown position
    ///
    /// A bond at an unknown position could be occupying any free carbon, so when one exists (or the ring closure
    /// isn't known), every open site is reported as [`Position::Unknown`] instead of a concrete carbon
    #[must_use]
    pub fn open_attachment_sites(&self, max_occupancy: usize) -> (Vec<Position>, usize) {
        self.open_sites_excluding(max_occupancy, None)
    }

    /// Counts everything claiming `position`: bonds and (for residues) site-occupying modifications
    pub fn is_occupied(&self, position: Position) -> Result<usize> {
        self.occupancy_excluding(position, None)
    }

    pub(crate) fn all_links(&self) -> impl Iterator<Item = &(Position, BondKey)> {
        self.links.iter().chain(&self.substituent_links)
    }

    pub(crate) fn open_sites_excluding(&self, max_occupancy: usize, exclude: Option<BondKey>) -> (Vec<Position>, usize) {
        if self.residue().is_some_and(|r| r.superclass.is_unknown()) {
            let unknowns = self
                .all_links()
                .filter(|&&(p, b)| p.is_unknown() && Some(b) != exclude)
                .count();
            // NOTE: A residue of unknown size always has room for one more bond, somewhere
            return (vec![Position::Unknown], unknowns);
        }

        let (slot_count, ring_end) = match &self.kind {
            NodeKind::Residue(r) => (usize::from(r.carbons()), r.ring_end),
            // NOTE: Substituents are treated as having two open valences, with no ring to close
            NodeKind::Terminal(_) => (2, Some(0)),
        };

        let mut slots = vec![0; slot_count];
        let mut unknowns = 0;
        let mut claim = |position: Position| match position {
            Position::Unknown => unknowns += 1,
            Position::Known(p) => {
                if let Some(count) = usize::from(p).checked_sub(1).and_then(|i| slots.get_mut(i)) {
                    *count += 1;
                }
            }
        };

        for &(position, bond) in self.all_links() {
            if Some(bond) != exclude {
                claim(position);
            }
        }
        if let NodeKind::Residue(residue) = &self.kind {
            for &(position, modification) in &residue.modifications {
                if modification.occupies_site() {
                    claim(position);
                }
            }
        }

        let indeterminate = unknowns > 0 || ring_end.is_none();
        let mut open: Vec<_> = slots
            .iter()
            .enumerate()
            .filter_map(|(i, &count)| {
                let carbon = u16::try_from(i + 1).ok()?;
                (count <= max_occupancy && ring_end != Some(carbon)).then_some(if indeterminate {
                    Position::Unknown
                } else {
                    Position::Known(carbon)
                })
            })
            .collect();

        // NOTE: An unknown ring closure still claims one of the carbons, we just don't know which
        if ring_end.is_none() {
            open.pop();
        }
        (open, unknowns)
    }

    pub(crate) fn occupancy_excluding(&self, position: Position, exclude: Option<BondKey>) -> Result<usize> {
        let Position::Known(_) = position else {
            return Ok(0);
        };

        let bonds = self
            .all_links()
            .filter(|&&(p, b)| p == position && Some(b) != exclude)
            .count();
        let modifications = match &self.kind {
            NodeKind::Residue(residue) => {
                residue.check_position(position)?;
                residue
                    .modifications
                    .iter()
                    .filter(|&&(p, m)| p == position && m.occupies_site())
                    .count()
            }
            NodeKind::Terminal(_) => 0,
        };
        Ok(bonds + modifications)
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Residue(r) => write!(f, "{r}"),
            Self::Terminal(t) => write!(f, "{}", t.name),
        }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn residue(descriptor: &str) -> Residue {
        descriptor.parse().unwrap()
    }

    fn node(descriptor: &str) -> MoleculeNode {
        MoleculeNode::new(1, NodeKind::Residue(residue(descriptor)), Composition::new())
    }

    #[test]
    fn anomer_codes() {
        for code in ['a', 'b', 'o', 'x'] {
            assert_eq!(Anomer::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Anomer::from_code('z'), None);
    }

    #[test]
    fn stem_codes() {
        for (stem, code) in STEMS {
            assert_eq!(Stem::from_code(code), Some(stem));
            assert_eq!(stem.code(), code);
        }
        assert_eq!(Stem::from_code("glu"), None);
    }

    #[test]
    fn superclass_codes() {
        assert_eq!(SuperClass::from_code("HEX"), Some(SuperClass::HEXOSE));
        assert_eq!(SuperClass::from_code("SUG"), SuperClass::new(2));
        assert_eq!(SuperClass::from_code("DEC"), SuperClass::new(10));
        assert_eq!(SuperClass::from_code("S11"), SuperClass::new(11));
        assert_eq!(SuperClass::from_code("X"), Some(SuperClass::UNKNOWN));
        assert_eq!(SuperClass::from_code("S10"), None);
        assert_eq!(SuperClass::from_code("S21"), None);
        assert_eq!(SuperClass::from_code("HEXX"), None);

        for carbons in 2..=20 {
            let superclass = SuperClass::new(carbons).unwrap();
            assert_eq!(SuperClass::from_code(&superclass.to_string()), Some(superclass));
        }
        assert_eq!(SuperClass::UNKNOWN.to_string(), "X");
        assert!(SuperClass::UNKNOWN.is_unknown());
    }

    #[test]
    fn modification_codes() {
        for (modification, code) in MODIFICATIONS {
            assert_eq!(Modification::from_code(code), Some(modification));
            assert_eq!(modification.code(), code);
        }
        assert!(!Modification::Keto.occupies_site());
        assert!(Modification::Deoxygenated.occupies_site());
    }

    #[test]
    fn residue_descriptors() {
        let glcnac = residue("b-dglc-HEX-1:5");
        assert_eq!(glcnac.anomer, Anomer::Beta);
        assert_eq!(glcnac.configuration, vec![Configuration::D]);
        assert_eq!(glcnac.stem, vec![Stem::Glc]);
        assert_eq!((glcnac.ring_start, glcnac.ring_end), (Some(1), Some(5)));
        assert_eq!(glcnac.to_string(), "b-dglc-HEX-1:5");

        for descriptor in [
            "a-dgro-dgal-NON-2:6|1:a|2:keto|3:d",
            "o-dglc-HEX-0:0|1:aldi",
            "x-lgal-HEX-x:x|6:d",
            "a-HEX-1:5",
            "x-X-x:x",
        ] {
            assert_eq!(residue(descriptor).to_string(), descriptor);
        }

        let error = "b-dfoo-HEX-1:5".parse::<Residue>().unwrap_err();
        assert_eq!(error.to_string(), "malformed RES line 1: expected a stem");
    }

    #[test]
    fn open_sites_of_a_closed_ring() {
        let (open, unknowns) = node("b-dglc-HEX-1:5").open_attachment_sites(0);
        let known: Vec<_> = [1, 2, 3, 4, 6].map(Position::Known).into();
        assert_eq!(open, known);
        assert_eq!(unknowns, 0);

        let (open, _) = node("a-lgal-HEX-1:5|6:d").open_attachment_sites(0);
        assert_eq!(open, [1, 2, 3, 4].map(Position::Known));

        // Keto modifications don't claim a site
        let (open, _) = node("a-dgro-dgal-NON-2:6|1:a|2:keto|3:d").open_attachment_sites(0);
        assert_eq!(open, [2, 4, 5, 7, 8, 9].map(Position::Known));
    }

    #[test]
    fn open_sites_with_unknown_ring() {
        let (open, unknowns) = node("x-dglc-HEX-x:x").open_attachment_sites(0);
        assert_eq!(open, vec![Position::Unknown; 5]);
        assert_eq!(unknowns, 0);
    }

    #[test]
    fn unknown_superclasses_are_unbounded() {
        let unknown = residue("x-X-x:x");
        assert!(unknown.check_position(Position::Known(1)).is_ok());
        assert!(unknown.check_position(Position::Known(12)).is_ok());
        assert!(unknown.check_position(Position::Known(0)).is_err());

        assert_eq!(node("x-X-x:x").open_attachment_sites(0), (vec![Position::Unknown], 0));
        assert_eq!(node("x-X-x:x").is_occupied(Position::Known(9)).unwrap(), 0);
    }

    #[test]
    fn open_sites_of_terminals() {
        let terminal = Terminal {
            name: "sulfate".to_owned(),
            derivatized: false,
        };
        let node = MoleculeNode::new(1, NodeKind::Terminal(terminal), Composition::new());
        assert_eq!(node.open_attachment_sites(0), (vec![Position::Known(1), Position::Known(2)], 0));
    }

    #[test]
    fn occupancy() {
        let fucose = node("a-lgal-HEX-1:5|6:d");
        assert_eq!(fucose.is_occupied(Position::Known(6)).unwrap(), 1);
        assert_eq!(fucose.is_occupied(Position::Known(2)).unwrap(), 0);
        assert_eq!(fucose.is_occupied(Position::Unknown).unwrap(), 0);

        let error = fucose.is_occupied(Position::Known(7)).unwrap_err();
        assert_eq!(error.to_string(), "position 7 is out of range for a residue with 6 carbons");
        assert!(fucose.is_occupied(Position::Known(0)).is_err());
    }
}
