//! Resolution of bonds whose endpoints or attachment positions aren't precisely known

// External Crate Imports
use ahash::HashMap;
use itertools::iproduct;
use tracing::debug;

// Local Crate Imports
use crate::{
    Bond, BondChoices, BondConfiguration, BondKey, GlycoError, MoleculeGraph, MoleculeNode, NodeKey, NodeKind,
    Position, Result, errors::StructuralError,
};

// Public API ==========================================================================================================

impl MoleculeGraph {
    /// Finds the first candidate configuration of `bond` with room for it on both ends
    ///
    /// Parent and child candidates are tried in the order they were given, and concrete positions are preferred over
    /// unknown ones. If `bond` is currently attached, the sites it holds count as open. When `attach` is set, the bond
    /// is moved to the configuration found (and applied if it wasn't already)
    pub fn find_open_position(&mut self, bond: BondKey, attach: bool) -> Result<BondConfiguration> {
        let bond_ref = self.checked_bond(bond)?;
        let id = bond_ref.id;
        let exclude = bond_ref.attached.then_some(bond);
        let choices = choices_of(bond_ref);

        let configuration = self.resolve_choices(id, &choices, exclude)?;
        if attach {
            self.move_bond(bond, configuration)?;
        }
        Ok(configuration)
    }

    /// Lists every candidate configuration of `bond` that wouldn't double-book a position, given the graph's other
    /// bonds
    ///
    /// Occupancy is simulated from every attached, unambiguous bond and every site-occupying modification, so the
    /// graph itself is never touched. Call this again for a fresh sequence
    pub fn iter_configurations(&self, bond: BondKey) -> Result<impl Iterator<Item = BondConfiguration> + '_> {
        let choices = choices_of(self.checked_bond(bond)?);
        let occupancy = self.simulate_occupancy(bond);

        let BondChoices {
            parents,
            children,
            parent_positions,
            child_positions,
        } = choices;
        Ok(
            iproduct!(parents, children, parent_positions, child_positions).filter_map(
                move |(parent, child, parent_position, child_position)| {
                    let fits = parent != child
                        && occupancy.fits(self, parent, parent_position)
                        && occupancy.fits(self, child, child_position);
                    fits.then_some(BondConfiguration {
                        parent,
                        child,
                        parent_position,
                        child_position,
                    })
                },
            ),
        )
    }

    /// Moves `bond` to a specific configuration, which must be drawn from its candidates
    ///
    /// The bond's losses are refunded from its old endpoints before being taken from the new ones
    pub fn reconfigure(&mut self, bond: BondKey, configuration: BondConfiguration) -> Result<()> {
        let bond_ref = self.checked_bond(bond)?;
        let BondChoices {
            parents,
            children,
            parent_positions,
            child_positions,
        } = choices_of(bond_ref);

        let allowed = parents.contains(&configuration.parent)
            && children.contains(&configuration.child)
            && parent_positions.contains(&configuration.parent_position)
            && child_positions.contains(&configuration.child_position)
            && configuration.parent != configuration.child;
        if !allowed {
            return Err(StructuralError::ConfigurationNotAllowed { bond: bond_ref.id }.into());
        }
        for (node, position) in [
            (configuration.parent, configuration.parent_position),
            (configuration.child, configuration.child_position),
        ] {
            if let Some(residue) = self.checked_node(node)?.residue() {
                residue.check_position(position)?;
            }
        }

        self.move_bond(bond, configuration)
    }

    pub(crate) fn resolve_choices(
        &self,
        id: i64,
        choices: &BondChoices,
        exclude: Option<BondKey>,
    ) -> Result<BondConfiguration> {
        let pairs = iproduct!(&choices.parents, &choices.children).filter(|(parent, child)| parent != child);
        for (&parent, &child) in pairs {
            let parent_site = pick_site(&self.nodes[parent.0], &choices.parent_positions, exclude);
            let child_site = pick_site(&self.nodes[child.0], &choices.child_positions, exclude);

            if let (Some(parent_position), Some(child_position)) = (parent_site, child_site) {
                debug!(bond = id, ?parent_position, ?child_position, "resolved ambiguous bond");
                return Ok(BondConfiguration {
                    parent,
                    child,
                    parent_position,
                    child_position,
                });
            }
        }

        let candidates = choices.parents.len() * choices.children.len();
        Err(GlycoError::AmbiguousResolution { bond: id, candidates }.into())
    }

    // NOTE: The new configuration must be fully computed before this is called, so a failure can't strand the bond
    // half-way between its old and new endpoints
    fn move_bond(&mut self, bond: BondKey, configuration: BondConfiguration) -> Result<()> {
        if self.bonds[bond.0].attached {
            self.break_link(bond, true)?;
        }

        let bond_mut = &mut self.bonds[bond.0];
        bond_mut.parent = configuration.parent;
        bond_mut.child = configuration.child;
        bond_mut.parent_position = configuration.parent_position;
        bond_mut.child_position = configuration.child_position;
        self.apply(bond)
    }

    fn simulate_occupancy(&self, exclude: BondKey) -> Occupancy {
        let mut occupancy = Occupancy::default();
        let bonds = self
            .bond_keys()
            .map(|b| (b, &self.bonds[b.0]))
            .filter(|&(b, bond)| b != exclude && bond.attached && !bond.is_ambiguous());
        for (_, bond) in bonds {
            occupancy.claim(bond.parent, bond.parent_position);
            occupancy.claim(bond.child, bond.child_position);
        }

        for node in self.node_keys() {
            if let Some(residue) = self.nodes[node.0].residue() {
                for &(position, modification) in &residue.modifications {
                    if modification.occupies_site() {
                        occupancy.claim(node, position);
                    }
                }
            }
        }
        occupancy
    }
}

// NOTE: Plain bonds are treated as ambiguous bonds with exactly one candidate configuration
fn choices_of(bond: &Bond) -> BondChoices {
    bond.choices.as_deref().cloned().unwrap_or_else(|| BondChoices {
        parents: vec![bond.parent],
        children: vec![bond.child],
        parent_positions: vec![bond.parent_position],
        child_positions: vec![bond.child_position],
    })
}

fn pick_site(node: &MoleculeNode, allowed: &[Position], exclude: Option<BondKey>) -> Option<Position> {
    let (open, unknowns) = node.open_sites_excluding(0, exclude);
    let known = || allowed.iter().copied().filter(Position::is_known);
    let is_free = |position: Position| {
        let ring_closure = node
            .residue()
            .is_some_and(|r| matches!((r.ring_end, position), (Some(end), Position::Known(p)) if end == p));
        !ring_closure && node.occupancy_excluding(position, exclude).is_ok_and(|n| n == 0)
    };

    if node.residue().is_some_and(|r| r.superclass.is_unknown()) {
        let unknown = allowed.contains(&Position::Unknown).then_some(Position::Unknown);
        return known().find(|&p| is_free(p)).or(unknown);
    }
    if let Some(position) = known().find(|p| open.contains(p)) {
        return Some(position);
    }
    if open.is_empty() {
        return None;
    }

    let indeterminate = open.contains(&Position::Unknown);
    if allowed.contains(&Position::Unknown) {
        let unknown_slots = open.iter().filter(|p| p.is_unknown()).count();
        // NOTE: Taking the last unknown slot while several unknown bonds are still outstanding would leave nowhere
        // for them to be, so a concrete site is used instead if one is free
        if unknowns > 1 && unknown_slots == 1 {
            return known().find(|&p| is_free(p)).or(Some(Position::Unknown));
        }
        return Some(Position::Unknown);
    }
    if indeterminate {
        return known().find(|&p| is_free(p));
    }
    None
}

#[derive(Default)]
struct Occupancy {
    known: HashMap<(NodeKey, u16), usize>,
    unknown: HashMap<NodeKey, usize>,
}

impl Occupancy {
    fn claim(&mut self, node: NodeKey, position: Position) {
        match position {
            Position::Known(p) => *self.known.entry((node, p)).or_default() += 1,
            Position::Unknown => *self.unknown.entry(node).or_default() += 1,
        }
    }

    fn fits(&self, graph: &MoleculeGraph, node: NodeKey, position: Position) -> bool {
        let NodeKind::Residue(residue) = &graph.nodes[node.0].kind else {
            return true;
        };
        if residue.check_position(position).is_err() {
            return false;
        }
        let claimed =
            |p: u16| residue.ring_end == Some(p) || self.known.contains_key(&(node, p));
        if matches!(position, Position::Known(p) if claimed(p)) {
            return false;
        }

        if residue.superclass.is_unknown() {
            return true;
        }

        let ring_closure = usize::from(residue.ring_end != Some(0));
        let taken = self.known.keys().filter(|&&(n, _)| n == node).count();
        let unknowns = self.unknown.get(&node).copied().unwrap_or_default();
        let free = usize::from(residue.carbons()).saturating_sub(ring_closure + taken);
        free.checked_sub(1).is_some_and(|left| left >= unknowns)
    }
}

// Module Tests ========================================================================================================
