pub mod ambiguous;
mod bond;
mod equality;
mod index;
mod node;
mod subtree;
pub mod traversal;

// Standard Library Imports
use std::ops::Index;

// External Crate Imports
use ahash::HashSet;
use tracing::{trace, warn};

// Local Crate Imports
use crate::{
    Bond, BondChoices, BondKey, Composition, Massive, MoleculeGraph, MoleculeNode, NodeKey,
    NodeKind, Position, Registry, Residue, Result, Terminal, errors::StructuralError,
};

// Re-exports
pub use bond::loss_from_sigil;

// Public API ==========================================================================================================

impl MoleculeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unbonded residue, weighing it as `(CH2O) × carbons` plus whatever its modifications add or remove
    ///
    /// The first node created becomes the graph's root
    pub fn create_residue(&mut self, registry: &Registry, mut residue: Residue) -> Result<NodeKey> {
        for &(position, _) in &residue.modifications {
            residue.check_position(position)?;
        }
        residue.modifications.sort_unstable();

        let unit: Composition = [("C", 1), ("H", 2), ("O", 1)].into_iter().collect();
        let mut composition = unit * i64::from(residue.carbons());
        for &(_, modification) in &residue.modifications {
            composition += &registry.modification(modification)?.delta;
        }

        Ok(self.push_node(NodeKind::Residue(residue), composition))
    }

    /// Adds an unbonded substituent, like `n-acetyl` or `sulfate`, looking up its composition in `registry`
    pub fn create_substituent(&mut self, registry: &Registry, name: &str) -> Result<NodeKey> {
        let composition = registry.substituent(name)?.composition.clone();
        let terminal = Terminal {
            name: name.to_owned(),
            derivatized: false,
        };

        Ok(self.push_node(NodeKind::Terminal(terminal), composition))
    }

    /// Creates a substituent and bonds it to `parent`, with the losses the registry lists for that substituent
    pub fn attach_substituent(
        &mut self,
        registry: &Registry,
        parent: NodeKey,
        position: Position,
        name: &str,
    ) -> Result<NodeKey> {
        let parent_loss = registry.substituent(name)?.attachment_loss.clone();
        let substituent = self.create_substituent(registry, name)?;
        self.add_bond(
            parent,
            substituent,
            position,
            Position::Known(1),
            parent_loss,
            bond::hydrogen(),
        )?;
        Ok(substituent)
    }

    /// Creates a bond between two nodes of this graph and immediately applies it
    ///
    /// If `child` was the root, the root moves up to the first ancestor without a parent of its own
    pub fn add_bond(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        parent_position: Position,
        child_position: Position,
        parent_loss: Composition,
        child_loss: Composition,
    ) -> Result<BondKey> {
        self.check_endpoints(parent, child)?;
        for (node, position) in [(parent, parent_position), (child, child_position)] {
            if let Some(residue) = self.nodes[node.0].residue() {
                residue.check_position(position)?;
            }
        }
        self.warn_unsupported(parent, child);

        let bond = self.push_bond(Bond {
            id: 0,
            parent,
            child,
            parent_position,
            child_position,
            parent_loss,
            child_loss,
            label: None,
            attached: false,
            choices: None,
        });
        self.apply(bond)?;
        self.lift_root(child);
        Ok(bond)
    }

    /// Creates a bond that could connect any of the candidate parents and children, at any of the candidate
    /// positions, then resolves and applies the first configuration with room for it
    ///
    /// Nothing is added to the graph if no candidate configuration is open
    pub fn add_ambiguous_bond(
        &mut self,
        choices: BondChoices,
        parent_loss: Composition,
        child_loss: Composition,
    ) -> Result<BondKey> {
        if choices.parents.is_empty()
            || choices.children.is_empty()
            || choices.parent_positions.is_empty()
            || choices.child_positions.is_empty()
        {
            return Err(StructuralError::EmptyChoices.into());
        }
        for &node in choices.parents.iter().chain(&choices.children) {
            self.checked_node(node)?;
        }

        let id = next_id(self.bonds.len());
        let configuration = self.resolve_choices(id, &choices, None)?;
        self.warn_unsupported(configuration.parent, configuration.child);

        let bond = self.push_bond(Bond {
            id,
            parent: configuration.parent,
            child: configuration.child,
            parent_position: configuration.parent_position,
            child_position: configuration.child_position,
            parent_loss,
            child_loss,
            label: None,
            attached: false,
            choices: Some(Box::new(choices)),
        });
        self.apply(bond)?;
        self.lift_root(configuration.child);
        Ok(bond)
    }

    #[must_use]
    pub const fn root(&self) -> Option<NodeKey> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeKey) -> Result<()> {
        self.checked_node(root)?;
        self.root = Some(root);
        Ok(())
    }

    #[must_use]
    pub fn node(&self, node: NodeKey) -> Option<&MoleculeNode> {
        self.nodes.get(node.0)
    }

    #[must_use]
    pub fn bond(&self, bond: BondKey) -> Option<&Bond> {
        self.bonds.get(bond.0)
    }

    /// Looks up a node by its current id, which changes whenever the graph is re-indexed
    #[must_use]
    pub fn get_node(&self, id: i64) -> Option<NodeKey> {
        self.nodes.iter().position(|n| n.id == id).map(NodeKey)
    }

    /// Looks up a bond by its current id, which changes whenever the graph is re-indexed
    #[must_use]
    pub fn get_link(&self, id: i64) -> Option<BondKey> {
        self.bonds.iter().position(|b| b.id == id).map(BondKey)
    }

    /// Every node ever added to this graph, including any that are no longer reachable from the root
    pub fn node_keys(&self) -> impl Iterator<Item = NodeKey> {
        (0..self.nodes.len()).map(NodeKey)
    }

    /// Every bond ever added to this graph, attached or not
    pub fn bond_keys(&self) -> impl Iterator<Item = BondKey> {
        (0..self.bonds.len()).map(BondKey)
    }

    /// The nodes this one is the parent of along the backbone, and the position each is attached at (on this node)
    pub fn children(&self, node: NodeKey) -> impl Iterator<Item = (Position, NodeKey)> + '_ {
        self.nodes[node.0]
            .links
            .iter()
            .filter(move |&&(_, b)| self.bonds[b.0].parent == node)
            .map(move |&(p, b)| (p, self.bonds[b.0].child))
    }

    /// The nodes this one is bonded to as a child, and the position each is attached at (on this node)
    pub fn parents(&self, node: NodeKey) -> impl Iterator<Item = (Position, NodeKey)> + '_ {
        self.nodes[node.0]
            .links
            .iter()
            .filter(move |&&(_, b)| self.bonds[b.0].child == node)
            .map(move |&(p, b)| (p, self.bonds[b.0].parent))
    }

    pub fn substituents(&self, node: NodeKey) -> impl Iterator<Item = (Position, NodeKey)> + '_ {
        self.nodes[node.0]
            .substituent_links
            .iter()
            .map(move |&(p, b)| (p, self.bonds[b.0].child))
    }

    /// Backbone nodes with no children of their own
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeKey> {
        self.iterate_nodes(Default::default())
            .filter(|&n| self.children(n).next().is_none())
            .collect()
    }

    /// The summed composition of every node reachable from the root, net of all bond losses
    #[must_use]
    pub fn total_composition(&self) -> Composition {
        self.iterate_all_nodes(Default::default())
            .map(|n| &self.nodes[n.0].composition)
            .sum()
    }

    /// The number of nodes reachable from the root, counting substituents
    #[must_use]
    pub fn order(&self) -> usize {
        self.iterate_all_nodes(Default::default()).count()
    }

    pub(crate) fn checked_node(&self, node: NodeKey) -> Result<&MoleculeNode> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| StructuralError::UnknownNode(node.0).into())
    }

    // NOTE: Bonds that are still listed by a node, in whichever order that node lists them
    pub(crate) fn outgoing(&self, node: NodeKey) -> impl Iterator<Item = (Position, BondKey)> + '_ {
        self.nodes[node.0]
            .all_links()
            .copied()
            .filter(move |&(_, b)| self.bonds[b.0].parent == node)
    }

    fn push_node(&mut self, kind: NodeKind, composition: Composition) -> NodeKey {
        let key = NodeKey(self.nodes.len());
        trace!(node = key.0, %kind, "creating node");
        self.nodes.push(MoleculeNode::new(next_id(self.nodes.len()), kind, composition));
        self.root.get_or_insert(key);
        key
    }

    // NOTE: A root that gains a parent hands the role to its parentless ancestor. On a cycle there isn't one, so the
    // root stays put
    fn lift_root(&mut self, child: NodeKey) {
        if self.root != Some(child) {
            return;
        }

        let mut visited = HashSet::default();
        let mut node = child;
        while visited.insert(node) {
            match self.parents(node).next() {
                Some((_, parent)) => node = parent,
                None => {
                    trace!(from = child.0, to = node.0, "moving the root up to a new parent");
                    self.root = Some(node);
                    return;
                }
            };
        }
    }

    fn push_bond(&mut self, mut bond: Bond) -> BondKey {
        let key = BondKey(self.bonds.len());
        bond.id = next_id(self.bonds.len());
        self.bonds.push(bond);
        key
    }

    fn check_endpoints(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        self.checked_node(parent)?;
        self.checked_node(child)?;
        if parent == child {
            return Err(StructuralError::SelfBond.into());
        }
        Ok(())
    }

    fn warn_unsupported(&self, parent: NodeKey, child: NodeKey) {
        match (&self.nodes[parent.0].kind, &self.nodes[child.0].kind) {
            (NodeKind::Terminal(t), NodeKind::Residue(_)) => warn!(
                substituent = %t.name,
                "a residue bonded to a substituent parent was found, and may not traverse as expected"
            ),
            // NOTE: Derivatizing groups are expected to cap the nitrogen of amide substituents
            (NodeKind::Terminal(p), NodeKind::Terminal(c)) if !c.derivatized => warn!(
                parent = %p.name,
                child = %c.name,
                "substituents bearing other substituents aren't fully supported"
            ),
            _ => (),
        }
    }
}

impl Index<NodeKey> for MoleculeGraph {
    type Output = MoleculeNode;

    fn index(&self, index: NodeKey) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl Index<BondKey> for MoleculeGraph {
    type Output = Bond;

    fn index(&self, index: BondKey) -> &Self::Output {
        &self.bonds[index.0]
    }
}

impl Massive for MoleculeGraph {
    fn composition(&self) -> Composition {
        self.total_composition()
    }
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).map_or(i64::MAX, |n| n + 1)
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;
    use rust_decimal_macros::dec;

    use crate::{Anomer, Configuration, MassKind, Modification, Stem, SuperClass};

    use super::*;

    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

    fn residue(graph: &mut MoleculeGraph, descriptor: &str) -> NodeKey {
        graph.create_residue(&REGISTRY, descriptor.parse().unwrap()).unwrap()
    }

    fn glycosidic(graph: &mut MoleculeGraph, parent: NodeKey, child: NodeKey, position: u16) -> BondKey {
        graph
            .add_bond(
                parent,
                child,
                Position::Known(position),
                Position::Known(1),
                bond::hydrogen(),
                bond::hydroxyl(),
            )
            .unwrap()
    }

    #[test]
    fn residue_compositions() {
        let mut graph = MoleculeGraph::new();
        let mut composition = |descriptor| {
            let node = residue(&mut graph, descriptor);
            graph[node].composition().to_string()
        };
        assert_eq!(composition("b-dglc-HEX-1:5"), "C6H12O6");
        assert_eq!(composition("a-lgal-HEX-1:5|6:d"), "C6H12O5");
        assert_eq!(composition("b-dglc-HEX-1:5|6:a"), "C6H10O7");
        assert_eq!(composition("a-dgro-dgal-NON-2:6|1:a|2:keto|3:d"), "C9H14O9");
        assert_eq!(composition("o-dglc-HEX-0:0|1:aldi"), "C6H14O6");
        assert_eq!(composition("x-X-x:x"), "");
    }

    #[test]
    fn built_residues_match_parsed_ones() {
        let mut built = Residue::new(Anomer::Alpha, SuperClass::HEXOSE);
        built.configuration = vec![Configuration::L];
        built.stem = vec![Stem::Gal];
        built.ring_start = Some(1);
        built.ring_end = Some(5);
        built.modifications = vec![(Position::Known(6), Modification::Deoxygenated)];
        assert_eq!(built, "a-lgal-HEX-1:5|6:d".parse().unwrap());
    }

    #[test]
    fn modifications_are_range_checked() {
        let mut graph = MoleculeGraph::new();
        let error = graph
            .create_residue(&REGISTRY, "b-dglc-HEX-1:5|7:d".parse().unwrap())
            .unwrap_err();
        assert_eq!(error.to_string(), "position 7 is out of range for a residue with 6 carbons");
        assert_eq!(graph.root(), None);
    }

    #[test]
    fn bonds_are_validated() {
        let mut graph = MoleculeGraph::new();
        let glc = residue(&mut graph, "b-dglc-HEX-1:5");
        let gal = residue(&mut graph, "b-dgal-HEX-1:5");

        let error = graph
            .add_bond(glc, glc, Position::Known(4), Position::Known(1), bond::hydrogen(), bond::hydroxyl())
            .unwrap_err();
        assert_eq!(error.to_string(), "a node cannot be bonded to itself");

        let error = graph
            .add_bond(glc, gal, Position::Known(9), Position::Known(1), bond::hydrogen(), bond::hydroxyl())
            .unwrap_err();
        assert_eq!(error.to_string(), "position 9 is out of range for a residue with 6 carbons");

        let error = graph
            .add_bond(glc, NodeKey(7), Position::Known(4), Position::Known(1), bond::hydrogen(), bond::hydroxyl())
            .unwrap_err();
        assert_eq!(error.to_string(), "node 7 does not belong to this graph");

        // Nothing was applied by the failed attempts
        assert_eq!(graph[glc].degree(), 0);
        assert_eq!(graph[gal].composition().to_string(), "C6H12O6");
    }

    #[test]
    fn queries() {
        let mut graph = MoleculeGraph::new();
        let glc = residue(&mut graph, "b-dglc-HEX-1:5");
        let gal = residue(&mut graph, "b-dgal-HEX-1:5");
        let fuc = residue(&mut graph, "a-lgal-HEX-1:5|6:d");
        let to_gal = glycosidic(&mut graph, glc, gal, 4);
        glycosidic(&mut graph, glc, fuc, 3);
        let nac = graph.attach_substituent(&REGISTRY, glc, Position::Known(2), "n-acetyl").unwrap();

        assert_eq!(graph.root(), Some(glc));
        assert_eq!(
            graph.children(glc).collect::<Vec<_>>(),
            vec![(Position::Known(4), gal), (Position::Known(3), fuc)]
        );
        assert_eq!(graph.parents(gal).collect::<Vec<_>>(), vec![(Position::Known(1), glc)]);
        assert_eq!(graph.substituents(glc).collect::<Vec<_>>(), vec![(Position::Known(2), nac)]);
        let mut leaves = graph.leaves();
        leaves.sort();
        assert_eq!(leaves, vec![gal, fuc]);
        assert_eq!(graph.get_node(2), Some(gal));
        assert_eq!(graph.get_link(1), Some(to_gal));
        assert_eq!(graph.get_node(42), None);
        assert_eq!(graph.order(), 4);
    }

    #[test]
    fn roots_move_up_to_new_parents() {
        let mut graph = MoleculeGraph::new();
        let glc = residue(&mut graph, "b-dglc-HEX-1:5");
        let gal = residue(&mut graph, "b-dgal-HEX-1:5");
        let man = residue(&mut graph, "b-dman-HEX-1:5");
        assert_eq!(graph.root(), Some(glc));

        glycosidic(&mut graph, gal, glc, 4);
        assert_eq!(graph.root(), Some(gal));
        glycosidic(&mut graph, man, gal, 3);
        assert_eq!(graph.root(), Some(man));
        assert_eq!(graph.order(), 3);

        // Closing a cycle leaves no parentless ancestor to move to
        glycosidic(&mut graph, glc, man, 6);
        assert_eq!(graph.root(), Some(man));
    }

    #[test]
    fn substituents_created_first_hand_over_the_root() {
        let mut graph = MoleculeGraph::new();
        let nac = graph.create_substituent(&REGISTRY, "n-acetyl").unwrap();
        let glc = residue(&mut graph, "b-dglc-HEX-1:5");
        graph
            .add_bond(glc, nac, Position::Known(2), Position::Known(1), bond::hydroxyl(), bond::hydrogen())
            .unwrap();
        assert_eq!(graph.root(), Some(glc));
    }

    #[test]
    fn lactose_mass() {
        let mut graph = MoleculeGraph::new();
        let glc = residue(&mut graph, "b-dglc-HEX-1:5");
        let gal = residue(&mut graph, "b-dgal-HEX-1:5");
        glycosidic(&mut graph, glc, gal, 4);

        assert_eq!(graph.total_composition().to_string(), "C12H22O11");
        assert_eq!(
            graph.mass(REGISTRY.atoms(), MassKind::Monoisotopic).unwrap(),
            dec!(342.11621152433)
        );
    }
}
