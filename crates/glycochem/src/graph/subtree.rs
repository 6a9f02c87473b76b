// Standard Library Imports
use std::collections::VecDeque;

// External Crate Imports
use ahash::{HashMap, HashMapExt, HashSet};
use tracing::trace;

// Local Crate Imports
use crate::{BondKey, MoleculeGraph, NodeKey, Result, TraversalMethod};

// Public API ==========================================================================================================

impl MoleculeGraph {
    /// Copies `node` and everything that descends from it into a new graph, rooted at `node`
    ///
    /// Bonds leading out of the copied nodes are dropped, and the atoms they removed are given back to whichever end
    /// was kept. Node and bond ids are carried over unchanged, but no index is
    pub fn subtree_from(&self, node: NodeKey) -> Result<Self> {
        self.checked_node(node)?;

        let mut kept = Vec::new();
        let mut seen = HashSet::default();
        let mut frontier = VecDeque::from([node]);
        while let Some(next) = frontier.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            kept.push(next);
            frontier.extend(self.outgoing(next).map(|(_, b)| self.bonds[b.0].child));
        }

        let mut subtree = self.extract(&kept, node);
        subtree.node_index = None;
        subtree.bond_index = None;
        subtree.label_branches();
        Ok(subtree)
    }

    /// A copy of this graph holding only what's reachable from the root, with the same ids, index, and labels
    #[must_use]
    pub fn clone_from_root(&self) -> Self {
        let Some(root) = self.root else {
            return Self::new();
        };
        let kept: Vec<_> = self.iterate_all_nodes(TraversalMethod::DepthFirst).collect();
        let mut copy = self.extract(&kept, root);
        copy.branch_lengths.clone_from(&self.branch_lengths);
        copy.branch_parents.clone_from(&self.branch_parents);
        copy
    }

    // NOTE: `kept` must be free of duplicates, and its order becomes the new arena order. Any index is carried over,
    // minus the nodes and bonds left behind
    fn extract(&self, kept: &[NodeKey], root: NodeKey) -> Self {
        let node_map: HashMap<_, _> = kept.iter().enumerate().map(|(i, &n)| (n, NodeKey(i))).collect();

        let mut bond_map = HashMap::new();
        let mut bonds = Vec::new();
        for &node in kept {
            for &(_, bond) in self.nodes[node.0].all_links() {
                let old = &self.bonds[bond.0];
                let both_kept = node_map.contains_key(&old.parent) && node_map.contains_key(&old.child);
                if both_kept && !bond_map.contains_key(&bond) {
                    bond_map.insert(bond, BondKey(bonds.len()));
                    bonds.push(bond);
                }
            }
        }

        let remap = |links: &[(_, BondKey)]| -> Vec<_> {
            links
                .iter()
                .filter_map(|&(position, bond)| Some((position, *bond_map.get(&bond)?)))
                .collect()
        };
        let nodes = kept
            .iter()
            .map(|&node| {
                let mut copy = self.nodes[node.0].clone();
                for &(_, bond) in self.nodes[node.0].all_links() {
                    if bond_map.contains_key(&bond) {
                        continue;
                    }
                    // NOTE: This bond is being severed, so the kept end gets back whatever the bond took from it
                    let severed = &self.bonds[bond.0];
                    trace!(bond = severed.id, "severing bond while extracting a subgraph");
                    copy.composition += if severed.parent == node {
                        &severed.parent_loss
                    } else {
                        &severed.child_loss
                    };
                }
                copy.links = remap(&copy.links);
                copy.substituent_links = remap(&copy.substituent_links);
                copy.degree = copy.links.len() + copy.substituent_links.len();
                copy
            })
            .collect();

        let bonds = bonds
            .into_iter()
            .map(|bond| {
                let mut copy = self.bonds[bond.0].clone();
                copy.parent = node_map[&copy.parent];
                copy.child = node_map[&copy.child];
                if let Some(choices) = &mut copy.choices {
                    let keep = |candidates: &mut Vec<NodeKey>| {
                        candidates.retain(|n| node_map.contains_key(n));
                        for candidate in candidates {
                            *candidate = node_map[&*candidate];
                        }
                    };
                    keep(&mut choices.parents);
                    keep(&mut choices.children);
                }
                copy
            })
            .collect();

        let node_index = self.node_index.as_ref().map(|index| {
            index
                .iter()
                .filter_map(|node| node_map.get(node).copied())
                .collect()
        });
        let bond_index = self.bond_index.as_ref().map(|index| {
            index
                .iter()
                .filter_map(|bond| bond_map.get(bond).copied())
                .collect()
        });

        Self {
            nodes,
            bonds,
            root: node_map.get(&root).copied(),
            node_index,
            bond_index,
            ..Self::default()
        }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use crate::{Composition, Position, Registry, graph::loss_from_sigil};

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
                loss_from_sigil('o'),
                loss_from_sigil('d'),
            )
            .unwrap()
    }

    // GlcNAc -4-> Gal -3-> Fuc, with a stray residue that was never bonded
    fn chain() -> (MoleculeGraph, [NodeKey; 4]) {
        let mut graph = MoleculeGraph::new();
        let glc = residue(&mut graph, "b-dglc-HEX-1:5");
        graph.attach_substituent(&REGISTRY, glc, Position::Known(2), "n-acetyl").unwrap();
        let gal = residue(&mut graph, "b-dgal-HEX-1:5");
        let fuc = residue(&mut graph, "a-lgal-HEX-1:5|6:d");
        let stray = residue(&mut graph, "b-dman-HEX-1:5");
        glycosidic(&mut graph, glc, gal, 4);
        glycosidic(&mut graph, gal, fuc, 3);
        (graph, [glc, gal, fuc, stray])
    }

    #[test]
    fn subtrees_refund_severed_bonds() {
        let (graph, [_, gal, fuc, _]) = chain();
        let subtree = graph.subtree_from(gal).unwrap();

        let root = subtree.root().unwrap();
        assert_eq!(subtree[root].id(), graph[gal].id());
        assert_eq!(subtree[root].degree(), 1);
        // Gal gets back the hydroxyl it lost bonding to GlcNAc, but not the hydrogen it lost to Fuc
        assert_eq!(subtree[root].composition().to_string(), "C6H11O6");
        let leaf = subtree.leaves()[0];
        assert_eq!(subtree[leaf].composition(), graph[fuc].composition());
        assert_eq!(subtree.order(), 2);
        assert_eq!(subtree.node_keys().count(), 2);
        assert_eq!(subtree.total_composition().to_string(), "C12H22O10");
        assert!(subtree.node_index().is_none());
    }

    #[test]
    fn subtrees_keep_substituents() {
        let (graph, [glc, ..]) = chain();
        let subtree = graph.subtree_from(glc).unwrap();
        assert_eq!(subtree.order(), 4);
        assert_eq!(subtree.total_composition(), graph.total_composition());
        assert_eq!(subtree.iterate_links(TraversalMethod::DepthFirst).count(), 3);
    }

    #[test]
    fn clones_drop_unreachable_nodes() {
        let (mut graph, [glc, gal, ..]) = chain();
        graph.reindex(TraversalMethod::DepthFirst);
        let copy = graph.clone_from_root();

        assert_eq!(graph.node_keys().count(), 5);
        assert_eq!(copy.node_keys().count(), 4);
        assert_eq!(copy.total_composition(), graph.total_composition());
        assert_eq!(copy.node_index().map(<[_]>::len), Some(4));
        assert_eq!(copy.branch_lengths(), graph.branch_lengths());
        assert_eq!(copy[copy.get_node(graph[gal].id()).unwrap()].id(), graph[gal].id());
        assert_eq!(copy.get_node(graph[glc].id()), copy.root());

        let nodes: Vec<_> = copy.iterate_all_nodes(TraversalMethod::Index).map(|n| copy[n].id()).collect();
        assert_eq!(nodes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn cycles_are_copied_once() {
        let (mut graph, [glc, gal, fuc, _]) = chain();
        glycosidic(&mut graph, fuc, glc, 6);
        let subtree = graph.subtree_from(gal).unwrap();

        assert_eq!(subtree.order(), 4);
        assert_eq!(subtree.iterate_links(TraversalMethod::DepthFirst).count(), 4);
        let total: Composition = subtree.node_keys().map(|n| subtree[n].composition()).sum();
        assert_eq!(total, graph.total_composition());
    }
}
