// External Crate Imports
use ahash::HashSet;

// Local Crate Imports
use crate::{Bond, BondKey, MoleculeGraph, NodeKey, Position};

type Pair = (NodeKey, NodeKey);

// Public API ==========================================================================================================

impl MoleculeGraph {
    /// True when both graphs describe the same molecule, with every node listing its bonds in the same order
    ///
    /// Ids are ignored, so two graphs built in different orders compare equal once both are canonicalized
    #[must_use]
    pub fn exact_ordering_equal(&self, other: &Self) -> bool {
        match (self.root, other.root) {
            (Some(a), Some(b)) => self.exact_equal(other, a, b, &mut HashSet::default()),
            (a, b) => a.is_none() && b.is_none(),
        }
    }

    /// Like [`exact_ordering_equal`](Self::exact_ordering_equal), but sibling bonds may be listed in any order
    #[must_use]
    pub fn topological_equal(&self, other: &Self) -> bool {
        match (self.root, other.root) {
            (Some(a), Some(b)) => self.topo_equal(other, a, b, &mut HashSet::default()),
            (a, b) => a.is_none() && b.is_none(),
        }
    }

    fn exact_equal(&self, other: &Self, a: NodeKey, b: NodeKey, visited: &mut HashSet<Pair>) -> bool {
        // NOTE: A pair that's already being compared is assumed equal, which is what lets cycles terminate
        if !visited.insert((a, b)) {
            return true;
        }
        if !self.same_node(other, a, b) {
            return false;
        }

        let lists = |graph: &Self, node: NodeKey| [graph.outgoing_links(node), graph.outgoing_substituents(node)];
        lists(self, a).into_iter().zip(lists(other, b)).all(|(ours, theirs)| {
            ours.len() == theirs.len()
                && ours.iter().zip(&theirs).all(|(&(p, x), &(q, y))| {
                    p == q
                        && same_bond(&self.bonds[x.0], &other.bonds[y.0])
                        && self.exact_equal(other, self.bonds[x.0].child, other.bonds[y.0].child, visited)
                })
        })
    }

    fn topo_equal(&self, other: &Self, a: NodeKey, b: NodeKey, in_stack: &mut HashSet<Pair>) -> bool {
        if in_stack.contains(&(a, b)) {
            return true;
        }
        if !self.same_node(other, a, b) {
            return false;
        }

        in_stack.insert((a, b));
        let lists = |graph: &Self, node: NodeKey| [graph.outgoing_links(node), graph.outgoing_substituents(node)];
        let equal = lists(self, a).into_iter().zip(lists(other, b)).all(|(ours, theirs)| {
            if ours.len() != theirs.len() {
                return false;
            }
            // NOTE: Each of our bonds claims the first unclaimed bond of theirs that it matches
            let mut claimed = vec![false; theirs.len()];
            ours.iter().all(|&(p, x)| {
                let found = theirs.iter().enumerate().position(|(i, &(q, y))| {
                    !claimed[i]
                        && p == q
                        && same_bond(&self.bonds[x.0], &other.bonds[y.0])
                        && self.topo_equal(other, self.bonds[x.0].child, other.bonds[y.0].child, in_stack)
                });
                found.is_some_and(|i| {
                    claimed[i] = true;
                    true
                })
            })
        });
        in_stack.remove(&(a, b));
        equal
    }

    fn same_node(&self, other: &Self, a: NodeKey, b: NodeKey) -> bool {
        let (a, b) = (&self.nodes[a.0], &other.nodes[b.0]);
        a.kind == b.kind && a.composition == b.composition
    }

    fn outgoing_links(&self, node: NodeKey) -> Vec<(Position, BondKey)> {
        let node_ref = &self.nodes[node.0];
        node_ref
            .links
            .iter()
            .copied()
            .filter(|&(_, b)| self.bonds[b.0].parent == node)
            .collect()
    }

    fn outgoing_substituents(&self, node: NodeKey) -> Vec<(Position, BondKey)> {
        self.nodes[node.0].substituent_links.clone()
    }
}

impl PartialEq for MoleculeGraph {
    fn eq(&self, other: &Self) -> bool {
        self.exact_ordering_equal(other)
    }
}

fn same_bond(a: &Bond, b: &Bond) -> bool {
    a.parent_position == b.parent_position
        && a.child_position == b.child_position
        && a.parent_loss == b.parent_loss
        && a.child_loss == b.child_loss
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use crate::{Registry, graph::loss_from_sigil};

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

    // A mannose with a galactose and a fucose hanging off of it, bonded in the order given
    fn branched(gal_first: bool) -> MoleculeGraph {
        let mut graph = MoleculeGraph::new();
        let man = residue(&mut graph, "b-dman-HEX-1:5");
        let gal = residue(&mut graph, "b-dgal-HEX-1:5");
        let fuc = residue(&mut graph, "a-lgal-HEX-1:5|6:d");
        if gal_first {
            glycosidic(&mut graph, man, gal, 3);
            glycosidic(&mut graph, man, fuc, 6);
        } else {
            glycosidic(&mut graph, man, fuc, 6);
            glycosidic(&mut graph, man, gal, 3);
        }
        graph.attach_substituent(&REGISTRY, gal, Position::Known(2), "n-acetyl").unwrap();
        graph
    }

    #[test]
    fn sibling_order_matters_for_exact_equality() {
        let (a, b) = (branched(true), branched(false));
        assert!(a.exact_ordering_equal(&branched(true)));
        assert!(!a.exact_ordering_equal(&b));
        assert_ne!(a, b);
        assert!(a.topological_equal(&b));
        assert!(b.topological_equal(&a));
    }

    #[test]
    fn differences_are_noticed() {
        let mut moved = MoleculeGraph::new();
        let man = residue(&mut moved, "b-dman-HEX-1:5");
        let gal = residue(&mut moved, "b-dgal-HEX-1:5");
        let fuc = residue(&mut moved, "a-lgal-HEX-1:5|6:d");
        glycosidic(&mut moved, man, gal, 3);
        glycosidic(&mut moved, man, fuc, 4);
        moved.attach_substituent(&REGISTRY, gal, Position::Known(2), "n-acetyl").unwrap();
        assert!(!moved.topological_equal(&branched(true)));

        let mut bare = branched(true);
        let bond = bare.get_link(3).unwrap();
        bare.break_link(bond, true).unwrap();
        assert!(!bare.topological_equal(&branched(true)));
        assert!(!bare.exact_ordering_equal(&branched(true)));

        assert_eq!(MoleculeGraph::new(), MoleculeGraph::new());
        assert_ne!(MoleculeGraph::new(), branched(true));
    }

    #[test]
    fn cycles_compare_without_looping() {
        let cyclic = || {
            let mut graph = branched(true);
            let (man, fuc) = (graph.get_node(1).unwrap(), graph.get_node(3).unwrap());
            glycosidic(&mut graph, fuc, man, 2);
            graph
        };
        assert!(cyclic().exact_ordering_equal(&cyclic()));
        assert!(cyclic().topological_equal(&cyclic()));
        assert!(!cyclic().topological_equal(&branched(true)));
    }
}
