// Standard Library Imports
use std::collections::VecDeque;

// External Crate Imports
use ahash::HashSet;
use derive_more::IsVariant;
use serde::Serialize;
use tracing::debug;

// Local Crate Imports
use crate::{BondKey, MoleculeGraph, NodeKey, NodeKind};

// Public API ==========================================================================================================

/// The order in which a graph's nodes are visited
///
/// Every strategy treats bonds as undirected and keeps track of the nodes it has already visited, so cyclic graphs
/// are safe to walk
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, IsVariant, Serialize)]
pub enum TraversalMethod {
    #[default]
    DepthFirst,
    BreadthFirst,
    /// Replays the order recorded by the last [`MoleculeGraph::reindex`], ignoring any edits made since
    Index,
}

/// A lazy walk over a graph's backbone, borrowing the graph until it's dropped
#[derive(Clone, Debug)]
pub struct Nodes<'g> {
    inner: NodesInner<'g>,
}

#[derive(Clone, Debug)]
enum NodesInner<'g> {
    Walk {
        graph: &'g MoleculeGraph,
        breadth_first: bool,
        frontier: VecDeque<NodeKey>,
        visited: HashSet<NodeKey>,
    },
    Replay(std::slice::Iter<'g, NodeKey>),
}

impl MoleculeGraph {
    /// Walks the backbone of the graph, starting from its root
    #[must_use]
    pub fn iterate_nodes(&self, method: TraversalMethod) -> Nodes<'_> {
        match (method, &self.node_index) {
            (TraversalMethod::Index, Some(index)) => Nodes {
                inner: NodesInner::Replay(index.iter()),
            },
            _ => self.walk(self.root, method),
        }
    }

    /// Walks the backbone of the graph, starting from `start` instead of the root
    ///
    /// An index replay always starts at the root, so [`TraversalMethod::Index`] walks depth-first here
    #[must_use]
    pub fn iterate_nodes_from(&self, start: NodeKey, method: TraversalMethod) -> Nodes<'_> {
        self.walk(Some(start), method)
    }

    /// Visits every bond once, in the order that their parents are visited by `method`
    pub fn iterate_links(&self, method: TraversalMethod) -> impl Iterator<Item = BondKey> + '_ {
        let mut seen = HashSet::default();
        self.iterate_all_nodes(method)
            .flat_map(move |node| self.outgoing(node))
            .filter_map(move |(_, bond)| seen.insert(bond).then_some(bond))
    }

    /// Like [`iterate_nodes`](Self::iterate_nodes), but each node is immediately followed by its substituents
    pub fn iterate_all_nodes(&self, method: TraversalMethod) -> impl Iterator<Item = NodeKey> + '_ {
        let replay = method.is_index() && self.node_index.is_some();
        let mut pending = VecDeque::new();
        let mut seen = HashSet::default();
        let mut backbone = self.iterate_nodes(method);

        std::iter::from_fn(move || {
            loop {
                let node = pending.pop_front().or_else(|| backbone.next())?;
                if !seen.insert(node) {
                    continue;
                }
                // NOTE: A recorded index already lists substituents in place
                if !replay {
                    for decoration in self.decorations(node).into_iter().rev() {
                        pending.push_front(decoration);
                    }
                }
                return Some(node);
            }
        })
    }

    fn walk(&self, start: Option<NodeKey>, method: TraversalMethod) -> Nodes<'_> {
        if method.is_index() {
            debug!("no index has been built for this graph, so falling back to a depth-first traversal");
        }

        Nodes {
            inner: NodesInner::Walk {
                graph: self,
                breadth_first: method.is_breadth_first(),
                frontier: start.into_iter().collect(),
                visited: HashSet::default(),
            },
        }
    }

    // NOTE: The substituents hanging off of a node, plus any substituents bonded to those substituents
    fn decorations(&self, node: NodeKey) -> Vec<NodeKey> {
        match self.nodes[node.0].kind {
            NodeKind::Residue(_) => self.substituents(node).map(|(_, n)| n).collect(),
            NodeKind::Terminal(_) => self
                .children(node)
                .map(|(_, n)| n)
                .filter(|&n| self.nodes[n.0].kind.is_terminal())
                .collect(),
        }
    }
}

impl Iterator for Nodes<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            NodesInner::Replay(index) => index.next().copied(),
            NodesInner::Walk {
                graph,
                breadth_first,
                frontier,
                visited,
            } => loop {
                let node = if *breadth_first {
                    frontier.pop_front()
                } else {
                    frontier.pop_back()
                }?;
                if !visited.insert(node) {
                    continue;
                }

                let mut neighbors: Vec<_> = graph.nodes[node.0]
                    .links
                    .iter()
                    .filter_map(|&(_, bond)| graph.bonds[bond.0].other_end(node))
                    .filter(|neighbor| !visited.contains(neighbor))
                    .collect();
                // NOTE: This sort is stable, so equally-connected neighbors keep the order their bonds are listed in
                neighbors.sort_by_key(|&n| graph.nodes[n.0].degree);
                frontier.extend(neighbors);

                return Some(node);
            },
        }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use crate::{Position, Registry, graph::loss_from_sigil};

    use super::*;

    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

    // 1 -4-> 2 -4-> 3, and 1 -6-> 4 -2-> 5, with an N-acetyl on 1
    fn branched() -> (MoleculeGraph, [NodeKey; 6]) {
        let mut graph = MoleculeGraph::new();
        let mut residue = |descriptor: &str| graph.create_residue(&REGISTRY, descriptor.parse().unwrap()).unwrap();
        let nodes = [
            residue("b-dglc-HEX-1:5"),
            residue("b-dglc-HEX-1:5"),
            residue("b-dman-HEX-1:5"),
            residue("a-dman-HEX-1:5"),
            residue("a-dman-HEX-1:5"),
        ];
        for (parent, child, position) in [(0, 1, 4), (1, 2, 4), (0, 3, 6), (3, 4, 2)] {
            link(&mut graph, nodes[parent], nodes[child], position);
        }
        let nac = graph
            .attach_substituent(&REGISTRY, nodes[0], Position::Known(2), "n-acetyl")
            .unwrap();
        let [a, b, c, d, e] = nodes;
        (graph, [a, b, c, d, e, nac])
    }

    fn link(graph: &mut MoleculeGraph, parent: NodeKey, child: NodeKey, position: u16) -> BondKey {
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

    #[test]
    fn depth_first() {
        let (graph, [a, b, c, d, e, _]) = branched();
        let order: Vec<_> = graph.iterate_nodes(TraversalMethod::DepthFirst).collect();
        // Both children of `a` have a degree of 2, so the last one listed is visited first
        assert_eq!(order, vec![a, d, e, b, c]);
    }

    #[test]
    fn breadth_first() {
        let (graph, [a, b, c, d, e, _]) = branched();
        let order: Vec<_> = graph.iterate_nodes(TraversalMethod::BreadthFirst).collect();
        assert_eq!(order, vec![a, b, d, c, e]);
    }

    #[test]
    fn substituents_follow_their_residue() {
        let (graph, [a, b, c, d, e, nac]) = branched();
        let order: Vec<_> = graph.iterate_all_nodes(TraversalMethod::DepthFirst).collect();
        assert_eq!(order, vec![a, nac, d, e, b, c]);
    }

    #[test]
    fn index_falls_back_to_depth_first() {
        let (graph, _) = branched();
        let index: Vec<_> = graph.iterate_nodes(TraversalMethod::Index).collect();
        let depth_first: Vec<_> = graph.iterate_nodes(TraversalMethod::DepthFirst).collect();
        assert_eq!(index, depth_first);
    }

    #[test]
    fn links_are_visited_once() {
        let (graph, _) = branched();
        let links: Vec<_> = graph.iterate_links(TraversalMethod::DepthFirst).collect();
        assert_eq!(links.len(), 5);
        let unique: HashSet<_> = links.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn cycles_terminate() {
        let (mut graph, [a, _, c, _, e, _]) = branched();
        link(&mut graph, c, a, 3);
        link(&mut graph, e, c, 3);

        for method in [TraversalMethod::DepthFirst, TraversalMethod::BreadthFirst] {
            let order: Vec<_> = graph.iterate_nodes(method).collect();
            let unique: HashSet<_> = order.iter().collect();
            assert_eq!(order.len(), 5);
            assert_eq!(unique.len(), 5);
        }
        assert_eq!(graph.iterate_links(TraversalMethod::DepthFirst).count(), 7);
    }

    #[test]
    fn walk_from_a_branch() {
        let (graph, [_, b, c, ..]) = branched();
        let order: Vec<_> = graph.iterate_nodes_from(c, TraversalMethod::DepthFirst).take(2).collect();
        assert_eq!(order, vec![c, b]);
    }
}
