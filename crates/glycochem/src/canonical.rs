//! A deterministic ordering of every node's bonds, so that equivalent graphs compare and serialize identically

// Standard Library Imports
use std::{cmp::Ordering, collections::VecDeque};

// External Crate Imports
use ahash::{HashMap, HashSet};
use tracing::debug;

// Local Crate Imports
use crate::{BondKey, MoleculeGraph, NodeKey, Position, TraversalMethod, glycoct::writer};

// Public API ==========================================================================================================

/// Re-orders the bonds of every node in `graph` into canonical order, then re-labels its branches
///
/// Starting from the leaves and working towards the root, each node's outgoing bonds are sorted by their attachment
/// positions, their loss sigils, and finally by the shape of the subtrees they lead to. Bonds into a node keep their
/// place ahead of the bonds leading out of it
pub fn canonicalize(graph: &mut MoleculeGraph) {
    graph.label_branches();

    let orders = {
        let mut sorter = LinkSorter::new(graph);
        let mut processed = HashSet::default();
        let mut orders = Vec::new();

        let all_nodes: Vec<_> = graph.iterate_all_nodes(TraversalMethod::DepthFirst).collect();
        let mut queue: VecDeque<_> = all_nodes
            .iter()
            .copied()
            .filter(|&n| graph.outgoing(n).next().is_none())
            .collect();
        // NOTE: Nodes caught in a cycle may never be reached by walking up from the leaves, so they're queued last
        queue.extend(&all_nodes);

        while let Some(node) = queue.pop_front() {
            if !processed.insert(node) {
                continue;
            }
            orders.push((node, sorter.sorted_links(node)));
            for (_, parent) in graph.parents(node) {
                queue.push_front(parent);
            }
        }
        debug!(nodes = orders.len(), "canonicalized bond order");
        orders
    };

    for (node, sorted) in orders {
        let (substituent_links, outgoing): (Vec<_>, Vec<_>) = sorted
            .into_iter()
            .partition(|link| graph.nodes[node.0].substituent_links.contains(link));
        let node_mut = &mut graph.nodes[node.0];
        node_mut.links.retain(|link| !outgoing.contains(link));
        node_mut.links.extend(outgoing);
        node_mut.substituent_links = substituent_links;
    }

    graph.clear_labels();
    graph.label_branches();
}

// Comparators =========================================================================================================

/// Orders sibling bonds, caching whatever it works out about each subtree along the way
///
/// Nothing here depends on the order that bonds are currently stored in, so a single sorter stays valid for as long
/// as the graph it borrows is left untouched
pub(crate) struct LinkSorter<'g> {
    graph: &'g MoleculeGraph,
    terminal_counts: HashMap<char, usize>,
    descendants: HashMap<NodeKey, usize>,
    depths: HashMap<NodeKey, usize>,
    texts: HashMap<NodeKey, String>,
    in_progress: HashSet<NodeKey>,
}

impl<'g> LinkSorter<'g> {
    pub(crate) fn new(graph: &'g MoleculeGraph) -> Self {
        // NOTE: Later branches are always nested in earlier ones, so walking backwards visits children first
        let mut terminal_counts: HashMap<char, usize> = HashMap::default();
        for (&branch, &parent) in graph.branch_parents.iter().rev() {
            let below = terminal_counts.get(&branch).copied().unwrap_or_default();
            *terminal_counts.entry(parent).or_default() += below + 1;
        }

        Self {
            graph,
            terminal_counts,
            descendants: HashMap::default(),
            depths: HashMap::default(),
            texts: HashMap::default(),
            in_progress: HashSet::default(),
        }
    }

    pub(crate) const fn graph(&self) -> &'g MoleculeGraph {
        self.graph
    }

    /// The bonds leading out of `node`, substituents included, in canonical order
    pub(crate) fn sorted_links(&mut self, node: NodeKey) -> Vec<(Position, BondKey)> {
        let mut links: Vec<_> = self.graph.outgoing(node).collect();
        links.sort_by(|&(_, a), &(_, b)| self.compare_links(a, b));
        links
    }

    fn compare_links(&mut self, a: BondKey, b: BondKey) -> Ordering {
        let graph = self.graph;
        let (bond_a, bond_b) = (&graph[a], &graph[b]);
        bond_a
            .parent_position
            .cmp(&bond_b.parent_position)
            .then(bond_a.child_position.cmp(&bond_b.child_position))
            .then_with(|| graph.loss_sigils(a).cmp(&graph.loss_sigils(b)))
            .then_with(|| self.compare_subtrees(bond_a.child, bond_b.child))
    }

    fn compare_subtrees(&mut self, a: NodeKey, b: NodeKey) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let longest_branch = |sorter: &mut Self, node| {
            let children: Vec<_> = sorter.graph.children(node).map(|(_, c)| c).collect();
            children.into_iter().map(|c| sorter.depth(c)).max().unwrap_or_default()
        };

        self.descendants(a)
            .cmp(&self.descendants(b))
            .then_with(|| longest_branch(self, a).cmp(&longest_branch(self, b)))
            .then_with(|| self.terminal_count(a).cmp(&self.terminal_count(b)))
            .then_with(|| {
                let text_a = self.subtree_text(a);
                let text_b = self.subtree_text(b);
                text_b.cmp(&text_a)
            })
    }

    // NOTE: Counts `node` itself, along with everything reachable through its outgoing bonds
    fn descendants(&mut self, node: NodeKey) -> usize {
        if let Some(&count) = self.descendants.get(&node) {
            return count;
        }

        let mut seen = HashSet::default();
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.graph.outgoing(next).map(|(_, b)| self.graph[b].child));
            }
        }
        self.descendants.insert(node, seen.len());
        seen.len()
    }

    fn depth(&mut self, node: NodeKey) -> usize {
        if let Some(&depth) = self.depths.get(&node) {
            return depth;
        }
        let depth = depth_below(self.graph, node, &mut HashSet::default());
        self.depths.insert(node, depth);
        depth
    }

    // NOTE: The most branches found below any one of the branches leaving `node`
    fn terminal_count(&self, node: NodeKey) -> usize {
        self.graph
            .outgoing(node)
            .filter_map(|(_, b)| self.graph[b].label)
            .map(|label| self.terminal_counts.get(&label.branch).copied().unwrap_or_default())
            .max()
            .unwrap_or_default()
    }

    // NOTE: A node whose text is still being written (because of a cycle) reads as empty
    fn subtree_text(&mut self, node: NodeKey) -> String {
        if let Some(text) = self.texts.get(&node) {
            return text.clone();
        }
        if !self.in_progress.insert(node) {
            return String::new();
        }
        let text = writer::write_subtree(self, node);
        self.in_progress.remove(&node);
        self.texts.insert(node, text.clone());
        text
    }
}

fn depth_below(graph: &MoleculeGraph, node: NodeKey, visited: &mut HashSet<NodeKey>) -> usize {
    if !visited.insert(node) {
        return 0;
    }
    let children: Vec<_> = graph.outgoing(node).map(|(_, b)| graph[b].child).collect();
    1 + children
        .into_iter()
        .map(|child| depth_below(graph, child, visited))
        .max()
        .unwrap_or_default()
}

// Module Tests ========================================================================================================
