// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use tracing::{debug, warn};

// Local Crate Imports
use crate::{BranchLabel, MoleculeGraph, NodeKey, TraversalMethod};

const MAIN_BRANCH: char = '-';

// Public API ==========================================================================================================

impl MoleculeGraph {
    /// Renumbers nodes and bonds, from 1, in the order that `method` visits them, then re-labels every branch
    ///
    /// Substituents are numbered immediately after the residue they're attached to
    pub fn reindex(&mut self, method: TraversalMethod) {
        // NOTE: Replaying the old index would just reproduce it, so a real traversal is always used
        let method = if method.is_index() {
            TraversalMethod::DepthFirst
        } else {
            method
        };
        self.node_index = None;
        self.bond_index = None;

        let nodes: Vec<_> = self.iterate_all_nodes(method).collect();
        let bonds: Vec<_> = self.iterate_links(method).collect();
        for (id, node) in (1..).zip(&nodes) {
            self.nodes[node.0].id = id;
        }
        for (id, bond) in (1..).zip(&bonds) {
            self.bonds[bond.0].id = id;
        }
        debug!(nodes = nodes.len(), bonds = bonds.len(), "reindexed graph");

        self.node_index = Some(nodes);
        self.bond_index = Some(bonds);
        self.label_branches();
    }

    /// Mangles every id into a negative number that can't collide with another graph's ids, and drops the index
    pub fn deindex(&mut self) {
        let base = random_base();
        for node in &mut self.nodes {
            node.id = -node.id.saturating_add(base);
        }
        for bond in &mut self.bonds {
            bond.id = -bond.id.saturating_add(base);
        }
        self.node_index = None;
        self.bond_index = None;
    }

    /// The node order recorded by the last [`reindex`](Self::reindex), if it's still standing
    #[must_use]
    pub fn node_index(&self) -> Option<&[NodeKey]> {
        self.node_index.as_deref()
    }

    /// Gives every backbone bond a label naming its branch and how far along that branch it is
    ///
    /// The main chain is `-`, and each time the backbone forks, its new branches are lettered from `a` onwards. A
    /// branch's length is the length of the longest chain beneath it
    pub fn label_branches(&mut self) {
        let mut lengths: BTreeMap<char, usize> = BTreeMap::new();
        let mut parents = BTreeMap::new();
        let mut last_branch = MAIN_BRANCH;

        let order: Vec<_> = self.iterate_nodes(TraversalMethod::Index).collect();
        for node in order {
            let outgoing: Vec<_> = self.nodes[node.0]
                .links
                .iter()
                .map(|&(_, b)| b)
                .filter(|&b| self.bonds[b.0].parent == node)
                .collect();
            let parent_branch = self.parent_branch(node);

            if let [bond] = outgoing[..] {
                let depth = lengths.entry(parent_branch).or_default();
                *depth += 1;
                self.bonds[bond.0].label = Some(BranchLabel {
                    branch: parent_branch,
                    depth: *depth,
                });
                continue;
            }

            let count = lengths.get(&parent_branch).copied().unwrap_or_default();
            for bond in outgoing {
                last_branch = next_branch(last_branch);
                parents.insert(last_branch, parent_branch);
                lengths.insert(last_branch, count + 1);
                self.bonds[bond.0].label = Some(BranchLabel {
                    branch: last_branch,
                    depth: count + 1,
                });
            }
        }

        let mut longest = 0;
        for (&branch, &parent) in parents.iter().rev() {
            let length = lengths.get(&branch).copied().unwrap_or_default();
            longest = longest.max(length);
            let parent_length = lengths.entry(parent).or_default();
            *parent_length = (*parent_length).max(length);
        }
        let main = lengths.entry(MAIN_BRANCH).or_default();
        *main = (*main).max(longest);

        self.branch_lengths = lengths;
        self.branch_parents = parents;
    }

    /// Removes every bond's branch label, along with the recorded branch lengths
    pub fn clear_labels(&mut self) {
        for bond in &mut self.bonds {
            bond.label = None;
        }
        self.branch_lengths.clear();
        self.branch_parents.clear();
    }

    /// The number of branches in the backbone, counting the fork that creates two of them as two
    #[must_use]
    pub fn count_branches(&self) -> usize {
        self.iterate_nodes(TraversalMethod::default())
            .filter(|n| self.nodes[n.0].links.len() > 2)
            .fold(0, |count, _| if count == 0 { 2 } else { count + 1 })
    }

    #[must_use]
    pub const fn branch_lengths(&self) -> &BTreeMap<char, usize> {
        &self.branch_lengths
    }

    #[must_use]
    pub const fn branch_parents(&self) -> &BTreeMap<char, char> {
        &self.branch_parents
    }

    fn parent_branch(&self, node: NodeKey) -> char {
        self.nodes[node.0]
            .links
            .iter()
            .find(|&&(_, b)| self.bonds[b.0].child == node)
            .and_then(|&(_, b)| self.bonds[b.0].label)
            .map_or(MAIN_BRANCH, |label| label.branch)
    }
}

fn next_branch(branch: char) -> char {
    if branch == MAIN_BRANCH {
        'a'
    } else {
        char::from_u32(u32::from(branch) + 1).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

fn random_base() -> i64 {
    let mut bytes = [0; 4];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => i64::from(u32::from_le_bytes(bytes)) + 1,
        Err(error) => {
            warn!(%error, "couldn't generate a random id offset, so a fixed one will be used instead");
            1 << 32
        }
    }
}

// Module Tests ========================================================================================================
