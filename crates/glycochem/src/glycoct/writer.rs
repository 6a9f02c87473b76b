// Standard Library Imports
use std::collections::VecDeque;

// External Crate Imports
use ahash::{HashMap, HashSet};
use itertools::Itertools;

// Local Crate Imports
use crate::{BondKey, MoleculeGraph, NodeKey, NodeKind, Position, canonical::LinkSorter};

// Public API ==========================================================================================================

/// Writes `graph` as GlycoCT, ordering every node's bonds as [`canonicalize`](crate::canonical::canonicalize) would
///
/// The order that bonds are stored in is never consulted, so equal graphs are always written identically. Ambiguous
/// bonds with more than one candidate parent are split off into trailing `UND` sections. A graph without a root is
/// written as an empty string
#[must_use]
pub fn dumps(graph: &MoleculeGraph) -> String {
    let Some(root) = graph.root() else {
        return String::new();
    };

    // NOTE: Branch labels feed into the sibling ordering, so they have to be fresh
    let mut labeled = graph.clone();
    labeled.clear_labels();
    labeled.label_branches();

    let mut sorter = LinkSorter::new(&labeled);
    let mut writer = Writer::new(&mut sorter, true);
    writer.write_block(root);
    writer.write_undetermined();
    writer.text
}

/// Writes `node` and everything downstream of it, without splitting off any `UND` sections
pub(crate) fn write_subtree(sorter: &mut LinkSorter<'_>, node: NodeKey) -> String {
    let mut writer = Writer::new(sorter, false);
    writer.write_block(node);
    writer.text
}

// Writer ==============================================================================================================

struct Writer<'s, 'g> {
    sorter: &'s mut LinkSorter<'g>,
    graph: &'g MoleculeGraph,
    split_undetermined: bool,
    text: String,
    residues: HashMap<NodeKey, usize>,
    links: usize,
    undetermined: VecDeque<BondKey>,
    queued: HashSet<BondKey>,
}

impl<'s, 'g> Writer<'s, 'g> {
    fn new(sorter: &'s mut LinkSorter<'g>, split_undetermined: bool) -> Self {
        let graph = sorter.graph();
        Self {
            sorter,
            graph,
            split_undetermined,
            text: String::new(),
            residues: HashMap::default(),
            links: 0,
            undetermined: VecDeque::new(),
            queued: HashSet::default(),
        }
    }

    /// Writes a `RES` section for `start` and everything reachable from it, then the `LIN` section joining them
    fn write_block(&mut self, start: NodeKey) {
        self.text.push_str("RES\n");
        let mut queue = VecDeque::new();
        let mut in_order = Vec::new();
        if !self.residues.contains_key(&start) {
            self.write_node(start, &mut queue);
        }

        while let Some(bond) = queue.pop_front() {
            in_order.push(bond);
            let child = self.graph[bond].child();
            if !self.residues.contains_key(&child) {
                self.write_node(child, &mut queue);
            }
        }

        self.text.push_str("LIN\n");
        for bond in in_order {
            self.write_link(bond);
        }
    }

    // NOTE: The bonds leaving `node` are queued to be followed next, in canonical order
    fn write_node(&mut self, node: NodeKey, queue: &mut VecDeque<BondKey>) {
        let index = self.residues.len() + 1;
        self.residues.insert(node, index);
        let line = match self.graph[node].kind() {
            NodeKind::Residue(residue) => format!("{index}b:{residue}\n"),
            NodeKind::Terminal(terminal) => format!("{index}s:{}\n", terminal.name),
        };
        self.text.push_str(&line);

        let mut followed = Vec::new();
        for (_, bond) in self.sorter.sorted_links(node) {
            if self.split_undetermined && self.is_undetermined(bond) {
                if self.queued.insert(bond) {
                    self.undetermined.push_back(bond);
                }
            } else {
                followed.push(bond);
            }
        }
        for bond in followed.into_iter().rev() {
            queue.push_front(bond);
        }
    }

    fn write_link(&mut self, bond: BondKey) {
        self.links += 1;
        let link = &self.graph[bond];
        let (parent_loss, child_loss) = self.graph.loss_sigils(bond);
        let (parent_positions, child_positions) = positions(self.graph, bond);
        let line = format!(
            "{}:{}{parent_loss}({parent_positions}+{child_positions}){}{child_loss}\n",
            self.links,
            self.residues[&link.parent()],
            self.residues[&link.child()],
        );
        self.text.push_str(&line);
    }

    fn write_undetermined(&mut self) {
        let mut und = 0;
        while let Some(bond) = self.undetermined.pop_front() {
            und += 1;
            if und == 1 {
                self.text.push_str("UND\n");
            }

            let link = &self.graph[bond];
            // NOTE: Candidates that were never written can't be referred to, but the current parent always has been
            let parents = link
                .choices()
                .into_iter()
                .flat_map(|choices| &choices.parents)
                .filter_map(|parent| self.residues.get(parent))
                .join("|");
            let (parent_loss, child_loss) = self.graph.loss_sigils(bond);
            let (parent_positions, child_positions) = positions(self.graph, bond);
            let header = format!(
                "UND{und}:100.0:100.0\nParentIDs:{parents}\n\
                 SubtreeLinkageID1:{parent_loss}({parent_positions}+{child_positions}){child_loss}\n"
            );
            self.text.push_str(&header);
            let child = link.child();
            self.write_block(child);
        }
    }

    fn is_undetermined(&self, bond: BondKey) -> bool {
        self.graph[bond]
            .choices()
            .is_some_and(|choices| choices.parents.len() > 1)
    }
}

// NOTE: Ambiguous bonds list every position they could take, separated by `|`
fn positions(graph: &MoleculeGraph, bond: BondKey) -> (String, String) {
    let link = &graph[bond];
    let join = |positions: &[Position]| positions.iter().join("|");
    link.choices().map_or_else(
        || (link.parent_position().to_string(), link.child_position().to_string()),
        |choices| (join(&choices.parent_positions), join(&choices.child_positions)),
    )
}

// Module Tests ========================================================================================================
