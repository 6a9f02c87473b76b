//! Chemical derivatization, like permethylation, which caps every free hydroxyl (and amide N-H) with a substituent
//!
//! Added groups are marked as [`derivatized`](crate::Terminal::derivatized), so they can be told apart from the
//! substituents that were part of the structure and stripped off again later

// External Crate Imports
use tracing::{debug, warn};

// Local Crate Imports
use crate::{
    MoleculeGraph, NodeKey, NodeKind, Position, Registry, Result, TraversalMethod, graph::loss_from_sigil,
};

// Public API ==========================================================================================================

/// Caps every open site of `graph` with the substituent called `substituent`, returning how many were added
///
/// Any existing derivatization is stripped first. Each residue gets one group per open site, plus an extra one at
/// every acidic carbon (esterifying the acid). Substituents that carry an amide N-H, like `n-acetyl`, get one more
/// group at their nitrogen. Residues of an unknown size have no countable sites, so they're left alone
pub fn derivatize(graph: &mut MoleculeGraph, registry: &Registry, substituent: &str) -> Result<usize> {
    // NOTE: Look the group up before touching the graph, so an unknown name leaves it as it was
    registry.substituent(substituent)?;
    strip_derivatization(graph)?;

    let residues: Vec<_> = graph
        .iterate_nodes(TraversalMethod::DepthFirst)
        .filter(|&n| graph[n].residue().is_some())
        .collect();

    let mut added = 0;
    for residue in residues {
        let Some(description) = graph[residue].residue() else {
            continue;
        };
        if description.superclass.is_unknown() {
            warn!(id = graph[residue].id(), "skipping a residue of unknown size during derivatization");
            continue;
        }

        let acids: Vec<_> = description
            .modifications
            .iter()
            .filter_map(|&(position, modification)| modification.is_acidic().then_some(position))
            .collect();
        let (open_sites, unknowns) = graph[residue].open_attachment_sites(0);
        // NOTE: Each bond at an unknown position is already filling one of the open sites
        let sites: Vec<_> = open_sites.into_iter().skip(unknowns).chain(acids).collect();

        for position in sites {
            let group = graph.attach_substituent(registry, residue, position, substituent)?;
            mark_derivatized(graph, group);
            added += 1;
        }

        let amides: Vec<_> = graph
            .substituents(residue)
            .map(|(_, node)| node)
            .filter(|&node| is_nh_derivatizable(graph, registry, node))
            .collect();
        for amide in amides {
            let group = graph.create_substituent(registry, substituent)?;
            mark_derivatized(graph, group);
            graph.add_bond(
                amide,
                group,
                Position::Known(2),
                Position::Known(1),
                loss_from_sigil('n'),
                loss_from_sigil('n'),
            )?;
            added += 1;
        }
    }

    debug!(%substituent, added, "derivatized graph");
    Ok(added)
}

/// Detaches every group added by [`derivatize`], returning their atoms to the nodes they were bonded to
///
/// Returns the number of groups removed. The detached nodes stay in the arena, but are no longer reachable from the
/// root, so they're skipped by traversals and left out of any copy made with
/// [`clone_from_root`](MoleculeGraph::clone_from_root)
pub fn strip_derivatization(graph: &mut MoleculeGraph) -> Result<usize> {
    let bonds: Vec<_> = graph
        .bond_keys()
        .filter(|&b| graph.bonds[b.0].attached && is_derivatized(graph, graph.bonds[b.0].child))
        .collect();

    for &bond in &bonds {
        graph.break_link(bond, true)?;
    }

    if !bonds.is_empty() {
        debug!(removed = bonds.len(), "stripped derivatization");
    }
    Ok(bonds.len())
}

/// Checks if any group added by [`derivatize`] is still reachable from the root of `graph`
#[must_use]
pub fn is_derivatized_graph(graph: &MoleculeGraph) -> bool {
    graph
        .iterate_all_nodes(TraversalMethod::DepthFirst)
        .any(|n| is_derivatized(graph, n))
}

// Private Helpers =====================================================================================================

fn is_derivatized(graph: &MoleculeGraph, node: NodeKey) -> bool {
    graph[node].terminal().is_some_and(|t| t.derivatized)
}

fn is_nh_derivatizable(graph: &MoleculeGraph, registry: &Registry, node: NodeKey) -> bool {
    graph[node].terminal().is_some_and(|t| {
        !t.derivatized && registry.substituent(&t.name).is_ok_and(|s| s.nh_derivatizable)
    })
}

fn mark_derivatized(graph: &mut MoleculeGraph, node: NodeKey) {
    if let NodeKind::Terminal(terminal) = &mut graph.nodes[node.0].kind {
        terminal.derivatized = true;
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use crate::{Composition, MassKind, Massive, glycoct, testing_tools::assert_diagnostic_contains};

    use super::*;

    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

    fn load(text: &str) -> MoleculeGraph {
        glycoct::loads(&REGISTRY, text).unwrap().into_graph().unwrap()
    }

    fn formula(text: &str) -> Composition {
        Composition::from_formula(text).unwrap()
    }

    #[test]
    fn permethylated_glucose() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n");
        let before = graph.total_composition();
        assert_eq!(before, formula("C6H12O6"));
        let light = graph.mass(REGISTRY.atoms(), MassKind::Monoisotopic).unwrap();

        // Carbons 1, 2, 3, 4, and 6 are free, since 5 closes the ring
        assert_eq!(derivatize(&mut graph, &REGISTRY, "methyl").unwrap(), 5);
        assert_eq!(graph.total_composition(), formula("C11H22O6"));
        assert_eq!(graph.order(), 6);
        assert!(is_derivatized_graph(&graph));

        let heavy = graph.mass(REGISTRY.atoms(), MassKind::Monoisotopic).unwrap();
        let methylene = formula("CH2").mass(REGISTRY.atoms(), MassKind::Monoisotopic).unwrap();
        assert_eq!(heavy - light, methylene * rust_decimal::Decimal::from(5));

        let root = graph.get_node(1).unwrap();
        let (open_sites, _) = graph[root].open_attachment_sites(0);
        assert!(open_sites.is_empty());
    }

    #[test]
    fn stripping_restores_the_original() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n2b:b-dgal-HEX-1:5\nLIN\n1:1o(4+1)2d\n");
        let original = graph.clone();

        assert_eq!(derivatize(&mut graph, &REGISTRY, "methyl").unwrap(), 7);
        assert_eq!(graph.total_composition() - original.total_composition(), formula("C7H14"));

        assert_eq!(strip_derivatization(&mut graph).unwrap(), 7);
        assert!(!is_derivatized_graph(&graph));
        assert_eq!(graph.total_composition(), original.total_composition());
        assert_eq!(graph.order(), original.order());
        assert_eq!(glycoct::dumps(&graph), glycoct::dumps(&original));

        assert_eq!(strip_derivatization(&mut graph).unwrap(), 0);
    }

    #[test]
    fn rederivatizing_replaces_the_old_groups() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n");
        derivatize(&mut graph, &REGISTRY, "methyl").unwrap();
        assert_eq!(derivatize(&mut graph, &REGISTRY, "ethyl").unwrap(), 5);
        assert_eq!(graph.total_composition(), formula("C16H32O6"));
        assert_eq!(graph.order(), 6);
    }

    #[test]
    fn amides_are_capped_at_their_nitrogen() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n2s:n-acetyl\nLIN\n1:1d(2+1)2n\n");
        let before = graph.total_composition();

        // Carbons 1, 3, 4, and 6, plus the amide nitrogen
        assert_eq!(derivatize(&mut graph, &REGISTRY, "methyl").unwrap(), 5);
        assert_eq!(graph.total_composition() - before, formula("C5H10"));

        let n_acetyl = graph.get_node(2).unwrap();
        let capped: Vec<_> = graph.children(n_acetyl).collect();
        assert_eq!(capped.len(), 1);
        let (position, methyl) = capped[0];
        assert_eq!(position, Position::Known(2));
        assert!(graph[methyl].terminal().unwrap().derivatized);
        assert!(!graph[n_acetyl].terminal().unwrap().derivatized);

        strip_derivatization(&mut graph).unwrap();
        assert_eq!(graph.total_composition(), before);
        assert_eq!(graph.children(n_acetyl).count(), 0);
    }

    #[test]
    fn substituents_without_amides_are_left_alone() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n2s:sulfate\nLIN\n1:1o(6+1)2n\n");
        assert_eq!(derivatize(&mut graph, &REGISTRY, "methyl").unwrap(), 4);

        let sulfate = graph.get_node(2).unwrap();
        assert_eq!(graph.children(sulfate).count(), 0);
    }

    #[test]
    fn acids_are_esterified() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5|6:a\n");
        let before = graph.total_composition();

        // Carbons 1, 2, 3, and 4, plus the carboxyl at 6
        assert_eq!(derivatize(&mut graph, &REGISTRY, "methyl").unwrap(), 5);
        assert_eq!(graph.total_composition() - before, formula("C5H10"));

        let root = graph.get_node(1).unwrap();
        let at_six = graph
            .substituents(root)
            .filter(|&(p, _)| p == Position::Known(6))
            .count();
        assert_eq!(at_six, 1);
    }

    #[test]
    fn unknown_positions_fill_open_sites() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n2b:b-dgal-HEX-1:5\nLIN\n1:1o(-1+1)2d\n");
        let glc = graph.get_node(1).unwrap();
        let before = graph.substituents(glc).count();

        derivatize(&mut graph, &REGISTRY, "methyl").unwrap();
        // One of the five free carbons of the glucose is taken by the galactose, wherever it is
        assert_eq!(graph.substituents(glc).count() - before, 4);
        assert!(graph.substituents(glc).all(|(p, _)| p.is_unknown()));
    }

    #[test]
    fn unknown_superclasses_are_skipped() {
        let mut graph = load("RES\n1b:x-X-x:x\n2b:b-dglc-HEX-1:5\nLIN\n1:1o(4+1)2d\n");
        // Only the glucose has countable sites: 2, 3, 4, and 6
        assert_eq!(derivatize(&mut graph, &REGISTRY, "methyl").unwrap(), 4);
        let unknown = graph.get_node(1).unwrap();
        assert_eq!(graph.substituents(unknown).count(), 0);
        assert_eq!(graph.order(), 6);
    }

    #[test]
    fn unknown_groups_leave_the_graph_untouched() {
        let mut graph = load("RES\n1b:b-dglc-HEX-1:5\n");
        derivatize(&mut graph, &REGISTRY, "methyl").unwrap();
        let derivatized = glycoct::dumps(&graph);

        assert_diagnostic_contains!(
            derivatize(&mut graph, &REGISTRY, "trimethylsilyl"),
            r#"the substituent "trimethylsilyl" could not be found"#
        );
        assert_eq!(glycoct::dumps(&graph), derivatized);
        assert!(is_derivatized_graph(&graph));
    }
}
