//! Turns the sections of a read structure into a graph, unrolling repeats and attaching undetermined subtrees

// External Crate Imports
use ahash::{HashMap, HashMapExt, HashSet};
use tracing::{debug, warn};

// Local Crate Imports
use crate::{
    BondChoices, BondKey, MoleculeGraph, NodeKey, Registry, Result, TraversalMethod,
    errors::StructuralError,
    graph::loss_from_sigil,
    parsers::glycoct::{Linkage, RepeatHeader, ResLine},
};

use super::{
    ReaderOptions, ResidueBag, Structure,
    reader::{Block, Document, RepeatSection},
};

// Public API ==========================================================================================================

pub(crate) fn expand(registry: &Registry, options: &ReaderOptions, document: &Document) -> Result<Structure> {
    let mut expander = Expander {
        registry,
        options,
        document,
        graph: MoleculeGraph::new(),
        created: 0,
        active: Vec::new(),
    };

    let mut known = expander.instantiate(&document.main)?;
    for und in &document.undetermined {
        let (_, first) = und.body.residues.first().ok_or(StructuralError::EmptySubtree { und: und.und })?;
        let linkage = und.linkage.as_ref().ok_or(StructuralError::EmptyChoices)?;
        let parents = und
            .parents
            .iter()
            .map(|&index| lookup(&known, index, und.line).map(Endpoint::outgoing))
            .collect::<Result<Vec<_>>>()?;

        let subtree = expander.instantiate(&und.body)?;
        let child = lookup(&subtree, res_index(first), und.line)?.incoming();
        debug!(und = und.und, parents = parents.len(), "attaching undetermined subtree");
        let choices = BondChoices {
            parents,
            children: vec![child],
            parent_positions: linkage.parent_positions.clone(),
            child_positions: linkage.child_positions.clone(),
        };
        expander.graph.add_ambiguous_bond(
            choices,
            loss_from_sigil(linkage.parent_loss),
            loss_from_sigil(linkage.child_loss),
        )?;
        known.extend(subtree);
    }

    expander.finish()
}

// Expansion ===========================================================================================================

/// Where bonds to a `RES` index actually attach
///
/// For a repeat, incoming bonds attach to the first copy of the repeat unit and outgoing bonds leave from the last
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Endpoint {
    Node(NodeKey),
    Repeat { origin: NodeKey, terminal: NodeKey },
}

impl Endpoint {
    const fn incoming(self) -> NodeKey {
        match self {
            Self::Node(node) | Self::Repeat { origin: node, .. } => node,
        }
    }

    const fn outgoing(self) -> NodeKey {
        match self {
            Self::Node(node) | Self::Repeat { terminal: node, .. } => node,
        }
    }
}

type Endpoints = HashMap<u32, Endpoint>;

struct Expander<'a> {
    registry: &'a Registry,
    options: &'a ReaderOptions,
    document: &'a Document,
    graph: MoleculeGraph,
    created: usize,
    // NOTE: The repeats currently being expanded, outermost first
    active: Vec<u32>,
}

impl<'a> Expander<'a> {
    /// Creates one fresh copy of every node in `block`, then bonds them together
    fn instantiate(&mut self, block: &Block) -> Result<Endpoints> {
        let mut endpoints = HashMap::with_capacity(block.residues.len());
        for (_, residue) in &block.residues {
            let endpoint = match residue {
                ResLine::Residue(_, residue) => {
                    self.count_node()?;
                    Endpoint::Node(self.graph.create_residue(self.registry, residue.clone())?)
                }
                ResLine::Substituent(_, name) => {
                    self.count_node()?;
                    Endpoint::Node(self.graph.create_substituent(self.registry, name)?)
                }
                &ResLine::Repeat(_, repeat) => self.expand_repeat(repeat)?,
            };
            endpoints.insert(res_index(residue), endpoint);
        }

        for &(line, ref linkage) in &block.links {
            let parent = lookup(&endpoints, linkage.parent, line)?;
            let child = lookup(&endpoints, linkage.child, line)?;
            // NOTE: A bond into a repeat often doesn't say what the repeat lost, but it's always a hydroxyl
            let into_repeat = matches!(child, Endpoint::Repeat { .. }) && linkage.parent_loss == 'o';
            let child_loss = if into_repeat { 'd' } else { linkage.child_loss };
            self.bond(parent.outgoing(), child.incoming(), linkage, child_loss)?;
        }
        Ok(endpoints)
    }

    fn expand_repeat(&mut self, repeat: u32) -> Result<Endpoint> {
        let section = self.repeat_section(repeat)?;
        if self.active.contains(&repeat) {
            return Err(StructuralError::RecursiveRepeat { repeat }.into());
        }
        if self.active.len() >= self.options.max_depth {
            let limit = self.options.max_depth;
            return Err(StructuralError::NestingLimit { limit }.into());
        }
        let count = self.repeat_count(section)?;

        debug!(repeat, count, depth = self.active.len(), "expanding repeat");
        self.active.push(repeat);
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(self.instantiate(&section.body)?);
        }
        self.active.pop();

        let internal = &section.header.internal;
        let origin = |unit: &Endpoints| lookup(unit, internal.child, section.line).map(Endpoint::incoming);
        let terminal = |unit: &Endpoints| lookup(unit, internal.parent, section.line).map(Endpoint::outgoing);
        for pair in units.windows(2) {
            self.bond(terminal(&pair[0])?, origin(&pair[1])?, internal, internal.child_loss)?;
        }

        match (units.first(), units.last()) {
            (Some(first), Some(last)) => Ok(Endpoint::Repeat {
                origin: origin(first)?,
                terminal: terminal(last)?,
            }),
            // NOTE: `repeat_count` never returns zero
            _ => Err(StructuralError::UndefinedRepeat { repeat }.into()),
        }
    }

    fn repeat_section(&self, repeat: u32) -> Result<&'a RepeatSection> {
        let document = self.document;
        document
            .repeats
            .iter()
            .find(|section| section.header.repeat == repeat)
            .ok_or_else(|| StructuralError::UndefinedRepeat { repeat }.into())
    }

    // NOTE: Bounds of -1 are unknown, so aren't enforced. A requested count is clamped to the declared bounds, and a
    // repeat always expands to at least one unit
    fn repeat_count(&self, section: &RepeatSection) -> Result<usize> {
        let RepeatHeader {
            repeat, lower, upper, ..
        } = section.header;
        if lower >= 0 && upper >= 0 && lower > upper {
            return Err(StructuralError::InvertedBounds { repeat, lower, upper }.into());
        }

        let min = usize::try_from(lower).unwrap_or(1).max(1);
        let max = usize::try_from(upper).map_or(usize::MAX, |upper| upper.max(min));
        let requested = self.options.repeat_count.unwrap_or(min);
        let count = requested.clamp(min, max);
        if count != requested {
            debug!(repeat, requested, count, "clamped the repeat count to its declared bounds");
        }

        if count > self.options.max_repeat {
            let limit = self.options.max_repeat;
            return Err(StructuralError::RepeatLimit { repeat, count, limit }.into());
        }
        Ok(count)
    }

    fn bond(&mut self, parent: NodeKey, child: NodeKey, linkage: &Linkage, child_loss: char) -> Result<BondKey> {
        let parent_loss = loss_from_sigil(linkage.parent_loss);
        let child_loss = loss_from_sigil(child_loss);
        match (linkage.parent_positions.as_slice(), linkage.child_positions.as_slice()) {
            (&[parent_position], &[child_position]) => {
                self.graph
                    .add_bond(parent, child, parent_position, child_position, parent_loss, child_loss)
            }
            (parent_positions, child_positions) => {
                let choices = BondChoices {
                    parents: vec![parent],
                    children: vec![child],
                    parent_positions: parent_positions.to_vec(),
                    child_positions: child_positions.to_vec(),
                };
                self.graph.add_ambiguous_bond(choices, parent_loss, child_loss)
            }
        }
    }

    fn count_node(&mut self) -> Result<()> {
        if self.created >= self.options.max_residues {
            let limit = self.options.max_residues;
            return Err(StructuralError::ResidueLimit { limit }.into());
        }
        self.created += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<Structure> {
        let children: HashSet<_> = self
            .graph
            .bond_keys()
            .filter(|&b| self.graph[b].attached)
            .map(|b| self.graph[b].child())
            .collect();
        let roots: Vec<_> = self.graph.node_keys().filter(|n| !children.contains(n)).collect();

        match roots.as_slice() {
            [] if self.graph.root().is_none() => Err(StructuralError::EmptyStructure.into()),
            // NOTE: Every node has a parent, so the structure is one big cycle and keeps its first node as the root
            [] => Ok(self.into_graph()),
            &[root] => {
                self.graph.set_root(root)?;
                Ok(self.into_graph())
            }
            _ if self.options.allow_composition => {
                warn!(
                    components = roots.len(),
                    "the structure is disconnected, so it's being read as a bag of residues instead"
                );
                Ok(Structure::Bag(ResidueBag::from_graph(&self.graph)))
            }
            _ => Err(StructuralError::Disconnected {
                components: roots.len(),
            }
            .into()),
        }
    }

    fn into_graph(mut self) -> Structure {
        self.graph.reindex(TraversalMethod::DepthFirst);
        Structure::Graph(self.graph)
    }
}

fn lookup(endpoints: &Endpoints, index: u32, line: usize) -> Result<Endpoint> {
    endpoints
        .get(&index)
        .copied()
        .ok_or_else(|| StructuralError::UndefinedIndex { index, line }.into())
}

const fn res_index(line: &ResLine) -> u32 {
    match *line {
        ResLine::Residue(index, _) | ResLine::Substituent(index, _) | ResLine::Repeat(index, _) => index,
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use once_cell::sync::Lazy;

    use crate::glycoct::reader;

    use super::*;

    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

    fn expand_text(text: &str, options: &ReaderOptions) -> Result<Structure> {
        let documents = reader::read(&REGISTRY, text)?;
        expand(&REGISTRY, options, &documents[0])
    }

    const REPEAT: &str = indoc! {"
        RES
        1b:b-dglc-HEX-1:5
        2r:r1
        3b:a-lgal-HEX-1:5|6:d
        LIN
        1:1o(4+1)2n
        2:2o(3+1)3d
        REP
        REP1:5o(4+1)4d=-1--1
        RES
        4b:b-dgal-HEX-1:5
        5b:b-dglc-HEX-1:5
        LIN
        3:4o(3+1)5d
    "};

    #[test]
    fn repeats_connect_through_their_ends() {
        let options = ReaderOptions {
            repeat_count: Some(2),
            ..ReaderOptions::default()
        };
        let Structure::Graph(graph) = expand_text(REPEAT, &options).unwrap() else {
            panic!("expected a graph");
        };
        assert_eq!(graph.order(), 6);

        let glc = graph.root().unwrap();
        let (_, first_gal) = graph.children(glc).next().unwrap();
        assert!(graph[first_gal].residue().unwrap().to_string().contains("dgal"));
        // The bond into the repeat had an `n` sigil, but the residue it's attached to still loses a hydroxyl
        assert_eq!(graph[first_gal].composition().to_string(), "C6H10O5");

        // The fucose hangs off of the last copy of the repeat unit
        let fuc = graph.leaves().into_iter().find(|&n| graph[n].residue().unwrap().modifications.len() == 1);
        let (_, last_glc) = graph.parents(fuc.unwrap()).next().unwrap();
        assert_eq!(graph.parents(last_glc).count(), 1);
        let (_, second_gal) = graph.parents(last_glc).next().unwrap();
        assert_ne!(second_gal, first_gal);
    }

    #[test]
    fn unknown_bounds_default_to_one_copy() {
        let structure = expand_text(REPEAT, &ReaderOptions::default()).unwrap();
        assert_eq!(structure.graph().map(MoleculeGraph::order), Some(4));
    }

    #[test]
    fn inverted_bounds() {
        let text = REPEAT.replace("-1--1", "3-2");
        let error = expand_text(&text, &ReaderOptions::default()).unwrap_err();
        assert_eq!(error.to_string(), "repeat 1 declares a lower bound of 3 above its upper bound of 2");
    }

    #[test]
    fn undetermined_subtrees_need_a_body() {
        let text = indoc! {"
            RES
            1b:b-dglc-HEX-1:5
            UND
            UND1:100.0:100.0
            ParentIDs:1
            SubtreeLinkageID1:o(-1+1)d
        "};
        let error = expand_text(text, &ReaderOptions::default()).unwrap_err();
        assert_eq!(error.to_string(), "undetermined subtree 1 contains no residues");

        let text = text.replace("ParentIDs:1", "ParentIDs:7") + "RES\n2b:b-dgal-HEX-1:5\n";
        let error = expand_text(&text, &ReaderOptions::default()).unwrap_err();
        assert_eq!(error.to_string(), "residue index 7 on line 4 was never defined");
    }

    #[test]
    fn substituent_chains_keep_their_root() {
        let text = indoc! {"
            RES
            1b:b-dglc-HEX-1:5
            2s:phosphate
            3s:methyl
            LIN
            1:1o(6+1)2n
            2:2o(1+1)3n
        "};
        let Structure::Graph(graph) = expand_text(text, &ReaderOptions::default()).unwrap() else {
            panic!("expected a graph");
        };
        assert_eq!(graph.order(), 3);
        assert!(graph[graph.root().unwrap()].kind().is_residue());
    }
}
