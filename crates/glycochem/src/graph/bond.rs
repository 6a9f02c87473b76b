// Local Crate Imports
use crate::{
    Bond, BondChoices, BondKey, BranchLabel, Composition, GlycoError, MoleculeGraph, NodeKey, Position, Result,
};

// Public API ==========================================================================================================

impl Bond {
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub const fn parent(&self) -> NodeKey {
        self.parent
    }

    #[must_use]
    pub const fn child(&self) -> NodeKey {
        self.child
    }

    #[must_use]
    pub const fn parent_position(&self) -> Position {
        self.parent_position
    }

    #[must_use]
    pub const fn child_position(&self) -> Position {
        self.child_position
    }

    #[must_use]
    pub const fn parent_loss(&self) -> &Composition {
        &self.parent_loss
    }

    #[must_use]
    pub const fn child_loss(&self) -> &Composition {
        &self.child_loss
    }

    #[must_use]
    pub const fn label(&self) -> Option<BranchLabel> {
        self.label
    }

    #[must_use]
    pub fn choices(&self) -> Option<&BondChoices> {
        self.choices.as_deref()
    }

    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        self.choices.is_some()
    }

    /// Returns the endpoint that isn't `node`, or `None` if `node` isn't an endpoint at all
    #[must_use]
    pub fn other_end(&self, node: NodeKey) -> Option<NodeKey> {
        if node == self.parent {
            Some(self.child)
        } else if node == self.child {
            Some(self.parent)
        } else {
            None
        }
    }
}

impl BranchLabel {
    #[must_use]
    pub const fn branch(self) -> char {
        self.branch
    }

    #[must_use]
    pub const fn depth(self) -> usize {
        self.depth
    }
}

impl std::fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.branch, self.depth)
    }
}

impl MoleculeGraph {
    /// Removes `parent_loss` and `child_loss` from the bond's endpoints and records the bond on both of them
    ///
    /// No occupancy checks are made here: callers should consult [`MoleculeNode::open_attachment_sites`] first
    ///
    /// [`MoleculeNode::open_attachment_sites`]: crate::MoleculeNode::open_attachment_sites
    pub fn apply(&mut self, bond: BondKey) -> Result<()> {
        let Bond {
            id,
            parent,
            child,
            parent_position,
            child_position,
            attached,
            ..
        } = *self.checked_bond(bond)?;
        if attached {
            return Err(GlycoError::bond_state(id, true).into());
        }

        let substituent_link = self.nodes[parent.0].kind.is_residue() && self.nodes[child.0].kind.is_terminal();
        let Bond {
            parent_loss,
            child_loss,
            ..
        } = &self.bonds[bond.0];

        let parent_node = &mut self.nodes[parent.0];
        parent_node.composition -= parent_loss;
        if substituent_link {
            parent_node.substituent_links.push((parent_position, bond));
        } else {
            parent_node.links.push((parent_position, bond));
        }
        parent_node.degree += 1;

        let child_node = &mut self.nodes[child.0];
        child_node.composition -= child_loss;
        child_node.links.push((child_position, bond));
        child_node.degree += 1;

        self.bonds[bond.0].attached = true;
        Ok(())
    }

    /// Detaches a bond from both of its endpoints, restoring the atoms it removed if `refund` is set
    pub fn break_link(&mut self, bond: BondKey, refund: bool) -> Result<()> {
        let Bond {
            id,
            parent,
            child,
            attached,
            ..
        } = *self.checked_bond(bond)?;
        if !attached {
            return Err(GlycoError::bond_state(id, false).into());
        }

        let Bond {
            parent_loss,
            child_loss,
            ..
        } = &self.bonds[bond.0];
        for (node, loss) in [(parent, parent_loss), (child, child_loss)] {
            let node = &mut self.nodes[node.0];
            node.links.retain(|&(_, b)| b != bond);
            node.substituent_links.retain(|&(_, b)| b != bond);
            node.degree -= 1;
            if refund {
                node.composition += loss;
            }
        }

        self.bonds[bond.0].attached = false;
        Ok(())
    }

    /// With `deep` unset, this just reports the bond's own flag. Otherwise, both endpoints are checked to make sure
    /// they still list this bond at the expected position
    pub fn is_attached(&self, bond: BondKey, deep: bool) -> Result<bool> {
        let bond_ref = self.checked_bond(bond)?;
        if !deep {
            return Ok(bond_ref.attached);
        }

        let lists = |node: NodeKey, position: Position| {
            self.nodes[node.0]
                .all_links()
                .any(|&(p, b)| b == bond && p == position)
        };
        Ok(lists(bond_ref.parent, bond_ref.parent_position) && lists(bond_ref.child, bond_ref.child_position))
    }

    /// The one-letter GlycoCT codes describing what each end of a bond lost
    ///
    /// `o` and `n` are both a hydrogen (the latter on a substituent), `d` is a hydroxyl, and `x` is nothing at all
    #[must_use]
    pub fn loss_sigils(&self, bond: BondKey) -> (char, char) {
        let bond = &self.bonds[bond.0];
        let hydroxyl = hydroxyl();
        let hydrogen = hydrogen();

        let (mut parent_sigil, mut child_sigil) = ('x', 'x');
        if bond.child_loss == hydroxyl {
            (parent_sigil, child_sigil) = ('o', 'd');
        } else if bond.parent_loss == hydroxyl {
            (parent_sigil, child_sigil) = ('d', 'o');
        }

        if bond.child_loss == hydrogen && self.nodes[bond.child.0].kind.is_terminal() {
            child_sigil = 'n';
            parent_sigil = if bond.parent_loss == hydroxyl { 'd' } else { 'o' };
        }

        // NOTE: Any side whose loss wasn't described by the pair above falls back to describing just itself
        let describe = |sigil: char, loss: &Composition| match sigil {
            _ if loss.is_empty() => 'x',
            'x' if *loss == hydroxyl => 'd',
            'x' if *loss == hydrogen => 'o',
            sigil => sigil,
        };
        (
            describe(parent_sigil, &bond.parent_loss),
            describe(child_sigil, &bond.child_loss),
        )
    }

    pub(crate) fn checked_bond(&self, bond: BondKey) -> Result<&Bond> {
        self.bonds
            .get(bond.0)
            .ok_or_else(|| crate::errors::StructuralError::UnknownBond(bond.0).into())
    }
}

/// The atoms lost from one side of a bond, given its GlycoCT sigil
#[must_use]
pub fn loss_from_sigil(sigil: char) -> Composition {
    match sigil {
        'd' => hydroxyl(),
        'o' | 'h' | 'n' => hydrogen(),
        _ => Composition::new(),
    }
}

pub(crate) fn hydrogen() -> Composition {
    [("H", 1)].into_iter().collect()
}

pub(crate) fn hydroxyl() -> Composition {
    [("H", 1), ("O", 1)].into_iter().collect()
}

// Module Tests ========================================================================================================
