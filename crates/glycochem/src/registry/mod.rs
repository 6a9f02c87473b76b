mod glycan_database;

// External Crate Imports
use ahash::HashMap;
use miette::Result;
use serde::Serialize;

// Local Module Imports
use glycan_database::{GlycanDatabaseKdl, ValidateInto};

// Local Crate Imports
use crate::{AtomicDatabase, Composition, GlycoError, Modification};

// Public API ==========================================================================================================

/// The chemistry every graph is built against: elements, modification deltas, and substituent compositions
///
/// A `Registry` is read-only once built, and is passed to anything that creates nodes or weighs them
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Registry {
    atoms: AtomicDatabase,
    modifications: HashMap<Modification, ModificationDescription>,
    substituents: HashMap<String, SubstituentDescription>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ModificationDescription {
    pub name: String,
    /// What the modification adds to (or, when negative, removes from) a residue
    pub delta: Composition,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct SubstituentDescription {
    pub name: String,
    pub composition: Composition,
    /// What the residue loses when this substituent is attached to it
    pub attachment_loss: Composition,
    pub nh_derivatizable: bool,
}

impl Registry {
    pub fn new(file_name: impl AsRef<str>, kdl_text: impl AsRef<str>) -> Result<Self> {
        let parsed_db: GlycanDatabaseKdl = knuffel::parse(file_name.as_ref(), kdl_text.as_ref())?;
        parsed_db
            .validate(())
            .map_err(|e| e.finalize(file_name, kdl_text).into())
    }

    #[must_use]
    pub const fn atoms(&self) -> &AtomicDatabase {
        &self.atoms
    }

    pub fn modification(&self, modification: Modification) -> crate::Result<&ModificationDescription> {
        self.modifications
            .get(&modification)
            .ok_or_else(|| GlycoError::modification_lookup(modification.code()).into())
    }

    pub fn substituent(&self, name: &str) -> crate::Result<&SubstituentDescription> {
        self.substituents
            .get(name)
            .ok_or_else(|| GlycoError::substituent_lookup(name).into())
    }

    #[must_use]
    pub fn has_substituent(&self, name: &str) -> bool {
        self.substituents.contains_key(name)
    }

    pub fn substituent_names(&self) -> impl Iterator<Item = &str> {
        self.substituents.keys().map(String::as_str)
    }
}

impl Default for Registry {
    fn default() -> Self {
        // SAFETY: The bundled database is checked by the tests below, so this can only fail if those tests do too
        Self::new("glycan_database.kdl", include_str!("../../data/glycan_database.kdl")).unwrap()
    }
}

// Module Tests ========================================================================================================
