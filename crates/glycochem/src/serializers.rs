//! A name-indexed table of text writers, so callers can pick an output format at runtime
//!
//! Writers for other nomenclatures can be registered alongside the built-in ones without this crate knowing about
//! them. The built-in formats are `glycoct` and `composition`

// Standard Library Imports
use std::collections::BTreeMap;

// External Crate Imports
use tracing::debug;

// Local Crate Imports
use crate::{GlycoError, MoleculeGraph, Result, glycoct};

pub type Serializer = fn(&MoleculeGraph) -> String;

#[derive(Clone, Debug)]
pub struct SerializerRegistry {
    serializers: BTreeMap<String, Serializer>,
}

impl SerializerRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            serializers: BTreeMap::new(),
        }
    }

    /// Registers `serializer` under `name`, returning the writer it replaced (if there was one)
    pub fn register_serializer(&mut self, name: impl Into<String>, serializer: Serializer) -> Option<Serializer> {
        let name = name.into();
        debug!(%name, "registering serializer");
        self.serializers.insert(name, serializer)
    }

    pub fn serialize(&self, name: &str, graph: &MoleculeGraph) -> Result<String> {
        let serializer = self.serializers.get(name).ok_or_else(|| GlycoError::SerializerLookup {
            name: name.to_owned(),
        })?;
        Ok(serializer(graph))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.serializers.keys().map(String::as_str)
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_serializer("glycoct", glycoct::dumps);
        registry.register_serializer("composition", |graph| graph.total_composition().to_string());
        registry
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use once_cell::sync::Lazy;

    use crate::{Registry, testing_tools::render_diagnostic};

    use super::*;

    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

    fn hexose() -> MoleculeGraph {
        let mut graph = MoleculeGraph::new();
        graph
            .create_residue(&REGISTRY, "b-dglc-HEX-1:5".parse().unwrap())
            .unwrap();
        graph
    }

    #[test]
    fn built_in_formats() {
        let serializers = SerializerRegistry::default();
        assert_eq!(serializers.names().collect::<Vec<_>>(), ["composition", "glycoct"]);

        let graph = hexose();
        assert_eq!(serializers.serialize("glycoct", &graph).unwrap(), glycoct::dumps(&graph));
        assert_eq!(serializers.serialize("composition", &graph).unwrap(), "C6H12O6");
    }

    #[test]
    fn custom_formats() {
        let mut serializers = SerializerRegistry::empty();
        assert!(serializers.register_serializer("order", |graph| graph.order().to_string()).is_none());
        assert_eq!(serializers.serialize("order", &hexose()).unwrap(), "1");

        let replaced = serializers.register_serializer("order", |_| String::from("?"));
        assert!(replaced.is_some());
        assert_eq!(serializers.serialize("order", &hexose()).unwrap(), "?");
    }

    #[test]
    fn unknown_formats() {
        let serializers = SerializerRegistry::default();
        let error = serializers.serialize("wurcs", &hexose()).unwrap_err();
        assert!(matches!(*error, GlycoError::SerializerLookup { ref name } if name == "wurcs"));
        assert!(render_diagnostic(&*error).contains(r#"no serializer named "wurcs" has been registered"#));
    }
}
