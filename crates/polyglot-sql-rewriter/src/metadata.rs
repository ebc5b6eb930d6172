//! Metadata interface consumed by the rewriter
//!
//! The rewriter needs two things from the catalog: the columns of a group (to resolve
//! SELECT INTO targets) and the function library (to resolve functions it synthesizes).
//! [`TempMetadataStore`] holds the ad hoc groups that inline views register; the
//! rewriter layers those overlays above the base [`Metadata`] while it walks a command.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::expressions::ElementSymbol;
use crate::functions::FunctionLibrary;
use crate::types::DataType;

/// Catalog lookups needed during rewrite
pub trait Metadata {
    /// Columns of a group, in definition order
    fn elements_in_group(&self, group: &str) -> Result<Vec<ElementSymbol>>;

    /// Function signatures available to the resolver
    fn function_library(&self) -> &FunctionLibrary;
}

/// Transient column definitions scoped to one command
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TempMetadataStore {
    groups: BTreeMap<String, Vec<ElementSymbol>>,
}

impl TempMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a temporary group; element groups are rewritten to `name`
    pub fn add_temp_group(&mut self, name: &str, symbols: Vec<ElementSymbol>) {
        let symbols = symbols
            .into_iter()
            .map(|mut e| {
                e.group = Some(name.to_string());
                e
            })
            .collect();
        self.groups.insert(name.to_uppercase(), symbols);
    }

    pub fn get(&self, name: &str) -> Option<&Vec<ElementSymbol>> {
        self.groups.get(&name.to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Copy every group of `other` into this store
    pub fn put_all(&mut self, other: &TempMetadataStore) {
        for (name, symbols) in &other.groups {
            self.groups.insert(name.clone(), symbols.clone());
        }
    }
}

/// In-memory [`Metadata`] keyed by case-insensitive group name
#[derive(Debug, Clone)]
pub struct MappingMetadata {
    groups: HashMap<String, Vec<ElementSymbol>>,
    functions: FunctionLibrary,
}

impl Default for MappingMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingMetadata {
    /// Create metadata with the built-in function library and no groups
    pub fn new() -> Self {
        MappingMetadata {
            groups: HashMap::new(),
            functions: FunctionLibrary::builtin(),
        }
    }

    pub fn with_function_library(mut self, functions: FunctionLibrary) -> Self {
        self.functions = functions;
        self
    }

    /// Add or replace a group
    pub fn add_group(&mut self, group: &str, columns: &[(&str, DataType)]) {
        let elements = columns
            .iter()
            .map(|(name, ty)| ElementSymbol::new(Some(group), *name, *ty))
            .collect();
        self.groups.insert(group.to_uppercase(), elements);
    }

    /// Builder form of [`MappingMetadata::add_group`]
    pub fn group(mut self, group: &str, columns: &[(&str, DataType)]) -> Self {
        self.add_group(group, columns);
        self
    }
}

impl Metadata for MappingMetadata {
    fn elements_in_group(&self, group: &str) -> Result<Vec<ElementSymbol>> {
        self.groups
            .get(&group.to_uppercase())
            .cloned()
            .ok_or_else(|| Error::metadata(format!("group {group} not found")))
    }

    fn function_library(&self) -> &FunctionLibrary {
        &self.functions
    }
}

/// Base metadata with a stack of temporary overlays; the innermost overlay wins
pub(crate) struct LayeredMetadata<'a> {
    base: &'a dyn Metadata,
    overlays: Vec<TempMetadataStore>,
}

impl<'a> LayeredMetadata<'a> {
    pub(crate) fn new(base: &'a dyn Metadata) -> Self {
        LayeredMetadata {
            base,
            overlays: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, store: TempMetadataStore) {
        self.overlays.push(store);
    }

    pub(crate) fn pop(&mut self) {
        self.overlays.pop();
    }
}

impl Metadata for LayeredMetadata<'_> {
    fn elements_in_group(&self, group: &str) -> Result<Vec<ElementSymbol>> {
        for overlay in self.overlays.iter().rev() {
            if let Some(elements) = overlay.get(group) {
                return Ok(elements.clone());
            }
        }
        self.base.elements_in_group(group)
    }

    fn function_library(&self) -> &FunctionLibrary {
        self.base.function_library()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_metadata_lookup() {
        let metadata = MappingMetadata::new().group("pm1.g1", &[("e1", DataType::String)]);
        let elements = metadata.elements_in_group("PM1.G1").unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].canonical_name(), "PM1.G1.E1");
        assert!(metadata.elements_in_group("missing").is_err());
        assert!(metadata.function_library().contains("concat"));
    }

    #[test]
    fn test_overlay_shadows_base() {
        let base = MappingMetadata::new().group("x", &[("a", DataType::Integer)]);
        let mut layered = LayeredMetadata::new(&base);

        let mut store = TempMetadataStore::new();
        store.add_temp_group(
            "X",
            vec![ElementSymbol::new(None, "b", DataType::String)],
        );
        layered.push(store);
        let elements = layered.elements_in_group("x").unwrap();
        assert_eq!(elements[0].name, "b");
        assert_eq!(elements[0].group.as_deref(), Some("X"));

        layered.pop();
        assert_eq!(layered.elements_in_group("x").unwrap()[0].name, "a");
    }
}
