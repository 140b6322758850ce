//! Analysis of M formula language documents.
//!
//! Inspection operates over the node-id map published by a parse — or, after
//! a failed parse, over the surviving partial map — and memoizes its results
//! in a [`TypeCache`] that can be carried across calls for the same
//! document.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use mfl_grammar::NodeId;
use mfl_grammar::NodeIdMap;
use mfl_grammar::ParseSettings;
use mfl_grammar::XorNode;

mod cache;
pub mod keyword;
pub mod scope;
pub mod types;

pub use cache::TypeCache;
pub use keyword::Keyword;
pub use keyword::autocomplete_keywords;
pub use scope::ScopeItem;
pub use scope::ScopeItemByKey;
pub use types::Type;
pub use types::TypeKind;

/// An error produced by an inspection entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectError {
    /// The target node id is not present in the node-id map.
    UnknownNodeId(NodeId),
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeId(id) => write!(f, "node id {id} is not in the node-id map"),
        }
    }
}

impl std::error::Error for InspectError {}

/// Computes the scope items visible at the given node.
///
/// The returned map preserves shadowing order: the first entry under a name
/// is the innermost binding.
pub fn try_scope_items(
    settings: &ParseSettings,
    node_map: &NodeIdMap,
    leaf_node_ids: &BTreeSet<NodeId>,
    node_id: NodeId,
    cache: &mut TypeCache,
) -> Result<ScopeItemByKey, InspectError> {
    tracing::debug!(locale = ?settings.locale, %node_id, "inspecting scope");
    debug_assert_eq!(leaf_node_ids, node_map.leaf_ids());

    if node_map.xor_node(node_id).is_none() {
        return Err(InspectError::UnknownNodeId(node_id));
    }

    let mut delta = TypeCache::new();
    let items = scope::scope_items(node_map, node_id, cache, &mut delta);
    cache.merge(delta);
    Ok(items)
}

/// Computes the type of every scope item visible at the given node.
///
/// Entries produced by this call are merged into the cache only on success;
/// the returned view contains exactly the bindings visible at the target.
pub fn try_scope_type(
    settings: &ParseSettings,
    node_map: &NodeIdMap,
    leaf_node_ids: &BTreeSet<NodeId>,
    node_id: NodeId,
    cache: &mut TypeCache,
) -> Result<IndexMap<String, Type>, InspectError> {
    tracing::debug!(locale = ?settings.locale, %node_id, "inspecting scope types");
    debug_assert_eq!(leaf_node_ids, node_map.leaf_ids());

    if node_map.xor_node(node_id).is_none() {
        return Err(InspectError::UnknownNodeId(node_id));
    }

    let mut delta = TypeCache::new();
    let mut visiting = BTreeSet::new();
    let items = scope::scope_items(node_map, node_id, cache, &mut delta);

    let mut result = IndexMap::with_capacity(items.len());
    for (name, item) in &items {
        let ty = types::type_of_scope_item(node_map, item, cache, &mut delta, &mut visiting);
        result.insert(name.clone(), ty);
    }

    cache.merge(delta);
    Ok(result)
}

/// Computes the type of the given node.
///
/// Context nodes — productions that were still open when a parse failed —
/// type as unknown, which lets tooling ask about any node of a partial
/// parse without special-casing.
pub fn try_type(
    settings: &ParseSettings,
    node_map: &NodeIdMap,
    leaf_node_ids: &BTreeSet<NodeId>,
    node: XorNode,
    cache: &mut TypeCache,
) -> Result<Type, InspectError> {
    tracing::debug!(locale = ?settings.locale, node_id = %node.id(), "inspecting type");
    debug_assert_eq!(leaf_node_ids, node_map.leaf_ids());

    let Some(resolved) = node_map.xor_node(node.id()) else {
        return Err(InspectError::UnknownNodeId(node.id()));
    };

    let mut delta = TypeCache::new();
    let mut visiting = BTreeSet::new();
    let ty = types::type_of(node_map, resolved, cache, &mut delta, &mut visiting);
    cache.merge(delta);
    Ok(ty)
}
