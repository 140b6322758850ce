//! Implementation of the inspection cache.

use std::collections::HashMap;

use mfl_grammar::NodeId;

use crate::scope::ScopeItemByKey;
use crate::types::Type;

/// A per-document memoization of scopes and types by node id.
///
/// The cache is monotonic: entries are only ever added, so it may be reused
/// across inspection calls for as long as the document it was built against
/// is the one being inspected. Callers sharing a cache must serialize their
/// calls.
///
/// Internally every inspection splits the cache into a *given* half (this
/// value) and a *delta* half (a scratch cache of entries produced by the
/// current call). The delta is merged in only when the call succeeds, so an
/// abandoned computation never pollutes the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeCache {
    /// Computed scopes by node id.
    scope_by_id: HashMap<NodeId, ScopeItemByKey>,
    /// Computed types by node id.
    type_by_id: HashMap<NodeId, Type>,
}

impl TypeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cached scope for a node id.
    pub fn get_scope(&self, id: NodeId) -> Option<&ScopeItemByKey> {
        self.scope_by_id.get(&id)
    }

    /// Gets the cached type for a node id.
    pub fn get_type(&self, id: NodeId) -> Option<Type> {
        self.type_by_id.get(&id).copied()
    }

    /// Gets the number of cached scopes.
    pub fn scope_len(&self) -> usize {
        self.scope_by_id.len()
    }

    /// Gets the number of cached types.
    pub fn type_len(&self) -> usize {
        self.type_by_id.len()
    }

    /// Records a computed scope.
    pub(crate) fn insert_scope(&mut self, id: NodeId, items: ScopeItemByKey) {
        self.scope_by_id.insert(id, items);
    }

    /// Records a computed type.
    pub(crate) fn insert_type(&mut self, id: NodeId, ty: Type) {
        self.type_by_id.insert(id, ty);
    }

    /// Merges a delta produced by a successful call into this cache.
    pub(crate) fn merge(&mut self, delta: TypeCache) {
        self.scope_by_id.extend(delta.scope_by_id);
        self.type_by_id.extend(delta.type_by_id);
    }
}
