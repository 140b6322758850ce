//! Module for the node-id map.
//!
//! The map is the single owner of tree structure: it indexes finished Ast
//! nodes and in-progress context nodes by id, and records every parent/child
//! relationship positionally. Nodes themselves hold no references to other
//! nodes, which keeps the two trees (Ast and context) free of cycles.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::node::AstNode;
use crate::node::ContextNode;
use crate::node::NodeId;
use crate::node::XorNode;

/// A bidirectional parent/child index over Ast and context nodes.
///
/// After a successful parse the map contains only Ast entries and is
/// immutable; after a failed parse the surviving context entries describe
/// the productions that were open at the point of failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdMap {
    /// Finished Ast nodes by id.
    ast_by_id: BTreeMap<NodeId, AstNode>,
    /// In-progress context nodes by id.
    context_by_id: BTreeMap<NodeId, ContextNode>,
    /// Ordered child ids by parent id.
    child_ids_by_id: BTreeMap<NodeId, Vec<NodeId>>,
    /// Parent id by child id; every non-root node has exactly one entry.
    parent_id_by_id: BTreeMap<NodeId, NodeId>,
    /// Ids of all leaf Ast nodes.
    leaf_ids: BTreeSet<NodeId>,
    /// The id of the last-ended leaf, if any.
    maybe_rightmost_leaf: Option<NodeId>,
}

impl NodeIdMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the Ast node with the given id.
    pub fn ast_node(&self, id: NodeId) -> Option<&AstNode> {
        self.ast_by_id.get(&id)
    }

    /// Gets the context node with the given id.
    pub fn context_node(&self, id: NodeId) -> Option<&ContextNode> {
        self.context_by_id.get(&id)
    }

    /// Resolves an id to a reference to whichever tree currently claims it.
    pub fn xor_node(&self, id: NodeId) -> Option<XorNode> {
        if self.ast_by_id.contains_key(&id) {
            Some(XorNode::Ast(id))
        } else if self.context_by_id.contains_key(&id) {
            Some(XorNode::Context(id))
        } else {
            None
        }
    }

    /// Gets the ordered child ids of the given node.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.child_ids_by_id.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Gets the parent id of the given node.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parent_id_by_id.get(&id).copied()
    }

    /// Iterates all Ast node ids in increasing order.
    pub fn ast_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ast_by_id.keys().copied()
    }

    /// Iterates all context node ids in increasing order.
    pub fn context_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.context_by_id.keys().copied()
    }

    /// Gets the set of leaf Ast node ids.
    pub fn leaf_ids(&self) -> &BTreeSet<NodeId> {
        &self.leaf_ids
    }

    /// Gets the id of the last-ended leaf, if any.
    pub fn maybe_rightmost_leaf(&self) -> Option<NodeId> {
        self.maybe_rightmost_leaf
    }

    /// Finds the child of `parent` occupying the given attribute slot.
    ///
    /// Slots of absent optional children have no entry, so a missing result
    /// is not an error.
    pub fn child_by_attribute_index(&self, parent: NodeId, index: usize) -> Option<XorNode> {
        self.children_of(parent)
            .iter()
            .find(|&&child| self.attribute_index_of(child) == Some(index))
            .and_then(|&child| self.xor_node(child))
    }

    /// Gets the attribute index of the given node, from whichever tree
    /// currently claims it.
    pub fn attribute_index_of(&self, id: NodeId) -> Option<usize> {
        match self.xor_node(id)? {
            XorNode::Ast(_) => self.ast_by_id[&id].attribute_index,
            XorNode::Context(_) => self.context_by_id[&id].attribute_index,
        }
    }

    /// Walks from the given node to the root, returning each step.
    ///
    /// The first element is the node itself; the last is the root.
    pub fn ancestry(&self, id: NodeId) -> Vec<XorNode> {
        let mut result = Vec::new();
        let mut current = self.xor_node(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent_of(node.id()).and_then(|p| self.xor_node(p));
        }

        result
    }

    /// Opens a new context node under the given parent.
    ///
    /// # Panics
    ///
    /// Panics if the id is already claimed by either tree.
    pub(crate) fn insert_context(&mut self, node: ContextNode, parent: Option<NodeId>) {
        assert!(
            !self.ast_by_id.contains_key(&node.id) && !self.context_by_id.contains_key(&node.id),
            "node id {id} is already claimed",
            id = node.id
        );

        if let Some(parent) = parent {
            self.child_ids_by_id.entry(parent).or_default().push(node.id);
            self.parent_id_by_id.insert(node.id, parent);
        }

        self.context_by_id.insert(node.id, node);
    }

    /// Promotes a context node to a finished Ast node.
    ///
    /// The context entry is removed and the Ast entry inserted under the same
    /// id; leaf bookkeeping is updated.
    ///
    /// # Panics
    ///
    /// Panics if no context node with the Ast node's id is open.
    pub(crate) fn promote_context(&mut self, node: AstNode) {
        let removed = self.context_by_id.remove(&node.id);
        assert!(
            removed.is_some(),
            "no open context for node id {id}",
            id = node.id
        );

        if node.is_leaf() {
            self.leaf_ids.insert(node.id);
            self.maybe_rightmost_leaf = Some(node.id);
        }

        self.ast_by_id.insert(node.id, node);
    }

    /// Discards a context node, splicing its lone child (if any) into the
    /// context's slot in its parent.
    ///
    /// # Panics
    ///
    /// Panics if the context has more than one child, or if it has neither a
    /// parent nor zero children.
    pub(crate) fn delete_context(&mut self, id: NodeId) {
        let context = self
            .context_by_id
            .remove(&id)
            .unwrap_or_else(|| panic!("no open context for node id {id}"));

        let children = self.child_ids_by_id.remove(&id).unwrap_or_default();
        assert!(
            children.len() <= 1,
            "cannot discard context {id} with {n} children",
            n = children.len()
        );

        let maybe_parent = self.parent_id_by_id.remove(&id);
        let maybe_child = children.first().copied();

        match (maybe_parent, maybe_child) {
            (Some(parent), Some(child)) => {
                // Replace the context with its child in the parent's list,
                // inheriting the context's attribute index.
                let siblings = self
                    .child_ids_by_id
                    .get_mut(&parent)
                    .expect("parent should have a child list");
                let slot = siblings
                    .iter()
                    .position(|&c| c == id)
                    .expect("context should be in its parent's child list");
                siblings[slot] = child;
                self.parent_id_by_id.insert(child, parent);
                self.set_attribute_index(child, context.attribute_index);
            }
            (None, Some(child)) => {
                // The context was the root; the child becomes the root.
                self.parent_id_by_id.remove(&child);
                self.set_attribute_index(child, None);
            }
            (Some(parent), None) => {
                let siblings = self
                    .child_ids_by_id
                    .get_mut(&parent)
                    .expect("parent should have a child list");
                siblings.retain(|&c| c != id);
            }
            (None, None) => {}
        }
    }

    /// Re-parents an already-finished head node under a context that opened
    /// after it.
    ///
    /// This is the tree surgery required by recursive primary expressions:
    /// the head primary is parsed (and sealed) before the enclosing node's
    /// kind is known. The head is removed from its current parent's child
    /// list, becomes the context's first child, and the context's token
    /// start is widened to cover the head.
    ///
    /// # Panics
    ///
    /// Panics if the head is not a finished Ast node or the target is not an
    /// open context.
    pub(crate) fn reparent_under_context(&mut self, head: NodeId, context: NodeId) {
        assert!(
            self.ast_by_id.contains_key(&head),
            "re-parented head {head} must be a finished node"
        );

        if let Some(old_parent) = self.parent_id_by_id.get(&head).copied() {
            let siblings = self
                .child_ids_by_id
                .get_mut(&old_parent)
                .expect("old parent should have a child list");
            siblings.retain(|&c| c != head);
        }

        self.parent_id_by_id.insert(head, context);
        self.child_ids_by_id.insert(context, vec![head]);

        let head_start = self.ast_by_id[&head].token_range.start;
        let head_node = self.ast_by_id.get_mut(&head).expect("head was checked");
        head_node.attribute_index = Some(0);

        let context_node = self
            .context_by_id
            .get_mut(&context)
            .expect("target must be an open context");
        context_node.token_start = head_start;
        context_node.attribute_counter = 1;
    }

    /// Advances the attribute counter of an open context, returning the slot
    /// that was current before the bump.
    ///
    /// # Panics
    ///
    /// Panics if the id is not an open context.
    pub(crate) fn bump_attribute_counter(&mut self, id: NodeId) -> usize {
        let context = self
            .context_by_id
            .get_mut(&id)
            .unwrap_or_else(|| panic!("no open context for node id {id}"));
        let slot = context.attribute_counter;
        context.attribute_counter += 1;
        slot
    }

    /// Sets the attribute counter of an open context.
    ///
    /// Used by state restore to undo counter drift from lookahead reads.
    ///
    /// # Panics
    ///
    /// Panics if the id is not an open context.
    pub(crate) fn set_attribute_counter(&mut self, id: NodeId, counter: usize) {
        let context = self
            .context_by_id
            .get_mut(&id)
            .unwrap_or_else(|| panic!("no open context for node id {id}"));
        context.attribute_counter = counter;
    }

    /// Updates the attribute index of the given node in whichever tree
    /// claims it.
    fn set_attribute_index(&mut self, id: NodeId, index: Option<usize>) {
        if let Some(node) = self.ast_by_id.get_mut(&id) {
            node.attribute_index = index;
        } else if let Some(node) = self.context_by_id.get_mut(&id) {
            node.attribute_index = index;
        }
    }

    /// Removes every node whose id is at or above the given id.
    ///
    /// Ids are issued monotonically, so this restores the map to its state
    /// at the moment the id was about to be issued. Used by state backups.
    pub(crate) fn prune_from(&mut self, first_dead: NodeId) {
        self.ast_by_id.split_off(&first_dead);
        self.context_by_id.split_off(&first_dead);
        self.child_ids_by_id.split_off(&first_dead);
        self.parent_id_by_id.split_off(&first_dead);
        self.leaf_ids.split_off(&first_dead);

        for children in self.child_ids_by_id.values_mut() {
            children.retain(|&c| c < first_dead);
        }

        self.maybe_rightmost_leaf = self.leaf_ids.last().copied();
    }
}
