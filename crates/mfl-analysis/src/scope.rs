//! Implementation of scopes for M formula language documents.

use indexmap::IndexMap;
use mfl_grammar::NodeId;
use mfl_grammar::NodeIdMap;
use mfl_grammar::NodeKind;
use mfl_grammar::XorNode;

use crate::cache::TypeCache;

/// The bindings visible at a node, keyed by name.
///
/// Insertion order records shadowing depth: the walk runs from the target
/// outward, so the first item inserted under a name is the innermost — and
/// winning — binding.
pub type ScopeItemByKey = IndexMap<String, ScopeItem>;

/// A single binding in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeItem {
    /// The implicit `_` of an `each` expression.
    Each {
        /// The id of the `each` expression.
        each_id: NodeId,
    },
    /// A binding introduced by a `let` or record member.
    KeyValuePair {
        /// The id of the key leaf.
        key_id: NodeId,
        /// The id of the bound expression, absent on partial parses.
        value_id: Option<NodeId>,
    },
    /// A binding introduced by a function parameter.
    Parameter {
        /// The id of the parameter node.
        parameter_id: NodeId,
        /// Whether the parameter is marked `optional`.
        is_optional: bool,
    },
    /// A binding introduced by a section member.
    SectionMember {
        /// The id of the member's key leaf.
        key_id: NodeId,
        /// The id of the bound expression, absent on partial parses.
        value_id: Option<NodeId>,
    },
}

/// Computes the scope of the given node, memoizing through the cache.
///
/// Ancestors are walked from the target outward; at each scoping construct
/// the bindings it introduces are added under their names, innermost wins.
/// Bindings whose own definition encloses the target are excluded, so a
/// `let` member never appears in its own scope view.
pub(crate) fn scope_items(
    node_map: &NodeIdMap,
    id: NodeId,
    given: &TypeCache,
    delta: &mut TypeCache,
) -> ScopeItemByKey {
    if let Some(items) = given.get_scope(id).or_else(|| delta.get_scope(id)) {
        return items.clone();
    }

    let ancestry = node_map.ancestry(id);
    let ancestor_ids: Vec<NodeId> = ancestry.iter().map(XorNode::id).collect();

    let mut items = ScopeItemByKey::new();
    for ancestor in ancestry.iter().skip(1) {
        let ancestor_id = ancestor.id();
        let kind = match ancestor {
            XorNode::Ast(_) => node_map.ast_node(ancestor_id).expect("node should exist").kind,
            XorNode::Context(_) => {
                node_map
                    .context_node(ancestor_id)
                    .expect("node should exist")
                    .kind
            }
        };

        match kind {
            NodeKind::EachExpression => {
                items
                    .entry("_".to_string())
                    .or_insert(ScopeItem::Each {
                        each_id: ancestor_id,
                    });
            }
            NodeKind::FunctionExpression => {
                collect_parameters(node_map, ancestor_id, &mut items);
            }
            NodeKind::LetExpression | NodeKind::RecordExpression => {
                collect_pairs(node_map, ancestor_id, &ancestor_ids, &mut items);
            }
            NodeKind::Section => {
                collect_section_members(node_map, ancestor_id, &ancestor_ids, &mut items);
            }
            _ => {}
        }
    }

    delta.insert_scope(id, items.clone());
    items
}

/// Collects the parameters of a function expression.
fn collect_parameters(node_map: &NodeIdMap, function_id: NodeId, items: &mut ScopeItemByKey) {
    let Some(list) = node_map.child_by_attribute_index(function_id, 0) else {
        return;
    };
    let Some(wrapper) = node_map.child_by_attribute_index(list.id(), 1) else {
        return;
    };

    for &csv in node_map.children_of(wrapper.id()) {
        let Some(parameter) = node_map.child_by_attribute_index(csv, 0) else {
            continue;
        };
        let parameter_id = parameter.id();
        let is_optional = node_map
            .child_by_attribute_index(parameter_id, 0)
            .is_some();
        let Some(name) = leaf_literal(node_map, parameter_id, 1) else {
            continue;
        };

        items.entry(name).or_insert(ScopeItem::Parameter {
            parameter_id,
            is_optional,
        });
    }
}

/// Collects the key-value pairs of a `let` or record construct, excluding
/// any pair that encloses the target.
fn collect_pairs(
    node_map: &NodeIdMap,
    parent_id: NodeId,
    ancestor_ids: &[NodeId],
    items: &mut ScopeItemByKey,
) {
    let Some(wrapper) = node_map.child_by_attribute_index(parent_id, 1) else {
        return;
    };

    for &csv in node_map.children_of(wrapper.id()) {
        let Some(pair) = node_map.child_by_attribute_index(csv, 0) else {
            continue;
        };
        let pair_id = pair.id();
        if ancestor_ids.contains(&pair_id) {
            continue;
        }

        let Some(key) = node_map.child_by_attribute_index(pair_id, 0) else {
            continue;
        };
        let Some(name) = leaf_literal(node_map, pair_id, 0) else {
            continue;
        };
        let value_id = node_map
            .child_by_attribute_index(pair_id, 2)
            .map(|n| n.id());

        items.entry(name).or_insert(ScopeItem::KeyValuePair {
            key_id: key.id(),
            value_id,
        });
    }
}

/// Collects the members of a section, excluding the member that encloses
/// the target.
fn collect_section_members(
    node_map: &NodeIdMap,
    section_id: NodeId,
    ancestor_ids: &[NodeId],
    items: &mut ScopeItemByKey,
) {
    let Some(wrapper) = node_map.child_by_attribute_index(section_id, 4) else {
        return;
    };

    for &member in node_map.children_of(wrapper.id()) {
        if ancestor_ids.contains(&member) {
            continue;
        }

        // The member's paired expression holds the name and value.
        let Some(pair) = node_map.child_by_attribute_index(member, 2) else {
            continue;
        };
        let pair_id = pair.id();
        if ancestor_ids.contains(&pair_id) {
            continue;
        }

        let Some(key) = node_map.child_by_attribute_index(pair_id, 0) else {
            continue;
        };
        let Some(name) = leaf_literal(node_map, pair_id, 0) else {
            continue;
        };
        let value_id = node_map
            .child_by_attribute_index(pair_id, 2)
            .map(|n| n.id());

        items.entry(name).or_insert(ScopeItem::SectionMember {
            key_id: key.id(),
            value_id,
        });
    }
}

/// Reads the literal of the leaf child at the given attribute slot.
fn leaf_literal(node_map: &NodeIdMap, parent: NodeId, slot: usize) -> Option<String> {
    let child = node_map.child_by_attribute_index(parent, slot)?;
    node_map.ast_node(child.id())?.literal.clone()
}
