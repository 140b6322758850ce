//! Implementation of types for M formula language documents.

use std::collections::BTreeSet;
use std::fmt;

use mfl_grammar::NodeId;
use mfl_grammar::NodeIdMap;
use mfl_grammar::NodeKind;
use mfl_grammar::XorNode;

use crate::cache::TypeCache;
use crate::scope::ScopeItem;
use crate::scope::scope_items;

/// The kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Any value.
    Any,
    /// Any value except null.
    AnyNonNull,
    /// A binary value.
    Binary,
    /// A date value.
    Date,
    /// A datetime value.
    DateTime,
    /// A datetimezone value.
    DateTimeZone,
    /// A duration value.
    Duration,
    /// A function value.
    Function,
    /// A list value.
    List,
    /// A logical value.
    Logical,
    /// The type with no values.
    None,
    /// A node that does not produce a value (constants, keys, wrappers).
    NotApplicable,
    /// The null value.
    Null,
    /// A number value.
    Number,
    /// A record value.
    Record,
    /// A table value.
    Table,
    /// A text value.
    Text,
    /// A time value.
    Time,
    /// A type value.
    Type,
    /// A type the analyzer cannot determine.
    Unknown,
}

impl TypeKind {
    /// Resolves a primitive type name from the closed whitelist.
    pub fn from_primitive_name(name: &str) -> Option<Self> {
        match name {
            "any" => Some(Self::Any),
            "anynonnull" => Some(Self::AnyNonNull),
            "binary" => Some(Self::Binary),
            "date" => Some(Self::Date),
            "datetime" => Some(Self::DateTime),
            "datetimezone" => Some(Self::DateTimeZone),
            "duration" => Some(Self::Duration),
            "function" => Some(Self::Function),
            "list" => Some(Self::List),
            "logical" => Some(Self::Logical),
            "none" => Some(Self::None),
            "null" => Some(Self::Null),
            "number" => Some(Self::Number),
            "record" => Some(Self::Record),
            "table" => Some(Self::Table),
            "text" => Some(Self::Text),
            "time" => Some(Self::Time),
            "type" => Some(Self::Type),
            _ => None,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::AnyNonNull => "anynonnull",
            Self::Binary => "binary",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateTimeZone => "datetimezone",
            Self::Duration => "duration",
            Self::Function => "function",
            Self::List => "list",
            Self::Logical => "logical",
            Self::None => "none",
            Self::NotApplicable => "not applicable",
            Self::Null => "null",
            Self::Number => "number",
            Self::Record => "record",
            Self::Table => "table",
            Self::Text => "text",
            Self::Time => "time",
            Self::Type => "type",
            Self::Unknown => "unknown",
        };

        f.write_str(name)
    }
}

/// A type computed for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    /// The kind of the type.
    pub kind: TypeKind,
    /// Whether null is admitted in addition to the kind.
    pub is_nullable: bool,
}

impl Type {
    /// Creates a non-nullable type of the given kind.
    pub const fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            is_nullable: false,
        }
    }

    /// Creates a nullable type of the given kind.
    pub const fn nullable(kind: TypeKind) -> Self {
        Self {
            kind,
            is_nullable: true,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullable {
            write!(f, "nullable {kind}", kind = self.kind)
        } else {
            self.kind.fmt(f)
        }
    }
}

/// Computes the type of a node, memoizing through the cache.
///
/// Types for finished nodes are computed by a per-kind analyzer; context
/// nodes are still in progress and type as unknown. The `visiting` set
/// breaks self-referential identifier chains.
pub(crate) fn type_of(
    node_map: &NodeIdMap,
    node: XorNode,
    given: &TypeCache,
    delta: &mut TypeCache,
    visiting: &mut BTreeSet<NodeId>,
) -> Type {
    let id = node.id();
    if let Some(ty) = given.get_type(id).or_else(|| delta.get_type(id)) {
        return ty;
    }

    if !visiting.insert(id) {
        return Type::new(TypeKind::Unknown);
    }

    let ty = match node {
        XorNode::Context(_) => Type::new(TypeKind::Unknown),
        XorNode::Ast(id) => analyze(node_map, id, given, delta, visiting),
    };

    visiting.remove(&id);
    delta.insert_type(id, ty);
    ty
}

/// The per-kind analyzer for finished nodes.
fn analyze(
    node_map: &NodeIdMap,
    id: NodeId,
    given: &TypeCache,
    delta: &mut TypeCache,
    visiting: &mut BTreeSet<NodeId>,
) -> Type {
    let node = node_map.ast_node(id).expect("node should exist");
    match node.kind {
        NodeKind::LiteralExpression => {
            literal_type(node.literal.as_deref().expect("literal nodes carry text"))
        }
        NodeKind::IdentifierExpression => {
            identifier_type(node_map, id, given, delta, visiting)
        }
        NodeKind::ArithmeticExpression => {
            // `&` concatenates text, lists, and more; the other operators
            // produce numbers.
            match child(node_map, id, 1)
                .and_then(|op| node_map.ast_node(op.id()))
                .and_then(|op| op.literal.as_deref())
            {
                Some("&") => Type::new(TypeKind::Any),
                _ => Type::new(TypeKind::Number),
            }
        }
        NodeKind::LogicalExpression
        | NodeKind::EqualityExpression
        | NodeKind::RelationalExpression
        | NodeKind::IsExpression => Type::new(TypeKind::Logical),
        NodeKind::AsExpression => child(node_map, id, 2)
            .map(|rhs| primitive_type_of(node_map, rhs.id()))
            .unwrap_or(Type::new(TypeKind::Unknown)),
        NodeKind::UnaryExpression => {
            let operator = child(node_map, id, 0)
                .map(|wrapper| wrapper.id())
                .and_then(|wrapper| node_map.children_of(wrapper).first().copied())
                .and_then(|op| node_map.ast_node(op))
                .and_then(|op| op.literal.as_deref().map(str::to_string));
            match operator.as_deref() {
                Some("not") => Type::new(TypeKind::Logical),
                _ => Type::new(TypeKind::Number),
            }
        }
        NodeKind::MetadataExpression => child_type(node_map, id, 0, given, delta, visiting),
        NodeKind::ParenthesizedExpression => child_type(node_map, id, 1, given, delta, visiting),
        NodeKind::IfExpression => {
            let then_type = child_type(node_map, id, 3, given, delta, visiting);
            let else_type = child_type(node_map, id, 5, given, delta, visiting);
            join(then_type, else_type)
        }
        NodeKind::LetExpression => child_type(node_map, id, 3, given, delta, visiting),
        NodeKind::ErrorHandlingExpression => {
            let protected = child_type(node_map, id, 1, given, delta, visiting);
            match child(node_map, id, 2) {
                Some(otherwise) => {
                    let otherwise =
                        child_type(node_map, otherwise.id(), 1, given, delta, visiting);
                    join(protected, otherwise)
                }
                None => protected,
            }
        }
        NodeKind::ErrorRaisingExpression => Type::new(TypeKind::None),
        NodeKind::RecordExpression => Type::new(TypeKind::Record),
        NodeKind::ListExpression | NodeKind::RangeExpression => Type::new(TypeKind::List),
        NodeKind::FunctionExpression | NodeKind::EachExpression => Type::new(TypeKind::Function),
        NodeKind::RecursivePrimaryExpression
        | NodeKind::InvokeExpression
        | NodeKind::ItemAccessExpression
        | NodeKind::FieldSelector
        | NodeKind::FieldProjection => Type::new(TypeKind::Any),
        NodeKind::TypePrimaryType
        | NodeKind::PrimitiveType
        | NodeKind::NullablePrimitiveType
        | NodeKind::RecordType
        | NodeKind::ListType
        | NodeKind::TableType
        | NodeKind::FunctionType
        | NodeKind::NullableType => Type::new(TypeKind::Type),
        NodeKind::NotImplementedExpression => Type::new(TypeKind::Unknown),
        _ => Type::new(TypeKind::NotApplicable),
    }
}

/// Computes the type of a scope item.
pub(crate) fn type_of_scope_item(
    node_map: &NodeIdMap,
    item: &ScopeItem,
    given: &TypeCache,
    delta: &mut TypeCache,
    visiting: &mut BTreeSet<NodeId>,
) -> Type {
    match item {
        ScopeItem::Each { .. } => Type::new(TypeKind::Any),
        ScopeItem::Parameter { parameter_id, .. } => parameter_type(node_map, *parameter_id),
        ScopeItem::KeyValuePair { value_id, .. } | ScopeItem::SectionMember { value_id, .. } => {
            match value_id.and_then(|id| node_map.xor_node(id)) {
                Some(value) => type_of(node_map, value, given, delta, visiting),
                None => Type::new(TypeKind::Unknown),
            }
        }
    }
}

/// Resolves the type of an identifier expression through its scope.
fn identifier_type(
    node_map: &NodeIdMap,
    id: NodeId,
    given: &TypeCache,
    delta: &mut TypeCache,
    visiting: &mut BTreeSet<NodeId>,
) -> Type {
    let name = match child(node_map, id, 1)
        .and_then(|n| node_map.ast_node(n.id()))
        .and_then(|n| n.literal.clone())
    {
        Some(name) => name,
        None => return Type::new(TypeKind::Unknown),
    };

    let scope = scope_items(node_map, id, given, delta);
    match scope.get(&name) {
        Some(item) => {
            let item = item.clone();
            type_of_scope_item(node_map, &item, given, delta, visiting)
        }
        None => Type::new(TypeKind::Unknown),
    }
}

/// Reads the declared type of a parameter, defaulting to `any`.
fn parameter_type(node_map: &NodeIdMap, parameter_id: NodeId) -> Type {
    match child(node_map, parameter_id, 2) {
        Some(as_type) => match child(node_map, as_type.id(), 1) {
            Some(ty) => primitive_type_of(node_map, ty.id()),
            None => Type::new(TypeKind::Any),
        },
        None => Type::new(TypeKind::Any),
    }
}

/// Resolves a primitive or nullable-primitive type node to a [`Type`].
fn primitive_type_of(node_map: &NodeIdMap, id: NodeId) -> Type {
    let Some(node) = node_map.ast_node(id) else {
        return Type::new(TypeKind::Unknown);
    };

    match node.kind {
        NodeKind::PrimitiveType => node
            .literal
            .as_deref()
            .and_then(TypeKind::from_primitive_name)
            .map(Type::new)
            .unwrap_or(Type::new(TypeKind::Unknown)),
        NodeKind::NullablePrimitiveType => match child(node_map, id, 1) {
            Some(inner) => {
                let mut ty = primitive_type_of(node_map, inner.id());
                ty.is_nullable = true;
                ty
            }
            None => Type::nullable(TypeKind::Unknown),
        },
        _ => Type::new(TypeKind::Unknown),
    }
}

/// Classifies a literal leaf's text.
fn literal_type(literal: &str) -> Type {
    match literal {
        "null" => Type::new(TypeKind::Null),
        "true" | "false" => Type::new(TypeKind::Logical),
        _ if literal.starts_with('"') => Type::new(TypeKind::Text),
        _ => Type::new(TypeKind::Number),
    }
}

/// Joins two branch types: equal types keep themselves, anything else
/// widens to `any`.
fn join(left: Type, right: Type) -> Type {
    if left == right {
        left
    } else {
        Type::new(TypeKind::Any)
    }
}

/// Gets the child of `parent` at the given attribute slot.
fn child(node_map: &NodeIdMap, parent: NodeId, index: usize) -> Option<XorNode> {
    node_map.child_by_attribute_index(parent, index)
}

/// Computes the type of the child at the given attribute slot.
fn child_type(
    node_map: &NodeIdMap,
    parent: NodeId,
    index: usize,
    given: &TypeCache,
    delta: &mut TypeCache,
    visiting: &mut BTreeSet<NodeId>,
) -> Type {
    match child(node_map, parent, index) {
        Some(node) => type_of(node_map, node, given, delta, visiting),
        None => Type::new(TypeKind::Unknown),
    }
}
