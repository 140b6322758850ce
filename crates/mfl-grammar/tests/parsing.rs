//! Parsing tests: grammar scenarios and whole-tree invariants.

use std::collections::BTreeSet;

use mfl_grammar::NodeId;
use mfl_grammar::NodeIdMap;
use mfl_grammar::NodeKind;
use mfl_grammar::Parse;
use mfl_grammar::ParseError;
use mfl_grammar::ParseErrorKind;
use mfl_grammar::ParseSettings;
use mfl_grammar::TokenKind;
use mfl_grammar::TokenSnapshot;
use mfl_grammar::XorNode;
use pretty_assertions::assert_eq;

/// Parses a source string, asserting success and whole-tree invariants.
fn parse(source: &str) -> Parse {
    let snapshot = TokenSnapshot::lex(source).expect("source should lex");
    let parse = mfl_grammar::try_parse(&ParseSettings::default(), &snapshot)
        .unwrap_or_else(|e| panic!("`{source}` should parse: {e}"));
    assert_invariants(&parse);
    parse
}

/// Parses a source string, asserting failure.
fn parse_err(source: &str) -> ParseError {
    let snapshot = TokenSnapshot::lex(source).expect("source should lex");
    mfl_grammar::try_parse(&ParseSettings::default(), &snapshot)
        .expect_err("parse should fail")
}

/// Gets the Ast child of `parent` at the given attribute slot.
fn child_at(map: &NodeIdMap, parent: NodeId, index: usize) -> NodeId {
    match map
        .child_by_attribute_index(parent, index)
        .unwrap_or_else(|| panic!("node {parent} should have a child at slot {index}"))
    {
        XorNode::Ast(id) => id,
        XorNode::Context(id) => panic!("child {id} is unexpectedly in progress"),
    }
}

/// Gets the kind of an Ast node.
fn kind_of(map: &NodeIdMap, id: NodeId) -> NodeKind {
    map.ast_node(id).expect("node should exist").kind
}

/// Gets the literal of a leaf Ast node.
fn literal_of(map: &NodeIdMap, id: NodeId) -> &str {
    map.ast_node(id)
        .expect("node should exist")
        .literal
        .as_deref()
        .expect("node should be a leaf")
}

/// Asserts the node-id map invariants that must hold for every successful
/// parse.
fn assert_invariants(parse: &Parse) {
    let map = &parse.node_map;

    // No context survives a successful parse.
    assert_eq!(map.context_ids().count(), 0);

    // Id coverage: the reachable-from-root set equals the Ast id set.
    let mut reachable = BTreeSet::new();
    let mut stack = vec![parse.root];
    while let Some(id) = stack.pop() {
        reachable.insert(id);
        stack.extend(map.children_of(id).iter().copied());
    }
    assert_eq!(reachable, map.ast_ids().collect::<BTreeSet<_>>());

    for id in map.ast_ids() {
        // Parent symmetry.
        match map.parent_of(id) {
            Some(parent) => assert!(map.children_of(parent).contains(&id)),
            None => assert_eq!(id, parse.root),
        }

        let node = map.ast_node(id).expect("node should exist");
        let children = map.children_of(id);

        for pair in children.windows(2) {
            // Children are ordered by attribute index...
            assert!(map.attribute_index_of(pair[0]) < map.attribute_index_of(pair[1]));
            // ...and their token ranges are disjoint and increasing.
            let left = map.ast_node(pair[0]).expect("child should exist");
            let right = map.ast_node(pair[1]).expect("child should exist");
            assert!(left.token_range.end <= right.token_range.start);
        }

        // A parent's range covers the union of its children's ranges.
        for &child in children {
            let child = map.ast_node(child).expect("child should exist");
            assert!(node.token_range.start <= child.token_range.start);
            assert!(child.token_range.end <= node.token_range.end);
        }

        // Leaves never have children.
        assert!(!node.is_leaf() || children.is_empty());
    }

    // The leaf set is exactly the set of leaf Ast nodes.
    let leaves: BTreeSet<NodeId> = map
        .ast_ids()
        .filter(|&id| map.ast_node(id).expect("node should exist").is_leaf())
        .collect();
    assert_eq!(&leaves, map.leaf_ids());
    assert_eq!(parse.leaf_node_ids, leaves);
}

/// Renders the structural shape of a subtree, ignoring ids.
fn shape(map: &NodeIdMap, id: NodeId) -> String {
    let node = map.ast_node(id).expect("node should exist");
    let children = map
        .children_of(id)
        .iter()
        .map(|&c| shape(map, c))
        .collect::<Vec<_>>()
        .join(",");
    match &node.literal {
        Some(literal) => format!("{kind:?}({literal})", kind = node.kind),
        None => format!("{kind:?}[{children}]", kind = node.kind),
    }
}

#[test]
fn if_expression() {
    let parse = parse("if 1 then 2 else 3");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::IfExpression);

    for (slot, expected) in [(1, "1"), (3, "2"), (5, "3")] {
        let child = child_at(map, parse.root, slot);
        assert_eq!(kind_of(map, child), NodeKind::LiteralExpression);
        assert_eq!(literal_of(map, child), expected);
    }
}

#[test]
fn function_expression() {
    let parse = parse("(x) => x + 1");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::FunctionExpression);

    let parameters = child_at(map, parse.root, 0);
    assert_eq!(kind_of(map, parameters), NodeKind::ParameterList);
    let wrapper = child_at(map, parameters, 1);
    assert_eq!(map.children_of(wrapper).len(), 1);
    let csv = child_at(map, wrapper, 0);
    let parameter = child_at(map, csv, 0);
    assert_eq!(kind_of(map, parameter), NodeKind::Parameter);
    assert_eq!(literal_of(map, child_at(map, parameter, 1)), "x");

    let body = child_at(map, parse.root, 3);
    assert_eq!(kind_of(map, body), NodeKind::ArithmeticExpression);
}

#[test]
fn record_expression_comma_capture() {
    let parse = parse("[a = 1, b = 2]");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::RecordExpression);

    let wrapper = child_at(map, parse.root, 1);
    let csvs = map.children_of(wrapper);
    assert_eq!(csvs.len(), 2);

    // The first csv carries its comma; the last has none.
    assert_eq!(
        kind_of(map, child_at(map, csvs[0], 1)),
        NodeKind::Constant
    );
    assert_eq!(map.children_of(csvs[1]).len(), 1);

    let pair = child_at(map, csvs[1], 0);
    assert_eq!(kind_of(map, pair), NodeKind::GeneralizedIdentifierPairedExpression);
    assert_eq!(literal_of(map, child_at(map, pair, 0)), "b");
}

#[test]
fn error_handling_expression() {
    let parse = parse("try f() otherwise g()");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::ErrorHandlingExpression);

    let protected = child_at(map, parse.root, 1);
    assert_eq!(kind_of(map, protected), NodeKind::RecursivePrimaryExpression);
    assert_eq!(
        kind_of(map, child_at(map, protected, 0)),
        NodeKind::IdentifierExpression
    );
    let accessors = child_at(map, protected, 1);
    assert_eq!(
        kind_of(map, child_at(map, accessors, 0)),
        NodeKind::InvokeExpression
    );

    let otherwise = child_at(map, parse.root, 2);
    assert_eq!(kind_of(map, otherwise), NodeKind::OtherwiseExpression);
    assert_eq!(
        kind_of(map, child_at(map, otherwise, 1)),
        NodeKind::RecursivePrimaryExpression
    );
}

#[test]
fn arithmetic_folds_left() {
    let parse = parse("1 + 2 * 3");
    let map = &parse.node_map;
    // One precedence class: ((1 + 2) * 3).
    assert_eq!(
        shape(map, parse.root),
        "ArithmeticExpression[ArithmeticExpression[LiteralExpression(1),Constant(+),\
         LiteralExpression(2)],Constant(*),LiteralExpression(3)]"
    );
}

#[test]
fn ladder_precedence() {
    let parse = parse("1 < 2 and 2 < 3");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::LogicalExpression);
    assert_eq!(
        kind_of(map, child_at(map, parse.root, 0)),
        NodeKind::RelationalExpression
    );
    assert_eq!(
        kind_of(map, child_at(map, parse.root, 2)),
        NodeKind::RelationalExpression
    );
}

#[test]
fn unary_and_metadata() {
    let parse = parse("-1 meta 2");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::MetadataExpression);
    let left = child_at(map, parse.root, 0);
    assert_eq!(kind_of(map, left), NodeKind::UnaryExpression);
    let operators = child_at(map, left, 0);
    assert_eq!(kind_of(map, operators), NodeKind::ArrayWrapper);
    assert_eq!(literal_of(map, child_at(map, operators, 0)), "-");
}

#[test]
fn is_and_as_expressions() {
    {
        let parse = parse("1 is number");
        let map = &parse.node_map;
        assert_eq!(kind_of(map, parse.root), NodeKind::IsExpression);
        let rhs = child_at(map, parse.root, 2);
        assert_eq!(kind_of(map, rhs), NodeKind::PrimitiveType);
        assert_eq!(literal_of(map, rhs), "number");
    }

    let parse = parse("1 as nullable number");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::AsExpression);
    let rhs = child_at(map, parse.root, 2);
    assert_eq!(kind_of(map, rhs), NodeKind::NullablePrimitiveType);
}

#[test]
fn list_with_range() {
    let parse = parse("{1, 2..3}");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::ListExpression);
    let wrapper = child_at(map, parse.root, 1);
    let csvs = map.children_of(wrapper);
    assert_eq!(csvs.len(), 2);
    let range = child_at(map, csvs[1], 0);
    assert_eq!(kind_of(map, range), NodeKind::RangeExpression);
}

#[test]
fn item_access_with_optional_suffix() {
    let parse = parse("x{0}?");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::RecursivePrimaryExpression);
    let accessors = child_at(map, parse.root, 1);
    let access = child_at(map, accessors, 0);
    assert_eq!(kind_of(map, access), NodeKind::ItemAccessExpression);
    assert_eq!(literal_of(map, child_at(map, access, 3)), "?");
}

#[test]
fn field_projection() {
    let parse = parse("x[[a], [b]]");
    let map = &parse.node_map;
    let accessors = child_at(map, parse.root, 1);
    let projection = child_at(map, accessors, 0);
    assert_eq!(kind_of(map, projection), NodeKind::FieldProjection);
    let selectors = child_at(map, projection, 1);
    assert_eq!(map.children_of(selectors).len(), 2);
}

#[test]
fn each_with_field_selector() {
    let parse = parse("each [a]");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::EachExpression);
    assert_eq!(
        kind_of(map, child_at(map, parse.root, 1)),
        NodeKind::FieldSelector
    );
}

#[test]
fn generalized_identifiers() {
    // A quoted identifier followed contiguously by a plain identifier
    // merges into one literal sliced from the source.
    {
        let parse = parse(r#"[#"a"b = 1]"#);
        let map = &parse.node_map;
        let wrapper = child_at(map, parse.root, 1);
        let pair = child_at(map, child_at(map, wrapper, 0), 0);
        assert_eq!(literal_of(map, child_at(map, pair, 0)), r#"#"a"b"#);
    }

    // A digits-only key is consumed as one numeric-literal token.
    let parse = parse("[1 = 2]");
    let map = &parse.node_map;
    let wrapper = child_at(map, parse.root, 1);
    let pair = child_at(map, child_at(map, wrapper, 0), 0);
    let key = child_at(map, pair, 0);
    assert_eq!(kind_of(map, key), NodeKind::GeneralizedIdentifier);
    assert_eq!(literal_of(map, key), "1");
}

#[test]
fn keyword_identifier_invocation() {
    let parse = parse("#date(2024, 1, 1)");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::RecursivePrimaryExpression);
    let head = child_at(map, parse.root, 0);
    assert_eq!(kind_of(map, head), NodeKind::IdentifierExpression);
    assert_eq!(literal_of(map, child_at(map, head, 1)), "#date");
}

#[test]
fn type_expressions() {
    {
        let parse = parse("type {number}");
        let map = &parse.node_map;
        assert_eq!(kind_of(map, parse.root), NodeKind::TypePrimaryType);
        let list = child_at(map, parse.root, 1);
        assert_eq!(kind_of(map, list), NodeKind::ListType);
    }

    {
        let parse = parse("type table [a = number, optional b]");
        let map = &parse.node_map;
        let table = child_at(map, parse.root, 1);
        assert_eq!(kind_of(map, table), NodeKind::TableType);
        let fields = child_at(map, table, 1);
        assert_eq!(kind_of(map, fields), NodeKind::FieldSpecificationList);
    }

    let parse = parse("type function (x as number) as number");
    let map = &parse.node_map;
    assert_eq!(
        kind_of(map, child_at(map, parse.root, 1)),
        NodeKind::FunctionType
    );
}

#[test]
fn section_document() {
    let parse = parse("section foo; x = 1; shared y = 2;");
    let map = &parse.node_map;
    assert_eq!(kind_of(map, parse.root), NodeKind::Section);
    assert_eq!(literal_of(map, child_at(map, parse.root, 2)), "foo");

    let members = child_at(map, parse.root, 4);
    let member_ids = map.children_of(members);
    assert_eq!(member_ids.len(), 2);
    // The second member carries a `shared` constant; the first does not.
    assert!(map.child_by_attribute_index(member_ids[0], 1).is_none());
    assert_eq!(
        literal_of(map, child_at(map, member_ids[1], 1)),
        "shared"
    );
}

#[test]
fn malformed_section_member() {
    let error = parse_err("section; shared ;");
    assert_eq!(
        error.kind(),
        &ParseErrorKind::ExpectedTokenKind {
            expected: TokenKind::Ident,
            found: Some(TokenKind::Semicolon),
        }
    );
    // The position points at the second `;`.
    assert_eq!(error.position().offset, 16);

    // The context tree survives, rooted at a Section node.
    let state = error.state().expect("the error should carry its state");
    let root = state.maybe_root.expect("a root context should have opened");
    assert_eq!(
        state.node_map.context_node(root).expect("root should be a context").kind,
        NodeKind::Section
    );
    assert!(state.node_map.context_ids().count() > 1);
}

#[test]
fn document_tie_prefers_section_error() {
    // Both attempts fail on the first token; the section error wins.
    let error = parse_err(")");
    assert_eq!(
        error.kind(),
        &ParseErrorKind::ExpectedTokenKind {
            expected: TokenKind::SectionKeyword,
            found: Some(TokenKind::CloseParen),
        }
    );
}

#[test]
fn unused_tokens_remain() {
    let error = parse_err("1 2");
    assert_eq!(error.kind(), &ParseErrorKind::UnusedTokensRemain);
    assert_eq!(error.token_index(), 1);
}

#[test]
fn invalid_primitive_type() {
    let error = parse_err("1 is foo");
    assert_eq!(
        error.kind(),
        &ParseErrorKind::InvalidPrimitiveType {
            literal: "foo".to_string(),
        }
    );
}

#[test]
fn required_parameter_after_optional() {
    let error = parse_err("(optional x, y) => 1");
    assert_eq!(
        error.kind(),
        &ParseErrorKind::RequiredParameterAfterOptional
    );
}

#[test]
fn unterminated_parentheses() {
    let error = parse_err("(1");
    assert_eq!(error.kind(), &ParseErrorKind::UnterminatedParentheses);
}

#[test]
fn unterminated_bracket() {
    let error = parse_err("[a");
    assert_eq!(error.kind(), &ParseErrorKind::UnterminatedBracket);
}

#[test]
fn reparse_is_structurally_idempotent() {
    let source = "let x = 1, y = x in if x > y then {x, y} else [a = x][a]";
    let first = parse(source);
    let second = parse(source);
    assert_eq!(
        shape(&first.node_map, first.root),
        shape(&second.node_map, second.root)
    );
}

#[test]
fn sibling_ids_increase_with_token_starts() {
    let parse = parse("f(1, 2, 3)");
    let map = &parse.node_map;
    for id in map.ast_ids() {
        for pair in map.children_of(id).windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
