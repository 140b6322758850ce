//! Inspection tests: scopes, types, cache behavior, and autocomplete.

use mfl_analysis::Keyword;
use mfl_analysis::ScopeItem;
use mfl_analysis::Type;
use mfl_analysis::TypeCache;
use mfl_analysis::TypeKind;
use mfl_grammar::NodeId;
use mfl_grammar::NodeKind;
use mfl_grammar::Parse;
use mfl_grammar::ParseSettings;
use mfl_grammar::TokenSnapshot;
use mfl_grammar::XorNode;
use pretty_assertions::assert_eq;

/// Parses a source string, asserting success.
fn parse(source: &str) -> Parse {
    let snapshot = TokenSnapshot::lex(source).expect("source should lex");
    mfl_grammar::try_parse(&ParseSettings::default(), &snapshot)
        .unwrap_or_else(|e| panic!("`{source}` should parse: {e}"))
}

/// Gets the rightmost leaf of a parse, the node "under the cursor" for a
/// cursor at the end of the source.
fn rightmost_leaf(parse: &Parse) -> NodeId {
    parse
        .node_map
        .maybe_rightmost_leaf()
        .expect("the document should have leaves")
}

/// Gets the last identifier leaf of a parse.
fn last_identifier(parse: &Parse) -> NodeId {
    parse
        .node_map
        .ast_ids()
        .filter(|&id| {
            parse
                .node_map
                .ast_node(id)
                .expect("node should exist")
                .kind
                == NodeKind::Identifier
        })
        .last()
        .expect("the document should have an identifier")
}

/// Computes the scope types visible at the given node.
fn scope_types_at(
    parse: &Parse,
    node_id: NodeId,
    cache: &mut TypeCache,
) -> indexmap::IndexMap<String, Type> {
    mfl_analysis::try_scope_type(
        &ParseSettings::default(),
        &parse.node_map,
        &parse.leaf_node_ids,
        node_id,
        cache,
    )
    .expect("inspection should succeed")
}

/// Computes the scope types visible at the rightmost leaf.
fn scope_types_at_end(
    parse: &Parse,
    cache: &mut TypeCache,
) -> indexmap::IndexMap<String, Type> {
    scope_types_at(parse, rightmost_leaf(parse), cache)
}

/// Computes the type of the document root.
fn root_type(parse: &Parse) -> Type {
    mfl_analysis::try_type(
        &ParseSettings::default(),
        &parse.node_map,
        &parse.leaf_node_ids,
        XorNode::Ast(parse.root),
        &mut TypeCache::new(),
    )
    .expect("inspection should succeed")
}

#[test]
fn let_bindings_are_in_scope() {
    let parse = parse("let x = 1, y = x in x + y");
    let types = scope_types_at_end(&parse, &mut TypeCache::new());
    assert_eq!(types.len(), 2);
    assert_eq!(types["x"], Type::new(TypeKind::Number));
    // `y = x` resolves through the scope to a number.
    assert_eq!(types["y"], Type::new(TypeKind::Number));
}

#[test]
fn innermost_binding_shadows() {
    let parse = parse(r#"let x = 1 in let x = "a" in x"#);
    let types = scope_types_at_end(&parse, &mut TypeCache::new());
    assert_eq!(types.len(), 1);
    assert_eq!(types["x"], Type::new(TypeKind::Text));
}

#[test]
fn each_introduces_underscore() {
    let parse = parse("each _ + 1");
    let mut cache = TypeCache::new();
    let items = mfl_analysis::try_scope_items(
        &ParseSettings::default(),
        &parse.node_map,
        &parse.leaf_node_ids,
        rightmost_leaf(&parse),
        &mut cache,
    )
    .expect("inspection should succeed");
    assert!(matches!(items["_"], ScopeItem::Each { .. }));

    let types = scope_types_at_end(&parse, &mut cache);
    assert_eq!(types["_"], Type::new(TypeKind::Any));
}

#[test]
fn parameters_carry_declared_types() {
    let parse = parse("(x as number, optional y) => x");
    let mut cache = TypeCache::new();
    let items = mfl_analysis::try_scope_items(
        &ParseSettings::default(),
        &parse.node_map,
        &parse.leaf_node_ids,
        rightmost_leaf(&parse),
        &mut cache,
    )
    .expect("inspection should succeed");
    assert!(matches!(
        items["x"],
        ScopeItem::Parameter {
            is_optional: false,
            ..
        }
    ));
    assert!(matches!(
        items["y"],
        ScopeItem::Parameter {
            is_optional: true,
            ..
        }
    ));

    let types = scope_types_at_end(&parse, &mut cache);
    assert_eq!(types["x"], Type::new(TypeKind::Number));
    assert_eq!(types["y"], Type::new(TypeKind::Any));
}

#[test]
fn record_member_sees_siblings_but_not_itself() {
    let parse = parse("[a = 1, b = a]");
    // The target is the `a` reference inside b's value.
    let target = last_identifier(&parse);
    let types = scope_types_at(&parse, target, &mut TypeCache::new());
    assert_eq!(types.len(), 1);
    assert_eq!(types["a"], Type::new(TypeKind::Number));
    assert!(!types.contains_key("b"));
}

#[test]
fn section_members_are_in_scope() {
    let parse = parse("section s; x = 1; shared y = x;");
    // The target is the `x` reference inside y's value.
    let target = last_identifier(&parse);
    let mut cache = TypeCache::new();
    let items = mfl_analysis::try_scope_items(
        &ParseSettings::default(),
        &parse.node_map,
        &parse.leaf_node_ids,
        target,
        &mut cache,
    )
    .expect("inspection should succeed");
    assert_eq!(items.len(), 1);
    assert!(matches!(items["x"], ScopeItem::SectionMember { .. }));

    let types = scope_types_at(&parse, target, &mut cache);
    assert_eq!(types["x"], Type::new(TypeKind::Number));
}

#[test]
fn expression_types() {
    assert_eq!(
        root_type(&parse("if 1 then 2 else 3")),
        Type::new(TypeKind::Number)
    );
    assert_eq!(
        root_type(&parse(r#"if 1 then 2 else "a""#)),
        Type::new(TypeKind::Any)
    );
    assert_eq!(root_type(&parse("[a = 1]")), Type::new(TypeKind::Record));
    assert_eq!(root_type(&parse("{1, 2}")), Type::new(TypeKind::List));
    assert_eq!(root_type(&parse("(x) => x")), Type::new(TypeKind::Function));
    assert_eq!(root_type(&parse("1 < 2")), Type::new(TypeKind::Logical));
    assert_eq!(root_type(&parse(r#"1 & "a""#)), Type::new(TypeKind::Any));
    assert_eq!(root_type(&parse("not true")), Type::new(TypeKind::Logical));
    assert_eq!(
        root_type(&parse(r#""a" meta [x = 1]"#)),
        Type::new(TypeKind::Text)
    );
    assert_eq!(
        root_type(&parse("1 as nullable number")),
        Type::nullable(TypeKind::Number)
    );
    assert_eq!(root_type(&parse("type number")), Type::new(TypeKind::Type));
    assert_eq!(root_type(&parse("error 1")), Type::new(TypeKind::None));
}

#[test]
fn self_reference_types_as_unknown() {
    let parse = parse("let x = x in x");
    let types = scope_types_at_end(&parse, &mut TypeCache::new());
    assert_eq!(types["x"], Type::new(TypeKind::Unknown));
}

#[test]
fn cache_only_grows() {
    let parse = parse("let x = 1 in x + 1");
    let mut cache = TypeCache::new();

    scope_types_at_end(&parse, &mut cache);
    let scopes = cache.scope_len();
    let types = cache.type_len();
    assert!(scopes > 0);
    assert!(types > 0);

    // Inspecting another node may only add entries.
    mfl_analysis::try_type(
        &ParseSettings::default(),
        &parse.node_map,
        &parse.leaf_node_ids,
        XorNode::Ast(parse.root),
        &mut cache,
    )
    .expect("inspection should succeed");
    assert!(cache.scope_len() >= scopes);
    assert!(cache.type_len() >= types);

    // Repeating an inspection adds nothing.
    let scopes = cache.scope_len();
    let types = cache.type_len();
    scope_types_at_end(&parse, &mut cache);
    assert_eq!(cache.scope_len(), scopes);
    assert_eq!(cache.type_len(), types);
}

#[test]
fn failed_inspection_leaves_cache_untouched() {
    let small = parse("1");
    // An id issued only by a larger document is unknown to the small one.
    let large = parse("let x = 1, y = 2 in x + y");
    let foreign = large.node_map.ast_ids().last().expect("ids should exist");
    assert!(small.node_map.xor_node(foreign).is_none());

    let mut cache = TypeCache::new();
    let error = mfl_analysis::try_scope_type(
        &ParseSettings::default(),
        &small.node_map,
        &small.leaf_node_ids,
        foreign,
        &mut cache,
    )
    .expect_err("inspection should fail");
    assert_eq!(error, mfl_analysis::InspectError::UnknownNodeId(foreign));
    assert_eq!(cache.scope_len(), 0);
    assert_eq!(cache.type_len(), 0);
}

#[test]
fn partial_parse_inspection() {
    let snapshot = TokenSnapshot::lex("let x = 1 in ").expect("source should lex");
    let error = mfl_grammar::try_parse(&ParseSettings::default(), &snapshot)
        .expect_err("parse should fail");
    let state = error.state().expect("the error should carry its state");

    let let_id = state
        .node_map
        .context_ids()
        .find(|&id| {
            state
                .node_map
                .context_node(id)
                .expect("context should exist")
                .kind
                == NodeKind::LetExpression
        })
        .expect("the let production should still be open");

    let ty = mfl_analysis::try_type(
        &ParseSettings::default(),
        &state.node_map,
        state.node_map.leaf_ids(),
        XorNode::Context(let_id),
        &mut TypeCache::new(),
    )
    .expect("inspection should succeed on a partial parse");
    assert_eq!(ty, Type::new(TypeKind::Unknown));
}

/// Runs autocomplete against a cursor at the end of the source.
fn autocomplete(source: &str) -> Vec<Keyword> {
    let snapshot = TokenSnapshot::lex(source).expect("source should lex");
    let outcome = mfl_grammar::try_parse(&ParseSettings::default(), &snapshot);
    mfl_analysis::autocomplete_keywords(&snapshot, &outcome)
}

#[test]
fn autocomplete_trailing_identifier() {
    assert_eq!(
        autocomplete("t"),
        vec![Keyword::True, Keyword::Try, Keyword::Type]
    );
    assert_eq!(autocomplete("tr"), vec![Keyword::True, Keyword::Try]);
    assert_eq!(autocomplete("se"), vec![Keyword::Section]);
}

#[test]
fn autocomplete_expected_keyword() {
    assert_eq!(autocomplete("if 1 t"), vec![Keyword::Then]);
    assert_eq!(autocomplete("if 1 then 2 e"), vec![Keyword::Else]);
}

#[test]
fn autocomplete_has_nothing_to_say() {
    // A complete keyword is not re-suggested.
    assert_eq!(autocomplete("true"), Vec::<Keyword>::new());
    // A non-identifier rightmost leaf suggests nothing.
    assert_eq!(autocomplete("1"), Vec::<Keyword>::new());
}
