//! Module for the grammar readers.
//!
//! Each reader recognizes one production: it opens a context, reads the
//! production's children in order, and either ends the context (sealing an
//! Ast node of the declared kind) or deletes it (collapsing into its single
//! child). A reader that fails returns an error with the cursor wherever the
//! failure left it; the surviving contexts record what was in progress.
//!
//! The [`try_parse`] driver at the top of this module owns the only recovery
//! the parser performs: a failed expression document is retried as a section
//! document from token zero with a fresh context tree.

use std::collections::BTreeSet;

use crate::disambiguate;
use crate::disambiguate::BracketDisambiguation;
use crate::disambiguate::ParenthesisDisambiguation;
use crate::error::ParseError;
use crate::error::ParseErrorKind;
use crate::lexer::TokenKind;
use crate::lexer::TokenSnapshot;
use crate::locale::ParseSettings;
use crate::node::NodeId;
use crate::node_map::NodeIdMap;
use crate::state::ParserState;
use crate::syntax::NodeKind;

/// A reader function for one production.
type Reader = fn(&mut ParserState<'_>) -> Result<NodeId, ParseError>;

/// The token kinds that begin a literal expression.
const LITERAL_KINDS: &[TokenKind] = &[
    TokenKind::Numeric,
    TokenKind::Text,
    TokenKind::NullKeyword,
    TokenKind::TrueKeyword,
    TokenKind::FalseKeyword,
];

/// The token kinds of the `#`-keywords that parse as identifier expressions.
const KEYWORD_IDENTIFIER_KINDS: &[TokenKind] = &[
    TokenKind::HashBinaryKeyword,
    TokenKind::HashDateKeyword,
    TokenKind::HashDateTimeKeyword,
    TokenKind::HashDateTimeZoneKeyword,
    TokenKind::HashDurationKeyword,
    TokenKind::HashSectionsKeyword,
    TokenKind::HashSharedKeyword,
    TokenKind::HashTableKeyword,
    TokenKind::HashTimeKeyword,
];

/// The prefix unary operators.
const UNARY_OPERATORS: &[TokenKind] = &[TokenKind::Plus, TokenKind::Minus, TokenKind::NotKeyword];

/// The logical binary operators.
const LOGICAL_OPERATORS: &[TokenKind] = &[TokenKind::AndKeyword, TokenKind::OrKeyword];

/// The equality binary operators.
const EQUALITY_OPERATORS: &[TokenKind] = &[TokenKind::Equal, TokenKind::NotEqual];

/// The relational binary operators.
const RELATIONAL_OPERATORS: &[TokenKind] = &[
    TokenKind::Less,
    TokenKind::LessEqual,
    TokenKind::Greater,
    TokenKind::GreaterEqual,
];

/// The arithmetic binary operators, one precedence class.
const ARITHMETIC_OPERATORS: &[TokenKind] = &[
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Asterisk,
    TokenKind::Slash,
    TokenKind::Ampersand,
];

/// The token kinds that may begin or continue a generalized identifier.
const GENERALIZED_IDENTIFIER_KINDS: &[TokenKind] = &[
    TokenKind::Ident,
    TokenKind::QuotedIdent,
    TokenKind::Numeric,
    TokenKind::AndKeyword,
    TokenKind::AsKeyword,
    TokenKind::EachKeyword,
    TokenKind::ElseKeyword,
    TokenKind::ErrorKeyword,
    TokenKind::FalseKeyword,
    TokenKind::IfKeyword,
    TokenKind::InKeyword,
    TokenKind::IsKeyword,
    TokenKind::LetKeyword,
    TokenKind::MetaKeyword,
    TokenKind::NotKeyword,
    TokenKind::NullKeyword,
    TokenKind::OtherwiseKeyword,
    TokenKind::OrKeyword,
    TokenKind::SectionKeyword,
    TokenKind::SharedKeyword,
    TokenKind::ThenKeyword,
    TokenKind::TrueKeyword,
    TokenKind::TryKeyword,
    TokenKind::TypeKeyword,
];

/// The closed whitelist of primitive type names.
///
/// `null` and `type` reach the primitive type reader as their own token
/// kinds and are not listed here.
const PRIMITIVE_TYPE_NAMES: &[&str] = &[
    "action",
    "any",
    "anynonnull",
    "binary",
    "date",
    "datetime",
    "datetimezone",
    "duration",
    "function",
    "list",
    "logical",
    "none",
    "number",
    "record",
    "table",
    "text",
    "time",
];

/// The token kinds that continue a primary expression into a recursive
/// primary expression.
const RECURSIVE_PRIMARY_KINDS: &[TokenKind] = &[
    TokenKind::OpenParen,
    TokenKind::OpenBracket,
    TokenKind::OpenBrace,
];

/// The result of a successful parse.
///
/// All three artifacts are immutable and may be read concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parse {
    /// The id of the document root.
    pub root: NodeId,
    /// The finished node-id map.
    pub node_map: NodeIdMap,
    /// The ids of all leaf nodes.
    pub leaf_node_ids: BTreeSet<NodeId>,
}

/// Parses a token snapshot into a document.
///
/// An expression document is attempted first; on any failure — including a
/// parse that succeeds with tokens left over — a section document is
/// attempted from token zero with a fresh context tree. If both attempts
/// fail, the error from the attempt that consumed more tokens is returned as
/// the better guess at what the user meant; ties favor the section error.
pub fn try_parse(
    settings: &ParseSettings,
    snapshot: &TokenSnapshot<'_>,
) -> Result<Parse, ParseError> {
    let mut state = ParserState::new(*settings, snapshot);
    let expression_error = match read_expression_document(&mut state) {
        Ok(root) => return Ok(publish(state, root)),
        Err(e) => e.with_state(state.into_error_state()),
    };

    let mut state = ParserState::new(*settings, snapshot);
    match read_section_document(&mut state) {
        Ok(root) => Ok(publish(state, root)),
        Err(e) => {
            let section_error = e.with_state(state.into_error_state());
            if expression_error.token_index() > section_error.token_index() {
                Err(expression_error)
            } else {
                Err(section_error)
            }
        }
    }
}

/// Publishes the artifacts of a successful parse.
fn publish(state: ParserState<'_>, root: NodeId) -> Parse {
    let node_map = state.into_node_map();
    let leaf_node_ids = node_map.leaf_ids().clone();
    Parse {
        root,
        node_map,
        leaf_node_ids,
    }
}

/// Reads an expression document: one expression covering every token.
fn read_expression_document(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let root = read_expression(state)?;
    state.expect_no_more_tokens()?;
    Ok(root)
}

/// Reads a section document covering every token.
fn read_section_document(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let root = read_section(state)?;
    state.expect_no_more_tokens()?;
    Ok(root)
}

// ---- expressions ----------------------------------------------------------

/// Reads an expression.
///
/// Keyword-introduced expressions are dispatched here; everything else
/// enters the binary operator ladder. An opening parenthesis is ambiguous
/// between a function head and a grouping and is resolved by lookahead
/// before any token is consumed.
pub(crate) fn read_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    match state.maybe_current_kind() {
        Some(TokenKind::EachKeyword) => read_each_expression(state),
        Some(TokenKind::LetKeyword) => read_let_expression(state),
        Some(TokenKind::IfKeyword) => read_if_expression(state),
        Some(TokenKind::ErrorKeyword) => read_error_raising_expression(state),
        Some(TokenKind::TryKeyword) => read_error_handling_expression(state),
        Some(TokenKind::OpenParen) => match disambiguate::disambiguate_parenthesis(state)? {
            ParenthesisDisambiguation::FunctionExpression => read_function_expression(state),
            ParenthesisDisambiguation::ParenthesizedExpression => read_logical_expression(state),
        },
        _ => read_logical_expression(state),
    }
}

/// Reads `operand (op operand)*`, folding left-associatively.
///
/// A lone operand creates no node: the opened context collapses into it.
/// Each further operator re-parents the tree built so far as the left child
/// of a fresh node, so `a + b + c` folds to `(a + b) + c`.
fn read_bin_op_expression(
    state: &mut ParserState<'_>,
    kind: NodeKind,
    operators: &'static [TokenKind],
    read_left: Reader,
    read_right: Reader,
) -> Result<NodeId, ParseError> {
    state.start_context(kind);
    let left = read_left(state)?;
    if !state.is_on_any(operators) {
        state.delete_context();
        return Ok(left);
    }

    read_operator_constant(state)?;
    read_right(state)?;
    let mut node = state.end_context();

    while state.is_on_any(operators) {
        state.start_context(kind);
        state.reparent_under_current_context(node);
        read_operator_constant(state)?;
        read_right(state)?;
        node = state.end_context();
    }

    Ok(node)
}

/// Reads the operator at the cursor as a constant.
fn read_operator_constant(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let kind = state
        .maybe_current_kind()
        .expect("operator presence was just checked");
    state.read_token_kind_as_constant(kind)
}

/// Reads a logical expression (`and`/`or` over is-expressions).
fn read_logical_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op_expression(
        state,
        NodeKind::LogicalExpression,
        LOGICAL_OPERATORS,
        read_is_expression,
        read_is_expression,
    )
}

/// Reads an is-expression; the right operand is a nullable primitive type.
fn read_is_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op_expression(
        state,
        NodeKind::IsExpression,
        &[TokenKind::IsKeyword],
        read_as_expression,
        read_nullable_primitive_type,
    )
}

/// Reads an as-expression; the right operand is a nullable primitive type.
fn read_as_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op_expression(
        state,
        NodeKind::AsExpression,
        &[TokenKind::AsKeyword],
        read_equality_expression,
        read_nullable_primitive_type,
    )
}

/// Reads an equality expression (`=`/`<>`).
fn read_equality_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op_expression(
        state,
        NodeKind::EqualityExpression,
        EQUALITY_OPERATORS,
        read_relational_expression,
        read_relational_expression,
    )
}

/// Reads a relational expression (`<`/`<=`/`>`/`>=`).
fn read_relational_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op_expression(
        state,
        NodeKind::RelationalExpression,
        RELATIONAL_OPERATORS,
        read_arithmetic_expression,
        read_arithmetic_expression,
    )
}

/// Reads an arithmetic expression (`+ - * / &`, one precedence class).
fn read_arithmetic_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_bin_op_expression(
        state,
        NodeKind::ArithmeticExpression,
        ARITHMETIC_OPERATORS,
        read_metadata_expression,
        read_metadata_expression,
    )
}

/// Reads a metadata expression: a unary expression with a single optional
/// `meta` suffix.
fn read_metadata_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::MetadataExpression);
    let left = read_unary_expression(state)?;
    if !state.is_on(TokenKind::MetaKeyword) {
        state.delete_context();
        return Ok(left);
    }

    state.read_token_kind_as_constant(TokenKind::MetaKeyword)?;
    read_unary_expression(state)?;
    Ok(state.end_context())
}

/// Reads a unary expression: a sequence of prefix `+ - not` operators over a
/// type expression.
fn read_unary_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    if !state.is_on_any(UNARY_OPERATORS) {
        return read_type_expression(state);
    }

    state.start_context(NodeKind::UnaryExpression);
    state.start_context(NodeKind::ArrayWrapper);
    while state.is_on_any(UNARY_OPERATORS) {
        read_operator_constant(state)?;
    }
    state.end_context();

    read_type_expression(state)?;
    Ok(state.end_context())
}

/// Reads a type expression: `type <primary type>` or a primary expression.
fn read_type_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    if !state.is_on(TokenKind::TypeKeyword) {
        return read_primary_expression(state);
    }

    state.start_context(NodeKind::TypePrimaryType);
    state.read_token_kind_as_constant(TokenKind::TypeKeyword)?;
    read_primary_type(state)?;
    Ok(state.end_context())
}

// ---- primary expressions --------------------------------------------------

/// Reads a primary expression, continuing into a recursive primary
/// expression if an invoke/item-access/field-access opener follows.
fn read_primary_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let head = match state.maybe_current_kind() {
        Some(TokenKind::At) | Some(TokenKind::Ident) | Some(TokenKind::QuotedIdent) => {
            read_identifier_expression(state)?
        }
        Some(TokenKind::OpenParen) => read_parenthesized_expression(state)?,
        Some(TokenKind::OpenBracket) => match disambiguate::disambiguate_bracket(state)? {
            BracketDisambiguation::Record => read_record_expression(state)?,
            BracketDisambiguation::FieldSelection => read_field_selector(state)?,
            BracketDisambiguation::FieldProjection => read_field_projection(state)?,
        },
        Some(TokenKind::OpenBrace) => read_list_expression(state)?,
        Some(TokenKind::Ellipsis) => read_not_implemented_expression(state)?,
        Some(kind) if KEYWORD_IDENTIFIER_KINDS.contains(&kind) => {
            read_keyword_identifier_expression(state)?
        }
        _ => read_literal_expression(state)?,
    };

    if state.is_on_any(RECURSIVE_PRIMARY_KINDS) {
        read_recursive_primary_expression(state, head)
    } else {
        Ok(head)
    }
}

/// Reads an identifier expression, with an optional `@` inclusive prefix.
fn read_identifier_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::IdentifierExpression);
    state.maybe_read_token_kind_as_constant(TokenKind::At);
    read_identifier(state)?;
    Ok(state.end_context())
}

/// Reads an identifier leaf from a plain or quoted identifier token.
fn read_identifier(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    if !state.is_on(TokenKind::Ident) && !state.is_on(TokenKind::QuotedIdent) {
        return Err(state.error_expected(TokenKind::Ident));
    }

    state.start_context(NodeKind::Identifier);
    let literal = state.read_token();
    Ok(state.end_leaf(literal))
}

/// Reads a `#`-keyword as an identifier expression.
fn read_keyword_identifier_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::IdentifierExpression);
    state.increment_attribute_counter();
    state.start_context(NodeKind::Identifier);
    let literal = state.read_token();
    state.end_leaf(literal);
    Ok(state.end_context())
}

/// Reads a literal expression leaf.
fn read_literal_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    if !state.is_on_any(LITERAL_KINDS) {
        return Err(state.error_expected_any(LITERAL_KINDS));
    }

    state.start_context(NodeKind::LiteralExpression);
    let literal = state.read_token();
    Ok(state.end_leaf(literal))
}

/// Reads a parenthesized expression.
fn read_parenthesized_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::ParenthesizedExpression,
        TokenKind::OpenParen,
        TokenKind::CloseParen,
        false,
        read_expression,
    )
}

/// Reads a `...` expression.
fn read_not_implemented_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::NotImplementedExpression);
    state.read_token_kind_as_constant(TokenKind::Ellipsis)?;
    Ok(state.end_context())
}

/// Reads a list expression; items may be ranges (`1..3`).
fn read_list_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::ListExpression,
        TokenKind::OpenBrace,
        TokenKind::CloseBrace,
        false,
        |state| read_csv_array(state, read_list_item, |s| s.is_on(TokenKind::CloseBrace)),
    )
}

/// Reads a list item: an expression or a range.
fn read_list_item(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let left = read_expression(state)?;
    if !state.is_on(TokenKind::DotDot) {
        return Ok(left);
    }

    state.start_context(NodeKind::RangeExpression);
    state.reparent_under_current_context(left);
    state.read_token_kind_as_constant(TokenKind::DotDot)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads a record expression.
fn read_record_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::RecordExpression,
        TokenKind::OpenBracket,
        TokenKind::CloseBracket,
        false,
        |state| {
            read_csv_array(
                state,
                read_generalized_identifier_paired_expression,
                |s| s.is_on(TokenKind::CloseBracket),
            )
        },
    )
}

/// Reads a field selector (`[name]`, optionally `?`-suffixed).
fn read_field_selector(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::FieldSelector,
        TokenKind::OpenBracket,
        TokenKind::CloseBracket,
        true,
        read_generalized_identifier,
    )
}

/// Reads a field projection (`[[a], [b]]`, optionally `?`-suffixed).
fn read_field_projection(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::FieldProjection,
        TokenKind::OpenBracket,
        TokenKind::CloseBracket,
        true,
        |state| {
            read_csv_array(state, read_field_selector, |s| {
                s.is_on(TokenKind::CloseBracket)
            })
        },
    )
}

/// Reads the invoke/item-access/field-access chain of a recursive primary
/// expression.
///
/// The head primary has already been sealed; the enclosing node's kind was
/// not knowable until now, so the head is re-parented under the new context
/// through the node-id map's tree surgery.
fn read_recursive_primary_expression(
    state: &mut ParserState<'_>,
    head: NodeId,
) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::RecursivePrimaryExpression);
    state.reparent_under_current_context(head);

    state.start_context(NodeKind::ArrayWrapper);
    loop {
        match state.maybe_current_kind() {
            Some(TokenKind::OpenParen) => {
                read_invoke_expression(state)?;
            }
            Some(TokenKind::OpenBrace) => {
                read_item_access_expression(state)?;
            }
            Some(TokenKind::OpenBracket) => match disambiguate::disambiguate_bracket(state)? {
                BracketDisambiguation::FieldSelection => {
                    read_field_selector(state)?;
                }
                BracketDisambiguation::FieldProjection => {
                    read_field_projection(state)?;
                }
                // A record cannot follow a primary; stop and let the caller
                // report whatever the leftover tokens break.
                BracketDisambiguation::Record => break,
            },
            _ => break,
        }
    }
    state.end_context();

    Ok(state.end_context())
}

/// Reads an invocation (`f(a, b)`).
fn read_invoke_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::InvokeExpression,
        TokenKind::OpenParen,
        TokenKind::CloseParen,
        false,
        |state| read_csv_array(state, read_expression, |s| s.is_on(TokenKind::CloseParen)),
    )
}

/// Reads an item access (`x{0}`, optionally `?`-suffixed).
fn read_item_access_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::ItemAccessExpression,
        TokenKind::OpenBrace,
        TokenKind::CloseBrace,
        true,
        read_expression,
    )
}

// ---- keyword expressions --------------------------------------------------

/// Reads an `each` expression.
fn read_each_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::EachExpression);
    state.read_token_kind_as_constant(TokenKind::EachKeyword)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads a `let` expression.
fn read_let_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::LetExpression);
    state.read_token_kind_as_constant(TokenKind::LetKeyword)?;
    read_csv_array(state, read_identifier_paired_expression, |s| {
        s.is_on(TokenKind::InKeyword)
    })?;
    state.read_token_kind_as_constant(TokenKind::InKeyword)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads an `if` expression; the `else` branch is required.
fn read_if_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::IfExpression);
    state.read_token_kind_as_constant(TokenKind::IfKeyword)?;
    read_expression(state)?;
    state.read_token_kind_as_constant(TokenKind::ThenKeyword)?;
    read_expression(state)?;
    state.read_token_kind_as_constant(TokenKind::ElseKeyword)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads an `error` raising expression.
fn read_error_raising_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::ErrorRaisingExpression);
    state.read_token_kind_as_constant(TokenKind::ErrorKeyword)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads a `try` expression with an optional `otherwise` clause.
fn read_error_handling_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::ErrorHandlingExpression);
    state.read_token_kind_as_constant(TokenKind::TryKeyword)?;
    read_expression(state)?;

    if state.is_on(TokenKind::OtherwiseKeyword) {
        state.start_context(NodeKind::OtherwiseExpression);
        state.read_token_kind_as_constant(TokenKind::OtherwiseKeyword)?;
        read_expression(state)?;
        state.end_context();
    } else {
        state.increment_attribute_counter();
    }

    Ok(state.end_context())
}

/// Reads a function expression (`(params) => body`, with an optional return
/// type after the parameter list).
fn read_function_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::FunctionExpression);
    read_parameter_list(state)?;

    if state.is_on(TokenKind::AsKeyword) {
        read_as_nullable_primitive_type(state)?;
    } else {
        state.increment_attribute_counter();
    }

    state.read_token_kind_as_constant(TokenKind::FatArrow)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads a parenthesized parameter list.
///
/// Once an `optional` parameter has been seen, every later parameter must
/// also be optional.
fn read_parameter_list(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let mut seen_optional = false;
    read_wrapped(
        state,
        NodeKind::ParameterList,
        TokenKind::OpenParen,
        TokenKind::CloseParen,
        false,
        |state| {
            read_csv_array(
                state,
                |state| read_parameter(state, &mut seen_optional),
                |s| s.is_on(TokenKind::CloseParen),
            )
        },
    )
}

/// Reads a single parameter (`optional? name (as type)?`).
fn read_parameter(
    state: &mut ParserState<'_>,
    seen_optional: &mut bool,
) -> Result<NodeId, ParseError> {
    let start = state.token_index();
    state.start_context(NodeKind::Parameter);

    let optional = maybe_read_identifier_constant(state, "optional").is_some();
    if optional {
        *seen_optional = true;
    } else if *seen_optional {
        return Err(state.error_at(ParseErrorKind::RequiredParameterAfterOptional, start));
    }

    read_identifier(state)?;

    if state.is_on(TokenKind::AsKeyword) {
        read_as_nullable_primitive_type(state)?;
    } else {
        state.increment_attribute_counter();
    }

    Ok(state.end_context())
}

/// Reads `as <nullable primitive type>` (parameter and return types).
fn read_as_nullable_primitive_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::AsNullablePrimitiveType);
    state.read_token_kind_as_constant(TokenKind::AsKeyword)?;
    read_nullable_primitive_type(state)?;
    Ok(state.end_context())
}

// ---- types ----------------------------------------------------------------

/// Reads a nullable primitive type: `nullable <primitive>` or a bare
/// primitive type.
pub(crate) fn read_nullable_primitive_type(
    state: &mut ParserState<'_>,
) -> Result<NodeId, ParseError> {
    if !is_on_identifier_text(state, "nullable") {
        return read_primitive_type(state);
    }

    state.start_context(NodeKind::NullablePrimitiveType);
    read_identifier_constant(state, "nullable")?;
    read_primitive_type(state)?;
    Ok(state.end_context())
}

/// Reads a primitive type leaf.
///
/// The allowed tokens are the `type` keyword, the `null` literal, or an
/// identifier in the closed whitelist. A non-whitelisted identifier restores
/// the state backup before reporting, so the caller can try alternatives.
fn read_primitive_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let backup = state.fast_state_backup();
    state.start_context(NodeKind::PrimitiveType);

    let literal = match state.maybe_current_kind() {
        Some(TokenKind::TypeKeyword) | Some(TokenKind::NullKeyword) => state.read_token(),
        Some(TokenKind::Ident) => {
            let index = state.token_index();
            let text = state.current_text().expect("cursor is on a token");
            if !PRIMITIVE_TYPE_NAMES.contains(&text) {
                let literal = text.to_string();
                state.apply_backup(backup);
                return Err(
                    state.error_at(ParseErrorKind::InvalidPrimitiveType { literal }, index)
                );
            }

            state.read_token()
        }
        _ => {
            state.apply_backup(backup);
            return Err(state.error_expected_any(&[
                TokenKind::TypeKeyword,
                TokenKind::NullKeyword,
                TokenKind::Ident,
            ]));
        }
    };

    Ok(state.end_leaf(literal))
}

/// Reads a type: a primary type if one parses, falling back to a primary
/// expression.
fn read_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    let backup = state.fast_state_backup();
    match read_primary_type(state) {
        Ok(node) => Ok(node),
        Err(_) => {
            state.apply_backup(backup);
            read_primary_expression(state)
        }
    }
}

/// Reads a primary type.
fn read_primary_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    match state.maybe_current_kind() {
        Some(TokenKind::OpenBracket) => read_record_type(state),
        Some(TokenKind::OpenBrace) => read_list_type(state),
        Some(TokenKind::Ident) if is_on_identifier_text(state, "table") => read_table_type(state),
        Some(TokenKind::Ident) if is_on_identifier_text(state, "function") => {
            read_function_type(state)
        }
        Some(TokenKind::Ident) if is_on_identifier_text(state, "nullable") => {
            read_nullable_type(state)
        }
        _ => read_primitive_type(state),
    }
}

/// Reads a record type (`[a = number, optional b]`).
fn read_record_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::RecordType);
    read_field_specification_list(state)?;
    Ok(state.end_context())
}

/// Reads a bracketed list of field specifications.
fn read_field_specification_list(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::FieldSpecificationList,
        TokenKind::OpenBracket,
        TokenKind::CloseBracket,
        false,
        |state| {
            read_csv_array(state, read_field_specification, |s| {
                s.is_on(TokenKind::CloseBracket)
            })
        },
    )
}

/// Reads one field specification (`optional? name (= type)?`).
fn read_field_specification(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::FieldSpecification);
    maybe_read_identifier_constant(state, "optional");
    read_generalized_identifier(state)?;

    if state.is_on(TokenKind::Equal) {
        state.start_context(NodeKind::FieldTypeSpecification);
        state.read_token_kind_as_constant(TokenKind::Equal)?;
        read_type(state)?;
        state.end_context();
    } else {
        state.increment_attribute_counter();
    }

    Ok(state.end_context())
}

/// Reads a list type (`{type}`).
fn read_list_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_wrapped(
        state,
        NodeKind::ListType,
        TokenKind::OpenBrace,
        TokenKind::CloseBrace,
        false,
        read_type,
    )
}

/// Reads a table type (`table [...]` or `table <row expression>`).
fn read_table_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::TableType);
    read_identifier_constant(state, "table")?;
    if state.is_on(TokenKind::OpenBracket) {
        read_field_specification_list(state)?;
    } else {
        read_primary_expression(state)?;
    }

    Ok(state.end_context())
}

/// Reads a function type (`function (x as number) as number`).
fn read_function_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::FunctionType);
    read_identifier_constant(state, "function")?;
    read_parameter_list(state)?;
    read_as_nullable_primitive_type(state)?;
    Ok(state.end_context())
}

/// Reads a nullable type (`nullable <type>`).
fn read_nullable_type(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::NullableType);
    read_identifier_constant(state, "nullable")?;
    read_type(state)?;
    Ok(state.end_context())
}

// ---- identifiers ----------------------------------------------------------

/// Reads a generalized identifier.
///
/// Contiguous identifier-like tokens with no whitespace between them are
/// merged; the literal is the source slice from the first token's start to
/// the last token's end. A generalized identifier consisting solely of
/// digits is consumed as its single numeric-literal token.
fn read_generalized_identifier(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    if !state.is_on_any(GENERALIZED_IDENTIFIER_KINDS) {
        return Err(state.error_expected(TokenKind::Ident));
    }

    state.start_context(NodeKind::GeneralizedIdentifier);

    let snapshot = state.snapshot();
    let first = snapshot
        .get(state.token_index())
        .expect("cursor is on a token");
    if first.kind == TokenKind::Numeric {
        let literal = state.read_token();
        return Ok(state.end_leaf(literal));
    }

    let start = first.span.start();
    let mut end = first.span.end();
    state.read_token();

    while state.is_on_any(GENERALIZED_IDENTIFIER_KINDS) {
        let token = snapshot
            .get(state.token_index())
            .expect("cursor is on a token");
        if token.span.start() != end {
            break;
        }

        end = token.span.end();
        state.read_token();
    }

    let literal = snapshot.source()[start..end].to_string();
    Ok(state.end_leaf(literal))
}

/// Reads `key = expression` with the given key reader.
fn read_key_value_pair(
    state: &mut ParserState<'_>,
    kind: NodeKind,
    read_key: Reader,
) -> Result<NodeId, ParseError> {
    state.start_context(kind);
    read_key(state)?;
    state.read_token_kind_as_constant(TokenKind::Equal)?;
    read_expression(state)?;
    Ok(state.end_context())
}

/// Reads `identifier = expression`.
fn read_identifier_paired_expression(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    read_key_value_pair(
        state,
        NodeKind::IdentifierPairedExpression,
        read_identifier,
    )
}

/// Reads `generalized-identifier = expression`.
fn read_generalized_identifier_paired_expression(
    state: &mut ParserState<'_>,
) -> Result<NodeId, ParseError> {
    read_key_value_pair(
        state,
        NodeKind::GeneralizedIdentifierPairedExpression,
        read_generalized_identifier,
    )
}

// ---- sections -------------------------------------------------------------

/// Reads a section document body.
fn read_section(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::Section);

    if state.is_on(TokenKind::OpenBracket) {
        read_record_expression(state)?;
    } else {
        state.increment_attribute_counter();
    }

    state.read_token_kind_as_constant(TokenKind::SectionKeyword)?;

    if state.is_on(TokenKind::Ident) || state.is_on(TokenKind::QuotedIdent) {
        read_identifier(state)?;
    } else {
        state.increment_attribute_counter();
    }

    state.read_token_kind_as_constant(TokenKind::Semicolon)?;

    state.start_context(NodeKind::ArrayWrapper);
    while state.maybe_current_kind().is_some() {
        read_section_member(state)?;
    }
    state.end_context();

    Ok(state.end_context())
}

/// Reads a single section member (`[attrs]? shared? name = expr;`).
fn read_section_member(state: &mut ParserState<'_>) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::SectionMember);

    if state.is_on(TokenKind::OpenBracket) {
        read_record_expression(state)?;
    } else {
        state.increment_attribute_counter();
    }

    state.maybe_read_token_kind_as_constant(TokenKind::SharedKeyword);
    read_identifier_paired_expression(state)?;
    state.read_token_kind_as_constant(TokenKind::Semicolon)?;

    Ok(state.end_context())
}

// ---- shared helpers -------------------------------------------------------

/// Reads `open content close`, with an optional trailing `?` when
/// `optional_suffix` is set.
fn read_wrapped(
    state: &mut ParserState<'_>,
    kind: NodeKind,
    open: TokenKind,
    close: TokenKind,
    optional_suffix: bool,
    content: impl FnOnce(&mut ParserState<'_>) -> Result<NodeId, ParseError>,
) -> Result<NodeId, ParseError> {
    state.start_context(kind);
    state.read_token_kind_as_constant(open)?;
    content(state)?;
    state.read_token_kind_as_constant(close)?;
    if optional_suffix {
        state.maybe_read_token_kind_as_constant(TokenKind::QuestionMark);
    }

    Ok(state.end_context())
}

/// Reads `value (, value)*` with an optional trailing comma into an
/// `ArrayWrapper` of `Csv` nodes, each recording its own comma.
fn read_csv_array(
    state: &mut ParserState<'_>,
    mut read_item: impl FnMut(&mut ParserState<'_>) -> Result<NodeId, ParseError>,
    is_done: impl Fn(&ParserState<'_>) -> bool,
) -> Result<NodeId, ParseError> {
    state.start_context(NodeKind::ArrayWrapper);
    loop {
        if is_done(state) {
            break;
        }

        state.start_context(NodeKind::Csv);
        read_item(state)?;
        let comma = state.maybe_read_token_kind_as_constant(TokenKind::Comma);
        state.end_context();

        if comma.is_none() {
            break;
        }
    }

    Ok(state.end_context())
}

/// Determines if the cursor is on an identifier with the given text.
fn is_on_identifier_text(state: &ParserState<'_>, text: &str) -> bool {
    state.is_on(TokenKind::Ident) && state.current_text() == Some(text)
}

/// Reads an identifier with the given text as a constant.
fn read_identifier_constant(state: &mut ParserState<'_>, text: &str) -> Result<NodeId, ParseError> {
    if !is_on_identifier_text(state, text) {
        return Err(state.error_expected(TokenKind::Ident));
    }

    state.start_context(NodeKind::Constant);
    let literal = state.read_token();
    Ok(state.end_leaf(literal))
}

/// Reads an identifier constant with the given text if present, reserving
/// its slot otherwise.
fn maybe_read_identifier_constant(state: &mut ParserState<'_>, text: &str) -> Option<NodeId> {
    if is_on_identifier_text(state, text) {
        Some(
            read_identifier_constant(state, text)
                .expect("cursor text was just checked"),
        )
    } else {
        state.increment_attribute_counter();
        None
    }
}
