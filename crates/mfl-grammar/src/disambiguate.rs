//! Module for bracket and parenthesis disambiguation.
//!
//! An opening `(` may begin a function expression head or a parenthesized
//! expression; an opening `[` may begin a record, a field selection, or a
//! field projection. Both procedures scan ahead through the token snapshot
//! and report which production to read. The parser cursor is untouched on
//! every return path; the only state mutation is bracketed by a
//! backup/restore pair.

use crate::error::ParseError;
use crate::error::ParseErrorKind;
use crate::grammar;
use crate::lexer::TokenKind;
use crate::state::ParserState;

/// The production selected for an opening parenthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParenthesisDisambiguation {
    /// The group is a function expression head (`(params) => ...`).
    FunctionExpression,
    /// The group is a parenthesized expression.
    ParenthesizedExpression,
}

/// The production selected for an opening bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketDisambiguation {
    /// The bracket opens a field projection (`[[a], [b]]`).
    FieldProjection,
    /// The bracket opens a field selection (`[a]`).
    FieldSelection,
    /// The bracket opens a record (`[a = 1]`).
    Record,
}

/// Decides between a function expression and a parenthesized expression.
///
/// The cursor must be on `(`. The scan matches balanced parentheses; when
/// the matching `)` is found, the group is a function head if the next token
/// is `=>`, or if it is `as` followed by a nullable primitive type followed
/// by `=>` (a function return type).
pub fn disambiguate_parenthesis(state: &mut ParserState<'_>) -> Result<ParenthesisDisambiguation, ParseError> {
    debug_assert!(state.is_on(TokenKind::OpenParen));

    let mut depth = 0usize;
    let mut index = state.token_index();
    while let Some(kind) = state.kind_at(index) {
        match kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(after_close_paren(state, index + 1));
                }
            }
            _ => {}
        }

        index += 1;
    }

    Err(state.error_at(
        ParseErrorKind::UnterminatedParentheses,
        state.snapshot().len(),
    ))
}

/// Classifies the group from the token following its closing parenthesis.
fn after_close_paren(state: &mut ParserState<'_>, index: usize) -> ParenthesisDisambiguation {
    match state.kind_at(index) {
        Some(TokenKind::FatArrow) => ParenthesisDisambiguation::FunctionExpression,
        Some(TokenKind::AsKeyword) => {
            // A function return type: consume `as <nullable primitive type>`
            // under a backup and test for `=>` after it. A failed type read
            // is caught here; the group is then an ordinary parenthesized
            // expression.
            let backup = state.fast_state_backup();
            state.unsafe_move_to(index + 1);
            let result = match grammar::read_nullable_primitive_type(state) {
                Ok(_) => state.is_on(TokenKind::FatArrow),
                Err(_) => false,
            };
            state.apply_backup(backup);

            if result {
                ParenthesisDisambiguation::FunctionExpression
            } else {
                ParenthesisDisambiguation::ParenthesizedExpression
            }
        }
        _ => ParenthesisDisambiguation::ParenthesizedExpression,
    }
}

/// Decides among record, field selection, and field projection.
///
/// The cursor must be on `[`. If the next token is `[` the bracket opens a
/// projection; if it is `]` the bracket opens an empty record; otherwise the
/// scan runs until `=` (record) or `]` (field selection).
pub fn disambiguate_bracket(state: &ParserState<'_>) -> Result<BracketDisambiguation, ParseError> {
    debug_assert!(state.is_on(TokenKind::OpenBracket));

    let mut index = state.token_index() + 1;
    match state.kind_at(index) {
        Some(TokenKind::OpenBracket) => return Ok(BracketDisambiguation::FieldProjection),
        Some(TokenKind::CloseBracket) => return Ok(BracketDisambiguation::Record),
        _ => {}
    }

    while let Some(kind) = state.kind_at(index) {
        match kind {
            TokenKind::Equal => return Ok(BracketDisambiguation::Record),
            TokenKind::CloseBracket => return Ok(BracketDisambiguation::FieldSelection),
            _ => index += 1,
        }
    }

    Err(state.error_at(ParseErrorKind::UnterminatedBracket, state.snapshot().len()))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::TokenSnapshot;
    use crate::locale::ParseSettings;

    fn paren(source: &str) -> Result<ParenthesisDisambiguation, ParseError> {
        let snapshot = TokenSnapshot::lex(source).expect("source should lex");
        let mut state = ParserState::new(ParseSettings::default(), &snapshot);
        let before = state.token_index();
        let result = disambiguate_parenthesis(&mut state);
        assert_eq!(state.token_index(), before, "cursor must be untouched");
        result
    }

    fn bracket(source: &str) -> Result<BracketDisambiguation, ParseError> {
        let snapshot = TokenSnapshot::lex(source).expect("source should lex");
        let state = ParserState::new(ParseSettings::default(), &snapshot);
        disambiguate_bracket(&state)
    }

    #[test]
    fn parenthesis_function_head() {
        assert_eq!(
            paren("(x) => x").unwrap(),
            ParenthesisDisambiguation::FunctionExpression
        );
        assert_eq!(
            paren("(x as number, y) => x").unwrap(),
            ParenthesisDisambiguation::FunctionExpression
        );
        assert_eq!(
            paren("(x) as nullable number => x").unwrap(),
            ParenthesisDisambiguation::FunctionExpression
        );
    }

    #[test]
    fn parenthesis_grouping() {
        assert_eq!(
            paren("(x + 1)").unwrap(),
            ParenthesisDisambiguation::ParenthesizedExpression
        );
        // Nested parentheses must not confuse the depth tracking.
        assert_eq!(
            paren("((x) => x)(1)").unwrap(),
            ParenthesisDisambiguation::ParenthesizedExpression
        );
        // `as` without a trailing `=>` is an as-expression, not a return type.
        assert_eq!(
            paren("(x) as number").unwrap(),
            ParenthesisDisambiguation::ParenthesizedExpression
        );
    }

    #[test]
    fn parenthesis_unterminated() {
        let error = paren("(x + (y)").unwrap_err();
        assert_eq!(error.kind(), &ParseErrorKind::UnterminatedParentheses);
    }

    #[test]
    fn bracket_variants() {
        assert_eq!(bracket("[a = 1]").unwrap(), BracketDisambiguation::Record);
        assert_eq!(bracket("[]").unwrap(), BracketDisambiguation::Record);
        assert_eq!(bracket("[a]").unwrap(), BracketDisambiguation::FieldSelection);
        assert_eq!(
            bracket("[[a], [b]]").unwrap(),
            BracketDisambiguation::FieldProjection
        );
    }

    #[test]
    fn bracket_unterminated() {
        let error = bracket("[a").unwrap_err();
        assert_eq!(error.kind(), &ParseErrorKind::UnterminatedBracket);
    }
}
