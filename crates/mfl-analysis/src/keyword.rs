//! Implementation of keyword autocomplete.
//!
//! Suggestions are computed from a parse outcome: a successful parse whose
//! rightmost leaf is an identifier under the cursor suggests the keywords it
//! could still become; a failed parse suggests the keywords the parser was
//! expecting at the failure point.

use mfl_grammar::NodeKind;
use mfl_grammar::Parse;
use mfl_grammar::ParseError;
use mfl_grammar::ParseErrorKind;
use mfl_grammar::TokenKind;
use mfl_grammar::TokenSnapshot;
use strum::VariantArray;

/// A keyword of the M formula language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, VariantArray)]
pub enum Keyword {
    /// The `and` keyword.
    And,
    /// The `as` keyword.
    As,
    /// The `each` keyword.
    Each,
    /// The `else` keyword.
    Else,
    /// The `error` keyword.
    Error,
    /// The `false` keyword.
    False,
    /// The `if` keyword.
    If,
    /// The `in` keyword.
    In,
    /// The `is` keyword.
    Is,
    /// The `let` keyword.
    Let,
    /// The `meta` keyword.
    Meta,
    /// The `not` keyword.
    Not,
    /// The `null` literal keyword.
    Null,
    /// The `otherwise` keyword.
    Otherwise,
    /// The `or` keyword.
    Or,
    /// The `section` keyword.
    Section,
    /// The `shared` keyword.
    Shared,
    /// The `then` keyword.
    Then,
    /// The `true` keyword.
    True,
    /// The `try` keyword.
    Try,
    /// The `type` keyword.
    Type,
}

impl Keyword {
    /// Gets the keyword's source text.
    pub fn text(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::As => "as",
            Self::Each => "each",
            Self::Else => "else",
            Self::Error => "error",
            Self::False => "false",
            Self::If => "if",
            Self::In => "in",
            Self::Is => "is",
            Self::Let => "let",
            Self::Meta => "meta",
            Self::Not => "not",
            Self::Null => "null",
            Self::Otherwise => "otherwise",
            Self::Or => "or",
            Self::Section => "section",
            Self::Shared => "shared",
            Self::Then => "then",
            Self::True => "true",
            Self::Try => "try",
            Self::Type => "type",
        }
    }

    /// Resolves the keyword a token kind lexes from, if any.
    fn from_token_kind(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::AndKeyword => Some(Self::And),
            TokenKind::AsKeyword => Some(Self::As),
            TokenKind::EachKeyword => Some(Self::Each),
            TokenKind::ElseKeyword => Some(Self::Else),
            TokenKind::ErrorKeyword => Some(Self::Error),
            TokenKind::FalseKeyword => Some(Self::False),
            TokenKind::IfKeyword => Some(Self::If),
            TokenKind::InKeyword => Some(Self::In),
            TokenKind::IsKeyword => Some(Self::Is),
            TokenKind::LetKeyword => Some(Self::Let),
            TokenKind::MetaKeyword => Some(Self::Meta),
            TokenKind::NotKeyword => Some(Self::Not),
            TokenKind::NullKeyword => Some(Self::Null),
            TokenKind::OtherwiseKeyword => Some(Self::Otherwise),
            TokenKind::OrKeyword => Some(Self::Or),
            TokenKind::SectionKeyword => Some(Self::Section),
            TokenKind::SharedKeyword => Some(Self::Shared),
            TokenKind::ThenKeyword => Some(Self::Then),
            TokenKind::TrueKeyword => Some(Self::True),
            TokenKind::TryKeyword => Some(Self::Try),
            TokenKind::TypeKeyword => Some(Self::Type),
            _ => None,
        }
    }
}

/// The keywords that can begin an expression or document.
const EXPRESSION_START_KEYWORDS: &[Keyword] = &[
    Keyword::Each,
    Keyword::Error,
    Keyword::False,
    Keyword::If,
    Keyword::Let,
    Keyword::Not,
    Keyword::Null,
    Keyword::Section,
    Keyword::True,
    Keyword::Try,
    Keyword::Type,
];

/// Computes keyword suggestions for a cursor at the end of the source.
pub fn autocomplete_keywords(
    snapshot: &TokenSnapshot<'_>,
    outcome: &Result<Parse, ParseError>,
) -> Vec<Keyword> {
    match outcome {
        Ok(parse) => autocomplete_from_parse(snapshot, parse),
        Err(error) => autocomplete_from_error(snapshot, error),
    }
}

/// Suggests keywords that a trailing identifier could still become.
fn autocomplete_from_parse(snapshot: &TokenSnapshot<'_>, parse: &Parse) -> Vec<Keyword> {
    let Some(leaf_id) = parse.node_map.maybe_rightmost_leaf() else {
        return Vec::new();
    };
    debug_assert!(parse.leaf_node_ids.contains(&leaf_id));

    let leaf = parse
        .node_map
        .ast_node(leaf_id)
        .expect("rightmost leaf should exist");
    if leaf.kind != NodeKind::Identifier || leaf.token_range.end != snapshot.len() {
        return Vec::new();
    }

    let text = leaf.literal.as_deref().expect("leaves carry a literal");
    EXPRESSION_START_KEYWORDS
        .iter()
        .copied()
        .filter(|k| k.text() != text && k.text().starts_with(text))
        .collect()
}

/// Suggests the keywords the parser was expecting at the failure point,
/// filtered by the partial identifier under the cursor when there is one.
fn autocomplete_from_error(snapshot: &TokenSnapshot<'_>, error: &ParseError) -> Vec<Keyword> {
    let expected: Vec<Keyword> = match error.kind() {
        ParseErrorKind::ExpectedTokenKind { expected, .. } => {
            Keyword::from_token_kind(*expected).into_iter().collect()
        }
        ParseErrorKind::ExpectedAnyTokenKind { expected, .. } => expected
            .iter()
            .filter_map(|k| Keyword::from_token_kind(*k))
            .collect(),
        _ => return Vec::new(),
    };

    // A trailing partial identifier narrows the suggestions by prefix.
    let is_last_token = error.token_index() + 1 == snapshot.len();
    let partial = snapshot
        .get(error.token_index())
        .filter(|t| is_last_token && t.kind == TokenKind::Ident)
        .map(|t| snapshot.text(t));

    match partial {
        Some(prefix) => expected
            .into_iter()
            .filter(|k| k.text() != prefix && k.text().starts_with(prefix))
            .collect(),
        None => expected,
    }
}
