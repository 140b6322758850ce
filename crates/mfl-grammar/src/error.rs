//! Module for parser errors.

use std::fmt;

use crate::Span;
use crate::diagnostic::Diagnostic;
use crate::lexer::Position;
use crate::lexer::TokenKind;
use crate::locale::Locale;
use crate::locale::Template;
use crate::node::NodeId;
use crate::node_map::NodeIdMap;

/// The category of a parser error.
///
/// Invariant violations ("should never happen") are not represented here;
/// they panic and are surfaced unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The parser expected a particular token kind.
    ExpectedTokenKind {
        /// The expected token kind.
        expected: TokenKind,
        /// The found token kind, or `None` at end of input.
        found: Option<TokenKind>,
    },
    /// The parser expected any of several token kinds.
    ExpectedAnyTokenKind {
        /// The expected token kinds.
        expected: &'static [TokenKind],
        /// The found token kind, or `None` at end of input.
        found: Option<TokenKind>,
    },
    /// An identifier was read where a primitive type name was required.
    InvalidPrimitiveType {
        /// The offending identifier text.
        literal: String,
    },
    /// The document parsed successfully but tokens remain.
    UnusedTokensRemain,
    /// The parenthesis disambiguator reached end of input.
    UnterminatedParentheses,
    /// The bracket disambiguator reached end of input.
    UnterminatedBracket,
    /// A required parameter followed an optional parameter.
    RequiredParameterAfterOptional,
}

/// The context tree at the point of failure.
///
/// Productions that were open when the parse failed survive here as context
/// nodes, so tooling can inspect partial parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrorState {
    /// The node-id map as it stood at failure.
    pub node_map: NodeIdMap,
    /// The root of the partial tree, if any production had opened.
    pub maybe_root: Option<NodeId>,
}

/// An error produced while parsing a token snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The category of the error.
    kind: ParseErrorKind,
    /// The index of the token at which the parse failed.
    ///
    /// For end-of-input errors this is one past the last token.
    token_index: usize,
    /// The human-readable position of the failure.
    position: Position,
    /// The source span of the failure token, empty at end of input.
    span: Span,
    /// The context tree at failure, attached by the document driver.
    state: Option<Box<ParseErrorState>>,
}

impl ParseError {
    /// Creates a new parse error at the given token.
    pub(crate) fn new(kind: ParseErrorKind, token_index: usize, position: Position, span: Span) -> Self {
        Self {
            kind,
            token_index,
            position,
            span,
            state: None,
        }
    }

    /// Attaches the context tree at failure.
    pub(crate) fn with_state(mut self, state: ParseErrorState) -> Self {
        self.state = Some(Box::new(state));
        self
    }

    /// Gets the category of the error.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the index of the token at which the parse failed.
    ///
    /// This is also the count of tokens consumed before failing, which the
    /// document driver uses to rank competing errors.
    pub fn token_index(&self) -> usize {
        self.token_index
    }

    /// Gets the human-readable position of the failure.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Gets the source span of the failure token.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Gets the context tree at failure, if one was attached.
    pub fn state(&self) -> Option<&ParseErrorState> {
        self.state.as_deref()
    }

    /// Renders the error message using the given locale's templates.
    pub fn message(&self, locale: Locale) -> String {
        /// Describes a found token, or end of input.
        fn found(kind: Option<TokenKind>) -> &'static str {
            kind.map(|k| k.describe()).unwrap_or("end of input")
        }

        match &self.kind {
            ParseErrorKind::ExpectedTokenKind {
                expected,
                found: f,
            } => locale
                .template(Template::ExpectedTokenKind)
                .replace("{expected}", expected.describe())
                .replace("{found}", found(*f)),
            ParseErrorKind::ExpectedAnyTokenKind {
                expected,
                found: f,
            } => {
                let mut list = String::new();
                for (i, kind) in expected.iter().enumerate() {
                    if i > 0 {
                        if expected.len() == 2 {
                            list.push_str(" or ");
                        } else if i == expected.len() - 1 {
                            list.push_str(", or ");
                        } else {
                            list.push_str(", ");
                        }
                    }

                    list.push_str(kind.describe());
                }

                locale
                    .template(Template::ExpectedAnyTokenKind)
                    .replace("{expected}", &list)
                    .replace("{found}", found(*f))
            }
            ParseErrorKind::InvalidPrimitiveType { literal } => locale
                .template(Template::InvalidPrimitiveType)
                .replace("{literal}", literal),
            ParseErrorKind::UnusedTokensRemain => {
                locale.template(Template::UnusedTokensRemain).to_string()
            }
            ParseErrorKind::UnterminatedParentheses => locale
                .template(Template::UnterminatedParentheses)
                .to_string(),
            ParseErrorKind::UnterminatedBracket => {
                locale.template(Template::UnterminatedBracket).to_string()
            }
            ParseErrorKind::RequiredParameterAfterOptional => locale
                .template(Template::RequiredParameterAfterOptional)
                .to_string(),
        }
    }

    /// Converts the error to a diagnostic using the given locale.
    pub fn to_diagnostic(&self, locale: Locale) -> Diagnostic {
        Diagnostic::error(self.message(locale)).with_label(
            format!(
                "at line {line}, column {column}",
                line = self.position.line,
                column = self.position.column
            ),
            self.span,
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{message} at line {line}, column {column}",
            message = self.message(Locale::default()),
            line = self.position.line,
            column = self.position.column
        )
    }
}

impl std::error::Error for ParseError {}
