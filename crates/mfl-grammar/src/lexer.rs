//! Module for the lexer implementation.
//!
//! The lexer produces an immutable [`TokenSnapshot`]: an indexable array of
//! tokens with absolute byte spans over the source text. The parser operates
//! on token indices into the snapshot, never on the source directly, so that
//! state backups can rewind the cursor in constant time.

use logos::Logos;

use super::Span;
use super::diagnostic::Diagnostic;

/// Represents an M formula language token.
///
/// Whitespace and comments are trivia; they are dropped while building a
/// [`TokenSnapshot`] and never reach the parser.
///
/// Note that `nullable`, `optional`, `table` and the primitive type names
/// (`any`, `number`, `text`, ...) are *not* keywords in M; they lex as
/// identifiers and are recognized by text where the grammar calls for them.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[logos(subpattern exp = r"[eE][+-]?[0-9]+")]
pub enum TokenKind {
    /// Contiguous whitespace.
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    /// A line or block comment.
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    #[regex(r"/\*([^*]|\*[^/])*\*/")]
    Comment,

    /// A numeric literal (integer, hexadecimal, or float).
    #[regex(r"[0-9]+(?&exp)?")]
    #[regex(r"[0-9]+\.[0-9]+(?&exp)?")]
    #[regex(r"\.[0-9]+(?&exp)?")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    Numeric,

    /// A text literal, with `""` as the quote escape.
    #[regex(r#""([^"]|"")*""#)]
    Text,

    /// An identifier.
    ///
    /// M identifiers admit interior dots (`Table.AddColumn` is one token).
    #[regex(r"[A-Za-z_][A-Za-z0-9._]*")]
    Ident,

    /// A quoted identifier (`#"any text"`).
    #[regex(r##"#"([^"]|"")*""##)]
    QuotedIdent,

    /// The `and` keyword.
    #[token("and")]
    AndKeyword,
    /// The `as` keyword.
    #[token("as")]
    AsKeyword,
    /// The `each` keyword.
    #[token("each")]
    EachKeyword,
    /// The `else` keyword.
    #[token("else")]
    ElseKeyword,
    /// The `error` keyword.
    #[token("error")]
    ErrorKeyword,
    /// The `false` keyword.
    #[token("false")]
    FalseKeyword,
    /// The `if` keyword.
    #[token("if")]
    IfKeyword,
    /// The `in` keyword.
    #[token("in")]
    InKeyword,
    /// The `is` keyword.
    #[token("is")]
    IsKeyword,
    /// The `let` keyword.
    #[token("let")]
    LetKeyword,
    /// The `meta` keyword.
    #[token("meta")]
    MetaKeyword,
    /// The `not` keyword.
    #[token("not")]
    NotKeyword,
    /// The `null` literal.
    #[token("null")]
    NullKeyword,
    /// The `otherwise` keyword.
    #[token("otherwise")]
    OtherwiseKeyword,
    /// The `or` keyword.
    #[token("or")]
    OrKeyword,
    /// The `section` keyword.
    #[token("section")]
    SectionKeyword,
    /// The `shared` keyword.
    #[token("shared")]
    SharedKeyword,
    /// The `then` keyword.
    #[token("then")]
    ThenKeyword,
    /// The `true` keyword.
    #[token("true")]
    TrueKeyword,
    /// The `try` keyword.
    #[token("try")]
    TryKeyword,
    /// The `type` keyword.
    #[token("type")]
    TypeKeyword,

    /// The `#binary` keyword.
    #[token("#binary")]
    HashBinaryKeyword,
    /// The `#date` keyword.
    #[token("#date")]
    HashDateKeyword,
    /// The `#datetime` keyword.
    #[token("#datetime")]
    HashDateTimeKeyword,
    /// The `#datetimezone` keyword.
    #[token("#datetimezone")]
    HashDateTimeZoneKeyword,
    /// The `#duration` keyword.
    #[token("#duration")]
    HashDurationKeyword,
    /// The `#sections` keyword.
    #[token("#sections")]
    HashSectionsKeyword,
    /// The `#shared` keyword.
    #[token("#shared")]
    HashSharedKeyword,
    /// The `#table` keyword.
    #[token("#table")]
    HashTableKeyword,
    /// The `#time` keyword.
    #[token("#time")]
    HashTimeKeyword,

    /// The `(` symbol.
    #[token("(")]
    OpenParen,
    /// The `)` symbol.
    #[token(")")]
    CloseParen,
    /// The `[` symbol.
    #[token("[")]
    OpenBracket,
    /// The `]` symbol.
    #[token("]")]
    CloseBracket,
    /// The `{` symbol.
    #[token("{")]
    OpenBrace,
    /// The `}` symbol.
    #[token("}")]
    CloseBrace,
    /// The `,` symbol.
    #[token(",")]
    Comma,
    /// The `;` symbol.
    #[token(";")]
    Semicolon,
    /// The `=` symbol (equality operator and key-value separator).
    #[token("=")]
    Equal,
    /// The `=>` symbol.
    #[token("=>")]
    FatArrow,
    /// The `?` symbol.
    #[token("?")]
    QuestionMark,
    /// The `@` symbol.
    #[token("@")]
    At,
    /// The `...` symbol.
    #[token("...")]
    Ellipsis,
    /// The `..` symbol.
    #[token("..")]
    DotDot,
    /// The `+` symbol.
    #[token("+")]
    Plus,
    /// The `-` symbol.
    #[token("-")]
    Minus,
    /// The `*` symbol.
    #[token("*")]
    Asterisk,
    /// The `/` symbol.
    #[token("/")]
    Slash,
    /// The `&` symbol.
    #[token("&")]
    Ampersand,
    /// The `<>` symbol.
    #[token("<>")]
    NotEqual,
    /// The `<` symbol.
    #[token("<")]
    Less,
    /// The `<=` symbol.
    #[token("<=")]
    LessEqual,
    /// The `>` symbol.
    #[token(">")]
    Greater,
    /// The `>=` symbol.
    #[token(">=")]
    GreaterEqual,
}

impl TokenKind {
    /// Describes the token kind for use in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::Comment => "comment",
            Self::Numeric => "numeric literal",
            Self::Text => "text literal",
            Self::Ident => "identifier",
            Self::QuotedIdent => "quoted identifier",
            Self::AndKeyword => "`and` keyword",
            Self::AsKeyword => "`as` keyword",
            Self::EachKeyword => "`each` keyword",
            Self::ElseKeyword => "`else` keyword",
            Self::ErrorKeyword => "`error` keyword",
            Self::FalseKeyword => "`false` keyword",
            Self::IfKeyword => "`if` keyword",
            Self::InKeyword => "`in` keyword",
            Self::IsKeyword => "`is` keyword",
            Self::LetKeyword => "`let` keyword",
            Self::MetaKeyword => "`meta` keyword",
            Self::NotKeyword => "`not` keyword",
            Self::NullKeyword => "`null` literal",
            Self::OtherwiseKeyword => "`otherwise` keyword",
            Self::OrKeyword => "`or` keyword",
            Self::SectionKeyword => "`section` keyword",
            Self::SharedKeyword => "`shared` keyword",
            Self::ThenKeyword => "`then` keyword",
            Self::TrueKeyword => "`true` keyword",
            Self::TryKeyword => "`try` keyword",
            Self::TypeKeyword => "`type` keyword",
            Self::HashBinaryKeyword => "`#binary` keyword",
            Self::HashDateKeyword => "`#date` keyword",
            Self::HashDateTimeKeyword => "`#datetime` keyword",
            Self::HashDateTimeZoneKeyword => "`#datetimezone` keyword",
            Self::HashDurationKeyword => "`#duration` keyword",
            Self::HashSectionsKeyword => "`#sections` keyword",
            Self::HashSharedKeyword => "`#shared` keyword",
            Self::HashTableKeyword => "`#table` keyword",
            Self::HashTimeKeyword => "`#time` keyword",
            Self::OpenParen => "`(`",
            Self::CloseParen => "`)`",
            Self::OpenBracket => "`[`",
            Self::CloseBracket => "`]`",
            Self::OpenBrace => "`{`",
            Self::CloseBrace => "`}`",
            Self::Comma => "`,`",
            Self::Semicolon => "`;`",
            Self::Equal => "`=`",
            Self::FatArrow => "`=>`",
            Self::QuestionMark => "`?`",
            Self::At => "`@`",
            Self::Ellipsis => "`...`",
            Self::DotDot => "`..`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Asterisk => "`*`",
            Self::Slash => "`/`",
            Self::Ampersand => "`&`",
            Self::NotEqual => "`<>`",
            Self::Less => "`<`",
            Self::LessEqual => "`<=`",
            Self::Greater => "`>`",
            Self::GreaterEqual => "`>=`",
        }
    }

    /// Determines if the token is trivia that is dropped from the snapshot.
    fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::Comment)
    }
}

/// Represents a single token in a [`TokenSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The kind of the token.
    pub kind: TokenKind,
    /// The byte span of the token in the source.
    pub span: Span,
}

/// A human-readable position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// The absolute byte offset.
    pub offset: usize,
    /// The 1-based line number.
    pub line: usize,
    /// The 0-based byte column within the line.
    pub column: usize,
}

/// An error produced while building a token snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// The span of the unrecognized source.
    span: Span,
}

impl LexError {
    /// Gets the span of the unrecognized source.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Converts the error to a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error("an unknown token was encountered")
            .with_label("this is not a supported M token", self.span)
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown token at {span}", span = self.span)
    }
}

impl std::error::Error for LexError {}

/// An immutable, indexable array of non-trivia tokens over a source string.
///
/// Token indices are used as token identity throughout the parser; the
/// snapshot is never mutated after construction and may be shared by any
/// number of readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot<'a> {
    /// The source text the snapshot was lexed from.
    source: &'a str,
    /// The non-trivia tokens, in source order.
    tokens: Vec<Token>,
    /// Byte offsets of the start of each line, for position lookups.
    line_starts: Vec<usize>,
}

impl<'a> TokenSnapshot<'a> {
    /// Lexes the given source into a token snapshot.
    ///
    /// Trivia (whitespace and comments) is dropped. An unrecognized character
    /// sequence fails the entire snapshot.
    pub fn lex(source: &'a str) -> Result<Self, LexError> {
        let mut tokens = Vec::new();
        let mut lexer = TokenKind::lexer(source);
        while let Some(result) = lexer.next() {
            let span = Span::from(lexer.span());
            match result {
                Ok(kind) if kind.is_trivia() => {}
                Ok(kind) => tokens.push(Token { kind, span }),
                Err(()) => return Err(LexError { span }),
            }
        }

        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == b'\n').then_some(i + 1)),
        );

        Ok(Self {
            source,
            tokens,
            line_starts,
        })
    }

    /// Gets the source text of the snapshot.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Gets the number of tokens in the snapshot.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Determines if the snapshot contains no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Gets the token at the given index.
    pub fn get(&self, index: usize) -> Option<Token> {
        self.tokens.get(index).copied()
    }

    /// Gets the raw source text of the given token.
    pub fn text(&self, token: Token) -> &'a str {
        &self.source[token.span.start()..token.span.end()]
    }

    /// Gets the raw source text of the token at the given index.
    pub fn text_at(&self, index: usize) -> Option<&'a str> {
        self.get(index).map(|t| self.text(t))
    }

    /// Gets the human-readable start position of the token at the given index.
    ///
    /// An index one past the last token resolves to the end of the source,
    /// which is where end-of-input errors point.
    pub fn position_start(&self, index: usize) -> Position {
        let offset = self
            .get(index)
            .map(|t| t.span.start())
            .unwrap_or(self.source.len());
        self.position_of(offset)
    }

    /// Gets the human-readable end position of the token at the given index.
    pub fn position_end(&self, index: usize) -> Position {
        let offset = self
            .get(index)
            .map(|t| t.span.end())
            .unwrap_or(self.source.len());
        self.position_of(offset)
    }

    /// Resolves an absolute byte offset to a position.
    fn position_of(&self, offset: usize) -> Position {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };

        Position {
            offset,
            line: line_index + 1,
            column: offset - self.line_starts[line_index],
        }
    }
}
