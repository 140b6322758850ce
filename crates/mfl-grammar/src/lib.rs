//! A parser for M formula language documents.
//!
//! The crate lexes a source string into an immutable [`TokenSnapshot`],
//! parses it by recursive descent into a typed syntax tree indexed by a
//! [`NodeIdMap`], and keeps a parallel context tree of in-progress
//! productions so that tooling can inspect partial parses after an error.
//!
//! The entry point is [`try_parse`]:
//!
//! ```rust
//! use mfl_grammar::ParseSettings;
//! use mfl_grammar::TokenSnapshot;
//!
//! let snapshot = TokenSnapshot::lex("if 1 then 2 else 3").expect("should lex");
//! let parse = mfl_grammar::try_parse(&ParseSettings::default(), &snapshot).expect("should parse");
//! let root = parse.node_map.ast_node(parse.root).expect("root should exist");
//! assert_eq!(root.kind, mfl_grammar::NodeKind::IfExpression);
//! ```

mod diagnostic;
pub mod disambiguate;
mod error;
pub mod grammar;
pub mod lexer;
mod locale;
mod node;
pub mod node_map;
pub mod state;
mod syntax;

pub use diagnostic::Diagnostic;
pub use diagnostic::Label;
pub use diagnostic::Severity;
pub use diagnostic::Span;
pub use error::ParseError;
pub use error::ParseErrorKind;
pub use error::ParseErrorState;
pub use grammar::Parse;
pub use grammar::try_parse;
pub use lexer::LexError;
pub use lexer::Position;
pub use lexer::Token;
pub use lexer::TokenKind;
pub use lexer::TokenSnapshot;
pub use locale::Locale;
pub use locale::ParseSettings;
pub use node::AstNode;
pub use node::ContextNode;
pub use node::NodeId;
pub use node::TokenRange;
pub use node::XorNode;
pub use node_map::NodeIdMap;
pub use syntax::NodeKind;
