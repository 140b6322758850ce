//! Module for parse settings and localized message templates.

/// A locale with a message-template table.
///
/// Each template uses `{placeholder}` markers that are substituted when a
/// diagnostic is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    /// United States English.
    #[default]
    EnUs,
}

/// The message-template keys understood by every locale table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Template {
    /// Expected a particular token kind; placeholders `{expected}`, `{found}`.
    ExpectedTokenKind,
    /// Expected one of several token kinds; placeholders `{expected}`,
    /// `{found}`.
    ExpectedAnyTokenKind,
    /// An identifier is not a primitive type; placeholder `{literal}`.
    InvalidPrimitiveType,
    /// The document parsed but tokens remain.
    UnusedTokensRemain,
    /// A parenthesis scan reached the end of input.
    UnterminatedParentheses,
    /// A bracket scan reached the end of input.
    UnterminatedBracket,
    /// A required parameter followed an optional one.
    RequiredParameterAfterOptional,
}

impl Locale {
    /// Looks up the template text for the given key.
    pub(crate) fn template(&self, key: Template) -> &'static str {
        match self {
            Self::EnUs => match key {
                Template::ExpectedTokenKind => "expected {expected}, but found {found}",
                Template::ExpectedAnyTokenKind => "expected {expected}, but found {found}",
                Template::InvalidPrimitiveType => "`{literal}` is not a primitive type",
                Template::UnusedTokensRemain => {
                    "the document ended, but unused tokens remain"
                }
                Template::UnterminatedParentheses => {
                    "an unterminated parenthesis was encountered"
                }
                Template::UnterminatedBracket => "an unterminated bracket was encountered",
                Template::RequiredParameterAfterOptional => {
                    "a required parameter cannot follow an optional parameter"
                }
            },
        }
    }
}

/// Settings shared by parsing and inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSettings {
    /// The locale used to render messages.
    pub locale: Locale,
}
