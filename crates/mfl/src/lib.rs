//! M formula language document parsing and analysis.

#[cfg(feature = "analysis")]
#[doc(inline)]
pub use mfl_analysis as analysis;
#[cfg(feature = "grammar")]
#[doc(inline)]
pub use mfl_grammar as grammar;
