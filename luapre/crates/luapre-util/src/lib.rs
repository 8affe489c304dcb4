//! luapre-util - Foundation types shared by every phase of the preprocessor.
//!
//! This crate is the leaf of the workspace dependency graph. It provides:
//!
//! - The diagnostic types ([`Diagnostic`], [`SourceSnippet`], [`Agent`])
//!   used to report fatal errors in the `Error @ file:line:col` format,
//!   with a caret-underlined source excerpt where a byte offset is known.
//! - Lua text helpers ([`lua`]): the reserved-word table, the
//!   bare-identifier test, string-literal quoting, and number formatting.
//!   Both the transpiler (quoting verbatim chunks) and the value serializer
//!   (quoting string values) go through the same quoting routine so the
//!   two agree byte-for-byte on escape conventions.
//!
//! Nothing in this crate touches the filesystem or the Lua runtime, and
//! nothing here exits the process; errors are plain values all the way up
//! to the driver binary.

pub mod diagnostic;
pub mod lua;

pub use diagnostic::{Agent, Diagnostic, Location, SourceSnippet};
