//! luapre-meta - Metaprogram transpiler.
//!
//! The second phase of the pipeline. It consumes the token vector produced
//! by `luapre-lex` and emits the *metaprogram*: a pure Lua script which,
//! when executed, reconstructs the preprocessed output by calling two sink
//! functions. Ordinary source text becomes `outputLua"…"` calls carrying
//! the exact original bytes; metacode becomes plain Lua interleaved between
//! them.
//!
//! Four constructs are recognized:
//!
//! | Construct | Form | Becomes |
//! |---|---|---|
//! | Meta line | `!<stmt>` at line start | `<stmt>` |
//! | Statement block | `!( <stmts> )` | `<stmts>` |
//! | Inline value | `!( <expr> )` | `outputValue(<expr>)` |
//! | Inline code | `!!( <expr> )` | `outputLua(<expr>)` |
//!
//! Telling a statement block from an inline value requires asking the host
//! whether `return(<body>)` compiles; that probe is the [`ExprChecker`]
//! trait, implemented by the runtime crate. The transpiler itself never
//! links the interpreter.
//!
//! All failures are structured [`TranspileError`] values carrying a byte
//! position; the caller renders them.

mod transpile;

pub use transpile::{transpile, ExprChecker, Options, TranspileError};
