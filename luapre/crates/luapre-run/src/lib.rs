//! luapre-run - The host-runtime collaborator.
//!
//! Everything that touches the embedded Lua interpreter lives here: the
//! per-file metaprogram environment with its `outputLua`/`outputValue`
//! sinks and helper functions, the compile probes used to classify meta
//! blocks and to validate final output, the value serializer behind
//! `outputValue`, and the message-handler protocol.
//!
//! The rest of the pipeline sees this crate through narrow seams: the
//! transpiler through the `ExprChecker` trait, the driver through
//! [`Runtime`]'s methods. Any Lua interpreter exposing the same sink API
//! would satisfy those contracts; this implementation embeds Lua 5.4 via
//! `mlua`.
//!
//! One Lua state serves a whole session. Per-file isolation comes from the
//! environment table, rebuilt for every file as a shallow copy of a
//! baseline (standard globals plus helpers), so whatever a file's
//! metaprogram does to its globals is gone when the next file starts.

mod handler;
mod runtime;
mod serialize;

pub use runtime::{RunError, Runtime};
pub use serialize::{serialize, SerializeError};
