//! Message-handler protocol.
//!
//! The user can supply a Lua file that evaluates to a callable; it is
//! invoked as `handler(message, …)` at fixed points of a session:
//!
//! - `("init", paths)` before any processing; `paths` is a mutable array.
//! - `("beforemeta", path, env)` with the per-file environment.
//! - `("aftermeta", path, lua)` which may return a replacement string.
//! - `("filedone", path, outputPath)` after a file is written.
//!
//! The handler lives in the same Lua state as the environments it is
//! handed, so it can install helpers or collect data across files.

use std::path::Path;

use mlua::{Function, Table, Value};

use crate::runtime::{RunError, Runtime};

impl Runtime {
    /// Load a handler file. It must evaluate to a callable.
    pub fn load_handler(&mut self, path: &Path) -> Result<(), RunError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| RunError::HandlerLoad(format!("Could not read handler file. ({})", e)))?;
        let func: Function = self
            .lua
            .load(&source)
            .set_name(format!("@{}", path.display()))
            .eval()
            .map_err(|e| {
                RunError::HandlerLoad(format!(
                    "Handler must evaluate to a callable. ({})",
                    e
                ))
            })?;
        self.handler = Some(self.lua.create_registry_value(func)?);
        Ok(())
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    fn handler_fn(&self) -> Result<Option<Function<'_>>, RunError> {
        match &self.handler {
            None => Ok(None),
            Some(key) => Ok(Some(self.lua.registry_value(key)?)),
        }
    }

    /// Send `("init", paths)`; the handler may add or remove entries.
    pub fn handler_init(&self, paths: Vec<String>) -> Result<Vec<String>, RunError> {
        let Some(func) = self.handler_fn()? else {
            return Ok(paths);
        };
        let list = self.lua.create_table()?;
        for (i, path) in paths.iter().enumerate() {
            list.set(i + 1, path.as_str())?;
        }
        func.call::<_, ()>(("init", list.clone()))
            .map_err(|e| RunError::Handler(e.to_string()))?;
        let mut rewritten = Vec::new();
        for value in list.sequence_values::<String>() {
            rewritten.push(value?);
        }
        Ok(rewritten)
    }

    /// Send `("beforemeta", path, env)`.
    pub fn handler_before_meta(&self, path: &str, env: &Table<'_>) -> Result<(), RunError> {
        let Some(func) = self.handler_fn()? else {
            return Ok(());
        };
        func.call::<_, ()>(("beforemeta", path, env.clone()))
            .map_err(|e| RunError::Handler(e.to_string()))
    }

    /// Send `("aftermeta", path, lua)`; a string return replaces the
    /// output, nil keeps it, anything else is an error.
    pub fn handler_after_meta(&self, path: &str, lua: &str) -> Result<Option<String>, RunError> {
        let Some(func) = self.handler_fn()? else {
            return Ok(None);
        };
        let returned: mlua::MultiValue = func
            .call(("aftermeta", path, lua))
            .map_err(|e| RunError::Handler(e.to_string()))?;
        match returned.into_iter().next() {
            None | Some(Value::Nil) => Ok(None),
            Some(Value::String(replacement)) => Ok(Some(
                String::from_utf8_lossy(replacement.as_bytes()).into_owned(),
            )),
            Some(other) => Err(RunError::Handler(format!(
                "Handler returned a non-string value from 'aftermeta' message. (Got a {})",
                other.type_name()
            ))),
        }
    }

    /// Send `("filedone", path, outputPath)`.
    pub fn handler_file_done(&self, path: &str, output_path: &str) -> Result<(), RunError> {
        let Some(func) = self.handler_fn()? else {
            return Ok(());
        };
        func.call::<_, ()>(("filedone", path, output_path))
            .map_err(|e| RunError::Handler(e.to_string()))
    }
}
