//! The embedded Lua state and the metaprogram environment.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::{Function, Lua, RegistryKey, Table, Value};
use thiserror::Error;

use crate::serialize::serialize;

/// Registry slot holding the environment of the currently executing file,
/// so the `run` helper can load further files into the same environment.
const CURRENT_ENV: &str = "luapre.current_env";

/// A failure in the runtime layer.
#[derive(Error, Debug)]
pub enum RunError {
    /// The handler file could not be read or did not evaluate to a
    /// callable.
    #[error("{0}")]
    HandlerLoad(String),

    /// A handler invocation failed or returned something invalid.
    #[error("{0}")]
    Handler(String),

    /// The metaprogram raised at runtime. The payload is the raw Lua
    /// error text, which carries the chunk name and line.
    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    Lua(#[from] mlua::Error),
}

/// The host runtime collaborator.
///
/// Owns one Lua state for the whole session. Each processed file gets a
/// fresh environment table (a shallow copy of the baseline built at
/// startup), executes its metaprogram in it, and leaves no trace for the
/// next file. The output buffer the sinks append to is owned here and
/// drained per execution.
pub struct Runtime {
    pub(crate) lua: Lua,
    buffer: Rc<RefCell<String>>,
    baseline: RegistryKey,
    pub(crate) handler: Option<RegistryKey>,
    debug: bool,
}

impl Runtime {
    /// Create the runtime and build the baseline environment.
    ///
    /// The baseline is a copy of the standard globals plus the documented
    /// helpers: the `outputLua`/`outputValue` sinks, `printf`,
    /// `fileExists`, `getFileContents`, `toLua` and `run`.
    pub fn new(debug: bool) -> Result<Self, RunError> {
        let lua = Lua::new();
        let buffer = Rc::new(RefCell::new(String::new()));

        let baseline_key = {
            let baseline = lua.create_table()?;
            for pair in lua.globals().pairs::<Value, Value>() {
                let (key, value) = pair?;
                baseline.set(key, value)?;
            }

            let printf: Function = lua
                .load("return function(...) io.write(string.format(...)) end")
                .eval()?;
            baseline.set("printf", printf)?;

            let file_exists =
                lua.create_function(|_, path: String| Ok(Path::new(&path).is_file()))?;
            baseline.set("fileExists", file_exists)?;

            let get_file_contents =
                lua.create_function(|_, path: String| match std::fs::read_to_string(&path) {
                    Ok(contents) => Ok((Some(contents), None)),
                    Err(err) => Ok((None, Some(err.to_string()))),
                })?;
            baseline.set("getFileContents", get_file_contents)?;

            let to_lua = lua.create_function(move |_, value: Value| {
                serialize(&value, debug).map_err(|e| mlua::Error::RuntimeError(e.to_string()))
            })?;
            baseline.set("toLua", to_lua)?;

            let sink_buffer = Rc::clone(&buffer);
            let output_lua = lua.create_function(move |_, text: mlua::String| {
                sink_buffer
                    .borrow_mut()
                    .push_str(&String::from_utf8_lossy(text.as_bytes()));
                Ok(())
            })?;
            baseline.set("outputLua", output_lua)?;

            // Serializes any representable value, including nil: an inline
            // `!(f())` whose call returns nothing writes the text `nil`.
            let sink_buffer = Rc::clone(&buffer);
            let output_value = lua.create_function(move |_, value: Value| {
                let rendered = serialize(&value, debug)
                    .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                sink_buffer.borrow_mut().push_str(&rendered);
                Ok(())
            })?;
            baseline.set("outputValue", output_value)?;

            let run = lua.create_function(|lua, path: String| {
                let env: Table = lua.named_registry_value(CURRENT_ENV)?;
                let source = std::fs::read_to_string(&path).map_err(|err| {
                    mlua::Error::RuntimeError(format!("could not read '{}': {}", path, err))
                })?;
                lua.load(&source)
                    .set_name(format!("@{}", path))
                    .set_environment(env)
                    .exec()
            })?;
            baseline.set("run", run)?;

            lua.create_registry_value(baseline)?
        };

        Ok(Self {
            lua,
            buffer,
            baseline: baseline_key,
            handler: None,
            debug,
        })
    }

    /// Build a fresh per-file environment: a shallow copy of the baseline
    /// with `_G` pointing at the copy itself.
    pub fn build_env(&self) -> Result<Table<'_>, RunError> {
        let baseline: Table = self.lua.registry_value(&self.baseline)?;
        let env = self.lua.create_table()?;
        for pair in baseline.pairs::<Value, Value>() {
            let (key, value) = pair?;
            env.set(key, value)?;
        }
        env.set("_G", env.clone())?;
        Ok(env)
    }

    /// Whether `return(<body>)` compiles. Nothing is executed.
    pub fn check_expression(&self, body: &str) -> bool {
        self.lua
            .load(format!("return({})", body))
            .into_function()
            .is_ok()
    }

    /// Compile-check `source` without executing it. The chunk name shows
    /// up in the error text, which is returned on failure.
    pub fn check_source(&self, source: &str, chunk_name: &str) -> Result<(), String> {
        self.lua
            .load(source)
            .set_name(format!("@{}", chunk_name))
            .into_function()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Execute a metaprogram in `env` and return the accumulated output.
    pub fn exec_metaprogram(
        &self,
        metaprogram: &str,
        chunk_name: &str,
        env: Table<'_>,
    ) -> Result<String, RunError> {
        self.buffer.borrow_mut().clear();
        self.lua.set_named_registry_value(CURRENT_ENV, env.clone())?;
        tracing::debug!(chunk = chunk_name, "executing metaprogram");
        let result = self
            .lua
            .load(metaprogram)
            .set_name(format!("@{}", chunk_name))
            .set_environment(env)
            .exec();
        match result {
            Ok(()) => Ok(self.buffer.borrow().clone()),
            Err(err) => Err(RunError::Execution(err.to_string())),
        }
    }

    /// Serialize `value` honoring the runtime's debug mode.
    pub fn serialize_value(&self, value: &Value) -> Result<String, crate::SerializeError> {
        serialize(value, self.debug)
    }

    /// Evaluate a Lua string literal and return its contents.
    pub fn eval_string_literal(&self, literal: &str) -> Result<String, RunError> {
        let value: mlua::String = self.lua.load(format!("return {}", literal)).eval()?;
        Ok(String::from_utf8_lossy(value.as_bytes()).into_owned())
    }

    /// Render the processing-info record: a chunk returning a table with
    /// the write date and one entry per processed file.
    pub fn save_info_record(&self, files: &[(String, bool)]) -> Result<String, RunError> {
        let record = self.lua.create_table()?;
        let date = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        record.set("date", date)?;
        let list = self.lua.create_table()?;
        for (i, (path, has_pp)) in files.iter().enumerate() {
            let entry = self.lua.create_table()?;
            entry.set("path", path.as_str())?;
            entry.set("hasPreprocessorCode", *has_pp)?;
            list.set(i + 1, entry)?;
        }
        record.set("files", list)?;
        let rendered = serialize(&Value::Table(record), self.debug)
            .map_err(|e| RunError::Handler(e.to_string()))?;
        Ok(format!("return {}\n", rendered))
    }
}

impl luapre_meta::ExprChecker for Runtime {
    fn is_expression(&self, body: &str) -> bool {
        self.check_expression(body)
    }
}
