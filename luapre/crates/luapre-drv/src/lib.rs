//! luapre-drv - Preprocessor driver.
//!
//! The driver owns one session and orchestrates the pipeline for each
//! input file:
//!
//! ```text
//! source file (.lua2p)
//!        │
//!        ▼
//!   [strip shebang]
//!        │
//!        ▼
//!   [luapre-lex] ──▶ token vector
//!        │
//!        ▼
//!   [luapre-meta] ──▶ metaprogram (written to *.meta.lua)
//!        │
//!        ▼
//!   [luapre-run] ──▶ preprocessed output
//!        │
//!        ▼
//!   [write output] ──▶ compile-check ──▶ info record
//! ```
//!
//! Files are processed strictly in the order supplied, synchronously, on
//! one thread. Every failure becomes a [`Diagnostic`] and aborts the
//! session; the binary prints it and exits non-zero. The lexer and
//! transpiler never see a file path — the driver attaches paths, lines and
//! excerpts when it converts their structured errors.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use luapre_lex::{tokenize, Token};
use luapre_meta::{transpile, Options};
use luapre_run::{RunError, Runtime};
use luapre_util::{Agent, Diagnostic};

/// Session configuration, assembled from the command line.
#[derive(Clone, Debug)]
pub struct Config {
    /// Input files, in processing order.
    pub paths: Vec<PathBuf>,
    /// Optional message-handler file.
    pub handler: Option<PathBuf>,
    /// Interleave `--[[@N]]` annotations in the output.
    pub line_numbers: bool,
    /// Output extension; inputs already carrying it are rejected.
    pub output_extension: String,
    /// Write a processing-info record here after the session.
    pub save_info: Option<PathBuf>,
    /// Suppress per-file chatter on stdout.
    pub silent: bool,
    /// Keep metaprogram files and escape newlines in serialized strings.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            handler: None,
            line_numbers: false,
            output_extension: "lua".to_string(),
            save_info: None,
            silent: false,
            debug: false,
        }
    }
}

/// A fatal driver error.
#[derive(Error, Debug)]
pub enum DriveError {
    /// A fully formed user-facing diagnostic.
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),

    /// A failure in the runtime layer itself, outside any file context.
    #[error("{0}")]
    Runtime(#[from] RunError),
}

pub type Result<T> = std::result::Result<T, DriveError>;

/// One preprocessing session over a list of files.
pub struct Session {
    config: Config,
    runtime: Runtime,
    files: Vec<(String, bool)>,
}

impl Session {
    /// Build the runtime and load the handler, if any.
    pub fn new(config: Config) -> Result<Session> {
        let mut runtime = Runtime::new(config.debug)?;
        if let Some(handler_path) = &config.handler {
            runtime
                .load_handler(handler_path)
                .map_err(|e| Diagnostic::new(Agent::Loader, handler_path, e.to_string()))?;
        }
        Ok(Session {
            config,
            runtime,
            files: Vec::new(),
        })
    }

    /// Process every file, then write the info record if requested.
    pub fn run(&mut self) -> Result<()> {
        let paths: Vec<String> = self
            .config
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let paths = self
            .runtime
            .handler_init(paths)
            .map_err(|e| Diagnostic::new(Agent::Meta, "(handler)", e.to_string()))?;

        // Reject clobbering inputs before any processing starts, including
        // paths the handler injected.
        let suffix = format!(".{}", self.config.output_extension);
        for path in &paths {
            if path.ends_with(&suffix) {
                return Err(Diagnostic::new(
                    Agent::CommandLine,
                    path,
                    format!(
                        "Input filename must not end with '{}' as it would overwrite itself.",
                        suffix
                    ),
                )
                .into());
            }
        }

        for path in &paths {
            self.process_file(Path::new(path))?;
        }

        if let Some(info_path) = self.config.save_info.clone() {
            let record = self.runtime.save_info_record(&self.files)?;
            fs::write(&info_path, record).map_err(|e| {
                Diagnostic::new(
                    Agent::Loader,
                    &info_path,
                    format!("Could not write info file. ({})", e),
                )
            })?;
        }
        Ok(())
    }

    fn process_file(&mut self, path: &Path) -> Result<()> {
        let path_str = path.display().to_string();
        if !self.config.silent {
            println!("Processing '{}'...", path_str);
        }
        tracing::info!(path = %path_str, "processing file");

        let raw = fs::read_to_string(path).map_err(|e| {
            Diagnostic::new(Agent::Loader, path, format!("Could not read file. ({})", e))
        })?;
        let (special_first_line, source) = split_shebang(&raw);

        let tokens = tokenize(source).map_err(|e| {
            Diagnostic::at_offset(Agent::Tokenizer, path, source, e.position(), e.to_string())
        })?;
        let has_preprocessor_code = tokens.iter().any(Token::is_pp_entry);
        tracing::debug!(tokens = tokens.len(), has_preprocessor_code, "lexed");

        let options = Options {
            add_line_numbers: self.config.line_numbers,
            debug: self.config.debug,
        };
        let metaprogram = transpile(&tokens, options, &self.runtime).map_err(|e| {
            Diagnostic::at_offset(Agent::Parser, path, source, e.position(), e.to_string())
        })?;

        let meta_path = path.with_extension(format!("meta.{}", self.config.output_extension));
        let meta_path_str = meta_path.display().to_string();
        fs::write(&meta_path, &metaprogram).map_err(|e| {
            Diagnostic::new(
                Agent::Loader,
                &meta_path,
                format!("Could not write file. ({})", e),
            )
        })?;

        let env = self.runtime.build_env()?;
        self.runtime
            .handler_before_meta(&path_str, &env)
            .map_err(|e| Diagnostic::new(Agent::Meta, path, e.to_string()))?;

        // On failure the metaprogram file stays behind: the diagnostic
        // points into it.
        let out = match self.runtime.exec_metaprogram(&metaprogram, &meta_path_str, env) {
            Ok(out) => out,
            Err(RunError::Execution(message)) => {
                return Err(chunk_error_diagnostic(Agent::Meta, &meta_path, &message).into());
            }
            Err(other) => return Err(other.into()),
        };
        if !self.config.debug {
            let _ = fs::remove_file(&meta_path);
        }

        let out = match self
            .runtime
            .handler_after_meta(&path_str, &out)
            .map_err(|e| Diagnostic::new(Agent::Meta, path, e.to_string()))?
        {
            Some(replacement) => replacement,
            None => out,
        };

        let out_path = path.with_extension(&self.config.output_extension);
        let out_path_str = out_path.display().to_string();
        fs::write(&out_path, format!("{}{}", special_first_line, out)).map_err(|e| {
            Diagnostic::new(
                Agent::Loader,
                &out_path,
                format!("Could not write file. ({})", e),
            )
        })?;

        if let Err(message) = self.runtime.check_source(&out, &out_path_str) {
            return Err(chunk_error_diagnostic(Agent::Output, &out_path, &message).into());
        }

        self.runtime
            .handler_file_done(&path_str, &out_path_str)
            .map_err(|e| Diagnostic::new(Agent::Meta, path, e.to_string()))?;

        if !self.config.silent {
            println!("Wrote '{}'.", out_path_str);
        }
        self.files.push((path_str, has_preprocessor_code));
        Ok(())
    }
}

/// Split off a `#`-leading first line (shebang), newline included.
fn split_shebang(source: &str) -> (&str, &str) {
    if !source.starts_with('#') {
        return ("", source);
    }
    match source.find('\n') {
        Some(i) => source.split_at(i + 1),
        None => (source, ""),
    }
}

/// Turn a Lua error message mentioning `path:line:` into a located
/// diagnostic. Falls back to the raw message when no location is found.
fn chunk_error_diagnostic(agent: Agent, path: &Path, raw: &str) -> Diagnostic {
    let needle = format!("{}:", path.display());
    if let Some(idx) = raw.find(&needle) {
        let rest = &raw[idx + needle.len()..];
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(line) = digits.parse::<u32>() {
            let mut message = rest[digits.len()..]
                .trim_start_matches(':')
                .trim_start()
                .to_string();
            if let Some(traceback) = message.find("\nstack traceback:") {
                message.truncate(traceback);
            }
            return Diagnostic::new(agent, path, message).with_line(line);
        }
    }
    Diagnostic::new(agent, path, raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shebang_is_split_with_newline() {
        assert_eq!(
            split_shebang("#!/usr/bin/env lua\nprint(1)\n"),
            ("#!/usr/bin/env lua\n", "print(1)\n")
        );
        assert_eq!(split_shebang("print(1)\n"), ("", "print(1)\n"));
        assert_eq!(split_shebang("#only"), ("#only", ""));
    }

    #[test]
    fn chunk_error_with_location() {
        let diag = chunk_error_diagnostic(
            Agent::Meta,
            Path::new("a.meta.lua"),
            "runtime error: a.meta.lua:3: boom\nstack traceback:\n ...",
        );
        assert_eq!(diag.to_string(), "Error @ a.meta.lua:3: [Meta] boom");
    }

    #[test]
    fn chunk_error_without_location_keeps_message() {
        let diag = chunk_error_diagnostic(Agent::Output, Path::new("a.lua"), "weird failure");
        assert_eq!(diag.to_string(), "Error @ a.lua: [Output] weird failure");
    }

    #[test]
    fn config_default_extension_is_lua() {
        assert_eq!(Config::default().output_extension, "lua");
    }
}
