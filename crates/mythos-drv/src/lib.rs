//! mythos-drv - Driver and embedding API.
//!
//! Orchestrates the pipeline for the `mythos` binary and for embedders:
//!
//! ```text
//! source --> lex --> parse --> emit --> run
//!              \______ first error aborts ______/
//! ```
//!
//! The embedding surface is three operations:
//!
//! 1. [`compile_source`] - source text to a [`CodeObject`] or a
//!    compile error.
//! 2. [`Session::vm_mut`] + [`Vm::register_builtin`] - inject host
//!    functions before execution.
//! 3. [`Session::run_code`] - execute, yielding a value or a runtime
//!    error with position and call stack.
//!
//! A [`Session`] owns one VM, so globals persist across runs; the REPL
//! is a loop over [`Session::eval_line`].

use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use mythos_emit::{CodeObject, ImageError, IMAGE_EXTENSION};
use mythos_lex::Lexer;
use mythos_par::ast::{ExprStmt, Program, Stmt};
use mythos_par::Parser;
use mythos_util::{Handler, Level};
use mythos_vm::{Value, Vm, VmError};

/// What the driver should produce for an input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmitKind {
    /// Execute the program.
    #[default]
    Run,
    /// Dump the token stream.
    Tokens,
    /// Dump the AST.
    Ast,
    /// Dump the disassembled bytecode.
    Bytecode,
}

/// Driver configuration.
///
/// Verbosity is not configured here: the binary wires its `--verbose`
/// flag straight into the tracing filter, which is what gates the
/// pipeline's `debug!` events.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub emit: EmitKind,
}

/// Errors crossing the embedding boundary.
///
/// [`SessionError::exit_code`] maps them onto the documented process
/// exit codes: compile-side failures are `1`, runtime failures `2`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Compile(String),

    #[error("{0}")]
    Runtime(String),

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl SessionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Runtime(_) => 2,
            _ => 1,
        }
    }

    fn from_handler(handler: &Handler) -> Self {
        // The CLI prefixes "error:", so keep just message and position.
        let message = handler
            .first_error()
            .map(|d| {
                if d.span.line > 0 {
                    format!("{} at {}", d.message, d.span)
                } else {
                    d.message
                }
            })
            .unwrap_or_else(|| "compilation failed".to_string());
        SessionError::Compile(message)
    }

    fn from_vm(err: VmError) -> Self {
        SessionError::Runtime(err.report())
    }
}

/// Report collected warnings to stderr.
fn print_warnings(handler: &Handler) {
    for diagnostic in handler.diagnostics() {
        if diagnostic.level == Level::Warning {
            eprintln!("{}", diagnostic);
        }
    }
}

/// Compile source text to its top-level code object.
pub fn compile_source(source: &str) -> Result<Rc<CodeObject>, SessionError> {
    let handler = Handler::new();

    debug!(bytes = source.len(), "lexing");
    let tokens = Lexer::new(source, &handler).tokenize();
    if handler.has_errors() {
        return Err(SessionError::from_handler(&handler));
    }

    debug!(tokens = tokens.len(), "parsing");
    let program = Parser::new(tokens, &handler).parse_program();
    let program = match program {
        Some(program) if !handler.has_errors() => program,
        _ => return Err(SessionError::from_handler(&handler)),
    };

    debug!(statements = program.body.len(), "emitting bytecode");
    let code = mythos_emit::compile(&program, &handler);
    let code = match code {
        Some(code) if !handler.has_errors() => code,
        _ => return Err(SessionError::from_handler(&handler)),
    };

    print_warnings(&handler);
    Ok(code)
}

/// Dump the token stream of a source text.
pub fn dump_tokens(source: &str) -> Result<String, SessionError> {
    let handler = Handler::new();
    let tokens = Lexer::new(source, &handler).tokenize();
    if handler.has_errors() {
        return Err(SessionError::from_handler(&handler));
    }
    let mut out = String::new();
    for token in &tokens {
        out.push_str(&format!(
            "{:>4}:{:<3} {:?}\n",
            token.span.line, token.span.column, token.kind
        ));
    }
    Ok(out)
}

/// Dump the AST of a source text.
pub fn dump_ast(source: &str) -> Result<String, SessionError> {
    let handler = Handler::new();
    let tokens = Lexer::new(source, &handler).tokenize();
    if handler.has_errors() {
        return Err(SessionError::from_handler(&handler));
    }
    let program = Parser::new(tokens, &handler).parse_program();
    match program {
        Some(program) if !handler.has_errors() => Ok(format!("{:#?}\n", program)),
        _ => Err(SessionError::from_handler(&handler)),
    }
}

/// Dump the disassembly of a source text.
pub fn dump_bytecode(source: &str) -> Result<String, SessionError> {
    Ok(compile_source(source)?.disassemble())
}

/// One driver invocation: configuration plus a VM whose globals persist
/// across runs.
pub struct Session {
    pub config: Config,
    vm: Vm,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            vm: Vm::new(),
        }
    }

    /// With a custom VM (tests use one with buffered output).
    pub fn with_vm(config: Config, vm: Vm) -> Self {
        Self { config, vm }
    }

    /// Access the VM, e.g. to register host builtins.
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Execute an already compiled code object.
    pub fn run_code(&mut self, code: Rc<CodeObject>) -> Result<Value, SessionError> {
        self.vm.run(code).map_err(SessionError::from_vm)
    }

    /// Compile and execute source text.
    pub fn run_source(&mut self, source: &str) -> Result<Value, SessionError> {
        let code = compile_source(source)?;
        self.run_code(code)
    }

    /// Load (for `.mythc` images) or compile a file, then act per the
    /// configured [`EmitKind`]. Returns the dump text, or `None` after
    /// execution.
    pub fn run_file(&mut self, path: &Path) -> Result<Option<String>, SessionError> {
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == IMAGE_EXTENSION);

        if is_image {
            // A compiled image has no source to re-lex or re-parse;
            // only the bytecode dump and execution make sense.
            if matches!(self.config.emit, EmitKind::Tokens | EmitKind::Ast) {
                return Err(SessionError::Compile(
                    "tokens and ast dumps are unavailable for compiled images".to_string(),
                ));
            }
            debug!(path = %path.display(), "loading code image");
            let code = mythos_emit::load_image(path)?;
            return match self.config.emit {
                EmitKind::Bytecode => Ok(Some(code.disassemble())),
                _ => {
                    self.run_code(code)?;
                    Ok(None)
                }
            };
        }

        let source = read_source(path)?;
        match self.config.emit {
            EmitKind::Tokens => Ok(Some(dump_tokens(&source)?)),
            EmitKind::Ast => Ok(Some(dump_ast(&source)?)),
            EmitKind::Bytecode => Ok(Some(dump_bytecode(&source)?)),
            EmitKind::Run => {
                self.run_source(&source)?;
                Ok(None)
            }
        }
    }

    /// Evaluate one REPL line.
    ///
    /// A line that parses as a single expression yields its value
    /// (`Some` when non-null, to be printed); otherwise the line runs
    /// as statements and yields `None`.
    pub fn eval_line(&mut self, line: &str) -> Result<Option<Value>, SessionError> {
        let probe = Handler::new();
        let tokens = Lexer::new(line, &probe).tokenize();
        if probe.has_errors() {
            return Err(SessionError::from_handler(&probe));
        }

        let expr = Parser::new(tokens, &probe).parse_expression_entry();
        if let Some(expr) = expr.filter(|_| !probe.has_errors()) {
            let handler = Handler::new();
            let span = expr.span();
            let program = Program {
                body: vec![Stmt::Expr(ExprStmt { expr, span })],
                span,
            };
            let code = match mythos_emit::compile(&program, &handler) {
                Some(code) if !handler.has_errors() => code,
                _ => return Err(SessionError::from_handler(&handler)),
            };
            print_warnings(&handler);
            let value = self.run_code(code)?;
            return Ok(match value {
                Value::Null => None,
                value => Some(value),
            });
        }

        // Not an expression: run as statements.
        self.run_source(line)?;
        Ok(None)
    }
}

/// Compile a source file and write its code image next to it (or to
/// `output`). Returns the image path.
pub fn build_file(path: &Path, output: Option<&Path>) -> Result<PathBuf, SessionError> {
    let source = read_source(path)?;
    let code = compile_source(&source)?;
    let out_path = match output {
        Some(out) => out.to_path_buf(),
        None => path.with_extension(IMAGE_EXTENSION),
    };
    mythos_emit::save_image(&code, &out_path)?;
    Ok(out_path)
}

fn read_source(path: &Path) -> Result<String, SessionError> {
    std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}
