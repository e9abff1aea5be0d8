//! The compiler instance: owner of the value heap, the IOD registry, the open IO spaces,
//! the symbol table and the terminal.

use crate::ast::SourceLoc;
use crate::codec::Endianness;
use crate::env::{DeclInfo, DeclKind, Env};
use crate::eval::Unwind;
use crate::iod::{Iod, IodRegistry, IosFlags, RegistryError, MAX_IODS};
use crate::ios::{IosError, IosId, IosTable};
use crate::parser;
use crate::print;
use crate::term::{IncompleteTerm, Term, TermIf};
use crate::value::{Value, ValueHeap};
use tracing::{debug, warn};

/// Construction failures.
#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    #[error("no terminal interface given")]
    NoTerminal,
    #[error("terminal interface lacks the `{0}` callback")]
    MissingCallback(&'static str),
}

impl From<IncompleteTerm> for CompilerError {
    fn from(e: IncompleteTerm) -> Self {
        CompilerError::MissingCallback(e.missing)
    }
}

/// Failures to compile source text. Runtime failures are exceptions, not compile errors.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{loc}: syntax error: {msg}")]
    Syntax { loc: SourceLoc, msg: String },
    #[error("malformed {0}")]
    Malformed(String),
    #[error("invalid integer literal `{0}`")]
    Literal(String),
    #[error("{0}")]
    Invalid(String),
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("undefined type `{0}`")]
    UndefinedType(String),
    #[error("undefined unit `{0}`")]
    UndefinedUnit(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("{0}")]
    Type(String),
}

/// Settings of a compiler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Byte order of byte-aligned, byte-multiple integers in maps.
    pub endianness: Endianness,
    /// Output base for printed integers: 2, 8, 10 or 16.
    pub obase: u32,
    /// Capacity of the IOD registry, built-in backends included.
    pub max_iods: usize,
    /// Flags used by `open` when none are given.
    pub default_flags: IosFlags,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            endianness: Endianness::Big,
            obase: 10,
            max_iods: MAX_IODS,
            default_flags: IosFlags::READ | IosFlags::WRITE,
        }
    }
}

impl CompilerConfig {
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    pub fn with_obase(mut self, obase: u32) -> Self {
        self.obase = obase;
        self
    }

    pub fn with_max_iods(mut self, max_iods: usize) -> Self {
        self.max_iods = max_iods;
        self
    }

    pub fn with_default_flags(mut self, flags: IosFlags) -> Self {
        self.default_flags = flags;
        self
    }
}

/// Outcome of running source text that compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Value of the expression, for expressions and expression statements.
    pub value: Option<Value>,
    /// `Exception` struct raised by the program, if it raised.
    pub exception: Option<Value>,
}

impl Evaluation {
    pub fn raised(&self) -> bool {
        self.exception.is_some()
    }
}

/// An embeddable compiler instance.
///
/// Values and IO space ids handed out by a compiler are only meaningful for that compiler.
/// Dropping it closes every IO space still open.
#[derive(Debug)]
pub struct Compiler {
    pub(crate) heap: ValueHeap,
    pub(crate) iods: IodRegistry,
    pub(crate) ios: IosTable,
    pub(crate) env: Env,
    pub(crate) term: Term,
    pub(crate) config: CompilerConfig,
}

impl Compiler {
    /// New compiler with the default configuration. Fails unless `term` is given with every
    /// callback set.
    pub fn new(term: Option<TermIf>) -> Result<Self, CompilerError> {
        Self::with_config(term, CompilerConfig::default())
    }

    pub fn with_config(term: Option<TermIf>, config: CompilerConfig) -> Result<Self, CompilerError> {
        let term = term.ok_or(CompilerError::NoTerminal)?.validate()?;
        let iods = IodRegistry::with_builtins(config.max_iods);
        debug!(iods = iods.len(), endianness = ?config.endianness, "compiler created");
        Ok(Compiler {
            heap: ValueHeap::new(),
            iods,
            ios: IosTable::new(),
            env: Env::new(),
            term,
            config,
        })
    }

    // ==================== Compilation ====================

    /// Compile and run a whole program. Nothing runs when any part fails to parse.
    pub fn compile_buffer(&mut self, source: &str) -> Result<Evaluation, CompileError> {
        debug!(len = source.len(), "compile buffer");
        let stmts = parser::parse_program(source).map_err(|e| self.report(e))?;
        for stmt in &stmts {
            if let Err(unwind) = self.exec_stmt(stmt) {
                return self.unwind(unwind);
            }
        }
        Ok(Evaluation::default())
    }

    /// Compile and run one statement. Expression statements yield their value.
    pub fn compile_statement(&mut self, source: &str) -> Result<Evaluation, CompileError> {
        debug!(len = source.len(), "compile statement");
        let stmt = parser::parse_statement(source).map_err(|e| self.report(e))?;
        let value = match self.exec_stmt(&stmt) {
            Ok(value) => value,
            Err(unwind) => return self.unwind(unwind),
        };
        Ok(Evaluation { value, exception: None })
    }

    /// Compile and evaluate one expression.
    pub fn compile_expression(&mut self, source: &str) -> Result<Evaluation, CompileError> {
        debug!(len = source.len(), "compile expression");
        let expr = parser::parse_expression(source).map_err(|e| self.report(e))?;
        let value = match self.eval_maybe_void(&expr) {
            Ok(value) => value,
            Err(unwind) => return self.unwind(unwind),
        };
        Ok(Evaluation { value, exception: None })
    }

    fn unwind(&mut self, unwind: Unwind) -> Result<Evaluation, CompileError> {
        match unwind {
            Unwind::Error(e) => Err(self.report(e)),
            Unwind::Raise(exc) => {
                debug!(code = exc.code.code(), msg = %exc.msg, "exception raised");
                let exception = exc.into_value(&mut self.heap);
                Ok(Evaluation { value: None, exception: Some(exception) })
            }
        }
    }

    /// Render a compile error through the terminal and hand it back.
    fn report(&mut self, e: CompileError) -> CompileError {
        self.term.class("error");
        self.term.printf(format_args!("error: {}\n", e));
        self.term.end_class("error");
        self.term.flush();
        e
    }

    // ==================== Declarations ====================

    /// Call `f` for every declaration, in declaration order, optionally only for one kind.
    /// Type declarations carry no value.
    pub fn map_declarations<F>(&self, kind: Option<DeclKind>, mut f: F)
    where
        F: FnMut(&DeclInfo<'_>),
    {
        for decl in self.env.iter(kind) {
            f(&decl);
        }
    }

    /// Current value of the variable `name`.
    pub fn decl_value(&self, name: &str) -> Option<Value> {
        self.env.value_of(DeclKind::Var, name)
    }

    /// Kinds under which `name` is declared.
    pub fn decl_kinds(&self, name: &str) -> Vec<DeclKind> {
        self.env.kinds_of(name)
    }

    /// Rebind an existing variable. Returns false when there is no such variable.
    pub fn set_decl_value(&mut self, name: &str, value: Value) -> bool {
        self.heap.kind(value).is_some() && self.env.set_var(name, value)
    }

    // ==================== Values and IO ====================

    pub fn heap(&self) -> &ValueHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ValueHeap {
        &mut self.heap
    }

    pub fn ios(&self) -> &IosTable {
        &self.ios
    }

    pub fn ios_mut(&mut self) -> &mut IosTable {
        &mut self.ios
    }

    pub fn iods(&self) -> &IodRegistry {
        &self.iods
    }

    /// Register a device backend after the built-in ones. The file backend only claims
    /// plain handlers naming an existing path (or any path when opened with CREATE), so a
    /// later backend can still claim other plain handlers such as `dev:0`.
    pub fn register_iod(&mut self, iod: Box<dyn Iod>) -> Result<(), RegistryError> {
        self.iods.register(iod)
    }

    /// Open `handler` through the registry.
    pub fn open(&mut self, handler: &str, flags: IosFlags, set_current: bool) -> Result<IosId, IosError> {
        self.ios.open(&mut self.iods, handler, flags, set_current)
    }

    pub fn close(&mut self, id: IosId) -> Result<(), IosError> {
        self.ios.close(id)
    }

    // ==================== Output ====================

    /// Print `value` through the terminal.
    pub fn print_val(&mut self, value: Value) {
        print::print_value(&mut self.term, &self.heap, value, self.config.obase);
        self.term.flush();
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.config.endianness = endianness;
    }

    /// Set the output base. Only 2, 8, 10 and 16 are accepted.
    pub fn set_obase(&mut self, obase: u32) -> bool {
        if !matches!(obase, 2 | 8 | 10 | 16) {
            return false;
        }
        self.config.obase = obase;
        true
    }
}

impl Drop for Compiler {
    fn drop(&mut self) {
        for (id, e) in self.ios.close_all() {
            warn!(%id, error = %e, "failed to close IO space");
        }
        debug!(values = self.heap.len(), "compiler destroyed");
    }
}
