//! # binscope — embeddable runtime for a binary inspection language
//!
//! A small language whose expressions read and write arbitrary binary containers (files,
//! memory buffers, client-provided devices) through a typed value layer, packaged as a
//! library: clients create a [`Compiler`], register their own IO device backends, compile
//! snippets and exchange typed [`Value`]s with it.
//!
//! ## Pieces
//!
//! - **Values**: signed/unsigned integers of 1 to 64 bits, strings, offsets with units,
//!   structs and type values, stored in a compiler-owned [`ValueHeap`]
//! - **IO devices**: the [`Iod`] backend trait, the ordered [`IodRegistry`] (memory and
//!   file backends built in) and the table of open IO spaces ([`IosTable`])
//! - **Compiler**: construction against a complete terminal interface ([`TermIf`]), the
//!   `compile_buffer` / `compile_statement` / `compile_expression` entry points, and
//!   declaration enumeration
//!
//! ## Example
//!
//! ```text
//! var h = open("*scratch*");
//! uint<16> @ 23#B = 0x1234;
//! type Header = struct { uint<8> magic; uint<8> version; };
//! var hdr = Header @ 23#B;
//! hdr.version = 2UB;
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use binscope::{Compiler, TermIf};
//!
//! let mut pk = Compiler::new(Some(TermIf::stdout())).expect("complete terminal");
//! pk.compile_buffer("var h = open(\"*scratch*\");").expect("compiles");
//! let eval = pk.compile_expression("uint<8> @ 0#B").expect("compiles");
//! if let Some(v) = eval.value {
//!     pk.print_val(v);
//! }
//! ```

pub mod ast;
pub mod codec;
pub mod compiler;
pub mod env;
mod eval;
pub mod exception;
pub mod fixture;
pub mod iod;
pub mod ios;
pub mod parser;
pub mod print;
pub mod term;
pub mod value;

pub use ast::SourceLoc;
pub use codec::Endianness;
pub use compiler::{CompileError, Compiler, CompilerConfig, CompilerError, Evaluation};
pub use env::{DeclInfo, DeclKind};
pub use exception::{Exception, ExceptionCode};
pub use fixture::{EqualityFixture, Expectation, FixtureError};
pub use iod::{IoDevice, Iod, IodError, IodRegistry, IosFlags, RegistryError, MAX_IODS};
pub use ios::{Ios, IosError, IosId, IosTable};
pub use parser::{parse_expression, parse_program, parse_statement};
pub use term::{Capture, Color, IncompleteTerm, Term, TermIf};
pub use value::{MapInfo, Type, Value, ValueHeap, ValueKind};
