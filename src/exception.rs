//! Exceptions raised while evaluating a program.
//!
//! An exception surfaces to the client as a struct value named `Exception` with fields
//! `code`, `name`, `msg` and `exit_status`.

use crate::iod::IodError;
use crate::ios::IosError;
use crate::value::{Value, ValueHeap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    Generic,
    DivByZero,
    NoIos,
    OutOfBounds,
    Eof,
    Map,
    Conv,
    Elem,
    Constraint,
    Io,
    IoFlags,
    Inval,
    Overflow,
    Perm,
}

impl ExceptionCode {
    pub const ALL: [ExceptionCode; 14] = [
        ExceptionCode::Generic,
        ExceptionCode::DivByZero,
        ExceptionCode::NoIos,
        ExceptionCode::OutOfBounds,
        ExceptionCode::Eof,
        ExceptionCode::Map,
        ExceptionCode::Conv,
        ExceptionCode::Elem,
        ExceptionCode::Constraint,
        ExceptionCode::Io,
        ExceptionCode::IoFlags,
        ExceptionCode::Inval,
        ExceptionCode::Overflow,
        ExceptionCode::Perm,
    ];

    pub fn code(self) -> i32 {
        match self {
            ExceptionCode::Generic => 0,
            ExceptionCode::DivByZero => 1,
            ExceptionCode::NoIos => 2,
            ExceptionCode::OutOfBounds => 4,
            ExceptionCode::Eof => 6,
            ExceptionCode::Map => 7,
            ExceptionCode::Conv => 8,
            ExceptionCode::Elem => 9,
            ExceptionCode::Constraint => 10,
            ExceptionCode::Io => 11,
            ExceptionCode::IoFlags => 13,
            ExceptionCode::Inval => 14,
            ExceptionCode::Overflow => 17,
            ExceptionCode::Perm => 18,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| i64::from(c.code()) == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ExceptionCode::Generic => "generic",
            ExceptionCode::DivByZero => "division by zero",
            ExceptionCode::NoIos => "no IOS",
            ExceptionCode::OutOfBounds => "out of bounds",
            ExceptionCode::Eof => "EOF",
            ExceptionCode::Map => "no map",
            ExceptionCode::Conv => "conversion error",
            ExceptionCode::Elem => "invalid element",
            ExceptionCode::Constraint => "constraint violation",
            ExceptionCode::Io => "generic IO",
            ExceptionCode::IoFlags => "invalid IO flags",
            ExceptionCode::Inval => "invalid argument",
            ExceptionCode::Overflow => "overflow",
            ExceptionCode::Perm => "permission denied",
        }
    }
}

/// An exception on its way out of the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub code: ExceptionCode,
    pub msg: String,
}

impl Exception {
    pub fn new(code: ExceptionCode, msg: impl Into<String>) -> Self {
        Exception { code, msg: msg.into() }
    }

    /// Allocate the `Exception` struct value for this exception.
    pub fn into_value(self, heap: &mut ValueHeap) -> Value {
        let code = heap.int(i64::from(self.code.code()), 32);
        let name = heap.make_string(self.code.name());
        let msg = heap.make_string(self.msg);
        let exit_status = heap.int(1, 32);
        let fields = vec![
            ("code".to_string(), code),
            ("name".to_string(), name),
            ("msg".to_string(), msg),
            ("exit_status".to_string(), exit_status),
        ];
        heap.struct_value(Some("Exception".to_string()), fields, Default::default())
    }
}

impl From<IodError> for Exception {
    fn from(e: IodError) -> Self {
        let code = match e {
            IodError::Eof => ExceptionCode::Eof,
            IodError::Flags => ExceptionCode::IoFlags,
            IodError::NoMem | IodError::Io(_) | IodError::Device(_) => ExceptionCode::Io,
        };
        Exception::new(code, e.to_string())
    }
}

impl From<IosError> for Exception {
    fn from(e: IosError) -> Self {
        match e {
            IosError::Iod(inner) => inner.into(),
            IosError::NoSuchIos(_) => Exception::new(ExceptionCode::NoIos, e.to_string()),
            IosError::NotReadable(_) | IosError::NotWritable(_) => {
                Exception::new(ExceptionCode::IoFlags, e.to_string())
            }
            IosError::NoMatchingDevice(_) => Exception::new(ExceptionCode::Io, e.to_string()),
        }
    }
}
