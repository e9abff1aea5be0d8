//! Equality fixtures: a program and two expressions whose values must compare equal
//! (`pk_equal*` files) or unequal (`pk_nequal*` files).
//!
//! The three sections are separated by lines consisting exactly of `##`.

use crate::compiler::{CompileError, Compiler};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Equal,
    NotEqual,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("reading fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("fixture `{0}` is named neither pk_equal* nor pk_nequal*")]
    UnknownPrefix(String),
    #[error("fixture `{name}` has {found} sections, expected 3")]
    Sections { name: String, found: usize },
    #[error("fixture `{name}` does not compile: {source}")]
    Compile { name: String, source: CompileError },
    #[error("fixture `{name}` raised an exception in its {section}")]
    Raised { name: String, section: &'static str },
    #[error("fixture `{name}`: {section} has no value")]
    NoValue { name: String, section: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityFixture {
    pub name: String,
    pub source: String,
    pub lhs: String,
    pub rhs: String,
    pub expect: Expectation,
}

impl EqualityFixture {
    /// Parse fixture `text`; `name` decides the expectation.
    pub fn parse(name: &str, text: &str) -> Result<Self, FixtureError> {
        let expect = if name.starts_with("pk_nequal") {
            Expectation::NotEqual
        } else if name.starts_with("pk_equal") {
            Expectation::Equal
        } else {
            return Err(FixtureError::UnknownPrefix(name.to_string()));
        };
        let mut sections = vec![String::new()];
        for line in text.lines() {
            if line.trim_end_matches('\r') == "##" {
                sections.push(String::new());
            } else if let Some(current) = sections.last_mut() {
                current.push_str(line);
                current.push('\n');
            }
        }
        let [source, lhs, rhs]: [String; 3] = sections
            .try_into()
            .map_err(|s: Vec<String>| FixtureError::Sections { name: name.to_string(), found: s.len() })?;
        Ok(EqualityFixture { name: name.to_string(), source, lhs, rhs, expect })
    }

    /// Read and parse the fixture file at `path`, named after its file name.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&name, &text)
    }

    /// Run the fixture on `pk`. Returns whether the outcome matched the expectation.
    pub fn run(&self, pk: &mut Compiler) -> Result<bool, FixtureError> {
        let compile = |e: CompileError| FixtureError::Compile { name: self.name.clone(), source: e };
        let program = pk.compile_buffer(&self.source).map_err(compile)?;
        if program.raised() {
            return Err(FixtureError::Raised { name: self.name.clone(), section: "program" });
        }
        let a = self.value(pk, &self.lhs, "first expression")?;
        let b = self.value(pk, &self.rhs, "second expression")?;
        let equal = pk.heap().equal(a, b);
        Ok(equal == (self.expect == Expectation::Equal))
    }

    fn value(
        &self,
        pk: &mut Compiler,
        source: &str,
        section: &'static str,
    ) -> Result<crate::Value, FixtureError> {
        let eval = pk
            .compile_expression(source.trim())
            .map_err(|e| FixtureError::Compile { name: self.name.clone(), source: e })?;
        if eval.raised() {
            return Err(FixtureError::Raised { name: self.name.clone(), section });
        }
        eval.value
            .ok_or_else(|| FixtureError::NoValue { name: self.name.clone(), section })
    }
}
