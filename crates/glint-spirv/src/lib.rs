#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

//! SPIR-V generation for programs that passed semantic analysis and
//! binding assignment.

pub mod binary;
mod builder;
mod lower;

use glint_ast::diag::Diagnostic;
use glint_types::Program;

pub use binary::{BinaryError, Header};
pub use builder::GENERATOR;

/// A finished SPIR-V module. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryModule {
    words: Vec<u32>,
}

impl BinaryModule {
    /// Wrap existing words after checking the header.
    pub fn from_words(words: Vec<u32>) -> Result<Self, BinaryError> {
        binary::parse_header(&words)?;
        Ok(BinaryModule { words })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BinaryError> {
        Self::from_words(binary::words_from_bytes(bytes)?)
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Little-endian byte image, as written to `.spv` files.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn header(&self) -> Header {
        // validated on construction
        binary::parse_header(&self.words).unwrap_or(Header {
            magic: 0,
            version: 0,
            generator: 0,
            bound: 0,
            schema: 0,
        })
    }

    pub fn instructions(&self) -> binary::Instructions<'_> {
        binary::instructions(&self.words)
    }
}

/// Generate a module for `program`, which must have been checked and had
/// its bindings mapped. Failures are reported as code generation errors.
pub fn generate(program: &Program) -> Result<BinaryModule, Diagnostic> {
    let words = lower::lower(program)?;
    log::debug!("generated {} SPIR-V words", words.len());
    Ok(BinaryModule { words })
}
