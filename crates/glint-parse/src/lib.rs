#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

//! GLSL compute shader front end: preprocessing, lexing and parsing into
//! the `glint-ast` syntax tree.

mod lexer;
mod parser;
mod preprocess;
mod token;

pub use parser::{parse_str, MAX_NESTING};
pub use preprocess::{DEFAULT_VERSION, KNOWN_EXTENSIONS};
