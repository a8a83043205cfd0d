pub mod ast;
pub mod error;
pub mod grammar;
pub mod lexer;
#[allow(clippy::module_inception)]
mod parser;

pub use error::ParseError;
pub use parser::parse_line;
