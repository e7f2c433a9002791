pub mod lexer;
pub mod token;
pub mod token_dumper;

pub use lexer::{Lexer, LexerError};
pub use token::{Token, TokenKind};
