use thiserror::Error;

use crate::bytecode::namespace::EntryKind;
use crate::frontend::{LexerError, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("{0}")]
    Lex(String),

    #[error("expected {expected} but got {found} ('{lexeme}')")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
        lexeme: String,
    },

    #[error("unknown token {kind} ('{lexeme}') in statement position")]
    UnknownToken { kind: TokenKind, lexeme: String },

    #[error("{kind} '{name}' has already been defined")]
    Redefinition { kind: EntryKind, name: String },

    #[error("undefined procedure '{0}'")]
    UndefinedProcedure(String),

    #[error("undefined macro '{0}'")]
    UndefinedMacro(String),

    #[error("{kind} '{name}' cannot reference itself")]
    SelfReference { kind: EntryKind, name: String },

    #[error("'{0}' definitions cannot be nested inside another block")]
    NestedDefinition(String),

    #[error("'break' outside of a loop")]
    BreakOutsideLoop,

    #[error("missing 'end' for {0}")]
    MissingEnd(String),

    #[error("invalid integer literal '{0}'")]
    InvalidInteger(String),

    #[error("invalid return count {0} (expected a non-negative count or 'neg 1')")]
    InvalidReturnCount(i64),

    #[error("cannot read '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("cannot import '{path}': {reason}")]
    ImportNotFound { path: String, reason: String },

    #[error("'impl' must appear before any other statement")]
    ImportNotAtTop,

    #[error("circular import of '{0}'")]
    CircularImport(String),

    #[error("internal error: {0} break(s) left without a loop exit")]
    UnresolvedBreak(usize),

    #[error("internal error: 'LOOP_END' at {0} has no matching 'LOOP_START'")]
    UnmatchedLoopEnd(usize),
}

/// A fatal compile error with the location it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{file}:{line}:{col}] compile error: {kind}")]
pub struct CompileError {
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(file: &str, line: usize, col: usize, kind: CompileErrorKind) -> Self {
        CompileError {
            file: file.to_string(),
            line,
            col,
            kind,
        }
    }

    pub fn at(file: &str, token: &Token, kind: CompileErrorKind) -> Self {
        Self::new(file, token.line, token.col, kind)
    }

    pub fn from_lexer(file: &str, err: LexerError) -> Self {
        Self::new(file, err.line, err.col, CompileErrorKind::Lex(err.message))
    }

    pub fn unexpected(file: &str, expected: TokenKind, found: &Token) -> Self {
        Self::at(
            file,
            found,
            CompileErrorKind::UnexpectedToken {
                expected,
                found: found.kind,
                lexeme: found.lexeme.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_location() {
        let err = CompileError::new("main.eso", 3, 9, CompileErrorKind::BreakOutsideLoop);
        assert_eq!(
            err.to_string(),
            "[main.eso:3:9] compile error: 'break' outside of a loop"
        );
    }

    #[test]
    fn test_unexpected_token_display() {
        let token = Token::new(TokenKind::Int, "4", 1, 6);
        let err = CompileError::unexpected("repl", TokenKind::Ident, &token);
        let msg = err.to_string();
        assert!(msg.contains("expected identifier but got integer ('4')"));
        assert!(msg.starts_with("[repl:1:6]"));
    }

    #[test]
    fn test_redefinition_names_kind() {
        let err = CompileErrorKind::Redefinition {
            kind: EntryKind::Macro,
            name: "sq".to_string(),
        };
        assert_eq!(err.to_string(), "macro 'sq' has already been defined");
    }

    #[test]
    fn test_from_lexer_keeps_position() {
        let lex = LexerError {
            message: "unterminated string literal".to_string(),
            line: 2,
            col: 4,
        };
        let err = CompileError::from_lexer("a.eso", lex);
        assert_eq!((err.line, err.col), (2, 4));
        assert!(matches!(err.kind, CompileErrorKind::Lex(_)));
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = CompileError::new("x", 1, 1, CompileErrorKind::ImportNotAtTop);
        let _: &dyn std::error::Error = &err;
    }
}
