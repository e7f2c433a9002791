use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) {
        for token in tokens {
            println!("{}", self.format_one(token));
        }
    }

    pub fn format_one(&self, token: &Token) -> String {
        let kind = Self::kind(token.kind);
        let (colr, reset) = if self.color {
            (Self::color(token.kind), Self::RESET)
        } else {
            ("", "")
        };

        format!(
            "[{:02}:{:02}] {}{:<8} {:?}{}",
            token.line, token.col, colr, kind, token.lexeme, reset
        )
    }

    fn kind(kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Eof => "EOF",
            Int => "INT",
            Str => "STRING",
            Ident => "IDENT",
            LSquare | RSquare => "BRACKET",
            Plus | Minus | Star | Slash => "OP",
            Greater | Less | EqualTo => "CMP",
            Semicolon | Dot | Comma | Bang | QMark | Ampersand => "PUNCT",
            _ => "KEYWORD",
        }
    }

    fn color(kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Eof => Self::DIM,
            Str => Self::GRN,
            Int => Self::CYN,
            Ident => Self::YEL,
            Plus | Minus | Star | Slash | Greater | Less | EqualTo => Self::MAG,
            _ => Self::RESET,
        }
    }
}
