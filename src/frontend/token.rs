#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Int,
    Str,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Greater,
    Less,
    EqualTo,

    // Punctuation
    Semicolon,
    Dot,
    Comma,
    Bang,
    QMark,
    Ampersand,
    LSquare,
    RSquare,

    // Keywords
    If,
    Break,
    Neg,
    Impl,
    Dup,
    Pop,
    Macro,
    Undef,
    End,
    Proc,
    Test,
    Assert,
    Rev,

    // Identifier (procedure or macro name)
    Ident,

    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "if" => TokenKind::If,
            "break" => TokenKind::Break,
            "neg" => TokenKind::Neg,
            "impl" => TokenKind::Impl,
            "dup" => TokenKind::Dup,
            "pop" => TokenKind::Pop,
            "macro" => TokenKind::Macro,
            "undef" => TokenKind::Undef,
            "end" => TokenKind::End,
            "proc" => TokenKind::Proc,
            "test" => TokenKind::Test,
            "assert" => TokenKind::Assert,
            "rev" => TokenKind::Rev,
            _ => return None,
        };
        Some(kind)
    }

    pub fn single_char(ch: char) -> Option<TokenKind> {
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '>' => TokenKind::Greater,
            '<' => TokenKind::Less,
            '=' => TokenKind::EqualTo,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '!' => TokenKind::Bang,
            '?' => TokenKind::QMark,
            '&' => TokenKind::Ampersand,
            '[' => TokenKind::LSquare,
            ']' => TokenKind::RSquare,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Int => "integer",
            TokenKind::Str => "string",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Greater => "'>'",
            TokenKind::Less => "'<'",
            TokenKind::EqualTo => "'='",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Bang => "'!'",
            TokenKind::QMark => "'?'",
            TokenKind::Ampersand => "'&'",
            TokenKind::LSquare => "'['",
            TokenKind::RSquare => "']'",
            TokenKind::If => "if",
            TokenKind::Break => "break",
            TokenKind::Neg => "neg",
            TokenKind::Impl => "impl",
            TokenKind::Dup => "dup",
            TokenKind::Pop => "pop",
            TokenKind::Macro => "macro",
            TokenKind::Undef => "undef",
            TokenKind::End => "end",
            TokenKind::Proc => "proc",
            TokenKind::Test => "test",
            TokenKind::Assert => "assert",
            TokenKind::Rev => "rev",
            TokenKind::Ident => "identifier",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{}", name)
    }
}

/// A lexed token. `line` and `col` are 1-based and point at the first
/// character of the lexeme (the opening quote for strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            col,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
