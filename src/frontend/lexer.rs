use thiserror::Error;

use crate::frontend::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{col}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// Streams tokens out of source text one at a time.
///
/// The lexer never looks further ahead than one character, so the compiler
/// can pull tokens lazily through [`Lexer::next_token`]. Once the input is
/// exhausted every further call yields an `Eof` token.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn error(&self, message: impl Into<String>, line: usize, col: usize) -> LexerError {
        LexerError {
            message: message.into(),
            line,
            col,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            match ch {
                ' ' | '\t' | '\r' | '\n' | '\u{8}' => {
                    self.advance();
                }
                '#' => {
                    while let Some(ch) = self.current() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self, line: usize, col: usize) -> Result<Token, LexerError> {
        // opening quote
        self.advance();

        let mut string = String::new();
        loop {
            match self.current() {
                Some('\'') => {
                    self.advance();
                    return Ok(Token::new(TokenKind::Str, string, line, col));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('b') => '\u{8}',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some(ch) => {
                            return Err(self.error(
                                format!("unknown escape sequence: \\{}", ch),
                                self.line,
                                self.col,
                            ));
                        }
                        None => {
                            return Err(self.error(
                                "unexpected EOF in escape sequence",
                                self.line,
                                self.col,
                            ));
                        }
                    };
                    string.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => {
                    return Err(self.error("unterminated string literal", line, col));
                }
            }
        }
    }

    fn read_number(&mut self, line: usize, col: usize) -> Token {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Int, digits, line, col)
    }

    fn read_identifier(&mut self, line: usize, col: usize) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident);
        Token::new(kind, ident, line, col)
    }

    /// Produces the next token, or `Eof` once the source is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        let (line, col) = (self.line, self.col);

        match self.current() {
            None => Ok(Token::new(TokenKind::Eof, "EOF", line, col)),
            Some('\'') => self.read_string(line, col),
            Some(ch) if ch.is_ascii_digit() => Ok(self.read_number(line, col)),
            Some(ch) if ch.is_alphabetic() || ch == '_' => Ok(self.read_identifier(line, col)),
            Some(ch) => match TokenKind::single_char(ch) {
                Some(kind) => {
                    self.advance();
                    Ok(Token::new(kind, ch.to_string(), line, col))
                }
                None => Err(self.error(format!("unexpected character: '{}'", ch), line, col)),
            },
        }
    }

    /// Collects every token up to and including `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::Eof)
            .collect()
    }

    #[test]
    fn test_arithmetic_line() {
        assert_eq!(
            kinds("2 3 + ."),
            vec![
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::Plus,
                TokenKind::Dot
            ]
        );
    }

    #[test]
    fn test_all_single_chars() {
        assert_eq!(
            kinds("+ - * / > < = ; . , ! ? & [ ]"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Greater,
                TokenKind::Less,
                TokenKind::EqualTo,
                TokenKind::Semicolon,
                TokenKind::Dot,
                TokenKind::Comma,
                TokenKind::Bang,
                TokenKind::QMark,
                TokenKind::Ampersand,
                TokenKind::LSquare,
                TokenKind::RSquare,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        assert_eq!(
            kinds("proc add-two end dup_it undef"),
            vec![
                TokenKind::Proc,
                TokenKind::Ident,
                TokenKind::End,
                TokenKind::Ident,
                TokenKind::Undef
            ]
        );
    }

    #[test]
    fn test_bang_before_identifier() {
        let tokens = Lexer::new("!square").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Bang);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme, "square");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = Lexer::new(r"'a\nb\tc\\d\'e'").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "a\nb\tc\\d'e");
    }

    #[test]
    fn test_unknown_escape_error() {
        let err = Lexer::new(r"'a\qb'").tokenize().unwrap_err();
        assert!(err.message.contains("unknown escape"));
    }

    #[test]
    fn test_unterminated_string_error() {
        let err = Lexer::new("  'abc").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!((err.line, err.col), (1, 3));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 # a comment . + \n 2"),
            vec![TokenKind::Int, TokenKind::Int]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("1\n  dup # x\n'hi'").tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
        assert_eq!((tokens[2].line, tokens[2].col), (3, 1));
        assert!(tokens[3].is_eof());
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("1 % 2").tokenize().unwrap_err();
        assert!(err.message.contains("'%'"));
        assert_eq!(err.col, 3);
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new("");
        assert!(lexer.next_token().unwrap().is_eof());
        assert!(lexer.next_token().unwrap().is_eof());
    }
}
