//! Tokenizer for module description documents.
//!
//! Strings and comments are consumed whole, so braces inside them never reach
//! the parser's depth tracking.

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `[Name]` header, e.g. `[Info]`, `[Export]`, `[Custom]`
    Bracketed(String),
    /// Bare word: identifiers, numbers, unquoted literals
    Word(String),
    /// Quoted string with escapes resolved
    Str(String),
    /// `@Type` tag
    Tag(String),
    LBrace,
    RBrace,
    Eq,
    Colon,
    Semi,
    Comma,
    /// Any other single character (kept so nested blocks can be skipped)
    Other(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            Self::Bracketed(name) => format!("`[{name}]`"),
            Self::Word(word) => format!("`{word}`"),
            Self::Str(s) => format!("string \"{s}\""),
            Self::Tag(tag) => format!("`@{tag}`"),
            Self::LBrace => "`{`".into(),
            Self::RBrace => "`}`".into(),
            Self::Eq => "`=`".into(),
            Self::Colon => "`:`".into(),
            Self::Semi => "`;`".into(),
            Self::Comma => "`,`".into(),
            Self::Other(c) => format!("`{c}`"),
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.bump() {
            let line = self.line;
            let kind = match c {
                '\n' => {
                    self.line += 1;
                    continue;
                }
                c if c.is_whitespace() => continue,
                '/' if self.chars.peek() == Some(&'/') => {
                    self.skip_line();
                    continue;
                }
                '/' if self.chars.peek() == Some(&'*') => {
                    self.bump();
                    self.skip_block_comment(line)?;
                    continue;
                }
                '"' | '\'' => TokenKind::Str(self.string(c, line)?),
                '[' => self.bracketed(),
                '@' => TokenKind::Tag(self.word(String::new())),
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '=' => TokenKind::Eq,
                ':' => TokenKind::Colon,
                ';' => TokenKind::Semi,
                ',' => TokenKind::Comma,
                c if is_word_char(c) => TokenKind::Word(self.word(c.to_string())),
                c => TokenKind::Other(c),
            };
            self.tokens.push(Token { kind, line });
        }
        Ok(self.tokens)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn skip_line(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self, start: usize) -> Result<(), ParseError> {
        while let Some(c) = self.bump() {
            match c {
                '\n' => self.line += 1,
                '*' if self.chars.peek() == Some(&'/') => {
                    self.bump();
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(ParseError::UnterminatedComment { line: start })
    }

    fn string(&mut self, quote: char, start: usize) -> Result<String, ParseError> {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                c if c == quote => return Ok(value),
                '\\' => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => break,
                },
                // strings never span lines
                '\n' => break,
                c => value.push(c),
            }
        }
        Err(ParseError::UnterminatedString { line: start })
    }

    /// `[Name]` becomes a header token; a lone `[` is kept as-is.
    fn bracketed(&mut self) -> TokenKind {
        let mut lookahead = self.chars.clone();
        let mut name = String::new();
        while let Some(&c) = lookahead.peek() {
            if !is_word_char(c) {
                break;
            }
            name.push(c);
            lookahead.next();
        }
        if !name.is_empty() && lookahead.peek() == Some(&']') {
            lookahead.next();
            self.chars = lookahead;
            TokenKind::Bracketed(name)
        } else {
            TokenKind::Other('[')
        }
    }

    fn word(&mut self, mut word: String) -> String {
        while let Some(&c) = self.chars.peek() {
            if !is_word_char(c) {
                break;
            }
            word.push(c);
            self.bump();
        }
        word
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}
