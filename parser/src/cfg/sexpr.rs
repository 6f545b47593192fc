//! Tokenizer and tree builder for the configuration language.
//!
//! The grammar is small: atoms, parenthesized lists, `"quoted strings"`, `;;` line comments
//! and `#| |#` block comments. Every node remembers where it came from so errors can point
//! at the offending text.

use std::cmp;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub file_name: Rc<str>,
    pub file_content: Rc<str>,
}

impl Span {
    fn new(start: usize, end: usize, file_name: Rc<str>, file_content: Rc<str>) -> Span {
        Span {
            start,
            end: cmp::max(start, end),
            file_name,
            file_content,
        }
    }

    /// Smallest span containing both `self` and `other`. Both must come from the same file.
    pub fn cover(&self, other: &Span) -> Span {
        Span::new(
            cmp::min(self.start, other.start),
            cmp::max(self.end, other.end),
            self.file_name.clone(),
            self.file_content.clone(),
        )
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn file_name(&self) -> String {
        self.file_name.to_string()
    }

    pub fn file_content(&self) -> String {
        self.file_content.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Spanned<T> {
    pub t: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(t: T, span: Span) -> Spanned<T> {
        Spanned { t, span }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SExpr {
    Atom(Spanned<String>),
    List(Spanned<Vec<SExpr>>),
}

impl SExpr {
    /// The atom's text. Quoted atoms have their quotes removed.
    pub fn atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => {
                let s = a.t.as_str();
                Some(
                    s.strip_prefix('"')
                        .and_then(|s| s.strip_suffix('"'))
                        .unwrap_or(s),
                )
            }
            SExpr::List(_) => None,
        }
    }

    pub fn list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(l) => Some(&l.t),
            SExpr::Atom(_) => None,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            SExpr::Atom(a) => &a.span,
            SExpr::List(l) => &l.span,
        }
    }
}

impl std::fmt::Debug for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{}", &a.t),
            SExpr::List(l) => {
                write!(f, "(")?;
                for (i, e) in l.t.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Atom,
}

type TokenRes = Result<Token, String>;

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'"') || b.is_ascii_whitespace()
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn skip_while(&mut self, f: impl Fn(u8) -> bool) {
        while self.peek().map_or(false, &f) {
            self.pos += 1;
        }
    }

    /// Skips whitespace and comments. Returns an error for an unterminated block comment,
    /// along with the position it started at.
    fn skip_trivia(&mut self) -> Result<(), (usize, String)> {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(b), _) if b.is_ascii_whitespace() => {
                    self.skip_while(|b| b.is_ascii_whitespace());
                }
                (Some(b';'), Some(b';')) => self.skip_while(|b| b != b'\n'),
                (Some(b'#'), Some(b'|')) => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.src[self.pos..].windows(2).position(|w| w == b"|#") {
                        Some(offset) => self.pos += offset + 2,
                        None => {
                            self.pos = self.src.len();
                            return Err((
                                start,
                                "Unterminated multiline comment. Add |# after the end of your comment."
                                    .to_string(),
                            ));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Option<(usize, usize, TokenRes)> {
        if let Err((start, e)) = self.skip_trivia() {
            return Some((start, start + 2, Err(e)));
        }
        let start = self.pos;
        let b = self.peek()?;
        self.pos += 1;
        let tok = match b {
            b'(' => Ok(Token::Open),
            b')' => Ok(Token::Close),
            b'"' => {
                self.skip_while(|b| b != b'"' && b != b'\n');
                if self.peek() == Some(b'"') {
                    self.pos += 1;
                    Ok(Token::Atom)
                } else {
                    Err("Unterminated string".to_string())
                }
            }
            _ => {
                self.skip_while(|b| !is_delimiter(b));
                Ok(Token::Atom)
            }
        };
        Some((start, self.pos, tok))
    }
}

pub type TopLevel = Spanned<Vec<SExpr>>;

/// Parse `cfg` into its top-level lists. `file_name` is only used in error spans.
pub fn parse(cfg: &str, file_name: &str) -> Result<Vec<TopLevel>, Spanned<String>> {
    let file_name: Rc<str> = Rc::from(file_name);
    let file_content: Rc<str> = Rc::from(cfg);
    let span = |start, end| Span::new(start, end, file_name.clone(), file_content.clone());

    let mut lexer = Lexer {
        src: cfg.as_bytes(),
        pos: 0,
    };
    let mut top: Vec<SExpr> = vec![];
    let mut stack: Vec<Spanned<Vec<SExpr>>> = vec![];

    while let Some((start, end, tok)) = lexer.next_token() {
        let tok_span = span(start, end);
        match tok.map_err(|e| Spanned::new(e, tok_span.clone()))? {
            Token::Open => stack.push(Spanned::new(vec![], tok_span)),
            Token::Close => {
                let Some(finished) = stack.pop() else {
                    return Err(Spanned::new(
                        "Unexpected closing parenthesis".to_string(),
                        tok_span,
                    ));
                };
                let expr = SExpr::List(Spanned::new(
                    finished.t,
                    finished.span.cover(&tok_span),
                ));
                match stack.last_mut() {
                    Some(parent) => parent.t.push(expr),
                    None => top.push(expr),
                }
            }
            Token::Atom => {
                let atom = SExpr::Atom(Spanned::new(cfg[start..end].to_string(), tok_span));
                match stack.last_mut() {
                    Some(parent) => parent.t.push(atom),
                    None => top.push(atom),
                }
            }
        }
    }
    if let Some(unclosed) = stack.pop() {
        return Err(Spanned::new(
            "Unclosed opening parenthesis".to_string(),
            unclosed.span,
        ));
    }

    top.into_iter()
        .map(|expr| match expr {
            SExpr::List(l) => Ok(l),
            SExpr::Atom(a) => Err(Spanned::new(
                "Everything must be in a list".to_string(),
                a.span,
            )),
        })
        .collect()
}
