//! Struct extraction from IDL source text.
//!
//! A small tokenizer and recursive-descent pass over the subset of IDL the
//! fixtures need: `module` blocks (arbitrarily nested) and `struct`
//! declarations with an optional base type. Every other construct (unions,
//! enums, bitsets, typedefs, constants, annotations) is skipped by balancing
//! braces, so their bodies never leak declarations into the result.
//!
//! Known limitation: preprocessor lines are dropped without evaluation, so
//! both branches of an `#ifdef` are scanned.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdlError {
    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: usize },
    #[error("line {line}: unterminated literal")]
    UnterminatedLiteral { line: usize },
    #[error("line {line}: expected {expected}, found {found}")]
    Unexpected {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("unexpected end of input inside {context}")]
    UnexpectedEof { context: &'static str },
}

/// A struct declaration found in IDL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    /// Base type as written (`Base` or `ns::Base`).
    pub base: Option<String>,
    /// Enclosing modules, outermost first.
    pub module: Vec<String>,
}

impl StructDecl {
    pub fn module_path(&self) -> String {
        self.module.join("::")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok<'a> {
    Ident(&'a str),
    Scope,
    Punct(char),
    Literal,
    Eof,
}

impl Tok<'_> {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("`{}`", s),
            Tok::Scope => "`::`".to_string(),
            Tok::Punct(c) => format!("`{}`", c),
            Tok::Literal => "literal".to_string(),
            Tok::Eof => "end of input".to_string(),
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.input[self.pos..].chars();
        it.next();
        it.next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.next_char();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), IdlError> {
        let start = self.line;
        // opening "/*" already consumed
        loop {
            match self.next_char() {
                Some('*') if self.peek_char() == Some('/') => {
                    self.next_char();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(IdlError::UnterminatedComment { line: start }),
            }
        }
    }

    fn skip_literal(&mut self, quote: char) -> Result<(), IdlError> {
        let start = self.line;
        loop {
            match self.next_char() {
                Some('\\') => {
                    self.next_char();
                }
                Some(ch) if ch == quote => return Ok(()),
                Some('\n') | None => return Err(IdlError::UnterminatedLiteral { line: start }),
                Some(_) => {}
            }
        }
    }

    /// Skip whitespace, comments and preprocessor lines.
    fn skip_trivia(&mut self) -> Result<(), IdlError> {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.next_char();
            } else if ch == '/' && self.peek_second() == Some('/') {
                self.skip_line();
            } else if ch == '/' && self.peek_second() == Some('*') {
                self.next_char();
                self.next_char();
                self.skip_block_comment()?;
            } else if ch == '#' {
                self.skip_line();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<(Tok<'a>, usize), IdlError> {
        self.skip_trivia()?;
        let line = self.line;
        let ch = match self.peek_char() {
            Some(c) => c,
            None => return Ok((Tok::Eof, line)),
        };
        if ch.is_alphabetic() || ch == '_' {
            let start = self.pos;
            while let Some(c) = self.peek_char() {
                if c.is_alphanumeric() || c == '_' {
                    self.next_char();
                } else {
                    break;
                }
            }
            return Ok((Tok::Ident(&self.input[start..self.pos]), line));
        }
        if ch.is_ascii_digit() {
            while let Some(c) = self.peek_char() {
                if c.is_alphanumeric() || c == '.' || c == '_' {
                    self.next_char();
                } else {
                    break;
                }
            }
            return Ok((Tok::Literal, line));
        }
        self.next_char();
        match ch {
            '"' | '\'' => {
                self.skip_literal(ch)?;
                Ok((Tok::Literal, line))
            }
            ':' if self.peek_char() == Some(':') => {
                self.next_char();
                Ok((Tok::Scope, line))
            }
            _ => Ok((Tok::Punct(ch), line)),
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(Tok<'a>, usize)>,
    out: Vec<StructDecl>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
            out: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<(Tok<'a>, usize), IdlError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Tok<'a>, IdlError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().map(|(t, _)| t).unwrap_or(&Tok::Eof))
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<&'a str, IdlError> {
        match self.next()? {
            (Tok::Ident(name), _) => Ok(name),
            (Tok::Eof, _) => Err(IdlError::UnexpectedEof { context: expected }),
            (other, line) => Err(IdlError::Unexpected {
                line,
                expected,
                found: other.describe(),
            }),
        }
    }

    fn expect_punct(&mut self, want: char, expected: &'static str) -> Result<(), IdlError> {
        match self.next()? {
            (Tok::Punct(c), _) if c == want => Ok(()),
            (Tok::Eof, _) => Err(IdlError::UnexpectedEof { context: expected }),
            (other, line) => Err(IdlError::Unexpected {
                line,
                expected,
                found: other.describe(),
            }),
        }
    }

    /// Consume tokens up to and including the `}` matching an already
    /// consumed `{`.
    fn skip_block(&mut self, context: &'static str) -> Result<(), IdlError> {
        let mut depth = 1usize;
        loop {
            match self.next()?.0 {
                Tok::Punct('{') => depth += 1,
                Tok::Punct('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Tok::Eof => return Err(IdlError::UnexpectedEof { context }),
                _ => {}
            }
        }
    }

    fn eat_semicolon(&mut self) -> Result<(), IdlError> {
        if *self.peek()? == Tok::Punct(';') {
            self.next()?;
        }
        Ok(())
    }

    /// Parse definitions until end of input (top level) or the closing `}`
    /// of the enclosing module.
    fn definitions(&mut self, scope: &mut Vec<String>) -> Result<(), IdlError> {
        let nested = !scope.is_empty();
        loop {
            let (tok, line) = self.next()?;
            match tok {
                Tok::Eof if nested => return Err(IdlError::UnexpectedEof { context: "module" }),
                Tok::Eof => return Ok(()),
                Tok::Punct('}') if nested => return Ok(()),
                Tok::Punct('}') => {
                    return Err(IdlError::Unexpected {
                        line,
                        expected: "definition",
                        found: "`}`".to_string(),
                    })
                }
                Tok::Punct('{') => self.skip_block("block")?,
                Tok::Ident("module") => {
                    let name = self.expect_ident("module name")?;
                    self.expect_punct('{', "`{` after module name")?;
                    scope.push(name.to_string());
                    self.definitions(scope)?;
                    scope.pop();
                    self.eat_semicolon()?;
                }
                Tok::Ident("struct") => self.structure(scope)?,
                _ => {}
            }
        }
    }

    fn structure(&mut self, scope: &[String]) -> Result<(), IdlError> {
        let name = self.expect_ident("struct name")?;
        let mut base = None;
        match self.next()? {
            // forward declaration
            (Tok::Punct(';'), _) => return Ok(()),
            (Tok::Punct('{'), _) => {}
            (Tok::Punct(':'), _) => {
                base = Some(self.scoped_name()?);
                self.expect_punct('{', "`{` after base type")?;
            }
            (Tok::Eof, _) => return Err(IdlError::UnexpectedEof { context: "struct" }),
            (other, line) => {
                return Err(IdlError::Unexpected {
                    line,
                    expected: "`{`, `:` or `;` after struct name",
                    found: other.describe(),
                })
            }
        }
        self.skip_block("struct body")?;
        self.eat_semicolon()?;
        self.out.push(StructDecl {
            name: name.to_string(),
            base,
            module: scope.to_vec(),
        });
        Ok(())
    }

    fn scoped_name(&mut self) -> Result<String, IdlError> {
        let mut name = String::new();
        if *self.peek()? == Tok::Scope {
            self.next()?;
            name.push_str("::");
        }
        name.push_str(self.expect_ident("base type")?);
        while *self.peek()? == Tok::Scope {
            self.next()?;
            name.push_str("::");
            name.push_str(self.expect_ident("base type")?);
        }
        Ok(name)
    }
}

/// Extract every struct declaration from IDL `text`, in source order.
///
/// Forward declarations are ignored. The result depends only on `text`.
pub fn extract_structures(text: &str) -> Result<Vec<StructDecl>, IdlError> {
    let mut parser = Parser::new(text);
    let mut scope = Vec::new();
    parser.definitions(&mut scope)?;
    Ok(parser.out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(decls: &[StructDecl]) -> Vec<(String, String)> {
        decls
            .iter()
            .map(|d| (d.module_path(), d.name.clone()))
            .collect()
    }

    #[test]
    fn test_structs_inside_and_outside_modules() {
        let idl = r#"
struct Outside
{
    long value;
};

module geo
{
    struct Point
    {
        double x;
        double y;
    };
};
"#;
        let decls = extract_structures(idl).unwrap();
        assert_eq!(
            names(&decls),
            vec![
                ("".to_string(), "Outside".to_string()),
                ("geo".to_string(), "Point".to_string())
            ]
        );
    }

    #[test]
    fn test_nested_modules_and_base_types() {
        let idl = r#"
module outer {
    module inner {
        struct Base { long a; };
        struct Derived : Base { long b; };
        struct Remote : ::other::Root { long c; };
    };
    struct Sibling { long d; };
};
"#;
        let decls = extract_structures(idl).unwrap();
        assert_eq!(
            names(&decls),
            vec![
                ("outer::inner".to_string(), "Base".to_string()),
                ("outer::inner".to_string(), "Derived".to_string()),
                ("outer::inner".to_string(), "Remote".to_string()),
                ("outer".to_string(), "Sibling".to_string()),
            ]
        );
        assert_eq!(decls[1].base.as_deref(), Some("Base"));
        assert_eq!(decls[2].base.as_deref(), Some("::other::Root"));
    }

    #[test]
    fn test_comments_literals_and_other_constructs_are_skipped() {
        let idl = r#"
#include "helpers/basic_inner_types.idl"
// struct InLineComment { long x; };
/* struct InBlockComment
   { long x; }; */
const string GREETING = "struct InString { }";
struct Fwd;
enum Color { RED, GREEN };
union Choice switch (long) { case 1: long a; case 2: Color c; };
@annotation Marker { long value; };
@extensibility(APPENDABLE)
struct Annotated
{
    @key long id;
    @default(3) short level;
    sequence<Color, 5> colors;
};
struct Empty {};
"#;
        let decls = extract_structures(idl).unwrap();
        let got: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(got, vec!["Annotated", "Empty"]);
    }

    #[test]
    fn test_extraction_is_pure() {
        let idl = "module m { struct A { long x; }; }; struct B { long y; };";
        assert_eq!(extract_structures(idl), extract_structures(idl));
    }

    #[test]
    fn test_unbalanced_input_reports_errors() {
        assert_eq!(
            extract_structures("module m { struct A { long x; };"),
            Err(IdlError::UnexpectedEof { context: "module" })
        );
        assert_eq!(
            extract_structures("struct A { long x;\n/* open"),
            Err(IdlError::UnterminatedComment { line: 2 })
        );
        assert!(matches!(
            extract_structures("struct 42 { };"),
            Err(IdlError::Unexpected { line: 1, .. })
        ));
        assert!(matches!(
            extract_structures("};"),
            Err(IdlError::Unexpected { .. })
        ));
    }
}
