//! Parser for composition expressions such as `kSum(kConst,kProd(kSEISO,kLinear))`.
//!
//! The grammar is deliberately tiny:
//!
//! ```text
//! expr := name [ '(' expr { ',' expr } ')' ]
//! name := [A-Za-z0-9_]+
//! ```
//!
//! Whitespace is ignored everywhere. The parser only produces a name tree;
//! resolving names to kernels, means or criteria is left to the registries.

use crate::error::{Error, Result};

/// A parsed composition expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    /// The node name, e.g. `kSum`.
    pub name: String,
    /// Arguments in source order; empty for atoms.
    pub children: Vec<Expr>,
}

impl Expr {
    /// Parses `text` into an expression tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on unbalanced parentheses, empty names, or
    /// trailing input.
    ///
    /// # Examples
    ///
    /// ```
    /// use smbo::expr::Expr;
    ///
    /// let e = Expr::parse("kSum( kConst , kSEISO )")?;
    /// assert_eq!(e.name, "kSum");
    /// assert_eq!(e.children.len(), 2);
    /// assert_eq!(e.to_string(), "kSum(kConst,kSEISO)");
    /// # Ok::<(), smbo::Error>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = Parser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error(if parser.bytes[parser.pos] == b')' {
                "unbalanced ')'"
            } else {
                "unexpected trailing input"
            }));
        }
        Ok(expr)
    }

    /// Whether this node has no arguments.
    #[must_use]
    pub fn is_atom(&self) -> bool {
        self.children.is_empty()
    }
}

impl core::fmt::Display for Expr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)?;
        if !self.children.is_empty() {
            f.write_str("(")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &'static str) -> Error {
        Error::Parse {
            expression: self.text.to_string(),
            position: self.pos,
            reason,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<Expr> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        let name = self.text[start..self.pos].to_string();

        let mut children = Vec::new();
        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                children.push(self.expr()?);
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    None => return Err(self.error("unbalanced '(': missing ')'")),
                    Some(_) => return Err(self.error("expected ',' or ')'")),
                }
            }
        }
        Ok(Expr { name, children })
    }
}
