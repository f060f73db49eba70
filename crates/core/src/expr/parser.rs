//! Recursive-descent parser producing the expression AST.
//!
//! Precedence, loosest to tightest: ternary, `||`, `&&`, equality,
//! comparison, additive, multiplicative, unary, postfix (property access,
//! method call, indexing), primary.

use super::lexer::{Spanned, Token};
use super::ScriptSyntaxError;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// A parsed expression node.
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Property(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// Method call `receiver.name(args)`. A receiver of `Ident("math")`
    /// dispatches to the built-in math namespace.
    Call(Box<Expr>, String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
}

/// Upper bound on expression tree depth. Covers both recursive nesting
/// (parentheses, ternaries, literals) and the left-deep trees built by the
/// operator and postfix loops, so compilation rejects pathological scripts
/// instead of exhausting the stack while parsing, evaluating, or dropping
/// the tree.
const MAX_NESTING_DEPTH: usize = 256;

/// Parse a token stream into a `;`-separated sequence of expressions.
///
/// An empty source (no expressions at all) is a syntax error; a trailing
/// semicolon is allowed.
pub(crate) fn parse(tokens: &[Spanned], source_len: usize) -> Result<Vec<Expr>, ScriptSyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len,
        depth: 0,
    };
    let mut exprs = Vec::new();

    loop {
        // Allow (and skip) stray semicolons between expressions.
        while parser.eat(&Token::Semicolon) {}
        if parser.at_end() {
            break;
        }
        exprs.push(parser.expression()?);
        if !parser.at_end() && !parser.check(&Token::Semicolon) {
            return Err(parser.unexpected("`;` or end of script"));
        }
    }

    if exprs.is_empty() {
        return Err(ScriptSyntaxError {
            offset: 0,
            message: "empty script".to_string(),
        });
    }
    Ok(exprs)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    source_len: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.source_len)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ScriptSyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptSyntaxError {
        let found = match self.peek() {
            Some(token) => format!("{token:?}"),
            None => "end of input".to_string(),
        };
        ScriptSyntaxError {
            offset: self.offset(),
            message: format!("expected {expected}, found {found}"),
        }
    }

    /// Accounts one more level of tree depth; errors past the cap. Callers
    /// that add depth temporarily decrement `self.depth` on the way out; on
    /// error the whole parse aborts, so the counter is left as-is.
    fn deepen(&mut self) -> Result<(), ScriptSyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ScriptSyntaxError {
                offset: self.offset(),
                message: format!("expression nesting exceeds {MAX_NESTING_DEPTH} levels"),
            });
        }
        Ok(())
    }

    // -- Grammar ------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ScriptSyntaxError> {
        self.deepen()?;
        let result = self.ternary();
        self.depth -= 1;
        result
    }

    fn ternary(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let cond = self.or()?;
        if self.eat(&Token::Question) {
            let then = self.expression()?;
            self.expect(&Token::Colon, "`:` in ternary")?;
            let alt = self.expression()?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(alt)))
        } else {
            Ok(cond)
        }
    }

    fn or(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.and()?;
        let mut chained = 0;
        while self.eat(&Token::OrOr) {
            self.deepen()?;
            chained += 1;
            let rhs = self.and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.equality()?;
        let mut chained = 0;
        while self.eat(&Token::AndAnd) {
            self.deepen()?;
            chained += 1;
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.comparison()?;
        let mut chained = 0;
        loop {
            let op = if self.eat(&Token::EqEq) {
                BinOp::Eq
            } else if self.eat(&Token::NotEq) {
                BinOp::Ne
            } else {
                break;
            };
            self.deepen()?;
            chained += 1;
            let rhs = self.comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.additive()?;
        let mut chained = 0;
        loop {
            let op = if self.eat(&Token::Lt) {
                BinOp::Lt
            } else if self.eat(&Token::Le) {
                BinOp::Le
            } else if self.eat(&Token::Gt) {
                BinOp::Gt
            } else if self.eat(&Token::Ge) {
                BinOp::Ge
            } else {
                break;
            };
            self.deepen()?;
            chained += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.multiplicative()?;
        let mut chained = 0;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinOp::Add
            } else if self.eat(&Token::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            self.deepen()?;
            chained += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut lhs = self.unary()?;
        let mut chained = 0;
        loop {
            let op = if self.eat(&Token::Star) {
                BinOp::Mul
            } else if self.eat(&Token::Slash) {
                BinOp::Div
            } else if self.eat(&Token::Percent) {
                BinOp::Rem
            } else {
                break;
            };
            self.deepen()?;
            chained += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptSyntaxError> {
        if self.eat(&Token::Bang) {
            self.deepen()?;
            let operand = self.unary();
            self.depth -= 1;
            Ok(Expr::Unary(UnaryOp::Not, Box::new(operand?)))
        } else if self.eat(&Token::Minus) {
            self.deepen()?;
            let operand = self.unary();
            self.depth -= 1;
            Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand?)))
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut expr = self.primary()?;
        let mut chained = 0;
        loop {
            if self.eat(&Token::Dot) {
                self.deepen()?;
                chained += 1;
                let name = self.ident("property or method name")?;
                if self.eat(&Token::LParen) {
                    let args = self.arguments()?;
                    expr = Expr::Call(Box::new(expr), name, args);
                } else {
                    expr = Expr::Property(Box::new(expr), name);
                }
            } else if self.eat(&Token::LBracket) {
                self.deepen()?;
                chained += 1;
                let index = self.expression()?;
                self.expect(&Token::RBracket, "`]`")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        self.depth -= chained;
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ScriptSyntaxError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`)` after arguments")?;
            break;
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let token = match self.peek() {
            Some(t) => t.clone(),
            None => return Err(self.unexpected("an expression")),
        };
        match token {
            Token::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Token::True => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Token::Null => {
                self.pos += 1;
                Ok(Expr::Null)
            }
            Token::Ident(name) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Token::LBrace => {
                self.pos += 1;
                self.object_literal()
            }
            Token::LBracket => {
                self.pos += 1;
                self.array_literal()
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut pairs = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(Expr::Object(pairs));
        }
        loop {
            let key = match self.peek() {
                Some(Token::Ident(name)) => {
                    let key = name.clone();
                    self.pos += 1;
                    key
                }
                Some(Token::Str(text)) => {
                    let key = text.clone();
                    self.pos += 1;
                    key
                }
                _ => return Err(self.unexpected("an object key")),
            };
            self.expect(&Token::Colon, "`:` after object key")?;
            let value = self.expression()?;
            pairs.push((key, value));
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RBrace, "`}`")?;
            break;
        }
        Ok(Expr::Object(pairs))
    }

    fn array_literal(&mut self) -> Result<Expr, ScriptSyntaxError> {
        let mut elements = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(Expr::Array(elements));
        }
        loop {
            elements.push(self.expression()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RBracket, "`]`")?;
            break;
        }
        Ok(Expr::Array(elements))
    }

    fn ident(&mut self, what: &str) -> Result<String, ScriptSyntaxError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse_src(src: &str) -> Result<Vec<Expr>, ScriptSyntaxError> {
        let tokens = tokenize(src)?;
        parse(&tokens, src.len())
    }

    #[test]
    fn parses_precedence() {
        let exprs = parse_src("1 + 2 * 3").unwrap();
        assert_eq!(exprs.len(), 1);
        match &exprs[0] {
            Expr::Binary(BinOp::Add, _, rhs) => {
                assert!(matches!(**rhs, Expr::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("expected Add at the root, got {other:?}"),
        }
    }

    #[test]
    fn parses_method_chain() {
        let exprs = parse_src("a.b.toUpperCase()").unwrap();
        match &exprs[0] {
            Expr::Call(recv, name, args) => {
                assert_eq!(name, "toUpperCase");
                assert!(args.is_empty());
                assert!(matches!(**recv, Expr::Property(_, _)));
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn parses_multiple_statements_and_trailing_semicolon() {
        assert_eq!(parse_src("1; 2; 3;").unwrap().len(), 3);
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(parse_src("1 +").is_err());
    }

    #[test]
    fn rejects_missing_ternary_colon() {
        assert!(parse_src("a ? b").is_err());
    }

    #[test]
    fn rejects_adjacent_expressions() {
        assert!(parse_src("1 2").is_err());
    }

    #[test]
    fn rejects_deeply_parenthesized_expression() {
        let src = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let err = parse_src(&src).unwrap_err();
        assert!(err.message.contains("nesting"), "got: {}", err.message);
    }

    #[test]
    fn rejects_excessive_operator_chain() {
        let src = vec!["1"; 50_000].join(" + ");
        assert!(parse_src(&src).is_err());
    }

    #[test]
    fn rejects_excessive_unary_chain() {
        let src = format!("{}1", "!".repeat(50_000));
        assert!(parse_src(&src).is_err());
    }

    #[test]
    fn rejects_excessive_property_chain() {
        let src = format!("a{}", ".b".repeat(50_000));
        assert!(parse_src(&src).is_err());
    }

    #[test]
    fn accepts_moderate_nesting() {
        let src = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(parse_src(&src).is_ok());
    }

    #[test]
    fn parses_object_with_string_keys() {
        let exprs = parse_src("{'a b': 1, c: 2}").unwrap();
        match &exprs[0] {
            Expr::Object(pairs) => {
                assert_eq!(pairs[0].0, "a b");
                assert_eq!(pairs[1].0, "c");
            }
            other => panic!("expected Object, got {other:?}"),
        }
    }
}
