/// Recursive-descent parser for the constraint surface language
///
/// Grammar, loosest binding first:
///
/// ```text
/// expr  := impl ("iff" impl)*
/// impl  := or ("impl" or)*            (right associative)
/// or    := and ("or" and)*
/// and   := unary ("and" unary)*
/// unary := "not" unary | rel
/// rel   := sum (cmp sum)?             cmp in = != < <= > >=
/// sum   := term (("+" | "-") term)*
/// term  := factor ("*" factor)*
/// factor:= int | "true" | "false" | ref | "-" factor | "(" expr ")"
/// ref   := "feature[" id "]" | "attribute[" id "]" | "context[" id "]"
/// ```
///
/// Variable references use the same namespaced wrappers as the input
/// document. Attribute and context references must be declared in the
/// translation scope; feature references introduce the feature.
///
/// Typing: attribute/context references and literals are integers. A
/// feature is an integer under the integer encoding and a boolean under the
/// boolean encoding. A bare integer-encoded feature in boolean position
/// desugars to `f = 1`; a boolean-encoded feature in arithmetic position is
/// rejected.
use crate::model::FeatureEncoding;
use crate::translate::{Expr, Scope};
use crate::translate::expr::{ArithOp, CmpOp};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Int(i64),
    Feature(String),
    Attribute(String),
    Context(String),
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Impl,
    Iff,
    True,
    False,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Int(v) => format!("`{v}`"),
            Tok::Feature(id) => format!("`feature[{id}]`"),
            Tok::Attribute(id) => format!("`attribute[{id}]`"),
            Tok::Context(id) => format!("`context[{id}]`"),
            Tok::LParen => "`(`".to_string(),
            Tok::RParen => "`)`".to_string(),
            Tok::Plus => "`+`".to_string(),
            Tok::Minus => "`-`".to_string(),
            Tok::Star => "`*`".to_string(),
            Tok::Cmp(op) => format!("`{}`", cmp_symbol(*op)),
            Tok::And => "`and`".to_string(),
            Tok::Or => "`or`".to_string(),
            Tok::Not => "`not`".to_string(),
            Tok::Impl => "`impl`".to_string(),
            Tok::Iff => "`iff`".to_string(),
            Tok::True => "`true`".to_string(),
            Tok::False => "`false`".to_string(),
        }
    }
}

fn cmp_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "=",
        CmpOp::Ne => "!=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    }
}

fn lex(source: &str) -> Result<Vec<Tok>, String> {
    let bytes = source.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '=' => {
                toks.push(Tok::Cmp(CmpOp::Eq));
                i += 1;
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Cmp(CmpOp::Ne));
                    i += 2;
                } else {
                    return Err(format!("unexpected `!` at offset {i}"));
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Cmp(CmpOp::Le));
                    i += 2;
                } else {
                    toks.push(Tok::Cmp(CmpOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Cmp(CmpOp::Ge));
                    i += 2;
                } else {
                    toks.push(Tok::Cmp(CmpOp::Gt));
                    i += 1;
                }
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &source[start..i];
                let value = text
                    .parse::<i64>()
                    .map_err(|_| format!("integer literal `{text}` out of range"))?;
                toks.push(Tok::Int(value));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let word = &source[start..i];
                match word {
                    "and" => toks.push(Tok::And),
                    "or" => toks.push(Tok::Or),
                    "not" => toks.push(Tok::Not),
                    "impl" => toks.push(Tok::Impl),
                    "iff" => toks.push(Tok::Iff),
                    "true" => toks.push(Tok::True),
                    "false" => toks.push(Tok::False),
                    "feature" | "attribute" | "context" => {
                        if bytes.get(i) != Some(&b'[') {
                            return Err(format!("expected `[` after `{word}` at offset {i}"));
                        }
                        i += 1;
                        let id_start = i;
                        while i < bytes.len() && bytes[i] != b']' {
                            i += 1;
                        }
                        if i == bytes.len() {
                            return Err(format!("unterminated `{word}[` reference"));
                        }
                        let id = source[id_start..i].to_string();
                        if id.is_empty() {
                            return Err(format!("empty identifier in `{word}[]`"));
                        }
                        i += 1;
                        toks.push(match word {
                            "feature" => Tok::Feature(id),
                            "attribute" => Tok::Attribute(id),
                            _ => Tok::Context(id),
                        });
                    }
                    _ => return Err(format!("unknown identifier `{word}`")),
                }
            }
            _ => return Err(format!("unexpected character `{c}` at offset {i}")),
        }
    }
    Ok(toks)
}

/// Value sort of a parsed subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Bool,
    Int,
}

struct Parser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    scope: &'a Scope,
    encoding: FeatureEncoding,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Coerce a subtree into boolean position
    fn to_bool(&self, expr: Expr, ty: Ty) -> Result<Expr, String> {
        match ty {
            Ty::Bool => Ok(expr),
            Ty::Int => match expr {
                // a bare 0/1 feature in boolean position reads as "selected"
                Expr::Feature(_) => Ok(Expr::Cmp(
                    CmpOp::Eq,
                    Box::new(expr),
                    Box::new(Expr::Int(1)),
                )),
                _ => Err("integer expression used in boolean position".to_string()),
            },
        }
    }

    fn expect_int(&self, expr: Expr, ty: Ty) -> Result<Expr, String> {
        match ty {
            Ty::Int => Ok(expr),
            Ty::Bool => Err("boolean expression used arithmetically".to_string()),
        }
    }

    fn expr(&mut self) -> Result<(Expr, Ty), String> {
        let (mut lhs, mut ty) = self.implication()?;
        while self.eat(&Tok::Iff) {
            let lhs_b = self.to_bool(lhs, ty)?;
            let (rhs, rty) = self.implication()?;
            let rhs_b = self.to_bool(rhs, rty)?;
            lhs = Expr::Iff(Box::new(lhs_b), Box::new(rhs_b));
            ty = Ty::Bool;
        }
        Ok((lhs, ty))
    }

    fn implication(&mut self) -> Result<(Expr, Ty), String> {
        let (lhs, lty) = self.disjunction()?;
        if self.eat(&Tok::Impl) {
            let lhs_b = self.to_bool(lhs, lty)?;
            let (rhs, rty) = self.implication()?;
            let rhs_b = self.to_bool(rhs, rty)?;
            Ok((Expr::Implies(Box::new(lhs_b), Box::new(rhs_b)), Ty::Bool))
        } else {
            Ok((lhs, lty))
        }
    }

    fn disjunction(&mut self) -> Result<(Expr, Ty), String> {
        let (first, fty) = self.conjunction()?;
        if self.peek() != Some(&Tok::Or) {
            return Ok((first, fty));
        }
        let mut parts = vec![self.to_bool(first, fty)?];
        while self.eat(&Tok::Or) {
            let (next, nty) = self.conjunction()?;
            parts.push(self.to_bool(next, nty)?);
        }
        Ok((Expr::Or(parts), Ty::Bool))
    }

    fn conjunction(&mut self) -> Result<(Expr, Ty), String> {
        let (first, fty) = self.unary()?;
        if self.peek() != Some(&Tok::And) {
            return Ok((first, fty));
        }
        let mut parts = vec![self.to_bool(first, fty)?];
        while self.eat(&Tok::And) {
            let (next, nty) = self.unary()?;
            parts.push(self.to_bool(next, nty)?);
        }
        Ok((Expr::And(parts), Ty::Bool))
    }

    fn unary(&mut self) -> Result<(Expr, Ty), String> {
        if self.eat(&Tok::Not) {
            let (inner, ity) = self.unary()?;
            let inner_b = self.to_bool(inner, ity)?;
            Ok((Expr::Not(Box::new(inner_b)), Ty::Bool))
        } else {
            self.relation()
        }
    }

    fn relation(&mut self) -> Result<(Expr, Ty), String> {
        let (lhs, lty) = self.sum()?;
        if let Some(Tok::Cmp(op)) = self.peek().cloned() {
            self.pos += 1;
            let lhs_i = self.expect_int(lhs, lty)?;
            let (rhs, rty) = self.sum()?;
            let rhs_i = self.expect_int(rhs, rty)?;
            Ok((Expr::Cmp(op, Box::new(lhs_i), Box::new(rhs_i)), Ty::Bool))
        } else {
            Ok((lhs, lty))
        }
    }

    fn sum(&mut self) -> Result<(Expr, Ty), String> {
        let (mut lhs, mut lty) = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => ArithOp::Add,
                Some(Tok::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let lhs_i = self.expect_int(lhs, lty)?;
            let (rhs, rty) = self.term()?;
            let rhs_i = self.expect_int(rhs, rty)?;
            lhs = Expr::Arith(op, Box::new(lhs_i), Box::new(rhs_i));
            lty = Ty::Int;
        }
        Ok((lhs, lty))
    }

    fn term(&mut self) -> Result<(Expr, Ty), String> {
        let (mut lhs, mut lty) = self.factor()?;
        while self.eat(&Tok::Star) {
            let lhs_i = self.expect_int(lhs, lty)?;
            let (rhs, rty) = self.factor()?;
            let rhs_i = self.expect_int(rhs, rty)?;
            lhs = Expr::Arith(ArithOp::Mul, Box::new(lhs_i), Box::new(rhs_i));
            lty = Ty::Int;
        }
        Ok((lhs, lty))
    }

    fn factor(&mut self) -> Result<(Expr, Ty), String> {
        match self.bump() {
            Some(Tok::Int(v)) => Ok((Expr::Int(v), Ty::Int)),
            Some(Tok::True) => Ok((Expr::Bool(true), Ty::Bool)),
            Some(Tok::False) => Ok((Expr::Bool(false), Ty::Bool)),
            Some(Tok::Minus) => {
                let (inner, ity) = self.factor()?;
                let inner_i = self.expect_int(inner, ity)?;
                Ok((
                    Expr::Arith(ArithOp::Sub, Box::new(Expr::Int(0)), Box::new(inner_i)),
                    Ty::Int,
                ))
            }
            Some(Tok::Feature(id)) => {
                let ty = match self.encoding {
                    FeatureEncoding::Boolean => Ty::Bool,
                    FeatureEncoding::Integer => Ty::Int,
                };
                Ok((Expr::Feature(id), ty))
            }
            Some(Tok::Attribute(id)) => {
                if !self.scope.attributes.contains(&id) {
                    return Err(format!("undeclared attribute `{id}`"));
                }
                Ok((Expr::Attribute(id), Ty::Int))
            }
            Some(Tok::Context(id)) => {
                if !self.scope.contexts.contains(&id) {
                    return Err(format!("undeclared context `{id}`"));
                }
                Ok((Expr::Context(id), Ty::Int))
            }
            Some(Tok::LParen) => {
                let (inner, ity) = self.expr()?;
                if !self.eat(&Tok::RParen) {
                    return Err("missing closing `)`".to_string());
                }
                Ok((inner, ity))
            }
            Some(other) => Err(format!("unexpected {}", other.describe())),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

/// Parse a source string into the IR.
///
/// With `require_bool` the result must be boolean-valued (constraints);
/// without it an integer-valued formula is also accepted (preferences).
pub fn parse(
    source: &str,
    scope: &Scope,
    encoding: FeatureEncoding,
    require_bool: bool,
) -> Result<Expr, String> {
    let toks = lex(source)?;
    let mut parser = Parser {
        toks,
        pos: 0,
        scope,
        encoding,
    };
    let (expr, ty) = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(format!("trailing input starting at {}", extra.describe()));
    }
    if require_bool {
        parser.to_bool(expr, ty)
    } else {
        Ok(expr)
    }
}
