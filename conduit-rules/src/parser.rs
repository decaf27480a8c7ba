//! Recursive-descent parser: DSL text -> [`crate::ast::RuleSet`].

use crate::ast::{Action, BinOp, Direction, Expr, InterpPart, Literal, Method, Rule, RuleSet};
use crate::error::RuleError;
use crate::lexer::{Lexer, Token};

pub fn parse(src: &str) -> Result<RuleSet, RuleError> {
    let tokens = Lexer::tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(), RuleError> {
        match self.advance() {
            Token::Ident(ref s) if s.eq_ignore_ascii_case(expected) => Ok(()),
            other => Err(self.err(format!("expected `{expected}`, found {other}"))),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), RuleError> {
        let tok = self.advance();
        if tok == expected {
            Ok(())
        } else {
            Err(self.err(format!("expected {expected}, found {tok}")))
        }
    }

    fn err(&self, message: String) -> RuleError {
        RuleError::Parse { line: self.line(), message }
    }

    fn ident_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    fn parse_program(&mut self) -> Result<RuleSet, RuleError> {
        let mut rules = Vec::new();
        let mut bucket: Option<(Method, String, Direction)> = None;
        let mut pending_when: Option<Expr> = None;

        self.skip_newlines();
        while !matches!(self.peek(), Token::Eof) {
            if self.ident_keyword("EVENT") {
                self.advance();
                bucket = Some(self.parse_event_header()?);
            } else if self.ident_keyword("WHEN") {
                self.advance();
                pending_when = Some(self.parse_expr()?);
            } else {
                let (method, resource, direction) = bucket.clone().ok_or_else(|| {
                    self.err("statement appears before any EVENT header".into())
                })?;
                let line = self.line();
                let (condition, action, else_action, r#async) =
                    self.parse_rule_statement(pending_when.take())?;
                rules.push(Rule {
                    event: method,
                    resource,
                    direction,
                    condition,
                    action,
                    else_action,
                    r#async,
                    line,
                });
            }
            self.skip_newlines();
        }

        Ok(RuleSet { rules })
    }

    /// `EVENT <METHOD> <resource> [IN|OUT]`
    fn parse_event_header(&mut self) -> Result<(Method, String, Direction), RuleError> {
        let method_name = match self.advance() {
            Token::Ident(s) => s,
            other => return Err(self.err(format!("expected HTTP method after EVENT, found {other}"))),
        };
        let method = Method::parse(&method_name)
            .ok_or_else(|| self.err(format!("unknown HTTP method {method_name:?}")))?;
        let resource = match self.advance() {
            Token::Ident(s) => s,
            other => return Err(self.err(format!("expected resource name, found {other}"))),
        };
        let direction = if self.ident_keyword("IN") {
            self.advance();
            Direction::In
        } else if self.ident_keyword("OUT") {
            self.advance();
            Direction::Out
        } else {
            Direction::In
        };
        Ok((method, resource, direction))
    }

    /// One non-EVENT, non-WHEN statement: `IF ... THEN ... [ELSE ...]` or a
    /// bare action. Returns `(condition, action, else_action, async)`.
    fn parse_rule_statement(
        &mut self,
        pending_when: Option<Expr>,
    ) -> Result<(Expr, Action, Option<Action>, bool), RuleError> {
        let mut r#async = true;
        if self.ident_keyword("SYNC") {
            self.advance();
            r#async = false;
        } else if self.ident_keyword("ASYNC") {
            self.advance();
        }

        if self.ident_keyword("IF") {
            self.advance();
            let mut cond = self.parse_expr()?;
            self.expect_ident("THEN")?;
            let then_action = self.parse_action()?;
            let else_action = if self.ident_keyword("ELSE") {
                self.advance();
                Some(self.parse_action()?)
            } else {
                None
            };
            if let Some(when) = pending_when {
                cond = Expr::Binary(Box::new(when), BinOp::And, Box::new(cond));
            }
            Ok((cond, then_action, else_action, r#async))
        } else {
            let action = self.parse_action()?;
            let cond = pending_when.unwrap_or(Expr::Literal(Literal::Bool(true)));
            Ok((cond, action, None, r#async))
        }
    }

    fn parse_action(&mut self) -> Result<Action, RuleError> {
        if self.ident_keyword("INSERT") {
            self.advance();
            self.expect_ident("INTO")?;
            let table = self.expect_table_name()?;
            self.expect_ident("VALUES")?;
            self.expect(Token::LParen)?;
            let values = self.parse_expr_list(Token::RParen)?;
            self.expect(Token::RParen)?;
            return Ok(Action::InsertInto { table, values });
        }
        if self.ident_keyword("UPDATE") {
            self.advance();
            let table = self.expect_table_name()?;
            self.expect_ident("SET")?;
            let mut assignments = Vec::new();
            loop {
                let field = self.expect_table_name()?;
                self.expect(Token::Assign)?;
                let value = self.parse_expr()?;
                assignments.push((field, value));
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_ident("WHERE")?;
            let condition = self.parse_expr()?;
            return Ok(Action::Update { table, assignments, condition });
        }
        if self.ident_keyword("TRIGGER") {
            self.advance();
            let object = self.parse_expr()?;
            return Ok(Action::Trigger { object });
        }

        // Either `path = expr` (assignment) or `name(args...)` (bare call).
        let path = self.parse_path_segments()?;
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let args = self.parse_expr_list(Token::RParen)?;
            self.expect(Token::RParen)?;
            let name = path.join(".");
            return Ok(Action::Call { name, args });
        }
        self.expect(Token::Assign)?;
        let value = self.parse_expr()?;
        Ok(Action::Assign { target: path, value })
    }

    fn expect_table_name(&mut self) -> Result<String, RuleError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(self.err(format!("expected identifier, found {other}"))),
        }
    }

    fn parse_path_segments(&mut self) -> Result<Vec<String>, RuleError> {
        let mut segs = vec![self.expect_table_name()?];
        while matches!(self.peek(), Token::Dot) {
            self.advance();
            segs.push(self.expect_table_name()?);
        }
        Ok(segs)
    }

    fn parse_expr_list(&mut self, terminator: Token) -> Result<Vec<Expr>, RuleError> {
        let mut out = Vec::new();
        if *self.peek() == terminator {
            return Ok(out);
        }
        loop {
            out.push(self.parse_expr()?);
            if matches!(self.peek(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(out)
    }

    // ── Expression grammar (precedence climbing) ───────────────────────

    fn parse_expr(&mut self) -> Result<Expr, RuleError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(Box::new(lhs), BinOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Neq => BinOp::Neq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Lte => BinOp::Lte,
                Token::Gt => BinOp::Gt,
                Token::Gte => BinOp::Gte,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, RuleError> {
        match self.peek() {
            Token::Not => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, RuleError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Interp(raw) => Ok(Expr::Interpolated(parse_interpolation(&raw)?)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBrace => self.parse_object_literal(),
            Token::Ident(name) => {
                match name.as_str() {
                    "true" => return Ok(Expr::Literal(Literal::Bool(true))),
                    "false" => return Ok(Expr::Literal(Literal::Bool(false))),
                    "null" => return Ok(Expr::Literal(Literal::Null)),
                    _ => {}
                }
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let args = self.parse_expr_list(Token::RParen)?;
                    self.expect(Token::RParen)?;
                    return Ok(Expr::Call(name, args));
                }
                let mut segs = vec![name];
                while matches!(self.peek(), Token::Dot) {
                    self.advance();
                    segs.push(self.expect_table_name()?);
                }
                Ok(Expr::Path(segs))
            }
            other => Err(self.err(format!("unexpected token {other} in expression"))),
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, RuleError> {
        let mut fields = Vec::new();
        if matches!(self.peek(), Token::RBrace) {
            self.advance();
            return Ok(Expr::Object(fields));
        }
        loop {
            let key = match self.advance() {
                Token::Ident(s) => s,
                Token::Str(s) => s,
                other => return Err(self.err(format!("expected object key, found {other}"))),
            };
            self.expect(Token::Colon)?;
            let value = self.parse_expr()?;
            fields.push((key, value));
            match self.advance() {
                Token::Comma => continue,
                Token::RBrace => break,
                other => return Err(self.err(format!("expected `,` or `}}`, found {other}"))),
            }
        }
        Ok(Expr::Object(fields))
    }
}

/// Parse the body of a `${...}`-bearing string into alternating text/expr
/// parts. `raw` still contains the literal `${` `}` markers.
fn parse_interpolation(raw: &str) -> Result<Vec<InterpPart>, RuleError> {
    let mut parts = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            parts.push(InterpPart::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| RuleError::Parse { line: 0, message: "unterminated ${...}".into() })?;
        let expr_src = &after[..end];
        let expr = parse_standalone_expr(expr_src)?;
        parts.push(InterpPart::Expr(expr));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(InterpPart::Text(rest.to_string()));
    }
    Ok(parts)
}

fn parse_standalone_expr(src: &str) -> Result<Expr, RuleError> {
    let tokens = Lexer::tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_expr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Action, Direction, Method};

    #[test]
    fn parses_simple_assignment_rule() {
        let src = "EVENT POST products IN\nIF req.body.price > 20 THEN discount = req.body.price * 0.1\n";
        let set = parse(src).unwrap();
        assert_eq!(set.rules.len(), 1);
        let rule = &set.rules[0];
        assert_eq!(rule.event, Method::Post);
        assert_eq!(rule.resource, "products");
        assert_eq!(rule.direction, Direction::In);
        match &rule.action {
            Action::Assign { target, .. } => assert_eq!(target, &vec!["discount".to_string()]),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn parses_trigger_with_object_literal() {
        let src = "EVENT POST orders IN\nIF req.body.payment_status == 'paid' THEN TRIGGER {type: 'fulfill', orderId: req.body.order_id}\n";
        let set = parse(src).unwrap();
        assert_eq!(set.rules.len(), 1);
        assert!(matches!(set.rules[0].action, Action::Trigger { .. }));
    }

    #[test]
    fn parses_outbound_bucket_with_interpolation() {
        let src = "EVENT GET items OUT\nIF data.secret THEN data.secret = null\n";
        let set = parse(src).unwrap();
        assert_eq!(set.rules[0].direction, Direction::Out);
    }

    #[test]
    fn rejects_statement_before_event_header() {
        let src = "x = 1\n";
        assert!(parse(src).is_err());
    }

    #[test]
    fn parses_insert_and_update_actions() {
        let src = "EVENT POST products IN\nINSERT INTO audit VALUES (req.body.id, NOW())\nUPDATE stock SET qty = qty - 1 WHERE id == req.body.id\n";
        let set = parse(src).unwrap();
        assert_eq!(set.rules.len(), 2);
        assert!(matches!(set.rules[0].action, Action::InsertInto { .. }));
        assert!(matches!(set.rules[1].action, Action::Update { .. }));
    }

    #[test]
    fn when_guard_ands_onto_following_statement() {
        let src = "EVENT POST products IN\nWHEN req.body.price > 100\ndiscount = 5\n";
        let set = parse(src).unwrap();
        assert!(matches!(set.rules[0].condition, Expr::Binary(_, BinOp::And, _)));
    }
}
