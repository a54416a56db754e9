//! Expression grammar (spec §3 Expression / WhereCondition variants, §4.2
//! disambiguation rules for list literal vs. comprehension vs. predicate).

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::TokenKind;

use super::Parser;

pub fn parse_expr(p: &mut Parser) -> Result<Expr, ParseError> {
    parse_or(p)
}

fn parse_or(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut lhs = parse_xor(p)?;
    while p.eat_keyword("OR") {
        let rhs = parse_xor(p)?;
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_xor(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut lhs = parse_and(p)?;
    while p.eat_keyword("XOR") {
        let rhs = parse_and(p)?;
        lhs = Expr::Xor(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut lhs = parse_not(p)?;
    while p.eat_keyword("AND") {
        let rhs = parse_not(p)?;
        lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_not(p: &mut Parser) -> Result<Expr, ParseError> {
    if p.eat_keyword("NOT") {
        let inner = parse_not(p)?;
        return Ok(Expr::Not(Box::new(inner)));
    }
    parse_comparison(p)
}

fn parse_comparison(p: &mut Parser) -> Result<Expr, ParseError> {
    let lhs = parse_additive(p)?;
    parse_comparison_tail(p, lhs)
}

fn parse_comparison_tail(p: &mut Parser, lhs: Expr) -> Result<Expr, ParseError> {
    if p.at_keyword("IS") {
        p.advance();
        let negate = p.eat_keyword("NOT");
        p.expect_keyword("NULL")?;
        return Ok(Expr::IsNull(Box::new(lhs), negate));
    }
    if p.at_keyword("IN") {
        p.advance();
        let rhs = parse_additive(p)?;
        return Ok(Expr::InList(Box::new(lhs), Box::new(rhs)));
    }
    if p.at_keyword("CONTAINS") {
        p.advance();
        let rhs = parse_additive(p)?;
        return Ok(Expr::StringPredicate {
            kind: StringPredicateKind::Contains,
            subject: Box::new(lhs),
            pattern: Box::new(rhs),
        });
    }
    if p.at_keyword("STARTS") {
        p.advance();
        p.expect_keyword("WITH")?;
        let rhs = parse_additive(p)?;
        return Ok(Expr::StringPredicate {
            kind: StringPredicateKind::StartsWith,
            subject: Box::new(lhs),
            pattern: Box::new(rhs),
        });
    }
    if p.at_keyword("ENDS") {
        p.advance();
        p.expect_keyword("WITH")?;
        let rhs = parse_additive(p)?;
        return Ok(Expr::StringPredicate {
            kind: StringPredicateKind::EndsWith,
            subject: Box::new(lhs),
            pattern: Box::new(rhs),
        });
    }
    let op = match p.peek_kind() {
        TokenKind::Equal => Some(CompareOp::Eq),
        TokenKind::Ne => Some(CompareOp::Ne),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::Le => Some(CompareOp::Le),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::Ge => Some(CompareOp::Ge),
        _ => None,
    };
    if let Some(op) = op {
        p.advance();
        let rhs = parse_additive(p)?;
        return Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)));
    }
    Ok(lhs)
}

fn parse_additive(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut lhs = parse_multiplicative(p)?;
    loop {
        let op = match p.peek_kind() {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            _ => break,
        };
        p.advance();
        let rhs = parse_multiplicative(p)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_multiplicative(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut lhs = parse_power(p)?;
    loop {
        let op = match p.peek_kind() {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => break,
        };
        p.advance();
        let rhs = parse_power(p)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_power(p: &mut Parser) -> Result<Expr, ParseError> {
    let lhs = parse_unary(p)?;
    if p.check(&TokenKind::Caret) {
        p.advance();
        let rhs = parse_power(p)?; // right-assoc
        return Ok(Expr::Binary(BinaryOp::Pow, Box::new(lhs), Box::new(rhs)));
    }
    Ok(lhs)
}

fn parse_unary(p: &mut Parser) -> Result<Expr, ParseError> {
    if p.check(&TokenKind::Minus) {
        p.advance();
        let inner = parse_unary(p)?;
        return Ok(Expr::Neg(Box::new(inner)));
    }
    if p.check(&TokenKind::Plus) {
        p.advance();
        return parse_unary(p);
    }
    parse_postfix(p)
}

fn parse_postfix(p: &mut Parser) -> Result<Expr, ParseError> {
    let mut expr = parse_primary(p)?;
    loop {
        if p.eat(&TokenKind::Dot) {
            let name = p.expect_ident("property name")?;
            expr = Expr::Property(Box::new(expr), name);
        } else if p.eat(&TokenKind::LBracket) {
            expr = parse_index_or_slice(p, expr)?;
        } else {
            break;
        }
    }
    Ok(expr)
}

fn parse_index_or_slice(p: &mut Parser, base: Expr) -> Result<Expr, ParseError> {
    if p.eat(&TokenKind::DotDot) {
        let hi = if p.check(&TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(parse_expr(p)?))
        };
        p.expect(TokenKind::RBracket, "']'")?;
        return Ok(Expr::Slice(Box::new(base), None, hi));
    }
    let first = parse_expr(p)?;
    if p.eat(&TokenKind::DotDot) {
        let hi = if p.check(&TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(parse_expr(p)?))
        };
        p.expect(TokenKind::RBracket, "']'")?;
        return Ok(Expr::Slice(Box::new(base), Some(Box::new(first)), hi));
    }
    p.expect(TokenKind::RBracket, "']'")?;
    Ok(Expr::Index(Box::new(base), Box::new(first)))
}

fn parse_primary(p: &mut Parser) -> Result<Expr, ParseError> {
    match p.peek_kind().clone() {
        TokenKind::Integer(i) => {
            p.advance();
            Ok(Expr::Literal(Value::Int(i)))
        }
        TokenKind::Float(f) => {
            p.advance();
            Ok(Expr::Literal(Value::Float(f)))
        }
        TokenKind::Str(s) => {
            p.advance();
            Ok(Expr::Literal(Value::Str(s)))
        }
        TokenKind::Parameter(name) => {
            p.advance();
            Ok(Expr::Parameter(name))
        }
        TokenKind::LBracket => parse_bracket_expr(p),
        TokenKind::LBrace => parse_object_literal(p).map(Expr::ObjectLiteral),
        TokenKind::LParen => parse_paren_expr(p),
        TokenKind::Identifier(name) => parse_identifier_led(p, name),
        _ => Err(p.error("expected an expression")),
    }
}

fn parse_identifier_led(p: &mut Parser, name: String) -> Result<Expr, ParseError> {
    let upper = name.to_uppercase();
    match upper.as_str() {
        "TRUE" => {
            p.advance();
            return Ok(Expr::Literal(Value::Bool(true)));
        }
        "FALSE" => {
            p.advance();
            return Ok(Expr::Literal(Value::Bool(false)));
        }
        "NULL" => {
            p.advance();
            return Ok(Expr::Literal(Value::Null));
        }
        "NOT" => {
            p.advance();
            let inner = parse_not_as_primary(p)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        "CASE" => {
            p.advance();
            return parse_case(p);
        }
        "ALL" | "ANY" | "NONE" | "SINGLE" => {
            if peek_is_lparen(p) {
                p.advance();
                return parse_list_predicate(p, &upper);
            }
        }
        "EXISTS" => {
            if peek_is_lparen(p) {
                p.advance();
                return parse_exists(p);
            }
        }
        _ => {}
    }
    p.advance();
    // function call: NAME(...)
    if p.check(&TokenKind::LParen) {
        return parse_function_call(p, name);
    }
    Ok(Expr::Variable(name))
}

fn parse_not_as_primary(p: &mut Parser) -> Result<Expr, ParseError> {
    // `NOT` used inside an expression position (list predicate filters etc.)
    parse_comparison(p)
}

fn peek_is_lparen(p: &Parser) -> bool {
    matches!(p.peek_kind(), TokenKind::LParen)
}

fn parse_function_call(p: &mut Parser, name: String) -> Result<Expr, ParseError> {
    p.expect(TokenKind::LParen, "'('")?;
    let distinct = p.eat_keyword("DISTINCT");
    let mut args = Vec::new();
    if !p.check(&TokenKind::RParen) {
        if name.eq_ignore_ascii_case("count") && p.check(&TokenKind::Star) {
            p.advance();
            args.push(Expr::Literal(Value::Str("*".to_string())));
        } else {
            args.push(parse_expr(p)?);
            while p.eat(&TokenKind::Comma) {
                args.push(parse_expr(p)?);
            }
        }
    }
    p.expect(TokenKind::RParen, "')'")?;
    Ok(Expr::FunctionCall {
        name,
        args,
        distinct,
    })
}

fn parse_case(p: &mut Parser) -> Result<Expr, ParseError> {
    let subject = if p.at_keyword("WHEN") {
        None
    } else {
        Some(Box::new(parse_expr(p)?))
    };
    let mut whens = Vec::new();
    while p.eat_keyword("WHEN") {
        let cond = parse_expr(p)?;
        p.expect_keyword("THEN")?;
        let result = parse_expr(p)?;
        whens.push((cond, result));
    }
    let else_ = if p.eat_keyword("ELSE") {
        Some(Box::new(parse_expr(p)?))
    } else {
        None
    };
    p.expect_keyword("END")?;
    Ok(Expr::Case {
        subject,
        whens,
        else_,
    })
}

/// `[x IN list WHERE cond | expr]` vs `[1,2,3]`, disambiguated by lookahead
/// for `identifier IN` right after `[` (spec §4.2).
fn parse_bracket_expr(p: &mut Parser) -> Result<Expr, ParseError> {
    p.advance(); // [
    if is_comprehension_lead(p) {
        let var = p.expect_ident("comprehension variable")?;
        p.expect_keyword("IN")?;
        let source = parse_expr(p)?;
        let filter = if p.eat_keyword("WHERE") {
            Some(Box::new(parse_expr(p)?))
        } else {
            None
        };
        let map = if p.eat(&TokenKind::Pipe) {
            Some(Box::new(parse_expr(p)?))
        } else {
            None
        };
        p.expect(TokenKind::RBracket, "']'")?;
        return Ok(Expr::ListComprehension {
            var,
            source: Box::new(source),
            filter,
            map,
        });
    }
    let mut items = Vec::new();
    if !p.check(&TokenKind::RBracket) {
        items.push(parse_expr(p)?);
        while p.eat(&TokenKind::Comma) {
            items.push(parse_expr(p)?);
        }
    }
    p.expect(TokenKind::RBracket, "']'")?;
    Ok(Expr::ListLiteral(items))
}

fn is_comprehension_lead(p: &Parser) -> bool {
    matches!(p.peek_kind(), TokenKind::Identifier(s) if !crate::lexer::is_reserved(s))
        && matches!(
            &p.tokens[p.pos + 1].kind,
            TokenKind::Identifier(s2) if s2.eq_ignore_ascii_case("IN")
        )
}

fn parse_list_predicate(p: &mut Parser, kind_word: &str) -> Result<Expr, ParseError> {
    p.expect(TokenKind::LParen, "'('")?;
    let var = p.expect_ident("predicate variable")?;
    p.expect_keyword("IN")?;
    let source = parse_expr(p)?;
    p.expect_keyword("WHERE")?;
    let filter = parse_expr(p)?;
    p.expect(TokenKind::RParen, "')'")?;
    let kind = match kind_word {
        "ALL" => ListPredicateKind::All,
        "ANY" => ListPredicateKind::Any,
        "NONE" => ListPredicateKind::None,
        "SINGLE" => ListPredicateKind::Single,
        _ => unreachable!(),
    };
    Ok(Expr::ListPredicate {
        kind,
        var,
        source: Box::new(source),
        filter: Box::new(filter),
    })
}

fn parse_exists(p: &mut Parser) -> Result<Expr, ParseError> {
    p.expect(TokenKind::LParen, "'('")?;
    let pattern = super::pattern::parse_single_pattern(p)?;
    p.expect(TokenKind::RParen, "')'")?;
    Ok(Expr::PatternExists(Box::new(pattern)))
}

fn parse_object_literal(p: &mut Parser) -> Result<Vec<(String, Expr)>, ParseError> {
    p.expect(TokenKind::LBrace, "'{'")?;
    let mut entries = Vec::new();
    if !p.check(&TokenKind::RBrace) {
        entries.push(parse_object_entry(p)?);
        while p.eat(&TokenKind::Comma) {
            entries.push(parse_object_entry(p)?);
        }
    }
    p.expect(TokenKind::RBrace, "'}'")?;
    Ok(entries)
}

fn parse_object_entry(p: &mut Parser) -> Result<(String, Expr), ParseError> {
    let key = p.expect_ident("property key")?;
    p.expect(TokenKind::Colon, "':'")?;
    let value = parse_expr(p)?;
    Ok((key, value))
}

/// Parenthesized expression, or a label predicate `(v:L1:L2)` (spec §3).
fn parse_paren_expr(p: &mut Parser) -> Result<Expr, ParseError> {
    p.advance(); // (
    // Try label predicate: identifier directly followed by ':'.
    if let TokenKind::Identifier(name) = p.peek_kind().clone() {
        if matches!(p.tokens[p.pos + 1].kind, TokenKind::Colon) {
            p.advance(); // identifier
            let mut labels = Vec::new();
            while p.eat(&TokenKind::Colon) {
                labels.push(p.expect_ident("label name")?);
            }
            p.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::LabelPredicate { var: name, labels });
        }
    }
    let inner = parse_expr(p)?;
    p.expect(TokenKind::RParen, "')'")?;
    Ok(inner)
}

pub(super) fn parse_property_map(p: &mut Parser) -> Result<Vec<(String, Expr)>, ParseError> {
    parse_object_literal(p)
}
