//! Clause grammars other than MATCH (spec §4.2): CREATE, MERGE, SET, DELETE,
//! RETURN/WITH, UNWIND, CALL. Validation rules enforced at parse time (CREATE
//! forbids untyped/undirected/multi-type/variable-length relationships;
//! DELETE targets must be variable-bound or an indexing expression) live here.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::TokenKind;

use super::expression::parse_expr;
use super::pattern::{parse_pattern_list, parse_single_pattern};
use super::Parser;

pub fn parse_create(p: &mut Parser) -> Result<Clause, ParseError> {
    let patterns = parse_pattern_list(p)?;
    for pattern in &patterns {
        validate_create_pattern(p, &pattern.element)?;
    }
    Ok(Clause::Create { patterns })
}

fn validate_create_pattern(p: &Parser, element: &PatternElement) -> Result<(), ParseError> {
    match element {
        PatternElement::Node(_) => Ok(()),
        PatternElement::ShortestPath(..) => Err(p.error(
            "CREATE does not support shortestPath()/allShortestPaths() patterns",
        )),
        PatternElement::Chain(links) => {
            for link in links {
                if link.edge.direction == Direction::Either {
                    return Err(p.error("CREATE does not support undirected relationships"));
                }
                if link.edge.types.len() != 1 {
                    return Err(
                        p.error("CREATE requires exactly one relationship type (no untyped or multi-type edges)")
                    );
                }
                if link.edge.hop_range.is_some() {
                    return Err(p.error("CREATE does not support variable-length relationships"));
                }
            }
            Ok(())
        }
    }
}

pub fn parse_merge(p: &mut Parser) -> Result<Clause, ParseError> {
    let pattern = parse_single_pattern(p)?;
    let mut on_create = Vec::new();
    let mut on_match = Vec::new();
    loop {
        if p.at_keyword("ON") {
            p.advance();
            if p.eat_keyword("CREATE") {
                p.expect_keyword("SET")?;
                on_create.extend(parse_set_items(p)?);
            } else if p.eat_keyword("MATCH") {
                p.expect_keyword("SET")?;
                on_match.extend(parse_set_items(p)?);
            } else {
                return Err(p.error("expected CREATE or MATCH after ON"));
            }
        } else {
            break;
        }
    }
    Ok(Clause::Merge {
        pattern,
        on_create,
        on_match,
    })
}

pub fn parse_set(p: &mut Parser) -> Result<Clause, ParseError> {
    Ok(Clause::Set {
        items: parse_set_items(p)?,
    })
}

fn parse_set_items(p: &mut Parser) -> Result<Vec<SetItem>, ParseError> {
    let mut items = vec![parse_set_item(p)?];
    while p.eat(&TokenKind::Comma) {
        items.push(parse_set_item(p)?);
    }
    Ok(items)
}

fn parse_set_item(p: &mut Parser) -> Result<SetItem, ParseError> {
    let var = p.expect_ident("variable")?;
    if p.eat(&TokenKind::Dot) {
        let prop = p.expect_ident("property name")?;
        p.expect(TokenKind::Equal, "'='")?;
        let expr = parse_expr(p)?;
        return Ok(SetItem::SetProperty(var, prop, expr));
    }
    if p.eat(&TokenKind::PlusEqual) {
        let expr = parse_expr(p)?;
        return Ok(SetItem::MergeProperties(var, expr));
    }
    if p.eat(&TokenKind::Equal) {
        let expr = parse_expr(p)?;
        return Ok(SetItem::ReplaceProperties(var, expr));
    }
    if p.check(&TokenKind::Colon) {
        let mut labels = Vec::new();
        while p.eat(&TokenKind::Colon) {
            labels.push(p.expect_ident("label name")?);
        }
        return Ok(SetItem::AddLabels(var, labels));
    }
    Err(p.error("expected '.', '=', '+=', or ':' after SET target"))
}

pub fn parse_delete(p: &mut Parser, detach: bool) -> Result<Clause, ParseError> {
    let mut targets = vec![parse_delete_target(p)?];
    while p.eat(&TokenKind::Comma) {
        targets.push(parse_delete_target(p)?);
    }
    Ok(Clause::Delete { detach, targets })
}

fn parse_delete_target(p: &mut Parser) -> Result<Expr, ParseError> {
    let expr = parse_expr(p)?;
    match &expr {
        Expr::Variable(_) => Ok(expr),
        Expr::Index(base, _) if matches!(**base, Expr::Variable(_) | Expr::Property(..)) => {
            Ok(expr)
        }
        _ => Err(p.error(
            "DELETE targets must be a variable or an indexing expression over one",
        )),
    }
}

pub fn parse_return(p: &mut Parser) -> Result<ProjectionClause, ParseError> {
    parse_projection(p, true)
}

pub fn parse_with(p: &mut Parser) -> Result<ProjectionClause, ParseError> {
    parse_projection(p, false)
}

fn parse_projection(p: &mut Parser, is_return: bool) -> Result<ProjectionClause, ParseError> {
    let distinct = p.eat_keyword("DISTINCT");
    let mut clause = ProjectionClause {
        distinct,
        ..Default::default()
    };
    if p.eat(&TokenKind::Star) {
        clause.star = true;
        if p.eat(&TokenKind::Comma) {
            clause.items = parse_projection_items(p)?;
        }
    } else {
        clause.items = parse_projection_items(p)?;
    }

    if !is_return {
        if p.eat_keyword("WHERE") {
            clause.where_ = Some(parse_expr(p)?);
        }
    }
    if p.at_keyword("ORDER") {
        p.advance();
        p.expect_keyword("BY")?;
        clause.order_by = parse_order_by_items(p)?;
    }
    if p.eat_keyword("SKIP") {
        clause.skip = Some(parse_expr(p)?);
    }
    if p.eat_keyword("LIMIT") {
        clause.limit = Some(parse_expr(p)?);
    }
    Ok(clause)
}

fn parse_projection_items(p: &mut Parser) -> Result<Vec<ProjectionItem>, ParseError> {
    let mut items = vec![parse_projection_item(p)?];
    while p.eat(&TokenKind::Comma) {
        items.push(parse_projection_item(p)?);
    }
    Ok(items)
}

fn parse_projection_item(p: &mut Parser) -> Result<ProjectionItem, ParseError> {
    let expr = parse_expr(p)?;
    let alias = if p.eat_keyword("AS") {
        Some(p.expect_ident("alias")?)
    } else {
        None
    };
    Ok(ProjectionItem { expr, alias })
}

fn parse_order_by_items(p: &mut Parser) -> Result<Vec<(Expr, bool)>, ParseError> {
    let mut items = vec![parse_order_by_item(p)?];
    while p.eat(&TokenKind::Comma) {
        items.push(parse_order_by_item(p)?);
    }
    Ok(items)
}

fn parse_order_by_item(p: &mut Parser) -> Result<(Expr, bool), ParseError> {
    let expr = parse_expr(p)?;
    let asc = if p.eat_keyword("ASC") {
        true
    } else if p.eat_keyword("DESC") {
        false
    } else {
        true
    };
    Ok((expr, asc))
}

pub fn parse_unwind(p: &mut Parser) -> Result<Clause, ParseError> {
    let expr = parse_expr(p)?;
    p.expect_keyword("AS")?;
    let alias = p.expect_ident("UNWIND alias")?;
    Ok(Clause::Unwind { expr, alias })
}

pub fn parse_call(p: &mut Parser) -> Result<Clause, ParseError> {
    let mut procedure = p.expect_ident("procedure name")?;
    while p.eat(&TokenKind::Dot) {
        procedure.push('.');
        procedure.push_str(&p.expect_ident("procedure name segment")?);
    }
    p.expect(TokenKind::LParen, "'('")?;
    if !p.check(&TokenKind::RParen) {
        parse_expr(p)?;
        while p.eat(&TokenKind::Comma) {
            parse_expr(p)?;
        }
    }
    p.expect(TokenKind::RParen, "')'")?;
    let yield_items = if p.eat_keyword("YIELD") {
        let mut names = vec![p.expect_ident("yield name")?];
        while p.eat(&TokenKind::Comma) {
            names.push(p.expect_ident("yield name")?);
        }
        Some(names)
    } else {
        None
    };
    let where_ = if yield_items.is_some() && p.eat_keyword("WHERE") {
        Some(parse_expr(p)?)
    } else {
        None
    };
    Ok(Clause::Call {
        procedure,
        yield_items,
        where_,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn create_rejects_undirected_relationship() {
        let err = parse("CREATE (a)-[:R]-(b)").unwrap_err();
        assert!(err.message.contains("undirected"));
    }

    #[test]
    fn create_rejects_multi_type() {
        let err = parse("CREATE (a)-[:R|S]->(b)").unwrap_err();
        assert!(err.message.contains("one relationship type"));
    }

    #[test]
    fn create_rejects_variable_length() {
        let err = parse("CREATE (a)-[:R*1..3]->(b)").unwrap_err();
        assert!(err.message.contains("variable-length"));
    }

    #[test]
    fn delete_rejects_non_variable_target() {
        let err = parse("MATCH (n) DELETE n.name").unwrap_err();
        assert!(err.message.contains("DELETE targets"));
    }

    #[test]
    fn delete_accepts_list_indexing_target() {
        let ast = parse("MATCH (n) WITH collect(n) AS ns DELETE ns[0]").unwrap();
        assert!(matches!(ast, CypherStatement::Query(_)));
    }

    #[test]
    fn parses_set_merge_and_labels() {
        let ast = parse("MATCH (n) SET n.a = 1, n += {b: 2}, n:Foo:Bar").unwrap();
        if let CypherStatement::Query(q) = ast {
            if let Clause::Set { items } = &q.parts[0].clauses[1] {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[0], SetItem::SetProperty(..)));
                assert!(matches!(items[1], SetItem::MergeProperties(..)));
                assert!(matches!(items[2], SetItem::AddLabels(..)));
                return;
            }
        }
        panic!();
    }
}
