//! Pattern-chain grammar (spec §3 NodePattern/EdgePattern/RelationshipPattern,
//! §4.2 pattern chain / variable-length hop spec / edge type alternation).

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::TokenKind;

use super::expression::{parse_expr, parse_property_map};
use super::Parser;

pub fn parse_pattern_list(p: &mut Parser) -> Result<Vec<PathPattern>, ParseError> {
    let mut patterns = vec![parse_single_pattern(p)?];
    while p.eat(&TokenKind::Comma) {
        patterns.push(parse_single_pattern(p)?);
    }
    Ok(patterns)
}

/// `identifier = <chain>` when `=` follows a single leading identifier
/// (spec §4.2 path expression), plain chain otherwise.
pub fn parse_single_pattern(p: &mut Parser) -> Result<PathPattern, ParseError> {
    let path_variable = if let TokenKind::Identifier(name) = p.peek_kind().clone() {
        if matches!(p.tokens[p.pos + 1].kind, TokenKind::Equal) {
            p.advance();
            p.advance();
            Some(name)
        } else {
            None
        }
    } else {
        None
    };
    let element = parse_pattern_element(p)?;
    Ok(PathPattern {
        path_variable,
        element,
    })
}

fn parse_pattern_element(p: &mut Parser) -> Result<PatternElement, ParseError> {
    if p.at_keyword("shortestPath") {
        p.advance();
        p.expect(TokenKind::LParen, "'('")?;
        let inner = parse_pattern_element(p)?;
        p.expect(TokenKind::RParen, "')'")?;
        return Ok(PatternElement::ShortestPath(
            ShortestPathMode::Shortest,
            Box::new(inner),
        ));
    }
    if p.at_keyword("allShortestPaths") {
        p.advance();
        p.expect(TokenKind::LParen, "'('")?;
        let inner = parse_pattern_element(p)?;
        p.expect(TokenKind::RParen, "')'")?;
        return Ok(PatternElement::ShortestPath(
            ShortestPathMode::AllShortest,
            Box::new(inner),
        ));
    }
    parse_chain(p)
}

fn parse_chain(p: &mut Parser) -> Result<PatternElement, ParseError> {
    let mut current = parse_node_pattern(p)?;
    let mut links = Vec::new();
    while is_relationship_start(p) {
        let edge = parse_edge_pattern(p)?;
        let next_is_last = !is_node_pattern_start(p);
        let target = if next_is_last {
            // shouldn't happen: edge must be followed by a node
            return Err(p.error("expected a node pattern to complete the relationship"));
        } else {
            parse_node_pattern(p)?
        };
        // synthesize a variable for an anonymous intermediate node so the
        // next hop's source reuses it (spec §3/§4.2).
        let shared_target = if target.variable.is_none() && is_relationship_start(p) {
            let mut t = target;
            t.variable = Some(p.fresh_anon_var());
            t
        } else {
            target
        };
        links.push(RelationshipPattern {
            source: current,
            edge,
            target: shared_target.clone(),
        });
        current = shared_target;
    }
    if links.is_empty() {
        Ok(PatternElement::Node(current))
    } else {
        Ok(PatternElement::Chain(links))
    }
}

fn is_node_pattern_start(p: &Parser) -> bool {
    p.check(&TokenKind::LParen)
}

fn is_relationship_start(p: &Parser) -> bool {
    matches!(
        p.peek_kind(),
        TokenKind::Minus | TokenKind::ArrowLeft
    )
}

fn parse_node_pattern(p: &mut Parser) -> Result<NodePattern, ParseError> {
    p.expect(TokenKind::LParen, "'('")?;
    // A leading identifier in `(...)` is always the node variable; labels
    // always follow after ':'.
    let variable = if let TokenKind::Identifier(name) = p.peek_kind().clone() {
        p.advance();
        Some(name)
    } else {
        None
    };
    let mut labels = Vec::new();
    while p.eat(&TokenKind::Colon) {
        let label = p.expect_ident("label name")?;
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    let properties = if p.check(&TokenKind::LBrace) {
        Some(parse_property_map(p)?)
    } else {
        None
    };
    p.expect(TokenKind::RParen, "')'")?;
    Ok(NodePattern {
        variable,
        labels,
        properties,
    })
}

fn parse_edge_pattern(p: &mut Parser) -> Result<EdgePattern, ParseError> {
    let mut direction_left = false;
    if p.eat(&TokenKind::ArrowLeft) {
        direction_left = true;
    } else {
        p.expect(TokenKind::Minus, "'-'")?;
    }

    let mut variable = None;
    let mut types = Vec::new();
    let mut properties = None;
    let mut hop_range = None;

    if p.eat(&TokenKind::LBracket) {
        // A leading identifier is always the edge variable; types always
        // follow after ':'.
        if let TokenKind::Identifier(name) = p.peek_kind().clone() {
            p.advance();
            variable = Some(name);
        }
        if p.eat(&TokenKind::Colon) {
            types.push(p.expect_ident("relationship type")?);
            while p.eat(&TokenKind::Pipe) {
                p.eat(&TokenKind::Colon); // colon after '|' is optional (spec §4.2)
                types.push(p.expect_ident("relationship type")?);
            }
        }
        if p.check(&TokenKind::Star) {
            hop_range = Some(parse_hop_range(p)?);
        }
        if p.check(&TokenKind::LBrace) {
            properties = Some(parse_property_map(p)?);
        }
        p.expect(TokenKind::RBracket, "']'")?;
    }

    let direction = if direction_left {
        p.expect(TokenKind::Minus, "'-'")?;
        Direction::Left
    } else if p.eat(&TokenKind::ArrowRight) {
        Direction::Right
    } else if p.eat(&TokenKind::Minus) {
        Direction::Either
    } else {
        return Err(p.error("expected relationship direction ('->', '<-', or '-')"));
    };

    Ok(EdgePattern {
        variable,
        types,
        properties,
        direction,
        hop_range,
    })
}

/// After `*`: absent⇒1..unbounded; `N`⇒min=max=N; `N..M`⇒explicit;
/// `N..`⇒min=N,unbounded; `..M`⇒min=1; `*0..`⇒include zero-length (spec §4.2).
fn parse_hop_range(p: &mut Parser) -> Result<HopRange, ParseError> {
    p.expect(TokenKind::Star, "'*'")?;
    let first = match p.peek_kind().clone() {
        TokenKind::Integer(n) if n >= 0 => {
            p.advance();
            Some(n as u32)
        }
        _ => None,
    };
    if p.eat(&TokenKind::DotDot) {
        let second = match p.peek_kind().clone() {
            TokenKind::Integer(n) if n >= 0 => {
                p.advance();
                Some(n as u32)
            }
            _ => None,
        };
        Ok(HopRange {
            min: first.unwrap_or(1),
            max: second,
        })
    } else {
        match first {
            Some(n) => Ok(HopRange {
                min: n,
                max: Some(n),
            }),
            None => Ok(HopRange { min: 1, max: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn parses_chain_with_shared_anonymous_node() {
        let stmt = parse("MATCH (a)-[:R]->()-[:S]->(c) RETURN a").unwrap();
        if let crate::ast::CypherStatement::Query(q) = stmt {
            if let Clause::Match { patterns, .. } = &q.parts[0].clauses[0] {
                if let PatternElement::Chain(links) = &patterns[0].element {
                    assert_eq!(links.len(), 2);
                    assert_eq!(links[0].target.variable, links[1].source.variable);
                    assert!(links[0].target.variable.is_some());
                    return;
                }
            }
        }
        panic!("expected chain");
    }

    #[test]
    fn parses_variable_length_hop_ranges() {
        let cases = [
            ("[:R*]", HopRange { min: 1, max: None }),
            ("[:R*3]", HopRange { min: 3, max: Some(3) }),
            ("[:R*1..3]", HopRange { min: 1, max: Some(3) }),
            ("[:R*2..]", HopRange { min: 2, max: None }),
            ("[:R*..4]", HopRange { min: 1, max: Some(4) }),
            ("[:R*0..]", HopRange { min: 0, max: None }),
        ];
        for (src, expected) in cases {
            let query = format!("MATCH (a)-{src}->(b) RETURN a");
            let stmt = parse(&query).unwrap();
            if let crate::ast::CypherStatement::Query(q) = stmt {
                if let Clause::Match { patterns, .. } = &q.parts[0].clauses[0] {
                    if let PatternElement::Chain(links) = &patterns[0].element {
                        assert_eq!(links[0].edge.hop_range, Some(expected), "case {src}");
                        continue;
                    }
                }
            }
            panic!("failed to parse {src}");
        }
    }

    #[test]
    fn parses_edge_type_alternation() {
        let stmt = parse("MATCH (a)-[:A|B|:C]->(b) RETURN a").unwrap();
        if let crate::ast::CypherStatement::Query(q) = stmt {
            if let Clause::Match { patterns, .. } = &q.parts[0].clauses[0] {
                if let PatternElement::Chain(links) = &patterns[0].element {
                    assert_eq!(links[0].edge.types, vec!["A", "B", "C"]);
                    return;
                }
            }
        }
        panic!();
    }
}
