//! Recursive-descent parser (spec §4.2). `parse()` returns `Ok(CypherStatement)`
//! or `Err(ParseError)`; it never panics and never partially mutates caller
//! state (the `Parser` struct is local to one call).

mod clauses;
mod expression;
mod pattern;

use crate::ast::*;
use crate::error::{ParseError, Position};
use crate::lexer::{self, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Counter for synthesizing variable names for anonymous intermediate
    /// nodes in a pattern chain (spec §3, §4.2).
    anon_counter: usize,
}

pub fn parse(source: &str) -> Result<CypherStatement, ParseError> {
    let tokens = lexer::tokenize(source).map_err(|e| ParseError {
        message: "malformed query text".to_string(),
        position: e.position,
    })?;
    let mut parser = Parser::new(tokens);
    parser.parse_statement()
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            anon_counter: 0,
        }
    }

    fn fresh_anon_var(&mut self) -> String {
        self.anon_counter += 1;
        format!("__anon{}", self.anon_counter)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn position(&self) -> Position {
        self.peek().position
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.position(),
        }
    }

    /// True if the current token is an identifier matching `word`
    /// case-insensitively (reserved or not — many keyword positions in this
    /// grammar double as identifier positions, spec §9).
    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(s) if s.eq_ignore_ascii_case(word))
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{word}'")))
        }
    }

    /// Consume an identifier token, permissive of reserved words (property
    /// keys, YIELD names, labels/types — spec §9).
    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn parse_statement(&mut self) -> Result<CypherStatement, ParseError> {
        if self.at_keyword("CALL") && self.looks_like_standalone_call() {
            return self.parse_standalone_procedure_call().map(CypherStatement::ProcedureCall);
        }
        let query = self.parse_query()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.error("unexpected trailing input after query"));
        }
        Ok(CypherStatement::Query(query))
    }

    /// A standalone `CALL proc() [YIELD ...]` with no other clauses.
    fn looks_like_standalone_call(&self) -> bool {
        // Lookahead without consuming: scan forward past the CALL ... until we
        // hit RETURN/WITH/EOF; if we never see another leading reading/write
        // clause keyword, treat as standalone.
        let mut i = self.pos;
        let mut depth = 0i32;
        while i < self.tokens.len() {
            match &self.tokens[i].kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                TokenKind::Eof => return true,
                TokenKind::Identifier(s) if depth == 0 => {
                    let up = s.to_uppercase();
                    if i != self.pos
                        && matches!(
                            up.as_str(),
                            "MATCH" | "OPTIONAL" | "CREATE" | "MERGE" | "SET" | "DELETE"
                                | "DETACH" | "RETURN" | "WITH" | "UNWIND" | "UNION"
                        )
                    {
                        return false;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        true
    }

    fn parse_query(&mut self) -> Result<Query, ParseError> {
        let mut parts = vec![self.parse_single_query()?];
        let mut union_all = Vec::new();
        while self.eat_keyword("UNION") {
            let all = self.eat_keyword("ALL");
            union_all.push(all);
            parts.push(self.parse_single_query()?);
        }
        Ok(Query { parts, union_all })
    }

    fn parse_single_query(&mut self) -> Result<SingleQuery, ParseError> {
        let mut clauses = Vec::new();
        loop {
            if self.check(&TokenKind::Eof) || self.at_keyword("UNION") {
                break;
            }
            clauses.push(self.parse_clause()?);
        }
        Ok(SingleQuery { clauses })
    }

    fn parse_clause(&mut self) -> Result<Clause, ParseError> {
        if self.at_keyword("OPTIONAL") {
            self.advance();
            self.expect_keyword("MATCH")?;
            return self.parse_match_body(true);
        }
        if self.at_keyword("MATCH") {
            self.advance();
            return self.parse_match_body(false);
        }
        if self.at_keyword("CREATE") {
            self.advance();
            return clauses::parse_create(self);
        }
        if self.at_keyword("MERGE") {
            self.advance();
            return clauses::parse_merge(self);
        }
        if self.at_keyword("SET") {
            self.advance();
            return clauses::parse_set(self);
        }
        if self.at_keyword("DETACH") {
            self.advance();
            self.expect_keyword("DELETE")?;
            return clauses::parse_delete(self, true);
        }
        if self.at_keyword("DELETE") {
            self.advance();
            return clauses::parse_delete(self, false);
        }
        if self.at_keyword("RETURN") {
            self.advance();
            return clauses::parse_return(self).map(Clause::Return);
        }
        if self.at_keyword("WITH") {
            self.advance();
            return clauses::parse_with(self).map(Clause::With);
        }
        if self.at_keyword("UNWIND") {
            self.advance();
            return clauses::parse_unwind(self);
        }
        if self.at_keyword("CALL") {
            self.advance();
            return clauses::parse_call(self);
        }
        Err(self.error("expected a clause (MATCH, CREATE, MERGE, SET, DELETE, RETURN, WITH, UNWIND, CALL)"))
    }

    fn parse_match_body(&mut self, optional: bool) -> Result<Clause, ParseError> {
        let patterns = pattern::parse_pattern_list(self)?;
        let where_ = if self.eat_keyword("WHERE") {
            Some(expression::parse_expr(self)?)
        } else {
            None
        };
        if optional {
            Ok(Clause::OptionalMatch { patterns, where_ })
        } else {
            Ok(Clause::Match { patterns, where_ })
        }
    }

    fn parse_standalone_procedure_call(&mut self) -> Result<StandaloneProcedureCall, ParseError> {
        self.advance(); // CALL
        match clauses::parse_call(self)? {
            Clause::Call {
                procedure,
                yield_items,
                where_,
            } => Ok(StandaloneProcedureCall {
                procedure_name: procedure,
                yield_items,
                where_,
            }),
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_match_return() {
        let stmt = parse("MATCH (n:User) RETURN n.name").unwrap();
        match stmt {
            CypherStatement::Query(q) => {
                assert_eq!(q.parts.len(), 1);
                assert_eq!(q.parts[0].clauses.len(), 2);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn rejects_garbage() {
        let err = parse("MATCH (n) RETURN n ) )").unwrap_err();
        assert!(err.position.offset > 0 || !err.message.is_empty());
    }

    #[test]
    fn parses_standalone_call() {
        let stmt = parse("CALL db.labels() YIELD label RETURN label").unwrap();
        match stmt {
            CypherStatement::Query(q) => {
                assert!(matches!(q.parts[0].clauses[0], Clause::Call { .. }));
            }
            _ => panic!(),
        }
    }
}
