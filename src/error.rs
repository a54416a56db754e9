//! Error taxonomy. Every layer owns its own error enum (mirroring the
//! teacher's per-module `errors.rs` convention); [`CypherError`] unifies them
//! at the public boundary so nothing ever crosses `execute()` unconverted.

use thiserror::Error;

/// A source position: absolute byte offset plus 1-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("unexpected character at {position:?}")]
pub struct LexError {
    pub position: Position,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

/// Raised by the planner/translator: unbound variables, conflicting MERGE
/// rebinding, unsupported MERGE shapes, unknown functions/procedures,
/// aggregate misuse.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SemanticError {
    #[error("variable '{0}' is not bound")]
    UnboundVariable(String),
    #[error("variable '{0}' is already bound with a conflicting label or property set")]
    ConflictingRebind(String),
    #[error("unsupported MERGE shape")]
    UnsupportedMerge,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unknown procedure '{0}'")]
    UnknownProcedure(String),
    #[error("'{0}' cannot be used as a DELETE target (must be a variable or an indexing expression over one)")]
    InvalidDeleteTarget(String),
    #[error("aggregate expression cannot be used as a GROUP BY key")]
    AggregateMisusedAsGroupKey,
    #[error("minHops cannot exceed maxHops on a variable-length pattern")]
    InvalidHopRange,
    #[error("'{0}' needs a MATCH in this part of the pipeline and can't be evaluated over carried rows alone")]
    UnsupportedCarriedExpr(String),
}

/// Opaque wrapper around whatever the row-store reports. Never includes SQL
/// text, table/column names, or file paths in the message surfaced to
/// callers (spec §7).
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Violations of internal invariants. Should never surface in production;
/// if one is observed the query is aborted without partial results.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("internal invariant violated: {0}")]
pub struct InvariantError(pub String);

#[derive(Debug, Error)]
pub enum CypherError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

/// The `{ error: { message, position?, line?, column? } }` shape from spec §6.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub position: Option<usize>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl CypherError {
    pub fn to_envelope(&self) -> ErrorEnvelope {
        match self {
            CypherError::Lex(e) => ErrorEnvelope {
                message: "malformed query text".to_string(),
                position: Some(e.position.offset),
                line: Some(e.position.line),
                column: Some(e.position.column),
            },
            CypherError::Parse(e) => ErrorEnvelope {
                message: e.message.clone(),
                position: Some(e.position.offset),
                line: Some(e.position.line),
                column: Some(e.position.column),
            },
            CypherError::Semantic(e) => ErrorEnvelope {
                message: e.to_string(),
                position: None,
                line: None,
                column: None,
            },
            CypherError::Store(e) => ErrorEnvelope {
                message: e.to_string(),
                position: None,
                line: None,
                column: None,
            },
            CypherError::Invariant(e) => ErrorEnvelope {
                message: e.to_string(),
                position: None,
                line: None,
                column: None,
            },
        }
    }
}
