//! Crate errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The query is not in the whitelist and was not attached
    /// to the query context.
    #[error("unknown query: {0}")]
    UnknownQuery(String),

    /// No tenant ID attached to the query context.
    #[error("no tenant ID")]
    NoTenantId,

    /// The parser rejected the query.
    #[error("{0}")]
    Parse(#[from] pg_query::Error),

    /// The parser accepted the query but the rewriter cannot
    /// add tenant predicates to it safely.
    #[error("unsupported syntax: {0}")]
    Unsupported(String),

    /// The parse tree doesn't have the shape we expect.
    #[error("unexpected parse tree: {0}")]
    Tree(String),

    #[error("{0}")]
    Postgres(#[from] tokio_postgres::Error),
}
