//! Automatic tenant isolation for PostgreSQL queries.
//!
//! Connections made through this crate rewrite every SQL statement so
//! that WHERE clauses always carry an `... AND tenant_id = ...`
//! predicate and every INSERT records the current tenant. The rewrite
//! works on the parse tree, not on query text, so predicates land in
//! every place they are semantically required: join conditions,
//! subqueries, CTE bodies, `ON CONFLICT` targets.
//!
//! This removes the class of data leak where one forgotten predicate in
//! one query exposes another tenant's rows. The tenant ID column name
//! is configurable, but every table in the schema must have it.
//!
//! Queries a connection may execute are declared up front in a
//! [`Whitelist`], which doubles as a precomputed rewrite cache. Ad-hoc
//! queries must be attached to the [`QueryContext`] explicitly. Keep
//! the whitelist honest with [`whitelist::verify`] in your test suite.
//!
//! A large subset of PostgreSQL's query syntax is supported. Anything
//! the rewriter cannot isolate safely is rejected with
//! [`Error::Unsupported`] rather than passed through.

mod cache;
mod normalize;

pub mod context;
pub mod database;
pub mod error;
pub mod rewriter;
pub mod whitelist;

pub use context::{QueryContext, TenantId};
pub use database::{Connection, Database, Transaction};
pub use error::Error;
pub use rewriter::{rewrite, Transformed};
pub use whitelist::Whitelist;
