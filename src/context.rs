//! Per-query context.
//!
//! Every query and execute call takes a [`QueryContext`] carrying the
//! tenant ID the statement is scoped to, and optionally the query text
//! itself, which authorizes rewriting a statement that is not in the
//! driver's whitelist.

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::error::Error;

/// A tenant identifier.
///
/// The variants cover the value types the PostgreSQL protocol can bind
/// directly: byte strings, 64-bit integers and floats, text, booleans
/// and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantId {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TenantId {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for TenantId {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<bool> for TenantId {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for TenantId {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl ToSql for TenantId {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            TenantId::Bytes(value) => value.to_sql(ty, out),
            TenantId::Int(value) => value.to_sql(ty, out),
            TenantId::Float(value) => value.to_sql(ty, out),
            TenantId::Text(value) => value.to_sql(ty, out),
            TenantId::Bool(value) => value.to_sql(ty, out),
            TenantId::Timestamp(value) => value.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <Vec<u8> as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <bool as ToSql>::accepts(ty)
            || <DateTime<Utc> as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

/// Context attached to a single query or execute call.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    tenant_id: Option<TenantId>,
    query: Option<String>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope all statements issued with this context to the given tenant.
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Authorize rewriting of the given query even if it is not in the
    /// driver's whitelist. The caller takes responsibility for having
    /// vetted the query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// The tenant ID carried by this context.
    pub fn tenant_id(&self) -> Result<&TenantId, Error> {
        self.tenant_id.as_ref().ok_or(Error::NoTenantId)
    }

    pub(crate) fn escaped_query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}
