//! Tenant-isolating wrapper over tokio-postgres.
//!
//! [`Database`] holds the connection configuration, the tenant ID
//! column name, the whitelist and the shared rewrite cache.
//! [`Connection`] rewrites every query before it reaches the wire and
//! appends the tenant ID from the [`QueryContext`] as the final
//! positional parameter.

use std::sync::Arc;

use tokio_postgres::{
    tls::MakeTlsConnect, types::ToSql, Client, Config, NoTls, Row, Socket, Statement,
};
use tracing::{debug, error, trace};

use crate::{
    cache::RewriteCache,
    context::QueryContext,
    error::Error,
    normalize::normalize,
    rewriter::{Rewriter, Transformed},
    whitelist::Whitelist,
};

/// State shared by every connection opened from one [`Database`].
struct Shared {
    tenant_id_col: String,
    whitelist: Whitelist,
    cache: RewriteCache,
}

impl Shared {
    /// Rewrite a query for tenant isolation.
    ///
    /// Lookup order: whitelist, then the context escape hatch gate,
    /// then the dynamic cache, then a fresh parse and rewrite. Errors
    /// are never cached.
    fn rewrite(&self, ctx: &QueryContext, query: &str) -> Result<Transformed, Error> {
        let query = normalize(query);
        if let Some(found) = self.whitelist.get(&query) {
            trace!("whitelist hit");
            return Ok(found.clone());
        }
        match ctx.escaped_query() {
            Some(escaped) if normalize(escaped) == query => {}
            _ => return Err(Error::UnknownQuery(query)),
        }
        if let Some(found) = self.cache.lookup(&query) {
            trace!("rewrite cache hit");
            return Ok(found);
        }

        let ast = pg_query::parse(&query)?;
        let transformed = Rewriter::rewrite(&ast, &self.tenant_id_col)?;
        debug!(
            param = transformed.param,
            rewritten = %transformed.query,
            "query rewritten"
        );
        self.cache.insert(query, transformed.clone());
        Ok(transformed)
    }
}

/// Extend the caller's arguments with the tenant ID when the rewrite
/// reserved a parameter for it.
fn tenant_args<'a>(
    ctx: &'a QueryContext,
    transformed: &Transformed,
    params: &[&'a (dyn ToSql + Sync)],
) -> Result<Vec<&'a (dyn ToSql + Sync)>, Error> {
    let mut args = params.to_vec();
    if transformed.param > 0 {
        args.push(ctx.tenant_id()?);
    }
    Ok(args)
}

/// A database handle: connection configuration plus the tenant
/// isolation setup. Cheap to clone-open connections from.
pub struct Database {
    config: Config,
    shared: Arc<Shared>,
}

impl Database {
    /// Create a database handle from a connection string, the name of
    /// the tenant ID column shared by all tables, and the query
    /// whitelist.
    pub fn open(
        dsn: &str,
        tenant_id_col: impl Into<String>,
        whitelist: Whitelist,
    ) -> Result<Self, Error> {
        let config: Config = dsn.parse()?;
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                tenant_id_col: tenant_id_col.into(),
                whitelist,
                cache: RewriteCache::default(),
            }),
        })
    }

    /// Connect without TLS.
    pub async fn connect(&self) -> Result<Connection, Error> {
        self.connect_with(NoTls).await
    }

    /// Connect with the given TLS setup. The connection driver task is
    /// spawned onto the current tokio runtime.
    pub async fn connect_with<T>(&self, tls: T) -> Result<Connection, Error>
    where
        T: MakeTlsConnect<Socket>,
        T::Stream: Send + 'static,
    {
        let (client, connection) = self.config.connect(tls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(%err, "postgres connection error");
            }
        });
        Ok(Connection {
            client,
            shared: self.shared.clone(),
        })
    }
}

/// A single database connection. All queries issued through it are
/// rewritten for tenant isolation first.
pub struct Connection {
    client: Client,
    shared: Arc<Shared>,
}

impl Connection {
    /// Execute a query and return its rows. The context must carry a
    /// tenant ID unless the rewrite needed none, and the query must be
    /// whitelisted or attached to the context.
    pub async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let transformed = self.shared.rewrite(ctx, query)?;
        let args = tenant_args(ctx, &transformed, params)?;
        Ok(self.client.query(&transformed.query, &args).await?)
    }

    /// Like [`Self::query`], for statements expected to return exactly
    /// one row.
    pub async fn query_one(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, Error> {
        let transformed = self.shared.rewrite(ctx, query)?;
        let args = tenant_args(ctx, &transformed, params)?;
        Ok(self.client.query_one(&transformed.query, &args).await?)
    }

    /// Execute a statement and return the number of rows affected.
    pub async fn execute(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Error> {
        let transformed = self.shared.rewrite(ctx, query)?;
        let args = tenant_args(ctx, &transformed, params)?;
        Ok(self.client.execute(&transformed.query, &args).await?)
    }

    /// Prepare a statement, rewriting it first. Callers executing the
    /// prepared statement must append the tenant ID argument themselves.
    ///
    /// Preparation has no query context, so only whitelisted queries can
    /// be prepared; the escape hatch does not apply here.
    pub async fn prepare(&self, query: &str) -> Result<Statement, Error> {
        let transformed = self.shared.rewrite(&QueryContext::default(), query)?;
        Ok(self.client.prepare(&transformed.query).await?)
    }

    /// Begin a transaction. Queries on the returned handle go through
    /// the same rewrite gate.
    pub async fn transaction(&mut self) -> Result<Transaction<'_>, Error> {
        Ok(Transaction {
            tx: self.client.transaction().await?,
            shared: self.shared.clone(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// An open transaction. Dropping it without [`Transaction::commit`]
/// rolls back, as with tokio-postgres.
pub struct Transaction<'a> {
    tx: tokio_postgres::Transaction<'a>,
    shared: Arc<Shared>,
}

impl Transaction<'_> {
    pub async fn query(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let transformed = self.shared.rewrite(ctx, query)?;
        let args = tenant_args(ctx, &transformed, params)?;
        Ok(self.tx.query(&transformed.query, &args).await?)
    }

    pub async fn execute(
        &self,
        ctx: &QueryContext,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Error> {
        let transformed = self.shared.rewrite(ctx, query)?;
        let args = tenant_args(ctx, &transformed, params)?;
        Ok(self.tx.execute(&transformed.query, &args).await?)
    }

    pub async fn commit(self) -> Result<(), Error> {
        Ok(self.tx.commit().await?)
    }

    pub async fn rollback(self) -> Result<(), Error> {
        Ok(self.tx.rollback().await?)
    }
}
