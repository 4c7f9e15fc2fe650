//! The SQL rewriter.
//!
//! Takes one parsed SELECT, INSERT, UPDATE or DELETE statement and emits
//! an equivalent statement in which every table access is constrained by
//! the tenant ID column, and every insert records the current tenant.
//! The tenant value itself arrives as one extra positional parameter,
//! numbered after the highest parameter already in the query.
//!
//! Missing a predicate here is a cross-tenant data leak, so the rewriter
//! is strict: any construct it does not recognize aborts the rewrite
//! with an error instead of passing through.

pub(crate) mod emit;
pub(crate) mod env;
pub(crate) mod params;

mod expr;
mod stmt;

use pg_query::{Node, NodeEnum, ParseResult};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use env::Env;

/// A rewritten query and the positional parameter reserved for the
/// tenant ID value. `param == 0` means the query needed no tenant ID
/// (for example a bare `SELECT nextval('...')`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformed {
    pub query: String,
    #[serde(default)]
    pub param: i32,
}

/// Parse and rewrite a single statement.
///
/// Useful for authoring whitelists; the driver path caches rewrites and
/// should be preferred at runtime.
pub fn rewrite(query: &str, tenant_id_col: &str) -> Result<Transformed, Error> {
    let ast = pg_query::parse(query)?;
    Rewriter::rewrite(&ast, tenant_id_col)
}

/// Single-statement rewriter. One instance per rewrite.
pub(crate) struct Rewriter<'a> {
    tenant_col: &'a str,
    /// Positional parameter reserved for the tenant ID value.
    tenant_param: i32,
    /// Whether the tenant parameter was actually emitted anywhere.
    injected: bool,
}

impl<'a> Rewriter<'a> {
    pub(crate) fn rewrite(ast: &ParseResult, tenant_col: &'a str) -> Result<Transformed, Error> {
        let stmts = &ast.protobuf.stmts;
        if stmts.len() != 1 {
            return Err(Error::Tree(format!(
                "{} statements in parse tree, expected 1",
                stmts.len()
            )));
        }
        let node = stmts[0]
            .stmt
            .as_deref()
            .and_then(|node| node.node.as_ref())
            .ok_or_else(|| Error::Tree("empty statement".into()))?;

        let mut rewriter = Rewriter {
            tenant_col,
            tenant_param: params::max_param(&ast.protobuf) + 1,
            injected: false,
        };
        let mut out = String::new();
        rewriter.statement(&mut out, node)?;

        let param = if rewriter.injected {
            rewriter.tenant_param
        } else {
            0
        };
        Ok(Transformed { query: out, param })
    }

    fn statement<'t>(&mut self, out: &mut String, node: &'t NodeEnum) -> Result<(), Error> {
        let mut env = Env::default();
        match node {
            NodeEnum::RawStmt(raw) => {
                let inner = raw
                    .stmt
                    .as_deref()
                    .and_then(|node| node.node.as_ref())
                    .ok_or_else(|| Error::Tree("empty raw statement".into()))?;
                self.statement(out, inner)
            }
            NodeEnum::InsertStmt(stmt) => self.insert_stmt(out, stmt, &mut env),
            NodeEnum::SelectStmt(stmt) => self.select_stmt(out, stmt, &mut env, false),
            NodeEnum::UpdateStmt(stmt) => self.update_stmt(out, stmt, &mut env),
            NodeEnum::DeleteStmt(stmt) => self.delete_stmt(out, stmt, &mut env),
            other => Err(Error::Unsupported(format!(
                "{} statement",
                describe(other)
            ))),
        }
    }

    /// Emit the reserved tenant ID parameter.
    fn push_tenant_param(&mut self, out: &mut String) {
        out.push('$');
        out.push_str(&self.tenant_param.to_string());
        self.injected = true;
    }

    /// Emit `items` separated by commas, each through `f`.
    fn comma_list<'t>(
        &mut self,
        out: &mut String,
        items: &'t [Node],
        env: &mut Env<'t>,
        mut f: impl FnMut(&mut Self, &mut String, &'t Node, &mut Env<'t>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            f(self, out, item, env)?;
        }
        Ok(())
    }
}

/// Unwrap the enum out of a node, erroring on the (theoretically
/// impossible) empty node.
fn node_enum(node: &Node) -> Result<&NodeEnum, Error> {
    node.node
        .as_ref()
        .ok_or_else(|| Error::Tree("empty node".into()))
}

/// Human-readable name of a node kind for error messages.
fn describe(node: &NodeEnum) -> &'static str {
    match node {
        NodeEnum::SelectStmt(_) => "SELECT",
        NodeEnum::InsertStmt(_) => "INSERT",
        NodeEnum::UpdateStmt(_) => "UPDATE",
        NodeEnum::DeleteStmt(_) => "DELETE",
        NodeEnum::CreateStmt(_) | NodeEnum::IndexStmt(_) | NodeEnum::AlterTableStmt(_) => "DDL",
        NodeEnum::DropStmt(_) => "DROP",
        NodeEnum::TruncateStmt(_) => "TRUNCATE",
        NodeEnum::CopyStmt(_) => "COPY",
        NodeEnum::TransactionStmt(_) => "transaction control",
        NodeEnum::VariableSetStmt(_) => "SET",
        NodeEnum::ExplainStmt(_) => "EXPLAIN",
        NodeEnum::AIndirection(_) => "subscript or field selection",
        NodeEnum::AArrayExpr(_) => "ARRAY constructor",
        NodeEnum::WindowFunc(_) | NodeEnum::WindowDef(_) => "window function",
        NodeEnum::GroupingFunc(_) | NodeEnum::GroupingSet(_) => "grouping set",
        NodeEnum::MinMaxExpr(_) => "GREATEST/LEAST",
        NodeEnum::BooleanTest(_) => "IS TRUE/IS FALSE test",
        NodeEnum::CollateClause(_) => "COLLATE",
        NodeEnum::MultiAssignRef(_) => "multiple-column assignment",
        NodeEnum::XmlExpr(_) => "XML expression",
        _ => "unrecognized syntax",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ok(query: &str) -> Transformed {
        rewrite(query, "tenant_id").unwrap()
    }

    fn err(query: &str) -> Error {
        rewrite(query, "tenant_id").unwrap_err()
    }

    #[test]
    fn select_single_table() {
        let t = ok("SELECT foo FROM bar");
        assert_eq!(t.query, "SELECT foo FROM bar WHERE tenant_id = $1");
        assert_eq!(t.param, 1);
    }

    #[test]
    fn select_without_tables() {
        let t = ok("SELECT nextval('salt')");
        assert_eq!(t.query, "SELECT nextval('salt')");
        assert_eq!(t.param, 0);
    }

    #[test]
    fn select_appends_to_existing_where() {
        let t = ok("SELECT a FROM foo WHERE b = $1");
        assert_eq!(t.query, "SELECT a FROM foo WHERE b = $1 AND tenant_id = $2");
        assert_eq!(t.param, 2);
    }

    #[test]
    fn or_condition_is_parenthesized() {
        let t = ok("SELECT a FROM foo WHERE b = $1 OR c = $1");
        assert_eq!(
            t.query,
            "SELECT a FROM foo WHERE (b = $1 OR c = $1) AND tenant_id = $2"
        );
    }

    #[test]
    fn insert_values() {
        let t = ok("INSERT INTO foo (a, b) VALUES ($1, $2)");
        assert_eq!(
            t.query,
            "INSERT INTO foo (a, b, tenant_id) VALUES ($1, $2, $3)"
        );
        assert_eq!(t.param, 3);
    }

    #[test]
    fn delete_using_qualifies_both_tables() {
        let t = ok("DELETE FROM cotton USING lamp WHERE lamp.x = cotton.y");
        assert_eq!(
            t.query,
            "DELETE FROM cotton USING lamp WHERE lamp.x = cotton.y \
             AND cotton.tenant_id = $1 AND lamp.tenant_id = $1"
        );
        assert_eq!(t.param, 1);
    }

    #[test]
    fn on_conflict_target_gains_tenant_column() {
        let t = ok("INSERT INTO t (a) VALUES ($1) ON CONFLICT (a) DO NOTHING");
        assert_eq!(
            t.query,
            "INSERT INTO t (a, tenant_id) VALUES ($1, $2) \
             ON CONFLICT (a, tenant_id) DO NOTHING"
        );
        assert_eq!(t.param, 2);
    }

    #[test]
    fn left_join_anchor_predicate_moves_to_where() {
        let t = ok("SELECT x FROM l LEFT JOIN r ON l.k = r.k");
        assert_eq!(
            t.query,
            "SELECT x FROM l LEFT JOIN r ON l.k = r.k AND r.tenant_id = $1 \
             WHERE l.tenant_id = $1"
        );
        assert_eq!(t.param, 1);
    }

    #[test]
    fn two_tables_qualified_in_lexicographic_order() {
        let t = ok("SELECT 1 FROM zebra, apple");
        assert_eq!(
            t.query,
            "SELECT 1 FROM zebra, apple WHERE apple.tenant_id = $1 AND zebra.tenant_id = $1"
        );
    }

    #[test]
    fn update_without_where_gets_fabricated_predicate() {
        let t = ok("UPDATE nose SET shop = $1");
        assert_eq!(t.query, "UPDATE nose SET shop = $1 WHERE tenant_id = $2");
        assert_eq!(t.param, 2);
    }

    #[test]
    fn update_without_where_keeps_returning() {
        let t = ok("UPDATE nose SET shop = $1 RETURNING dollar");
        assert_eq!(
            t.query,
            "UPDATE nose SET shop = $1 WHERE tenant_id = $2 RETURNING dollar"
        );
    }

    #[test]
    fn delete_keeps_returning() {
        let t = ok("DELETE FROM throw WHERE dollar = $1 RETURNING dollar");
        assert_eq!(
            t.query,
            "DELETE FROM throw WHERE dollar = $1 AND tenant_id = $2 RETURNING dollar"
        );
    }

    #[test]
    fn top_level_star_is_allowed() {
        let t = ok("SELECT * FROM bar");
        assert_eq!(t.query, "SELECT * FROM bar WHERE tenant_id = $1");
    }

    #[test]
    fn select_offset_is_kept() {
        let t = ok("SELECT a FROM t ORDER BY a LIMIT $1 OFFSET $2");
        assert_eq!(
            t.query,
            "SELECT a FROM t WHERE tenant_id = $3 ORDER BY a LIMIT $1 OFFSET $2"
        );
        assert_eq!(t.param, 3);
    }

    #[test]
    fn cte_names_do_not_get_predicates() {
        let t = ok("WITH steel AS (SELECT dollar FROM nose) SELECT dollar FROM steel");
        assert_eq!(
            t.query,
            "WITH steel AS (SELECT dollar FROM nose WHERE tenant_id = $1) \
             SELECT dollar FROM steel"
        );
        assert_eq!(t.param, 1);
    }

    #[test]
    fn rejects_unsupported_statements() {
        assert!(matches!(err("CREATE TABLE t (a int)"), Error::Unsupported(_)));
        assert!(matches!(err("TRUNCATE t"), Error::Unsupported(_)));
    }

    #[test]
    fn rejects_multiple_statements() {
        assert!(matches!(err("SELECT 1; SELECT 2"), Error::Tree(_)));
    }

    #[test]
    fn rejects_select_distinct() {
        assert!(matches!(err("SELECT DISTINCT a FROM t"), Error::Unsupported(_)));
    }

    #[test]
    fn rejects_set_operations() {
        assert!(matches!(
            err("SELECT a FROM t UNION SELECT b FROM u"),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn rejects_insert_select_star() {
        assert!(matches!(
            err("INSERT INTO t (a) SELECT * FROM u"),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn rejects_right_and_full_joins() {
        assert!(matches!(
            err("SELECT 1 FROM a RIGHT JOIN b ON a.x = b.x"),
            Error::Unsupported(_)
        ));
        assert!(matches!(
            err("SELECT 1 FROM a FULL JOIN b ON a.x = b.x"),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn rejects_multi_row_values() {
        assert!(matches!(
            err("INSERT INTO t (a) VALUES ($1), ($2)"),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn parse_errors_surface() {
        assert!(matches!(err("SELEKT broken"), Error::Parse(_)));
    }

    #[test]
    fn injected_param_follows_highest_existing() {
        let t = ok("SELECT a FROM t WHERE b = $4");
        assert_eq!(t.param, 5);
        assert!(t.query.ends_with("AND tenant_id = $5"));
    }

    #[test]
    fn same_param_reused_at_every_site() {
        let t = ok("SELECT 1 FROM a, b, c");
        assert_eq!(
            t.query,
            "SELECT 1 FROM a, b, c WHERE a.tenant_id = $1 AND b.tenant_id = $1 AND c.tenant_id = $1"
        );
    }
}
