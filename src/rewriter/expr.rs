//! Expression and FROM-item emission.
//!
//! Mirrors the node kinds the rewriter understands. Everything else is
//! rejected: an unrecognized expression could hide a table access that
//! would escape the tenant predicate.

use std::collections::BTreeSet;

use pg_query::{
    protobuf::{
        a_const::Val, AConst, AExprKind, BoolExpr, BoolExprType, JoinType, NullTestType,
        RangeVar, SqlValueFunctionOp, SubLink, SubLinkType, TypeCast, TypeName,
    },
    Node, NodeEnum,
};

use super::{
    describe, emit,
    env::{Env, Status},
    node_enum, Rewriter,
};
use crate::error::Error;

impl Rewriter<'_> {
    /// Emit a single node.
    pub(super) fn expr<'t>(
        &mut self,
        out: &mut String,
        node: &'t Node,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        self.expr_inner(out, node, env)?;
        Ok(())
    }

    /// Like [`Self::expr`], but parenthesizes the output unless the node
    /// emits as an atom (identifier, literal, function call, row).
    fn atom<'t>(
        &mut self,
        out: &mut String,
        node: &'t Node,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        let mut inner = String::new();
        if self.expr_inner(&mut inner, node, env)? {
            out.push_str(&inner);
        } else {
            out.push('(');
            out.push_str(&inner);
            out.push(')');
        }
        Ok(())
    }

    /// Emit a node, reporting whether the emitted text is atomic.
    fn expr_inner<'t>(
        &mut self,
        out: &mut String,
        node: &'t Node,
        env: &mut Env<'t>,
    ) -> Result<bool, Error> {
        match node_enum(node)? {
            NodeEnum::ParamRef(param) => {
                out.push('$');
                out.push_str(&param.number.to_string());
                Ok(true)
            }

            NodeEnum::AConst(value) => {
                a_const(out, value)?;
                Ok(true)
            }

            NodeEnum::String(s) => {
                out.push_str(&s.sval);
                Ok(true)
            }

            NodeEnum::ColumnRef(col) => match col.fields.as_slice() {
                [] => Err(Error::Tree("column reference without fields".into())),
                [field] => {
                    self.field(out, field, env)?;
                    Ok(true)
                }
                [table, column] => {
                    self.field(out, table, env)?;
                    out.push('.');
                    if matches!(column.node, Some(NodeEnum::AStar(_))) {
                        out.push('*');
                    } else {
                        self.field(out, column, env)?;
                    }
                    Ok(false)
                }
                _ => Err(Error::Unsupported("schema-qualified column reference".into())),
            },

            NodeEnum::TypeCast(cast) => {
                if bool_literal_cast(out, cast) {
                    return Ok(true);
                }
                let arg = cast
                    .arg
                    .as_deref()
                    .ok_or_else(|| Error::Tree("cast without an argument".into()))?;
                self.atom(out, arg, env)?;
                out.push_str("::");
                let name = cast
                    .type_name
                    .as_ref()
                    .ok_or_else(|| Error::Tree("cast without a type".into()))?;
                type_name(out, name)?;
                Ok(false)
            }

            NodeEnum::ResTarget(target) => {
                if !target.name.is_empty() {
                    emit::ident(out, &target.name);
                    if target.val.is_some() {
                        out.push_str(" = ");
                    }
                }
                if let Some(val) = target.val.as_deref() {
                    self.expr(out, val, env)?;
                }
                Ok(target.val.is_none())
            }

            NodeEnum::AExpr(expr) => {
                let lexpr = expr
                    .lexpr
                    .as_deref()
                    .ok_or_else(|| Error::Unsupported("unary operator".into()))?;
                let rexpr = expr
                    .rexpr
                    .as_deref()
                    .ok_or_else(|| Error::Tree("operator without a right operand".into()))?;
                match expr.kind() {
                    AExprKind::AexprOp => {
                        self.expr(out, lexpr, env)?;
                        let op = operator(&expr.name)?;
                        // JSON access operators are spelled without spaces.
                        if matches!(op, "->" | "->>") {
                            out.push_str(op);
                        } else {
                            out.push(' ');
                            out.push_str(op);
                            out.push(' ');
                        }
                        self.expr(out, rexpr, env)?;
                    }
                    AExprKind::AexprOpAny => {
                        self.expr(out, lexpr, env)?;
                        out.push(' ');
                        out.push_str(operator(&expr.name)?);
                        out.push_str(" ANY(");
                        self.expr(out, rexpr, env)?;
                        out.push(')');
                    }
                    AExprKind::AexprNullif => {
                        out.push_str("NULLIF(");
                        self.expr(out, lexpr, env)?;
                        out.push_str(", ");
                        self.expr(out, rexpr, env)?;
                        out.push(')');
                    }
                    other => {
                        return Err(Error::Unsupported(format!("operator kind {:?}", other)))
                    }
                }
                Ok(false)
            }

            NodeEnum::FuncCall(call) => {
                if call.over.is_some() {
                    return Err(Error::Unsupported("window function call".into()));
                }
                if call.agg_distinct || call.agg_within_group {
                    return Err(Error::Unsupported(
                        "aggregate with DISTINCT or WITHIN GROUP".into(),
                    ));
                }
                if call.agg_filter.is_some() || !call.agg_order.is_empty() {
                    return Err(Error::Unsupported(
                        "aggregate with FILTER or ORDER BY".into(),
                    ));
                }
                if call.func_variadic {
                    return Err(Error::Unsupported("VARIADIC argument".into()));
                }
                emit::name_list(out, &call.funcname)?;
                out.push('(');
                if call.args.is_empty() && call.agg_star {
                    out.push('*');
                } else {
                    self.comma_list(out, &call.args, env, Self::expr)?;
                }
                out.push(')');
                Ok(true)
            }

            NodeEnum::BoolExpr(expr) => {
                self.bool_expr(out, expr, env)?;
                Ok(false)
            }

            NodeEnum::SubLink(link) => {
                self.sublink(out, link, env)?;
                Ok(false)
            }

            NodeEnum::CoalesceExpr(coalesce) => {
                out.push_str("COALESCE(");
                self.comma_list(out, &coalesce.args, env, Self::expr)?;
                out.push(')');
                Ok(true)
            }

            NodeEnum::SetToDefault(_) => {
                out.push_str("DEFAULT");
                Ok(true)
            }

            NodeEnum::NullTest(test) => {
                let arg = test
                    .arg
                    .as_deref()
                    .ok_or_else(|| Error::Tree("NULL test without an argument".into()))?;
                self.expr(out, arg, env)?;
                match test.nulltesttype() {
                    NullTestType::IsNull => out.push_str(" IS NULL"),
                    NullTestType::IsNotNull => out.push_str(" IS NOT NULL"),
                    _ => return Err(Error::Tree("NULL test without a kind".into())),
                }
                Ok(false)
            }

            NodeEnum::CaseExpr(case) => {
                if case.arg.is_some() {
                    return Err(Error::Unsupported("CASE with a test expression".into()));
                }
                out.push_str("CASE ");
                for (i, when) in case.args.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.expr(out, when, env)?;
                }
                if let Some(default) = case.defresult.as_deref() {
                    out.push_str(" ELSE ");
                    self.expr(out, default, env)?;
                }
                out.push_str(" END");
                Ok(true)
            }

            NodeEnum::CaseWhen(when) => {
                out.push_str("WHEN ");
                let condition = when
                    .expr
                    .as_deref()
                    .ok_or_else(|| Error::Tree("WHEN without a condition".into()))?;
                self.expr(out, condition, env)?;
                out.push_str(" THEN ");
                let result = when
                    .result
                    .as_deref()
                    .ok_or_else(|| Error::Tree("WHEN without a result".into()))?;
                self.expr(out, result, env)?;
                Ok(true)
            }

            NodeEnum::RowExpr(row) => {
                out.push('(');
                self.comma_list(out, &row.args, env, Self::expr)?;
                out.push(')');
                Ok(true)
            }

            NodeEnum::SqlvalueFunction(func) => {
                match func.op() {
                    SqlValueFunctionOp::SvfopCurrentTimestamp => out.push_str("NOW()"),
                    other => {
                        return Err(Error::Unsupported(format!(
                            "SQL value function {:?}",
                            other
                        )))
                    }
                }
                Ok(true)
            }

            NodeEnum::RangeVar(rv) => self.range_var(out, rv, env),

            NodeEnum::RangeSubselect(sub) => {
                if sub.lateral {
                    return Err(Error::Unsupported("LATERAL subquery".into()));
                }
                let subquery = sub
                    .subquery
                    .as_deref()
                    .ok_or_else(|| Error::Tree("subselect without a query".into()))?;
                let NodeEnum::SelectStmt(select) = node_enum(subquery)? else {
                    return Err(Error::Unsupported("non-SELECT subquery in FROM".into()));
                };
                let alias = sub
                    .alias
                    .as_ref()
                    .map(|alias| alias.aliasname.as_str())
                    .filter(|name| !name.is_empty());
                if alias.is_some() {
                    out.push('(');
                }
                let mut inner = Env::default();
                self.select_stmt(out, select, &mut inner, false)?;
                if let Some(alias) = alias {
                    out.push_str(") AS ");
                    emit::ident(out, alias);
                    env.set(alias, Status::Cte);
                }
                Ok(false)
            }

            NodeEnum::RangeFunction(range_fn) => {
                if range_fn.lateral || range_fn.ordinality || range_fn.is_rowsfrom {
                    return Err(Error::Unsupported(
                        "LATERAL, WITH ORDINALITY or ROWS FROM".into(),
                    ));
                }
                if !range_fn.coldeflist.is_empty() {
                    return Err(Error::Unsupported(
                        "column definitions on a function in FROM".into(),
                    ));
                }
                let [function] = range_fn.functions.as_slice() else {
                    return Err(Error::Tree(format!(
                        "{} functions in FROM item, expected 1",
                        range_fn.functions.len()
                    )));
                };
                let NodeEnum::List(pair) = node_enum(function)? else {
                    return Err(Error::Tree("FROM function is not a list".into()));
                };
                let call = pair
                    .items
                    .first()
                    .ok_or_else(|| Error::Tree("empty FROM function".into()))?;
                self.expr(out, call, env)?;
                if let Some(alias) = &range_fn.alias {
                    out.push_str(" AS ");
                    emit::ident(out, &alias.aliasname);
                    if !alias.colnames.is_empty() {
                        out.push('(');
                        for (i, col) in alias.colnames.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            emit::ident(out, emit::string_value(col)?);
                        }
                        out.push(')');
                    }
                }
                Ok(false)
            }

            NodeEnum::JoinExpr(join) => {
                // The anchor of a LEFT JOIN keeps its predicate out of
                // the join condition; where_clause picks it up. Only the
                // leftmost table of the scope carries the tag.
                if join.jointype() == JoinType::JoinLeft {
                    if let Some(NodeEnum::RangeVar(rv)) =
                        join.larg.as_deref().and_then(|node| node.node.as_ref())
                    {
                        let name = rv
                            .alias
                            .as_ref()
                            .map(|alias| alias.aliasname.as_str())
                            .unwrap_or(rv.relname.as_str());
                        env.mark_left_join(name);
                    }
                }
                if join.is_natural || !join.using_clause.is_empty() {
                    return Err(Error::Unsupported("NATURAL or USING join".into()));
                }
                let larg = join
                    .larg
                    .as_deref()
                    .ok_or_else(|| Error::Tree("join without a left side".into()))?;
                let rarg = join
                    .rarg
                    .as_deref()
                    .ok_or_else(|| Error::Tree("join without a right side".into()))?;
                self.expr(out, larg, env)?;
                match (join.jointype(), join.quals.is_some()) {
                    (JoinType::JoinInner, true) => out.push_str(" INNER JOIN "),
                    (JoinType::JoinInner, false) => out.push_str(" CROSS JOIN "),
                    (JoinType::JoinLeft, _) => out.push_str(" LEFT JOIN "),
                    (other, _) => {
                        return Err(Error::Unsupported(format!("join kind {:?}", other)))
                    }
                }
                self.expr(out, rarg, env)?;
                if let Some(quals) = join.quals.as_deref() {
                    let mut tables = BTreeSet::new();
                    collect_tables(larg, &mut tables);
                    collect_tables(rarg, &mut tables);
                    let tables: Vec<&str> = tables.into_iter().collect();
                    out.push_str(" ON ");
                    self.where_with_tables(out, Some(quals), env, false, &tables)?;
                }
                Ok(false)
            }

            other => Err(Error::Unsupported(describe(other).to_string())),
        }
    }

    /// A field of a column reference: identifiers get the safe quoting,
    /// anything else goes through the regular emitter.
    fn field<'t>(
        &mut self,
        out: &mut String,
        node: &'t Node,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        if let Some(NodeEnum::String(s)) = &node.node {
            emit::ident(out, &s.sval);
            return Ok(());
        }
        self.expr(out, node, env)
    }

    /// A base table reference. Registers the table (or its alias) in the
    /// environment; an alias shadows the table name in this scope.
    pub(super) fn range_var<'t>(
        &mut self,
        out: &mut String,
        rv: &'t RangeVar,
        env: &mut Env<'t>,
    ) -> Result<bool, Error> {
        if !rv.schemaname.is_empty() {
            return Err(Error::Unsupported("schema-qualified table reference".into()));
        }
        emit::ident(out, &rv.relname);
        if let Some(alias) = &rv.alias {
            out.push(' ');
            emit::ident(out, &alias.aliasname);
            if env.get(&alias.aliasname).is_none() {
                let status = env.get(&rv.relname).unwrap_or(Status::NeedsTenantId);
                env.set(&alias.aliasname, status);
            }
            return Ok(false);
        }
        if env.get(&rv.relname).is_none() {
            env.set(&rv.relname, Status::NeedsTenantId);
        }
        Ok(true)
    }

    pub(super) fn bool_expr<'t>(
        &mut self,
        out: &mut String,
        expr: &'t BoolExpr,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        match expr.boolop() {
            BoolExprType::AndExpr | BoolExprType::OrExpr => {
                let sep = if expr.boolop() == BoolExprType::AndExpr {
                    " AND "
                } else {
                    " OR "
                };
                for (i, arg) in expr.args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(sep);
                    }
                    self.bool_operand(out, arg, env)?;
                }
            }
            BoolExprType::NotExpr => {
                out.push_str("NOT ");
                let [arg] = expr.args.as_slice() else {
                    return Err(Error::Tree(format!(
                        "NOT with {} operands, expected 1",
                        expr.args.len()
                    )));
                };
                self.bool_operand(out, arg, env)?;
            }
            _ => {
                return Err(Error::Tree(
                    "boolean expression without an operator".into(),
                ))
            }
        }
        Ok(())
    }

    /// Nested boolean expressions keep their own parentheses.
    fn bool_operand<'t>(
        &mut self,
        out: &mut String,
        node: &'t Node,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        if let Some(NodeEnum::BoolExpr(inner)) = &node.node {
            out.push('(');
            self.bool_expr(out, inner, env)?;
            out.push(')');
            return Ok(());
        }
        self.expr(out, node, env)
    }

    fn sublink<'t>(
        &mut self,
        out: &mut String,
        link: &'t SubLink,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        let subselect = link
            .subselect
            .as_deref()
            .ok_or_else(|| Error::Tree("subquery link without a query".into()))?;
        let NodeEnum::SelectStmt(select) = node_enum(subselect)? else {
            return Err(Error::Tree("subquery is not a SELECT".into()));
        };
        match link.sub_link_type() {
            SubLinkType::ExistsSublink => {
                out.push_str("EXISTS (");
                let mut inner = Env::default();
                self.select_stmt(out, select, &mut inner, false)?;
                out.push(')');
            }
            SubLinkType::AnySublink => {
                if !link.oper_name.is_empty() {
                    return Err(Error::Unsupported("operator ANY (subquery)".into()));
                }
                let test = link
                    .testexpr
                    .as_deref()
                    .ok_or_else(|| Error::Tree("IN without a test expression".into()))?;
                self.expr(out, test, env)?;
                out.push_str(" IN (");
                let mut inner = Env::default();
                self.select_stmt(out, select, &mut inner, false)?;
                out.push(')');
            }
            other => {
                return Err(Error::Unsupported(format!("subquery link {:?}", other)))
            }
        }
        Ok(())
    }
}

/// Constant emission: integers and floats in canonical form, strings
/// single-quoted, booleans bare, `NULL` literal.
fn a_const(out: &mut String, value: &AConst) -> Result<(), Error> {
    match &value.val {
        Some(Val::Ival(int)) => out.push_str(&int.ival.to_string()),
        Some(Val::Fval(float)) => out.push_str(&float.fval),
        Some(Val::Sval(s)) => emit::string_literal(out, &s.sval),
        Some(Val::Boolval(b)) => out.push_str(if b.boolval { "true" } else { "false" }),
        Some(Val::Bsval(_)) => return Err(Error::Unsupported("bit string literal".into())),
        None => out.push_str("NULL"),
    }
    Ok(())
}

/// `'t'::pg_catalog.bool` is how older parse trees spell a boolean
/// literal; emit the literal itself.
fn bool_literal_cast(out: &mut String, cast: &TypeCast) -> bool {
    let Some(Some(NodeEnum::AConst(value))) = cast.arg.as_deref().map(|node| node.node.as_ref())
    else {
        return false;
    };
    let Some(Val::Sval(s)) = &value.val else {
        return false;
    };
    let Some(name) = &cast.type_name else {
        return false;
    };
    let [first, second] = name.names.as_slice() else {
        return false;
    };
    let (Ok("pg_catalog"), Ok("bool")) = (emit::string_value(first), emit::string_value(second))
    else {
        return false;
    };
    match s.sval.as_str() {
        "t" => out.push_str("true"),
        "f" => out.push_str("false"),
        _ => return false,
    }
    true
}

fn type_name(out: &mut String, name: &TypeName) -> Result<(), Error> {
    if name.setof || name.pct_type {
        return Err(Error::Unsupported("SETOF or %TYPE in a cast".into()));
    }
    if !name.typmods.is_empty() {
        return Err(Error::Unsupported("parameterized type in a cast".into()));
    }
    emit::name_list(out, &name.names)?;
    match name.array_bounds.as_slice() {
        [] => Ok(()),
        [bound] => {
            let Some(NodeEnum::Integer(bound)) = &bound.node else {
                return Err(Error::Tree("array bound is not an integer".into()));
            };
            if bound.ival != -1 {
                return Err(Error::Unsupported("fixed-size array type".into()));
            }
            out.push_str("[]");
            Ok(())
        }
        _ => Err(Error::Unsupported("multidimensional array type".into())),
    }
}

/// The single name of an operator.
fn operator(name: &[Node]) -> Result<&str, Error> {
    match name {
        [op] => emit::string_value(op),
        _ => Err(Error::Tree(format!(
            "operator with {} name parts, expected 1",
            name.len()
        ))),
    }
}

/// Table and alias names referenced by a join operand. Function calls in
/// FROM don't contribute; their rows belong to no table.
fn collect_tables<'t>(node: &'t Node, tables: &mut BTreeSet<&'t str>) {
    match &node.node {
        Some(NodeEnum::RangeVar(rv)) => {
            let name = rv
                .alias
                .as_ref()
                .map(|alias| alias.aliasname.as_str())
                .unwrap_or(rv.relname.as_str());
            tables.insert(name);
        }
        Some(NodeEnum::JoinExpr(join)) => {
            if let Some(larg) = join.larg.as_deref() {
                collect_tables(larg, tables);
            }
            if let Some(rarg) = join.rarg.as_deref() {
                collect_tables(rarg, tables);
            }
        }
        Some(NodeEnum::RangeSubselect(sub)) => {
            if let Some(alias) = &sub.alias {
                if !alias.aliasname.is_empty() {
                    tables.insert(alias.aliasname.as_str());
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::super::rewrite;
    use crate::error::Error;

    fn ok(query: &str) -> String {
        rewrite(query, "tenant_id").unwrap().query
    }

    fn unsupported(query: &str) {
        match rewrite(query, "tenant_id") {
            Err(Error::Unsupported(_)) => {}
            other => panic!("expected unsupported syntax, got {:?}", other),
        }
    }

    #[test]
    fn json_operators_without_spaces() {
        assert_eq!(
            ok("SELECT a FROM t WHERE (b->>'k')::bigint = $1"),
            "SELECT a FROM t WHERE (b->>'k')::BIGINT = $1 AND tenant_id = $2"
        );
    }

    #[test]
    fn casts_parenthesize_non_atoms() {
        assert_eq!(
            ok("SELECT (m.h)::text FROM claim m WHERE x = $1"),
            "SELECT (m.h)::text FROM claim m WHERE x = $1 AND tenant_id = $2"
        );
        assert_eq!(
            ok("SELECT a::text FROM t"),
            "SELECT a::text FROM t WHERE tenant_id = $1"
        );
    }

    #[test]
    fn boolean_literals() {
        assert_eq!(
            ok("SELECT a FROM t WHERE b = true AND c = false"),
            "SELECT a FROM t WHERE b = true AND c = false AND tenant_id = $1"
        );
    }

    #[test]
    fn count_star() {
        assert_eq!(
            ok("SELECT count(*) FROM log"),
            "SELECT count(*) FROM log WHERE tenant_id = $1"
        );
    }

    #[test]
    fn scalar_op_any() {
        assert_eq!(
            ok("SELECT suit FROM log WHERE coat = ANY($1::text[])"),
            "SELECT suit FROM log WHERE coat = ANY($1::text[]) AND tenant_id = $2"
        );
    }

    #[test]
    fn nullif_and_coalesce() {
        assert_eq!(
            ok("SELECT NULLIF(a, b), COALESCE(c, 0) FROM t"),
            "SELECT NULLIF(a, b), COALESCE(c, 0) FROM t WHERE tenant_id = $1"
        );
    }

    #[test]
    fn case_without_test_expression() {
        assert_eq!(
            ok("SELECT SUM(CASE WHEN sell <= $1 THEN 0 ELSE drink END) AS print FROM cotton"),
            "SELECT SUM(CASE WHEN sell <= $1 THEN 0 ELSE drink END) AS print \
             FROM cotton WHERE tenant_id = $2"
        );
    }

    #[test]
    fn null_tests() {
        assert_eq!(
            ok("SELECT a FROM t WHERE b IS NULL AND c IS NOT NULL"),
            "SELECT a FROM t WHERE b IS NULL AND c IS NOT NULL AND tenant_id = $1"
        );
    }

    #[test]
    fn current_timestamp_becomes_now() {
        assert_eq!(
            ok("UPDATE t SET a = CURRENT_TIMESTAMP WHERE b = $1"),
            "UPDATE t SET a = NOW() WHERE b = $1 AND tenant_id = $2"
        );
    }

    #[test]
    fn interval_literal() {
        // The parser folds NOW() to lowercase; comparisons elsewhere are
        // case-insensitive, so exact case only matters to this test.
        assert_eq!(
            ok("DELETE FROM shoulder WHERE hat < NOW() - interval '1 week'"),
            "DELETE FROM shoulder WHERE hat < now() - '1 week'::INTERVAL AND tenant_id = $1"
        );
    }

    #[test]
    fn row_comparison() {
        assert_eq!(
            ok("SELECT a FROM t WHERE (b, c) > ($1, $2)"),
            "SELECT a FROM t WHERE (b, c) > ($1, $2) AND tenant_id = $3"
        );
    }

    #[test]
    fn qualified_star() {
        assert_eq!(
            ok("SELECT m.*, n.a FROM m, n"),
            "SELECT m.*, n.a FROM m, n WHERE m.tenant_id = $1 AND n.tenant_id = $1"
        );
    }

    #[test]
    fn reserved_words_are_quoted() {
        assert_eq!(
            ok("SELECT pretty, type FROM wrong ORDER BY pretty, position"),
            "SELECT pretty, \"type\" FROM wrong WHERE tenant_id = $1 \
             ORDER BY pretty, \"position\""
        );
    }

    #[test]
    fn exists_subquery_gets_own_scope() {
        assert_eq!(
            ok("SELECT a FROM thin WHERE EXISTS (SELECT 1 FROM dead WHERE dead.k = thin.k)"),
            "SELECT a FROM thin WHERE EXISTS (SELECT 1 FROM dead \
             WHERE dead.k = thin.k AND tenant_id = $1) AND tenant_id = $1"
        );
    }

    #[test]
    fn in_subquery() {
        assert_eq!(
            ok("UPDATE cotton SET sell = $2 WHERE apple IN (SELECT unnest($1::bytea[]))"),
            "UPDATE cotton SET sell = $2 WHERE apple IN (SELECT unnest($1::bytea[])) \
             AND tenant_id = $3"
        );
    }

    #[test]
    fn range_function_with_column_alias() {
        assert_eq!(
            ok("DELETE FROM cotton USING unnest($1::bytea[]) AS sheet(dollar) \
                WHERE apple = sheet.dollar"),
            "DELETE FROM cotton USING unnest($1::bytea[]) AS sheet(dollar) \
             WHERE apple = sheet.dollar AND tenant_id = $2"
        );
    }

    #[test]
    fn default_in_values() {
        assert_eq!(
            ok("INSERT INTO basic (agree) VALUES (DEFAULT) RETURNING agree"),
            "INSERT INTO basic (agree, tenant_id) VALUES (DEFAULT, $1) RETURNING agree"
        );
    }

    #[test]
    fn rejects_window_functions() {
        unsupported("SELECT row_number() OVER () FROM t");
    }

    #[test]
    fn rejects_between() {
        unsupported("SELECT a FROM t WHERE b BETWEEN $1 AND $2");
    }

    #[test]
    fn rejects_in_list() {
        unsupported("SELECT a FROM t WHERE b IN (1, 2)");
    }

    #[test]
    fn rejects_tested_case() {
        unsupported("SELECT CASE a WHEN 1 THEN 'x' ELSE 'y' END FROM t");
    }

    #[test]
    fn rejects_all_subquery() {
        unsupported("SELECT a FROM t WHERE b > ALL(SELECT c FROM u)");
    }

    #[test]
    fn rejects_distinct_aggregate() {
        unsupported("SELECT count(DISTINCT a) FROM t");
    }

    #[test]
    fn rejects_greatest() {
        unsupported("SELECT GREATEST(a, b) FROM t");
    }

    #[test]
    fn rejects_natural_join() {
        unsupported("SELECT 1 FROM a NATURAL JOIN b");
    }

    #[test]
    fn rejects_schema_qualified_tables() {
        unsupported("SELECT a FROM myschema.t");
    }
}
