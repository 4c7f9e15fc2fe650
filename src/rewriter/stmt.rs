//! Statement-level emission: INSERT, SELECT, UPDATE, DELETE, WITH
//! clauses and the WHERE rule that injects tenant predicates.

use pg_query::{
    protobuf::{
        BoolExprType, DeleteStmt, InsertStmt, LimitOption, OnConflictAction, SelectStmt,
        SetOperation, SortByDir, SortByNulls, UpdateStmt, WithClause,
    },
    Node, NodeEnum,
};

use super::{
    emit,
    env::{Env, Status},
    node_enum, Rewriter,
};
use crate::error::Error;

impl Rewriter<'_> {
    pub(super) fn insert_stmt<'t>(
        &mut self,
        out: &mut String,
        stmt: &'t InsertStmt,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        let cte_names = self.cte_clause(out, stmt.with_clause.as_ref(), env)?;

        let rel = stmt
            .relation
            .as_ref()
            .ok_or_else(|| Error::Tree("INSERT without a target table".into()))?;
        out.push_str("INSERT INTO ");
        emit::ident(out, &rel.relname);
        out.push(' ');
        if let Some(alias) = &rel.alias {
            out.push_str("AS ");
            emit::ident(out, &alias.aliasname);
            out.push(' ');
            env.set(&alias.aliasname, Status::NeedsTenantId);
        } else {
            env.set(&rel.relname, Status::NeedsTenantId);
        }

        if stmt.cols.is_empty() {
            return Err(Error::Unsupported("INSERT without a column list".into()));
        }
        out.push('(');
        for col in &stmt.cols {
            let NodeEnum::ResTarget(target) = node_enum(col)? else {
                return Err(Error::Tree("INSERT column is not a ResTarget".into()));
            };
            if target.name.is_empty() {
                return Err(Error::Tree("INSERT column without a name".into()));
            }
            emit::ident(out, &target.name);
            out.push_str(", ");
        }
        out.push_str(self.tenant_col);
        out.push_str(") ");

        let source = stmt
            .select_stmt
            .as_deref()
            .ok_or_else(|| Error::Tree("INSERT without a source".into()))?;
        let NodeEnum::SelectStmt(select) = node_enum(source)? else {
            return Err(Error::Tree("INSERT source is not a SELECT".into()));
        };
        match select.values_lists.len() {
            // INSERT ... SELECT: the tenant ID rides along as an extra
            // output column of the select.
            0 => {
                let mut inner = Env::default();
                for name in cte_names {
                    inner.set(name, Status::Cte);
                }
                self.select_stmt(out, select, &mut inner, true)?;
            }
            1 => {
                out.push_str("VALUES (");
                let NodeEnum::List(row) = node_enum(&select.values_lists[0])? else {
                    return Err(Error::Tree("VALUES row is not a list".into()));
                };
                for value in &row.items {
                    self.expr(out, value, env)?;
                    out.push_str(", ");
                }
                self.push_tenant_param(out);
                out.push(')');
            }
            n => {
                return Err(Error::Unsupported(format!("INSERT with {} VALUES rows", n)));
            }
        }

        if let Some(conflict) = &stmt.on_conflict_clause {
            if conflict.action() != OnConflictAction::OnconflictNone {
                out.push_str(" ON CONFLICT ");
                if let Some(infer) = &conflict.infer {
                    if !infer.conname.is_empty() {
                        return Err(Error::Unsupported("ON CONFLICT ON CONSTRAINT".into()));
                    }
                    out.push('(');
                    for elem in &infer.index_elems {
                        let NodeEnum::IndexElem(elem) = node_enum(elem)? else {
                            return Err(Error::Tree("conflict target is not an IndexElem".into()));
                        };
                        if elem.name.is_empty() {
                            return Err(Error::Unsupported(
                                "ON CONFLICT over an expression index".into(),
                            ));
                        }
                        emit::ident(out, &elem.name);
                        out.push_str(", ");
                    }
                    out.push_str(self.tenant_col);
                    out.push_str(") ");
                }
                out.push_str("DO ");
                match conflict.action() {
                    OnConflictAction::OnconflictNothing => out.push_str("NOTHING"),
                    OnConflictAction::OnconflictUpdate => {
                        out.push_str("UPDATE SET ");
                        self.comma_list(out, &conflict.target_list, env, Self::expr)?;
                        if conflict.where_clause.is_some() {
                            self.where_clause(out, conflict.where_clause.as_deref(), env, true)?;
                        }
                    }
                    _ => return Err(Error::Tree("ON CONFLICT without an action".into())),
                }
            }
        }

        if !stmt.returning_list.is_empty() {
            out.push_str(" RETURNING ");
            self.comma_list(out, &stmt.returning_list, env, Self::select_col)?;
        }
        Ok(())
    }

    /// Emit a SELECT. `in_insert` is set when this is the source of an
    /// `INSERT ... SELECT`, which appends the tenant ID to the target
    /// list instead of the WHERE clause.
    pub(super) fn select_stmt<'t>(
        &mut self,
        out: &mut String,
        stmt: &'t SelectStmt,
        env: &mut Env<'t>,
        in_insert: bool,
    ) -> Result<(), Error> {
        self.cte_clause(out, stmt.with_clause.as_ref(), env)?;
        if stmt.op() != SetOperation::SetopNone {
            return Err(Error::Unsupported("UNION/INTERSECT/EXCEPT".into()));
        }
        if !stmt.locking_clause.is_empty() {
            return Err(Error::Unsupported("row locking clause".into()));
        }
        if !stmt.window_clause.is_empty() {
            return Err(Error::Unsupported("WINDOW clause".into()));
        }
        if !stmt.distinct_clause.is_empty() {
            return Err(Error::Unsupported("SELECT DISTINCT".into()));
        }

        out.push_str("SELECT ");
        let targets = &stmt.target_list;
        let mut star = false;
        if let [target] = targets.as_slice() {
            let NodeEnum::ResTarget(target) = node_enum(target)? else {
                return Err(Error::Tree("select target is not a ResTarget".into()));
            };
            if let Some(Some(NodeEnum::ColumnRef(col))) =
                target.val.as_deref().map(|val| val.node.as_ref())
            {
                if col.fields.len() == 1
                    && matches!(col.fields[0].node, Some(NodeEnum::AStar(_)))
                {
                    if in_insert {
                        return Err(Error::Unsupported("INSERT ... SELECT *".into()));
                    }
                    out.push('*');
                    star = true;
                }
            }
        }
        if !star {
            self.comma_list(out, targets, env, Self::select_col)?;
            if in_insert {
                if !targets.is_empty() {
                    out.push_str(", ");
                }
                self.push_tenant_param(out);
            }
        }

        if !stmt.from_clause.is_empty() {
            out.push_str(" FROM ");
            self.comma_list(out, &stmt.from_clause, env, Self::expr)?;
        }
        self.where_clause(out, stmt.where_clause.as_deref(), env, false)?;
        if !stmt.group_clause.is_empty() {
            if stmt.group_distinct {
                return Err(Error::Unsupported("GROUP BY DISTINCT".into()));
            }
            out.push_str(" GROUP BY ");
            self.comma_list(out, &stmt.group_clause, env, Self::expr)?;
        }
        if let Some(having) = stmt.having_clause.as_deref() {
            out.push_str(" HAVING ");
            self.expr(out, having, env)?;
        }
        if !stmt.sort_clause.is_empty() {
            out.push_str(" ORDER BY ");
            for (i, item) in stmt.sort_clause.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let NodeEnum::SortBy(sort) = node_enum(item)? else {
                    return Err(Error::Tree("ORDER BY item is not a SortBy".into()));
                };
                if sort.sortby_nulls() != SortByNulls::SortbyNullsDefault {
                    return Err(Error::Unsupported("NULLS FIRST/LAST".into()));
                }
                let key = sort
                    .node
                    .as_deref()
                    .ok_or_else(|| Error::Tree("ORDER BY without an expression".into()))?;
                self.expr(out, key, env)?;
                match sort.sortby_dir() {
                    SortByDir::SortbyAsc => out.push_str(" ASC"),
                    SortByDir::SortbyDesc => out.push_str(" DESC"),
                    SortByDir::SortbyUsing => {
                        return Err(Error::Unsupported("ORDER BY ... USING".into()))
                    }
                    _ => {}
                }
            }
        }
        if let Some(limit) = stmt.limit_count.as_deref() {
            if stmt.limit_option() == LimitOption::WithTies {
                return Err(Error::Unsupported("FETCH FIRST ... WITH TIES".into()));
            }
            out.push_str(" LIMIT ");
            self.expr(out, limit, env)?;
        }
        if let Some(offset) = stmt.limit_offset.as_deref() {
            out.push_str(" OFFSET ");
            self.expr(out, offset, env)?;
        }
        Ok(())
    }

    /// A single select target: the value expression, then `AS name` when
    /// the target is aliased.
    fn select_col<'t>(
        &mut self,
        out: &mut String,
        node: &'t Node,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        let NodeEnum::ResTarget(target) = node_enum(node)? else {
            return Err(Error::Tree("select target is not a ResTarget".into()));
        };
        let val = target
            .val
            .as_deref()
            .ok_or_else(|| Error::Tree("select target without a value".into()))?;
        self.expr(out, val, env)?;
        if !target.name.is_empty() {
            out.push_str(" AS ");
            emit::ident(out, &target.name);
        }
        Ok(())
    }

    pub(super) fn update_stmt<'t>(
        &mut self,
        out: &mut String,
        stmt: &'t UpdateStmt,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        self.cte_clause(out, stmt.with_clause.as_ref(), env)?;
        out.push_str("UPDATE ");
        let rel = stmt
            .relation
            .as_ref()
            .ok_or_else(|| Error::Tree("UPDATE without a target table".into()))?;
        self.range_var(out, rel, env)?;
        out.push_str(" SET ");
        self.comma_list(out, &stmt.target_list, env, Self::expr)?;
        if !stmt.from_clause.is_empty() {
            out.push_str(" FROM ");
            self.comma_list(out, &stmt.from_clause, env, Self::expr)?;
        }
        if stmt.where_clause.is_none() {
            // An unconstrained UPDATE still has to stay inside the tenant.
            out.push_str(" WHERE ");
            out.push_str(self.tenant_col);
            out.push_str(" = ");
            self.push_tenant_param(out);
        } else {
            self.where_clause(out, stmt.where_clause.as_deref(), env, false)?;
        }
        if !stmt.returning_list.is_empty() {
            out.push_str(" RETURNING ");
            self.comma_list(out, &stmt.returning_list, env, Self::select_col)?;
        }
        Ok(())
    }

    pub(super) fn delete_stmt<'t>(
        &mut self,
        out: &mut String,
        stmt: &'t DeleteStmt,
        env: &mut Env<'t>,
    ) -> Result<(), Error> {
        self.cte_clause(out, stmt.with_clause.as_ref(), env)?;
        out.push_str("DELETE FROM ");
        let rel = stmt
            .relation
            .as_ref()
            .ok_or_else(|| Error::Tree("DELETE without a target table".into()))?;
        self.range_var(out, rel, env)?;
        if !stmt.using_clause.is_empty() {
            out.push_str(" USING ");
            self.comma_list(out, &stmt.using_clause, env, Self::expr)?;
        }
        self.where_clause(out, stmt.where_clause.as_deref(), env, false)?;
        if !stmt.returning_list.is_empty() {
            out.push_str(" RETURNING ");
            self.comma_list(out, &stmt.returning_list, env, Self::select_col)?;
        }
        Ok(())
    }

    /// Emit a `WITH [RECURSIVE]` clause and register the CTE names so
    /// that references to them are not treated as base tables. Returns
    /// the CTE names for scopes that need to inherit them.
    fn cte_clause<'t>(
        &mut self,
        out: &mut String,
        with: Option<&'t WithClause>,
        env: &mut Env<'t>,
    ) -> Result<Vec<&'t str>, Error> {
        let Some(with) = with else {
            return Ok(Vec::new());
        };
        let mut names = Vec::new();
        out.push_str("WITH ");
        if with.recursive {
            out.push_str("RECURSIVE ");
        }
        for (i, item) in with.ctes.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let NodeEnum::CommonTableExpr(cte) = node_enum(item)? else {
                return Err(Error::Tree("WITH item is not a common table expression".into()));
            };
            emit::ident(out, &cte.ctename);
            out.push_str(" AS (");
            env.set(&cte.ctename, Status::Cte);
            names.push(cte.ctename.as_str());

            let body = cte
                .ctequery
                .as_deref()
                .ok_or_else(|| Error::Tree("CTE without a body".into()))?;
            let mut inner = Env::default();
            match node_enum(body)? {
                NodeEnum::SelectStmt(select) => {
                    self.select_stmt(out, select, &mut inner, false)?;
                }
                NodeEnum::InsertStmt(insert) => {
                    if insert.select_stmt.is_none() {
                        return Err(Error::Tree("CTE INSERT without a source".into()));
                    }
                    self.insert_stmt(out, insert, &mut inner)?;
                }
                _ => {
                    return Err(Error::Unsupported(
                        "CTE body other than SELECT or INSERT".into(),
                    ))
                }
            }
            env.absorb_ctes(&inner);
            out.push(')');
        }
        out.push(' ');
        Ok(names)
    }

    /// The WHERE rule. Emits the original condition (if any) and a
    /// tenant predicate for every table in scope that still needs one,
    /// in lexicographic order. In `on_conflict` mode predicates are
    /// always table-qualified.
    pub(super) fn where_clause<'t>(
        &mut self,
        out: &mut String,
        clause: Option<&'t Node>,
        env: &mut Env<'t>,
        on_conflict: bool,
    ) -> Result<(), Error> {
        // The LEFT JOIN anchor takes its predicate here instead of the
        // join condition. The query selects only matching rows, so the
        // placements are equivalent, and the planner does better with
        // the filter in WHERE.
        env.promote_left_join();
        if clause.is_none() && !env.any_needs_tenant_id() {
            return Ok(());
        }
        out.push_str(" WHERE ");
        let tables = env.sorted_names();
        self.where_with_tables(out, clause, env, on_conflict, &tables)
    }

    /// WHERE emission against an explicit table set. Join conditions use
    /// this directly with the tables referenced by the join operands.
    pub(super) fn where_with_tables<'t>(
        &mut self,
        out: &mut String,
        clause: Option<&'t Node>,
        env: &mut Env<'t>,
        on_conflict: bool,
        tables: &[&'t str],
    ) -> Result<(), Error> {
        let pending = tables
            .iter()
            .any(|table| env.get(table) == Some(Status::NeedsTenantId));
        if !pending {
            if let Some(clause) = clause {
                self.expr(out, clause, env)?;
            }
            return Ok(());
        }

        if let Some(clause) = clause {
            match node_enum(clause)? {
                // OR and NOT bind looser than the AND we append next.
                NodeEnum::BoolExpr(expr) if expr.boolop() != BoolExprType::AndExpr => {
                    out.push('(');
                    self.bool_expr(out, expr, env)?;
                    out.push(')');
                }
                _ => self.expr(out, clause, env)?,
            }
            out.push_str(" AND ");
        }

        let qualify = tables.len() > 1 || on_conflict;
        let mut first = true;
        for &table in tables {
            if env.get(table) != Some(Status::NeedsTenantId) {
                continue;
            }
            if !first {
                out.push_str(" AND ");
            }
            first = false;
            if qualify {
                out.push_str(table);
                out.push('.');
            }
            out.push_str(self.tenant_col);
            out.push_str(" = ");
            self.push_tenant_param(out);
            env.set(table, Status::HasTenantId);
        }
        Ok(())
    }
}
