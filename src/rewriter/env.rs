//! Table environment.
//!
//! Tracks, for one statement scope, every table or alias name seen so
//! far and what the rewriter still owes it. Each statement, CTE body and
//! range subselect gets a fresh environment.

use std::collections::HashMap;

/// What the rewriter knows about a name in the current scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// Base table in scope, tenant predicate not emitted yet.
    NeedsTenantId,
    /// Tenant predicate already emitted.
    HasTenantId,
    /// CTE alias or subselect alias, never receives a predicate.
    Cte,
    /// Left side of an outer join; its predicate is deferred to the
    /// enclosing WHERE clause. At most one per scope.
    LeftJoinTable,
}

#[derive(Debug, Default)]
pub(crate) struct Env<'a> {
    tables: HashMap<&'a str, Status>,
}

impl<'a> Env<'a> {
    pub(crate) fn get(&self, name: &str) -> Option<Status> {
        self.tables.get(name).copied()
    }

    pub(crate) fn set(&mut self, name: &'a str, status: Status) {
        self.tables.insert(name, status);
    }

    /// Tag `name` as the anchor of a LEFT JOIN, unless the scope
    /// already has one.
    pub(crate) fn mark_left_join(&mut self, name: &'a str) {
        if self.tables.values().any(|s| *s == Status::LeftJoinTable) {
            return;
        }
        self.tables.insert(name, Status::LeftJoinTable);
    }

    /// Convert the left-join anchor, if any, back into a table that
    /// needs its predicate. Called when a WHERE clause is emitted.
    pub(crate) fn promote_left_join(&mut self) {
        for status in self.tables.values_mut() {
            if *status == Status::LeftJoinTable {
                *status = Status::NeedsTenantId;
                break;
            }
        }
    }

    /// All names in scope, sorted so predicate emission is deterministic.
    pub(crate) fn sorted_names(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn any_needs_tenant_id(&self) -> bool {
        self.tables.values().any(|s| *s == Status::NeedsTenantId)
    }

    /// Copy CTE names from an inner scope. Nested WITH clauses stay
    /// visible to the enclosing statement.
    pub(crate) fn absorb_ctes(&mut self, inner: &Env<'a>) {
        for (name, status) in &inner.tables {
            if *status == Status::Cte {
                self.tables.insert(name, Status::Cte);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_left_join_anchor_per_scope() {
        let mut env = Env::default();
        env.mark_left_join("a");
        env.mark_left_join("b");
        assert_eq!(env.get("a"), Some(Status::LeftJoinTable));
        assert_eq!(env.get("b"), None);
    }

    #[test]
    fn promote_left_join() {
        let mut env = Env::default();
        env.set("a", Status::HasTenantId);
        env.mark_left_join("b");
        env.promote_left_join();
        assert_eq!(env.get("a"), Some(Status::HasTenantId));
        assert_eq!(env.get("b"), Some(Status::NeedsTenantId));
    }

    #[test]
    fn sorted_names() {
        let mut env = Env::default();
        env.set("zebra", Status::NeedsTenantId);
        env.set("apple", Status::Cte);
        env.set("mango", Status::HasTenantId);
        assert_eq!(env.sorted_names(), vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn absorb_ctes_only() {
        let mut outer = Env::default();
        let mut inner = Env::default();
        inner.set("cte", Status::Cte);
        inner.set("base", Status::NeedsTenantId);
        outer.absorb_ctes(&inner);
        assert_eq!(outer.get("cte"), Some(Status::Cte));
        assert_eq!(outer.get("base"), None);
    }
}
