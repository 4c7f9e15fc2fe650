//! Pre-vetted queries.
//!
//! The whitelist does double duty: it is the closed set of queries a
//! connection will execute without an explicit escape, and a static
//! cache of their rewrites. Keys are normalized query strings; values
//! are the expected rewrite.
//!
//! Applications should keep their whitelist under test with [`verify`]
//! so the recorded rewrites never drift from what the rewriter emits.

use std::collections::HashMap;

use crate::rewriter::{rewrite, Transformed};

/// Map from normalized query text to its expected rewrite.
pub type Whitelist = HashMap<String, Transformed>;

/// Rewrite every whitelist entry and compare against the recorded
/// expectation. Queries are checked in sorted order; comparison of the
/// rewritten SQL is case-insensitive, since emitted keyword and type
/// name casing is not semantic.
///
/// Panics on the first mismatch or rewrite error. Intended to be called
/// from an application's test suite.
pub fn verify(tenant_id_col: &str, whitelist: &Whitelist) {
    let mut queries: Vec<&String> = whitelist.keys().collect();
    queries.sort();

    for query in queries {
        let expected = &whitelist[query];
        let transformed = match rewrite(query, tenant_id_col) {
            Ok(transformed) => transformed,
            Err(err) => panic!("whitelist query failed to rewrite: {}\n  query: {}", err, query),
        };
        assert!(
            transformed.query.eq_ignore_ascii_case(&expected.query),
            "whitelist mismatch\n  query:    {}\n  got:      {}\n  expected: {}",
            query,
            transformed.query,
            expected.query,
        );
        assert_eq!(
            transformed.param, expected.param,
            "tenant parameter mismatch for: {}",
            query
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_accepts_correct_entries() {
        let mut whitelist = Whitelist::new();
        whitelist.insert(
            "SELECT foo FROM bar".into(),
            Transformed {
                query: "SELECT foo FROM bar WHERE tenant_id = $1".into(),
                param: 1,
            },
        );
        whitelist.insert(
            "SELECT nextval('salt')".into(),
            Transformed {
                query: "SELECT nextval('salt')".into(),
                param: 0,
            },
        );
        verify("tenant_id", &whitelist);
    }

    #[test]
    #[should_panic(expected = "whitelist mismatch")]
    fn verify_rejects_stale_entries() {
        let mut whitelist = Whitelist::new();
        whitelist.insert(
            "SELECT foo FROM bar".into(),
            Transformed {
                query: "SELECT foo FROM bar".into(),
                param: 0,
            },
        );
        verify("tenant_id", &whitelist);
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let mut whitelist = Whitelist::new();
        whitelist.insert(
            "SELECT foo FROM bar".into(),
            Transformed {
                query: "select FOO from BAR where TENANT_ID = $1".into(),
                param: 1,
            },
        );
        verify("tenant_id", &whitelist);
    }
}
