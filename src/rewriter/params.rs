//! Positional parameter scan.

use pg_query::{protobuf::ParseResult, NodeRef};

/// Largest `$N` anywhere in the parse tree, 0 if the query has no
/// positional parameters. The tenant ID parameter is assigned the next
/// index so existing parameters keep their positions.
pub(crate) fn max_param(tree: &ParseResult) -> i32 {
    let mut max = 0;
    for node in tree.nodes() {
        if let NodeRef::ParamRef(param) = node.0 {
            max = max.max(param.number);
        }
    }
    max
}
