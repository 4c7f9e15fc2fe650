//! Emitter primitives: identifier quoting, literal escaping and
//! type name canonicalization.

use pg_query::{Node, NodeEnum};

use crate::error::Error;

/// Reserved words that show up as column names in real schemas and must
/// be quoted when emitted bare.
const QUOTED: &[&str] = &["position", "timestamp", "type"];

/// Emit an identifier, quoting it if it collides with a reserved word.
pub(crate) fn ident(out: &mut String, name: &str) {
    if QUOTED.contains(&name) {
        out.push('"');
        out.push_str(&name.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(name);
    }
}

/// Emit a single-quoted string literal, doubling embedded quotes.
pub(crate) fn string_literal(out: &mut String, value: &str) {
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Emit a one- or two-part name from a parse tree name list.
///
/// Two-part names must be `pg_catalog`-qualified; they are collapsed to
/// an uppercased short form with the historical aliases spelled out.
pub(crate) fn name_list(out: &mut String, items: &[Node]) -> Result<(), Error> {
    let name = match items.len() {
        1 => string_value(&items[0])?.to_string(),
        2 => {
            let prefix = string_value(&items[0])?;
            if prefix != "pg_catalog" {
                return Err(Error::Tree(format!(
                    "two-part name qualified by \"{}\", expected pg_catalog",
                    prefix
                )));
            }
            string_value(&items[1])?.to_uppercase()
        }
        0 => return Err(Error::Tree("empty name list".into())),
        n => {
            return Err(Error::Tree(format!(
                "name list has {} parts, expected 1 or 2",
                n
            )))
        }
    };
    out.push_str(match name.as_str() {
        "BOOL" => "BOOLEAN",
        "INT8" => "BIGINT",
        "TIMESTAMPTZ" => "TIMESTAMP WITH TIME ZONE",
        _ => name.as_str(),
    });
    Ok(())
}

/// The string payload of a `String` node.
pub(crate) fn string_value(node: &Node) -> Result<&str, Error> {
    match &node.node {
        Some(NodeEnum::String(s)) => Ok(&s.sval),
        _ => Err(Error::Tree("expected a String node".into())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pg_query::protobuf;

    fn string_node(value: &str) -> Node {
        Node {
            node: Some(NodeEnum::String(protobuf::String { sval: value.into() })),
        }
    }

    fn emit_name(parts: &[&str]) -> Result<String, Error> {
        let items: Vec<Node> = parts.iter().map(|p| string_node(p)).collect();
        let mut out = String::new();
        name_list(&mut out, &items)?;
        Ok(out)
    }

    #[test]
    fn quotes_reserved_words_only() {
        for (name, expected) in [
            ("position", "\"position\""),
            ("timestamp", "\"timestamp\""),
            ("type", "\"type\""),
            ("tenant_id", "tenant_id"),
            ("range", "range"),
        ] {
            let mut out = String::new();
            ident(&mut out, name);
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn escapes_single_quotes() {
        let mut out = String::new();
        string_literal(&mut out, "it's");
        assert_eq!(out, "'it''s'");
    }

    #[test]
    fn canonicalizes_catalog_types() {
        assert_eq!(emit_name(&["pg_catalog", "bool"]).unwrap(), "BOOLEAN");
        assert_eq!(emit_name(&["pg_catalog", "int8"]).unwrap(), "BIGINT");
        assert_eq!(
            emit_name(&["pg_catalog", "timestamptz"]).unwrap(),
            "TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(emit_name(&["pg_catalog", "int4"]).unwrap(), "INT4");
        assert_eq!(emit_name(&["jsonb"]).unwrap(), "jsonb");
    }

    #[test]
    fn rejects_foreign_prefixes() {
        assert!(emit_name(&["myschema", "mytype"]).is_err());
        assert!(emit_name(&["a", "b", "c"]).is_err());
        assert!(emit_name(&[]).is_err());
    }
}
