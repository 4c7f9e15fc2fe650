//! Query text canonicalization.
//!
//! Whitelist keys and cache keys are normalized query strings. The rules
//! are deliberately minimal: whitespace is trimmed around each line and
//! lines are joined with single spaces. Whitespace inside a line, including
//! inside string literals, is left alone.

/// Canonicalize a query string for whitelist and cache lookups.
///
/// Idempotent: `normalize(normalize(q)) == normalize(q)`.
pub fn normalize(query: &str) -> String {
    let lines: Vec<&str> = query.split('\n').map(str::trim).collect();
    let Some(first) = lines.iter().position(|line| !line.is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .unwrap_or(first);
    lines[first..=last].join(" ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_line_breaks() {
        let query = "
            SELECT foo
            FROM bar
            WHERE baz = $1
        ";
        assert_eq!(normalize(query), "SELECT foo FROM bar WHERE baz = $1");
    }

    #[test]
    fn idempotent() {
        let queries = [
            "SELECT 1",
            "  SELECT 1  ",
            "\n\nSELECT\nfoo\n\n",
            "",
            "\n\t\n",
        ];
        for query in queries {
            let once = normalize(query);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn preserves_literal_whitespace() {
        let query = "SELECT 'two  spaces' FROM t";
        assert_eq!(normalize(query), query);
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n \n"), "");
    }
}
