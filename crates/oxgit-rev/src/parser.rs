//! Revision expression parser.
//!
//! ```text
//! rev     := base suffix* (":" path)?
//! base    := "@" | <object id> | <abbreviated id> | <reference shorthand>
//! suffix  := "^" digits? | "~" digits? | "^{" kind? "}"
//! kind    := "commit" | "tree" | "blob" | "tag"
//! ```
//!
//! Parsing is purely syntactic; whether `base` names a reference or an
//! object is decided by the resolver.

use oxgit_types::ObjectKind;

use crate::error::{RevError, RevResult};

/// One postfix operator applied to the base object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suffix {
    /// `^n`: the n-th parent, one-based. `^0` is the commit itself.
    Parent(usize),
    /// `~n`: the n-th first-parent ancestor.
    Ancestor(usize),
    /// `^{kind}`, or `^{}` (`None`) to dereference tags.
    Peel(Option<ObjectKind>),
}

/// A parsed revision expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevSpec {
    pub base: String,
    pub suffixes: Vec<Suffix>,
    /// Path after `:`, looked up in the tree the expression peels to.
    pub path: Option<String>,
}

pub fn parse(expr: &str) -> RevResult<RevSpec> {
    if expr.is_empty() {
        return Err(RevError::syntax(expr, "empty revision"));
    }
    if let Some(rest) = expr.strip_prefix(':') {
        return Err(if rest.starts_with('/') {
            RevError::unsupported(expr, "commit message search")
        } else {
            RevError::unsupported(expr, "index paths")
        });
    }

    let (rev, path) = split_path(expr);
    if rev.contains("..") {
        return Err(RevError::unsupported(expr, "revision ranges"));
    }
    if rev.contains("@{") {
        return Err(RevError::unsupported(expr, "reflog and upstream selectors"));
    }

    let split = rev.find(|c: char| c == '^' || c == '~').unwrap_or(rev.len());
    let base = match &rev[..split] {
        "" => return Err(RevError::syntax(expr, "missing base revision")),
        "@" => "HEAD",
        other => other,
    };

    Ok(RevSpec {
        base: base.to_string(),
        suffixes: parse_suffixes(expr, &rev[split..])?,
        path: path.map(str::to_string),
    })
}

/// Split at the first `:` outside `^{...}`.
fn split_path(expr: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return (&expr[..i], Some(&expr[i + 1..])),
            _ => {}
        }
    }
    (expr, None)
}

fn parse_suffixes(expr: &str, s: &str) -> RevResult<Vec<Suffix>> {
    let bytes = s.as_bytes();
    let mut suffixes = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'^' if bytes.get(i + 1) == Some(&b'{') => {
                let close = s[i..]
                    .find('}')
                    .ok_or_else(|| RevError::syntax(expr, "unterminated '^{'"))?;
                let inner = &s[i + 2..i + close];
                suffixes.push(Suffix::Peel(match inner {
                    "" => None,
                    "commit" => Some(ObjectKind::Commit),
                    "tree" => Some(ObjectKind::Tree),
                    "blob" => Some(ObjectKind::Blob),
                    "tag" => Some(ObjectKind::Tag),
                    other if other.starts_with('/') => {
                        return Err(RevError::unsupported(expr, "commit message search"))
                    }
                    other => {
                        return Err(RevError::syntax(
                            expr,
                            format!("unknown peel target {other:?}"),
                        ))
                    }
                }));
                i += close + 1;
            }
            b'^' => {
                let (n, used) = parse_count(expr, &s[i + 1..])?;
                suffixes.push(Suffix::Parent(n.unwrap_or(1)));
                i += 1 + used;
            }
            b'~' => {
                let (n, used) = parse_count(expr, &s[i + 1..])?;
                suffixes.push(Suffix::Ancestor(n.unwrap_or(1)));
                i += 1 + used;
            }
            other => {
                return Err(RevError::syntax(
                    expr,
                    format!("unexpected {:?} after suffix", other as char),
                ))
            }
        }
    }
    Ok(suffixes)
}

/// Leading decimal digits of `s`, if any, and how many bytes they span.
fn parse_count(expr: &str, s: &str) -> RevResult<(Option<usize>, usize)> {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return Ok((None, 0));
    }
    let n = s[..len]
        .parse()
        .map_err(|_| RevError::syntax(expr, "count out of range"))?;
    Ok((Some(n), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxgit_types::ErrorKind;

    fn suffixes(expr: &str) -> Vec<Suffix> {
        parse(expr).unwrap().suffixes
    }

    #[test]
    fn bare_names() {
        let spec = parse("main").unwrap();
        assert_eq!(spec.base, "main");
        assert!(spec.suffixes.is_empty());
        assert_eq!(spec.path, None);
        assert_eq!(parse("@").unwrap().base, "HEAD");
        assert_eq!(parse("user@example").unwrap().base, "user@example");
    }

    #[test]
    fn parent_and_ancestor() {
        assert_eq!(suffixes("HEAD^"), [Suffix::Parent(1)]);
        assert_eq!(suffixes("HEAD^2"), [Suffix::Parent(2)]);
        assert_eq!(suffixes("HEAD^0"), [Suffix::Parent(0)]);
        assert_eq!(suffixes("HEAD~"), [Suffix::Ancestor(1)]);
        assert_eq!(suffixes("HEAD~10"), [Suffix::Ancestor(10)]);
        assert_eq!(
            suffixes("@~2^2^"),
            [Suffix::Ancestor(2), Suffix::Parent(2), Suffix::Parent(1)]
        );
    }

    #[test]
    fn peel_suffixes() {
        assert_eq!(suffixes("v1^{}"), [Suffix::Peel(None)]);
        assert_eq!(suffixes("v1^{commit}"), [Suffix::Peel(Some(ObjectKind::Commit))]);
        assert_eq!(
            suffixes("v1^{tree}^{}"),
            [Suffix::Peel(Some(ObjectKind::Tree)), Suffix::Peel(None)]
        );
        assert_eq!(parse("v1^{bogus}").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(parse("v1^{tree").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn paths() {
        let spec = parse("HEAD~1:src/lib.rs").unwrap();
        assert_eq!(spec.suffixes, [Suffix::Ancestor(1)]);
        assert_eq!(spec.path.as_deref(), Some("src/lib.rs"));
        assert_eq!(parse("main:").unwrap().path.as_deref(), Some(""));
        assert_eq!(parse("a:b:c").unwrap().path.as_deref(), Some("b:c"));
    }

    #[test]
    fn syntax_errors() {
        for bad in ["", "^", "~2", "HEAD^x", "HEAD~99999999999999999999999"] {
            assert_eq!(parse(bad).unwrap_err().kind(), ErrorKind::InvalidArgument, "{bad:?}");
        }
    }

    #[test]
    fn unsupported_forms() {
        for expr in ["HEAD@{1}", "@{u}", "main@{upstream}", ":/fix", ":0:README", ":README", "a..b", "HEAD^{/msg}"] {
            assert_eq!(parse(expr).unwrap_err().kind(), ErrorKind::Unsupported, "{expr:?}");
        }
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_input_never_panics(expr in "[a-z@~^{}:/.0-9]{0,16}") {
            let _ = parse(&expr);
        }

        #[test]
        fn counts_survive_chaining(ns in proptest::collection::vec(0usize..500, 1..6)) {
            let expr: String = std::iter::once("main".to_string())
                .chain(ns.iter().map(|n| format!("~{n}^{n}")))
                .collect();
            let parsed = parse(&expr).unwrap();
            let expected: Vec<Suffix> = ns
                .iter()
                .flat_map(|&n| [Suffix::Ancestor(n), Suffix::Parent(n)])
                .collect();
            proptest::prop_assert_eq!(parsed.suffixes, expected);
        }
    }
}
