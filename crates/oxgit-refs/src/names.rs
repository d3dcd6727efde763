//! Reference name validation following git's `check-ref-format` rules.
//!
//! A valid reference name:
//! - is non-empty and does not start or end with `/`, or end with `.`
//! - has no empty components (`//`), and no component starting with `.`
//!   or ending in `.lock`
//! - contains no `..`, `@{`, ASCII control characters, or any of
//!   `` ~^:?*[\`` and space
//! - is either multi-level (`refs/heads/main`) or a one-level name made of
//!   upper-case letters and `_` (`HEAD`, `FETCH_HEAD`)

use crate::error::{RefError, RefResult};

pub const HEAD: &str = "HEAD";
pub const REFS_PREFIX: &str = "refs/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";
pub const NOTES_PREFIX: &str = "refs/notes/";

/// Characters that are forbidden anywhere in a reference name.
const FORBIDDEN_CHARS: &[char] = &[' ', '~', '^', ':', '?', '*', '[', '\\'];

/// Validate a full reference name.
///
/// ```
/// use oxgit_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("refs/heads/main").is_ok());
/// assert!(validate_ref_name("HEAD").is_ok());
/// assert!(validate_ref_name("main").is_err());
/// assert!(validate_ref_name("refs/heads/bad..name").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> RefResult<()> {
    check_components(name)?;
    if !name.contains('/') && !is_onelevel_special(name) {
        return Err(RefError::invalid(
            name,
            "one-level names must be upper-case, like HEAD",
        ));
    }
    Ok(())
}

/// `true` if `name` passes [`validate_ref_name`].
pub fn is_valid_ref_name(name: &str) -> bool {
    validate_ref_name(name).is_ok()
}

/// Validate a short branch name such as `main` or `feature/auth`.
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    if name == HEAD {
        return Err(RefError::invalid(name, "HEAD is not a valid branch name"));
    }
    if name.starts_with('-') {
        return Err(RefError::invalid(name, "must not start with '-'"));
    }
    check_components(name)
}

/// Validate a short tag name. Same rules as branch names.
pub fn validate_tag_name(name: &str) -> RefResult<()> {
    if name.starts_with('-') {
        return Err(RefError::invalid(name, "must not start with '-'"));
    }
    check_components(name)
}

/// Validate a remote name. It becomes one component of
/// `refs/remotes/<name>/`, so it must be a single component.
pub fn validate_remote_name(name: &str) -> RefResult<()> {
    if name.contains('/') {
        return Err(RefError::invalid(name, "remote name must not contain '/'"));
    }
    check_components(name)
}

fn is_onelevel_special(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
        && name.as_bytes()[0] != b'_'
}

fn check_components(name: &str) -> RefResult<()> {
    if name.is_empty() {
        return Err(RefError::invalid(name, "name must not be empty"));
    }
    if name == "@" {
        return Err(RefError::invalid(name, "'@' alone is reserved"));
    }
    if let Some(c) = name.chars().find(|c| c.is_ascii_control()) {
        return Err(RefError::invalid(
            name,
            format!("contains control character {c:?}"),
        ));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(RefError::invalid(
            name,
            format!("contains forbidden character {c:?}"),
        ));
    }
    if name.contains("..") {
        return Err(RefError::invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(RefError::invalid(name, "must not contain '@{'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(RefError::invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with('.') {
        return Err(RefError::invalid(name, "must not end with '.'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(RefError::invalid(name, "must not contain '//'"));
        }
        if component.starts_with('.') {
            return Err(RefError::invalid(
                name,
                format!("component {component:?} starts with '.'"),
            ));
        }
        if component.ends_with(".lock") {
            return Err(RefError::invalid(
                name,
                format!("component {component:?} ends with '.lock'"),
            ));
        }
    }
    Ok(())
}

/// The human-facing short form of a full name.
///
/// `refs/heads/main` → `main`, `refs/tags/v1` → `v1`,
/// `refs/remotes/origin/main` → `origin/main`, `refs/notes/x` → `notes/x`.
pub fn shorthand(name: &str) -> &str {
    [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX, REFS_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// Full names tried, in order, when resolving a shorthand.
pub fn dwim_candidates(short: &str) -> [String; 6] {
    [
        short.to_string(),
        format!("{REFS_PREFIX}{short}"),
        format!("{TAGS_PREFIX}{short}"),
        format!("{HEADS_PREFIX}{short}"),
        format!("{REMOTES_PREFIX}{short}"),
        format!("{REMOTES_PREFIX}{short}/{HEAD}"),
    ]
}

/// Match `name` against a glob with `*` (any run) and `?` (one char).
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // Full names
    // ------------------------------------------------------------------

    #[test]
    fn valid_full_names() {
        assert!(validate_ref_name("refs/heads/main").is_ok());
        assert!(validate_ref_name("refs/heads/feature/deep/nested").is_ok());
        assert!(validate_ref_name("refs/tags/v1.0").is_ok());
        assert!(validate_ref_name("refs/remotes/origin/HEAD").is_ok());
    }

    #[test]
    fn onelevel_names() {
        assert!(validate_ref_name("HEAD").is_ok());
        assert!(validate_ref_name("FETCH_HEAD").is_ok());
        assert!(validate_ref_name("ORIG_HEAD").is_ok());
        assert!(validate_ref_name("main").is_err());
        assert!(validate_ref_name("Head").is_err());
        assert!(validate_ref_name("_HEAD").is_err());
    }

    #[test]
    fn reject_bad_sequences() {
        assert!(validate_ref_name("").is_err());
        assert!(validate_ref_name("refs/heads/a..b").is_err());
        assert!(validate_ref_name("refs/heads/a@{0}").is_err());
        assert!(validate_ref_name("refs//heads").is_err());
        assert!(validate_ref_name("/refs/heads/x").is_err());
        assert!(validate_ref_name("refs/heads/x/").is_err());
        assert!(validate_ref_name("refs/heads/x.").is_err());
        assert!(validate_ref_name("@").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for bad in ["a b", "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b", "a\x07b", "a\x7fb"] {
            let name = format!("refs/heads/{bad}");
            assert!(validate_ref_name(&name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn reject_dot_and_lock_components() {
        assert!(validate_ref_name("refs/heads/.hidden").is_err());
        assert!(validate_ref_name("refs/heads/main.lock").is_err());
        assert!(validate_ref_name("refs/x.lock/main").is_err());
        assert!(validate_ref_name("refs/heads/v1.lockfile").is_ok());
    }

    // ------------------------------------------------------------------
    // Short names
    // ------------------------------------------------------------------

    #[test]
    fn branch_tag_remote_names() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("feature/auth").is_ok());
        assert!(validate_branch_name("HEAD").is_err());
        assert!(validate_branch_name("-x").is_err());
        assert!(validate_tag_name("v1.0.0").is_ok());
        assert!(validate_remote_name("origin").is_ok());
        assert!(validate_remote_name("a/b").is_err());
    }

    #[test]
    fn shorthand_strips_known_prefixes() {
        assert_eq!(shorthand("refs/heads/main"), "main");
        assert_eq!(shorthand("refs/tags/v1"), "v1");
        assert_eq!(shorthand("refs/remotes/origin/main"), "origin/main");
        assert_eq!(shorthand("refs/notes/commits"), "notes/commits");
        assert_eq!(shorthand("HEAD"), "HEAD");
    }

    #[test]
    fn dwim_order() {
        let c = dwim_candidates("main");
        assert_eq!(c[0], "main");
        assert_eq!(c[2], "refs/tags/main");
        assert_eq!(c[3], "refs/heads/main");
        assert_eq!(c[5], "refs/remotes/main/HEAD");
    }

    #[test]
    fn glob() {
        assert!(glob_match("v1.*", "v1.0"));
        assert!(glob_match("*", ""));
        assert!(glob_match("v?.0", "v2.0"));
        assert!(glob_match("*-rc*", "v1.0-rc2"));
        assert!(!glob_match("v1.*", "v2.0"));
        assert!(!glob_match("v?", "v10"));
    }
}
