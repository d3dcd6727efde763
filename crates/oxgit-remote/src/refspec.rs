//! Refspecs: `[+]<src>[:<dst>]`, mapping remote names to local ones.

use std::fmt;
use std::str::FromStr;

use oxgit_refs::names::is_valid_ref_name;

use crate::error::{RemoteError, RemoteResult};

/// Which way a refspec is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Fetch,
    Push,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Push => "push",
        })
    }
}

/// A parsed refspec such as `+refs/heads/*:refs/remotes/origin/*`.
///
/// Each side holds at most one `*`; if either side has one, both must.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Refspec {
    force: bool,
    src: String,
    dst: String,
}

impl Refspec {
    pub fn parse(spec: &str) -> RemoteResult<Self> {
        let invalid = |reason: &str| RemoteError::InvalidRefspec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };
        if spec.starts_with('^') {
            return Err(invalid("negative refspecs are not supported"));
        }
        let (force, body) = match spec.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let (src, dst) = body.split_once(':').unwrap_or((body, ""));
        if src.is_empty() {
            return Err(invalid("empty source"));
        }
        if dst.contains(':') {
            return Err(invalid("more than one ':'"));
        }

        let src_globs = src.matches('*').count();
        let dst_globs = dst.matches('*').count();
        if src_globs > 1 || dst_globs > 1 {
            return Err(invalid("more than one '*' on a side"));
        }
        if !dst.is_empty() && src_globs != dst_globs {
            return Err(invalid("'*' must appear on both sides"));
        }
        for side in [src, dst].into_iter().filter(|s| !s.is_empty()) {
            if !is_valid_pattern(side) {
                return Err(invalid("not a valid reference pattern"));
            }
        }

        Ok(Self { force, src: src.to_string(), dst: dst.to_string() })
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn is_glob(&self) -> bool {
        self.src.contains('*')
    }

    pub fn src_matches(&self, name: &str) -> bool {
        capture(&self.src, name).is_some()
    }

    pub fn dst_matches(&self, name: &str) -> bool {
        !self.dst.is_empty() && capture(&self.dst, name).is_some()
    }

    /// Map a source-side name to its destination, e.g. the local
    /// tracking ref a fetched ref is stored under.
    pub fn transform(&self, name: &str) -> Option<String> {
        if self.dst.is_empty() {
            return None;
        }
        let star = capture(&self.src, name)?;
        Some(self.dst.replacen('*', star, 1))
    }

    /// Map a destination-side name back to its source.
    pub fn rtransform(&self, name: &str) -> Option<String> {
        if self.dst.is_empty() {
            return None;
        }
        let star = capture(&self.dst, name)?;
        Some(self.src.replacen('*', star, 1))
    }
}

impl fmt::Display for Refspec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.force {
            f.write_str("+")?;
        }
        f.write_str(&self.src)?;
        if !self.dst.is_empty() {
            write!(f, ":{}", self.dst)?;
        }
        Ok(())
    }
}

impl FromStr for Refspec {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The text `*` stands for when `pattern` matches `name`. Exact patterns
/// capture the empty string.
fn capture<'n>(pattern: &str, name: &'n str) -> Option<&'n str> {
    match pattern.split_once('*') {
        None => (pattern == name).then_some(""),
        Some((prefix, suffix)) => {
            let rest = name.strip_prefix(prefix)?;
            let star = rest.strip_suffix(suffix)?;
            (!star.is_empty()).then_some(star)
        }
    }
}

/// Short source names such as `main` are allowed; a `*` is checked as if it
/// were an ordinary component character.
fn is_valid_pattern(side: &str) -> bool {
    let probe = side.replace('*', "x");
    is_valid_ref_name(&probe) || (!probe.contains('/') && is_valid_ref_name(&format!("refs/{probe}")))
}
