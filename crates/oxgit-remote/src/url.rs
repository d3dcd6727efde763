//! Remote URL classification.
//!
//! Recognised forms: a local directory, `file://`, `http(s)://`, `ssh://`,
//! `git://`, and the scp-like `[user@]host:path`. Only local directories
//! and `file://` URLs have a transport.

use std::path::{Path, PathBuf};

const NETWORK_SCHEMES: &[&str] = &["http", "https", "ssh", "git", "ssh+git", "git+ssh"];

/// The transport family a URL selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlKind {
    Local(PathBuf),
    Network { scheme: String },
    Scp { host: String, path: String },
}

/// Classify `url`, or `None` if it is not a remote URL at all.
pub fn classify(url: &str) -> Option<UrlKind> {
    if url.is_empty() || url.contains('\0') {
        return None;
    }
    if let Some((scheme, rest)) = url.split_once("://") {
        if rest.is_empty() {
            return None;
        }
        return match scheme {
            "file" => Some(UrlKind::Local(file_url_path(rest))),
            s if NETWORK_SCHEMES.contains(&s) => {
                let host = rest.split('/').next().unwrap_or_default();
                (!host.is_empty()).then(|| UrlKind::Network { scheme: s.to_string() })
            }
            _ => None,
        };
    }
    if let Some(scp) = scp_like(url) {
        return Some(scp);
    }
    let path = Path::new(url);
    path.is_dir().then(|| UrlKind::Local(path.to_path_buf()))
}

/// Whether `url` is well formed for any known transport.
pub fn is_valid_url(url: &str) -> bool {
    classify(url).is_some()
}

/// Whether `url` can be connected to by this library.
pub fn is_supported_url(url: &str) -> bool {
    matches!(classify(url), Some(UrlKind::Local(_)))
}

/// `file:///srv/repo.git` and `file://localhost/srv/repo.git` both name
/// `/srv/repo.git`.
fn file_url_path(rest: &str) -> PathBuf {
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    PathBuf::from(rest)
}

/// `[user@]host:path`, where no `/` precedes the colon. A single-letter host
/// is a drive letter, not a host.
fn scp_like(url: &str) -> Option<UrlKind> {
    let (left, path) = url.split_once(':')?;
    if left.contains('/') || path.is_empty() {
        return None;
    }
    let host = left.rsplit_once('@').map_or(left, |(_, host)| host);
    if host.is_empty() || host.len() == 1 {
        return None;
    }
    Some(UrlKind::Scp { host: host.to_string(), path: path.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_forms_are_valid_but_unsupported() {
        for url in [
            "https://example.com/repo.git",
            "http://example.com/repo",
            "ssh://git@example.com/repo.git",
            "git://example.com/repo.git",
            "git@example.com:org/repo.git",
            "example.com:repo.git",
        ] {
            assert!(is_valid_url(url), "{url}");
            assert!(!is_supported_url(url), "{url}");
        }
    }

    #[test]
    fn malformed_urls() {
        for url in ["", "https://", "ftp://example.com/x", "https:///path", "@:x", "c:/repo", "/no/such/dir/here"] {
            assert!(!is_valid_url(url), "{url}");
        }
    }

    #[test]
    fn local_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        assert!(is_valid_url(path));
        assert!(is_supported_url(path));
        let file_url = format!("file://{path}");
        assert_eq!(classify(&file_url), Some(UrlKind::Local(dir.path().to_path_buf())));
        assert!(is_supported_url(&file_url));
    }

    #[test]
    fn scp_parts() {
        assert_eq!(
            classify("git@example.com:org/repo.git"),
            Some(UrlKind::Scp { host: "example.com".into(), path: "org/repo.git".into() })
        );
    }
}
