//! URIs naming persistent paths (spec §4.1).
//!
//! Every persistent path used by zq is a `scheme://host/path` URI; an
//! absent scheme defaults to `file`. Grounded on
//! `examples/original_source/pkg/iosrc/uri.go`.

use std::fmt;
use std::path::{Path, PathBuf};

/// A parsed storage URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl Uri {
    /// Parse a URI string, defaulting the scheme to `file` when absent.
    pub fn parse(s: &str) -> Uri {
        if let Some(idx) = s.find("://") {
            let scheme = s[..idx].to_string();
            let rest = &s[idx + 3..];
            let (host, path) = match rest.find('/') {
                Some(i) => (rest[..i].to_string(), rest[i..].to_string()),
                None => (rest.to_string(), String::new()),
            };
            Uri { scheme, host, path }
        } else {
            Uri {
                scheme: "file".to_string(),
                host: String::new(),
                path: s.to_string(),
            }
        }
    }

    /// Build a `file://` URI directly from a local filesystem path.
    pub fn from_path(p: impl AsRef<Path>) -> Uri {
        Uri {
            scheme: "file".to_string(),
            host: String::new(),
            path: p.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Append a relative path segment, always joined with `/`
    /// regardless of host OS (spec §6 "paths use forward slash
    /// regardless of OS").
    pub fn append_path(&self, segment: &str) -> Uri {
        let mut path = self.path.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(segment.trim_start_matches('/'));
        Uri {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path,
        }
    }

    /// View this URI as a local filesystem path. Only meaningful for
    /// `scheme == "file"`; callers should check that first.
    pub fn as_local_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme == "file" && self.host.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}://{}{}", self.scheme, self.host, self.path)
        }
    }
}
