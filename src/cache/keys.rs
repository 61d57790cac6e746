//! Cache key definitions.
//!
//! Backends address entries by string, so every key is built from a structured
//! [`CacheKey`] whose encoding cannot collide across variants or field splits.

use std::fmt;

use sha2::{Digest, Sha256};

/// Structured identity of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A rendered page, namespaced by the deployment version that produced it
    /// and the origin (scheme and host) its links were rendered against.
    Page {
        origin: String,
        path: String,
        version: String,
    },
    /// An extracted fragment of a remote document.
    Snippet {
        url: String,
        start_token: String,
        end_token: String,
    },
}

impl CacheKey {
    /// Key for a page rendered for `origin` under the given deployment version.
    pub fn page(origin: &str, path: &str, version: &str) -> Self {
        Self::Page {
            origin: origin.to_ascii_lowercase(),
            path: normalize_path(path),
            version: version.to_string(),
        }
    }

    /// Key for a snippet extracted from `url` between two tokens.
    pub fn snippet(url: &str, start_token: &str, end_token: &str) -> Self {
        Self::Snippet {
            url: url.to_string(),
            start_token: start_token.to_string(),
            end_token: end_token.to_string(),
        }
    }

    /// Encode into the string handed to the backend.
    ///
    /// Page keys carry a length-prefixed version and origin ahead of the path, so
    /// a new deployment can never address an entry written by an older one and
    /// one host never reads pages rendered for another. Snippet keys
    /// length-prefix each field and are hashed to keep them short.
    pub fn encode(&self) -> String {
        match self {
            CacheKey::Page {
                origin,
                path,
                version,
            } => {
                format!(
                    "page:{}:{version}{}:{origin}{path}",
                    version.len(),
                    origin.len()
                )
            }
            CacheKey::Snippet {
                url,
                start_token,
                end_token,
            } => {
                let mut hasher = Sha256::new();
                for field in [url, start_token, end_token] {
                    hasher.update(field.len().to_string().as_bytes());
                    hasher.update(b":");
                    hasher.update(field.as_bytes());
                }
                format!("snippet:{}", hex::encode(hasher.finalize()))
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Normalize a request path into its logical identity.
///
/// Guarantees a leading slash, collapses repeated slashes and drops a trailing
/// slash on anything but the root.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://example.com";

    #[test]
    fn page_keys_are_namespaced_by_version() {
        let old = CacheKey::page(ORIGIN, "/", "2024.1");
        let new = CacheKey::page(ORIGIN, "/", "2024.2");
        assert_ne!(old.encode(), new.encode());
        assert_eq!(old.encode(), "page:6:2024.118:http://example.com/");
    }

    #[test]
    fn page_keys_are_namespaced_by_origin() {
        let plain = CacheKey::page("http://blog.example", "/", "v1");
        let other_host = CacheKey::page("http://evil.example", "/", "v1");
        let secure = CacheKey::page("https://blog.example", "/", "v1");
        assert_ne!(plain.encode(), other_host.encode());
        assert_ne!(plain.encode(), secure.encode());
        assert_eq!(
            plain.encode(),
            CacheKey::page("http://Blog.Example", "/", "v1").encode()
        );
    }

    #[test]
    fn page_keys_do_not_collide_across_version_and_path_split() {
        let a = CacheKey::page(ORIGIN, "/b", "a");
        let b = CacheKey::page(ORIGIN, "/", "a/b");
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn equivalent_paths_share_a_key() {
        assert_eq!(
            CacheKey::page(ORIGIN, "/feed/", "v1").encode(),
            CacheKey::page(ORIGIN, "/feed", "v1").encode()
        );
        assert_eq!(
            CacheKey::page(ORIGIN, "//2024//03/hello", "v1").encode(),
            CacheKey::page(ORIGIN, "/2024/03/hello", "v1").encode()
        );
    }

    #[test]
    fn snippet_keys_distinguish_field_boundaries() {
        let a = CacheKey::snippet("http://x/a-b", "c", "d");
        let b = CacheKey::snippet("http://x/a", "b-c", "d");
        let c = CacheKey::snippet("http://x/a", "b", "c-d");
        assert_ne!(a.encode(), b.encode());
        assert_ne!(b.encode(), c.encode());
        assert_ne!(a.encode(), c.encode());
    }

    #[test]
    fn snippet_keys_are_deterministic() {
        let first = CacheKey::snippet("http://example.com", "<!--s-->", "<!--e-->");
        let second = CacheKey::snippet("http://example.com", "<!--s-->", "<!--e-->");
        assert_eq!(first.encode(), second.encode());
        assert!(first.encode().starts_with("snippet:"));
    }

    #[test]
    fn normalize_path_handles_root_and_blank() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
        assert_eq!(normalize_path("about"), "/about");
    }
}
