//! Deterministic cache keys for requests.
//!
//! # Key Format
//!
//! - GET: `<url>?<query>` with query pairs form-encoded in insertion order
//!   (e.g. `https://tiles.example.com/wms?layers=s2&bbox=1%2C2%2C3%2C4`)
//! - POST: `<url>?<body-hash>` where the body is first normalized to a string
//! - Anything else: not cacheable
//!
//! The same key indexes the response caches and the in-flight registry.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::http::{Method, Request};

/// Hash applied to normalized POST bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyHasher {
    /// Lowercase hex SHA-256 of the body.
    #[default]
    Sha256,
    /// 32-bit rolling hash (`h = h * 31 + unit` over UTF-16 code units),
    /// rendered as a signed decimal. Fast, but distinct bodies can collide.
    Legacy32,
}

impl BodyHasher {
    /// Hashes a normalized body.
    pub fn hash(&self, body: &str) -> String {
        match self {
            BodyHasher::Sha256 => format!("{:x}", Sha256::digest(body.as_bytes())),
            BodyHasher::Legacy32 => legacy_hash(body).to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyHasher::Sha256 => "sha256",
            BodyHasher::Legacy32 => "legacy32",
        }
    }
}

impl fmt::Display for BodyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyHasher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(BodyHasher::Sha256),
            "legacy32" | "legacy" => Ok(BodyHasher::Legacy32),
            other => Err(format!("unknown body hasher '{}'", other)),
        }
    }
}

/// 32-bit rolling string hash with wrapping arithmetic.
pub fn legacy_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Computes the cache key for `request`, or `None` if it is not cacheable.
pub fn cache_key(request: &Request, hasher: BodyHasher) -> Option<String> {
    match request.method {
        Method::Get => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(request.query.iter())
                .finish();
            Some(format!("{}?{}", request.url, query))
        }
        Method::Post => {
            let normalized = request
                .body
                .as_ref()
                .map(|body| body.normalized().into_owned())
                .unwrap_or_default();
            Some(format!("{}?{}", request.url, hasher.hash(&normalized)))
        }
        Method::Put | Method::Delete | Method::Head => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_key_uses_insertion_order() {
        let a = Request::get("https://t.example.com/x").with_query("q", "1").with_query("b", "2");
        let b = Request::get("https://t.example.com/x").with_query("b", "2").with_query("q", "1");

        assert_eq!(cache_key(&a, BodyHasher::Sha256).unwrap(), "https://t.example.com/x?q=1&b=2");
        assert_ne!(cache_key(&a, BodyHasher::Sha256), cache_key(&b, BodyHasher::Sha256));
    }

    #[test]
    fn test_get_key_without_query() {
        let request = Request::get("https://t.example.com/capabilities");
        assert_eq!(
            cache_key(&request, BodyHasher::Sha256).unwrap(),
            "https://t.example.com/capabilities?"
        );
    }

    #[test]
    fn test_post_key_hashes_normalized_body() {
        let as_json = Request::post("https://t.example.com/search", json!({"bbox": [1, 2]}));
        let as_text = Request::post("https://t.example.com/search", r#"{"bbox":[1,2]}"#);

        let key = cache_key(&as_json, BodyHasher::Sha256).unwrap();
        assert!(key.starts_with("https://t.example.com/search?"));
        assert_eq!(key.len(), "https://t.example.com/search?".len() + 64);
        assert_eq!(key, cache_key(&as_text, BodyHasher::Sha256).unwrap());
    }

    #[test]
    fn test_post_bodies_differ() {
        let a = Request::post("https://t.example.com/search", "a");
        let b = Request::post("https://t.example.com/search", "b");
        assert_ne!(cache_key(&a, BodyHasher::Legacy32), cache_key(&b, BodyHasher::Legacy32));
        assert_ne!(cache_key(&a, BodyHasher::Sha256), cache_key(&b, BodyHasher::Sha256));
    }

    #[test]
    fn test_other_methods_not_cacheable() {
        for method in [Method::Put, Method::Delete, Method::Head] {
            let request = Request::new(method, "https://t.example.com/x");
            assert_eq!(cache_key(&request, BodyHasher::Sha256), None);
        }
    }

    #[test]
    fn test_legacy_hash_values() {
        assert_eq!(legacy_hash(""), 0);
        assert_eq!(legacy_hash("a"), 97);
        assert_eq!(legacy_hash("ab"), 97 * 31 + 98);
        // Wraps around instead of overflowing.
        let long = "z".repeat(64);
        let _ = legacy_hash(&long);
    }

    #[test]
    fn test_legacy_hash_known_collision() {
        // "Aa" and "BB" collide under the 31-multiplier rolling hash.
        assert_eq!(legacy_hash("Aa"), legacy_hash("BB"));
        assert_ne!(BodyHasher::Sha256.hash("Aa"), BodyHasher::Sha256.hash("BB"));
    }

    #[test]
    fn test_hasher_names_parse_back() {
        for hasher in [BodyHasher::Sha256, BodyHasher::Legacy32] {
            assert_eq!(hasher.as_str().parse::<BodyHasher>(), Ok(hasher));
        }
        assert_eq!(" SHA256 ".parse::<BodyHasher>(), Ok(BodyHasher::Sha256));
        assert!("md5".parse::<BodyHasher>().is_err());
    }
}
