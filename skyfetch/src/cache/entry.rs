//! Cached responses and the freshness policy.
//!
//! Freshness is recorded as a synthetic header, [`FRESHNESS_HEADER`], holding
//! the absolute expiry instant in epoch milliseconds. An entry without the
//! header never expires.

use crate::http::{Headers, Response, ResponseBody};

/// Synthetic header carrying the absolute expiry instant (epoch ms).
pub const FRESHNESS_HEADER: &str = "x-skyfetch-expires-at";

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A response stored in a cache backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub body: ResponseBody,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub(crate) body_len: usize,
}

impl CacheEntry {
    /// Builds an entry from a network response that expires `ttl_secs`
    /// seconds after `now_ms`.
    pub fn from_response(key: impl Into<String>, response: &Response, ttl_secs: u64, now_ms: i64) -> Self {
        let mut headers = response.headers.clone();
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        headers.insert(FRESHNESS_HEADER, now_ms.saturating_add(ttl_ms).to_string());

        Self {
            key: key.into(),
            body: response.body.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers,
            body_len: response.body_len(),
        }
    }

    /// Payload size in bytes, carried over from the response.
    pub fn body_len(&self) -> usize {
        self.body_len
    }

    /// The recorded expiry instant, if any.
    ///
    /// A header that does not parse is treated as already expired.
    pub fn expires_at(&self) -> Option<i64> {
        self.headers
            .get(FRESHNESS_HEADER)
            .map(|v| v.trim().parse::<i64>().unwrap_or(i64::MIN))
    }

    /// Returns `true` if the entry is fresh at `now_ms`.
    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        match self.expires_at() {
            None => true,
            Some(expiry) => expiry > now_ms,
        }
    }

    /// Returns `true` if the entry is fresh now.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now_millis())
    }

    /// Synthesizes a response without touching the network.
    pub fn into_response(self) -> Response {
        Response {
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            body: self.body,
            body_len: self.body_len,
            from_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn response() -> Response {
        let headers: Headers = [("content-type", "application/json")].into_iter().collect();
        Response::new(200, "OK", headers, ResponseBody::Json(json!({"tiles": [1, 2]})))
    }

    #[test]
    fn test_from_response_stamps_expiry() {
        let entry = CacheEntry::from_response("k", &response(), 1800, 1_000);
        assert_eq!(entry.expires_at(), Some(1_000 + 1_800_000));
        assert_eq!(entry.headers.get("content-type"), Some("application/json"));
        assert_eq!(entry.status, 200);
    }

    #[test]
    fn test_entry_without_header_is_always_fresh() {
        let mut entry = CacheEntry::from_response("k", &response(), 1, 0);
        entry.headers.remove(FRESHNESS_HEADER);
        assert!(entry.is_fresh_at(i64::MAX));
    }

    #[test]
    fn test_unparseable_header_is_stale() {
        let mut entry = CacheEntry::from_response("k", &response(), 60, 0);
        entry.headers.insert(FRESHNESS_HEADER, "soon");
        assert!(!entry.is_fresh_at(0));
    }

    #[test]
    fn test_into_response_marks_cache_origin() {
        let entry = CacheEntry::from_response("k", &response(), 60, now_millis());
        let synthesized = entry.clone().into_response();
        assert!(synthesized.from_cache());
        assert_eq!(synthesized.body, entry.body);
        assert!(synthesized.headers.contains(FRESHNESS_HEADER));
    }

    proptest! {
        #[test]
        fn prop_fresh_iff_now_before_expiry(stored in 0i64..1_000_000_000, ttl in 0u64..100_000, now in 0i64..2_000_000_000) {
            let entry = CacheEntry::from_response("k", &response(), ttl, stored);
            let expiry = stored + (ttl as i64) * 1000;
            prop_assert_eq!(entry.is_fresh_at(now), now < expiry);
        }
    }
}
