//! Request description consumed by the signers.
//!
//! A [`SignedRequest`] is built fresh for every call; signing reads the clock,
//! so a request is never re-sent with an old signature.

use std::fmt;

/// Ordered query parameters.
///
/// Insertion order is the wire order and the signing order. A key may appear
/// more than once, which is how list-valued parameters are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<Param>);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Param {
    key: String,
    value: String,
    /// Value is already percent-encoded and goes on the wire as is.
    raw: bool,
}

impl QueryParams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `key=value`.
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.push(Param {
            key: key.into(),
            value: value.to_string(),
            raw: false,
        });
        self
    }

    /// Append a value the exchange issued pre-encoded (e.g. a page cursor).
    /// It is signed and sent byte for byte, never encoded again.
    pub fn push_raw(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push(Param {
            key: key.into(),
            value: value.into(),
            raw: true,
        });
        self
    }

    /// Append `key=value` only when `value` is `Some`. `None` sends nothing,
    /// not an empty string.
    pub fn push_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(key, v);
        }
        self
    }

    /// Append one `key=value` pair per element (repeated keys).
    pub fn push_all<I, V>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for v in values {
            self.push(key, v);
        }
        self
    }

    /// Drop every pair with this key.
    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.0.retain(|p| p.key != key);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|p| p.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.key.as_str())
    }

    /// `application/x-www-form-urlencoded` serialization in insertion order.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|p| {
                if p.raw {
                    // Key is still ours to encode.
                    let key = serde_urlencoded::to_string([(p.key.as_str(), "")]).unwrap_or_default();
                    format!("{}{}", key, p.value)
                } else {
                    // Serializing a string pair cannot fail.
                    serde_urlencoded::to_string([(p.key.as_str(), p.value.as_str())]).unwrap_or_default()
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// HTTP method of a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// Everything a signer needs to authenticate one call.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub base_url: String,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<String>,
}

impl SignedRequest {
    /// A GET request with no body.
    pub fn get(base_url: impl Into<String>, path: impl Into<String>, query: QueryParams) -> Self {
        Self {
            method: Method::Get,
            base_url: base_url.into(),
            path: path.into(),
            query,
            body: None,
        }
    }

    /// Body as signed; empty string when absent.
    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    /// Full URL for the given final query.
    pub fn url_with(&self, query: &QueryParams) -> String {
        if query.is_empty() {
            format!("{}{}", self.base_url, self.path)
        } else {
            format!("{}{}?{}", self.base_url, self.path, query.encode())
        }
    }
}

/// Output of a signer: headers to attach and the query to put on the wire.
#[derive(Debug, Clone)]
pub struct AuthParts {
    pub headers: Vec<(&'static str, String)>,
    pub query: QueryParams,
    /// Timestamp exactly as it was signed.
    pub timestamp: String,
    pub signature: String,
}

impl AuthParts {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_preserves_insertion_order() {
        let mut q = QueryParams::new();
        q.push("category", "linear").push("symbol", "NIGHTUSDT").push("settleCoin", "USDT");
        assert_eq!(q.encode(), "category=linear&symbol=NIGHTUSDT&settleCoin=USDT");
    }

    #[test]
    fn test_push_opt_omits_none() {
        let mut q = QueryParams::new();
        q.push("category", "linear")
            .push_opt("symbol", None::<&str>)
            .push_opt("limit", Some(20));
        assert_eq!(q.encode(), "category=linear&limit=20");
        assert!(!q.contains_key("symbol"));
    }

    #[test]
    fn test_list_values_repeat_keys() {
        let mut q = QueryParams::new();
        q.push_all("symbol", ["BTCUSDT", "ETHUSDT"]);
        assert_eq!(q.encode(), "symbol=BTCUSDT&symbol=ETHUSDT");
    }

    #[test]
    fn test_encode_escapes_reserved_chars() {
        let mut q = QueryParams::new();
        q.push("cursor", "a b&c=d");
        assert_eq!(q.encode(), "cursor=a+b%26c%3Dd");
    }

    #[test]
    fn test_raw_value_is_not_encoded_again() {
        let mut q = QueryParams::new();
        q.push("category", "linear")
            .push_raw("cursor", "NIGHTUSDT%3A1657711949945%2CNIGHTUSDT%3A1657711949945");
        assert_eq!(
            q.encode(),
            "category=linear&cursor=NIGHTUSDT%3A1657711949945%2CNIGHTUSDT%3A1657711949945"
        );
        assert_eq!(
            q.get("cursor"),
            Some("NIGHTUSDT%3A1657711949945%2CNIGHTUSDT%3A1657711949945")
        );
    }

    #[test]
    fn test_url_with_and_without_query() {
        let req = SignedRequest::get("https://api.bybit.com", "/v5/position/list", QueryParams::new());
        assert_eq!(req.url_with(&req.query), "https://api.bybit.com/v5/position/list");

        let mut q = QueryParams::new();
        q.push("category", "linear");
        assert_eq!(
            req.url_with(&q),
            "https://api.bybit.com/v5/position/list?category=linear"
        );
    }

    #[test]
    fn test_remove_and_get() {
        let mut q = QueryParams::new();
        q.push("a", 1).push("signature", "x").push("b", 2);
        q.remove("signature");
        assert_eq!(q.len(), 2);
        assert_eq!(q.get("b"), Some("2"));
        assert_eq!(q.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
