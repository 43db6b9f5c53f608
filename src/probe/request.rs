//! Probe targets and request payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::collision::CollisionSet;
use crate::error::ConfigError;
use crate::http::{Protocol, TransportRequest};

/// How generated keys are escaped on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEncoding {
    /// application/x-www-form-urlencoded (space as `+`)
    #[default]
    Form,
    /// RFC 3986: everything but unreserved characters as `%XX`
    Strict,
}

impl KeyEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            KeyEncoding::Form => "form",
            KeyEncoding::Strict => "strict",
        }
    }

    pub fn encode(&self, input: &str) -> String {
        match self {
            KeyEncoding::Form => url::form_urlencoded::byte_serialize(input.as_bytes()).collect(),
            KeyEncoding::Strict => url_encode(input),
        }
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// URL encode (percent encoding) a string
pub fn url_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            // Unreserved characters (RFC 3986)
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{:02X}", byte));
            }
        }
    }
    encoded
}

/// Rules for turning a collision set into a request body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodingRules {
    pub key_encoding: KeyEncoding,
    /// Value every field is mapped to
    pub field_value: String,
}

/// A parsed probe target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub uri: String,
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// Path plus query
    pub path: String,
}

impl ProbeTarget {
    /// Parse a target URL, defaulting the port from its scheme
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let url = url::Url::parse(uri.trim())
            .map_err(|e| ConfigError::InvalidTarget(format!("{} ({})", uri, e)))?;

        let protocol = Protocol::from_scheme_name(url.scheme())?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::InvalidTarget(uri.to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = url.port().unwrap_or_else(|| protocol.default_port());

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            uri: url.to_string(),
            protocol,
            host,
            port,
            path,
        })
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// One encoded probe, built fresh for every ladder step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub target_uri: String,
    pub protocol: Protocol,
    pub port: u16,
    #[serde(skip)]
    pub encoded_body: Vec<u8>,
    pub body_bytes: usize,
    pub collision_set_size: usize,
}

impl ProbeRequest {
    /// Transport-level request for this probe
    pub fn to_transport(
        &self,
        target: &ProbeTarget,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> TransportRequest {
        TransportRequest {
            host: target.host.clone(),
            port: self.port,
            use_tls: self.protocol.uses_tls(),
            path: target.path.clone(),
            method: "POST".to_string(),
            headers: headers.to_vec(),
            body: self.encoded_body.clone(),
            timeout,
        }
    }

    /// Copy for the result log; the body itself is dropped, its size kept
    pub fn without_body(&self) -> Self {
        Self {
            target_uri: self.target_uri.clone(),
            protocol: self.protocol,
            port: self.port,
            encoded_body: Vec::new(),
            body_bytes: self.body_bytes,
            collision_set_size: self.collision_set_size,
        }
    }
}

/// Encodes collision sets into form bodies
#[derive(Debug, Clone, Default)]
pub struct ProbeRequestBuilder {
    rules: EncodingRules,
}

impl ProbeRequestBuilder {
    pub fn new(rules: EncodingRules) -> Self {
        Self { rules }
    }

    /// `key1=V&key2=V&...` in collision order
    pub fn encode_body(&self, set: &CollisionSet) -> Vec<u8> {
        let value = self.rules.key_encoding.encode(&self.rules.field_value);
        let mut body = String::with_capacity(set.size() * (set.seed.len() + value.len() + 2));

        for (idx, key) in set.keys.iter().enumerate() {
            if idx > 0 {
                body.push('&');
            }
            body.push_str(&self.rules.key_encoding.encode(key));
            body.push('=');
            body.push_str(&value);
        }

        body.into_bytes()
    }

    /// Build the probe request for one ladder step
    pub fn build(&self, target: &ProbeTarget, set: &CollisionSet) -> ProbeRequest {
        let encoded_body = self.encode_body(set);

        ProbeRequest {
            target_uri: target.uri.clone(),
            protocol: target.protocol,
            port: target.port,
            body_bytes: encoded_body.len(),
            encoded_body,
            collision_set_size: set.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(keys: &[&str]) -> CollisionSet {
        CollisionSet {
            seed: "seed".to_string(),
            model_id: "test".to_string(),
            target_hash: 0,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_target_defaults_port() {
        let target = ProbeTarget::parse("http://example.com/login").unwrap();
        assert_eq!(target.protocol, Protocol::Http);
        assert_eq!(target.port, 80);
        assert_eq!(target.host, "example.com");
        assert_eq!(target.path, "/login");

        let target = ProbeTarget::parse("HTTPS://example.com").unwrap();
        assert_eq!(target.protocol, Protocol::Https);
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/");
    }

    #[test]
    fn test_parse_target_keeps_explicit_port_and_query() {
        let target = ProbeTarget::parse("http://127.0.0.1:8080/form.php?debug=1").unwrap();
        assert_eq!(target.port, 8080);
        assert_eq!(target.path, "/form.php?debug=1");

        let target = ProbeTarget::parse("http://[::1]:9000/").unwrap();
        assert_eq!(target.host, "::1");
    }

    #[test]
    fn test_parse_target_rejects_bad_input() {
        assert!(matches!(
            ProbeTarget::parse("ftp://example.com/"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(ProbeTarget::parse("not a url"), Err(ConfigError::InvalidTarget(_))));
    }

    #[test]
    fn test_encode_body_form() {
        let builder = ProbeRequestBuilder::default();
        let body = builder.encode_body(&set_of(&["Aa", "BB", "a b"]));
        assert_eq!(String::from_utf8(body).unwrap(), "Aa=&BB=&a+b=");
    }

    #[test]
    fn test_encode_body_strict_with_value() {
        let builder = ProbeRequestBuilder::new(EncodingRules {
            key_encoding: KeyEncoding::Strict,
            field_value: "1".to_string(),
        });
        let body = builder.encode_body(&set_of(&["a b", "x&y"]));
        assert_eq!(String::from_utf8(body).unwrap(), "a%20b=1&x%26y=1");
    }

    #[test]
    fn test_build_request() {
        let target = ProbeTarget::parse("https://example.com:8443/api").unwrap();
        let builder = ProbeRequestBuilder::default();
        let request = builder.build(&target, &set_of(&["k1", "k2"]));

        assert_eq!(request.collision_set_size, 2);
        assert_eq!(request.port, 8443);
        assert_eq!(request.body_bytes, "k1=&k2=".len());

        let transport = request.to_transport(&target, &[], Duration::from_secs(1));
        assert!(transport.use_tls);
        assert_eq!(transport.method, "POST");
        assert_eq!(transport.url(), "https://example.com:8443/api");
        assert_eq!(transport.body, b"k1=&k2=".to_vec());
    }

    #[test]
    fn test_without_body_keeps_sizes() {
        let target = ProbeTarget::parse("http://example.com/").unwrap();
        let request = ProbeRequestBuilder::default().build(&target, &set_of(&["k1", "k2", "k3"]));

        let recorded = request.without_body();
        assert!(recorded.encoded_body.is_empty());
        assert_eq!(recorded.body_bytes, request.body_bytes);
        assert_eq!(recorded.collision_set_size, 3);
        assert_eq!(recorded.target_uri, request.target_uri);
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("hello world"), "hello%20world");
        assert_eq!(url_encode("a-b_c.d~e"), "a-b_c.d~e");
    }
}
