//! AWS Signature Version 4 (`AWS4-HMAC-SHA256`) request signing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha256};

use super::transport::{Method, SignedRequest};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Request URL has no host")]
    MissingHost,
}

/// A request before signing.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RequestParts {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Signs requests for one region/service pair.
#[derive(Clone)]
pub struct SigV4Signer {
    access_key_id: String,
    secret_access_key: String,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            service: service.into(),
        }
    }

    /// Add `host`, `x-amz-date` and `authorization` headers for time `now`.
    ///
    /// Every header present on `parts` is signed.
    pub fn sign(
        &self,
        parts: RequestParts,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest, SigningError> {
        let url =
            reqwest::Url::parse(&parts.url).map_err(|e| SigningError::InvalidUrl(e.to_string()))?;
        let host = url.host_str().ok_or(SigningError::MissingHost)?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers: BTreeMap<String, String> = parts
            .headers
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value.trim().to_owned()))
            .collect();
        headers.insert("host".to_owned(), host);
        headers.insert("x-amz-date".to_owned(), amz_date.clone());

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            parts.method.as_str(),
            canonical_uri(&url),
            canonical_query(&url),
            canonical_headers,
            signed_headers,
            hex::encode(Sha256::digest(&parts.body)),
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = self.signing_key(&date);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        headers.insert(
            "authorization".to_owned(),
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.access_key_id
            ),
        );

        Ok(SignedRequest {
            method: parts.method,
            url: parts.url,
            headers,
            body: parts.body,
        })
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn canonical_uri(url: &reqwest::Url) -> String {
    let path = url.path();
    if path.is_empty() {
        "/".to_owned()
    } else {
        path.to_owned()
    }
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything except the RFC 3986 unreserved characters.
fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(char::from(byte));
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    // Credentials and request from the AWS SigV4 documentation.
    fn example_signer() -> SigV4Signer {
        SigV4Signer::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "us-east-1",
            "iam",
        )
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn test_signing_key_matches_documented_vector() {
        let key = example_signer().signing_key("20150830");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_signature_matches_documented_vector() {
        let parts = RequestParts::new(
            Method::Get,
            "https://iam.amazonaws.com/?Action=ListUsers&Version=2010-05-08",
        )
        .header(
            "Content-Type",
            "application/x-www-form-urlencoded; charset=utf-8",
        );

        let signed = example_signer().sign(parts, example_time()).unwrap();

        assert_eq!(signed.header("x-amz-date"), Some("20150830T123600Z"));
        assert_eq!(signed.header("host"), Some("iam.amazonaws.com"));
        assert_eq!(
            signed.header("authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
                 SignedHeaders=content-type;host;x-amz-date, \
                 Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
            )
        );
    }

    #[test]
    fn test_port_is_part_of_host() {
        let parts = RequestParts::new(Method::Post, "http://127.0.0.1:8080/paapi5/searchitems");
        let signed = example_signer().sign(parts, example_time()).unwrap();
        assert_eq!(signed.header("host"), Some("127.0.0.1:8080"));
    }

    #[test]
    fn test_signature_covers_body() {
        let signer = example_signer();
        let request =
            |body: &str| RequestParts::new(Method::Post, "https://example.com/").body(body);
        let a = signer.sign(request("a"), example_time()).unwrap();
        let b = signer.sign(request("b"), example_time()).unwrap();
        assert_ne!(a.header("authorization"), b.header("authorization"));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result =
            example_signer().sign(RequestParts::new(Method::Get, "not a url"), example_time());
        assert!(matches!(result, Err(SigningError::InvalidUrl(_))));
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("a b/c~d"), "a%20b%2Fc~d");
        assert_eq!(uri_encode("2010-05-08"), "2010-05-08");
    }

    #[test]
    fn test_canonical_query_is_sorted() {
        let url = reqwest::Url::parse("https://example.com/?b=2&a=1&a=0").unwrap();
        assert_eq!(canonical_query(&url), "a=0&a=1&b=2");
    }
}
