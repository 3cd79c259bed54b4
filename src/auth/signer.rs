//! HMAC-SHA256 request signing.
//!
//! # Steps
//! 1. Fill `Content-Type`/`X-Date` defaults, set `X-Content-Sha256` and `Host`
//! 2. Canonical request: method, URI, query, signed headers, body hash
//! 3. String to sign: algorithm, timestamp, scope, canonical request hash
//! 4. Signing key chain: secret → date → region → service → "request"
//! 5. `Authorization` header (plus `X-Security-Token` with a session token)
//!
//! Identical inputs always produce an identical signature.

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::Request;
use sha2::{Digest, Sha256};

use crate::auth::credential::Credential;
use crate::auth::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HMAC-SHA256";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const X_DATE: &str = "x-date";
const X_CONTENT_SHA256: &str = "x-content-sha256";
const X_SECURITY_TOKEN: &str = "x-security-token";
const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Current UTC time in signing format, e.g. `20240102T030405Z`.
pub fn timestamp_now() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Sign `request` in place.
pub fn sign(request: &mut Request, credential: &Credential) -> Result<(), AuthError> {
    let body = request
        .body()
        .and_then(|b| b.as_bytes())
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    let method = request.method().as_str().to_string();
    let url = request.url().clone();

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(AuthError::MissingHost),
    };
    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    sign_parts(
        request.headers_mut(),
        &method,
        &host,
        url.path(),
        &query,
        &body,
        credential,
    )
}

/// Sign the given request parts, writing headers into `headers`. A `Host`
/// header already present is kept and signed in place of `host`.
pub fn sign_parts(
    headers: &mut HeaderMap,
    method: &str,
    host: &str,
    path: &str,
    query: &[(String, String)],
    body: &[u8],
    credential: &Credential,
) -> Result<(), AuthError> {
    set_default(headers, CONTENT_TYPE, DEFAULT_CONTENT_TYPE)?;
    if !headers.contains_key(X_DATE) {
        insert(headers, HeaderName::from_static(X_DATE), &timestamp_now())?;
    }
    let body_hash = sha256_hex(body);
    insert(headers, HeaderName::from_static(X_CONTENT_SHA256), &body_hash)?;
    set_default(headers, HOST, host)?;

    let timestamp = header_str(headers, X_DATE);
    let date = timestamp.get(..8).ok_or(AuthError::BadTimestamp)?.to_string();
    let scope = format!("{}/{}/{}/request", date, credential.region, credential.service);

    let (canonical_headers, signed_headers) = canonical_headers(headers);
    let uri = if path.is_empty() { "/" } else { path };
    // canonical_headers already ends with a newline.
    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        canonical_uri(uri),
        canonical_query(query),
        canonical_headers,
        signed_headers,
        body_hash
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credential.secret_key, &date, &credential.region, &credential.service)?;
    let signature = hex(&hmac_sha256(&key, &string_to_sign)?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credential.access_key_id
    );
    insert(headers, AUTHORIZATION, &authorization)?;
    if let Some(token) = &credential.session_token {
        insert(headers, HeaderName::from_static(X_SECURITY_TOKEN), token)?;
    }
    Ok(())
}

/// Render signed headers as `key:value\n` lines plus the `;`-joined names.
fn canonical_headers(headers: &HeaderMap) -> (String, String) {
    let mut names: Vec<&str> = headers
        .keys()
        .map(HeaderName::as_str)
        .filter(|name| {
            matches!(*name, "content-type" | "content-md5" | "host") || name.starts_with("x-")
        })
        .collect();
    names.sort_unstable();

    let mut rendered = String::new();
    for name in &names {
        let raw = header_str(headers, name);
        let mut value = raw.trim();
        if *name == "host" {
            if let Some((host, port)) = value.split_once(':') {
                if port == "80" || port == "443" {
                    value = host;
                }
            }
        }
        rendered.push_str(name);
        rendered.push(':');
        rendered.push_str(value);
        rendered.push('\n');
    }
    (rendered, names.join(";"))
}

/// Percent-encode every path segment.
pub fn canonical_uri(path: &str) -> String {
    path.split('/')
        .map(|segment| encode(&percent_decode(segment)))
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode and sort query pairs by key; pairs sharing a key keep their order.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = query.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k.as_bytes()), encode(v.as_bytes())))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 15) as usize] as char);
        }
    }
    out
}

/// URL paths arrive percent-encoded; sign the raw bytes.
fn percent_decode(segment: &str) -> Vec<u8> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, AuthError> {
    let k_date = hmac_sha256(secret.as_bytes(), date)?;
    let k_region = hmac_sha256(&k_date, region)?;
    let k_service = hmac_sha256(&k_region, service)?;
    hmac_sha256(&k_service, "request")
}

fn hmac_sha256(key: &[u8], content: &str) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidKey)?;
    mac.update(content.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn set_default(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), AuthError> {
    let present = headers.get(&name).map_or(false, |v| !v.is_empty());
    if !present {
        insert(headers, name, value)?;
    }
    Ok(())
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| AuthError::InvalidHeaderValue(name.as_str().to_string()))?;
    headers.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new("AKID", "SECRET", "cn-north-1", "air")
    }

    fn headers_at(ts: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-date", HeaderValue::from_str(ts).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn sign_with(headers: &mut HeaderMap, path: &str, body: &[u8]) -> String {
        let query = vec![("b".to_string(), "2".to_string()), ("a".to_string(), "x y".to_string())];
        sign_parts(headers, "POST", "api.example.com:443", path, &query, body, &credential())
            .unwrap();
        headers[AUTHORIZATION].to_str().unwrap().to_string()
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_with(&mut headers_at("20240102T030405Z"), "/predict/api/ping", b"body");
        let b = sign_with(&mut headers_at("20240102T030405Z"), "/predict/api/ping", b"body");
        assert_eq!(a, b);
        assert!(a.starts_with(
            "HMAC-SHA256 Credential=AKID/20240102/cn-north-1/air/request, \
             SignedHeaders=content-type;host;x-content-sha256;x-date, Signature="
        ));
    }

    #[test]
    fn test_any_input_changes_signature() {
        let base = sign_with(&mut headers_at("20240102T030405Z"), "/p", b"body");
        assert_ne!(base, sign_with(&mut headers_at("20240102T030406Z"), "/p", b"body"));
        assert_ne!(base, sign_with(&mut headers_at("20240102T030405Z"), "/q", b"body"));
        assert_ne!(base, sign_with(&mut headers_at("20240102T030405Z"), "/p", b"other"));

        let mut extra = headers_at("20240102T030405Z");
        extra.insert("x-custom", HeaderValue::from_static("1"));
        assert_ne!(base, sign_with(&mut extra, "/p", b"body"));
    }

    #[test]
    fn test_unsigned_headers_do_not_matter() {
        let base = sign_with(&mut headers_at("20240102T030405Z"), "/p", b"body");
        let mut extra = headers_at("20240102T030405Z");
        extra.insert("tenant-id", HeaderValue::from_static("t"));
        assert_eq!(base, sign_with(&mut extra, "/p", b"body"));
    }

    #[test]
    fn test_defaults_and_session_token() {
        let mut headers = HeaderMap::new();
        let cred = credential().with_session_token("STS");
        sign_parts(&mut headers, "GET", "h", "", &[], b"", &cred).unwrap();
        assert_eq!(headers[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert_eq!(headers["x-date"].len(), 16);
        assert_eq!(headers["x-security-token"], "STS");
        assert_eq!(headers["x-content-sha256"], sha256_hex(b""));
        assert_eq!(headers[HOST], "h");
    }

    #[test]
    fn test_canonical_headers_strip_default_ports() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("h.example.com:80"));
        headers.insert("x-a", HeaderValue::from_static("  v  "));
        headers.insert("accept", HeaderValue::from_static("*/*"));
        let (rendered, names) = canonical_headers(&headers);
        assert_eq!(rendered, "host:h.example.com\nx-a:v\n");
        assert_eq!(names, "host;x-a");

        headers.insert(HOST, HeaderValue::from_static("h.example.com:8080"));
        let (rendered, _) = canonical_headers(&headers);
        assert!(rendered.starts_with("host:h.example.com:8080\n"));
    }

    #[test]
    fn test_canonical_uri() {
        assert_eq!(canonical_uri("/predict/api/ping"), "/predict/api/ping");
        assert_eq!(canonical_uri("/a b/c+d"), "/a%20b/c%2Bd");
        assert_eq!(canonical_uri("/a%20b"), "/a%20b");
        assert_eq!(canonical_uri("/"), "/");
    }

    #[test]
    fn test_canonical_query() {
        let query = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "x y".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        assert_eq!(canonical_query(&query), "a=x%20y&a=1&b=2");
        assert_eq!(canonical_query(&[]), "");
    }

    #[test]
    fn test_sign_request_uses_url_parts() {
        let url = reqwest::Url::parse("https://api.example.com/predict/api/x?b=2&a=1").unwrap();
        let mut request = Request::new(reqwest::Method::POST, url);
        *request.body_mut() = Some(reqwest::Body::from(b"payload".to_vec()));
        request
            .headers_mut()
            .insert("x-date", HeaderValue::from_static("20240102T030405Z"));
        sign(&mut request, &credential()).unwrap();

        let mut headers = headers_at("20240102T030405Z");
        headers.remove(CONTENT_TYPE);
        let query = vec![("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())];
        sign_parts(
            &mut headers,
            "POST",
            "api.example.com",
            "/predict/api/x",
            &query,
            b"payload",
            &credential(),
        )
        .unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], headers[AUTHORIZATION]);
        assert_eq!(request.headers()[HOST], "api.example.com");
    }

    #[test]
    fn test_existing_host_header_is_signed() {
        let mut overridden = headers_at("20240102T030405Z");
        overridden.insert(HOST, HeaderValue::from_static("rec.example.com"));
        let signature = sign_with(&mut overridden, "/p", b"body");
        assert_eq!(overridden[HOST], "rec.example.com");

        let mut plain = headers_at("20240102T030405Z");
        assert_ne!(signature, sign_with(&mut plain, "/p", b"body"));
    }
}
