//! Call URL construction.

use dashmap::DashMap;
use url::Url;

/// Per-client memo of `schema://host/path` strings.
#[derive(Debug)]
pub struct UrlCenter {
    schema: String,
    urls: DashMap<(String, String), String>,
}

impl UrlCenter {
    /// Create a new URL center for `schema`.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            urls: DashMap::new(),
        }
    }

    /// URL of `path` on `host`. A leading `/` on `path` is optional.
    pub fn get_url(&self, host: &str, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        if let Some(url) = self.urls.get(&(host.to_string(), path.to_string())) {
            return url.clone();
        }
        self.urls
            .entry((host.to_string(), path.to_string()))
            .or_insert_with(|| format!("{}://{}/{}", self.schema, host, path))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Append per-call query parameters to `url`, form-encoded.
pub fn with_option_queries(
    url: &str,
    queries: &[(String, String)],
) -> Result<String, url::ParseError> {
    if queries.is_empty() {
        return Ok(url.to_string());
    }
    let mut parsed = Url::parse(url)?;
    parsed
        .query_pairs_mut()
        .extend_pairs(queries.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    Ok(parsed.into())
}
