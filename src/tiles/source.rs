use crate::tiles::image::TileImage;
use crate::{Error, Result};
use async_trait::async_trait;

/// Resolves a fetch descriptor into a decoded tile payload.
///
/// The retrieval mechanism (HTTP, disk, an in-memory fixture) is up to the
/// implementation. Fetches run on the caller's thread, so implementations do
/// not need to be `Send`.
#[async_trait(?Send)]
pub trait TileFetcher {
    async fn fetch(&self, descriptor: &str) -> Result<TileImage>;
}

/// Resolves a fetch descriptor into raw, still encoded bytes.
#[async_trait(?Send)]
pub trait ByteSource {
    async fn fetch_bytes(&self, descriptor: &str) -> Result<Vec<u8>>;
}

/// Splits a subdomain string into labels.
///
/// A string containing a comma is a comma-separated list, anything else is
/// one label per character.
pub fn parse_subdomains(spec: &str) -> Vec<String> {
    if spec.contains(',') {
        spec.split(',').map(|s| s.to_string()).collect()
    } else {
        spec.chars().map(|c| c.to_string()).collect()
    }
}

/// Picks the subdomain used for a tile so requests spread across hosts
pub fn subdomain_for(x: i64, y: i64, subdomains: &[String]) -> Option<&str> {
    if subdomains.is_empty() {
        return None;
    }
    let idx = (x + y).rem_euclid(subdomains.len() as i64) as usize;
    subdomains.get(idx).map(|s| s.as_str())
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    X,
    Y,
    Z,
    Subdomain,
}

/// A descriptor template such as `https://{s}.tile.example.org/{z}/{x}/{y}.png`.
///
/// Placeholders are case-insensitive and may carry a leading `$`. The
/// subdomain placeholder can list its own labels, which then take precedence
/// over the configured ones: `{s:abc}`, `{a-c}` or `{a,b,c}`.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplate {
    segments: Vec<Segment>,
    subdomains: Option<Vec<String>>,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut subdomains = None;
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            let inner = &rest[open + 1..close];
            let token = match Self::placeholder(inner) {
                Some((segment, inline)) => {
                    if inline.is_some() && subdomains.is_none() {
                        subdomains = inline;
                    }
                    segment
                }
                None => {
                    literal.push_str(&rest[..=close]);
                    rest = &rest[close + 1..];
                    continue;
                }
            };
            let mut head = &rest[..open];
            if let Some(stripped) = head.strip_suffix('$') {
                head = stripped;
            }
            literal.push_str(head);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(token);
            rest = &rest[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            segments,
            subdomains,
        }
    }

    /// The legacy `base_url` + `image_format` form: `base/{z}/{x}/{y}.fmt`
    pub fn from_base_url(base_url: &str, image_format: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::parse(&format!("{}/{{z}}/{{x}}/{{y}}.{}", base, image_format))
    }

    /// Labels listed inside the template itself, if any
    pub fn inline_subdomains(&self) -> Option<&[String]> {
        self.subdomains.as_deref()
    }

    /// Fills in the template for one tile.
    pub fn descriptor(&self, x: i64, y: i64, level: u32, subdomains: &[String]) -> String {
        let labels = self.subdomains.as_deref().unwrap_or(subdomains);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::X => out.push_str(&x.to_string()),
                Segment::Y => out.push_str(&y.to_string()),
                Segment::Z => out.push_str(&level.to_string()),
                Segment::Subdomain => out.push_str(subdomain_for(x, y, labels).unwrap_or("")),
            }
        }
        out
    }

    fn placeholder(inner: &str) -> Option<(Segment, Option<Vec<String>>)> {
        match inner {
            "x" | "X" => return Some((Segment::X, None)),
            "y" | "Y" => return Some((Segment::Y, None)),
            "z" | "Z" => return Some((Segment::Z, None)),
            "s" | "S" => return Some((Segment::Subdomain, None)),
            _ => {}
        }

        if let Some(labels) = inner
            .strip_prefix("s:")
            .or_else(|| inner.strip_prefix("S:"))
        {
            if !labels.is_empty() {
                let labels = labels.chars().map(|c| c.to_string()).collect();
                return Some((Segment::Subdomain, Some(labels)));
            }
            return None;
        }

        let chars: Vec<char> = inner.chars().collect();
        if chars.len() == 3 && chars[1] == '-' && chars[0] != '-' && chars[2] != '-' {
            let (lo, hi) = (chars[0].min(chars[2]), chars[0].max(chars[2]));
            let labels = (lo..=hi).map(|c| c.to_string()).collect();
            return Some((Segment::Subdomain, Some(labels)));
        }

        if inner.contains(',') && inner.split(',').all(|part| !part.is_empty()) {
            let labels = inner.split(',').map(|s| s.to_string()).collect();
            return Some((Segment::Subdomain, Some(labels)));
        }

        None
    }
}

#[cfg(feature = "http")]
mod http {
    use super::ByteSource;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use once_cell::sync::Lazy;

    /// Shared async HTTP client for tile fetching
    static HTTP_CLIENT: Lazy<std::result::Result<reqwest::Client, String>> = Lazy::new(|| {
        reqwest::Client::builder()
            .user_agent(concat!("tile-pyramid/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| e.to_string())
    });

    /// Treats descriptors as URLs and downloads them.
    #[derive(Debug, Clone, Default)]
    pub struct HttpSource;

    #[async_trait(?Send)]
    impl ByteSource for HttpSource {
        async fn fetch_bytes(&self, descriptor: &str) -> Result<Vec<u8>> {
            let client = HTTP_CLIENT.as_ref().map_err(|e| Error::Http(e.clone()))?;
            let response = client
                .get(descriptor)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if !response.status().is_success() {
                return Err(Error::Fetch {
                    descriptor: descriptor.to_string(),
                    reason: format!("HTTP {}", response.status()),
                });
            }

            let data = response
                .bytes()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;
            log::debug!("downloaded {} ({} bytes)", descriptor, data.len());
            Ok(data.to_vec())
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpSource;

/// Turns a failure message into a fetch error for `descriptor`
pub fn fetch_error(descriptor: &str, reason: impl Into<String>) -> Error {
    Error::Fetch {
        descriptor: descriptor.to_string(),
        reason: reason.into(),
    }
}
