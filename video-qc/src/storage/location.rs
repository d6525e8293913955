//! Object location parsing.

use url::Url;

use crate::{Error, Result};

/// A bucket/key pair inside object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

/// Split an object URL into bucket and key.
///
/// Accepted forms:
/// - `s3://bucket/key`
/// - `https://bucket.s3.amazonaws.com/key`, `https://bucket.s3.region.amazonaws.com/key`
///   and `https://bucket.s3-region.amazonaws.com/key`
/// - path-style `https://host/bucket/key`
pub fn parse_url_to_bucket_and_key(raw: &str) -> Result<ObjectLocation> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::validation(format!("invalid object url '{raw}': {e}")))?;

    let path = url.path().trim_start_matches('/');

    let (bucket, key) = match url.scheme() {
        "s3" => {
            let bucket = url.host_str().unwrap_or_default();
            (bucket.to_string(), path.to_string())
        }
        "http" | "https" => {
            let host = url
                .host_str()
                .ok_or_else(|| Error::validation(format!("object url '{raw}' has no host")))?;
            match virtual_hosted_bucket(host) {
                Some(bucket) => (bucket.to_string(), path.to_string()),
                None => match path.split_once('/') {
                    Some((bucket, key)) => (bucket.to_string(), key.to_string()),
                    None => (path.to_string(), String::new()),
                },
            }
        }
        other => {
            return Err(Error::validation(format!(
                "unsupported object url scheme '{other}' in '{raw}'"
            )));
        }
    };

    let key = urlencoding::decode(&key)
        .map_err(|e| Error::validation(format!("object key in '{raw}' is not utf-8: {e}")))?
        .into_owned();

    if bucket.is_empty() || key.is_empty() {
        return Err(Error::validation(format!(
            "object url '{raw}' must name both a bucket and a key"
        )));
    }

    Ok(ObjectLocation { bucket, key })
}

/// `bucket.s3[.-]...amazonaws.com` → `bucket`.
fn virtual_hosted_bucket(host: &str) -> Option<&str> {
    if !host.ends_with(".amazonaws.com") {
        return None;
    }
    let idx = host.find(".s3.").or_else(|| host.find(".s3-"))?;
    let bucket = &host[..idx];
    (!bucket.is_empty()).then_some(bucket)
}
