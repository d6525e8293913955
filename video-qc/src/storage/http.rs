//! S3-compatible object storage over plain HTTP.
//!
//! Requests are unsigned. Deployments point `endpoint` at an in-cluster
//! S3-compatible store or a signing gateway, optionally authenticated with a
//! bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use tracing::{debug, warn};
use url::Url;

use super::{CompletedPart, ObjectStorage, StorageConfig};
use crate::utils::http_client::build_client;
use crate::{Error, Result};

pub struct HttpObjectStorage {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpObjectStorage {
    pub fn new(config: StorageConfig) -> Self {
        let client = build_client(
            Duration::from_secs(config.request_timeout_secs),
            concat!("video-qc/", env!("CARGO_PKG_VERSION")),
        );
        Self { client, config }
    }

    /// Address of `bucket/key` under the configured endpoint.
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let endpoint = self.config.resolved_endpoint();
        let mut url = Url::parse(&endpoint)
            .map_err(|e| Error::config(format!("invalid storage endpoint '{endpoint}': {e}")))?;

        if self.config.path_style {
            url.path_segments_mut()
                .map_err(|_| Error::config(format!("storage endpoint '{endpoint}' cannot be a base")))?
                .pop_if_empty()
                .push(bucket)
                .extend(key.split('/'));
        } else {
            let host = url
                .host_str()
                .ok_or_else(|| Error::config(format!("storage endpoint '{endpoint}' has no host")))?
                .to_string();
            url.set_host(Some(&format!("{bucket}.{host}")))
                .map_err(|e| Error::validation(format!("invalid bucket name '{bucket}': {e}")))?;
            url.path_segments_mut()
                .map_err(|_| Error::config(format!("storage endpoint '{endpoint}' cannot be a base")))?
                .pop_if_empty()
                .extend(key.split('/'));
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// `CompleteMultipartUpload` request body.
fn complete_multipart_body(parts: &[CompletedPart]) -> String {
    let mut sorted: Vec<&CompletedPart> = parts.iter().collect();
    sorted.sort_by_key(|p| p.part_number);

    let mut body = String::from("<CompleteMultipartUpload>");
    for part in sorted {
        body.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            part.part_number,
            xml_escape(&part.e_tag)
        ));
    }
    body.push_str("</CompleteMultipartUpload>");
    body
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn object_size_bytes(&self, bucket: &str, key: &str) -> Result<u64> {
        let url = self.object_url(bucket, key)?;
        let response = self.authorize(self.client.head(url.clone())).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found("Object", format!("{bucket}/{key}")));
        }
        if !status.is_success() {
            return Err(Error::storage(format!(
                "HEAD {url} returned {status}"
            )));
        }

        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| Error::storage(format!("HEAD {url} returned no Content-Length")))?;

        debug!(bucket, key, size, "Resolved object size");
        Ok(size)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        if parts.is_empty() {
            return Err(Error::validation("multipart upload needs at least one part"));
        }

        let mut url = self.object_url(bucket, key)?;
        url.query_pairs_mut().append_pair("uploadId", upload_id);

        let response = self
            .authorize(self.client.post(url.clone()))
            .header(header::CONTENT_TYPE, "application/xml")
            .body(complete_multipart_body(parts))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(bucket, key, upload_id, %status, "CompleteMultipartUpload failed: {}", body);
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found("MultipartUpload", upload_id));
        }
        Err(Error::storage(format!(
            "CompleteMultipartUpload for {bucket}/{key} returned {status}"
        )))
    }
}
