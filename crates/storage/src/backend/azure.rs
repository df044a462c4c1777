//! Azure Blob Storage backend.
//!
//! Talks to a single container through the Blob service REST API, authorised
//! by a shared access signature (SAS) embedded in the container URI. No
//! account keys are ever handled: the signature's permissions (read, list,
//! write, delete) are the whole authorisation story.
//!
//! Uploads through [`write_stream()`](StorageBackend::write_stream) are staged
//! as fixed-size blocks (Put Block) and committed with Put Block List, so the
//! memory needed per upload is bounded by [`BLOCK_SIZE`] rather than the size
//! of the document. Payloads that fit in one block go up with a single Put Blob.

mod container;
mod listing;

use self::container::ContainerUrl;
use self::listing::ListPage;
use crate::backend::{BlobInfoStream, ByteStream};
use crate::error::{ErrorKind, Result};
use crate::{BlobInfo, StorageBackend, validate_name};
use async_stream::stream;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::{Bytes, BytesMut};
use exn::{OptionExt, ResultExt};
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::{Duration, SystemTime};

/// REST API version sent with every request.
const API_VERSION: &str = "2023-11-03";

/// Size of each staged block for streamed uploads.
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Azure Blob Storage backend for one SAS-addressed container.
///
/// # Examples
///
/// ```no_run
/// use docshelf_storage::backend::AzureBackend;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = AzureBackend::new(
///     "documents",
///     "https://account.blob.core.windows.net/docs?sv=2022-11-02&sp=rwdl&sig=...",
///     Duration::from_secs(30),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AzureBackend {
    name: String,
    client: Client,
    container: ContainerUrl,
}

impl AzureBackend {
    /// Create a new Azure backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `sas_uri` - Container URI including the shared access signature
    /// * `timeout` - Upper bound for each request, including reading the body
    ///
    /// # Errors
    ///
    /// Returns [`InvalidContainer`](ErrorKind::InvalidContainer) if the URI is
    /// not an http(s) container URI carrying a signature.
    pub fn new(name: impl Into<String>, sas_uri: &str, timeout: Duration) -> Result<Self> {
        let container = ContainerUrl::parse(sas_uri)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .or_raise(|| ErrorKind::BackendError("could not construct HTTP client".to_string()))?;
        tracing::debug!(container = %container.redacted(), "Configured Azure container");
        Ok(Self { name: name.into(), client, container })
    }

    /// Add the versioning headers, send, and turn transport failures into
    /// [`Unavailable`](ErrorKind::Unavailable).
    async fn send(&self, request: RequestBuilder, target: &str) -> Result<Response> {
        request
            .header("x-ms-version", API_VERSION)
            .header("x-ms-date", httpdate::fmt_http_date(SystemTime::now()))
            .send()
            .await
            // The URL carries the signature; keep it out of the error tree.
            .map_err(reqwest::Error::without_url)
            .or_raise(|| {
                ErrorKind::Unavailable(format!("request for `{target}` to {} failed", self.container.redacted()))
            })
    }

    /// Pass successful responses through, map everything else onto an
    /// [`ErrorKind`].
    fn check(response: Response, target: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if Self::is_blob_missing(&response) {
            exn::bail!(ErrorKind::NotFound(target.to_string()));
        }
        let code = Self::error_code(&response).unwrap_or("unknown").to_string();
        exn::bail!(match status {
            // Anything else missing (the container, usually) is not the
            // caller's blob being absent.
            StatusCode::NOT_FOUND => ErrorKind::InvalidContainer(format!("{target} ({code})")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ErrorKind::PermissionDenied(format!("{target} ({code})"))
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                ErrorKind::Unavailable(format!("{status} for {target} ({code})"))
            },
            s if s.is_server_error() => ErrorKind::Unavailable(format!("{status} for {target} ({code})")),
            _ => ErrorKind::BackendError(format!("{status} for {target} ({code})")),
        })
    }

    fn error_code(response: &Response) -> Option<&str> {
        response.headers().get("x-ms-error-code").and_then(|value| value.to_str().ok())
    }

    /// A 404 for the blob itself. Responses without an error code (bodiless
    /// HEADs from proxies, mostly) count as the blob being absent.
    fn is_blob_missing(response: &Response) -> bool {
        response.status() == StatusCode::NOT_FOUND
            && Self::error_code(response).is_none_or(|code| code == "BlobNotFound")
    }

    async fn list_page(&self, marker: Option<&str>) -> Result<ListPage> {
        let target = self.container.container().to_string();
        tracing::debug!(container = %target, marker, "Listing blobs");
        let response = self.send(self.client.get(self.container.list(marker)), &target).await?;
        let body = Self::check(response, &target)?
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .or_raise(|| ErrorKind::Unavailable(format!("listing of `{target}` was cut short")))?;
        listing::parse(&body)
    }

    async fn put_blob(&self, name: &str, data: Bytes, content_type: &str) -> Result<()> {
        tracing::debug!(name, bytes = data.len(), content_type, "Put Blob");
        let request = self
            .client
            .put(self.container.blob(name))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header(CONTENT_TYPE, content_type)
            .body(data);
        Self::check(self.send(request, name).await?, name)?;
        Ok(())
    }

    /// Stage one block, returning its ID for the block list.
    async fn put_block(&self, name: &str, index: usize, data: Bytes) -> Result<String> {
        let block_id = Self::block_id(index);
        tracing::debug!(name, index, bytes = data.len(), "Put Block");
        let request = self.client.put(self.container.block(name, &block_id)).body(data);
        Self::check(self.send(request, name).await?, name)?;
        Ok(block_id)
    }

    async fn put_block_list(&self, name: &str, block_ids: &[String], content_type: &str) -> Result<()> {
        tracing::debug!(name, blocks = block_ids.len(), content_type, "Put Block List");
        let request = self
            .client
            .put(self.container.block_list(name))
            .header("x-ms-blob-content-type", content_type)
            .header(CONTENT_TYPE, "application/xml")
            .body(Self::block_list_xml(block_ids));
        Self::check(self.send(request, name).await?, name)?;
        Ok(())
    }

    /// Block IDs must be base64 and the same length for every block of a blob.
    fn block_id(index: usize) -> String {
        BASE64_STANDARD.encode(format!("block-{index:08}"))
    }

    fn block_list_xml(block_ids: &[String]) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
        for id in block_ids {
            xml.push_str("<Latest>");
            xml.push_str(id);
            xml.push_str("</Latest>");
        }
        xml.push_str("</BlockList>");
        xml
    }

    fn header<'r>(response: &'r Response, name: &str, header: reqwest::header::HeaderName) -> Result<&'r str> {
        response
            .headers()
            .get(&header)
            .and_then(|value| value.to_str().ok())
            .ok_or_raise(|| ErrorKind::BackendError(format!("missing {header} header for {name}")))
    }
}

#[async_trait]
impl StorageBackend for AzureBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> BlobInfoStream<'_> {
        Box::pin(stream! {
            let mut marker: Option<String> = None;
            loop {
                let page = match self.list_page(marker.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    },
                };
                for blob in page.blobs {
                    yield Ok(blob);
                }
                match page.next_marker {
                    Some(next) => marker = Some(next),
                    None => break,
                }
            }
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let name = validate_name(name)?;
        let response = self.send(self.client.head(self.container.blob(&name)), &name).await?;
        if Self::is_blob_missing(&response) {
            return Ok(false);
        }
        Self::check(response, &name)?;
        Ok(true)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let name = validate_name(name)?;
        tracing::debug!(name, "Get Blob");
        let response = self.send(self.client.get(self.container.blob(&name)), &name).await?;
        let body = Self::check(response, &name)?
            .bytes()
            .await
            .map_err(reqwest::Error::without_url)
            .or_raise(|| ErrorKind::Unavailable(format!("download of `{name}` was cut short")))?;
        Ok(body.to_vec())
    }

    async fn stat(&self, name: &str) -> Result<BlobInfo> {
        let name = validate_name(name)?;
        let response = Self::check(self.send(self.client.head(self.container.blob(&name)), &name).await?, &name)?;
        let length = Self::header(&response, &name, CONTENT_LENGTH)?;
        let size = length
            .parse::<u64>()
            .or_raise(|| ErrorKind::BackendError(format!("bad Content-Length {length:?} for {name}")))?;
        let modified = Self::header(&response, &name, LAST_MODIFIED)?;
        let modified = httpdate::parse_http_date(modified)
            .or_raise(|| ErrorKind::BackendError(format!("bad Last-Modified {modified:?} for {name}")))?;
        Ok(BlobInfo::new(name, size, modified.into()))
    }

    async fn write(&self, name: &str, data: &[u8], content_type: &str) -> Result<()> {
        let name = validate_name(name)?;
        self.put_blob(&name, Bytes::copy_from_slice(data), content_type).await
    }

    async fn write_stream(&self, name: &str, mut body: ByteStream<'_>, content_type: &str) -> Result<u64> {
        let name = validate_name(name)?;
        let mut buffer = BytesMut::new();
        let mut block_ids = Vec::new();
        let mut total = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(ErrorKind::Io)? {
            total += chunk.len() as u64;
            buffer.extend_from_slice(&chunk);
            while buffer.len() >= BLOCK_SIZE {
                let block = buffer.split_to(BLOCK_SIZE).freeze();
                block_ids.push(self.put_block(&name, block_ids.len(), block).await?);
            }
        }
        if block_ids.is_empty() {
            // Small enough for a single request.
            self.put_blob(&name, buffer.freeze(), content_type).await?;
        } else {
            if !buffer.is_empty() {
                block_ids.push(self.put_block(&name, block_ids.len(), buffer.freeze()).await?);
            }
            self.put_block_list(&name, &block_ids, content_type).await?;
        }
        Ok(total)
    }

    async fn delete_if_exists(&self, name: &str) -> Result<bool> {
        let name = validate_name(name)?;
        tracing::debug!(name, "Delete Blob");
        let response = self.send(self.client.delete(self.container.blob(&name)), &name).await?;
        if Self::is_blob_missing(&response) {
            return Ok(false);
        }
        Self::check(response, &name)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ids_have_equal_length() {
        let first = AzureBackend::block_id(0);
        let last = AzureBackend::block_id(99_999_999);
        assert_eq!(first.len(), last.len());
        assert_ne!(first, AzureBackend::block_id(1));
        assert_eq!(first, BASE64_STANDARD.encode("block-00000000"));
    }

    #[test]
    fn test_block_list_xml() {
        let xml = AzureBackend::block_list_xml(&["AAA=".to_string(), "BBB=".to_string()]);
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="utf-8"?><BlockList><Latest>AAA=</Latest><Latest>BBB=</Latest></BlockList>"#
        );
    }

    #[test]
    fn test_new_rejects_unsigned_uri() {
        let err = AzureBackend::new("docs", "https://acct.blob.core.windows.net/docs", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidContainer(_)));
    }
}
