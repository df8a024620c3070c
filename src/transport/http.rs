use std::time::Duration;
use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use crate::slot::{ProgressReporter, ProgressStream, Result, SelectedFile, UploadError};
use super::Transport;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// POSTs the file body to an endpoint and takes the stored URL from the response
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    token: Option<String>,
    chunk_size: usize,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn create_headers(&self, file: &SelectedFile) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, header_value(&file.mime)?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(file.size));
        headers.insert("Upload-Metadata", header_value(&upload_metadata(file))?);

        if let Some(token) = &self.token {
            headers.insert(AUTHORIZATION, header_value(token)?);
        }

        Ok(headers)
    }

    fn body(&self, file: &SelectedFile, progress: ProgressReporter) -> Body {
        let chunks: Vec<std::io::Result<Bytes>> = chunk_bytes(&file.data, self.chunk_size)
            .into_iter()
            .map(Ok)
            .collect();
        let stream = ProgressStream::new(futures::stream::iter(chunks), progress, file.size);
        Body::wrap_stream(stream)
    }

    async fn send(&self, file: &SelectedFile, progress: ProgressReporter) -> Result<String> {
        let response = self.client
            .post(self.endpoint.clone())
            .headers(self.create_headers(file)?)
            .body(self.body(file, progress))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(%status, file = %file.name, "upload rejected by server");
            return Err(UploadError::transport(format!("server responded with {}: {}", status, message.trim())));
        }

        if let Some(location) = response.headers().get(LOCATION) {
            let location = location
                .to_str()
                .map_err(|err| UploadError::transport(err.to_string()))?;
            return resolve_location(&self.endpoint, location);
        }

        let body: UploadResponse = response.json().await?;
        resolve_location(&self.endpoint, &body.url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn upload(
        &self,
        file: &SelectedFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<String> {
        debug!(endpoint = %self.endpoint, file = %file.name, size = file.size, "http upload");
        progress.report(0);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            result = self.send(file, progress.clone()) => result,
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| UploadError::transport(format!("invalid header value: {}", err)))
}

/// `filename <base64>,filetype <base64>`
fn upload_metadata(file: &SelectedFile) -> String {
    format!(
        "filename {},filetype {}",
        BASE64_STANDARD.encode(&file.name),
        BASE64_STANDARD.encode(&file.mime),
    )
}

fn chunk_bytes(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect()
}

fn resolve_location(endpoint: &Url, location: &str) -> Result<String> {
    if location.trim().is_empty() {
        return Err(UploadError::EmptyUrl);
    }

    Ok(endpoint.join(location.trim())?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn file() -> SelectedFile {
        SelectedFile::from_bytes("cat.png", "image/png", b"12345678".to_vec())
    }

    #[test]
    fn test_upload_metadata() {
        assert_eq!(upload_metadata(&file()), "filename Y2F0LnBuZw==,filetype aW1hZ2UvcG5n");
    }

    #[test]
    fn test_chunk_bytes() {
        let chunks = chunk_bytes(&Bytes::from_static(b"abcdefg"), 3);
        assert_eq!(chunks, vec![
            Bytes::from_static(b"abc"),
            Bytes::from_static(b"def"),
            Bytes::from_static(b"g"),
        ]);
        assert!(chunk_bytes(&Bytes::new(), 3).is_empty());
    }

    #[test]
    fn test_resolve_location() {
        let endpoint = Url::parse("http://localhost:8080/api/upload").unwrap();
        assert_eq!(resolve_location(&endpoint, "/files/abc").unwrap(), "http://localhost:8080/files/abc");
        assert_eq!(resolve_location(&endpoint, "https://cdn.example.com/x.png").unwrap(), "https://cdn.example.com/x.png");
        assert!(matches!(resolve_location(&endpoint, " "), Err(UploadError::EmptyUrl)));
    }

    #[test]
    fn test_headers() {
        let transport = HttpTransport::new("http://localhost/upload", Duration::from_secs(5))
            .unwrap()
            .with_token("Bearer secret");
        let headers = transport.create_headers(&file()).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(headers[CONTENT_LENGTH], "8");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
    }

    /// 一次性的 HTTP 服务，读完请求后返回 `response`
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let headers = text[..header_end].to_ascii_lowercase();
                    let body_len = buf.len() - (header_end + 4);
                    let expected = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok());

                    match expected {
                        Some(expected) if body_len >= expected => break,
                        None if text.ends_with("0\r\n\r\n") => break,
                        _ => {}
                    }
                }
            }

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/upload", addr)
    }

    #[tokio::test]
    async fn test_upload_location_header() {
        let endpoint = serve_once("HTTP/1.1 201 Created\r\nLocation: /files/abc\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let transport = HttpTransport::new(&endpoint, Duration::from_secs(5)).unwrap().with_chunk_size(3);

        let url = transport
            .upload(&file(), ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();
        assert!(url.ends_with("/files/abc"));
    }

    #[tokio::test]
    async fn test_upload_json_body() {
        let endpoint = serve_once("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 34\r\nConnection: close\r\n\r\n{\"url\":\"https://cdn.test/cat.png\"}").await;
        let transport = HttpTransport::new(&endpoint, Duration::from_secs(5)).unwrap();

        let url = transport
            .upload(&file(), ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.test/cat.png");
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let endpoint = serve_once("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope").await;
        let transport = HttpTransport::new(&endpoint, Duration::from_secs(5)).unwrap();

        let err = transport
            .upload(&file(), ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Transport(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_upload_cancelled() {
        let transport = HttpTransport::new("http://127.0.0.1:9/upload", Duration::from_secs(5)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport
            .upload(&file(), ProgressReporter::detached(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
    }
}
