//! Chunk upload API client.
//!
//! Async HTTP client using `reqwest` with optional Bearer token authentication.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use sice_protocol::constants::fields;
use sice_protocol::{CHUNK_UPLOAD_PATH, ChunkResponse, DEFAULT_CHUNK_TIMEOUT, GENERIC_MIME_TYPE};
use tracing::debug;

use crate::error::TransportError;
use crate::transport::{ChunkRequest, ChunkTransport, CleanupClient, TransportFuture};

/// Chunk upload API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    chunk_timeout: Duration,
}

impl Client {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// When `auth_token` is set, every request carries it as a Bearer token.
    pub fn new(base_url: &str, auth_token: Option<&str>) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| TransportError::InvalidToken)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
        })
    }

    /// Sets the time allowed for each chunk request.
    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn chunk_timeout(&self) -> Duration {
        self.chunk_timeout
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one chunk as `multipart/form-data`.
    ///
    /// The whole exchange (connect, upload, response body) must finish within
    /// the chunk timeout.
    pub async fn upload_chunk(&self, request: ChunkRequest) -> Result<ChunkResponse, TransportError> {
        let url = format!("{}{}", self.base_url, CHUNK_UPLOAD_PATH);
        let upload_id = request.upload_id.clone();
        let chunk_index = request.chunk_index;
        let form = build_form(request)?;

        let exchange = async {
            let resp = self.http.post(&url).multipart(form).send().await?;
            let status = resp.status();
            let body = resp.bytes().await?;

            if !status.is_success() {
                return Err(TransportError::from_response(status, &body));
            }
            Ok(serde_json::from_slice::<ChunkResponse>(&body)?)
        };

        match tokio::time::timeout(self.chunk_timeout, exchange).await {
            Ok(result) => {
                if let Ok(resp) = &result {
                    debug!(
                        upload_id = %upload_id,
                        chunk = chunk_index,
                        completed = resp.completed,
                        received = ?resp.received,
                        "chunk acknowledged"
                    );
                }
                result
            }
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Asks the server to discard the chunks stored under `upload_id`.
    pub async fn cancel_upload(&self, upload_id: &str) -> Result<(), TransportError> {
        let encoded = utf8_percent_encode(upload_id, NON_ALPHANUMERIC).to_string();
        let url = format!("{}{}/{}", self.base_url, CHUNK_UPLOAD_PATH, encoded);
        let resp = self.http.delete(&url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            return Err(TransportError::from_response(status, &body));
        }
        Ok(())
    }
}

impl ChunkTransport for Client {
    fn send_chunk(&self, request: ChunkRequest) -> TransportFuture<'_, ChunkResponse> {
        Box::pin(self.upload_chunk(request))
    }
}

impl CleanupClient for Client {
    fn cancel_upload<'a>(&'a self, upload_id: &'a str) -> TransportFuture<'a, ()> {
        Box::pin(Client::cancel_upload(self, upload_id))
    }
}

/// Builds the multipart body of a chunk request.
fn build_form(request: ChunkRequest) -> Result<Form, TransportError> {
    let part = Part::bytes(request.data)
        .file_name(request.file_name.clone())
        .mime_str(GENERIC_MIME_TYPE)?;

    Ok(Form::new()
        .part(fields::CHUNK, part)
        .text(fields::CHUNK_INDEX, request.chunk_index.to_string())
        .text(fields::TOTAL_CHUNKS, request.total_chunks.to_string())
        .text(fields::FILE_NAME, request.file_name)
        .text(fields::UPLOAD_ID, request.upload_id)
        .text(fields::FILE_TYPE, request.file_kind.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sice_protocol::FileKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Reads one full HTTP request (headers and body).
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 8192];

        let header_end = loop {
            let n = stream.read(&mut tmp).await.unwrap_or(0);
            if n == 0 {
                return String::from_utf8_lossy(&buf).into_owned();
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        let chunked = headers.contains("transfer-encoding: chunked");

        loop {
            let done = match content_length {
                Some(len) => buf.len() >= header_end + len,
                None if chunked => buf.ends_with(b"0\r\n\r\n"),
                None => true,
            };
            if done {
                break;
            }
            let n = stream.read(&mut tmp).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Starts a mock HTTP server answering each connection with the next
    /// `(status, body)` pair. Received requests are forwarded on the channel.
    async fn mock_server(
        responses: Vec<(u16, &str)>,
    ) -> (String, mpsc::UnboundedReceiver<String>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api");
        let responses: Vec<(u16, String)> =
            responses.into_iter().map(|(s, b)| (s, b.to_string())).collect();
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                let _ = tx.send(request);

                let resp = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, rx, handle)
    }

    /// Starts a server that accepts a connection and never answers.
    async fn silent_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = read_request(&mut stream).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });
        (format!("http://127.0.0.1:{port}/api"), handle)
    }

    fn chunk_request(index: u32, total: u32, data: &[u8]) -> ChunkRequest {
        ChunkRequest {
            upload_id: "6f1c2a1e-0000-4000-8000-000000000001".into(),
            chunk_index: index,
            total_chunks: total,
            file_name: "invoice.pdf".into(),
            file_kind: FileKind::Invoice,
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn upload_chunk_sends_multipart_fields() {
        let (url, mut requests, handle) =
            mock_server(vec![(200, r#"{"completed":false,"received":1,"total":2}"#)]).await;

        let client = Client::new(&url, Some("secret-token")).unwrap();
        let resp = client
            .upload_chunk(chunk_request(0, 2, b"CHUNKDATA"))
            .await
            .unwrap();
        assert!(!resp.completed);
        assert_eq!(resp.received, Some(1));

        let raw = requests.recv().await.unwrap();
        assert!(raw.starts_with("POST /api/upload/chunk "), "{raw}");
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer secret-token"));
        assert!(raw.contains("multipart/form-data; boundary="));
        assert!(raw.contains("name=\"chunkIndex\"\r\n\r\n0\r\n"));
        assert!(raw.contains("name=\"totalChunks\"\r\n\r\n2\r\n"));
        assert!(raw.contains("name=\"fileName\"\r\n\r\ninvoice.pdf\r\n"));
        assert!(raw.contains("name=\"uploadId\"\r\n\r\n6f1c2a1e-0000-4000-8000-000000000001\r\n"));
        assert!(raw.contains("name=\"fileType\"\r\n\r\ninvoice\r\n"));
        assert!(raw.contains("name=\"chunk\"; filename=\"invoice.pdf\""));
        assert!(raw.contains("CHUNKDATA"));

        handle.abort();
    }

    #[tokio::test]
    async fn no_token_no_auth_header() {
        let (url, mut requests, handle) = mock_server(vec![(200, r#"{"completed":false}"#)]).await;

        let client = Client::new(&url, None).unwrap();
        client.upload_chunk(chunk_request(0, 2, b"x")).await.unwrap();

        let raw = requests.recv().await.unwrap();
        assert!(!raw.to_ascii_lowercase().contains("authorization:"));

        handle.abort();
    }

    #[tokio::test]
    async fn final_chunk_returns_temp_path() {
        let (url, _requests, handle) = mock_server(vec![(
            200,
            r#"{"completed":true,"tempPath":"temp/invoice/abc.pdf","message":"Upload complete"}"#,
        )])
        .await;

        let client = Client::new(&url, None).unwrap();
        let resp = client.upload_chunk(chunk_request(1, 2, b"tail")).await.unwrap();
        assert!(resp.completed);
        assert_eq!(resp.temp_path.as_deref(), Some("temp/invoice/abc.pdf"));

        handle.abort();
    }

    #[tokio::test]
    async fn server_error_carries_message() {
        let (url, _requests, handle) =
            mock_server(vec![(422, r#"{"message":"Invalid chunk index"}"#)]).await;

        let client = Client::new(&url, None).unwrap();
        let err = client
            .upload_chunk(chunk_request(0, 1, b"x"))
            .await
            .unwrap_err();
        match err {
            TransportError::Server { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid chunk index");
            }
            other => panic!("expected server error, got {other:?}"),
        }

        handle.abort();
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let (url, _requests, handle) = mock_server(vec![(200, "not json")]).await;

        let client = Client::new(&url, None).unwrap();
        let err = client
            .upload_chunk(chunk_request(0, 1, b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));

        handle.abort();
    }

    #[tokio::test]
    async fn slow_chunk_times_out() {
        let (url, handle) = silent_server().await;

        let client = Client::new(&url, None)
            .unwrap()
            .with_chunk_timeout(Duration::from_millis(200));
        let err = client
            .upload_chunk(chunk_request(0, 1, b"x"))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");

        handle.abort();
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = Client::new(&format!("http://127.0.0.1:{port}/api"), None).unwrap();
        let err = client
            .upload_chunk(chunk_request(0, 1, b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Network(_)), "{err:?}");
        assert_eq!(
            err.to_string(),
            "connection error, check your network connection"
        );
    }

    #[tokio::test]
    async fn cancel_upload_sends_delete() {
        let (url, mut requests, handle) = mock_server(vec![(200, r#"{"message":"ok"}"#)]).await;

        let client = Client::new(&format!("{url}/"), Some("t")).unwrap();
        client.cancel_upload("abc-123").await.unwrap();

        let raw = requests.recv().await.unwrap();
        assert!(raw.starts_with("DELETE /api/upload/chunk/abc%2D123 "), "{raw}");

        handle.abort();
    }

    #[tokio::test]
    async fn cancel_upload_error_status() {
        let (url, _requests, handle) = mock_server(vec![(404, "{}")]).await;

        let client = Client::new(&url, None).unwrap();
        let err = client.cancel_upload("gone").await.unwrap_err();
        assert_eq!(err.to_string(), "server error: 404 Not Found");

        handle.abort();
    }

    #[test]
    fn invalid_token_rejected() {
        let result = Client::new("http://localhost/api", Some("bad\ntoken"));
        assert!(matches!(result, Err(TransportError::InvalidToken)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = Client::new("http://localhost:8000/api/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.chunk_timeout(), DEFAULT_CHUNK_TIMEOUT);
    }
}
