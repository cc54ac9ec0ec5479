// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote compression backend — delegates compression to an HTTP service.
//
// Protocol, one request per phase:
//   POST {base}/auth                      {"public_key"}  -> {"token"}
//   GET  {base}/start/compress            bearer          -> {"server", "task"}
//   POST {server}/v1/upload               multipart       -> {"server_filename"}
//   POST {server}/v1/process              json            -> acknowledgement
//   GET  {server}/v1/download/{task}      bearer          -> PDF bytes
//
// Any phase failure aborts the whole call and nothing partial is returned.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sizefit_core::config::RemoteSettings;
use sizefit_core::error::{Result, SizefitError};
use sizefit_core::types::RemotePhase;
use sizefit_core::CompressionProfile;
use tracing::{debug, error, info, instrument};

use crate::backend::{CompressedDocument, CompressionBackend};
use crate::retry::{RetryConfig, with_retry};

const UPLOAD_FILENAME: &str = "source.pdf";

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    public_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    server: String,
    task: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    server_filename: String,
}

#[derive(Debug, Serialize)]
struct ProcessFile<'a> {
    server_filename: &'a str,
    filename: &'a str,
}

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    task: &'a str,
    tool: &'a str,
    files: Vec<ProcessFile<'a>>,
    quality: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    dpi: Option<u32>,
}

/// A started task: where to send the file and under which identifier.
#[derive(Debug, Clone)]
struct RemoteTask {
    server_url: String,
    task: String,
}

/// HTTP client for the remote compression service.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    settings: RemoteSettings,
    retry: RetryConfig,
}

impl RemoteBackend {
    pub fn new(settings: RemoteSettings) -> Result<Self> {
        settings.validate()?;
        let client = Client::builder()
            .build()
            .map_err(|err| SizefitError::Configuration(format!("HTTP client: {err}")))?;
        let retry = RetryConfig::from(&settings.retry);
        Ok(Self {
            client,
            settings,
            retry,
        })
    }

    fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    async fn authenticate(&self) -> Result<String> {
        let phase = RemotePhase::Authenticate;
        let url = format!("{}/auth", self.base_url());
        let request = self
            .client
            .post(&url)
            .timeout(self.settings.short_timeout())
            .json(&AuthRequest {
                public_key: &self.settings.credential,
            });
        let reply: AuthResponse = decode_json(phase, send(phase, request).await?).await?;
        Ok(reply.token)
    }

    async fn start(&self, token: &str) -> Result<RemoteTask> {
        let phase = RemotePhase::Start;
        let url = format!("{}/start/compress", self.base_url());
        let request = self
            .client
            .get(&url)
            .timeout(self.settings.short_timeout())
            .bearer_auth(token);
        let reply: StartResponse = decode_json(phase, send(phase, request).await?).await?;
        Ok(RemoteTask {
            server_url: server_url(&reply.server),
            task: reply.task,
        })
    }

    async fn upload(&self, token: &str, task: &RemoteTask, source: &[u8]) -> Result<String> {
        let phase = RemotePhase::Upload;
        let part = Part::bytes(source.to_vec())
            .file_name(UPLOAD_FILENAME)
            .mime_str("application/pdf")
            .map_err(|err| SizefitError::backend(phase, format!("invalid upload: {err}")))?;
        let form = Form::new().text("task", task.task.clone()).part("file", part);
        let request = self
            .client
            .post(format!("{}/v1/upload", task.server_url))
            .timeout(self.settings.long_timeout())
            .bearer_auth(token)
            .multipart(form);
        let reply: UploadResponse = decode_json(phase, send(phase, request).await?).await?;
        Ok(reply.server_filename)
    }

    async fn process(
        &self,
        token: &str,
        task: &RemoteTask,
        server_filename: &str,
        profile: &CompressionProfile,
    ) -> Result<()> {
        let phase = RemotePhase::Process;
        let body = ProcessRequest {
            task: &task.task,
            tool: "compress",
            files: vec![ProcessFile {
                server_filename,
                filename: UPLOAD_FILENAME,
            }],
            quality: profile.quality,
            dpi: profile.target_dpi,
        };
        let request = self
            .client
            .post(format!("{}/v1/process", task.server_url))
            .timeout(self.settings.long_timeout())
            .bearer_auth(token)
            .json(&body);
        send(phase, request).await?;
        Ok(())
    }

    async fn download(&self, token: &str, task: &RemoteTask) -> Result<Vec<u8>> {
        let phase = RemotePhase::Download;
        let request = self
            .client
            .get(format!("{}/v1/download/{}", task.server_url, task.task))
            .timeout(self.settings.long_timeout())
            .bearer_auth(token);
        let bytes = send(phase, request)
            .await?
            .bytes()
            .await
            .map_err(|err| transport_error(phase, &err))?;
        if bytes.is_empty() {
            return Err(SizefitError::backend(phase, "invalid response: empty document"));
        }
        Ok(bytes.to_vec())
    }

    /// Run the full protocol. The task is created once; later phases retry
    /// against that same task.
    async fn run(&self, source: &[u8], profile: &CompressionProfile) -> Result<Vec<u8>> {
        let token = with_retry(RemotePhase::Authenticate, &self.retry, || self.authenticate()).await?;
        let task = with_retry(RemotePhase::Start, &self.retry, || self.start(&token)).await?;
        debug!(task = %task.task, server = %task.server_url, "Remote task started");

        let server_filename = with_retry(RemotePhase::Upload, &self.retry, || {
            self.upload(&token, &task, source)
        })
        .await?;
        with_retry(RemotePhase::Process, &self.retry, || {
            self.process(&token, &task, &server_filename, profile)
        })
        .await?;
        with_retry(RemotePhase::Download, &self.retry, || self.download(&token, &task)).await
    }
}

impl CompressionBackend for RemoteBackend {
    #[instrument(skip_all, fields(source_bytes = source.len()))]
    async fn compress(
        &self,
        source: &[u8],
        profile: &CompressionProfile,
    ) -> Result<CompressedDocument> {
        match self.run(source, profile).await {
            Ok(bytes) => {
                info!(output_bytes = bytes.len(), "Remote compression finished");
                Ok(CompressedDocument {
                    bytes,
                    warnings: Vec::new(),
                })
            }
            Err(err) => {
                error!(error = %err, "Remote compression failed");
                Err(err)
            }
        }
    }
}

/// Servers may be returned as bare host names.
fn server_url(server: &str) -> String {
    let trimmed = server.trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

async fn send(phase: RemotePhase, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|err| transport_error(phase, &err))?;
    check_api_response(phase, response)
}

/// Translate non-success HTTP statuses into a phase-tagged backend error.
fn check_api_response(phase: RemotePhase, response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
        status => Err(SizefitError::backend(phase, format!("HTTP {status}"))),
    }
}

async fn decode_json<T: DeserializeOwned>(phase: RemotePhase, response: Response) -> Result<T> {
    response.json::<T>().await.map_err(|err| {
        if err.is_decode() {
            SizefitError::backend(phase, format!("invalid response: {err}"))
        } else {
            transport_error(phase, &err)
        }
    })
}

fn transport_error(phase: RemotePhase, err: &reqwest::Error) -> SizefitError {
    let detail = if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    };
    SizefitError::backend(phase, detail)
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use sizefit_core::config::RetrySettings;

    use super::*;

    const TOKEN: &str = "test-token";
    const TASK: &str = "task-1";

    fn backend(server: &ServerGuard, max_retries: u32) -> RemoteBackend {
        let mut settings = RemoteSettings::new(server.url(), "public-key");
        settings.retry = RetrySettings {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        RemoteBackend::new(settings).unwrap()
    }

    async fn mock_auth(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/auth")
            .match_body(Matcher::Json(serde_json::json!({ "public_key": "public-key" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"token": "{TOKEN}"}}"#))
            .create_async()
            .await
    }

    async fn mock_start(server: &mut ServerGuard) -> Mock {
        let body = format!(r#"{{"server": "{}", "task": "{TASK}"}}"#, server.url());
        server
            .mock("GET", "/start/compress")
            .match_header("authorization", format!("Bearer {TOKEN}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    async fn mock_upload(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/v1/upload")
            .match_header("authorization", format!("Bearer {TOKEN}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"server_filename": "stored-abc.pdf"}"#)
            .create_async()
            .await
    }

    async fn mock_process(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/v1/process")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "task": TASK,
                "tool": "compress",
                "files": [{ "server_filename": "stored-abc.pdf", "filename": UPLOAD_FILENAME }],
            })))
            .with_status(200)
            .with_body(r#"{"status": "TaskSuccess"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn full_protocol_returns_downloaded_bytes() {
        let mut server = Server::new_async().await;
        let auth = mock_auth(&mut server).await;
        let start = mock_start(&mut server).await;
        let upload = mock_upload(&mut server).await;
        let process = mock_process(&mut server).await;
        let download = server
            .mock("GET", format!("/v1/download/{TASK}").as_str())
            .match_header("authorization", format!("Bearer {TOKEN}").as_str())
            .with_status(200)
            .with_body(b"%PDF-1.5 compressed")
            .create_async()
            .await;

        let output = backend(&server, 0)
            .compress(b"%PDF-1.7 source", &CompressionProfile::default())
            .await
            .unwrap();

        assert_eq!(output.bytes, b"%PDF-1.5 compressed");
        assert!(output.warnings.is_empty());
        for mock in [auth, start, upload, process, download] {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn rejected_credential_stops_before_task_creation() {
        let mut server = Server::new_async().await;
        let auth = server
            .mock("POST", "/auth")
            .with_status(401)
            .create_async()
            .await;
        let start = server
            .mock("GET", "/start/compress")
            .expect(0)
            .create_async()
            .await;

        let err = backend(&server, 3)
            .compress(b"%PDF", &CompressionProfile::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SizefitError::Backend {
                phase: RemotePhase::Authenticate,
                ..
            }
        ));
        auth.assert_async().await;
        start.assert_async().await;
    }

    #[tokio::test]
    async fn failed_task_creation_is_not_repeated() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let start = server
            .mock("GET", "/start/compress")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let err = backend(&server, 4)
            .compress(b"%PDF", &CompressionProfile::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SizefitError::Backend {
                phase: RemotePhase::Start,
                ..
            }
        ));
        start.assert_async().await;
    }

    #[tokio::test]
    async fn transient_download_failures_retry_on_the_same_task() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let start = mock_start(&mut server).await;
        let _upload = mock_upload(&mut server).await;
        let _process = mock_process(&mut server).await;
        let download = server
            .mock("GET", format!("/v1/download/{TASK}").as_str())
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = backend(&server, 2)
            .compress(b"%PDF", &CompressionProfile::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SizefitError::Backend {
                phase: RemotePhase::Download,
                ..
            }
        ));
        // One task, three download attempts.
        start.assert_async().await;
        download.assert_async().await;
    }

    #[tokio::test]
    async fn processing_failure_skips_download() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _start = mock_start(&mut server).await;
        let _upload = mock_upload(&mut server).await;
        let process = server
            .mock("POST", "/v1/process")
            .with_status(400)
            .expect(1)
            .create_async()
            .await;
        let download = server
            .mock("GET", format!("/v1/download/{TASK}").as_str())
            .expect(0)
            .create_async()
            .await;

        let err = backend(&server, 2)
            .compress(b"%PDF", &CompressionProfile::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SizefitError::Backend {
                phase: RemotePhase::Process,
                ..
            }
        ));
        process.assert_async().await;
        download.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_start_reply_is_a_backend_error() {
        let mut server = Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _start = server
            .mock("GET", "/start/compress")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let err = backend(&server, 0)
            .compress(b"%PDF", &CompressionProfile::default())
            .await
            .unwrap_err();

        match err {
            SizefitError::Backend { phase, detail } => {
                assert_eq!(phase, RemotePhase::Start);
                assert!(detail.starts_with("invalid response"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bare_server_names_get_https() {
        assert_eq!(server_url("api11.example.test"), "https://api11.example.test");
        assert_eq!(server_url("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
    }
}
