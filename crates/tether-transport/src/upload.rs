// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attachment side channel.
//!
//! Attachments never travel over the session socket. Each one is POSTed as
//! multipart form data to the session's sibling `/upload` endpoint, which
//! answers with server-side reference ids that the prompt then carries.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::address::SessionAddress;

const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum UploadError {
	#[error("upload request failed: {0}")]
	Http(reqwest::Error),

	#[error("upload rejected with status {status}: {body}")]
	Status { status: u16, body: String },

	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid upload address: {0}")]
	InvalidAddress(String),
}

impl From<reqwest::Error> for UploadError {
	fn from(e: reqwest::Error) -> Self {
		// The URL carries the bearer token.
		Self::Http(e.without_url())
	}
}

/// One file to upload.
#[derive(Debug, Clone)]
pub struct Attachment {
	pub file_name: String,
	pub mime: Option<String>,
	pub bytes: Vec<u8>,
}

impl Attachment {
	pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
		Self {
			file_name: file_name.into(),
			mime: None,
			bytes,
		}
	}

	pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
		self.mime = Some(mime.into());
		self
	}

	pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
		let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let file_name = path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "attachment".to_string());
		Ok(Self::new(file_name, bytes))
	}
}

/// An attachment that did not make it to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
	pub file_name: String,
	pub error: String,
}

/// Outcome of uploading a batch. Successful refs are usable even when some
/// uploads failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
	pub refs: Vec<String>,
	pub failures: Vec<UploadFailure>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
	#[serde(default)]
	refs: Vec<String>,
}

pub struct AttachmentUploader {
	http: reqwest::Client,
	url: Url,
}

impl AttachmentUploader {
	pub fn new(address: &SessionAddress) -> Result<Self, UploadError> {
		Self::with_client(address, reqwest::Client::new())
	}

	pub fn with_client(address: &SessionAddress, http: reqwest::Client) -> Result<Self, UploadError> {
		let url = address
			.upload_url()
			.map_err(|e| UploadError::InvalidAddress(e.to_string()))?;
		Ok(Self { http, url })
	}

	/// Uploads one attachment and returns the server's reference ids for it.
	pub async fn upload(&self, attachment: &Attachment) -> Result<Vec<String>, UploadError> {
		let mut part = Part::bytes(attachment.bytes.clone()).file_name(attachment.file_name.clone());
		if let Some(mime) = &attachment.mime {
			part = part.mime_str(mime)?;
		}
		let form = Form::new().part(FILE_FIELD, part);

		debug!(
			file_name = %attachment.file_name,
			size = attachment.bytes.len(),
			"uploading attachment"
		);
		let response = self.http.post(self.url.clone()).multipart(form).send().await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(UploadError::Status {
				status: status.as_u16(),
				body,
			});
		}

		let parsed: UploadResponse = response.json().await?;
		Ok(parsed.refs)
	}

	/// Uploads every attachment in order. Failures are collected, not raised.
	pub async fn upload_all(&self, attachments: &[Attachment]) -> UploadReport {
		let mut report = UploadReport::default();
		for attachment in attachments {
			match self.upload(attachment).await {
				Ok(refs) => report.refs.extend(refs),
				Err(e) => {
					warn!(file_name = %attachment.file_name, error = %e, "attachment upload failed");
					report.failures.push(UploadFailure {
						file_name: attachment.file_name.clone(),
						error: e.to_string(),
					});
				}
			}
		}
		report
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	/// Serves one HTTP request with a canned response and returns the raw
	/// request text.
	async fn serve_once(listener: TcpListener, status_line: &'static str, body: &'static str) -> String {
		let (mut socket, _) = listener.accept().await.unwrap();
		let mut request = Vec::new();
		let mut buf = [0u8; 4096];
		loop {
			let n = socket.read(&mut buf).await.unwrap();
			if n == 0 {
				break;
			}
			request.extend_from_slice(&buf[..n]);
			let text = String::from_utf8_lossy(&request);
			if let Some(header_end) = text.find("\r\n\r\n") {
				let length = text[..header_end]
					.lines()
					.find_map(|line| {
						let (name, value) = line.split_once(':')?;
						name.eq_ignore_ascii_case("content-length")
							.then(|| value.trim().parse::<usize>().ok())
							.flatten()
					})
					.unwrap_or(0);
				if request.len() >= header_end + 4 + length {
					break;
				}
			}
		}
		let response = format!(
			"{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
			body.len()
		);
		socket.write_all(response.as_bytes()).await.unwrap();
		socket.shutdown().await.unwrap();
		String::from_utf8_lossy(&request).into_owned()
	}

	async fn local_address() -> (TcpListener, SessionAddress) {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		let address = SessionAddress::parse(&format!("ws://127.0.0.1:{port}/session?secret=abc")).unwrap();
		(listener, address)
	}

	#[tokio::test]
	async fn test_upload_posts_multipart_file() {
		let (listener, address) = local_address().await;
		let server = tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK", r#"{"refs":["att-1"]}"#));

		let uploader = AttachmentUploader::new(&address).unwrap();
		let refs = uploader
			.upload(&Attachment::new("shot.png", vec![1, 2, 3]).with_mime("image/png"))
			.await
			.unwrap();
		assert_eq!(refs, vec!["att-1".to_string()]);

		let request = server.await.unwrap();
		assert!(request.starts_with("POST /upload?secret=abc HTTP/1.1"));
		assert!(request.contains(r#"name="file""#));
		assert!(request.contains(r#"filename="shot.png""#));
		assert!(request.contains("multipart/form-data"));
	}

	#[tokio::test]
	async fn test_rejected_upload_reports_status() {
		let (listener, address) = local_address().await;
		let server = tokio::spawn(serve_once(listener, "HTTP/1.1 413 Payload Too Large", r#"{"error":"too big"}"#));

		let uploader = AttachmentUploader::new(&address).unwrap();
		let err = uploader.upload(&Attachment::new("big.bin", vec![0; 16])).await.unwrap_err();
		assert!(matches!(err, UploadError::Status { status: 413, .. }));
		server.await.unwrap();
	}

	/// Test: one failed upload does not discard the refs of the others.
	///
	/// Why this test is important: the prompt is still sent with whatever
	/// uploaded successfully, and the failure text is what the user sees, so
	/// it must never contain the bearer token from the address.
	#[tokio::test]
	async fn test_upload_all_collects_failures() {
		let (listener, address) = local_address().await;
		let server = tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK", r#"{"refs":["att-1"]}"#));

		let uploader = AttachmentUploader::new(&address).unwrap();
		let report = uploader
			.upload_all(&[Attachment::new("a.txt", b"a".to_vec()), Attachment::new("b.txt", b"b".to_vec())])
			.await;
		server.await.unwrap();

		assert_eq!(report.refs, vec!["att-1".to_string()]);
		assert_eq!(report.failures.len(), 1);
		assert_eq!(report.failures[0].file_name, "b.txt");
		assert!(!report.failures[0].error.contains("abc"));
	}

	#[tokio::test]
	async fn test_attachment_from_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("notes.md");
		tokio::fs::write(&path, "# notes").await.unwrap();

		let attachment = Attachment::from_path(&path).await.unwrap();
		assert_eq!(attachment.file_name, "notes.md");
		assert_eq!(attachment.bytes, b"# notes");

		let missing = Attachment::from_path(&dir.path().join("nope")).await;
		assert!(matches!(missing, Err(UploadError::Io { .. })));
	}
}
