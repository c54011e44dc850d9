//! Upload extraction: multipart files -> plain assignment text.
//!
//! Text files are read directly; PDFs and images go through the vision model.
//! Files are extracted concurrently and joined in upload order.

use axum::extract::Multipart;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::completion::{Attachment, CompletionError, CompletionRequest, CompletionService};
use crate::config::Prompts;

#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("no file provided")]
  NoFile,
  #[error("unsupported file type: {0}")]
  Unsupported(String),
  #[error("file '{0}' is not valid UTF-8 text")]
  InvalidUtf8(String),
  #[error("malformed upload: {0}")]
  Multipart(String),
  #[error("extracting '{file}' failed: {source}")]
  Upstream {
    file: String,
    #[source]
    source: CompletionError,
  },
}

#[derive(Clone, Debug)]
pub struct UploadedFile {
  pub filename: String,
  pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
  Text,
  Pdf,
  Image { mime: &'static str },
}

impl FileKind {
  pub fn from_filename(name: &str) -> Option<Self> {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_lowercase())?;
    Some(match ext.as_str() {
      "txt" | "md" => FileKind::Text,
      "pdf" => FileKind::Pdf,
      "png" => FileKind::Image { mime: "image/png" },
      "jpg" | "jpeg" => FileKind::Image { mime: "image/jpeg" },
      "gif" => FileKind::Image { mime: "image/gif" },
      "webp" => FileKind::Image { mime: "image/webp" },
      _ => return None,
    })
  }
}

/// Drain every file field of the request, in order. Non-file fields are skipped.
pub async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, ExtractError> {
  let mut files = Vec::new();
  while let Some(field) = multipart.next_field().await.map_err(|e| ExtractError::Multipart(e.body_text()))? {
    let Some(filename) = field.file_name().map(str::to_string) else {
      continue;
    };
    let bytes = field.bytes().await.map_err(|e| ExtractError::Multipart(e.body_text()))?;
    debug!(target: "clarity_coach", %filename, size = bytes.len(), "Upload field received");
    files.push(UploadedFile { filename, bytes: bytes.to_vec() });
  }
  Ok(files)
}

/// Extract all files and join them with a blank line. Any single failure fails
/// the whole upload.
#[instrument(level = "info", skip_all, fields(files = files.len()))]
pub async fn extract_text(
  service: &dyn CompletionService,
  prompts: &Prompts,
  files: &[UploadedFile],
) -> Result<String, ExtractError> {
  if files.is_empty() {
    return Err(ExtractError::NoFile);
  }
  // Reject unsupported types before spending any upstream calls.
  let kinds = files
    .iter()
    .map(|f| FileKind::from_filename(&f.filename).ok_or_else(|| ExtractError::Unsupported(f.filename.clone())))
    .collect::<Result<Vec<_>, _>>()?;

  let pages = join_all(files.iter().zip(kinds).map(|(f, kind)| extract_one(service, prompts, f, kind))).await;
  let pages = pages.into_iter().collect::<Result<Vec<_>, _>>()?;

  let text = pages.join("\n\n");
  info!(target: "clarity_coach", chars = text.chars().count(), "Upload text extracted");
  Ok(text)
}

async fn extract_one(
  service: &dyn CompletionService,
  prompts: &Prompts,
  file: &UploadedFile,
  kind: FileKind,
) -> Result<String, ExtractError> {
  let req = match kind {
    FileKind::Text => {
      return String::from_utf8(file.bytes.clone()).map_err(|_| ExtractError::InvalidUtf8(file.filename.clone()));
    }
    FileKind::Pdf => CompletionRequest::vision(
      prompts.extract_pdf_instruction.clone(),
      Attachment::Pdf { filename: file.filename.clone(), base64: B64.encode(&file.bytes) },
    ),
    FileKind::Image { mime } => CompletionRequest::vision(
      prompts.extract_image_instruction.clone(),
      Attachment::Image { mime: mime.to_string(), base64: B64.encode(&file.bytes) },
    ),
  };
  service.complete(req).await.map_err(|source| ExtractError::Upstream { file: file.filename.clone(), source })
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::time::Duration;

  /// Echoes the attachment kind; the first image answers slowest so completion
  /// order differs from upload order.
  struct SlowVision;

  #[async_trait]
  impl CompletionService for SlowVision {
    async fn complete(&self, req: CompletionRequest) -> Result<String, CompletionError> {
      match req.attachments.first() {
        Some(Attachment::Image { base64, .. }) if base64 == &B64.encode(b"fail") => {
          Err(CompletionError::Http { status: 400, message: "bad image".into() })
        }
        Some(Attachment::Image { base64, .. }) => {
          if base64 == &B64.encode(b"first") {
            tokio::time::sleep(Duration::from_millis(50)).await;
          }
          Ok(format!("image:{}", base64))
        }
        Some(Attachment::Pdf { filename, .. }) => Ok(format!("pdf:{}", filename)),
        None => Ok(String::new()),
      }
    }

    fn describe(&self) -> String {
      "slow-vision".into()
    }
  }

  fn file(name: &str, bytes: &[u8]) -> UploadedFile {
    UploadedFile { filename: name.into(), bytes: bytes.to_vec() }
  }

  #[test]
  fn kinds_by_extension() {
    assert_eq!(FileKind::from_filename("Blatt1.PDF"), Some(FileKind::Pdf));
    assert_eq!(FileKind::from_filename("a.jpeg"), Some(FileKind::Image { mime: "image/jpeg" }));
    assert_eq!(FileKind::from_filename("notes.md"), Some(FileKind::Text));
    assert_eq!(FileKind::from_filename("sheet.docx"), None);
    assert_eq!(FileKind::from_filename("README"), None);
  }

  #[tokio::test]
  async fn pages_keep_upload_order() {
    let files = [file("p1.png", b"first"), file("p2.txt", "Aufgabe 2: x² = 4".as_bytes()), file("p3.pdf", b"%PDF")];
    let text = extract_text(&SlowVision, &Prompts::default(), &files).await.unwrap();
    assert_eq!(text, format!("image:{}\n\nAufgabe 2: x² = 4\n\npdf:p3.pdf", B64.encode(b"first")));
  }

  #[tokio::test]
  async fn one_failing_page_fails_the_upload() {
    let files = [file("ok.png", b"ok"), file("bad.png", b"fail")];
    let err = extract_text(&SlowVision, &Prompts::default(), &files).await.unwrap_err();
    assert!(matches!(err, ExtractError::Upstream { ref file, .. } if file == "bad.png"));
  }

  #[tokio::test]
  async fn rejections() {
    let p = Prompts::default();
    assert!(matches!(extract_text(&SlowVision, &p, &[]).await, Err(ExtractError::NoFile)));
    assert!(matches!(
      extract_text(&SlowVision, &p, &[file("x.exe", b"MZ")]).await,
      Err(ExtractError::Unsupported(_))
    ));
    assert!(matches!(
      extract_text(&SlowVision, &p, &[file("x.txt", &[0xff, 0xfe])]).await,
      Err(ExtractError::InvalidUtf8(_))
    ));
  }
}
