use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::extract::Multipart;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::MediaConfig, error::AppError};

/// External host for user media. Takes a local file and answers with its public URL.
#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, local_path: &Path) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct S3MediaHost {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3MediaHost {
    pub async fn new(cfg: &MediaConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaHost for S3MediaHost {
    async fn upload(&self, local_path: &Path) -> anyhow::Result<String> {
        let ext = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let content_type = ext
            .as_deref()
            .and_then(mime_from_ext)
            .unwrap_or("application/octet-stream");
        let key = match ext.as_deref() {
            Some(ext) => format!("media/{}.{}", Uuid::new_v4(), ext),
            None => format!("media/{}", Uuid::new_v4()),
        };

        let body = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("read {}", local_path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;

        let url = format!("{}/{}", self.public_url, key);
        info!(%url, "media uploaded");
        Ok(url)
    }
}

fn mime_from_ext(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Uploads a spooled file and removes it locally whatever the outcome.
pub async fn upload_temp_file(media: &dyn MediaHost, file: NamedTempFile) -> anyhow::Result<String> {
    let result = media.upload(file.path()).await;
    if let Err(e) = file.close() {
        warn!(error = %e, "failed to remove temp upload");
    }
    let url = result?;
    anyhow::ensure!(!url.is_empty(), "media host returned no url");
    Ok(url)
}

/// Writes an uploaded file to `dir`, keeping the client's extension so the host can type it.
pub async fn spool_upload(
    dir: &Path,
    file_name: Option<&str>,
    body: Bytes,
) -> anyhow::Result<NamedTempFile> {
    let suffix = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || -> anyhow::Result<NamedTempFile> {
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .context("create temp upload")?;
        file.write_all(&body).context("write temp upload")?;
        file.flush()?;
        Ok(file)
    })
    .await?
}

/// Text fields plus at most one spooled file per field name.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, NamedTempFile>,
}

impl MultipartForm {
    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn take_file(&mut self, name: &str) -> Option<NamedTempFile> {
        self.files.remove(name)
    }
}

/// Drains a multipart body. Parts carrying a filename are spooled to `upload_dir`.
pub async fn read_multipart(
    upload_dir: &Path,
    mut mp: Multipart,
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("invalid file part: {e}")))?;
                if data.is_empty() || form.files.contains_key(&name) {
                    continue;
                }
                let file = spool_upload(upload_dir, Some(&file_name), data).await?;
                form.files.insert(name, file);
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("invalid form field: {e}")))?;
                form.fields.insert(name, text);
            }
        }
    }
    Ok(form)
}
