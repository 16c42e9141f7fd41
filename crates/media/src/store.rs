use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::{Context, Result, bail},
    secrecy::ExposeSecret,
    tracing::{debug, warn},
};

use {
    parley_common::{ChannelType, MediaCache, MediaDownloadJob},
    parley_tenants::CredentialProvider,
};

/// Disk-backed media cache keyed by
/// `{uploads}/{tenant}/{channel}/{type}/{id}.{ext}`.
pub struct MediaStore {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    uploads_dir: PathBuf,
    graph_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl MediaStore {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        graph_base: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                uploads_dir: uploads_dir.into(),
                graph_base: graph_base.into(),
                credentials,
            }),
        }
    }

    /// Download the job's media to the cache, returning the file path.
    /// Cache hits skip the network entirely.
    pub async fn fetch(&self, job: &MediaDownloadJob) -> Result<PathBuf> {
        self.inner.fetch(job).await
    }
}

impl MediaCache for MediaStore {
    fn schedule(&self, job: MediaDownloadJob) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.fetch(&job).await {
                Ok(path) => debug!(path = %path.display(), "media cached"),
                Err(e) => warn!(
                    tenant_id = %job.tenant_id,
                    channel = %job.channel,
                    error = %e,
                    "media download failed"
                ),
            }
        });
    }
}

impl Inner {
    async fn fetch(&self, job: &MediaDownloadJob) -> Result<PathBuf> {
        match job.channel {
            ChannelType::WhatsApp => self.fetch_whatsapp(job).await,
            ChannelType::Instagram => self.fetch_instagram(job).await,
        }
    }

    /// WhatsApp: exchange the media id for a signed URL via the Cloud API,
    /// then download with the same bearer token.
    async fn fetch_whatsapp(&self, job: &MediaDownloadJob) -> Result<PathBuf> {
        let media_id = job
            .media
            .whatsapp_media_id
            .as_deref()
            .context("whatsapp media without media id")?;

        let dir = self.media_dir(job);
        if let Some(cached) = find_cached(&dir, media_id) {
            debug!(path = %cached.display(), "media cache hit");
            return Ok(cached);
        }

        let creds = self
            .credentials
            .whatsapp_credentials(&job.tenant_id)
            .await?
            .context("tenant has no whatsapp credentials")?;
        let token = creds.access_token.expose_secret().clone();

        let meta_url = format!("{}/{media_id}", self.graph_base);
        let resp = self.http.get(meta_url).bearer_auth(&token).send().await?;
        if !resp.status().is_success() {
            bail!("media metadata fetch failed: {}", resp.status());
        }
        let meta: serde_json::Value = resp.json().await?;
        let url = meta
            .get("url")
            .and_then(|v| v.as_str())
            .context("media metadata without url")?;
        let mime = meta
            .get("mime_type")
            .and_then(|v| v.as_str())
            .or(job.media.mime_type.as_deref())
            .unwrap_or("application/octet-stream");

        self.download_to(&dir, media_id, url, mime, Some(&token))
            .await
    }

    /// Instagram: the webhook already carries a CDN URL; no auth needed.
    async fn fetch_instagram(&self, job: &MediaDownloadJob) -> Result<PathBuf> {
        let url = job.media.url.as_deref().context("instagram media without url")?;
        // No separate media id exists; key the cache on the URL digest-ish
        // tail to keep filenames stable across redeliveries.
        let media_id = url
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .split('?')
            .next()
            .unwrap_or(url);

        let dir = self.media_dir(job);
        if let Some(cached) = find_cached(&dir, media_id) {
            debug!(path = %cached.display(), "media cache hit");
            return Ok(cached);
        }

        let mime = job.media.mime_type.as_deref().unwrap_or("application/octet-stream");
        self.download_to(&dir, media_id, url, mime, None).await
    }

    async fn download_to(
        &self,
        dir: &Path,
        media_id: &str,
        url: &str,
        mime: &str,
        bearer: Option<&str>,
    ) -> Result<PathBuf> {
        let mut request = self.http.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            bail!("media download failed: {}", resp.status());
        }
        let bytes = resp.bytes().await?;

        tokio::fs::create_dir_all(dir)
            .await
            .context("failed to create media directory")?;
        let path = dir.join(format!("{}.{}", sanitize(media_id), mime_extension(mime)));
        tokio::fs::write(&path, &bytes)
            .await
            .context("failed to write media file")?;
        Ok(path)
    }

    fn media_dir(&self, job: &MediaDownloadJob) -> PathBuf {
        self.uploads_dir
            .join(&job.tenant_id)
            .join(job.channel.slug())
            .join(job.media_type.as_str().to_lowercase())
    }
}

/// Scan the directory for a file whose stem matches the media id.
fn find_cached(dir: &Path, media_id: &str) -> Option<PathBuf> {
    let stem = sanitize(media_id);
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s == stem)
        {
            return Some(path);
        }
    }
    None
}

/// Keep media ids filesystem-safe.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn mime_extension(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpeg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        parley_common::{MessageMedia, MessageType},
        parley_tenants::{CredentialCipher, SqliteTenantStore},
        sqlx::SqlitePool,
    };

    use super::*;

    async fn empty_credentials() -> Arc<dyn CredentialProvider> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteTenantStore::init(&pool).await.unwrap();
        Arc::new(SqliteTenantStore::new(pool, CredentialCipher::new([1u8; 32])))
    }

    fn instagram_job(url: &str) -> MediaDownloadJob {
        MediaDownloadJob {
            tenant_id: "t1".into(),
            channel: ChannelType::Instagram,
            media_type: MessageType::Image,
            media: MessageMedia {
                url: Some(url.into()),
                mime_type: Some("image/jpeg".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn instagram_download_writes_cache_layout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/media/photo.jpg")
            .with_status(200)
            .with_body(b"jpeg-bytes".as_slice())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), "http://unused", empty_credentials().await);

        let url = format!("{}/media/photo.jpg", server.url());
        let path = store.fetch(&instagram_job(&url)).await.unwrap();

        assert!(path.starts_with(dir.path().join("t1").join("instagram").join("image")));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn second_fetch_hits_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/media/photo.jpg")
            .with_status(200)
            .with_body(b"jpeg-bytes".as_slice())
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), "http://unused", empty_credentials().await);
        let url = format!("{}/media/photo.jpg", server.url());

        let first = store.fetch(&instagram_job(&url)).await.unwrap();
        let second = store.fetch(&instagram_job(&url)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn whatsapp_job_without_media_id_fails_locally() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), "http://unused", empty_credentials().await);

        let job = MediaDownloadJob {
            tenant_id: "t1".into(),
            channel: ChannelType::WhatsApp,
            media_type: MessageType::Image,
            media: MessageMedia::default(),
        };
        assert!(store.fetch(&job).await.is_err());
    }

    #[test]
    fn sanitize_keeps_wamid_readable() {
        assert_eq!(sanitize("wamid.HBgM/==?"), "wamid.HBgM___");
        assert_eq!(sanitize("plain-id_1.2"), "plain-id_1.2");
    }
}
