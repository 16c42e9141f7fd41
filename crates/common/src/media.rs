use crate::types::{ChannelType, MessageMedia, MessageType};

/// A media asset attached to an inbound message, queued for download.
#[derive(Debug, Clone)]
pub struct MediaDownloadJob {
    pub tenant_id: String,
    pub channel: ChannelType,
    pub media_type: MessageType,
    pub media: MessageMedia,
}

/// Collaborator that downloads and caches channel media in the background.
///
/// `schedule` must return immediately: implementations spawn the actual
/// download and log failures locally. Ingestion never waits on, retries, or
/// rolls back because of a media download.
pub trait MediaCache: Send + Sync {
    fn schedule(&self, job: MediaDownloadJob);
}

/// Discards every job. Used in tests and when no uploads directory is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMediaCache;

impl MediaCache for NoopMediaCache {
    fn schedule(&self, _job: MediaDownloadJob) {}
}
