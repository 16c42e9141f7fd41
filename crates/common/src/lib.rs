//! Shared vocabulary for the parley workspace: channel/message enums, the
//! canonical inbound event produced by channel normalizers, and the media
//! cache collaborator trait.

pub mod media;
pub mod types;

pub use {
    media::{MediaCache, MediaDownloadJob, NoopMediaCache},
    types::{
        ChannelType, InboundEvent, MessageDirection, MessageMedia, MessageStatus, MessageType,
        Sender, now_ms,
    },
};
