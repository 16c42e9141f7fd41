//! Background media download cache.
//!
//! Downloads inbound message media — WhatsApp by media id (Cloud API
//! metadata lookup, then the signed URL), Instagram by direct CDN URL — and
//! stores it under `{uploads}/{tenant}/{channel}/{type}/{id}.{ext}`.
//! Everything here is fire-and-forget relative to message persistence:
//! failures are logged, never propagated.

pub mod store;

pub use store::MediaStore;
