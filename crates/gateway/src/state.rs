use std::sync::Arc;

use {
    parley_inbox::InboxService,
    parley_tenants::{CredentialProvider, TenantDirectory},
};

use crate::broadcast::TenantRooms;

/// Shared app state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InboxService>,
    pub tenants: Arc<dyn TenantDirectory>,
    /// Read directly only by the webhook-subscription handshake; everything
    /// else reaches credentials through the service.
    pub credentials: Arc<dyn CredentialProvider>,
    pub rooms: Arc<TenantRooms>,
}
