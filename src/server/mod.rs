//! HTTP Transport Module
//!
//! Maps JSON requests onto the shuffle engine's operation surface and engine
//! outcomes back to responses. Stale and rejected writes complete normally at
//! this layer; the drop is internal by design, so nothing in the
//! stale/absent/timeout class ever becomes a transport error.
//!
//! ## Submodules
//! - **`protocol`**: Endpoint constants and the request/response DTOs.
//! - **`handlers`**: axum handlers wired to `AppShuffleRegistry`.

pub mod handlers;
pub mod protocol;

/// Identity of this server instance, generated at startup and reported in the
/// stats surface so operators can tell instances apart across restarts.
#[derive(Debug, Clone)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}
