//! Application state shared across all request handlers.

use crate::roles::Role;
use courtwatch_core::processors::HealthReceiver;

/// State behind the health endpoints.
///
/// The report itself is produced by the health monitor; handlers only read
/// the latest value.
#[derive(Clone)]
pub struct AppState {
    pub health: HealthReceiver,
    pub role: Role,
}

impl AppState {
    pub fn new(health: HealthReceiver, role: Role) -> Self {
        Self { health, role }
    }
}
