//! Audit trail configuration

use serde::Deserialize;

use crate::application::AuditPolicy;

/// How history writes relate to the lifecycle transaction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// `transactional` (default) or `best_effort`
    #[serde(default)]
    pub policy: AuditPolicy,
}
