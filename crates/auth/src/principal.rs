use serde::{Deserialize, Serialize};

use holdfast_core::ActorId;

use crate::Permission;
use crate::permissions::WILDCARD;

/// An identified caller of the reservation engine together with its granted
/// capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Actor {
    /// A regular sales agent without override capabilities.
    pub fn agent(id: ActorId) -> Self {
        Self {
            id,
            permissions: Vec::new(),
        }
    }

    /// An administrator holding every capability.
    pub fn admin(id: ActorId) -> Self {
        Self {
            id,
            permissions: vec![WILDCARD],
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
        self
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }
}
