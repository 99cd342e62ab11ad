use async_trait::async_trait;
use incentives_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::RwLock;
use tracing::info;

/// Privileges checked by the incentive components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Configuration changes and batch migration
    Admin,
    /// Direct price setting
    Oracle,
    /// Redundancy-signal price adjustment
    PriceUpdater,
    /// Pot withdrawal
    Redistributor,
    Pauser,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Oracle => "oracle",
            Role::PriceUpdater => "price_updater",
            Role::Redistributor => "redistributor",
            Role::Pauser => "pauser",
        };
        write!(f, "{}", name)
    }
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn has_role(&self, role: Role, account: &Address) -> bool;
}

/// In-memory role assignments
#[derive(Default)]
pub struct RoleRegistry {
    members: RwLock<HashMap<Role, HashSet<Address>>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant_role(&self, role: Role, account: Address) {
        let mut members = self.members.write().await;
        if members.entry(role).or_default().insert(account) {
            info!(role = %role, account = %account.short(), "🔑 Role granted");
        }
    }

    pub async fn revoke_role(&self, role: Role, account: &Address) {
        let mut members = self.members.write().await;
        let removed = members
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false);
        if removed {
            info!(role = %role, account = %account.short(), "Role revoked");
        }
    }
}

#[async_trait]
impl AccessControl for RoleRegistry {
    async fn has_role(&self, role: Role, account: &Address) -> bool {
        let members = self.members.read().await;
        members
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }
}
