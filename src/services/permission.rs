use crate::db::Db;
use crate::model::{Capability, Identity};
use anyhow::Result;

/// Decides whether a caller may act on a component.
pub trait PermissionAuthority {
    fn has_capability(
        &self,
        identity: &Identity,
        capability: Capability,
        component_key: &str,
    ) -> Result<bool>;
}

impl PermissionAuthority for Db {
    fn has_capability(
        &self,
        identity: &Identity,
        capability: Capability,
        component_key: &str,
    ) -> Result<bool> {
        self.has_project_permission(identity.login.as_deref(), capability, component_key)
    }
}
