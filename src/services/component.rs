use crate::db::Db;
use crate::model::Component;
use anyhow::Result;

/// Resolves file identifiers to the components they belong to.
pub trait ComponentDirectory {
    fn resolve(&self, uuid: &str) -> Result<Option<Component>>;
}

impl ComponentDirectory for Db {
    fn resolve(&self, uuid: &str) -> Result<Option<Component>> {
        self.get_component_by_uuid(uuid)
    }
}
