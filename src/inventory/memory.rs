//! In-memory inventory adapter serving a fixed datacenter tree.

use super::model::Datacenter;
use crate::domain::ports::InventoryClient;
use crate::error::Result;
use async_trait::async_trait;

/// Inventory client over a tree held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticInventoryClient {
    datacenters: Vec<Datacenter>,
}

impl StaticInventoryClient {
    pub fn new(datacenters: Vec<Datacenter>) -> Self {
        Self { datacenters }
    }

    /// Load a tree from the endpoint's JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

#[async_trait]
impl InventoryClient for StaticInventoryClient {
    async fn datacenters(&self) -> Result<Vec<Datacenter>> {
        Ok(self.datacenters.clone())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
