use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use arcadia_core::{ActorId, DomainError, DomainResult};

/// A coarse permission the upstream auth layer grants to a requester.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SellItems,
    RestockItems,
    AdjustStock,
    ManageCatalog,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::SellItems => "sell_items",
            Capability::RestockItems => "restock_items",
            Capability::AdjustStock => "adjust_stock",
            Capability::ManageCatalog => "manage_catalog",
        }
    }
}

impl FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sell_items" => Ok(Capability::SellItems),
            "restock_items" => Ok(Capability::RestockItems),
            "adjust_stock" => Ok(Capability::AdjustStock),
            "manage_catalog" => Ok(Capability::ManageCatalog),
            other => Err(DomainError::validation(format!(
                "unknown capability: {other}"
            ))),
        }
    }
}

/// The authenticated party behind a request, with the capabilities the
/// upstream auth layer attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub actor_id: ActorId,
    capabilities: HashSet<Capability>,
}

impl Requester {
    pub fn new(actor_id: ActorId, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            actor_id,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn require(&self, capability: Capability) -> DomainResult<()> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(DomainError::not_eligible(format!(
                "requester lacks the {} capability",
                capability.as_str()
            )))
        }
    }
}
