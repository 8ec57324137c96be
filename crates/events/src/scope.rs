use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use holdfast_core::{ProjectId, UnitId};

/// Messages that concern exactly one unit.
///
/// Implemented by change events so the transport can route them to
/// subscribers without knowing the payload.
pub trait UnitScoped {
    fn unit_id(&self) -> UnitId;

    fn project_id(&self) -> ProjectId;
}

/// Which events a subscriber wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubscriptionFilter {
    /// Every unit.
    #[default]
    All,
    /// Only the listed units.
    Units(HashSet<UnitId>),
    /// Every unit of one project.
    Project(ProjectId),
}

impl SubscriptionFilter {
    pub fn units(ids: impl IntoIterator<Item = UnitId>) -> Self {
        Self::Units(ids.into_iter().collect())
    }

    pub fn accepts<M: UnitScoped + ?Sized>(&self, message: &M) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Units(ids) => ids.contains(&message.unit_id()),
            SubscriptionFilter::Project(project_id) => message.project_id() == *project_id,
        }
    }
}
