//! Inventory seeding from a JSON document.
//!
//! ```json
//! {
//!   "projects": [
//!     {
//!       "id": "0190c7e4-...",
//!       "name": "Harbour View",
//!       "units": [
//!         { "code": "HV-12-03", "price_cents": 48500000, "bedrooms": 2, "area_sqm": 84 },
//!         { "code": "HV-12-04", "price_cents": 51000000, "status": "booked" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Ids are optional and generated when absent. Units load at version 0; a
//! seeded `status` may be any non-reserved status.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use holdfast_core::{DomainError, ProjectId, UnitId};
use holdfast_inventory::{Unit, UnitAttributes, UnitStatus};

use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read inventory file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid inventory document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unit '{code}' rejected: {source}")]
    Domain {
        code: String,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct InventoryDocument {
    #[serde(default)]
    projects: Vec<ProjectSeed>,
}

#[derive(Debug, Deserialize)]
struct ProjectSeed {
    #[serde(default)]
    id: Option<ProjectId>,
    name: String,
    #[serde(default)]
    units: Vec<UnitSeed>,
}

#[derive(Debug, Deserialize)]
struct UnitSeed {
    #[serde(default)]
    id: Option<UnitId>,
    #[serde(flatten)]
    attributes: UnitAttributes,
    #[serde(default)]
    status: Option<UnitStatus>,
}

/// What a seed run loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// `(project id, project name)` in document order.
    pub projects: Vec<(ProjectId, String)>,
    pub units: usize,
}

pub fn load_inventory_file<S>(store: &S, path: impl AsRef<Path>) -> Result<SeedSummary, SeedError>
where
    S: InventoryStore + ?Sized,
{
    let raw = fs::read_to_string(path.as_ref())?;
    let summary = load_inventory_str(store, &raw)?;
    info!(
        path = %path.as_ref().display(),
        projects = summary.projects.len(),
        units = summary.units,
        "inventory loaded"
    );
    Ok(summary)
}

pub fn load_inventory_str<S>(store: &S, raw: &str) -> Result<SeedSummary, SeedError>
where
    S: InventoryStore + ?Sized,
{
    let document: InventoryDocument = serde_json::from_str(raw)?;
    let mut summary = SeedSummary::default();

    for project in document.projects {
        let project_id = project.id.unwrap_or_default();
        for seed in project.units {
            let code = seed.attributes.code.clone();
            let mut unit = Unit::new(seed.id.unwrap_or_default(), project_id, seed.attributes);
            if let Some(status) = seed.status {
                unit = unit
                    .with_status(status)
                    .map_err(|source| SeedError::Domain { code, source })?;
            }
            store.insert(unit)?;
            summary.units += 1;
        }
        summary.projects.push((project_id, project.name));
    }

    Ok(summary)
}
