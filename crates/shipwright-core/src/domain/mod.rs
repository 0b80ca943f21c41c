//! Domain models for shipwright.
//!
//! Canonical definitions for the core entities:
//! - `AssetCategory` / `AssetId`: categorized deployable units
//! - `Reference`: typed dependency edges between assets
//! - `DependencyClosure`: the locally-deployable transitive set
//! - `DeployBatch` / `DeployPlan`: the category-ordered batch sequence

pub mod asset;
pub mod error;
pub mod plan;
pub mod reference;

// Re-export main types and errors
pub use asset::{AssetCategory, AssetId, DEPLOY_LAYER_ORDER};
pub use error::{Result, ShipwrightError};
pub use plan::{DeployBatch, DeployPlan};
pub use reference::{DependencyClosure, Reference, ReferenceKind, SkippedDependency};
