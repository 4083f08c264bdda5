//! Service catalog, feature profiles, and configuration for bentoctl.
//!
//! This crate defines the static description of a Bento deployment: the
//! `ServiceCatalog` loaded from the services JSON document, the optional
//! `FeatureSet` derived from environment flags, and the immutable `Config`
//! built once at process start from an `Environment` snapshot. Nothing in the
//! crates above this one reads the process environment directly.

pub mod catalog;
pub mod config;
pub mod features;
pub mod types;

pub use catalog::{
    CatalogError, ImageCoordinates, Resolution, ServiceCatalog, ServiceDescriptor,
    SERVICE_LITERAL_ALL,
};
pub use config::{ComposeFragments, Config, ConfigError, Environment};
pub use features::{EnableRule, FeatureDeclaration, FeatureProfile, FeatureSet, FEATURE_DECLARATIONS};
pub use types::{BaseMode, BuildVariant};
