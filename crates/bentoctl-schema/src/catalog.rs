//! The service catalog document and identifier resolution.

use crate::config::{ConfigError, Environment};
use crate::features::FeatureSet;
use crate::types::BuildVariant;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Identifier that expands to every enabled service.
pub const SERVICE_LITERAL_ALL: &str = "all";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read service catalog {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse service catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid service catalog: {0}")]
    Invalid(String),
    #[error("unknown service '{identifier}' (known services: {known})")]
    UnknownService { identifier: String, known: String },
    #[error("service '{service}' is not enabled (feature '{feature}' is disabled)")]
    NotEnabled { service: String, feature: String },
    #[error("service '{0}' has no development variant configured")]
    NoDevVariant(String),
    #[error("service '{0}' is not defined by the enabled compose files")]
    NotDefined(String),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CatalogEntry {
    #[serde(default)]
    service_kind: Option<String>,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    feature: Option<String>,
    image_env: String,
    version_env: String,
    #[serde(default)]
    dev_version_env: Option<String>,
    #[serde(default)]
    container_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub compose_id: String,
    pub kind: Option<String>,
    pub feature: Option<String>,
    pub image_env: String,
    pub version_env: String,
    pub dev_version_env: Option<String>,
    pub repository: Option<String>,
    pub container_name: String,
}

impl ServiceDescriptor {
    pub fn has_dev_variant(&self) -> bool {
        self.dev_version_env.is_some()
    }
}

/// Names of the variables holding an image repository and tag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageCoordinates {
    pub repository_var: String,
    pub version_var: String,
}

impl ImageCoordinates {
    /// Resolve to a `repository:tag` reference.
    pub fn image_ref(&self, env: &Environment) -> Result<String, ConfigError> {
        let repository = env.require(&self.repository_var)?;
        let version = env.require(&self.version_var)?;
        Ok(format!("{repository}:{version}"))
    }
}

/// Result of resolving a user-supplied service identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    All(Vec<String>),
    Group { prefix: String, members: Vec<String> },
    Single(String),
}

impl Resolution {
    pub fn ids(&self) -> &[String] {
        match self {
            Resolution::All(ids) | Resolution::Group { members: ids, .. } => ids,
            Resolution::Single(id) => std::slice::from_ref(id),
        }
    }

    /// Fan-out targets keep going past a failing service; a single named
    /// service aborts on its first failure.
    pub fn is_fan_out(&self) -> bool {
        !matches!(self, Resolution::Single(_))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Resolution::All(_))
    }

    /// Keep only services the enabled compose files define. A single
    /// service or a group left with no members fails closed.
    pub fn restrict_to(self, defined: &BTreeSet<String>) -> Result<Self, CatalogError> {
        match self {
            Resolution::All(ids) => Ok(Resolution::All(
                ids.into_iter().filter(|id| defined.contains(id)).collect(),
            )),
            Resolution::Group { prefix, members } => {
                let members: Vec<String> = members
                    .into_iter()
                    .filter(|id| defined.contains(id))
                    .collect();
                if members.is_empty() {
                    Err(CatalogError::NotDefined(prefix))
                } else {
                    Ok(Resolution::Group { prefix, members })
                }
            }
            Resolution::Single(id) if defined.contains(&id) => Ok(Resolution::Single(id)),
            Resolution::Single(id) => Err(CatalogError::NotDefined(id)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    services: BTreeMap<String, ServiceDescriptor>,
    kinds: BTreeMap<String, String>,
    features: FeatureSet,
}

impl ServiceCatalog {
    pub fn load(path: &Path, features: &FeatureSet) -> Result<Self, CatalogError> {
        debug!("loading service catalog from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content, features)
    }

    pub fn from_json_str(input: &str, features: &FeatureSet) -> Result<Self, CatalogError> {
        let entries: BTreeMap<String, CatalogEntry> = serde_json::from_str(input)?;

        let mut services = BTreeMap::new();
        let mut kinds = BTreeMap::new();

        for (compose_id, entry) in entries {
            if compose_id.trim().is_empty() {
                return Err(CatalogError::Invalid(
                    "compose id must not be empty".to_owned(),
                ));
            }
            if compose_id == SERVICE_LITERAL_ALL {
                return Err(CatalogError::Invalid(format!(
                    "'{SERVICE_LITERAL_ALL}' is reserved and cannot be a compose id"
                )));
            }
            if let Some(feature) = &entry.feature {
                if !features.is_declared(feature) {
                    return Err(CatalogError::Invalid(format!(
                        "service '{compose_id}' is gated by undeclared feature '{feature}'"
                    )));
                }
            }
            if let Some(kind) = &entry.service_kind {
                if let Some(existing) = kinds.insert(kind.clone(), compose_id.clone()) {
                    return Err(CatalogError::Invalid(format!(
                        "service kind '{kind}' is used by both '{existing}' and '{compose_id}'"
                    )));
                }
            }

            services.insert(
                compose_id.clone(),
                ServiceDescriptor {
                    container_name: entry
                        .container_name
                        .unwrap_or_else(|| compose_id.clone()),
                    compose_id,
                    kind: entry.service_kind,
                    feature: entry.feature,
                    image_env: entry.image_env,
                    version_env: entry.version_env,
                    dev_version_env: entry.dev_version_env,
                    repository: entry.repository,
                },
            );
        }

        // A kind that names a different service's compose id would make
        // resolution ambiguous.
        for (kind, target) in &kinds {
            if kind != target && services.contains_key(kind) {
                return Err(CatalogError::Invalid(format!(
                    "service kind '{kind}' of '{target}' collides with another compose id"
                )));
            }
        }

        Ok(Self {
            services,
            kinds,
            features: features.clone(),
        })
    }

    pub fn get(&self, compose_id: &str) -> Option<&ServiceDescriptor> {
        self.services.get(compose_id)
    }

    /// Every compose id in the catalog, enabled or not.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn is_enabled(&self, descriptor: &ServiceDescriptor) -> bool {
        descriptor
            .feature
            .as_deref()
            .map_or(true, |f| self.features.is_enabled(f))
    }

    /// Compose ids enabled under the active feature profiles.
    pub fn enabled_ids(&self) -> Vec<String> {
        self.services
            .values()
            .filter(|d| self.is_enabled(d))
            .map(|d| d.compose_id.clone())
            .collect()
    }

    /// Resolve a compose id, a kind alias, a group prefix, or `all`.
    pub fn resolve(&self, identifier: &str) -> Result<Resolution, CatalogError> {
        let identifier = identifier.trim();

        if identifier == SERVICE_LITERAL_ALL {
            return Ok(Resolution::All(self.enabled_ids()));
        }

        let direct = self
            .services
            .get(identifier)
            .or_else(|| self.kinds.get(identifier).and_then(|id| self.services.get(id)));
        if let Some(descriptor) = direct {
            return if self.is_enabled(descriptor) {
                Ok(Resolution::Single(descriptor.compose_id.clone()))
            } else {
                Err(not_enabled(descriptor))
            };
        }

        if !identifier.is_empty() {
            let group_prefix = format!("{identifier}-");
            let members: Vec<&ServiceDescriptor> = self
                .services
                .values()
                .filter(|d| d.compose_id.starts_with(&group_prefix))
                .collect();
            if let Some(first) = members.first() {
                let enabled: Vec<String> = members
                    .iter()
                    .filter(|d| self.is_enabled(d))
                    .map(|d| d.compose_id.clone())
                    .collect();
                if enabled.is_empty() {
                    return Err(CatalogError::NotEnabled {
                        service: identifier.to_owned(),
                        feature: first.feature.clone().unwrap_or_default(),
                    });
                }
                debug!(
                    "'{identifier}' is a group of {} enabled service(s)",
                    enabled.len()
                );
                return Ok(Resolution::Group {
                    prefix: identifier.to_owned(),
                    members: enabled,
                });
            }
        }

        Err(CatalogError::UnknownService {
            identifier: identifier.to_owned(),
            known: self
                .services
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Variables holding the repository and tag for a build variant.
    pub fn image_coordinates(
        &self,
        compose_id: &str,
        variant: BuildVariant,
    ) -> Result<ImageCoordinates, CatalogError> {
        let descriptor = self
            .services
            .get(compose_id)
            .ok_or_else(|| CatalogError::UnknownService {
                identifier: compose_id.to_owned(),
                known: self.services.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;

        let version_var = match variant {
            BuildVariant::Prebuilt => descriptor.version_env.clone(),
            BuildVariant::Local => descriptor
                .dev_version_env
                .clone()
                .ok_or_else(|| CatalogError::NoDevVariant(compose_id.to_owned()))?,
        };

        Ok(ImageCoordinates {
            repository_var: descriptor.image_env.clone(),
            version_var,
        })
    }
}

fn not_enabled(descriptor: &ServiceDescriptor) -> CatalogError {
    CatalogError::NotEnabled {
        service: descriptor.compose_id.clone(),
        feature: descriptor.feature.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "aggregation": {
            "service_kind": "aggregation",
            "repository": "https://github.com/bento-platform/bento_aggregation_service",
            "image_env": "BENTOV2_AGGREGATION_IMAGE",
            "version_env": "BENTOV2_AGGREGATION_VERSION",
            "dev_version_env": "BENTOV2_AGGREGATION_VERSION_DEV"
        },
        "katsu": {
            "service_kind": "metadata",
            "repository": "https://github.com/bento-platform/katsu",
            "image_env": "BENTOV2_KATSU_IMAGE",
            "version_env": "BENTOV2_KATSU_VERSION",
            "dev_version_env": "BENTOV2_KATSU_VERSION_DEV",
            "container_name": "bentov2-katsu"
        },
        "katsu-db": {
            "image_env": "BENTOV2_KATSU_DB_IMAGE",
            "version_env": "BENTOV2_KATSU_DB_VERSION"
        },
        "gohan-api": {
            "service_kind": "gohan",
            "feature": "gohan",
            "image_env": "BENTOV2_GOHAN_API_IMAGE",
            "version_env": "BENTOV2_GOHAN_API_VERSION",
            "dev_version_env": "BENTOV2_GOHAN_API_VERSION_DEV"
        },
        "gohan-elasticsearch": {
            "feature": "gohan",
            "image_env": "BENTOV2_GOHAN_ES_IMAGE",
            "version_env": "BENTOV2_GOHAN_ES_VERSION"
        }
    }"#;

    fn features(gohan: bool) -> FeatureSet {
        let env = if gohan {
            Environment::from_pairs([("BENTO_GOHAN_ENABLED", "true")])
        } else {
            Environment::default()
        };
        FeatureSet::from_environment(&env)
    }

    fn catalog(gohan: bool) -> ServiceCatalog {
        ServiceCatalog::from_json_str(CATALOG, &features(gohan)).unwrap()
    }

    #[test]
    fn compose_id_resolves_to_singleton() {
        assert_eq!(
            catalog(false).resolve("katsu").unwrap(),
            Resolution::Single("katsu".to_owned())
        );
    }

    #[test]
    fn kind_alias_translates_to_compose_id() {
        assert_eq!(
            catalog(false).resolve("metadata").unwrap(),
            Resolution::Single("katsu".to_owned())
        );
    }

    #[test]
    fn kind_equal_to_own_compose_id_is_allowed() {
        assert_eq!(
            catalog(false).resolve("aggregation").unwrap().ids(),
            ["aggregation".to_owned()]
        );
    }

    #[test]
    fn kind_alias_wins_over_group_prefix() {
        let resolution = catalog(true).resolve("gohan").unwrap();
        assert_eq!(resolution, Resolution::Single("gohan-api".to_owned()));

        // "katsu" prefixes "katsu-db" but is itself a compose id.
        let katsu = catalog(false).resolve("katsu").unwrap();
        assert!(!katsu.is_fan_out());
    }

    #[test]
    fn group_without_kind_collision_fans_out() {
        let input = CATALOG.replace("\"service_kind\": \"gohan\",", "");
        let catalog = ServiceCatalog::from_json_str(&input, &features(true)).unwrap();
        let resolution = catalog.resolve("gohan").unwrap();
        assert!(resolution.is_fan_out());
        assert_eq!(
            resolution.ids(),
            ["gohan-api".to_owned(), "gohan-elasticsearch".to_owned()]
        );
        for id in resolution.ids() {
            assert!(catalog.get(id).is_some());
        }
    }

    #[test]
    fn all_expands_to_enabled_services_only() {
        let ids = catalog(false).resolve("all").unwrap();
        assert!(ids.is_all());
        assert_eq!(ids.ids(), ["aggregation", "katsu", "katsu-db"]);

        let with_gohan = catalog(true).resolve("all").unwrap();
        assert_eq!(with_gohan.ids().len(), 5);
    }

    #[test]
    fn disabled_service_fails_closed() {
        let err = catalog(false).resolve("gohan-api").unwrap_err();
        assert!(matches!(err, CatalogError::NotEnabled { .. }));
        assert!(err.to_string().contains("gohan"));
    }

    #[test]
    fn undefined_services_fail_closed() {
        let defined: BTreeSet<String> = ["katsu", "katsu-db", "gohan-api"]
            .into_iter()
            .map(str::to_owned)
            .collect();

        let all = catalog(true).resolve("all").unwrap().restrict_to(&defined).unwrap();
        assert_eq!(all.ids(), ["gohan-api", "katsu", "katsu-db"]);

        let err = catalog(false)
            .resolve("aggregation")
            .unwrap()
            .restrict_to(&defined)
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotDefined(ref id) if id == "aggregation"));

        let input = CATALOG.replace("\"service_kind\": \"gohan\",", "");
        let catalog = ServiceCatalog::from_json_str(&input, &features(true)).unwrap();
        let group = catalog.resolve("gohan").unwrap().restrict_to(&defined).unwrap();
        assert_eq!(group.ids(), ["gohan-api".to_owned()]);

        let nothing = BTreeSet::new();
        let err = catalog.resolve("gohan").unwrap().restrict_to(&nothing).unwrap_err();
        assert!(matches!(err, CatalogError::NotDefined(ref id) if id == "gohan"));
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = catalog(false).resolve("nope").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownService { .. }));
        assert!(catalog(false).resolve("").is_err());
        // Prefix without the dash separator is not a group.
        assert!(catalog(false).resolve("kat").is_err());
    }

    #[test]
    fn image_coordinates_follow_variant() {
        let catalog = catalog(false);
        let prebuilt = catalog
            .image_coordinates("katsu", BuildVariant::Prebuilt)
            .unwrap();
        assert_eq!(prebuilt.repository_var, "BENTOV2_KATSU_IMAGE");
        assert_eq!(prebuilt.version_var, "BENTOV2_KATSU_VERSION");

        let local = catalog.image_coordinates("katsu", BuildVariant::Local).unwrap();
        assert_eq!(local.version_var, "BENTOV2_KATSU_VERSION_DEV");
    }

    #[test]
    fn local_coordinates_without_dev_tag_fail() {
        let err = catalog(false)
            .image_coordinates("katsu-db", BuildVariant::Local)
            .unwrap_err();
        assert!(matches!(err, CatalogError::NoDevVariant(ref id) if id == "katsu-db"));
    }

    #[test]
    fn image_ref_requires_both_variables() {
        let coords = ImageCoordinates {
            repository_var: "IMG".to_owned(),
            version_var: "VER".to_owned(),
        };
        let env = Environment::from_pairs([("IMG", "ghcr.io/bento-platform/katsu")]);
        assert_eq!(
            coords.image_ref(&env).unwrap_err(),
            ConfigError::MissingVariable("VER".to_owned())
        );
        let env = Environment::from_pairs([
            ("IMG", "ghcr.io/bento-platform/katsu"),
            ("VER", "7.1.0"),
        ]);
        assert_eq!(
            coords.image_ref(&env).unwrap(),
            "ghcr.io/bento-platform/katsu:7.1.0"
        );
    }

    #[test]
    fn container_name_defaults_to_compose_id() {
        let catalog = catalog(false);
        assert_eq!(catalog.get("katsu").unwrap().container_name, "bentov2-katsu");
        assert_eq!(catalog.get("katsu-db").unwrap().container_name, "katsu-db");
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"{"x": {"image_env": "A", "version_env": "B", "colour": "red"}}"#;
        assert!(matches!(
            ServiceCatalog::from_json_str(input, &features(false)),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn rejects_missing_image_vars() {
        let input = r#"{"x": {"version_env": "B"}}"#;
        assert!(ServiceCatalog::from_json_str(input, &features(false)).is_err());
    }

    #[test]
    fn rejects_duplicate_kinds() {
        let input = r#"{
            "a": {"service_kind": "k", "image_env": "A", "version_env": "B"},
            "b": {"service_kind": "k", "image_env": "A", "version_env": "B"}
        }"#;
        assert!(matches!(
            ServiceCatalog::from_json_str(input, &features(false)),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_kind_shadowing_compose_id() {
        let input = r#"{
            "a": {"service_kind": "b", "image_env": "A", "version_env": "B"},
            "b": {"image_env": "A", "version_env": "B"}
        }"#;
        assert!(ServiceCatalog::from_json_str(input, &features(false)).is_err());
    }

    #[test]
    fn rejects_reserved_and_undeclared() {
        let reserved = r#"{"all": {"image_env": "A", "version_env": "B"}}"#;
        assert!(ServiceCatalog::from_json_str(reserved, &features(false)).is_err());
        let undeclared = r#"{"x": {"feature": "nope", "image_env": "A", "version_env": "B"}}"#;
        assert!(ServiceCatalog::from_json_str(undeclared, &features(false)).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServiceCatalog::load(&dir.path().join("missing.json"), &features(false))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn load_reads_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bento_services.json");
        fs::write(&path, CATALOG).unwrap();
        let catalog = ServiceCatalog::load(&path, &features(false)).unwrap();
        assert_eq!(catalog.ids().count(), 5);
    }
}
