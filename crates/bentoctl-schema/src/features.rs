//! Optional feature profiles.
//!
//! Each profile gates a set of services in the compose files. Whether a
//! profile is enabled is decided once, from the environment snapshot, and the
//! resulting [`FeatureSet`] is never mutated afterwards.

use crate::config::Environment;
use serde::Serialize;
use std::path::PathBuf;

/// How a feature's enablement is read from its environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableRule {
    /// Enabled when the flag is truthy.
    Flag { default: bool },
    /// Enabled when the flag is falsy (e.g. "use external IdP" disables auth).
    InvertedFlag { default: bool },
    /// Enabled when the variable is set to a non-empty value.
    NonEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDeclaration {
    pub profile: &'static str,
    pub var: &'static str,
    pub rule: EnableRule,
}

/// Declared feature profiles, in the order their fragments and `--profile`
/// flags are emitted.
pub const FEATURE_DECLARATIONS: &[FeatureDeclaration] = &[
    FeatureDeclaration {
        profile: "auth",
        var: "BENTOV2_USE_EXTERNAL_IDP",
        rule: EnableRule::InvertedFlag { default: false },
    },
    FeatureDeclaration {
        profile: "beacon",
        var: "BENTO_BEACON_ENABLED",
        rule: EnableRule::Flag { default: false },
    },
    FeatureDeclaration {
        profile: "cbioportal",
        var: "BENTO_CBIOPORTAL_ENABLED",
        rule: EnableRule::Flag { default: false },
    },
    FeatureDeclaration {
        profile: "gohan",
        var: "BENTO_GOHAN_ENABLED",
        rule: EnableRule::Flag { default: false },
    },
    FeatureDeclaration {
        profile: "monitoring",
        var: "BENTO_MONITORING_ENABLED",
        rule: EnableRule::Flag { default: false },
    },
    FeatureDeclaration {
        profile: "public",
        var: "BENTOV2_USE_BENTO_PUBLIC",
        rule: EnableRule::Flag { default: true },
    },
    FeatureDeclaration {
        profile: "redirect",
        var: "BENTO_DOMAIN_REDIRECT",
        rule: EnableRule::NonEmpty,
    },
];

impl FeatureDeclaration {
    pub fn is_enabled(&self, env: &Environment) -> bool {
        match self.rule {
            EnableRule::Flag { default } => env.get_bool(self.var, default),
            EnableRule::InvertedFlag { default } => !env.get_bool(self.var, default),
            EnableRule::NonEmpty => env.get(self.var).is_some_and(|v| !v.trim().is_empty()),
        }
    }

    /// Variable naming an optional compose fragment for this profile,
    /// e.g. `BENTO_COMPOSE_FILE_GOHAN`.
    pub fn fragment_var(&self) -> String {
        format!(
            "BENTO_COMPOSE_FILE_{}",
            self.profile.to_ascii_uppercase().replace('-', "_")
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeatureProfile {
    pub name: String,
    pub enabled: bool,
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    profiles: Vec<FeatureProfile>,
}

impl FeatureSet {
    pub fn new(profiles: Vec<FeatureProfile>) -> Self {
        Self { profiles }
    }

    pub fn from_environment(env: &Environment) -> Self {
        let profiles = FEATURE_DECLARATIONS
            .iter()
            .map(|decl| FeatureProfile {
                name: decl.profile.to_owned(),
                enabled: decl.is_enabled(env),
                fragment: env
                    .get(&decl.fragment_var())
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            })
            .collect();
        Self { profiles }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureProfile> {
        self.profiles.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &FeatureProfile> {
        self.profiles.iter().filter(|p| p.enabled)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p.name == name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p.name == name && p.enabled)
    }
}
