use serde::{Deserialize, Serialize};
use std::fmt;

/// Which base overlay the whole deployment runs with, selected by `MODE`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BaseMode {
    Dev,
    Prod,
}

impl BaseMode {
    pub fn from_mode_var(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("dev") => BaseMode::Dev,
            _ => BaseMode::Prod,
        }
    }
}

impl fmt::Display for BaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseMode::Dev => write!(f, "dev"),
            BaseMode::Prod => write!(f, "prod"),
        }
    }
}

/// Build variant a service runs as.
///
/// `Prebuilt` is a versioned, registry-published image. `Local` is a
/// development image running against a checked-out source tree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    #[default]
    Prebuilt,
    Local,
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildVariant::Prebuilt => write!(f, "prebuilt"),
            BuildVariant::Local => write!(f, "local"),
        }
    }
}
