use bentoctl_runtime::ComposeInvocation;
use bentoctl_schema::{BaseMode, ComposeFragments, Config, FeatureSet};

/// Builds the compose invocation for a base mode and overlay choice.
///
/// Output depends only on the fragments and feature set fixed at
/// construction plus the two arguments to [`build`](Self::build), so callers
/// recompute it on every operation instead of caching it.
#[derive(Debug, Clone)]
pub struct ManifestComposer {
    fragments: ComposeFragments,
    features: FeatureSet,
}

impl ManifestComposer {
    pub fn new(fragments: ComposeFragments, features: FeatureSet) -> Self {
        Self {
            fragments,
            features,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fragments.clone(), config.features.clone())
    }

    /// Fragment order: base, each enabled feature's fragment in declaration
    /// order, the dev or prod overlay, then the local overlay if requested.
    pub fn build(&self, base_mode: BaseMode, overlay_local: bool) -> ComposeInvocation {
        let mut fragments = vec![self.fragments.base.clone()];
        let mut profiles = Vec::new();

        for profile in self.features.enabled() {
            if let Some(fragment) = &profile.fragment {
                fragments.push(fragment.clone());
            }
            profiles.push(profile.name.clone());
        }

        fragments.push(match base_mode {
            BaseMode::Dev => self.fragments.dev.clone(),
            BaseMode::Prod => self.fragments.prod.clone(),
        });

        if overlay_local {
            fragments.push(self.fragments.local.clone());
        }

        ComposeInvocation {
            fragments,
            profiles,
            base_mode,
            local_overlay: overlay_local,
        }
    }
}
