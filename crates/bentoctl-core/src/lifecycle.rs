use crate::CoreError;
use bentoctl_schema::{BuildVariant, CatalogError, ServiceDescriptor};

/// A mode change requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `work-on`: switch to the local development build.
    WorkOn,
    /// `prebuilt`: switch back to the published image.
    Promote,
}

impl Transition {
    pub fn target(self) -> BuildVariant {
        match self {
            Transition::WorkOn => BuildVariant::Local,
            Transition::Promote => BuildVariant::Prebuilt,
        }
    }

    pub fn operation(self) -> &'static str {
        match self {
            Transition::WorkOn => "work-on",
            Transition::Promote => "prebuilt",
        }
    }
}

/// Check that `descriptor` may move from `from` into the transition's
/// target. Returns whether the recorded mode changes.
pub fn validate_transition(
    descriptor: &ServiceDescriptor,
    from: BuildVariant,
    transition: Transition,
) -> Result<bool, CoreError> {
    let to = transition.target();
    if to == BuildVariant::Local && !descriptor.has_dev_variant() {
        return Err(CatalogError::NoDevVariant(descriptor.compose_id.clone()).into());
    }
    Ok(from != to)
}
