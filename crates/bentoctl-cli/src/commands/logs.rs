use super::{CommandError, EXIT_SUCCESS};
use bentoctl_core::Engine;

pub fn run(engine: &Engine, service: Option<&str>, follow: bool) -> Result<u8, CommandError> {
    engine.logs(service, follow)?;
    Ok(EXIT_SUCCESS)
}
