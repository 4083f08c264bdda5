use super::CommandError;
use bentoctl_core::Engine;

/// The command's exit code is the shell's exit code.
pub fn run(engine: &Engine, service: &str, shell: &str) -> Result<u8, CommandError> {
    let code = engine.shell(service, shell)?;
    Ok(exit_code(code))
}

pub fn run_as_shell(engine: &Engine, service: &str, shell: &str) -> Result<u8, CommandError> {
    let code = engine.run_as_shell(service, shell)?;
    Ok(exit_code(code))
}

fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(super::EXIT_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_codes_become_failure() {
        assert_eq!(exit_code(0), 0);
        assert_eq!(exit_code(130), 130);
        assert_eq!(exit_code(-1), super::super::EXIT_FAILURE);
        assert_eq!(exit_code(300), super::super::EXIT_FAILURE);
    }
}
