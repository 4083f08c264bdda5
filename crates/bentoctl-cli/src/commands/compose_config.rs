use super::{json_pretty, CommandError, EXIT_SUCCESS};
use bentoctl_core::Engine;

pub fn run(engine: &Engine, services_only: bool, json: bool) -> Result<u8, CommandError> {
    let output = engine.compose_config(services_only)?;
    if json && services_only {
        let names: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        println!("{}", json_pretty(&names)?);
    } else {
        print!("{output}");
    }
    Ok(EXIT_SUCCESS)
}
