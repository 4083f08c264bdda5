use super::{colorize_mode, json_pretty, warn_mark, CommandError, EXIT_SUCCESS};
use bentoctl_core::Engine;

pub fn run(engine: &Engine, service: &str, json: bool) -> Result<u8, CommandError> {
    let modes = engine.mode(service)?;
    if json {
        println!("{}", json_pretty(&modes)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("base mode: {}", engine.config().base_mode);
    println!("{:<28} MODE", "SERVICE");
    for entry in &modes {
        let mode = colorize_mode(&entry.mode.to_string());
        if entry.mixed {
            println!(
                "{:<28} {mode} {} local build in a prod deployment",
                entry.service,
                warn_mark()
            );
        } else {
            println!("{:<28} {mode}", entry.service);
        }
    }
    Ok(EXIT_SUCCESS)
}
