use super::{announce, report_fan_out, CommandError};
use bentoctl_core::{Engine, RunOptions};

pub fn run(
    engine: &Engine,
    service: &str,
    opts: RunOptions,
    json: bool,
) -> Result<u8, CommandError> {
    announce(json, &format!("running {service}"));
    let report = engine.run(service, opts)?;
    report_fan_out(&report, json)
}
