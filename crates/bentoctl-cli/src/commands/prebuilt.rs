use super::{announce, report_fan_out, CommandError};
use bentoctl_core::Engine;

pub fn run(engine: &Engine, service: &str, json: bool) -> Result<u8, CommandError> {
    announce(json, &format!("switching {service} to prebuilt images"));
    let report = engine.prebuilt(service)?;
    report_fan_out(&report, json)
}
