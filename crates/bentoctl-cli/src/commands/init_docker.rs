use super::{json_pretty, ok_mark, spin_fail, spin_ok, spinner, warn_mark, CommandError, EXIT_SUCCESS};
use bentoctl_core::Engine;
use bentoctl_runtime::NetworkOutcome;

pub fn run(engine: &Engine, json: bool) -> Result<u8, CommandError> {
    if json {
        let reports = engine.init_networks()?;
        println!("{}", json_pretty(&reports)?);
        return Ok(EXIT_SUCCESS);
    }

    if engine.config().networks.is_empty() {
        println!("{} no networks configured (BENTO_DOCKER_NETWORKS)", warn_mark());
        return Ok(EXIT_SUCCESS);
    }

    let pb = spinner("ensuring container networks");
    let reports = match engine.init_networks() {
        Ok(reports) => reports,
        Err(e) => {
            spin_fail(&pb, "network setup failed");
            return Err(e.into());
        }
    };
    spin_ok(&pb, &format!("{} network(s) ready", reports.len()));

    for report in &reports {
        match report.outcome {
            NetworkOutcome::Created => println!("{} created {}", ok_mark(), report.network),
            NetworkOutcome::AlreadyPresent => {
                println!("{} {} already exists", ok_mark(), report.network);
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
