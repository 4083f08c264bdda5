use super::{
    colorize_mode, colorize_status, json_pretty, spin_fail, spin_ok, spinner, CommandError,
    EXIT_FAILURE, EXIT_SUCCESS,
};
use bentoctl_core::{Engine, StatusReport};
use console::Style;

pub fn run(engine: &Engine, service: &str, json: bool) -> Result<u8, CommandError> {
    let rows = if json {
        engine.status(service)?
    } else {
        let pb = spinner(&format!("inspecting {service}"));
        match engine.status(service) {
            Ok(rows) => {
                spin_ok(&pb, &format!("inspected {} service(s)", rows.len()));
                rows
            }
            Err(e) => {
                spin_fail(&pb, "inspection failed");
                return Err(e.into());
            }
        }
    };

    if json {
        println!("{}", json_pretty(&rows)?);
    } else {
        println!("{:<28} {:<32} {:<10} STATUS", "SERVICE", "CONTAINER", "MODE");
        for row in &rows {
            println!(
                "{:<28} {:<32} {:<10} {}",
                row.service,
                row.container,
                colorize_mode(&row.mode.to_string()),
                status_cell(row)
            );
        }
    }

    let failed = rows.iter().filter(|r| r.is_failed()).count();
    if failed == 0 {
        Ok(EXIT_SUCCESS)
    } else {
        Err(CommandError::new(
            format!("{failed} of {} service(s) could not be inspected", rows.len()),
            EXIT_FAILURE,
        ))
    }
}

fn status_cell(row: &StatusReport) -> String {
    match (&row.status, &row.error) {
        (Some(status), _) => colorize_status(&status.to_string()),
        (None, Some(error)) => Style::new()
            .red()
            .apply_to(format!("inspect failed: {error}"))
            .to_string(),
        (None, None) => "unknown".to_owned(),
    }
}
