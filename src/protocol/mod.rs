use serde_json::json;
use std::io::{BufRead, Write};

use crate::error::{PipelineError, Result};
use crate::runtime::PipelineDriver;

/// Line protocol the desktop UI drives the pipeline with: one command per
/// line on stdin, one JSON object per line on stdout. Success wraps the
/// payload in `{"ok":true,"data":…}`, failure in `{"ok":false,"error":…}`;
/// the loop itself never dies on a command error.
///
/// Commands: `ping`, `get_status`, `validate_dataset`, `run_all [force]`,
/// `run_phase <n> [force]`, `get_report`, `stop`.
pub fn serve<R: BufRead, W: Write>(
    driver: &mut PipelineDriver,
    input: R,
    output: &mut W,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "stop" {
            writeln!(output, "{}", json!({"ok": true, "data": "bye"}))?;
            output.flush()?;
            break;
        }
        match dispatch(driver, command) {
            Ok(data) => writeln!(output, "{}", json!({"ok": true, "data": data}))?,
            Err(e) => writeln!(output, "{}", json!({"ok": false, "error": e.to_string()}))?,
        }
        output.flush()?;
    }
    Ok(())
}

fn dispatch(driver: &mut PipelineDriver, line: &str) -> Result<serde_json::Value> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    match command {
        "ping" => Ok(json!("pong")),
        "get_status" => Ok(serde_json::to_value(driver.status()?)?),
        "validate_dataset" => Ok(serde_json::to_value(driver.validate())?),
        "run_all" => {
            let force = parse_force(parts.next())?;
            Ok(serde_json::to_value(driver.run_all(force)?)?)
        }
        "run_phase" => {
            let number = parts
                .next()
                .ok_or_else(|| {
                    PipelineError::Protocol("run_phase needs a phase number".to_string())
                })?
                .parse::<u8>()
                .map_err(|_| {
                    PipelineError::Protocol("phase number must be an integer".to_string())
                })?;
            let force = parse_force(parts.next())?;
            Ok(serde_json::to_value(driver.run_single(number, force)?)?)
        }
        "get_report" => Ok(serde_json::to_value(driver.report()?)?),
        other => Err(PipelineError::Protocol(format!(
            "unknown command '{}'",
            other
        ))),
    }
}

fn parse_force(token: Option<&str>) -> Result<bool> {
    match token {
        None => Ok(false),
        Some("force") => Ok(true),
        Some(other) => Err(PipelineError::Protocol(format!(
            "unexpected argument '{}'",
            other
        ))),
    }
}
