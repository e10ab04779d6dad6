//! Human-readable error descriptions and structured JSON error formatting.

use shutter_core::error::{BuildError, CoverError, WriteFault};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid cover configuration ({msg}).\nLikely causes: Out-of-range values in the [control] or [devices] tables.\nHow to fix: Edit the config file, then rerun."
            ),
            other => format!(
                "What happened: The cover could not be assembled ({other}).\nLikely causes: Internal wiring error in the CLI.\nHow to fix: Re-run with --log-level=debug and report the output."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoverError>() {
        return match ce {
            CoverError::InvalidPositionRequest(p) => format!(
                "What happened: Position {p} is out of range.\nLikely causes: Positions are percent open.\nHow to fix: Pass --position between 0 (closed) and 100 (open)."
            ),
            CoverError::UnknownPosition => "What happened: The cover's position is unknown.\nLikely causes: First run, or the state file was removed.\nHow to fix: Run `shutter open` or `shutter close` once to establish a reference, then retry.".to_string(),
            CoverError::CommandFailed { coil, phase, fault } => {
                let causes = match fault {
                    WriteFault::Timeout => "The hub did not answer in time (network, power, or hub.timeout_ms too low).",
                    WriteFault::Interlock => "The coil pair interlock refused to energize both coils.",
                    WriteFault::Device(_) => "The hub rejected the write (wrong slave id or coil address).",
                    WriteFault::Transport(_) => "The connection to the hub failed or was reset.",
                };
                format!(
                    "What happened: Writing the {coil} coil failed during {phase} ({fault}).\nLikely causes: {causes}\nHow to fix: Check the hub address and the device's slave/coil numbers, then run `shutter stop` before retrying. The motor may be running."
                )
            }
            CoverError::Configuration(msg) => format!(
                "What happened: Configuration error: {msg}.\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
            ),
        };
    }

    // String-based heuristics for errors coming from init or I/O
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("did not complete") {
        return format!(
            "What happened: {msg}.\nLikely causes: The system was overloaded or the clock jumped.\nHow to fix: The cover was stopped; check its position and retry."
        );
    }

    if lower.contains("state file") {
        return format!(
            "What happened: {msg}.\nLikely causes: The state file is corrupt or not readable.\nHow to fix: Fix or delete the file; positions will be unknown until the next full open or close."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 invalid request, 3 actuator failure, 4 configuration.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ce) = err.downcast_ref::<CoverError>() {
        return match ce {
            CoverError::InvalidPositionRequest(_) | CoverError::UnknownPosition => 2,
            CoverError::CommandFailed { .. } => 3,
            CoverError::Configuration(_) => 4,
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return 4;
    }
    1
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(ce) = err.downcast_ref::<CoverError>() {
        return match ce {
            CoverError::InvalidPositionRequest(_) => "InvalidPositionRequest",
            CoverError::UnknownPosition => "UnknownPosition",
            CoverError::CommandFailed { .. } => "CommandFailed",
            CoverError::Configuration(_) => "Configuration",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Configuration";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(CoverError::CommandFailed { coil, phase, fault }) = err.downcast_ref::<CoverError>() {
        return json!({
            "reason": reason_name(err),
            "details": { "coil": coil.to_string(), "phase": phase.to_string(), "fault": fault.to_string() },
            "message": humanize(err),
        })
        .to_string();
    }

    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_core::error::{Coil, Phase};

    #[test]
    fn exit_codes_follow_error_kind() {
        let invalid = eyre::Report::new(CoverError::InvalidPositionRequest(120));
        let failed = eyre::Report::new(CoverError::CommandFailed {
            coil: Coil::Open,
            phase: Phase::Engage,
            fault: WriteFault::Timeout,
        });
        let config = eyre::Report::new(CoverError::Configuration("x".into()));
        assert_eq!(exit_code_for_error(&invalid), 2);
        assert_eq!(exit_code_for_error(&failed), 3);
        assert_eq!(exit_code_for_error(&config), 4);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn command_failure_json_carries_details() {
        let failed = eyre::Report::new(CoverError::CommandFailed {
            coil: Coil::Close,
            phase: Phase::Release,
            fault: WriteFault::Interlock,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&failed)).unwrap();
        assert_eq!(v["reason"], "CommandFailed");
        assert_eq!(v["details"]["coil"], "close");
        assert_eq!(v["details"]["phase"], "release");
        assert!(v["message"].as_str().unwrap().contains("interlock"));
    }

    #[test]
    fn humanize_points_at_reference_run() {
        let msg = humanize(&eyre::Report::new(CoverError::UnknownPosition));
        assert!(msg.contains("shutter open"));
    }
}
