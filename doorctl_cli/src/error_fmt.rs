//! Human-readable error descriptions and structured JSON error formatting.

use doorctl_core::error::{BuildError, DoorError, MarkerError};
use doorctl_hardware::error::HwError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingRangingPins => {
                "What happened: No distance sensor was provided to the controller.\nLikely causes: The sensor failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor is created successfully and passed via with_ranging_pins(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No opener trigger was provided to the controller.\nLikely causes: The relay pin failed to initialize or was not wired into the builder.\nHow to fix: Ensure the relay is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::MissingHub => {
                "What happened: No hub link was provided to the controller.\nLikely causes: The builder was not given a hub.\nHow to fix: Pass a hub via with_hub(...).".to_string()
            }
            BuildError::ChainFull(n) => format!(
                "What happened: Too many units were added ({n} max).\nLikely causes: Extra units registered on top of the standard stack.\nHow to fix: Remove unneeded units."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(me) = err.downcast_ref::<MarkerError>() {
        return format!(
            "What happened: The position markers were rejected ({me}).\nLikely causes: Open and closed ranges overlap, a bound is zero, or a field is not a number.\nHow to fix: Pass OpenMin;OpenMax;ClosedMin;ClosedMax;TotalSecs;OpeningSecs;ClosingSecs with disjoint ranges."
        );
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return match hw {
            HwError::EchoTimeout => "What happened: No echo from the distance sensor.\nLikely causes: Echo pin miswired, sensor unpowered, or nothing within range.\nHow to fix: Check [pins] trigger/echo and the 5V supply, and make sure the door is within about 4 m of the sensor.".to_string(),
            HwError::Gpio(msg) => format!(
                "What happened: GPIO access failed ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access /dev/gpiomem."
            ),
            HwError::Io(io) => format!(
                "What happened: I/O error talking to the hardware ({io}).\nLikely causes: Device busy or missing.\nHow to fix: Re-run with --log-level=debug for details."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DoorError>() {
        if matches!(de, DoorError::Timeout) {
            return "What happened: Distance measurement timed out.\nLikely causes: Sensor not wired correctly or the echo never came back.\nHow to fix: Verify trigger/echo pins and power, or raise ranging.max_round_trip_us in the config.".to_string();
        }
        if let DoorError::Calibration(me) = de {
            return format!(
                "What happened: The position markers were rejected ({me}).\nLikely causes: Open and closed ranges overlap or a bound is zero.\nHow to fix: Pass disjoint ranges."
            );
        }
        return format!(
            "What happened: {de}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open gpio pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("invalid configuration")
        || (lower.contains("pin") && lower.contains("missing"))
    {
        let cause = err
            .chain()
            .nth(1)
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid or incomplete{cause}.\nLikely causes: Missing [pins] (trigger, echo, motor), or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("storage") {
        return format!(
            "What happened: {msg}.\nLikely causes: [storage].dir is missing or not writable.\nHow to fix: Set [storage].dir to a writable directory."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.chain().nth(1) {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for sensor/GPIO trouble, 4 for rejected markers, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<HwError>().is_some()
        || matches!(
            err.downcast_ref::<DoorError>(),
            Some(DoorError::Timeout | DoorError::Hardware(_) | DoorError::HardwareFault(_))
        )
    {
        return 3;
    }
    if err.downcast_ref::<MarkerError>().is_some()
        || matches!(
            err.downcast_ref::<DoorError>(),
            Some(DoorError::Calibration(_))
        )
    {
        return 4;
    }
    1
}

/// Short stable name for the JSON `reason` field.
fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(hw) = err.downcast_ref::<HwError>() {
        return match hw {
            HwError::EchoTimeout => "EchoTimeout",
            HwError::Gpio(_) => "Gpio",
            HwError::Io(_) => "Io",
        };
    }
    if err.downcast_ref::<MarkerError>().is_some() {
        return "Markers";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_timeout_is_a_hardware_exit() {
        let err = eyre::Report::new(HwError::EchoTimeout).wrap_err("self-check measurement");
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("No echo"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "EchoTimeout");
    }

    #[test]
    fn rejected_markers_exit_with_four() {
        let err = eyre::Report::new(MarkerError::Parse("expected 7 fields, got 2".into()));
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("rejected"));
    }

    #[test]
    fn unknown_errors_fall_back() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("Something went wrong"));
    }
}
