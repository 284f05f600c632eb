//! Human-readable error descriptions, exit codes and structured JSON errors.

use shim_core::error::{BuildError, ShimError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDac => {
                "What happened: No DAC was provided to the sequencer.\nLikely causes: The SPI DAC failed to open or was not wired into the builder.\nHow to fix: Check [pins].spi_* in the config and that SPI is enabled.".to_string()
            }
            BuildError::MissingTable => {
                "What happened: No shim value table was loaded.\nLikely causes: [files].shimvals is missing or unreadable.\nHow to fix: Point files.shimvals at the exported table and rerun.".to_string()
            }
            BuildError::MissingTrigger => {
                "What happened: No trigger input was attached.\nLikely causes: The trigger GPIO failed to initialize.\nHow to fix: Check [pins].trigger and GPIO permissions.".to_string()
            }
            BuildError::ChannelOutOfRange { channel, entry, width } => format!(
                "What happened: DAC channel {channel} is mapped to column {entry}, but the shim table has only {width} columns.\nLikely causes: The table was exported with fewer channels than the amplifier wiring expects.\nHow to fix: Export all gradient and shim columns, or set [channels].order to match the table."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or input files.\nHow to fix: Edit the config file, then rerun. See etc/shim_config.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ShimError>() {
        return match se {
            ShimError::Config(msg) => format!(
                "What happened: Configuration error: {msg}.\nLikely causes: Missing or malformed config, shim table or filter files.\nHow to fix: Check the [files] paths and file contents, then rerun."
            ),
            ShimError::HardwareWrite { .. } | ShimError::HardwareFault(_) => format!(
                "What happened: {se}.\nLikely causes: SPI wiring, DAC power, or bus permissions.\nHow to fix: Check the DAC connection and [pins].spi_* settings; rerun `shim reset` to bring the outputs to 0 A."
            ),
            ShimError::WriteFailureLimit(n) => format!(
                "What happened: {n} output frames failed to write and the run was aborted.\nLikely causes: Persistent SPI or DAC fault.\nHow to fix: Check the DAC hardware, or raise safety.max_write_failures (0 disables the limit)."
            ),
            ShimError::TriggerTimeout(d) => format!(
                "What happened: No scanner trigger arrived within {} ms.\nLikely causes: Sequence not running, trigger cable unplugged, or wrong [pins].trigger.\nHow to fix: Start the sequence, check the trigger line, or raise timing.trigger_timeout_ms.",
                d.as_millis()
            ),
            ShimError::Stopped => {
                "What happened: Run stopped by request.\nOutputs were reset to 0 A.".to_string()
            }
        };
    }

    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();
    if lower.contains("spi") || lower.contains("gpio") {
        return format!(
            "What happened: Failed to initialize hardware ({msg}).\nLikely causes: SPI/GPIO not enabled, wrong bus or pin numbers, or insufficient permissions.\nHow to fix: Enable SPI, check [pins] in the config, and ensure the process may access /dev/spidev* and /dev/gpiomem."
        );
    }

    format!(
        "Something went wrong: {msg}\nHow to fix: Re-run with --log-level=debug for details."
    )
}

/// Stable exit codes: 2 configuration, 3 hardware write, 4 trigger timeout, 5 stopped, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<ShimError>() {
        Some(ShimError::Config(_)) => 2,
        Some(
            ShimError::HardwareWrite { .. }
            | ShimError::HardwareFault(_)
            | ShimError::WriteFailureLimit(_),
        ) => 3,
        Some(ShimError::TriggerTimeout(_)) => 4,
        Some(ShimError::Stopped) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<ShimError>() {
        Some(ShimError::Config(_)) => "Config",
        Some(ShimError::HardwareWrite { .. }) => "HardwareWrite",
        Some(ShimError::HardwareFault(_)) => "HardwareFault",
        Some(ShimError::WriteFailureLimit(_)) => "WriteFailureLimit",
        Some(ShimError::TriggerTimeout(_)) => "TriggerTimeout",
        Some(ShimError::Stopped) => "Stopped",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    match err.downcast_ref::<ShimError>() {
        Some(e @ ShimError::HardwareWrite { .. }) => {
            obj["details"] = json!({ "failed_channels": e.failed_channels().collect::<Vec<_>>() });
        }
        Some(ShimError::TriggerTimeout(d)) => {
            obj["details"] = json!({ "timeout_ms": d.as_millis() as u64 });
        }
        Some(ShimError::WriteFailureLimit(n)) => {
            obj["details"] = json!({ "failed_frames": n });
        }
        _ => {}
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn exit_codes_are_stable() {
        let cases = [
            (eyre::Report::new(ShimError::Config("x".into())), 2),
            (eyre::Report::new(BuildError::MissingTable), 2),
            (eyre::Report::new(ShimError::WriteFailureLimit(3)), 3),
            (
                eyre::Report::new(ShimError::TriggerTimeout(Duration::from_millis(5))),
                4,
            ),
            (eyre::Report::new(ShimError::Stopped), 5),
            (eyre::eyre!("boom"), 1),
        ];
        for (err, code) in cases {
            assert_eq!(exit_code_for_error(&err), code, "{err}");
        }
    }

    #[test]
    fn json_lists_failed_channels() {
        let err = eyre::Report::new(ShimError::HardwareWrite {
            failed_mask: 0b1001,
            last: "bus".into(),
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "HardwareWrite");
        assert_eq!(v["details"]["failed_channels"], serde_json::json!([0, 3]));
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        use eyre::WrapErr;
        let err: eyre::Result<()> = Err(eyre::Report::new(ShimError::Stopped));
        let err = err.wrap_err("dynamic run").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 5);
    }
}
