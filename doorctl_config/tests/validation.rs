use doorctl_config::load_toml;
use rstest::rstest;

const PINS: &str = r#"
[pins]
trigger = 23
echo = 24
motor = 17
"#;

fn cfg_with(extra: &str) -> doorctl_config::Config {
    load_toml(&format!("{PINS}{extra}")).expect("parse TOML")
}

#[test]
fn minimal_config_uses_defaults() {
    let cfg = cfg_with("");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.ranging.stressed_hz, 8);
    assert_eq!(cfg.ranging.relaxed_hz, 1);
    assert_eq!(cfg.control.cycle_hz, 2);
    assert_eq!(cfg.control.trigger_pulse_ms, 100);
    assert_eq!(cfg.learning.recent_runs, 5);
    assert_eq!(cfg.event_log.capacity, 200);
    assert_eq!(cfg.storage.key, "calib");
    assert!(cfg.calibration.is_none());
    assert_eq!(cfg.sim.travel_ms, 12_000);
}

#[test]
fn missing_pins_fails_to_parse() {
    assert!(load_toml("[control]\ncycle_hz = 2\n").is_err());
}

#[rstest]
#[case("[ranging]\nstressed_hz = 0\n", "ranging.stressed_hz must be > 0")]
#[case("[ranging]\nrelaxed_hz = 10\n", "ranging.relaxed_hz must be <=")]
#[case("[ranging]\nus_per_cm = 0\n", "ranging.us_per_cm must be > 0")]
#[case("[ranging]\nmin_valid_cm = 500\n", "ranging.min_valid_cm must be <=")]
#[case("[ranging]\nmedian_window = 0\n", "ranging.median_window must be >= 1")]
#[case("[control]\ncycle_hz = 0\n", "control.cycle_hz must be > 0")]
#[case("[control]\ntrigger_pulse_ms = 0\n", "control.trigger_pulse_ms must be in")]
#[case("[learning]\nsigma_ceiling = 0.0\n", "learning.sigma_ceiling must be > 0")]
#[case("[learning]\nmin_lead_cs = 2000\n", "learning.min_lead_cs must be <")]
#[case("[learning]\nrecent_runs = 0\n", "learning.recent_runs must be >= 1")]
#[case("[event_log]\ntransition_capacity = 3\n", "event_log.transition_capacity must be >= 4")]
#[case("[storage]\nkey = \"../x\"\n", "storage.key must be")]
#[case("[sim]\ntravel_ms = 0\n", "sim.travel_ms must be > 0")]
#[case("[sim]\nopen_cm = 250\n", "sim.open_cm must differ")]
fn rejects_bad_values(#[case] extra: &str, #[case] needle: &str) {
    let err = cfg_with(extra).validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn rejects_overlapping_default_calibration() {
    let cfg = cfg_with(
        r#"
[calibration]
open_min = 5
open_max = 200
closed_min = 180
closed_max = 300
"#,
    );
    let err = cfg.validate().expect_err("overlap");
    assert!(format!("{err}").contains("must not overlap"));
}

#[test]
fn accepts_default_calibration_with_travel() {
    let cfg = cfg_with(
        r#"
[calibration]
open_min = 5
open_max = 40
closed_min = 180
closed_max = 300
total_secs = 15.5
"#,
    );
    cfg.validate().expect("valid");
    let c = cfg.calibration.expect("present");
    assert!((c.total_secs - 15.5).abs() < f32::EPSILON);
    assert_eq!(c.opening_secs, 0.0);
}
