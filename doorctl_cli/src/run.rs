//! Command execution: config mapping, hardware assembly, and the four
//! subcommands.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use doorctl_core::learning::try_get_stop_position_range;
use doorctl_core::{
    CalibrationRecord, Controller, EventCode, EventLog, EventLogCfg, FileStore, HubCommand,
    LearnCfg, OperatorCommand,
};
use doorctl_traits::{
    CurrentDoorState, EchoCell, HubLink, MotorActuator, RangingPins, TargetDoorState,
};
use eyre::{Result, WrapErr};
use serde_json::json;

use crate::cli::{Side, json_mode};

type Hardware = (Box<dyn RangingPins>, Box<dyn MotorActuator>);

/// Prints every hub update on stdout.
struct ConsoleHub {
    json: bool,
}

impl ConsoleHub {
    fn emit(&self, field: &str, text: &str, value: serde_json::Value) {
        if self.json {
            println!("{}", json!({ "hub": field, "value": value }));
        } else {
            println!("hub {field}={text}");
        }
    }
}

impl HubLink for ConsoleHub {
    fn set_target_state(&mut self, state: TargetDoorState) {
        let s = format!("{state:?}");
        self.emit("target", &s, json!(s));
    }

    fn set_current_state(&mut self, state: CurrentDoorState) {
        let s = format!("{state:?}");
        self.emit("current", &s, json!(s));
    }

    fn set_obstruction_detected(&mut self, obstructed: bool) {
        self.emit("obstruction", &obstructed.to_string(), json!(obstructed));
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_hardware(cfg: &doorctl_config::Config, echo: &Arc<EchoCell>) -> Result<Hardware> {
    let map = doorctl_hardware::gpio::PinMap {
        trigger: cfg.pins.trigger,
        echo: cfg.pins.echo,
        motor: cfg.pins.motor,
    };
    let (sensor, relay) =
        doorctl_hardware::gpio::open(map, Arc::clone(echo)).wrap_err("open gpio pins")?;
    tracing::info!(
        trigger = map.trigger,
        echo = map.echo,
        motor = map.motor,
        "gpio ready"
    );
    Ok((Box::new(sensor), Box::new(relay)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_hardware(cfg: &doorctl_config::Config, echo: &Arc<EchoCell>) -> Result<Hardware> {
    use doorctl_hardware::{SimDoor, SimDoorCfg, SimSonar, SimTrigger};
    use doorctl_traits::{Clock, MonotonicClock};

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let door = SimDoor::new(SimDoorCfg {
        closed_cm: cfg.sim.closed_cm,
        open_cm: cfg.sim.open_cm,
        travel: Duration::from_millis(cfg.sim.travel_ms),
        noise_cm: cfg.sim.noise_cm,
        ..SimDoorCfg::default()
    });
    tracing::info!(
        closed_cm = cfg.sim.closed_cm,
        open_cm = cfg.sim.open_cm,
        travel_ms = cfg.sim.travel_ms,
        "using simulated door"
    );
    let sonar = SimSonar::new(
        door.clone(),
        Arc::clone(&clock),
        Arc::clone(echo),
        cfg.ranging.us_per_cm,
    );
    let trigger = SimTrigger::new(door, clock);
    Ok((Box::new(sonar), Box::new(trigger)))
}

fn default_record(cfg: &doorctl_config::Config) -> CalibrationRecord {
    cfg.calibration
        .as_ref()
        .map(CalibrationRecord::from)
        .unwrap_or_default()
}

fn open_store(dir: &str) -> Result<FileStore> {
    FileStore::open(dir).wrap_err_with(|| format!("open storage dir {dir}"))
}

fn build_controller(cfg: &doorctl_config::Config) -> Result<Controller> {
    let echo = Arc::new(EchoCell::new());
    let (pins, actuator) = open_hardware(cfg, &echo)?;
    let mut builder = Controller::builder()
        .with_ranging_pins(pins, echo)
        .with_actuator(actuator)
        .with_hub(ConsoleHub { json: json_mode() })
        .with_ranging((&cfg.ranging).into())
        .with_control((&cfg.control).into())
        .with_learning((&cfg.learning).into())
        .with_event_log((&cfg.event_log).into())
        .with_store_key(cfg.storage.key.clone())
        .with_default_calibration(default_record(cfg));
    if let Some(dir) = &cfg.storage.dir {
        builder = builder.with_store(open_store(dir)?);
    }
    builder.build()
}

/// Map one stdin line to a hub command.
fn parse_hub_command(line: &str) -> Option<HubCommand> {
    let cmd = match line.trim().to_ascii_lowercase().as_str() {
        "open" => HubCommand::SetTarget(TargetDoorState::Open),
        "close" | "closed" => HubCommand::SetTarget(TargetDoorState::Closed),
        "trigger" => HubCommand::Trigger,
        "save" => HubCommand::Operator(OperatorCommand::SaveCalibration),
        "learn-open" => HubCommand::Operator(OperatorCommand::LearnOpenRange),
        "learn-closed" => HubCommand::Operator(OperatorCommand::LearnClosedRange),
        "learn-travel" => HubCommand::Operator(OperatorCommand::LearnTravelTimes),
        "clear-log" => HubCommand::Operator(OperatorCommand::ClearEventLog),
        _ => return None,
    };
    Some(cmd)
}

fn spawn_stdin_reader(tx: crossbeam_channel::Sender<HubCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_hub_command(&line) {
                Some(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                None => tracing::warn!(line = %line.trim(), "unknown command"),
            }
        }
        tracing::debug!("stdin closed");
    });
}

pub fn run(cfg: &doorctl_config::Config, seconds: Option<u64>, stdin: bool) -> Result<()> {
    let mut ctl = build_controller(cfg)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }
    if let Some(secs) = seconds {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            stop.store(true, Ordering::Relaxed);
        });
    }
    if stdin {
        spawn_stdin_reader(ctl.command_sender());
    }

    tracing::info!(units = ?ctl.unit_names(), "running");
    ctl.run_until(&stop);

    let door = ctl
        .door_state()
        .map_or_else(|| "Unknown".to_owned(), |d| format!("{d:?}"));
    let motor = ctl
        .motor_info()
        .map_or_else(|| "Unknown".to_owned(), |m| format!("{:?}", m.state));
    let markers = ctl.markers_summary().unwrap_or_default();
    if json_mode() {
        println!(
            "{}",
            json!({ "door": door, "motor": motor, "markers": markers })
        );
    } else {
        println!("door={door} motor={motor} markers={markers}");
    }
    Ok(())
}

pub fn self_check(cfg: &doorctl_config::Config) -> Result<()> {
    let echo = Arc::new(EchoCell::new());
    let (mut pins, _actuator) = open_hardware(cfg, &echo)?;
    let timeout = Duration::from_micros(u64::from(cfg.ranging.max_round_trip_us))
        + Duration::from_millis(20);
    let cm = doorctl_hardware::util::measure_blocking(
        &mut pins,
        &echo,
        cfg.ranging.us_per_cm,
        timeout,
    )
    .wrap_err("self-check measurement")?;
    if json_mode() {
        println!("{}", json!({ "self_check": "ok", "distance_cm": cm }));
    } else {
        println!("self-check ok: distance {cm} cm");
    }
    Ok(())
}

pub fn markers(cfg: &doorctl_config::Config, set: Option<&str>) -> Result<()> {
    let record = match set {
        Some(text) => {
            let record: CalibrationRecord = text.parse()?;
            let dir = cfg
                .storage
                .dir
                .as_deref()
                .ok_or_else(|| eyre::eyre!("markers --set needs [storage].dir in the config"))?;
            let mut store = open_store(dir)?;
            record.save(&mut store, &cfg.storage.key)?;
            tracing::info!(markers = %record, "markers stored");
            record
        }
        None => match cfg.storage.dir.as_deref() {
            Some(dir) => {
                let mut store = open_store(dir)?;
                CalibrationRecord::load_or_default(&mut store, &cfg.storage.key, default_record(cfg))
            }
            None => default_record(cfg),
        },
    };
    if json_mode() {
        println!(
            "{}",
            json!({
                "open": [record.open.min, record.open.max],
                "closed": [record.closed.min, record.closed.max],
                "markers": record.to_string(),
            })
        );
    } else {
        println!("{record}");
    }
    Ok(())
}

fn log_from_dump(path: &Path) -> Result<EventLog> {
    let rows = doorctl_config::load_position_dump(path)?;
    let mut log = EventLog::new(&EventLogCfg {
        capacity: rows.len().max(1),
        ..EventLogCfg::default()
    });
    for row in rows {
        let ts = u16::try_from(row.index).unwrap_or(u16::MAX);
        match EventCode::from_code(row.code) {
            Some(EventCode::Position) => log.add_position(ts, row.position, false),
            Some(EventCode::RawPosition) => log.add_position(ts, row.position, true),
            Some(code) => log.add_event(ts, code),
            None => tracing::warn!(index = row.index, code = row.code, "unknown event code"),
        }
    }
    Ok(log)
}

pub fn learn_range(
    cfg: &doorctl_config::Config,
    dump: &Path,
    side: Side,
    window: Option<usize>,
) -> Result<()> {
    let learn: LearnCfg = (&cfg.learning).into();
    let log = log_from_dump(dump)?;
    let window = window.unwrap_or(learn.learn_window).max(1);
    let stats = log
        .recent_position_std_dev(window)
        .ok_or_else(|| eyre::eyre!("dump holds no position samples"))?;
    let range = try_get_stop_position_range(&stats, &learn).ok_or_else(|| {
        eyre::eyre!(
            "positions too noisy to learn a range (sigma {:.2} >= {:.2})",
            stats.sigma,
            learn.sigma_ceiling
        )
    })?;

    let mut proposed = default_record(cfg);
    match side {
        Side::Open => proposed.open = range,
        Side::Closed => proposed.closed = range,
    }
    if let Err(e) = proposed.validate() {
        tracing::warn!(error = %e, "learned range conflicts with the configured markers");
    }

    let name = match side {
        Side::Open => "open",
        Side::Closed => "closed",
    };
    if json_mode() {
        println!(
            "{}",
            json!({
                "side": name,
                "min": range.min,
                "max": range.max,
                "mean": stats.mean,
                "sigma": stats.sigma,
                "count": stats.count,
            })
        );
    } else {
        println!(
            "{name}: {range} (mean {:.1}, sigma {:.2}, n {})",
            stats.mean, stats.sigma, stats.count
        );
    }
    Ok(())
}
