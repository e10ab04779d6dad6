//! Command execution: hub wiring, cover assembly, and waiting for travel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use eyre::Report;
use serde_json::json;
use shutter_config::{Config, Device};
use shutter_core::mocks::NullStore;
use shutter_core::{CoilPair, ControllerCfg, Cover, CoverError, CoverEvent, TravelConfig};
use shutter_hardware::{ModbusTcpCoilWriter, SimulatedCoilBank};
use shutter_traits::{CoilWriter, PositionStore};

use crate::cli::{Cli, Commands};
use crate::state::JsonStateFile;

/// Env hook for tests: fail every simulated write to this coil address.
const SIM_FAIL_ENV: &str = "SHUTTER_TEST_SIM_FAIL";
/// Extra slack on top of the longest travel before the CLI gives up waiting.
const WAIT_SLACK: Duration = Duration::from_secs(2);
const EVENT_POLL: Duration = Duration::from_millis(50);

/// How a travel request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Stopped,
    Interrupted,
    AlreadyThere,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Stopped => "stopped",
            Outcome::Interrupted => "interrupted",
            Outcome::AlreadyThere => "unchanged",
        }
    }
}

pub fn execute(cli: &Cli, cfg: &Config, shutdown: &Arc<AtomicBool>) -> eyre::Result<()> {
    let json = cli.json;
    match &cli.cmd {
        Commands::List => {
            list(cfg, json);
            Ok(())
        }
        Commands::Status => status(cli, cfg),
        Commands::Stop(arg) => {
            let cover = assemble(cli, cfg, &arg.cover)?;
            cover.stop()?;
            report(&cover, Outcome::Stopped, Duration::ZERO, json);
            Ok(())
        }
        Commands::Open(arg) => travel(cli, cfg, &arg.cover, shutdown, |c| c.open()),
        Commands::Close(arg) => travel(cli, cfg, &arg.cover, shutdown, |c| c.close()),
        Commands::Set { target, position } => {
            let p = *position;
            travel(cli, cfg, &target.cover, shutdown, move |c| c.set_position(p))
        }
    }
}

fn travel(
    cli: &Cli,
    cfg: &Config,
    id: &str,
    shutdown: &Arc<AtomicBool>,
    request: impl FnOnce(&Cover) -> eyre::Result<()>,
) -> eyre::Result<()> {
    let cover = assemble(cli, cfg, id)?;
    let events = cover.subscribe();
    let started = Instant::now();

    if let Err(e) = request(&cover) {
        if matches!(e.downcast_ref::<CoverError>(), Some(CoverError::CommandFailed { .. })) {
            // The motor may be running on one coil; leave both released.
            if let Err(stop_err) = cover.stop() {
                tracing::error!(cover = id, error = %stop_err, "stop after failed command also failed");
            }
        }
        return Err(e);
    }

    let outcome = if cover.is_moving() {
        wait(&cover, &events, shutdown)?
    } else {
        Outcome::AlreadyThere
    };
    report(&cover, outcome, started.elapsed(), cli.json);
    Ok(())
}

fn wait(cover: &Cover, events: &xch::Receiver<CoverEvent>, shutdown: &AtomicBool) -> eyre::Result<Outcome> {
    let longest = cover.travel_up().max(cover.travel_down());
    let limit = Duration::from_secs_f64(longest * 1.5) + WAIT_SLACK;
    let deadline = Instant::now() + limit;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::warn!(cover = cover.id(), "interrupted; stopping");
            cover.stop()?;
            return Ok(Outcome::Interrupted);
        }
        if Instant::now() >= deadline {
            cover.stop()?;
            eyre::bail!("cover '{}' did not complete within {:.1} s", cover.id(), limit.as_secs_f64());
        }
        match events.recv_timeout(EVENT_POLL) {
            Ok(CoverEvent::TravelCompleted { after_failure, .. }) => {
                if after_failure {
                    tracing::warn!(cover = cover.id(), "travel completed by time only; a command failed");
                }
                return Ok(Outcome::Completed);
            }
            Ok(CoverEvent::TravelStopped { .. }) => return Ok(Outcome::Stopped),
            Ok(CoverEvent::PositionUpdated { position, .. }) => {
                tracing::debug!(cover = cover.id(), position, "progress");
            }
            Ok(CoverEvent::CommandFailed { error, .. }) => {
                tracing::warn!(cover = cover.id(), error = %error, "command failed");
            }
            Ok(CoverEvent::TravelStarted { .. }) | Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => {
                eyre::bail!("event channel closed while waiting for '{}'", cover.id());
            }
        }
    }
}

fn report(cover: &Cover, outcome: Outcome, elapsed: Duration, json: bool) {
    let state = cover.state();
    if json {
        println!(
            "{}",
            json!({
                "cover": state.id,
                "outcome": outcome.as_str(),
                "position": state.position,
                "is_closed": state.is_closed,
                "travel_up": state.attributes.travel_up_secs,
                "travel_down": state.attributes.travel_down_secs,
                "assumed_state": state.assumed_state,
                "duration_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            })
        );
    } else {
        let position = state
            .position
            .map_or_else(|| "unknown".to_string(), |p| format!("{p}%"));
        println!(
            "{}: {} at position {position} ({:.1} s)",
            state.id,
            outcome.as_str(),
            elapsed.as_secs_f64()
        );
    }
}

fn list(cfg: &Config, json: bool) {
    if json {
        let covers: Vec<_> = cfg
            .devices
            .iter()
            .map(|(id, d)| {
                json!({
                    "cover": id,
                    "name": d.display_name(id),
                    "slave": d.slave,
                    "coil_open": d.coil_open,
                    "coil_close": d.coil_close,
                    "travel_up": d.travel_up,
                    "travel_down": d.travel_down,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(covers));
        return;
    }
    if cfg.devices.is_empty() {
        println!("no covers configured");
    }
    for (id, d) in &cfg.devices {
        println!(
            "{id}\t{}\tslave={} open={} close={} up={}s down={}s",
            d.display_name(id),
            d.slave,
            d.coil_open,
            d.coil_close,
            d.travel_up,
            d.travel_down
        );
    }
}

fn status(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let store = open_store(cli, cfg)?;
    let mut rows = Vec::with_capacity(cfg.devices.len());
    for (id, d) in &cfg.devices {
        let position = store.load_last_position(id);
        rows.push((id, d, position));
    }
    if cli.json {
        let covers: Vec<_> = rows
            .iter()
            .map(|(id, d, position)| {
                json!({
                    "cover": id,
                    "name": d.display_name(id),
                    "position": position,
                    "is_closed": *position == Some(0),
                    "travel_up": d.travel_up,
                    "travel_down": d.travel_down,
                    "assumed_state": true,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(covers));
        return Ok(());
    }
    for (id, d, position) in rows {
        let shown = position.map_or_else(|| "unknown".to_string(), |p| format!("{p}%"));
        println!("{id}\t{}\tposition={shown}", d.display_name(id));
    }
    Ok(())
}

fn open_store(cli: &Cli, cfg: &Config) -> eyre::Result<Arc<dyn PositionStore + Send + Sync>> {
    let path = cli
        .state
        .clone()
        .or_else(|| cfg.state.file.as_ref().map(Into::into));
    let Some(path) = path else {
        tracing::debug!("no state file configured; positions are not persisted");
        return Ok(Arc::new(NullStore));
    };
    let names: BTreeMap<String, String> = cfg
        .devices
        .iter()
        .map(|(id, d)| (id.clone(), d.display_name(id).to_owned()))
        .collect();
    Ok(Arc::new(JsonStateFile::open(path, names)?))
}

/// One writer per hub, shared by every cover on it.
fn hub_writer(cli: &Cli, cfg: &Config) -> Box<dyn CoilWriter + Send> {
    if cli.sim {
        let mut bank = SimulatedCoilBank::new();
        for d in cfg.devices.values() {
            bank.add_interlock(d.slave, d.coil_open, d.coil_close);
        }
        let fail = std::env::var(SIM_FAIL_ENV).ok().and_then(|v| v.trim().parse::<u16>().ok());
        if let Some(addr) = fail {
            tracing::warn!(address = addr, "simulated coil failure injected");
        }
        bank.fail_address(fail);
        return Box::new(Arc::new(Mutex::new(bank)));
    }
    let hub = &cfg.hub;
    let writer = ModbusTcpCoilWriter::new(
        hub.name.clone(),
        &hub.host,
        hub.port,
        Duration::from_millis(hub.timeout_ms),
    );
    tracing::info!(hub = %hub.name, endpoint = writer.endpoint(), "using Modbus hub");
    Box::new(Arc::new(Mutex::new(writer)))
}

fn config_error(e: &Report) -> Report {
    Report::new(CoverError::Configuration(format!("{e:#}")))
}

fn build_cover(
    id: &str,
    device: &Device,
    hub: &str,
    writer: Box<dyn CoilWriter + Send>,
    store: Arc<dyn PositionStore + Send + Sync>,
    control: ControllerCfg,
) -> eyre::Result<Cover> {
    let travel = TravelConfig::try_from(device)?;
    Cover::builder()
        .with_id(id)
        .with_travel(travel)
        .with_coils(CoilPair::from_device(hub, device))
        .with_writer(writer)
        .with_store(store)
        .with_controller_cfg(control)
        .build()
}

fn assemble(cli: &Cli, cfg: &Config, id: &str) -> eyre::Result<Cover> {
    let device = cfg.device(id).map_err(|e| config_error(&e))?;
    let store = open_store(cli, cfg)?;
    let writer = hub_writer(cli, cfg);
    let cover = build_cover(id, device, &cfg.hub.name, writer, store, (&cfg.control).into())?;
    tracing::debug!(cover = id, position = ?cover.current_position(), "cover ready");
    Ok(cover)
}
