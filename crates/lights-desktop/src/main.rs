use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use lights_core::adc::{AdcSensor, UnitRegistry};
use lights_core::battery::BatteryMonitor;
use lights_core::config::LightConfig;
use lights_core::fade::{FadeController, FadeRequest};
use lights_core::ledc::LedcOutput;
use lights_core::mailbox::{FadeSender, fade_mailbox};
use lights_core::wakelock::SleepInhibitor;
use log::LevelFilter;

mod log_capture;
mod mock_hw;
mod mock_hw_tui;

use mock_hw::{SharedSim, SimAdcBackend, SimAttribute, SimLedc, SimState, StdDelay};
use mock_hw_tui::MockHwTui;

/// The 60 s device period is too slow to watch
const SIM_BATTERY_PERIOD_MS: u32 = 2_000;
const ADC_NOISE_SEED: u64 = 2137;

fn main() -> anyhow::Result<()> {
    let (log_tx, log_rx) = mpsc::channel();
    log_capture::init(log_tx, LevelFilter::Debug);

    let mut config = LightConfig::default();
    config.battery.period_ms = SIM_BATTERY_PERIOD_MS;

    let sim: SharedSim = Arc::new(Mutex::new(SimState::new(&config)));
    let inhibitor = SleepInhibitor::new();
    let units = UnitRegistry::shared(SimAdcBackend::new(sim.clone(), ADC_NOISE_SEED));
    let (sender, receiver) = fade_mailbox();

    {
        let sim = sim.clone();
        let inhibitor = inhibitor.clone();
        let output_config = config.output.clone();
        let fade_config = config.fade.clone();
        thread::Builder::new().name("fade".to_string()).spawn(move || {
            let mut output = LedcOutput::new(SimLedc::new(sim), &output_config);
            match output.setup() {
                Ok(()) => output.dump_config(),
                Err(e) => log::error!("LEDC setup failed: {}", e),
            }

            let mut controller = FadeController::new(output, StdDelay, inhibitor, &fade_config);
            controller.run(receiver);
        })?;
    }

    {
        let sim = sim.clone();
        let sensor_config = config.battery_sensor.clone();
        let battery_config = config.battery.clone();
        thread::Builder::new().name("battery".to_string()).spawn(move || {
            let sensor = AdcSensor::new(&sensor_config);
            let mut monitor = BatteryMonitor::new(sensor, SimAttribute::new(sim), &battery_config);

            loop {
                if let Err(e) = monitor.source_mut().setup_shared(&units) {
                    log::error!("Battery ADC setup failed: {}", e);
                }
                monitor.tick();
                thread::sleep(std::time::Duration::from_millis(battery_config.period_ms.into()));
            }
        })?;
    }

    let requests = spawn_trigger_source(sender)?;

    mock_hw_tui::run(MockHwTui {
        sim,
        inhibitor,
        requests,
        logs: log_rx,
    })?;

    Ok(())
}

/// Forward TUI requests into the fade mailbox from their own thread
///
/// Sending blocks while a transition is running; the TUI must keep drawing.
fn spawn_trigger_source(sender: FadeSender) -> anyhow::Result<Sender<FadeRequest>> {
    let (tx, rx) = mpsc::channel::<FadeRequest>();
    thread::Builder::new().name("trigger".to_string()).spawn(move || {
        for request in rx {
            if let Err(e) = sender.send(request) {
                log::error!("{}", e);
                return;
            }
        }
    })?;
    Ok(tx)
}
