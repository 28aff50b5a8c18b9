use std::error::Error;
use std::thread;

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::Pin;
use lights_core::adc::{AdcSensor, SharedRegistry, UnitRegistry};
use lights_core::battery::BatteryMonitor;
use lights_core::config::LightConfig;
use lights_core::fade::FadeController;
use lights_core::ledc::LedcOutput;
use lights_core::mailbox::{fade_mailbox, FadeReceiver};
use lights_core::wakelock::SleepInhibitor;

mod peripherals;

use peripherals::{
    BatteryAttribute, ButtonDriver, EspAdcBackend, EspLedc, PowerConfig, PowerControl, StatusLed,
    SystemPeripherals,
};

const BUTTON_POLL_MS: u32 = 20;

fn main() {
    // It is necessary to call this function once. Otherwise, some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("Lights starting...");

    if let Err(e) = run() {
        log::error!("Lights stopped: {}", e);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    // LEDC and ADC1 are driven through raw driver calls; their singletons
    // stay bound here so nothing else claims them.
    let SystemPeripherals {
        button,
        status_led,
        light,
        battery: _battery,
    } = SystemPeripherals::take()?;
    let mut config = LightConfig::default();
    config.output.gpio = light.pin.pin();

    let inhibitor = match PowerControl::new(&PowerConfig::default()) {
        Ok(power) => SleepInhibitor::with_power_lock(power),
        Err(e) => {
            log::warn!("Power management unavailable: {}", e);
            SleepInhibitor::new()
        }
    };
    let units = UnitRegistry::shared(EspAdcBackend::new());
    let (sender, receiver) = fade_mailbox();

    spawn_fade_task(&config, inhibitor, receiver)?;
    spawn_battery_task(&config, units, BatteryAttribute::default())?;

    // The main task watches the button.
    let mut status_led = StatusLed::new(status_led, false)?;
    let mut button = ButtonDriver::new(button)?;
    loop {
        button.poll(&sender, &mut status_led)?;
        FreeRtos::delay_ms(BUTTON_POLL_MS);
    }
}

fn spawn_fade_task(
    config: &LightConfig,
    inhibitor: SleepInhibitor,
    receiver: FadeReceiver,
) -> Result<(), Box<dyn Error>> {
    let output_config = config.output.clone();
    let fade_config = config.fade.clone();

    thread::Builder::new()
        .name("fade".to_string())
        .stack_size(4096)
        .spawn(move || {
            let mut output = LedcOutput::new(EspLedc::new(), &output_config);
            match output.setup() {
                Ok(()) => output.dump_config(),
                Err(e) => log::error!("LEDC setup failed: {}", e),
            }

            let mut controller = FadeController::new(output, FreeRtos, inhibitor, &fade_config);
            controller.run(receiver);
        })?;
    Ok(())
}

fn spawn_battery_task(
    config: &LightConfig,
    units: SharedRegistry<EspAdcBackend>,
    attribute: BatteryAttribute,
) -> Result<(), Box<dyn Error>> {
    let sensor_config = config.battery_sensor.clone();
    let battery_config = config.battery.clone();

    thread::Builder::new()
        .name("battery".to_string())
        .stack_size(4096)
        .spawn(move || {
            let sensor = AdcSensor::new(&sensor_config);
            let mut monitor = BatteryMonitor::new(sensor, attribute, &battery_config);

            loop {
                if let Err(e) = monitor.source_mut().setup_shared(&units) {
                    log::error!("Battery ADC setup failed: {}", e);
                }
                monitor.tick();
                FreeRtos::delay_ms(battery_config.period_ms);
            }
        })?;
    Ok(())
}
