use heart_rate_monitor::domain::models::{
    AdapterState, AppEvent, MessageSeverity, PeripheralHandle, StatusMessage,
};
use heart_rate_monitor::domain::registry::KnownPeripheralRegistry;
use heart_rate_monitor::domain::settings::{Settings, SettingsService};
use heart_rate_monitor::domain::sink::ChannelSink;
use heart_rate_monitor::infrastructure::bluetooth::{
    service, Decoder, HeartRateMonitor, SimulatedRadio, SimulatedStrap,
};
use heart_rate_monitor::infrastructure::logging;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

fn simulated_strap(settings: &Settings) -> SimulatedStrap {
    SimulatedStrap {
        peripheral: PeripheralHandle::new("sim-hrm-0001", Some(&settings.simulated_device_name)),
        base_bpm: settings.simulated_base_bpm,
        notify_interval: Duration::from_millis(settings.notify_interval_ms.max(10)),
        ..SimulatedStrap::default()
    }
}

fn print_event(event: AppEvent) {
    match event {
        AppEvent::HeartRate(measurement) => {
            let mut line = format!("Heart rate: {} bpm", measurement.bpm);
            if let Some(energy) = measurement.energy_expended_kj {
                line.push_str(&format!(", energy expended: {} kJ", energy));
            }
            let rr: Vec<String> = measurement
                .rr_intervals_ms()
                .map(|ms| format!("{:.0}", ms))
                .collect();
            if !rr.is_empty() {
                line.push_str(&format!(", RR: {} ms", rr.join("/")));
            }
            println!("{}", line);
        }
        AppEvent::BatteryLevel(percent) => println!("Battery: {}%", percent),
        AppEvent::BodySensorLocation(location) => println!("Sensor location: {:?}", location),
        AppEvent::DeviceInfo { field, value } => println!("{:?}: {}", field, value),
        AppEvent::Phase(phase) => info!("Monitor {}", phase),
        AppEvent::LogMessage(StatusMessage { message, severity }) => match severity {
            MessageSeverity::Error => error!("{}", message),
            MessageSeverity::Warning => warn!("{}", message),
            MessageSeverity::Info | MessageSeverity::Success => info!("{}", message),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings_service = SettingsService::new()?;

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Heart Rate Monitor");
    info!("Settings: {}", settings_service.path().display());

    let settings = settings_service.get().clone();
    let registry: KnownPeripheralRegistry = settings.known_peripherals.iter().collect();

    let (radio_tx, radio_rx) = mpsc::unbounded_channel();
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();

    let radio = SimulatedRadio::new(simulated_strap(&settings), radio_tx);
    radio.set_power_state(AdapterState::PoweredOn);

    let monitor = HeartRateMonitor::new(radio, Box::new(ChannelSink::new(app_tx)))
        .with_decoder(Decoder::new(settings.heart_rate_word_order))
        .with_registry(registry);
    let handle = service::spawn(monitor, radio_rx);
    handle.start()?;

    let deadline = tokio::time::sleep(Duration::from_secs(settings.demo_duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Demo finished");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = app_rx.recv() => match event {
                Some(event) => print_event(event),
                None => break,
            },
        }
    }

    let monitor = handle.shutdown().await?;

    settings_service.set_known_peripherals(monitor.registry().iter().map(|id| id.as_str()))?;
    info!(
        "Known peripherals: {}",
        settings_service.get().known_peripherals.len()
    );

    Ok(())
}
