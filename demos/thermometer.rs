//! Live Thingy:52 thermometer
//!
//! Run with: cargo run --example thermometer

use thingy52_ble::{DriverConfig, Error, Result, Thingy52Driver};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG, defaulting to warn)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("Thingy:52 Thermometer");
    println!("=====================\n");
    println!("Looking for a Thingy:52...\n");

    let driver = Thingy52Driver::with_btleplug(DriverConfig::default()).await?;

    let _connect = driver.on_connect(|device| {
        println!(
            "Connected to {} ({})",
            device.name().as_deref().unwrap_or("unnamed"),
            device.id()
        );
    });
    let _disconnect = driver.on_disconnect(|| println!("Disconnected"));
    let _battery = driver.on_battery(|level| println!("Battery: {}", level));
    let _temperature = driver.on_temperature_change(|reading| {
        println!(
            "Temperature: {:6.1}°C {:6.1}°F {:7.2}K",
            reading.celsius(),
            reading.fahrenheit(),
            reading.kelvin()
        );
    });

    driver.scan().await?;

    if let Some(Error::OptionalFeatureUnavailable { feature, reason }) =
        driver.last_optional_failure()
    {
        println!("No {} data on this system: {}", feature, reason);
    }

    println!("Press Ctrl+C to exit.\n");

    let mut events = driver.subscribe_events();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nExiting...");
                break;
            }
            event = events.recv() => {
                // Stop once the device goes away on its own
                if matches!(event, Ok(thingy52_ble::DriverEvent::Disconnect)) {
                    break;
                }
            }
        }
    }

    driver.disconnect();
    // Drop before the callback handles so the final disconnect is printed.
    drop(driver);

    Ok(())
}
