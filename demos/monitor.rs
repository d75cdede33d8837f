use std::env;
use std::time::Duration;

use salus_it500::projection::{CURRENT_TEMPERATURE, HEATING, TARGET_TEMPERATURE};
use salus_it500::{Config, PollOutcome, SalusClient, SharedThermostat};

const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> salus_it500::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => {
            let mut config = Config::new(
                env::var("SALUS_USERNAME").unwrap_or_default(),
                env::var("SALUS_PASSWORD").unwrap_or_default(),
                env::var("SALUS_DEVICE_ID").unwrap_or_default(),
            );
            if let Ok(name) = env::var("SALUS_NAME") {
                config.name = name;
            }
            config
        }
    };

    let client = SalusClient::from_config(&config)?
        .on_event(|event| println!("{event:?}"))
        .build()?;
    let thermostat = SharedThermostat::new(client);
    let identity = thermostat.identity().clone();

    println!("Connecting to {}...", identity.device_id);
    if let PollOutcome::Failed(e) = thermostat.initialize().await {
        eprintln!("Initial poll failed: {e}");
    }

    loop {
        let state = thermostat.state();
        let current = thermostat.read(&CURRENT_TEMPERATURE);
        let target = thermostat.read(&TARGET_TEMPERATURE);
        let heating = thermostat.read(&HEATING);
        println!(
            "[{}] {:?}\u{00b0}C -> {:?}\u{00b0}C | mode: {} | heating: {:?}{}",
            identity.name,
            current.value,
            target.value,
            state.mode,
            heating.value,
            if current.stale { " | OFFLINE" } else { "" },
        );

        tokio::time::sleep(POLL_INTERVAL).await;
        if let PollOutcome::Failed(e) = thermostat.poll().await {
            eprintln!("Poll error: {e}");
        }
    }
}
