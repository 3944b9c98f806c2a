use std::env;
use std::sync::Arc;

use fujitsu_hvac::{Coordinator, FujitsuClient, HvacMode, WireFormat};

#[tokio::main]
async fn main() -> fujitsu_hvac::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let url = args
        .get(1)
        .expect("usage: monitor <url> [--csv] [--user <name> --password <pass>]");
    let use_csv = args.iter().any(|a| a == "--csv");
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let mut builder = FujitsuClient::builder(url.as_str());
    if use_csv {
        builder = builder.format(WireFormat::Csv);
    }
    if let (Some(user), Some(pass)) = (flag("--user"), flag("--password")) {
        builder = builder.credentials(user, pass);
    }
    let client = Arc::new(builder.build()?);

    let coordinator = Coordinator::new(client, fujitsu_hvac::DEFAULT_SCAN_INTERVAL)
        .on_update(|units| {
            for unit in units {
                println!(
                    "[{}] {} | mode: {:?} | fan: {:?} | louver: {}",
                    unit.identity,
                    unit.target_temperature,
                    HvacMode::from_state(unit),
                    unit.fan_speed,
                    unit.louver,
                );
            }
        })
        .on_unavailable(|err| {
            eprintln!("Poll error: {err}");
        });

    println!("Polling {url} every {:?}...", coordinator.interval());
    coordinator.run().await;
    Ok(())
}
