//! Providers command implementation

use anyhow::Result;
use candle_fetch::DataSource;

pub fn run() -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("SUPPORTED PROVIDERS");
    println!("{}", "=".repeat(60));
    println!("{:<20} {:>10} {:>12}   {}", "ID", "PAGE CAP", "THROTTLE", "FILE PREFIX");

    for source in DataSource::ALL {
        let cap = source
            .page_cap()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:>10} {:>10}ms   {}",
            source.to_string(),
            cap,
            source.default_request_interval().as_millis(),
            source.file_prefix()
        );
    }

    println!("{}", "=".repeat(60));
    println!("Throttles can be overridden per provider with min_request_interval_ms in the config file.");

    Ok(())
}
