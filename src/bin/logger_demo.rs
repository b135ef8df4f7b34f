use wayfarer::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "wayfarer=trace,info".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!(target: "wayfarer::demo", "session trace log");
    debug!("application debug log");
    info!("application info log");

    let is_err = logger
        .reload_from_config(&LogConfig {
            filter: "=not a filter=".to_string(),
        })
        .is_err();
    info!(is_err, "reload with invalid filter");

    Ok(())
}
