use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use zeno::config::Config;
use zeno::engine::Engine;
use zeno::logger::Logger;

/// Start the reload engine and block until a termination signal arrives.
pub fn cmd_run(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::discover(&cwd)?,
    };
    let config = Config::load(&path)?;
    let logger = Logger::new(&config.log, verbose);

    // SIGINT and SIGTERM both request a graceful stop; the engine loop
    // notices the cleared flag and runs its stop sequence
    let running = Arc::new(AtomicBool::new(false));
    let signal_flag = running.clone();
    ctrlc::set_handler(move || {
        signal_flag.store(false, Ordering::SeqCst);
    })
    .expect("Error setting signal handler");

    let mut engine = Engine::new(config, logger, running);
    engine.run()?;

    Ok(())
}
