//! ipam-core CLI
//!
//! Thin entrypoint: logging, settings from the environment, then dispatch.

use ipam_core::{AppContext, run_with_ctrl_c};

#[tokio::main]
async fn main() {
    if let Err(e) = ipam_core::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    let context = AppContext::from_env();
    if let Err(e) = run_with_ctrl_c(std::env::args(), &context).await {
        ipam_core::log_error!("{:#}", e);
        std::process::exit(1);
    }
}
