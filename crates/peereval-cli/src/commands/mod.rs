pub mod allocate;
pub mod backend;
pub mod config;
pub mod groups;
pub mod results;
pub mod roster;
pub mod window;

use std::future::Future;

/// Drive one async command to completion on a current-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
