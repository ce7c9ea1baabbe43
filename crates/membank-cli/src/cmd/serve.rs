//! `membank serve`: run the HTTP API until Ctrl-C.

use crate::ui;
use membank_api::run_server;
use membank_kernel::Membank;
use membank_types::error::MembankResult;
use std::sync::Arc;

pub fn run(membank: Membank) -> MembankResult<()> {
    let listen = membank.config().api.listen.clone();
    let rt = tokio::runtime::Runtime::new()?;
    ui::success(&format!("Serving on http://{listen}"));
    ui::hint("Press Ctrl-C to stop");
    rt.block_on(run_server(Arc::new(membank)))
}
