//! Minimal interactive session: print the endpoint and wait for Ctrl+C.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use arctl_core::runtime::InteractiveSession;

pub struct WaitForInterrupt;

#[async_trait]
impl InteractiveSession for WaitForInterrupt {
    async fn run(&self, endpoint: &str, cancel: &CancellationToken) -> Result<()> {
        println!("Agent is running at {endpoint}");
        println!("Press Ctrl+C to stop.");
        cancel.cancelled().await;
        println!();
        Ok(())
    }
}

/// Token cancelled on the first Ctrl+C.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received");
            trigger.cancel();
        }
    });
    token
}
