pub mod model;
pub mod routes;

use anyhow::Context;
use log::{info, warn};
use potholecore::pipeline::DetectionPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio::signal;

/// Read-only HTTP view over the recorded potholes.
pub struct QueryBridge {
    pipeline: Arc<DetectionPipeline>,
    address: SocketAddr,
}

impl QueryBridge {
    pub fn new(pipeline: Arc<DetectionPipeline>, address: SocketAddr) -> Self {
        Self { pipeline, address }
    }

    /// Blocks on the bridge until Ctrl+C.
    pub fn serve_until_ctrl_c(self) -> anyhow::Result<()> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for the query bridge")?;
        let Self { pipeline, address } = self;

        runtime.block_on(async move {
            let (bound, server) = warp::serve(routes::routes(pipeline))
                .try_bind_with_graceful_shutdown(address, async {
                    if let Err(err) = signal::ctrl_c().await {
                        warn!("could not listen for Ctrl+C: {}", err);
                    }
                })
                .with_context(|| format!("binding query bridge to {address}"))?;
            info!("query bridge listening on http://{}", bound);
            server.await;
            info!("query bridge stopped");
            Ok::<(), anyhow::Error>(())
        })
    }
}
