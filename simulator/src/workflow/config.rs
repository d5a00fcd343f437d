use crate::generator::route::RouteConfig;
use anyhow::Context;
use potholecore::CoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub core: CoreConfig,
    pub route: RouteConfig,
    pub bridge_address: SocketAddr,
    pub summary_log_path: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            route: RouteConfig::default(),
            bridge_address: SocketAddr::from(([127, 0, 0, 1], 9000)),
            summary_log_path: PathBuf::from("data/run_summary.log"),
        }
    }
}

impl RunnerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading runner config {}", path_ref.display()))?;
        let config: RunnerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing runner config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Command-line values win over the file.
    pub fn with_overrides(
        mut self,
        radius_meters: Option<f64>,
        points: Option<usize>,
        seed: Option<u64>,
    ) -> Self {
        if let Some(radius) = radius_meters {
            self.core.duplicate_radius_meters = radius;
        }
        if let Some(points) = points {
            self.route.points = points;
        }
        if let Some(seed) = seed {
            self.route.seed = seed;
        }
        self
    }
}
