use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use drwatch_core::config::Config;
use drwatch_core::orchestrator::ExecutionDb;
use drwatch_core::remote::{HttpRemoteOps, InMemoryRemoteOps, RemoteOps};

pub const DB_FILE: &str = "executions.redb";

/// How long a foreground failover waits for another process to let go of
/// the store between steps.
const STORE_LOCK_PATIENCE: Duration = Duration::from_secs(10);

/// Where the CLI reads config from and keeps its execution store.
pub struct Setup {
    pub config_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub simulate: bool,
}

impl Setup {
    pub fn new(config_path: Option<PathBuf>, data_dir: Option<&Path>, simulate: bool) -> Self {
        Self {
            config_path,
            data_dir: resolve_data_dir(data_dir),
            simulate,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let path = self.config_path.as_deref();
        Config::load(path).with_context(|| match path {
            Some(p) => format!("failed to load config from {}", p.display()),
            None => "failed to load config".to_string(),
        })
    }

    pub fn open_db(&self) -> anyhow::Result<Arc<ExecutionDb>> {
        let path = self.data_dir.join(DB_FILE);
        let db = ExecutionDb::open(&path)
            .with_context(|| format!("failed to open execution store {}", path.display()))?;
        Ok(Arc::new(db))
    }

    /// Open the store for a single step, waiting if another `drwatch`
    /// process holds it.
    pub fn open_db_waiting(&self) -> drwatch_core::Result<ExecutionDb> {
        ExecutionDb::open_waiting(&self.data_dir.join(DB_FILE), STORE_LOCK_PATIENCE)
    }

    /// The control-plane adapter: scripted and healthy under `--simulate`,
    /// otherwise the HTTP gateway at `control_plane_url`.
    pub fn remote_ops(&self, cfg: &Config) -> anyhow::Result<Arc<dyn RemoteOps>> {
        if self.simulate {
            tracing::info!("using simulated control plane");
            return Ok(Arc::new(InMemoryRemoteOps::healthy(cfg, Utc::now())));
        }
        let ops = HttpRemoteOps::from_config(cfg).context("failed to build control-plane client")?;
        Ok(Arc::new(ops))
    }

    /// Like [`Self::remote_ops`] for commands that pick up executions left
    /// by earlier processes; a simulated control plane resumes from them.
    pub fn remote_ops_for(&self, cfg: &Config, db: &ExecutionDb) -> anyhow::Result<Arc<dyn RemoteOps>> {
        if self.simulate {
            tracing::info!("using simulated control plane");
            let ops = InMemoryRemoteOps::healthy(cfg, Utc::now());
            ops.resume(&db.list_all()?);
            return Ok(Arc::new(ops));
        }
        self.remote_ops(cfg)
    }
}

/// `--data-dir` / `DRWATCH_DATA_DIR` if given, else `.drwatch` under the
/// current directory.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join(".drwatch")
}
