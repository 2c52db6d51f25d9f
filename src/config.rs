//! Backend selection.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::db::{self, PgKv};
use crate::error::Result;
use crate::kv::{DirectoryKv, KvStore};

pub const DEFAULT_STORE_DIR: &str = ".campus-feedback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres { database_url: String },
    Directory { path: PathBuf },
}

impl StoreConfig {
    /// A database URL wins over a directory; with neither, the default directory is used.
    pub fn resolve(database_url: Option<String>, store_dir: Option<PathBuf>) -> Self {
        match (database_url.filter(|u| !u.trim().is_empty()), store_dir) {
            (Some(database_url), _) => StoreConfig::Postgres { database_url },
            (None, Some(path)) => StoreConfig::Directory { path },
            (None, None) => StoreConfig::Directory {
                path: PathBuf::from(DEFAULT_STORE_DIR),
            },
        }
    }

    pub async fn open(&self) -> Result<Arc<dyn KvStore>> {
        match self {
            StoreConfig::Postgres { database_url } => {
                let pool = db::connect(database_url).await?;
                db::init_db(&pool).await?;
                info!("using postgres feedback store");
                Ok(Arc::new(PgKv::new(pool)))
            }
            StoreConfig::Directory { path } => {
                let kv = DirectoryKv::open(path).await?;
                info!(dir = %path.display(), "using directory feedback store");
                Ok(Arc::new(kv))
            }
        }
    }
}
