use std::path::{Path, PathBuf};

use fieldstock_engine::{EngineError, InventoryStore, logging};
use fieldstock_storage::StoreConfig;
use tempfile::TempDir;

use crate::TestTechnician;

/// A shared on-disk inventory database. Every technician opened from the
/// depot gets its own connection to the same file.
pub struct TestDepot {
    dir: TempDir,
    path: PathBuf,
}

impl TestDepot {
    pub fn new() -> std::io::Result<Self> {
        logging::init_for_tests();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("inventory.db");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::at(&self.path)
    }

    pub fn open_store(&self) -> Result<InventoryStore, EngineError> {
        InventoryStore::open(&self.config())
    }

    pub fn technician(&self, site: &str) -> Result<TestTechnician, EngineError> {
        Ok(TestTechnician::new(self.open_store()?, site))
    }
}
