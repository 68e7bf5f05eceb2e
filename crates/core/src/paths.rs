use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".aide"))
            .unwrap_or_else(|| PathBuf::from(".aide"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir().join("tasks.json")
    }

    pub fn workspace(&self) -> PathBuf {
        self.base.join("workspace")
    }

    /// Single-use script files written by the self-healing executor.
    pub fn scratch_dir(&self) -> PathBuf {
        self.workspace().join("scratch")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.workspace())?;
        std::fs::create_dir_all(self.scratch_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
