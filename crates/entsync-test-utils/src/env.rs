//! [`TestEnv`]: a throw-away system layout.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::payload::EntitlementBuilder;

/// Temporary directory laid out like the paths the engine manages.
pub struct TestEnv {
    temp_dir: TempDir,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn entitlement_dir(&self) -> PathBuf {
        self.root().join("etc/pki/entitlement")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root().join("var/lock/subsys/rhsm")
    }

    pub fn repo_config(&self) -> PathBuf {
        self.root().join("ostree/repo/config")
    }

    pub fn branded_name(&self) -> PathBuf {
        self.root().join("var/lib/rhsm/branded_name")
    }

    /// Place a certificate and its key in the entitlement directory.
    pub fn install(&self, cert: &EntitlementBuilder) -> PathBuf {
        let dir = self.entitlement_dir();
        fs::create_dir_all(&dir).unwrap();

        let cert_path = dir.join(format!("{}.pem", cert.serial()));
        fs::write(&cert_path, cert.cert_pem()).unwrap();
        fs::write(dir.join(format!("{}-key.pem", cert.serial())), cert.key_pem()).unwrap();
        cert_path
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content)
            .unwrap_or_else(|e| panic!("TestEnv::write: failed to write {}: {}", path.display(), e));
        path
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("TestEnv::read: failed to read {}: {}", path.display(), e))
    }

    /// Serials present in the entitlement directory, sorted.
    pub fn installed_serials(&self) -> Vec<u64> {
        let Ok(entries) = fs::read_dir(self.entitlement_dir()) else {
            return Vec::new();
        };
        let mut serials: Vec<u64> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".pem")
                    .filter(|stem| !stem.ends_with("-key"))
                    .and_then(|stem| stem.parse().ok())
            })
            .collect();
        serials.sort_unstable();
        serials
    }
}
