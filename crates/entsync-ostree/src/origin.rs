//! Booted deployment origin updates
//!
//! On a host booted from an ostree deployment, the deployment's origin file
//! names the remote it upgrades from. After the remotes are replaced, the
//! origin refspec is pointed at the new remote so upgrades keep working.
//! Hosts that are not booted from a deployment are skipped.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::RemoteEntry;
use crate::repo_file::{OriginFile, replace_refspec_remote};

static OSTREE_KARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)ostree=(?P<path>\S+)").unwrap());

/// Locates the origin file of the booted deployment.
pub trait DeploymentInspector: Send + Sync {
    /// `None` when the host is not booted from an ostree deployment.
    fn booted_origin(&self) -> Result<Option<PathBuf>>;
}

/// Finds the booted deployment from the kernel command line.
///
/// The `ostree=` argument names a boot link under the sysroot that resolves
/// to `/ostree/deploy/<os>/deploy/<checksum>.<serial>`; the origin file sits
/// next to it as `<checksum>.<serial>.origin`.
#[derive(Debug, Clone)]
pub struct OstreeSysroot {
    sysroot: PathBuf,
    booted_marker: PathBuf,
    cmdline: PathBuf,
}

impl Default for OstreeSysroot {
    fn default() -> Self {
        Self {
            sysroot: PathBuf::from("/"),
            booted_marker: PathBuf::from("/run/ostree-booted"),
            cmdline: PathBuf::from("/proc/cmdline"),
        }
    }
}

impl OstreeSysroot {
    pub fn new(
        sysroot: impl Into<PathBuf>,
        booted_marker: impl Into<PathBuf>,
        cmdline: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sysroot: sysroot.into(),
            booted_marker: booted_marker.into(),
            cmdline: cmdline.into(),
        }
    }

    fn deployment_dir(&self, boot_path: &str) -> Result<PathBuf> {
        let link = self.sysroot.join(boot_path.trim_start_matches('/'));
        link.canonicalize().map_err(|e| Error::Deployment {
            message: format!("{}: {}", link.display(), e),
        })
    }
}

impl DeploymentInspector for OstreeSysroot {
    fn booted_origin(&self) -> Result<Option<PathBuf>> {
        if !self.booted_marker.exists() {
            tracing::debug!(marker = %self.booted_marker.display(), "Not booted from an ostree deployment");
            return Ok(None);
        }

        let cmdline = entsync_fs::io::read_text(&self.cmdline)?;
        let boot_path = OSTREE_KARG
            .captures(&cmdline)
            .and_then(|caps| caps.name("path"))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::Deployment {
                message: format!("no ostree= argument in {}", self.cmdline.display()),
            })?;

        let deployment = self.deployment_dir(&boot_path)?;
        Ok(Some(origin_path_for(&deployment)))
    }
}

fn origin_path_for(deployment: &Path) -> PathBuf {
    let name = deployment
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    deployment.with_file_name(format!("{}.origin", name))
}

/// What an origin update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginUpdate {
    pub origin: PathBuf,
    pub refspec: String,
    /// False when the refspec already pointed at the remote
    pub changed: bool,
}

/// Rewrites the booted deployment's refspec to use the configured remote.
pub struct OriginUpdater<'a> {
    inspector: &'a dyn DeploymentInspector,
}

impl<'a> OriginUpdater<'a> {
    pub fn new(inspector: &'a dyn DeploymentInspector) -> Self {
        Self { inspector }
    }

    /// Point the origin at the first of `remotes`.
    ///
    /// Returns `None` when there is no booted deployment or no remote.
    pub fn run(&self, remotes: &[RemoteEntry]) -> Result<Option<OriginUpdate>> {
        let Some(first) = remotes.first() else {
            tracing::debug!("No remotes configured, leaving origin alone");
            return Ok(None);
        };
        let Some(origin_path) = self.inspector.booted_origin()? else {
            return Ok(None);
        };

        if remotes.len() > 1 {
            tracing::warn!(
                count = remotes.len(),
                remote = %first.name,
                "Multiple remotes configured, using the first for the origin"
            );
        }

        tracing::debug!(path = %origin_path.display(), "Loading ostree origin file");
        let mut origin = OriginFile::load(&origin_path)?;
        let old_refspec = origin.refspec()?.to_string();
        let new_refspec = replace_refspec_remote(&old_refspec, &first.name);

        let changed = new_refspec != old_refspec;
        if changed {
            tracing::info!(
                path = %origin_path.display(),
                old = %old_refspec,
                new = %new_refspec,
                "Updating origin refspec"
            );
            origin.set_refspec(&new_refspec);
            origin.save()?;
        } else {
            tracing::debug!(path = %origin_path.display(), "No change to origin refspec");
        }

        Ok(Some(OriginUpdate {
            origin: origin_path,
            refspec: new_refspec,
            changed,
        }))
    }
}
