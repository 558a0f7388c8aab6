//! Free-space gate for the destination volume

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::ui;

/// Capacity and free space of a volume, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStat {
    pub total: u64,
    pub available: u64,
}

impl DiskStat {
    /// Available / total, clamped to [0, 1]; 0 for an empty volume
    pub fn free_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.available as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// Free space as a percentage rounded to two decimals
    pub fn free_percent(&self) -> f64 {
        (self.free_ratio() * 100.0 * 100.0).round() / 100.0
    }
}

/// Source of volume statistics
pub trait VolumeProbe {
    fn stat(&self, path: &Path) -> Result<DiskStat>;
}

/// Probe backed by `statvfs(3)`
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

#[cfg(unix)]
impl VolumeProbe for StatvfsProbe {
    fn stat(&self, path: &Path) -> Result<DiskStat> {
        use std::ffi::CString;
        use std::mem::MaybeUninit;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .with_context(|| format!("Invalid path: {}", path.display()))?;

        // SAFETY: statvfs is a standard POSIX call. We check the return value
        // before reading the result.
        unsafe {
            let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
            let result = libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr());

            if result != 0 {
                return Err(std::io::Error::last_os_error())
                    .with_context(|| format!("statvfs failed for {}", path.display()));
            }

            let stat = stat.assume_init();

            Ok(DiskStat {
                total: u64::from(stat.f_blocks) * stat.f_frsize,
                available: u64::from(stat.f_bavail) * stat.f_frsize,
            })
        }
    }
}

#[cfg(not(unix))]
impl VolumeProbe for StatvfsProbe {
    fn stat(&self, _path: &Path) -> Result<DiskStat> {
        anyhow::bail!("Disk space detection not supported on this platform")
    }
}

/// Result of one guard check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardStatus {
    pub stat: DiskStat,
    pub free_percent: f64,
    pub ok: bool,
}

/// Checks that the destination volume keeps more than a minimum of free space.
pub struct DiskGuard {
    probe: Box<dyn VolumeProbe>,
    volume: PathBuf,
    min_free_percent: f64,
}

impl DiskGuard {
    /// Guard the volume holding `volume` using `statvfs`.
    pub fn new(volume: impl Into<PathBuf>, min_free_percent: f64) -> Self {
        Self::with_probe(Box::new(StatvfsProbe), volume, min_free_percent)
    }

    pub fn with_probe(
        probe: Box<dyn VolumeProbe>,
        volume: impl Into<PathBuf>,
        min_free_percent: f64,
    ) -> Self {
        Self {
            probe,
            volume: volume.into(),
            min_free_percent,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.min_free_percent
    }

    /// Stat the volume and compare against the threshold.
    ///
    /// `ok` only when the rounded percentage is strictly above the threshold.
    /// A destination that does not exist yet is measured on its nearest
    /// existing ancestor. A stat failure is an error, never a pass.
    pub fn check(&self) -> Result<GuardStatus> {
        let target = existing_ancestor(&self.volume);
        if target != self.volume {
            log::debug!(
                "{} does not exist, measuring {}",
                self.volume.display(),
                target.display()
            );
        }
        let stat = self
            .probe
            .stat(target)
            .with_context(|| format!("Could not read free space of {}", target.display()))?;

        let free_percent = stat.free_percent();
        let status = GuardStatus {
            stat,
            free_percent,
            ok: free_percent > self.min_free_percent,
        };

        let line = format!(
            "Disk free space: {:.2}% ({:.2} GB)",
            free_percent,
            ui::gigabytes(stat.available)
        );
        log::debug!("{} on {}", line, self.volume.display());
        if status.ok {
            ui::dim(&line);
        } else {
            ui::warn(&line);
        }

        Ok(status)
    }
}

/// Closest path at or above `path` that exists, or `path` itself
fn existing_ancestor(path: &Path) -> &Path {
    path.ancestors()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .find(|p| p.exists())
        .unwrap_or(path)
}
