//! Linux powercap (Intel RAPL) energy counters.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::{EnergySource, Error, Result};

const DEFAULT_ROOT: &str = "/sys/class/powercap";

/// Top-level package zones are named `intel-rapl:<N>`; subzones add a further `:<M>`.
const ZONE_PREFIX: &str = "intel-rapl:";

const ENERGY_FILE: &str = "energy_uj";
const MAX_ENERGY_RANGE_FILE: &str = "max_energy_range_uj";

/// RAPL counters update roughly once per millisecond.
const REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Energy source backed by the Linux powercap interface to Intel RAPL counters.
///
/// The reading is the sum of all top-level package zones. Hardware counters wrap around after
/// reaching `max_energy_range_uj`; each zone keeps its own running total so the sum reported by
/// [`read_uj()`][EnergySource::read_uj] never decreases, as long as it is read at least once per
/// wrap-around period.
///
/// Reading the counters usually requires elevated privileges.
#[derive(Debug)]
pub struct Powercap {
    /// `None` once the source has been released.
    zones: Mutex<Option<Vec<Zone>>>,
}

impl Powercap {
    /// Opens the package zones under `/sys/class/powercap`.
    ///
    /// # Errors
    ///
    /// Returns an error if the powercap interface is missing, exposes no package zones or if
    /// any zone cannot be read.
    pub fn open() -> Result<Self> {
        Self::open_at(DEFAULT_ROOT)
    }

    /// Opens the package zones under a custom powercap root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exposes no package zones or if any zone cannot be read.
    pub fn open_at(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        let entries = fs::read_dir(root).map_err(|source| Error::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut zone_dirs = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_package_zone(path))
            .collect::<Vec<_>>();

        if zone_dirs.is_empty() {
            return Err(Error::NoEnergyZones {
                root: root.to_path_buf(),
            });
        }

        zone_dirs.sort();

        let zones = zone_dirs
            .iter()
            .map(|dir| Zone::open(dir))
            .collect::<Result<Vec<_>>>()?;

        debug!(root = %root.display(), zones = zones.len(), "opened powercap energy zones");

        Ok(Self {
            zones: Mutex::new(Some(zones)),
        })
    }
}

impl EnergySource for Powercap {
    fn source_name(&self) -> &'static str {
        "powercap"
    }

    fn read_uj(&self) -> Result<u64> {
        let mut zones = self.zones.lock().unwrap_or_else(PoisonError::into_inner);
        let zones = zones.as_mut().ok_or(Error::Released)?;

        let mut total_uj: u64 = 0;

        for zone in zones.iter_mut() {
            total_uj = total_uj.saturating_add(zone.update()?);
        }

        Ok(total_uj)
    }

    fn refresh_interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn release(&self) -> Result<()> {
        // Dropping the zones closes their counter files.
        self.zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        Ok(())
    }
}

fn is_package_zone(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .and_then(|name| name.strip_prefix(ZONE_PREFIX))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug)]
struct Zone {
    energy_path: PathBuf,
    energy_file: File,

    max_energy_range_uj: u64,

    last_raw_uj: u64,
    total_uj: u64,
}

impl Zone {
    fn open(dir: &Path) -> Result<Self> {
        let energy_path = dir.join(ENERGY_FILE);
        let energy_file = open_counter(&energy_path)?;

        let max_path = dir.join(MAX_ENERGY_RANGE_FILE);
        let max_energy_range_uj = read_counter(&open_counter(&max_path)?, &max_path)?;

        let initial_uj = read_counter(&energy_file, &energy_path)?;

        Ok(Self {
            energy_path,
            energy_file,
            max_energy_range_uj,
            last_raw_uj: initial_uj,
            total_uj: initial_uj,
        })
    }

    /// Reads the hardware counter and returns the updated running total.
    fn update(&mut self) -> Result<u64> {
        let raw_uj = read_counter(&self.energy_file, &self.energy_path)?;

        let delta_uj = if raw_uj >= self.last_raw_uj {
            raw_uj.wrapping_sub(self.last_raw_uj)
        } else {
            // The counter wrapped around. We cannot tell if it wrapped more than once.
            self.max_energy_range_uj
                .saturating_sub(self.last_raw_uj)
                .saturating_add(raw_uj)
        };

        self.last_raw_uj = raw_uj;
        self.total_uj = self.total_uj.saturating_add(delta_uj);

        Ok(self.total_uj)
    }
}

fn open_counter(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_counter(file: &File, path: &Path) -> Result<u64> {
    // sysfs attributes regenerate their content on every read from offset zero.
    let mut buffer = [0_u8; 32];

    let len = file.read_at(&mut buffer, 0).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = String::from_utf8_lossy(buffer.get(..len).unwrap_or_default());
    let text = text.trim();

    text.parse().map_err(|_| Error::Parse {
        path: path.to_path_buf(),
        value: text.to_string(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_zone(root: &Path, name: &str, energy_uj: u64, max_uj: u64) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ENERGY_FILE), format!("{energy_uj}\n")).unwrap();
        fs::write(dir.join(MAX_ENERGY_RANGE_FILE), format!("{max_uj}\n")).unwrap();
    }

    fn set_energy(root: &Path, name: &str, energy_uj: u64) {
        fs::write(root.join(name).join(ENERGY_FILE), format!("{energy_uj}\n")).unwrap();
    }

    #[test]
    fn package_zone_names() {
        assert!(is_package_zone(Path::new("/x/intel-rapl:0")));
        assert!(is_package_zone(Path::new("/x/intel-rapl:12")));
        assert!(!is_package_zone(Path::new("/x/intel-rapl:0:1")));
        assert!(!is_package_zone(Path::new("/x/intel-rapl")));
        assert!(!is_package_zone(Path::new("/x/intel-rapl:")));
        assert!(!is_package_zone(Path::new("/x/dtpm")));
    }

    #[test]
    fn sums_package_zones_and_ignores_subzones() {
        let root = TempDir::new().unwrap();
        write_zone(root.path(), "intel-rapl:0", 1000, 5000);
        write_zone(root.path(), "intel-rapl:0:0", 700, 5000);
        write_zone(root.path(), "intel-rapl:1", 200, 5000);

        let source = Powercap::open_at(root.path()).unwrap();

        assert_eq!(source.read_uj().unwrap(), 1200);
    }

    #[test]
    fn follows_counter_updates() {
        let root = TempDir::new().unwrap();
        write_zone(root.path(), "intel-rapl:0", 1000, 5000);

        let source = Powercap::open_at(root.path()).unwrap();
        set_energy(root.path(), "intel-rapl:0", 1500);

        assert_eq!(source.read_uj().unwrap(), 1500);
    }

    #[test]
    fn survives_wrap_around() {
        let root = TempDir::new().unwrap();
        write_zone(root.path(), "intel-rapl:0", 4900, 5000);

        let source = Powercap::open_at(root.path()).unwrap();
        assert_eq!(source.read_uj().unwrap(), 4900);

        set_energy(root.path(), "intel-rapl:0", 100);

        // 100 to reach the maximum, then another 100 after wrapping.
        assert_eq!(source.read_uj().unwrap(), 5100);
    }

    #[test]
    fn empty_root_has_no_zones() {
        let root = TempDir::new().unwrap();

        assert!(matches!(
            Powercap::open_at(root.path()),
            Err(Error::NoEnergyZones { .. })
        ));
    }

    #[test]
    fn missing_root_is_io_error() {
        let root = TempDir::new().unwrap();

        assert!(matches!(
            Powercap::open_at(root.path().join("nope")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn garbage_counter_is_parse_error() {
        let root = TempDir::new().unwrap();
        write_zone(root.path(), "intel-rapl:0", 1000, 5000);
        fs::write(root.path().join("intel-rapl:0").join(ENERGY_FILE), "lots\n").unwrap();

        assert!(matches!(
            Powercap::open_at(root.path()),
            Err(Error::Parse { value, .. }) if value == "lots"
        ));
    }

    #[test]
    fn read_after_release_fails() {
        let root = TempDir::new().unwrap();
        write_zone(root.path(), "intel-rapl:0", 1000, 5000);

        let source = Powercap::open_at(root.path()).unwrap();
        source.release().unwrap();
        source.release().unwrap();

        assert!(matches!(source.read_uj(), Err(Error::Released)));
    }
}
