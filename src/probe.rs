//! Host and block-device discovery
//!
//! Reads firmware mode, memory, CPU count, distribution and candidate block
//! devices straight from procfs/sysfs. No shelling out.
//!
//! # Design
//!
//! - **Never fails**: a missing fact falls back to a documented default and
//!   is recorded in `HostFacts::degraded` (and logged at `warn`), so a
//!   degraded probe is distinguishable from a healthy one.
//! - **Relocatable root**: `LinuxProbe::with_root` reads a fixture tree
//!   instead of `/`, which is how the tests exercise it.
//! - **Deterministic**: devices are sorted by name.
//! - **In-use detection** covers the mount table, mdstat, sysfs holders
//!   (dm-crypt, LVM, md) and udev's record of ZFS pool labels, so a disk
//!   reached only through `/dev/mapper/...` or an imported pool is still seen.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Placeholder model string for devices whose model is unreadable.
pub const UNKNOWN_MODEL: &str = "Unknown";

/// Physical block size assumed when sysfs does not report one.
pub const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Kernel name prefixes of virtual block devices that are never offered.
const VIRTUAL_PREFIXES: &[&str] = &["loop", "ram", "zram", "dm-", "zd", "nbd"];

/// Optical drives are block devices but never install targets.
const OPTICAL_PREFIX: &str = "sr";

/// `ID_FS_TYPE` udev assigns to partitions carrying a ZFS label.
const ZFS_MEMBER_FS_TYPE: &str = "zfs_member";

/// Detected firmware mode of the system.
///
/// The kernel exposes `/sys/firmware/efi` only when booted through UEFI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FirmwareMode {
    Efi,
    Bios,
}

impl FirmwareMode {
    pub fn is_efi(self) -> bool {
        matches!(self, Self::Efi)
    }
}

impl fmt::Display for FirmwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Efi => write!(f, "EFI"),
            Self::Bios => write!(f, "BIOS"),
        }
    }
}

/// Facts about the host, computed once per wizard session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostFacts {
    pub firmware: FirmwareMode,
    /// Total memory in whole GiB, floor-divided
    pub ram_gb: u64,
    pub cpu_count: usize,
    pub distro: String,
    pub distro_version: String,
    /// Names of facts that could not be read and were defaulted
    pub degraded: Vec<String>,
}

impl HostFacts {
    /// Returns true if every fact was read from its source.
    pub fn is_healthy(&self) -> bool {
        self.degraded.is_empty()
    }
}

impl fmt::Display for HostFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Firmware: {}, RAM: {} GB, CPUs: {}, Distro: {} {}",
            self.firmware,
            self.ram_gb,
            self.cpu_count,
            self.distro,
            self.distro_version
        )
    }
}

/// Coarse device class shown next to each drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    Nvme,
    Ssd,
    Hdd,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvme => write!(f, "NVMe"),
            Self::Ssd => write!(f, "SSD"),
            Self::Hdd => write!(f, "HDD"),
        }
    }
}

/// A discovered, non-virtual block device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDevice {
    /// Kernel name, e.g. `sda` or `nvme0n1`
    pub name: String,
    pub size_bytes: u64,
    pub model: String,
    pub rotational: bool,
    pub physical_block_size: u32,
}

impl BlockDevice {
    /// NVMe is recognised by name; otherwise the rotational flag decides.
    pub fn kind(&self) -> DeviceKind {
        if self.name.starts_with("nvme") {
            DeviceKind::Nvme
        } else if self.rotational {
            DeviceKind::Hdd
        } else {
            DeviceKind::Ssd
        }
    }

    /// One-line label for device pickers.
    pub fn display_line(&self) -> String {
        let model: String = self.model.chars().take(20).collect();
        format!(
            "{:<12} ({:>6}  {:<20}  {})",
            self.name,
            crate::types::format_size(self.size_bytes),
            model,
            self.kind()
        )
    }
}

/// A kernel holder of a disk or partition, from `sys/block/.../holders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holder {
    /// The held disk or partition, e.g. `sdb2`
    pub device: String,
    /// Kernel name of the holder, e.g. `dm-0` or `md127`
    pub holder: String,
    /// Device-mapper name (`cryptroot`, `vg-root`) when the holder has one
    pub mapper_name: Option<String>,
}

impl Holder {
    /// `cryptroot (dm-0)`, or just the kernel name.
    pub fn label(&self) -> String {
        match &self.mapper_name {
            Some(name) => format!("{} ({})", name, self.holder),
            None => self.holder.clone(),
        }
    }
}

/// Host resources that may conflict with the installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostUsage {
    /// Names of imported ZFS pools
    pub pools: Vec<String>,
    /// `(device, mountpoint)` pairs from the mount table, `/dev/` stripped
    pub mounts: Vec<(String, String)>,
    /// `(member, array)` pairs from mdstat, e.g. `("sda1", "md0")`
    pub raid_members: Vec<(String, String)>,
    /// Holders of every discovered disk and partition
    pub holders: Vec<Holder>,
    /// `(device, pool)` pairs for disks and partitions labelled as ZFS
    /// pool members, imported or not
    pub zfs_members: Vec<(String, String)>,
}

impl HostUsage {
    /// Mountpoints backed by `device` or one of its partitions.
    pub fn mountpoints_of(&self, device: &str) -> Vec<&str> {
        self.mounts
            .iter()
            .filter(|(source, _)| is_same_or_partition(device, source))
            .map(|(_, target)| target.as_str())
            .collect()
    }

    /// md arrays that `device` or one of its partitions belongs to.
    pub fn raid_arrays_of(&self, device: &str) -> Vec<&str> {
        self.raid_members
            .iter()
            .filter(|(member, _)| is_same_or_partition(device, member))
            .map(|(_, array)| array.as_str())
            .collect()
    }

    /// Holders of `device` or one of its partitions.
    pub fn holders_of(&self, device: &str) -> Vec<&Holder> {
        self.holders
            .iter()
            .filter(|h| is_same_or_partition(device, &h.device))
            .collect()
    }

    /// Imported pools that `device` or one of its partitions belongs to.
    pub fn imported_pools_of(&self, device: &str) -> Vec<&str> {
        let mut pools: Vec<&str> = self
            .zfs_members
            .iter()
            .filter(|(member, pool)| {
                is_same_or_partition(device, member) && self.pools.contains(pool)
            })
            .map(|(_, pool)| pool.as_str())
            .collect();
        pools.sort_unstable();
        pools.dedup();
        pools
    }
}

/// Provider of host facts consumed by the wizard.
pub trait SystemProbe {
    fn host_facts(&self) -> HostFacts;
    fn block_devices(&self) -> Vec<BlockDevice>;
    fn host_usage(&self) -> HostUsage;
}

/// Returns true for loopback, RAM-disk, device-mapper, zvol and NBD names.
pub fn is_virtual_device(name: &str) -> bool {
    VIRTUAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Returns true if `candidate` is `device` itself or one of its partitions
/// (`sda` → `sda1`, `nvme0n1` → `nvme0n1p2`).
pub fn is_same_or_partition(device: &str, candidate: &str) -> bool {
    let Some(rest) = candidate.strip_prefix(device) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    let digits = if device.ends_with(|c: char| c.is_ascii_digit()) {
        match rest.strip_prefix('p') {
            Some(d) => d,
            None => return false,
        }
    } else {
        rest
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Probe backed by the Linux procfs/sysfs layout.
#[derive(Debug, Clone)]
pub struct LinuxProbe {
    root: PathBuf,
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxProbe {
    /// Probe the running system.
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Probe a filesystem tree laid out like `/` (fixtures, chroots).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.path(relative)).ok()
    }

    fn detect_firmware(&self) -> FirmwareMode {
        if self.path("sys/firmware/efi").exists() {
            FirmwareMode::Efi
        } else {
            FirmwareMode::Bios
        }
    }

    fn detect_ram_gb(&self) -> Option<u64> {
        let meminfo = self.read("proc/meminfo")?;
        let kb = meminfo
            .lines()
            .find(|line| line.starts_with("MemTotal:"))?
            .split_whitespace()
            .nth(1)?
            .parse::<u64>()
            .ok()?;
        Some(kb / 1024 / 1024)
    }

    fn detect_cpu_count(&self) -> Option<usize> {
        let cpuinfo = self.read("proc/cpuinfo")?;
        let count = cpuinfo
            .lines()
            .filter(|line| {
                line.split(':')
                    .next()
                    .is_some_and(|key| key.trim() == "processor")
            })
            .count();
        (count > 0).then_some(count)
    }

    fn detect_distro(&self) -> Option<(String, String)> {
        let os_release = self.read("etc/os-release")?;
        let mut name = None;
        let mut version = String::new();
        for line in os_release.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim() {
                    "NAME" => name = Some(value),
                    "VERSION_ID" => version = value,
                    _ => {}
                }
            }
        }
        name.map(|n| (n, version))
    }

    fn read_device(&self, name: &str) -> BlockDevice {
        let base = format!("sys/block/{}", name);
        let read_trimmed =
            |leaf: &str| self.read(&format!("{}/{}", base, leaf)).map(|s| s.trim().to_string());

        let size_bytes = read_trimmed("size")
            .and_then(|s| s.parse::<u64>().ok())
            .map(|sectors| sectors * 512)
            .unwrap_or(0);
        let model = read_trimmed("device/model")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        let rotational = read_trimmed("queue/rotational").as_deref() == Some("1");
        let physical_block_size = read_trimmed("queue/physical_block_size")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_BLOCK_SIZE);

        BlockDevice {
            name: name.to_string(),
            size_bytes,
            model,
            rotational,
            physical_block_size,
        }
    }

    /// Non-virtual entries of `sys/block`, sorted.
    fn disk_names(&self) -> Option<Vec<String>> {
        let entries = fs::read_dir(self.path("sys/block")).ok()?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| {
                let skip = is_virtual_device(name);
                if skip {
                    debug!("Skipping virtual device {}", name);
                }
                !skip
            })
            .collect();
        names.sort();
        Some(names)
    }

    /// `(name, sysfs dir)` for `disk` followed by its partitions.
    fn disk_and_partitions(&self, disk: &str) -> Vec<(String, String)> {
        let base = format!("sys/block/{}", disk);
        let mut partitions: Vec<String> = fs::read_dir(self.path(&base))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .filter(|name| name != disk && is_same_or_partition(disk, name))
                    .collect()
            })
            .unwrap_or_default();
        partitions.sort();

        let mut all = vec![(disk.to_string(), base.clone())];
        all.extend(partitions.into_iter().map(|p| {
            let dir = format!("{}/{}", base, p);
            (p, dir)
        }));
        all
    }

    fn detect_holders(&self, disks: &[String]) -> Vec<Holder> {
        let mut holders = Vec::new();
        for disk in disks {
            for (device, dir) in self.disk_and_partitions(disk) {
                let Ok(entries) = fs::read_dir(self.path(&format!("{}/holders", dir))) else {
                    continue;
                };
                let mut names: Vec<String> = entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .collect();
                names.sort();
                for holder in names {
                    let mapper_name = self
                        .read(&format!("sys/block/{}/dm/name", holder))
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty());
                    debug!("{} is held by {}", device, holder);
                    holders.push(Holder {
                        device: device.clone(),
                        holder,
                        mapper_name,
                    });
                }
            }
        }
        holders
    }

    /// ZFS labels as recorded by udev under `run/udev/data/b<major>:<minor>`.
    fn detect_zfs_members(&self, disks: &[String]) -> Vec<(String, String)> {
        let mut members = Vec::new();
        for disk in disks {
            for (device, dir) in self.disk_and_partitions(disk) {
                let Some(dev) = self.read(&format!("{}/dev", dir)) else {
                    continue;
                };
                let Some(record) = self.read(&format!("run/udev/data/b{}", dev.trim())) else {
                    continue;
                };
                let mut fs_type = None;
                let mut label = None;
                for line in record.lines() {
                    let Some(entry) = line.strip_prefix("E:") else {
                        continue;
                    };
                    let Some((key, value)) = entry.split_once('=') else {
                        continue;
                    };
                    match key {
                        "ID_FS_TYPE" => fs_type = Some(value),
                        "ID_FS_LABEL" => label = Some(value),
                        _ => {}
                    }
                }
                if let (Some(ZFS_MEMBER_FS_TYPE), Some(pool)) = (fs_type, label) {
                    members.push((device, pool.to_string()));
                }
            }
        }
        members
    }

    fn detect_pools(&self) -> Vec<String> {
        // One directory per imported pool; the remaining entries are stat files.
        let Ok(entries) = fs::read_dir(self.path("proc/spl/kstat/zfs")) else {
            debug!("No ZFS kstat directory, assuming no imported pools");
            return Vec::new();
        };
        let mut pools: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        pools.sort();
        pools
    }

    fn detect_mounts(&self) -> Vec<(String, String)> {
        let Some(mounts) = self.read("proc/mounts") else {
            warn!("Mount table unreadable, mount conflicts cannot be detected");
            return Vec::new();
        };
        mounts
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let source = fields.next()?.strip_prefix("/dev/")?;
                let target = fields.next()?;
                Some((source.to_string(), target.to_string()))
            })
            .collect()
    }

    fn detect_raid_members(&self) -> Vec<(String, String)> {
        let Some(mdstat) = self.read("proc/mdstat") else {
            return Vec::new();
        };
        let mut members = Vec::new();
        for line in mdstat.lines() {
            let Some((array, rest)) = line.split_once(" : ") else {
                continue;
            };
            let array = array.trim();
            if !array.starts_with("md") {
                continue;
            }
            for token in rest.split_whitespace() {
                if let Some((member, _)) = token.split_once('[') {
                    members.push((member.to_string(), array.to_string()));
                }
            }
        }
        members
    }
}

impl SystemProbe for LinuxProbe {
    fn host_facts(&self) -> HostFacts {
        let mut degraded = Vec::new();

        let firmware = self.detect_firmware();

        let ram_gb = self.detect_ram_gb().unwrap_or_else(|| {
            warn!("Could not read MemTotal, assuming 0 GB of RAM");
            degraded.push("ram".to_string());
            0
        });

        let cpu_count = self.detect_cpu_count().unwrap_or_else(|| {
            warn!("Could not count processors, assuming 0");
            degraded.push("cpu_count".to_string());
            0
        });

        let (distro, distro_version) = self.detect_distro().unwrap_or_else(|| {
            warn!("Could not read os-release, distribution unknown");
            degraded.push("distro".to_string());
            ("Unknown".to_string(), String::new())
        });

        let facts = HostFacts {
            firmware,
            ram_gb,
            cpu_count,
            distro,
            distro_version,
            degraded,
        };
        if facts.is_healthy() {
            info!("Host probe: {}", facts);
        } else {
            warn!("Host probe (degraded: {:?}): {}", facts.degraded, facts);
        }
        facts
    }

    fn block_devices(&self) -> Vec<BlockDevice> {
        let Some(names) = self.disk_names() else {
            warn!("sys/block unreadable under {}, no devices discovered", self.root.display());
            return Vec::new();
        };

        let devices: Vec<BlockDevice> = names
            .iter()
            .filter(|name| !name.starts_with(OPTICAL_PREFIX))
            .map(|name| self.read_device(name))
            .filter(|device| {
                if device.size_bytes == 0 {
                    debug!("Skipping empty device {}", device.name);
                }
                device.size_bytes > 0
            })
            .collect();
        info!("Discovered {} block device(s)", devices.len());
        devices
    }

    fn host_usage(&self) -> HostUsage {
        let disks = self.disk_names().unwrap_or_default();
        HostUsage {
            pools: self.detect_pools(),
            mounts: self.detect_mounts(),
            raid_members: self.detect_raid_members(),
            holders: self.detect_holders(&disks),
            zfs_members: self.detect_zfs_members(&disks),
        }
    }
}
