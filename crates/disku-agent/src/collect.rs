//! Host metadata and disk usage collection.

use crate::error::AgentError;
use disku_common::types::{ClientInfo, DiskUsage};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use sysinfo::{Disks, Networks, System};

/// Directories searched for system tools in addition to `$PATH`.
const EXTRA_BIN_DIRS: [&str; 2] = ["/sbin", "/usr/sbin"];

/// Space figures of one mounted filesystem.
#[derive(Debug, Clone)]
pub struct MountUsage {
    pub mount_point: PathBuf,
    pub total: u64,
    pub available: u64,
}

pub fn which(prog: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path_var)
        .chain(EXTRA_BIN_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(prog))
        .find(|candidate| candidate.exists())
}

fn run(cmd: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new(cmd).args(args).env("LC_ALL", "C").output()?;
    if !output.status.success() {
        anyhow::bail!("{} exited with {}", cmd.display(), output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Picks `key value` pairs out of `ip -o` output for every key accepted by
/// `wanted`. The first occurrence of a key wins.
pub fn parse_ip_fields(output: &str, wanted: impl Fn(&str) -> bool) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut tokens = output.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if wanted(token) {
            if let Some(value) = tokens.peek() {
                fields
                    .entry(token.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    fields
}

fn get_route_info(ip_cmd: &Path, host: IpAddr) -> anyhow::Result<HashMap<String, String>> {
    let output = run(ip_cmd, &["-o", "-d", "route", "get", &host.to_string()])?;
    Ok(parse_ip_fields(&output, |k| matches!(k, "dev" | "src" | "via")))
}

fn get_interface(ip_cmd: &Path, name: &str) -> anyhow::Result<HashMap<String, String>> {
    let output = run(ip_cmd, &["-o", "-d", "addr", "show", name])?;
    Ok(parse_ip_fields(&output, |k| {
        matches!(
            k,
            "link/ether" | "link/loopback" | "link/ieee802.11" | "inet" | "inet6"
        )
    }))
}

pub fn find_mac_address(interface: &HashMap<String, String>) -> Option<String> {
    interface
        .iter()
        .find(|(k, _)| k.starts_with("link/"))
        .map(|(_, v)| v.clone())
}

fn fallback_mac_address() -> Option<String> {
    let networks = Networks::new_with_refreshed_list();
    let mut macs: Vec<String> = networks
        .iter()
        .map(|(_, data)| data.mac_address())
        .filter(|mac| !mac.is_unspecified())
        .map(|mac| mac.to_string())
        .collect();
    macs.sort();
    macs.into_iter().next()
}

fn platform() -> String {
    [
        System::name(),
        System::kernel_version(),
        Some(std::env::consts::ARCH.to_string()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("-")
}

/// Gathers host metadata. Route and interface details come from the `ip`
/// program and are skipped when `allow_external_program` is false or the
/// program is missing; failures only cost those fields.
pub fn collect_info(host: Option<IpAddr>, allow_external_program: bool) -> ClientInfo {
    let mut route = None;
    let mut interface = None;

    if let (true, Some(host), Some(ip_cmd)) = (allow_external_program, host, which("ip")) {
        match get_route_info(&ip_cmd, host) {
            Ok(info) => {
                tracing::debug!(route = ?info, "Got route info to host");
                route = Some(info);
            }
            Err(e) => tracing::warn!(error = %e, "Can not get route info to host"),
        }

        if let Some(dev) = route.as_ref().and_then(|r| r.get("dev")) {
            match get_interface(&ip_cmd, dev) {
                Ok(info) => {
                    tracing::debug!(interface = ?info, "Got interface info");
                    interface = Some(info);
                }
                Err(e) => tracing::warn!(error = %e, "Can not get interface info"),
            }
        }
    }

    let mac_address = interface
        .as_ref()
        .and_then(find_mac_address)
        .or_else(fallback_mac_address);

    ClientInfo {
        identifier: None,
        hostname: System::host_name(),
        platform: Some(platform()),
        mac_address,
        route,
        interface,
    }
}

/// Usage of the filesystem holding `path`: the mount with the longest
/// mount point that is a prefix of it.
pub fn find_usage(mounts: &[MountUsage], path: &Path) -> Option<DiskUsage> {
    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.as_os_str().len())
        .map(|m| DiskUsage {
            total: m.total,
            used: m.total.saturating_sub(m.available),
            free: m.available,
        })
}

pub fn list_mounts() -> Vec<MountUsage> {
    Disks::new_with_refreshed_list()
        .iter()
        .map(|disk| MountUsage {
            mount_point: disk.mount_point().to_path_buf(),
            total: disk.total_space(),
            available: disk.available_space(),
        })
        .collect()
}

/// Converts `statvfs` block counts. Blocks reserved for root count neither
/// as used nor as free, so `used + free` falls short of `total` on
/// filesystems with a reserve.
pub fn usage_from_blocks(blocks: u64, bfree: u64, bavail: u64, frsize: u64) -> DiskUsage {
    DiskUsage {
        total: blocks.saturating_mul(frsize),
        used: blocks.saturating_sub(bfree).saturating_mul(frsize),
        free: bavail.saturating_mul(frsize),
    }
}

#[cfg(unix)]
pub fn statvfs_usage(path: &Path) -> Option<DiskUsage> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: `c_path` is NUL-terminated and `stat` is only read on success.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        tracing::warn!(path = %path.display(), error = %std::io::Error::last_os_error(), "statvfs failed");
        return None;
    }
    let stat = unsafe { stat.assume_init() };
    Some(usage_from_blocks(
        stat.f_blocks as u64,
        stat.f_bfree as u64,
        stat.f_bavail as u64,
        stat.f_frsize as u64,
    ))
}

#[cfg(not(unix))]
pub fn statvfs_usage(_path: &Path) -> Option<DiskUsage> {
    None
}

/// Disk usage for every requested path, keyed by the path as given.
///
/// `statvfs` on the path is preferred; the sysinfo mount table is the
/// fallback where it is unavailable.
pub fn check_disk_usage(paths: &[PathBuf]) -> Result<BTreeMap<String, DiskUsage>, AgentError> {
    let mut mounts: Option<Vec<MountUsage>> = None;
    paths
        .iter()
        .map(|path| {
            let canonical = path
                .canonicalize()
                .map_err(|e| AgentError::Env(format!("{}: {e}", path.display())))?;
            let usage = statvfs_usage(&canonical)
                .or_else(|| find_usage(mounts.get_or_insert_with(list_mounts), &canonical))
                .ok_or_else(|| {
                    AgentError::Env(format!("no filesystem found for {}", path.display()))
                })?;
            Ok((path.display().to_string(), usage))
        })
        .collect()
}
