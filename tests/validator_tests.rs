//! Validator tests
//!
//! Scenario tests for the structural rules plus property tests over the
//! RAID minimum table and the firmware rule.

use proptest::prelude::*;
use zbm_wizard::config::InstallConfig;
use zbm_wizard::probe::{FirmwareMode, HostFacts, HostUsage};
use zbm_wizard::types::{InstallMode, RaidLevel};
use zbm_wizard::validator::{validate, validation_report};

fn facts(firmware: FirmwareMode, ram_gb: u64) -> HostFacts {
    HostFacts {
        firmware,
        ram_gb,
        cpu_count: 2,
        distro: "Void".into(),
        distro_version: String::new(),
        degraded: vec![],
    }
}

fn config(mode: InstallMode, devices: &[&str], raid: RaidLevel) -> InstallConfig {
    let mut config = InstallConfig::new();
    config.set_mode(mode);
    config.set_devices(devices.iter().map(|d| d.to_string()).collect());
    config.set_raid(raid);
    config
}

const EFI_REQUIRED: &str = "EFI boot mode required (BIOS systems are not supported)";

#[test]
fn mirror_on_one_drive_fails_once() {
    let failures = validate(
        &config(InstallMode::New, &["sda"], RaidLevel::Mirror),
        &facts(FirmwareMode::Efi, 16),
    );
    assert_eq!(failures, ["Mirror requires at least 2 drives"]);
}

#[test]
fn existing_mirror_on_efi_host_is_valid() {
    let failures = validate(
        &config(InstallMode::Existing, &["sda", "sdb"], RaidLevel::Mirror),
        &facts(FirmwareMode::Efi, 4),
    );
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
}

#[test]
fn bios_host_fails_with_efi_message_only() {
    let failures = validate(
        &config(InstallMode::New, &["sda"], RaidLevel::None),
        &facts(FirmwareMode::Bios, 16),
    );
    assert_eq!(failures, [EFI_REQUIRED]);
}

#[test]
fn low_ram_reports_found_amount() {
    let failures = validate(
        &config(InstallMode::New, &["sda"], RaidLevel::None),
        &facts(FirmwareMode::Efi, 1),
    );
    assert_eq!(failures, ["At least 2 GB of RAM required (found 1 GB)"]);
}

#[test]
fn report_blocks_on_mounted_drive() {
    let usage = HostUsage {
        pools: vec![],
        mounts: vec![("sda2".into(), "/".into())],
        ..HostUsage::default()
    };
    let report = validation_report(
        &config(InstallMode::New, &["sda"], RaidLevel::None),
        &facts(FirmwareMode::Efi, 16),
        &usage,
        false,
    );
    assert!(!report.is_valid());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("sda"));
}

#[test]
fn report_pool_collision_respects_force() {
    let usage = HostUsage {
        pools: vec!["zroot".into()],
        ..HostUsage::default()
    };
    let cfg = config(InstallMode::New, &["sda"], RaidLevel::None);
    let efi = facts(FirmwareMode::Efi, 16);

    assert!(!validation_report(&cfg, &efi, &usage, false).is_valid());
    assert!(validation_report(&cfg, &efi, &usage, true).is_valid());
}

fn raid_strategy() -> impl Strategy<Value = RaidLevel> {
    prop_oneof![
        Just(RaidLevel::None),
        Just(RaidLevel::Mirror),
        Just(RaidLevel::Raidz1),
        Just(RaidLevel::Raidz2),
        Just(RaidLevel::Raidz3),
    ]
}

fn minimum(level: RaidLevel) -> usize {
    match level {
        RaidLevel::None => 1,
        RaidLevel::Mirror => 2,
        RaidLevel::Raidz1 => 3,
        RaidLevel::Raidz2 => 4,
        RaidLevel::Raidz3 => 5,
    }
}

proptest! {
    /// A RAID failure appears exactly when some drives are selected but fewer
    /// than the minimum
    #[test]
    fn raid_minimum_enforced(level in raid_strategy(), count in 0usize..8) {
        let devices: Vec<String> = (0..count).map(|i| format!("sd{}", (b'a' + i as u8) as char)).collect();
        let mut cfg = InstallConfig::new();
        cfg.set_mode(InstallMode::New);
        cfg.set_devices(devices);
        cfg.set_raid(level);

        let failures = validate(&cfg, &facts(FirmwareMode::Efi, 16));
        let raid_failure = failures.iter().any(|f| f.contains("requires at least"));
        prop_assert_eq!(raid_failure, count > 0 && count < minimum(level));
    }

    /// BIOS hosts always get the EFI failure, whatever else is configured
    #[test]
    fn bios_always_fails(
        level in raid_strategy(),
        count in 0usize..6,
        ram in 0u64..64,
        existing in any::<bool>(),
    ) {
        let mut cfg = InstallConfig::new();
        if existing {
            cfg.set_mode(InstallMode::Existing);
        }
        cfg.set_devices((0..count).map(|i| format!("nvme{}n1", i)).collect());
        cfg.set_raid(level);

        let failures = validate(&cfg, &facts(FirmwareMode::Bios, ram));
        prop_assert!(failures.iter().any(|f| f == EFI_REQUIRED));
    }
}

#[test]
fn no_drives_reported_without_raid_minimum() {
    let failures = validate(
        &config(InstallMode::New, &[], RaidLevel::Mirror),
        &facts(FirmwareMode::Efi, 16),
    );
    assert_eq!(failures, ["No drives selected"]);
}
