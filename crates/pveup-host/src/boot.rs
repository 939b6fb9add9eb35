use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use tracing::info;

use crate::command::run_command;
use crate::Bootloader;

const EFI_FIRMWARE_DIR: &str = "/sys/firmware/efi";
const PROXMOX_BOOT_UUIDS: &str = "/etc/kernel/proxmox-boot-uuids";

pub struct SystemBootloader {
    efi_firmware_dir: PathBuf,
    proxmox_boot_uuids: PathBuf,
}

impl SystemBootloader {
    pub fn new() -> Self {
        Self {
            efi_firmware_dir: PathBuf::from(EFI_FIRMWARE_DIR),
            proxmox_boot_uuids: PathBuf::from(PROXMOX_BOOT_UUIDS),
        }
    }

    fn uses_proxmox_boot_tool(&self) -> bool {
        self.proxmox_boot_uuids.is_file()
    }
}

impl Default for SystemBootloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootloader for SystemBootloader {
    fn update_boot_config(&self) -> Result<()> {
        if self.uses_proxmox_boot_tool() {
            info!("refreshing boot entries with proxmox-boot-tool");
            run_command(
                Command::new("proxmox-boot-tool").arg("refresh"),
                "proxmox-boot-tool refresh",
            )?;
        } else {
            info!("regenerating grub configuration");
            run_command(&mut Command::new("update-grub"), "update-grub")?;
        }
        Ok(())
    }

    fn is_uefi(&self) -> bool {
        self.efi_firmware_dir.is_dir()
    }

    fn reinstall_boot_package(&self, name: &str) -> Result<()> {
        info!("reinstalling boot package {name}");
        run_command(
            Command::new("apt-get")
                .env("DEBIAN_FRONTEND", "noninteractive")
                .args(["-y", "install", "--reinstall", name]),
            &format!("apt-get install --reinstall {name}"),
        )?;
        Ok(())
    }
}
