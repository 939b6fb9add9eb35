use std::process::Command;

use anyhow::Result;
use tracing::info;

use crate::command::{run_command, run_command_status};
use crate::PackageManager;

const DPKG_CONF_OPTIONS: [&str; 4] = [
    "-o",
    "Dpkg::Options::=--force-confdef",
    "-o",
    "Dpkg::Options::=--force-confold",
];

pub struct AptPackageManager {
    program: String,
}

impl AptPackageManager {
    pub fn new() -> Self {
        Self {
            program: "apt-get".to_string(),
        }
    }

    fn base_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .env("DEBIAN_FRONTEND", "noninteractive")
            .env("APT_LISTCHANGES_FRONTEND", "none");
        command
    }
}

impl Default for AptPackageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageManager for AptPackageManager {
    fn update_indexes(&self) -> Result<()> {
        info!("refreshing package indexes");
        run_command(self.base_command().arg("update"), "apt-get update")?;
        Ok(())
    }

    fn dist_upgrade(&self) -> Result<i32> {
        info!("running dist-upgrade");
        let mut command = self.base_command();
        command.args(DPKG_CONF_OPTIONS).args(["-y", "dist-upgrade"]);
        let output = run_command_status(&mut command, "apt-get dist-upgrade")?;
        Ok(output.code.unwrap_or(-1))
    }

    fn install_package(&self, name: &str) -> Result<()> {
        info!("installing package {name}");
        let mut command = self.base_command();
        command.args(DPKG_CONF_OPTIONS).args(["-y", "install", name]);
        run_command(&mut command, &format!("apt-get install {name}"))?;
        Ok(())
    }

    fn remove_package(&self, name: &str) -> Result<()> {
        info!("removing package {name}");
        run_command(
            self.base_command().args(["-y", "remove", name]),
            &format!("apt-get remove {name}"),
        )?;
        Ok(())
    }

    fn is_package_installed(&self, name: &str) -> Result<bool> {
        let output = run_command_status(
            Command::new("dpkg-query").args(["-W", "-f=${Status}", name]),
            &format!("dpkg-query {name}"),
        )?;
        Ok(output.success() && output.stdout.contains("install ok installed"))
    }

    fn autoremove(&self) -> Result<()> {
        run_command(
            self.base_command().args(["-y", "autoremove"]),
            "apt-get autoremove",
        )?;
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        run_command(self.base_command().arg("clean"), "apt-get clean")?;
        Ok(())
    }
}
