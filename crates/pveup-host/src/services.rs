use std::process::Command;

use anyhow::Result;
use tracing::info;

use crate::command::{run_command, run_command_status};
use crate::ServiceController;

pub struct SystemdServices;

impl ServiceController for SystemdServices {
    fn restart_service(&self, name: &str) -> Result<()> {
        info!("restarting service {name}");
        run_command(
            Command::new("systemctl").args(["restart", name]),
            &format!("systemctl restart {name}"),
        )?;
        Ok(())
    }

    fn is_service_active(&self, name: &str) -> Result<bool> {
        let output = run_command_status(
            Command::new("systemctl").args(["is-active", name]),
            &format!("systemctl is-active {name}"),
        )?;
        Ok(output.success() && output.stdout.trim() == "active")
    }
}
