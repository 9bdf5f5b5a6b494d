//! Service control command implementation.

use std::io::Write;

use tracing::info;

use knocker_monitor::ServiceControl;

use crate::cli::ServiceCommands;
use crate::error::CliError;
use crate::output::{OutputFormat, ServiceReport};

/// Service command executor.
pub struct ServiceCommand<C> {
    control: C,
    unit: String,
}

impl<C: ServiceControl> ServiceCommand<C> {
    /// Create a service command for `unit`.
    #[must_use]
    pub fn new(control: C, unit: impl Into<String>) -> Self {
        Self {
            control,
            unit: unit.into(),
        }
    }

    /// Execute a service action.
    ///
    /// # Errors
    ///
    /// Returns an error if knocker is not installed, the action fails, or
    /// output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        action: ServiceCommands,
    ) -> Result<(), CliError> {
        let mut report = ServiceReport {
            unit: self.unit.clone(),
            action: action_name(action).to_string(),
            installed: self.control.is_installed().await,
            active: None,
            success: false,
        };

        if !report.installed {
            format.write(writer, &report)?;
            return Err(CliError::Command("knocker is not installed".to_string()));
        }

        report.success = match action {
            ServiceCommands::Start => self.control.start().await,
            ServiceCommands::Stop => self.control.stop().await,
            ServiceCommands::Status => true,
            ServiceCommands::Knock => self.control.trigger_knock().await,
        };
        if action != ServiceCommands::Knock {
            report.active = Some(self.control.is_active().await);
        }
        info!(
            unit = %self.unit,
            action = %report.action,
            success = report.success,
            "service action"
        );

        format.write(writer, &report)?;
        if report.success {
            Ok(())
        } else {
            Err(CliError::Command(format!("failed to {} {}", report.action, self.unit)))
        }
    }
}

const fn action_name(action: ServiceCommands) -> &'static str {
    match action {
        ServiceCommands::Start => "start",
        ServiceCommands::Stop => "stop",
        ServiceCommands::Status => "status",
        ServiceCommands::Knock => "knock",
    }
}
