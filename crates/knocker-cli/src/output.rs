//! Output formatting for CLI commands.
//!
//! Supports human-readable text and JSON output.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use knocker_monitor::{Event, EventKind, ServiceState, StateSnapshot};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value as pretty JSON or as a table.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a value as a single line: compact JSON or its text line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_line<W, T>(&self, writer: &mut W, value: &T, text: &str) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize,
    {
        if self.is_json() {
            serde_json::to_writer(&mut *writer, value)
                .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
            writeln!(writer)?;
        } else {
            writeln!(writer, "{text}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as human-readable text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Formats a positive number of seconds as `Ns`, `Nm`, `Nh Nm` or `Nd Nh`.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3_600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86_400 {
        format!("{}h {}m", seconds / 3_600, (seconds % 3_600) / 60)
    } else {
        format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3_600)
    }
}

/// Formats an instant in local time.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Human-readable rendering of a snapshot at a given instant.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    /// The snapshot being rendered.
    #[serde(flatten)]
    pub state: StateSnapshot,
    /// Seconds until the whitelist expires, negative once expired.
    pub expires_in_secs: Option<i64>,
    /// Seconds until the next knock, negative once overdue.
    pub next_knock_in_secs: Option<i64>,
}

impl StatusView {
    /// Renders `state` as seen at `now`.
    #[must_use]
    pub fn new(state: StateSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            expires_in_secs: state.time_until_expiry(now).map(|d| d.num_seconds()),
            next_knock_in_secs: state.time_until_next_knock(now).map(|d| d.num_seconds()),
            state,
        }
    }

    /// Service line, e.g. `running (v0.4.1)`.
    #[must_use]
    pub fn service_text(&self) -> String {
        match (&self.state.service_state, &self.state.service_version) {
            (ServiceState::Unknown, _) => "unknown".to_string(),
            (state, Some(version)) => format!("{state} (v{version})"),
            (state, None) => state.to_string(),
        }
    }

    /// Whitelist line, e.g. `192.0.2.4 (expires in 9m)`.
    #[must_use]
    pub fn whitelist_text(&self) -> String {
        match (&self.state.whitelist_ip, self.expires_in_secs) {
            (Some(ip), Some(remaining)) if remaining > 0 => {
                format!("{ip} (expires in {})", format_duration(remaining))
            }
            (Some(ip), Some(_)) => format!("{ip} (expired)"),
            _ => "No active whitelist".to_string(),
        }
    }

    /// Next knock line, e.g. `Next knock in 5m (based on TTL)`.
    #[must_use]
    pub fn next_knock_text(&self) -> String {
        let (Some(at), Some(until)) = (self.state.next_knock_at, self.next_knock_in_secs) else {
            return "No scheduled knock".to_string();
        };
        let source = self
            .state
            .cadence_source
            .map(|source| format!(" ({})", source.describe()))
            .unwrap_or_default();

        if until > 0 {
            format!("Next knock in {}{source}", format_duration(until))
        } else {
            format!("Next knock: {}{source}", format_timestamp(at))
        }
    }

    /// All three lines joined for a one-line status.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "service {} | {} | {}",
            self.service_text(),
            self.whitelist_text(),
            self.next_knock_text()
        )
    }
}

impl TableDisplay for StatusView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Knocker Status")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Service:     {}", self.service_text())?;
        writeln!(writer, "Whitelist:   {}", self.whitelist_text())?;
        if let Some(ttl) = self.state.ttl {
            writeln!(writer, "TTL:         {}", format_duration(ttl.as_secs() as i64))?;
        }
        writeln!(writer, "Next knock:  {}", self.next_knock_text())?;
        Ok(())
    }
}

/// One-line description of an event for the watch stream.
#[must_use]
pub fn describe_event(event: &Event) -> String {
    let fields = &event.fields;
    let detail = match event.kind {
        EventKind::ServiceState => {
            let state = fields.service_state.unwrap_or_default();
            match &fields.version {
                Some(version) => format!("service {state} (v{version})"),
                None => format!("service {state}"),
            }
        }
        EventKind::StatusSnapshot => "status snapshot".to_string(),
        EventKind::WhitelistApplied => {
            let ip = fields.whitelist_ip.as_deref().unwrap_or("?");
            match fields.expires_at {
                Some(at) => format!("whitelisted {ip} until {}", format_timestamp(at)),
                None => format!("whitelisted {ip}"),
            }
        }
        EventKind::WhitelistExpired => "whitelist expired".to_string(),
        EventKind::NextKnockUpdated => {
            let at = fields
                .next_at
                .map_or_else(|| "unknown".to_string(), format_timestamp);
            match fields.cadence_source {
                Some(source) => format!("next knock at {at} ({})", source.describe()),
                None => format!("next knock at {at}"),
            }
        }
        EventKind::KnockTriggered => {
            let source = fields.trigger_source.as_deref().unwrap_or("unknown");
            match &fields.result {
                Some(result) => format!("knock triggered by {source}: {result}"),
                None => format!("knock triggered by {source}"),
            }
        }
        EventKind::Error => match &fields.error_code {
            Some(code) => format!("error {code}: {}", event.error_text()),
            None => format!("error: {}", event.error_text()),
        },
    };

    match event.timestamp {
        Some(at) => format!("[{}] {detail}", format_timestamp(at)),
        None => detail,
    }
}

/// Result of a service action.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    /// Unit acted upon.
    pub unit: String,
    /// Action performed.
    pub action: String,
    /// Whether the knocker CLI is installed.
    pub installed: bool,
    /// Whether the unit is active after the action.
    pub active: Option<bool>,
    /// Whether the action succeeded.
    pub success: bool,
}

impl TableDisplay for ServiceReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if !self.installed {
            writeln!(writer, "knocker is not installed")?;
            return Ok(());
        }
        match self.active {
            Some(true) => writeln!(writer, "{}: Service Active", self.unit)?,
            Some(false) => writeln!(writer, "{}: Service Inactive", self.unit)?,
            None => {}
        }
        if self.action != "status" {
            let outcome = if self.success { "succeeded" } else { "failed" };
            writeln!(writer, "{} {outcome}", self.action)?;
        }
        Ok(())
    }
}
