//! Structured logging for vocabkeep.
//!
//! Output goes through `tracing`; [`init_logging`] installs a compact fmt
//! subscriber according to [`LoggingConfig`]. License state changes are
//! logged through [`log_license_event`] so every activation attempt leaves
//! one line with the key, the machine and the outcome.

use tracing::level_filters::LevelFilter;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::hardware::MachineId;

/// License state change event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseEvent {
    /// A new activation row was written
    Activated,
    /// The machine already held an activation; nothing changed
    AlreadyActivated,
    /// Validation refused the key
    Denied,
    /// A key was created by an administrator
    Provisioned,
    Revoked,
    /// An administrator freed an activation slot
    ActivationRemoved,
}

impl std::fmt::Display for LicenseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LicenseEvent::Activated => "activated",
            LicenseEvent::AlreadyActivated => "already_activated",
            LicenseEvent::Denied => "denied",
            LicenseEvent::Provisioned => "provisioned",
            LicenseEvent::Revoked => "revoked",
            LicenseEvent::ActivationRemoved => "activation_removed",
        };
        write!(f, "{}", s)
    }
}

/// Log a license state change.
///
/// Denials log at `warn` with the reason; everything else at `info`.
pub fn log_license_event(
    event: LicenseEvent,
    license_key: &str,
    machine_id: Option<&MachineId>,
    details: Option<&str>,
) {
    let span = info_span!(
        "license_event",
        event = %event,
        license_key = %license_key,
        machine = machine_id.map(MachineId::short).unwrap_or("-"),
    );
    let _enter = span.enter();

    match (event, details) {
        (LicenseEvent::Denied, Some(reason)) => warn!(reason = %reason, "License event occurred"),
        (LicenseEvent::Denied, None) => warn!("License event occurred"),
        (_, Some(d)) => info!(details = %d, "License event occurred"),
        (_, None) => info!("License event occurred"),
    }
}

/// Correlation id for one validation attempt.
pub fn generate_attempt_id() -> String {
    Uuid::new_v4().to_string()
}

/// Map a configured level name to a filter. Unknown names fall back to `info`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Install the global subscriber.
///
/// A disabled config installs nothing. Calling this twice is harmless: the
/// second subscriber is simply not installed.
pub fn init_logging(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_max_level(level_filter(&config.level))
        .with_target(false)
        .compact()
        .try_init();
}
