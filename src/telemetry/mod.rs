//! Anonymous usage telemetry.
//!
//! Recording is fire-and-forget: events go onto a bounded channel and a
//! background task posts them to the configured endpoint, so the session
//! loop never waits on telemetry I/O. A full queue drops the newest
//! event. Setting any of `DISABLE_TELEMETRY`,
//! `BLENDER_MCP_DISABLE_TELEMETRY` or `MCP_DISABLE_TELEMETRY` to a
//! truthy value opts out entirely.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::TelemetryConfig;

/// Depth of the event queue between the session loop and the worker.
pub const TELEMETRY_QUEUE_CAPACITY: usize = 1000;

/// Environment variables that opt out of telemetry.
const OPT_OUT_VARS: [&str; 3] = [
    "DISABLE_TELEMETRY",
    "BLENDER_MCP_DISABLE_TELEMETRY",
    "MCP_DISABLE_TELEMETRY",
];

/// Error messages are clipped to this many characters before upload.
const MAX_ERROR_LENGTH: usize = 200;

/// Kinds of events the bridge reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Startup,
    ToolExecution,
    PromptSent,
}

#[derive(Debug)]
struct TelemetryEvent {
    event_type: EventType,
    tool_name: Option<String>,
    success: bool,
    duration_ms: Option<f64>,
    error_message: Option<String>,
    timestamp: i64,
}

impl TelemetryEvent {
    fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            tool_name: None,
            success: true,
            duration_ms: None,
            error_message: None,
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// One row as the ingestion endpoint stores it.
#[derive(Debug, Serialize)]
struct EventRow<'a> {
    customer_uuid: &'a str,
    session_id: &'a str,
    event_type: EventType,
    tool_name: Option<&'a str>,
    prompt_text: Option<&'a str>,
    success: bool,
    duration_ms: Option<f64>,
    error_message: Option<&'a str>,
    version: &'a str,
    platform: &'a str,
    blender_version: Option<&'a str>,
    metadata: serde_json::Value,
    event_timestamp: i64,
}

/// Cheap, cloneable recording handle. A disabled handle records nothing.
#[derive(Debug, Clone)]
pub struct Telemetry {
    sender: Option<mpsc::Sender<TelemetryEvent>>,
}

impl Telemetry {
    /// Spawns the background sender and returns the recording handle.
    ///
    /// The handle comes back disabled when the user opted out through the
    /// environment, when the configuration disables telemetry, or when no
    /// endpoint is configured.
    #[must_use]
    pub fn spawn(config: &TelemetryConfig) -> Self {
        if opted_out_via_env() {
            info!("telemetry disabled via environment variable");
            return Self::disabled();
        }
        if !config.enabled {
            debug!("telemetry disabled by configuration");
            return Self::disabled();
        }
        let Some(endpoint) = config.endpoint.clone() else {
            debug!("no telemetry endpoint configured, events will not be sent");
            return Self::disabled();
        };

        let (sender, receiver) = mpsc::channel(TELEMETRY_QUEUE_CAPACITY);
        tokio::spawn(worker_loop(receiver, endpoint, config.api_key.clone()));
        Self {
            sender: Some(sender),
        }
    }

    /// A handle that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Records process startup.
    pub fn record_startup(&self) {
        self.record(TelemetryEvent::new(EventType::Startup));
    }

    /// Records one tool call with its outcome and wall-clock duration.
    pub fn record_tool_call(
        &self,
        tool: &str,
        success: bool,
        duration: Duration,
        error: Option<String>,
    ) {
        let mut event = TelemetryEvent::new(EventType::ToolExecution);
        event.tool_name = Some(tool.to_string());
        event.success = success;
        event.duration_ms = Some(duration.as_secs_f64() * 1000.0);
        event.error_message = error.map(|e| truncate_error(&e));
        self.record(event);
    }

    /// Records that a named prompt was served. Prompt bodies are never
    /// collected, only the name.
    pub fn record_prompt_sent(&self, prompt: &str) {
        let mut event = TelemetryEvent::new(EventType::PromptSent);
        event.tool_name = Some(prompt.to_string());
        self.record(event);
    }

    fn record(&self, event: TelemetryEvent) {
        let Some(sender) = &self.sender else { return };
        if let Err(e) = sender.try_send(event) {
            debug!(error = %e, "telemetry queue full, dropping event");
        }
    }
}

async fn worker_loop(
    mut receiver: mpsc::Receiver<TelemetryEvent>,
    endpoint: String,
    api_key: Option<String>,
) {
    let identity = Identity::load();
    let client = reqwest::Client::new();
    while let Some(event) = receiver.recv().await {
        if let Err(e) = send_event(&client, &endpoint, api_key.as_deref(), &identity, &event).await
        {
            debug!(error = %e, "failed to send telemetry event");
        }
    }
}

async fn send_event(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    identity: &Identity,
    event: &TelemetryEvent,
) -> Result<(), reqwest::Error> {
    let row = EventRow {
        customer_uuid: &identity.customer_uuid,
        session_id: &identity.session_id,
        event_type: event.event_type,
        tool_name: event.tool_name.as_deref(),
        prompt_text: None,
        success: event.success,
        duration_ms: event.duration_ms,
        error_message: event.error_message.as_deref(),
        version: env!("CARGO_PKG_VERSION"),
        platform: std::env::consts::OS,
        blender_version: None,
        metadata: json!({}),
        event_timestamp: event.timestamp,
    };

    let mut request = client
        .post(endpoint)
        .header("Prefer", "return=minimal")
        .json(&row);
    if let Some(key) = api_key {
        request = request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"));
    }
    request.send().await?.error_for_status()?;
    Ok(())
}

/// The anonymous identifiers attached to every event.
struct Identity {
    customer_uuid: String,
    session_id: String,
}

impl Identity {
    fn load() -> Self {
        Self {
            customer_uuid: load_or_create_customer_uuid(),
            session_id: Uuid::new_v4().to_string(),
        }
    }
}

fn load_or_create_customer_uuid() -> String {
    let result = dirs::data_dir().map_or_else(
        || {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no platform data directory",
            ))
        },
        |base| load_or_create_uuid_at(&base.join("BlenderMCP")),
    );
    match result {
        Ok(id) => id,
        Err(e) => {
            debug!(error = %e, "could not persist client id, using an ephemeral one");
            Uuid::new_v4().to_string()
        }
    }
}

/// Reads the persisted client id from `customer_uuid.txt` under `dir`,
/// creating it (mode 0o600 on Unix) when absent or empty.
fn load_or_create_uuid_at(dir: &Path) -> std::io::Result<String> {
    std::fs::create_dir_all(dir)?;
    let uuid_file = dir.join("customer_uuid.txt");

    if let Ok(existing) = std::fs::read_to_string(&uuid_file) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let fresh = Uuid::new_v4().to_string();
    std::fs::write(&uuid_file, &fresh)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&uuid_file, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(fresh)
}

fn opted_out_via_env() -> bool {
    opted_out_from(|var| std::env::var(var).ok())
}

fn opted_out_from(lookup: impl Fn(&str) -> Option<String>) -> bool {
    OPT_OUT_VARS.iter().any(|var| {
        lookup(var).is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        })
    })
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LENGTH {
        message.to_string()
    } else {
        let clipped: String = message.chars().take(MAX_ERROR_LENGTH).collect();
        format!("{clipped}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_errors_are_kept_verbatim() {
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[test]
    fn long_errors_are_clipped_with_ellipsis() {
        let long = "x".repeat(500);
        let clipped = truncate_error(&long);
        assert_eq!(clipped.chars().count(), MAX_ERROR_LENGTH + 3);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn clipping_counts_characters_not_bytes() {
        let long = "é".repeat(300);
        let clipped = truncate_error(&long);
        assert_eq!(clipped.chars().count(), MAX_ERROR_LENGTH + 3);
    }

    #[test]
    fn opt_out_accepts_common_truthy_spellings() {
        for value in ["true", "1", "yes", "on", "TRUE", " On "] {
            let truthy = opted_out_from(|var| {
                (var == "DISABLE_TELEMETRY").then(|| value.to_string())
            });
            assert!(truthy, "{value:?} should opt out");
        }
    }

    #[test]
    fn opt_out_ignores_falsy_values() {
        for value in ["false", "0", "no", "off", ""] {
            let truthy = opted_out_from(|var| {
                (var == "DISABLE_TELEMETRY").then(|| value.to_string())
            });
            assert!(!truthy, "{value:?} should not opt out");
        }
    }

    #[test]
    fn every_opt_out_variable_is_honoured() {
        for var_name in OPT_OUT_VARS {
            assert!(opted_out_from(|var| (var == var_name).then(|| "1".to_string())));
        }
        assert!(!opted_out_from(|_| None));
    }

    #[test]
    fn client_id_round_trips_through_the_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create_uuid_at(dir.path()).unwrap();
        let second = load_or_create_uuid_at(dir.path()).unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn client_id_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        load_or_create_uuid_at(dir.path()).unwrap();
        let mode = std::fs::metadata(dir.path().join("customer_uuid.txt"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn surrounding_whitespace_in_the_data_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("customer_uuid.txt"), "  abc-123\n").unwrap();
        assert_eq!(load_or_create_uuid_at(dir.path()).unwrap(), "abc-123");
    }

    #[test]
    fn empty_data_file_gets_a_fresh_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("customer_uuid.txt"), "").unwrap();
        let id = load_or_create_uuid_at(dir.path()).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn event_types_serialise_snake_case() {
        assert_eq!(
            serde_json::to_value(EventType::ToolExecution).unwrap(),
            json!("tool_execution")
        );
        assert_eq!(
            serde_json::to_value(EventType::Startup).unwrap(),
            json!("startup")
        );
        assert_eq!(
            serde_json::to_value(EventType::PromptSent).unwrap(),
            json!("prompt_sent")
        );
    }

    #[test]
    fn disabled_handle_swallows_events() {
        let telemetry = Telemetry::disabled();
        telemetry.record_startup();
        telemetry.record_tool_call("get_scene_info", true, Duration::from_millis(5), None);
    }

    #[tokio::test]
    async fn full_queue_drops_the_newest_event() {
        let (sender, mut receiver) = mpsc::channel(2);
        let telemetry = Telemetry {
            sender: Some(sender),
        };

        for _ in 0..3 {
            telemetry.record_tool_call("t", true, Duration::from_millis(1), None);
        }

        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn tool_errors_are_clipped_before_queueing() {
        let (sender, mut receiver) = mpsc::channel(4);
        let telemetry = Telemetry {
            sender: Some(sender),
        };

        telemetry.record_tool_call(
            "execute_blender_code",
            false,
            Duration::from_millis(40),
            Some("e".repeat(1000)),
        );

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::ToolExecution);
        assert_eq!(event.tool_name.as_deref(), Some("execute_blender_code"));
        assert!(!event.success);
        let error = event.error_message.unwrap();
        assert_eq!(error.chars().count(), MAX_ERROR_LENGTH + 3);
    }
}
