//! Line rendering for events and engine status.

use std::io::IsTerminal;

use chrono::DateTime;
use owo_colors::OwoColorize;

use proxyhost_core::{EventRecord, ProfileState, ReconciledState};

use crate::cli::{ColorMode, OutputFormat};

/// Rendering choices resolved once from global flags.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub format: OutputFormat,
    pub color: bool,
}

impl Style {
    pub fn new(format: OutputFormat, color: ColorMode) -> Self {
        let color = match color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        };
        Self { format, color }
    }

    fn paint(&self, text: &str, painter: fn(&str) -> String) -> String {
        if self.color {
            painter(text)
        } else {
            text.to_owned()
        }
    }
}

fn clock(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(|| "--:--:--".into(), |t| t.format("%H:%M:%S").to_string())
}

/// One feed event per line.
pub fn render_event(style: &Style, event: &EventRecord) -> String {
    if matches!(style.format, OutputFormat::Json) {
        return serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
    }

    let target = if event.port() == 0 {
        event.host().to_owned()
    } else {
        format!("{}:{}", event.host(), event.port())
    };
    let time = clock(event.request_time_millis());
    match event.error() {
        None => format!(
            "{time}  {}  {target}  via {}  {}ms",
            style.paint("OK  ", |s| s.green().to_string()),
            event.outbound(),
            event.delay_millis()
        ),
        Some(error) => format!(
            "{time}  {}  {target}  via {}  {}",
            style.paint("FAIL", |s| s.red().to_string()),
            event.outbound(),
            style.paint(error, |s| s.dimmed().to_string())
        ),
    }
}

pub fn render_instances(style: &Style, state: &ReconciledState) -> String {
    if matches!(style.format, OutputFormat::Json) {
        return serde_json::json!({
            "generation": state.generation,
            "running": state.running_count(),
            "failed": state.failed_count(),
            "failures": state
                .failures()
                .map(|(id, message)| serde_json::json!({ "id": id.as_str(), "error": message }))
                .collect::<Vec<_>>(),
        })
        .to_string();
    }

    let summary = format!(
        "generation {}: {} running, {} failed",
        state.generation,
        state.running_count(),
        state.failed_count()
    );
    if state.failed_count() > 0 {
        style.paint(&summary, |s| s.yellow().to_string())
    } else {
        summary
    }
}

pub fn render_profile(style: &Style, state: &ProfileState) -> String {
    let profile = state
        .config_used
        .as_ref()
        .and_then(|set| set.enabled_profile())
        .map(|p| p.name.clone());

    if matches!(style.format, OutputFormat::Json) {
        return serde_json::json!({
            "generation": state.generation,
            "profile": profile,
            "running": state.is_running(),
            "error": state.failure(),
            "event_port": state.active_endpoint(),
        })
        .to_string();
    }

    match (&profile, state.failure()) {
        (_, Some(error)) => style.paint(
            &format!("generation {}: failed: {error}", state.generation),
            |s| s.red().to_string(),
        ),
        (Some(name), None) if state.is_running() => format!(
            "generation {}: profile '{name}' running, events on port {}",
            state.generation,
            state.active_endpoint().unwrap_or_default()
        ),
        _ => format!("generation {}: idle", state.generation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLAIN: Style = Style {
        format: OutputFormat::Text,
        color: false,
    };

    #[test]
    fn renders_connected_and_failed_events() {
        let ok = EventRecord::Connected {
            host: "example.com".into(),
            port: 443,
            outbound: "direct".into(),
            delay_millis: 12,
            request_time_millis: 0,
        };
        assert_eq!(
            render_event(&PLAIN, &ok),
            "00:00:00  OK    example.com:443  via direct  12ms"
        );

        let failed = EventRecord::Failed {
            host: "blocked.example".into(),
            port: 0,
            outbound: "proxy".into(),
            delay_millis: 0,
            request_time_millis: 0,
            error: "timed out".into(),
        };
        assert_eq!(
            render_event(&PLAIN, &failed),
            "00:00:00  FAIL  blocked.example  via proxy  timed out"
        );
    }

    #[test]
    fn idle_profile_state() {
        assert_eq!(render_profile(&PLAIN, &ProfileState::default()), "generation 0: idle");
    }
}
