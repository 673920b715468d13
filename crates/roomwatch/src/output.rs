//! Rendering of dashboard views for the terminal.

use std::fmt::Write as _;
use std::time::Duration;

use roomwatch_core::{Trend, ViewModel};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render one view in the requested format.
pub fn render(
    view: &ViewModel,
    age: Option<chrono::Duration>,
    format: OutputFormat,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Text => render_text(view, age),
        OutputFormat::Json => serde_json::to_string_pretty(view)?,
        OutputFormat::JsonCompact => serde_json::to_string(view)?,
    })
}

fn render_text(view: &ViewModel, age: Option<chrono::Duration>) -> String {
    let mut out = String::new();
    let energy = &view.energy;

    let trend = match energy.trend() {
        Trend::Up => "up",
        Trend::Down => "down",
    };
    let change = energy
        .change_percent()
        .map_or_else(String::new, |pct| format!(" {pct:.1}%"));
    let _ = writeln!(
        out,
        "Energy     {:.1} kWh ({trend}{change} vs {:.1})",
        energy.current, energy.previous
    );

    let forecast = view
        .predicted_for
        .as_deref()
        .map_or_else(String::new, |when| format!(" for {when}"));
    let _ = writeln!(
        out,
        "Climate    room {:.1} °C, outdoor {:.1} °C, forecast {:.1} °C{forecast}",
        view.room_temp, view.outdoor_temp, view.predicted_outdoor_temp
    );

    let fan = if view.fan.active { "on" } else { "off" };
    let _ = writeln!(out, "Fan        {fan}, {}%", view.fan.display_speed());

    let camera = if view.camera.online { "online" } else { "offline" };
    let _ = writeln!(out, "Camera     {camera}, {} accesses", view.access_count);

    let _ = writeln!(out, "Alerts ({})", view.alerts.len());
    for alert in &view.alerts {
        let _ = writeln!(
            out,
            "  [{}] {}  {}",
            alert.severity, alert.timestamp, alert.message
        );
    }

    let _ = writeln!(out, "Notifications ({})", view.notifications.len());
    for note in &view.notifications {
        let _ = writeln!(out, "  {}  {}", note.timestamp, note.message);
    }

    if let Some(age) = age.and_then(|a| a.to_std().ok()) {
        let age = Duration::from_secs(age.as_secs());
        let _ = write!(out, "Snapshot   {} ago", humantime::format_duration(age));
    } else {
        let _ = write!(out, "Snapshot   never");
    }
    out
}
