//! What the controller needs from its surroundings: somewhere to show the
//! control, status text and meter, and a way to send the user on.

use std::io::{self, Write};
use tracing::{info, warn};

use crate::audio::MeterReading;
use crate::recorder::ControlState;

/// The page/panel the recorder is embedded in
pub trait RecorderView: Send {
    /// Update the record control (label, style, enabled)
    fn render_control(&mut self, control: &ControlState);

    /// Replace the status message
    fn set_status(&mut self, message: &str);

    /// Hide the configuration/example section once recording starts
    fn hide_configuration(&mut self);

    /// Redraw the volume meter
    fn draw_meter(&mut self, reading: MeterReading);
}

/// Where the user goes after the final chunk is submitted
pub trait Navigator: Send {
    fn redirect(&mut self, url: &str);
}

/// Terminal rendering of the recorder (stderr)
pub struct TerminalView {
    meter_width: usize,
    meter_visible: bool,
}

impl TerminalView {
    pub fn new(meter_width: usize) -> Self {
        Self {
            meter_width,
            meter_visible: false,
        }
    }

    fn end_meter_line(&mut self) {
        if self.meter_visible {
            eprintln!();
            self.meter_visible = false;
        }
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new(50)
    }
}

impl RecorderView for TerminalView {
    fn render_control(&mut self, control: &ControlState) {
        self.end_meter_line();
        let hint = if control.enabled { " (press Enter)" } else { "" };
        eprintln!("[ {} ]{}", control.label, hint);
    }

    fn set_status(&mut self, message: &str) {
        self.end_meter_line();
        eprintln!("{}", message);
    }

    fn hide_configuration(&mut self) {}

    fn draw_meter(&mut self, reading: MeterReading) {
        let filled = reading.bar_width(self.meter_width);
        let (r, g, b) = hex_to_rgb(reading.color());
        let bar = "█".repeat(filled);
        let rest = " ".repeat(self.meter_width - filled);

        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[38;2;{};{};{}m{}\x1b[0m{}|", r, g, b, bar, rest);
        let _ = stderr.flush();
        self.meter_visible = true;
    }
}

/// Prints the destination for the user to follow
#[derive(Debug, Default)]
pub struct TerminalNavigator {
    pub visited: Option<String>,
}

impl Navigator for TerminalNavigator {
    fn redirect(&mut self, url: &str) {
        info!("Redirecting user to {}", url);
        println!("Continue at: {}", url);
        if self.visited.replace(url.to_string()).is_some() {
            warn!("Redirect issued more than once");
        }
    }
}

fn hex_to_rgb(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(255)
    };
    (channel(0), channel(2), channel(4))
}
