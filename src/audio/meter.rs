//! Volume meter
//!
//! Tracks a smoothed input level and a clipping flag that stays up for a short
//! hold time after the last clipped sample, so the UI can flash red long
//! enough to be seen.

use std::time::{Duration, Instant};

/// Meter fill colours (CSS hex)
pub const IDLE_COLOR: &str = "#ffa64d";
pub const IDLE_CLIP_COLOR: &str = "#ff4d4d";
pub const RECORDING_COLOR: &str = "#4dd2ff";
pub const RECORDING_CLIP_COLOR: &str = "#ff4d4d";

#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// Absolute sample value treated as clipping
    pub clip_level: f32,
    /// Per-buffer decay factor applied to the previous volume
    pub averaging: f32,
    /// How long the clipping flag is held after the last clip
    pub clip_lag: Duration,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            clip_level: 0.98,
            averaging: 0.95,
            clip_lag: Duration::from_millis(750),
        }
    }
}

/// Snapshot handed to the view on every redraw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    /// 0.0 ..= 1.0
    pub volume: f32,
    pub clipping: bool,
    pub recording: bool,
}

impl MeterReading {
    pub fn color(&self) -> &'static str {
        match (self.recording, self.clipping) {
            (true, true) => RECORDING_CLIP_COLOR,
            (true, false) => RECORDING_COLOR,
            (false, true) => IDLE_CLIP_COLOR,
            (false, false) => IDLE_COLOR,
        }
    }

    /// Filled width of a bar `width` cells/pixels wide
    pub fn bar_width(&self, width: usize) -> usize {
        ((self.volume.clamp(0.0, 1.0) * width as f32).round() as usize).min(width)
    }
}

#[derive(Debug)]
pub struct VolumeMeter {
    config: MeterConfig,
    volume: f32,
    clipping: bool,
    last_clip: Option<Instant>,
}

impl VolumeMeter {
    pub fn new(config: MeterConfig) -> Self {
        Self {
            config,
            volume: 0.0,
            clipping: false,
            last_clip: None,
        }
    }

    /// Feed one buffer of normalized samples captured at `now`
    pub fn process<I>(&mut self, samples: I, now: Instant)
    where
        I: IntoIterator<Item = f32>,
    {
        let mut sum = 0.0f32;
        let mut count = 0usize;

        for x in samples {
            if x.abs() >= self.config.clip_level {
                self.clipping = true;
                self.last_clip = Some(now);
            }
            sum += x * x;
            count += 1;
        }

        if count == 0 {
            return;
        }

        let rms = (sum / count as f32).sqrt();
        self.volume = rms.max(self.volume * self.config.averaging);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Clipping flag, cleared once `clip_lag` has passed since the last clip
    pub fn check_clipping(&mut self, now: Instant) -> bool {
        if !self.clipping {
            return false;
        }
        match self.last_clip {
            Some(at) if now.saturating_duration_since(at) > self.config.clip_lag => {
                self.clipping = false;
            }
            None => self.clipping = false,
            _ => {}
        }
        self.clipping
    }

    pub fn reading(&mut self, recording: bool, now: Instant) -> MeterReading {
        MeterReading {
            volume: self.volume,
            clipping: self.check_clipping(now),
            recording,
        }
    }

    /// Detach from the input; the meter reads silent until fed again
    pub fn shutdown(&mut self) {
        self.volume = 0.0;
        self.clipping = false;
        self.last_clip = None;
    }
}

impl Default for VolumeMeter {
    fn default() -> Self {
        Self::new(MeterConfig::default())
    }
}
