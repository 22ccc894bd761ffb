use crate::series::{SeriesBuffer, TimeSeriesPoint};
use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
}

/// One redraw request: the visible value plus the whole rolling window.
#[derive(Clone, Debug, Serialize)]
pub struct ChartFrame {
    pub latest: Option<String>,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub link: LinkState,
}

#[derive(Debug)]
struct DisplayState {
    series: SeriesBuffer,
    link: LinkState,
}

impl DisplayState {
    fn frame(&self) -> ChartFrame {
        ChartFrame {
            latest: self.series.latest().map(|p| format_value(p.value)),
            labels: self.series.labels(),
            values: self.series.values(),
            link: self.link,
        }
    }
}

/// Owns the dashboard state for the session and fans redraws out to browsers.
#[derive(Clone)]
pub struct DisplayUpdater {
    state: Arc<RwLock<DisplayState>>,
    frames: broadcast::Sender<ChartFrame>,
}

impl Default for DisplayUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayUpdater {
    pub fn new() -> Self {
        let (frames, _) = broadcast::channel(64);
        Self {
            state: Arc::new(RwLock::new(DisplayState {
                series: SeriesBuffer::new(),
                link: LinkState::Connecting,
            })),
            frames,
        }
    }

    pub fn update(&self, value: f64) -> ChartFrame {
        self.update_at(value, &Local::now())
    }

    pub fn update_at<Tz>(&self, value: f64, at: &DateTime<Tz>) -> ChartFrame
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let frame = {
            let mut guard = self.state.write().expect("display state poisoned");
            guard.series.append(TimeSeriesPoint::stamped(value, at));
            guard.frame()
        };
        // No subscribers just means no browser is watching.
        let _ = self.frames.send(frame.clone());
        frame
    }

    pub fn set_link(&self, link: LinkState) {
        let frame = {
            let mut guard = self.state.write().expect("display state poisoned");
            if guard.link == link {
                return;
            }
            guard.link = link;
            guard.frame()
        };
        let _ = self.frames.send(frame);
    }

    pub fn snapshot(&self) -> ChartFrame {
        self.state.read().expect("display state poisoned").frame()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChartFrame> {
        self.frames.subscribe()
    }

    pub fn watchers(&self) -> usize {
        self.frames.receiver_count()
    }

    pub fn export_csv(&self) -> String {
        self.state.read().expect("display state poisoned").series.to_csv()
    }
}

/// Two decimals, rounding exact ties away from zero like `Number.toFixed`.
pub fn format_value(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    // Only odd multiples of 1/8 land exactly halfway between hundredths.
    let eighths = value * 8.0;
    if eighths.fract() == 0.0 && eighths % 2.0 != 0.0 {
        let hundredths = (value.abs() * 100.0).round() as u64;
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}{}.{:02}", hundredths / 100, hundredths % 100);
    }
    format!("{value:.2}")
}
