use crate::display::format_value;
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::{Display, Write};

/// Number of points kept in the rolling window behind the chart.
pub const SERIES_CAPACITY: usize = 30;

pub const CSV_HEADER: &str = "timestamp,temperature_c";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub label: String,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    pub fn stamped<Tz>(value: f64, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self::new(format_label(at), value)
    }
}

/// `DD/MM/YYYY HH:MM:SS`, the x-axis label format.
pub fn format_label<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%d/%m/%Y %H:%M:%S").to_string()
}

/// Fixed-capacity FIFO of chart points. Eviction is the only removal.
#[derive(Clone, Debug)]
pub struct SeriesBuffer {
    points: VecDeque<TimeSeriesPoint>,
}

impl Default for SeriesBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesBuffer {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(SERIES_CAPACITY + 1),
        }
    }

    /// Appends `point` and returns the evicted oldest point, if any.
    pub fn append(&mut self, point: TimeSeriesPoint) -> Option<TimeSeriesPoint> {
        self.points.push_back(point);
        if self.points.len() > SERIES_CAPACITY {
            self.points.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeriesPoint> {
        self.points.iter()
    }

    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|p| p.label.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.iter().map(|p| p.value).collect()
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(32 * (self.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for point in self.iter() {
            let _ = writeln!(out, "{},{}", point.label, format_value(point.value));
        }
        out
    }
}
