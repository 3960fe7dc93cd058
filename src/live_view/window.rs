// src/live_view/window.rs
//! Bounded per-channel window over the newest samples

use crate::acquisition::SampleLog;
use crate::config::constants::live_view::AXIS_MARGIN_RATIO;
use crate::config::ChannelSelection;
use crate::hal::Channel;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Vertical axis range for one trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

impl AxisBounds {
    /// Fit the finite values with a small margin; flat or empty data gets a unit band
    pub fn autoscale<'a>(samples: impl IntoIterator<Item = &'a f64>) -> Self {
        let (lo, hi) = samples
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if lo > hi {
            return Self { min: -1.0, max: 1.0 };
        }
        let span = hi - lo;
        if span == 0.0 {
            return Self {
                min: lo - 1.0,
                max: hi + 1.0,
            };
        }
        let margin = span * AXIS_MARGIN_RATIO;
        Self {
            min: lo - margin,
            max: hi + margin,
        }
    }
}

/// One channel as drawn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelTrace {
    pub channel: Channel,
    pub samples: Vec<f64>,
    pub bounds: AxisBounds,
}

/// Everything a renderer needs for one redraw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowFrame {
    pub tick: u64,
    pub elapsed: Duration,
    pub traces: Vec<ChannelTrace>,
}

/// Sliding window holding at most `capacity` samples per enabled channel
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    traces: Vec<(Channel, VecDeque<f64>)>,
}

impl SlidingWindow {
    pub fn new(capacity: usize, channels: ChannelSelection) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            traces: channels
                .enabled()
                .into_iter()
                .map(|c| (c, VecDeque::with_capacity(capacity)))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples currently held per channel
    pub fn len(&self) -> usize {
        self.traces.first().map_or(0, |(_, t)| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admit new rows, evicting the oldest beyond capacity
    pub fn admit(&mut self, rows: &SampleLog) {
        for (channel, trace) in &mut self.traces {
            let incoming = rows.channel(*channel);
            // Only the newest `capacity` can survive
            let skip = incoming.len().saturating_sub(self.capacity);
            for &value in &incoming[skip..] {
                if trace.len() == self.capacity {
                    trace.pop_front();
                }
                trace.push_back(value);
            }
        }
    }

    pub fn frame(&self, tick: u64, elapsed: Duration) -> WindowFrame {
        WindowFrame {
            tick,
            elapsed,
            traces: self
                .traces
                .iter()
                .map(|(channel, trace)| ChannelTrace {
                    channel: *channel,
                    samples: trace.iter().copied().collect(),
                    bounds: AxisBounds::autoscale(trace.iter()),
                })
                .collect(),
        }
    }
}
