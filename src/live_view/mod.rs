// src/live_view/mod.rs
//! Live rolling view of incoming samples

pub mod consumer;
pub mod renderer;
pub mod window;

pub use consumer::{LiveViewReport, LiveWindowConsumer};
pub use renderer::{ChannelRenderer, LiveRenderer, RenderError, TracingRenderer};
pub use window::{AxisBounds, ChannelTrace, SlidingWindow, WindowFrame};
