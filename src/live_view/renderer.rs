// src/live_view/renderer.rs
//! Render targets for live window frames
//!
//! The consumer never draws directly. It hands each [`WindowFrame`] to a
//! [`LiveRenderer`], which may log it or forward it to a UI thread that owns
//! the actual plotting toolkit.

use crate::live_view::window::WindowFrame;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::{debug, trace};

/// Render errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render target disconnected")]
    Disconnected,

    #[error("render backend failed: {0}")]
    Backend(String),
}

/// Something that draws window frames
pub trait LiveRenderer: Send {
    fn render(&mut self, frame: &WindowFrame) -> Result<(), RenderError>;

    /// Called once after the last frame
    fn finish(&mut self) {}
}

/// Logs a one-line summary per trace
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl LiveRenderer for TracingRenderer {
    fn render(&mut self, frame: &WindowFrame) -> Result<(), RenderError> {
        for t in &frame.traces {
            debug!(
                tick = frame.tick,
                channel = %t.channel,
                samples = t.samples.len(),
                last = t.samples.last().copied().unwrap_or(f64::NAN),
                min = t.bounds.min,
                max = t.bounds.max,
                "live window"
            );
        }
        Ok(())
    }
}

/// Forwards frames over a bounded channel to another thread.
///
/// When the receiver falls behind, frames are dropped rather than queued.
pub struct ChannelRenderer {
    tx: Sender<WindowFrame>,
    dropped: u64,
}

impl ChannelRenderer {
    pub fn bounded(depth: usize) -> (Self, Receiver<WindowFrame>) {
        let (tx, rx) = channel::bounded(depth.max(1));
        (Self { tx, dropped: 0 }, rx)
    }

    /// Frames discarded because the receiver was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl LiveRenderer for ChannelRenderer {
    fn render(&mut self, frame: &WindowFrame) -> Result<(), RenderError> {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!(tick = frame.tick, "render queue full, frame dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(RenderError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn empty_frame(tick: u64) -> WindowFrame {
        WindowFrame {
            tick,
            elapsed: Duration::ZERO,
            traces: Vec::new(),
        }
    }

    #[test]
    fn test_channel_renderer_forwards_frames() {
        let (mut renderer, rx) = ChannelRenderer::bounded(4);
        renderer.render(&empty_frame(1)).unwrap();
        assert_eq!(rx.recv().unwrap().tick, 1);
    }

    #[test]
    fn test_full_queue_drops_frames() {
        let (mut renderer, rx) = ChannelRenderer::bounded(1);
        renderer.render(&empty_frame(1)).unwrap();
        renderer.render(&empty_frame(2)).unwrap();
        assert_eq!(renderer.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().tick, 1);
    }

    #[test]
    fn test_disconnected_receiver_is_an_error() {
        let (mut renderer, rx) = ChannelRenderer::bounded(1);
        drop(rx);
        assert!(matches!(
            renderer.render(&empty_frame(1)),
            Err(RenderError::Disconnected)
        ));
    }
}
