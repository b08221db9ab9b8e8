//! Shared audio-processing context
//!
//! Owns the graph behind a mutex. The control thread locks it to rewire;
//! the device callback renders through a `Renderer` with `try_lock` and
//! outputs silence on contention rather than blocking.

use crate::graph::{Graph, GraphNotice};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frames per offline render quantum
const RENDER_QUANTUM: usize = 128;

pub struct AudioContext {
    sample_rate: u32,
    graph: Arc<Mutex<Graph>>,
    notices: Receiver<GraphNotice>,
    frames_rendered: Arc<AtomicU64>,
}

impl AudioContext {
    pub fn new(sample_rate: u32) -> Self {
        let (notice_tx, notices) = bounded(1024);
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let graph = Graph::new(notice_tx, frames_rendered.clone());
        Self {
            sample_rate: sample_rate.max(1),
            graph: Arc::new(Mutex::new(graph)),
            notices,
            frames_rendered,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far
    pub fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    /// Lock the graph for rewiring
    pub fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock()
    }

    /// Notices posted by the render side
    pub fn notices(&self) -> &Receiver<GraphNotice> {
        &self.notices
    }

    /// Handle for a device output callback
    pub fn renderer(&self) -> Renderer {
        Renderer {
            graph: self.graph.clone(),
            stereo: vec![0.0; 16384],
        }
    }

    /// Render `seconds` of audio offline, discarding the output
    pub fn advance(&self, seconds: f64) {
        let frames = (seconds * self.sample_rate as f64).round() as usize;
        let mut block = vec![0.0; RENDER_QUANTUM * 2];
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(RENDER_QUANTUM);
            self.graph.lock().render(&mut block[..n * 2]);
            remaining -= n;
        }
    }

    /// Render `frames` offline and return the stereo output
    pub fn render_offline(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        for block in out.chunks_mut(RENDER_QUANTUM * 2) {
            self.graph.lock().render(block);
        }
        out
    }
}

/// Real-time render handle
pub struct Renderer {
    graph: Arc<Mutex<Graph>>,
    /// Pre-allocated stereo buffer for non-stereo devices
    stereo: Vec<f32>,
}

impl Renderer {
    /// Fill a device buffer with `channels` interleaved channels
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let Some(mut graph) = self.graph.try_lock() else {
            data.fill(0.0);
            return;
        };

        if channels == 2 {
            graph.render(data);
            return;
        }

        let channels = channels.max(1);
        let frames = data.len() / channels;
        if self.stereo.len() < frames * 2 {
            self.stereo.resize(frames * 2, 0.0);
        }
        let stereo = &mut self.stereo[..frames * 2];
        graph.render(stereo);

        for (frame, pair) in data.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
            if channels == 1 {
                frame[0] = (pair[0] + pair[1]) * 0.5;
            } else {
                frame[0] = pair[0];
                frame[1] = pair[1];
                frame[2..].fill(0.0);
            }
        }
    }
}
