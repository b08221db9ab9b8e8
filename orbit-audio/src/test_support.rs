//! In-memory capture backend and helpers for engine tests

use crate::capture::{CaptureConstraints, CaptureFeed, InputBackend, InputStream};
use crate::context::AudioContext;
use crate::error::DeviceError;
use crate::events::EngineEvent;
use crate::manager::{ChannelManager, EngineSettings};
use crossbeam_channel::Receiver;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) const TEST_RATE: u32 = 48000;

#[derive(Default)]
struct Shared {
    feeds: Vec<Arc<CaptureFeed>>,
    opened: Vec<CaptureConstraints>,
    fail_with: Option<DeviceError>,
}

/// Backend whose "device" is fed by the test
pub(crate) struct MemoryInput {
    sample_rate: u32,
    channels: u16,
    shared: Rc<RefCell<Shared>>,
}

/// Test-side handle to a `MemoryInput`
#[derive(Clone)]
pub(crate) struct MemoryInputHandle {
    shared: Rc<RefCell<Shared>>,
}

impl MemoryInput {
    pub fn new(sample_rate: u32, channels: u16) -> (Self, MemoryInputHandle) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        (
            Self {
                sample_rate,
                channels,
                shared: shared.clone(),
            },
            MemoryInputHandle { shared },
        )
    }
}

impl InputBackend for MemoryInput {
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<InputStream, DeviceError> {
        let mut shared = self.shared.borrow_mut();
        shared.opened.push(constraints.clone());
        if let Some(err) = shared.fail_with.clone() {
            return Err(err);
        }
        let feed = CaptureFeed::new(self.sample_rate, self.channels);
        shared.feeds.push(feed.clone());
        Ok(InputStream::new(feed, None))
    }

    fn device_names(&self) -> Vec<String> {
        vec!["Memory Input".to_string()]
    }
}

impl MemoryInputHandle {
    /// Push samples into the most recently opened device
    pub fn push(&self, samples: &[f32]) {
        if let Some(feed) = self.shared.borrow().feeds.last() {
            feed.push(samples);
        }
    }

    pub fn fail_next_opens(&self, err: Option<DeviceError>) {
        self.shared.borrow_mut().fail_with = err;
    }

    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.shared.borrow().opened.last().cloned()
    }

    pub fn open_count(&self) -> usize {
        self.shared.borrow().opened.len()
    }
}

/// Manager with five channels on a 48 kHz context and a mono memory input
pub(crate) fn engine() -> (ChannelManager, MemoryInputHandle, Receiver<EngineEvent>) {
    let (input, handle) = MemoryInput::new(TEST_RATE, 1);
    let context = AudioContext::new(TEST_RATE);
    let mut manager = ChannelManager::new(context, Box::new(input), EngineSettings::default())
        .expect("default settings are valid");
    let events = manager.subscribe();
    (manager, handle, events)
}

/// `seconds` of a 440 Hz tone
pub(crate) fn tone(seconds: f64) -> Vec<f32> {
    let frames = (seconds * TEST_RATE as f64).round() as usize;
    (0..frames)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / TEST_RATE as f32).sin())
        .collect()
}

/// Record `seconds` of tone on `channel` and commit it
pub(crate) fn record(manager: &mut ChannelManager, input: &MemoryInputHandle, channel: usize, seconds: f64) {
    manager.start_recording(channel, None).expect("recording starts");
    input.push(&tone(seconds));
    manager.pump();
    manager.stop_recording(channel).expect("recording stops");
    manager.pump();
}

/// Names of the events received so far
pub(crate) fn drain(events: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    events.try_iter().collect()
}

pub(crate) fn names(events: &[EngineEvent]) -> Vec<&'static str> {
    events.iter().map(EngineEvent::name).collect()
}
