//! Live input capture
//!
//! A device callback pushes interleaved samples into a `CaptureFeed`, which
//! fans them out to every live track through lock-free ring buffers. A
//! track can be cloned into an independent track on the same feed: the
//! monitor track feeds a channel's analysis stage while its clone feeds the
//! recorder.

use crate::error::DeviceError;
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Seconds of audio each track can buffer before samples are dropped
const TRACK_BUFFER_SECS: usize = 4;

/// Processing requested from the input device
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureConstraints {
    /// Device name; `None` selects the default input
    pub device_id: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl CaptureConstraints {
    /// Voice capture: all processing requested
    pub fn voice(device_id: Option<&str>) -> Self {
        Self {
            device_id: device_id.map(str::to_string),
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Source of capture streams
pub trait InputBackend {
    /// Acquire an input stream honoring `constraints`
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<InputStream, DeviceError>;

    /// Names of available input devices
    fn device_names(&self) -> Vec<String> {
        Vec::new()
    }
}

struct TrackFlags {
    enabled: AtomicBool,
    ended: AtomicBool,
}

struct TrackSink {
    producer: HeapProd<f32>,
    flags: Arc<TrackFlags>,
}

/// Fan-out point between a device callback and its tracks
pub struct CaptureFeed {
    sample_rate: u32,
    channels: u16,
    sinks: Mutex<Vec<TrackSink>>,
}

impl CaptureFeed {
    pub fn new(sample_rate: u32, channels: u16) -> Arc<Self> {
        Arc::new(Self {
            sample_rate,
            channels: channels.max(1),
            sinks: Mutex::new(Vec::new()),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Deliver device samples to every enabled track
    ///
    /// Called from the device callback: never blocks, drops the block on
    /// contention and drops whole frames a full track cannot take, so
    /// readers never lose interleave alignment.
    pub fn push(&self, samples: &[f32]) {
        let Some(mut sinks) = self.sinks.try_lock() else {
            return;
        };
        let channels = self.channels as usize;
        let frames = samples.len() / channels * channels;
        sinks.retain(|sink| !sink.flags.ended.load(Ordering::Acquire));
        for sink in sinks.iter_mut() {
            if sink.flags.enabled.load(Ordering::Acquire) {
                let room = sink.producer.vacant_len() / channels * channels;
                sink.producer.push_slice(&samples[..frames.min(room)]);
            }
        }
    }

    fn add_track(&self) -> CaptureTrack {
        let capacity = self.sample_rate as usize * self.channels as usize * TRACK_BUFFER_SECS;
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1024)).split();
        let flags = Arc::new(TrackFlags {
            enabled: AtomicBool::new(true),
            ended: AtomicBool::new(false),
        });
        self.sinks.lock().push(TrackSink {
            producer,
            flags: flags.clone(),
        });
        CaptureTrack {
            control: TrackControl { flags: flags.clone() },
            reader: TrackReader { consumer, flags },
        }
    }
}

/// Stop/enable handle for a track; cheap to clone
#[derive(Clone)]
pub struct TrackControl {
    flags: Arc<TrackFlags>,
}

impl TrackControl {
    /// End the track; the feed stops delivering to it
    pub fn stop(&self) {
        self.flags.enabled.store(false, Ordering::Release);
        self.flags.ended.store(true, Ordering::Release);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.flags.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.enabled.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.flags.ended.load(Ordering::Acquire)
    }
}

/// Consumer side of a track
pub struct TrackReader {
    consumer: HeapCons<f32>,
    flags: Arc<TrackFlags>,
}

impl TrackReader {
    /// Read up to `out.len()` samples; returns the count read
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        self.consumer.pop_slice(out)
    }

    /// Samples waiting to be read
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_ended(&self) -> bool {
        self.flags.ended.load(Ordering::Acquire)
    }
}

/// A capture track: control handle plus reader
pub struct CaptureTrack {
    control: TrackControl,
    reader: TrackReader,
}

impl CaptureTrack {
    pub fn control(&self) -> &TrackControl {
        &self.control
    }

    pub fn split(self) -> (TrackControl, TrackReader) {
        (self.control, self.reader)
    }
}

/// An acquired input: the feed, its tracks and the device keepalive
pub struct InputStream {
    feed: Arc<CaptureFeed>,
    primary: Option<CaptureTrack>,
    controls: Vec<TrackControl>,
    /// Device stream handle; dropping it closes the device
    device: Option<Box<dyn Any>>,
}

impl InputStream {
    pub fn new(feed: Arc<CaptureFeed>, device: Option<Box<dyn Any>>) -> Self {
        let primary = feed.add_track();
        let controls = vec![primary.control.clone()];
        Self {
            feed,
            primary: Some(primary),
            controls,
            device,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.feed.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.feed.channels()
    }

    /// Take the primary track (once)
    pub fn take_primary(&mut self) -> Option<CaptureTrack> {
        self.primary.take()
    }

    /// New independent track on the same device feed
    pub fn clone_track(&mut self) -> CaptureTrack {
        let track = self.feed.add_track();
        self.controls.push(track.control.clone());
        track
    }

    /// Controls for every track created on this stream
    pub fn track_controls(&self) -> Vec<TrackControl> {
        self.controls.clone()
    }

    /// Stop and disable all tracks and release the device
    pub fn stop_all(&mut self) {
        for control in &self.controls {
            control.stop();
        }
        self.primary = None;
        if self.device.take().is_some() {
            debug!("input device released");
        }
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}
