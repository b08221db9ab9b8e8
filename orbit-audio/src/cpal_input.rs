//! Input capture through cpal

use crate::capture::{CaptureConstraints, CaptureFeed, InputBackend, InputStream};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Host, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Opens system input devices on the default host
pub struct CpalInputBackend {
    host: Host,
}

impl CpalInputBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn find_device(&self, device_id: Option<&str>) -> Result<Device, DeviceError> {
        let Some(wanted) = device_id else {
            return self.host.default_input_device().ok_or(DeviceError::NoDevice);
        };
        let mut devices = self
            .host
            .input_devices()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        devices
            .find(|d| d.name().map(|name| name == wanted).unwrap_or(false))
            .ok_or_else(|| DeviceError::NotFound(wanted.to_string()))
    }
}

impl Default for CpalInputBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, feed: Arc<CaptureFeed>) -> Result<Stream, DeviceError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut converted: Vec<f32> = Vec::with_capacity(8192);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                converted.clear();
                converted.extend(data.iter().map(|&s| s.to_sample::<f32>()));
                feed.push(&converted);
            },
            |err| error!(%err, "input stream error"),
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))
}

impl InputBackend for CpalInputBackend {
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<InputStream, DeviceError> {
        let device = self.find_device(constraints.device_id.as_deref())?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::UnsupportedFormat(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let feed = CaptureFeed::new(config.sample_rate.0, config.channels);

        // cpal exposes no voice processing; the host's defaults apply
        debug!(?constraints, "capture constraints requested");

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, feed.clone())?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, feed.clone())?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, feed.clone())?,
            other => return Err(DeviceError::UnsupportedFormat(format!("{:?}", other))),
        };
        stream.play().map_err(|e| DeviceError::Rejected(e.to_string()))?;

        info!(
            device = %name,
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "input device opened"
        );
        Ok(InputStream::new(feed, Some(Box::new(stream) as Box<dyn Any>)))
    }

    fn device_names(&self) -> Vec<String> {
        self.host
            .input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }
}
