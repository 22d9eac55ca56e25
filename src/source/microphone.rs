//! Microphone tap: spectral frames transformed from live device input.
//!
//! The cpal stream callback only forwards samples into a channel; a dedicated
//! capture thread assembles fixed-size blocks, runs the forward transform,
//! repacks the spectrum into the tap wire format, and invokes the listener.
//! Stopping sets a flag the loop observes and then joins the thread, so no
//! callbacks fire after `stop()` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, SupportedBufferSize};
use tracing::{debug, error, warn};

use super::{FrameListener, SpectralSource};
use crate::config::VizConfig;
use crate::error::{VizError, VizResult};
use crate::fft::ForwardFft;

/// Floor for the capture block size, so a tiny reported device buffer still
/// yields enough bins to be worth drawing.
const MIN_BLOCK_SIZE: usize = 256;

/// Block size used when the device doesn't report a buffer-size range.
const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Produces spectral frames from the device microphone.
pub struct MicrophoneSource {
    device_name: String,
    sample_rate: u32,
    channels: u16,
    block_size: usize,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl MicrophoneSource {
    /// Probes the default input device and fixes the capture parameters.
    ///
    /// Sample rates are tried in the order configured; the capture block size
    /// is the smallest power of two at or beyond the device's minimum buffer
    /// size. Fails with a configuration error if no configured rate is
    /// supported.
    pub fn new(config: &VizConfig) -> VizResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VizError::AudioDevice("No default input device available".to_string()))?;
        let device_name = device.name()?;

        let ranges: Vec<_> = device.supported_input_configs()?.collect();
        let mut chosen = None;
        'rates: for &rate in &config.mic_sample_rates {
            for range in &ranges {
                if range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0 {
                    let block_size = match range.buffer_size() {
                        SupportedBufferSize::Range { min, .. } => {
                            (*min as usize).max(MIN_BLOCK_SIZE).next_power_of_two()
                        }
                        SupportedBufferSize::Unknown => DEFAULT_BLOCK_SIZE,
                    };
                    chosen = Some((rate, range.channels(), block_size));
                    break 'rates;
                }
            }
        }
        let (sample_rate, channels, block_size) = chosen.ok_or_else(|| {
            VizError::Config(format!(
                "device '{}' supports none of the probe rates {:?}",
                device_name, config.mic_sample_rates
            ))
        })?;
        debug!(
            device = %device_name,
            sample_rate,
            block_size,
            "using microphone capture parameters"
        );

        Ok(Self {
            device_name,
            sample_rate,
            channels,
            block_size,
            worker: None,
        })
    }
}

impl SpectralSource for MicrophoneSource {
    fn start(&mut self, listener: Arc<dyn FrameListener>) -> VizResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        debug!(block_size = self.block_size, "starting microphone capture");

        let fft = ForwardFft::new(self.block_size)?;
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<VizResult<()>>();

        let loop_stop = stop.clone();
        let device_name = self.device_name.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let block_size = self.block_size;
        let thread = thread::spawn(move || {
            capture_loop(
                device_name,
                sample_rate,
                channels,
                block_size,
                fft,
                listener,
                loop_stop,
                ready_tx,
            );
        });

        // The stream is owned by the capture thread; wait for it to report
        // whether the device came up before returning.
        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(VizError::AudioStream("capture thread died during startup".to_string())));
        if let Err(e) = ready {
            let _ = thread.join();
            return Err(e);
        }

        self.worker = Some(CaptureWorker { stop, thread });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        debug!("stopping microphone capture");
        worker.stop.store(true, Ordering::SeqCst);
        if worker.thread.join().is_err() {
            error!("microphone capture thread panicked");
        }
    }

    fn output_size(&self) -> usize {
        self.block_size
    }

    fn tick_rate_hz(&self) -> u32 {
        (self.sample_rate as usize / self.block_size).max(1) as u32
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the dedicated capture thread: owns the cpal stream, blocks reading
/// sample blocks off the callback channel, and emits one frame per block.
#[allow(clippy::too_many_arguments)]
fn capture_loop(
    device_name: String,
    sample_rate: u32,
    channels: u16,
    block_size: usize,
    mut fft: ForwardFft,
    listener: Arc<dyn FrameListener>,
    stop: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<VizResult<()>>,
) {
    let (sample_tx, sample_rx) = mpsc::channel::<Vec<f32>>();

    let stream = match open_stream(&device_name, sample_rate, channels, sample_tx) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Bounded by the capture block duration, so a stop request is observed
    // promptly even with no incoming audio.
    let block_duration = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

    let mut pending: Vec<i16> = Vec::with_capacity(block_size * 2);
    let mut block = vec![0i16; block_size];
    let mut frame = vec![0i8; block_size];

    while !stop.load(Ordering::SeqCst) {
        let samples = match sample_rx.recv_timeout(block_duration) {
            Ok(samples) => samples,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("microphone stream closed unexpectedly");
                break;
            }
        };

        if channels > 1 {
            pending.extend(
                samples
                    .chunks(channels as usize)
                    .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
                    .map(sample_to_i16),
            );
        } else {
            pending.extend(samples.into_iter().map(sample_to_i16));
        }

        while pending.len() >= block_size {
            block.copy_from_slice(&pending[..block_size]);
            pending.drain(..block_size);

            if let Err(e) = fft.forward(&block) {
                error!("microphone transform failed: {}", e);
                return;
            }

            // Fill in indexes 2 onwards to match the tap wire format, leaving
            // the endcap bytes zero.
            frame[0] = 0;
            frame[1] = 0;
            for i in 1..block_size / 2 {
                frame[i * 2] = spectrum_to_i8(fft.real()[i]);
                frame[i * 2 + 1] = spectrum_to_i8(fft.imag()[i]);
            }
            listener.on_frame(&frame);
        }
    }

    drop(stream);
    debug!("microphone capture loop exited");
}

/// Reopens the probed device and builds the input stream. Runs on the capture
/// thread since the stream handle must stay there.
fn open_stream(
    device_name: &str,
    sample_rate: u32,
    channels: u16,
    sample_tx: mpsc::Sender<Vec<f32>>,
) -> VizResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .input_devices()
        .map_err(|e| VizError::AudioDevice(format!("Failed to enumerate devices: {}", e)))?
        .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
        .or_else(|| host.default_input_device())
        .ok_or_else(|| VizError::AudioDevice(format!("input device '{}' disappeared", device_name)))?;

    let stream_config = cpal::StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let _ = sample_tx.send(data.to_vec());
        },
        |err| error!("microphone stream error: {}", err),
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

#[inline]
fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[inline]
fn spectrum_to_i8(value: f32) -> i8 {
    value.clamp(-127.0, 127.0) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_conversion_clamps() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(2.0), i16::MAX);
        assert_eq!(sample_to_i16(-2.0), -i16::MAX);
        assert_eq!(spectrum_to_i8(1000.0), 127);
        assert_eq!(spectrum_to_i8(-1000.0), -127);
    }
}
