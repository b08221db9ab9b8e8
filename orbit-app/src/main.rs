//! Orbit - multi-channel live looper
//!
//! Line-driven shell around the channel engine: commands come in on stdin,
//! lifecycle events are printed as they arrive.

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use orbit_analysis::WaveformOverview;
use orbit_audio::{AudioContext, ChannelManager, CpalInputBackend, EngineError, EngineEvent, EngineSettings, PlatformSync};
use orbit_input::{parse_command, Command, ParseError, HELP};
use orbit_media::Config;

/// How long the control loop waits for input before pumping the engine
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Width of the waveform printed after a take is committed
const SPARKLINE_WIDTH: usize = 48;

fn main() -> anyhow::Result<()> {
    let config = Config::load();
    init_logging(&config);

    // Output device drives the context clock
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("No audio output device found")?;
    let supported = device
        .default_output_config()
        .context("Failed to get audio config")?;
    if supported.sample_format() != SampleFormat::F32 {
        warn!(format = ?supported.sample_format(), "output device does not default to f32");
    }
    let channels = supported.channels() as usize;
    let stream_config: StreamConfig = supported.into();

    let context = AudioContext::new(stream_config.sample_rate.0);
    let mut renderer = context.renderer();
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| renderer.render(data, channels),
        |err| error!(%err, "output stream error"),
        None,
    )?;
    stream.play().context("Failed to start audio output")?;
    info!(
        sample_rate = stream_config.sample_rate.0,
        channels,
        "audio output running"
    );

    let mut manager = ChannelManager::new(
        context,
        Box::new(CpalInputBackend::new()),
        EngineSettings::from_config(&config),
    )?;
    let events = manager.subscribe();
    let mut platform = PlatformSync::new();

    println!("orbit: {} channels ready, type `help` for commands", manager.channel_count());
    let lines = spawn_line_reader();

    loop {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(err) = dispatch(&mut manager, &mut platform, &config, command) {
                        println!("error: {}", err);
                    }
                }
                Err(ParseError::Empty) => {}
                Err(err) => println!("{}", err),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        manager.pump();
        platform.tick(&mut manager);
        for event in events.try_iter() {
            report(&event);
        }
    }

    info!("shutting down");
    platform.stop(&mut manager);
    manager.stop_global_mix();
    for id in 0..manager.channel_count() {
        manager.reset_channel(id);
    }
    drop(stream);
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn spawn_line_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn dispatch(
    manager: &mut ChannelManager,
    platform: &mut PlatformSync,
    config: &Config,
    command: Command,
) -> Result<(), EngineError> {
    match command {
        Command::Record { channel, device } => {
            let device = device.or_else(|| config.input_device.clone());
            manager.start_recording(channel, device.as_deref())?;
        }
        Command::StopRecording(channel) => manager.stop_recording(channel)?,
        Command::Play(channel) => manager.play_channel(channel)?,
        Command::Stop(channel) => manager.stop_channel(channel)?,
        Command::Restart(channel) => manager.restart_channel(channel)?,
        Command::SetLooping(channel, looping) => manager.set_looping(channel, looping)?,
        Command::SetVolume(channel, volume) => {
            let applied = manager.set_volume(channel, volume)?;
            println!("ch{} volume {:.2}", channel + 1, applied);
        }
        Command::Trim { channel, start, end } => manager.trim_buffer(channel, start, end)?,
        Command::Delete(channel) => {
            platform.remove_member(manager, channel)?;
            manager.delete_channel(channel)?;
        }
        Command::AddEffect(channel, params) => {
            let id = manager.add_effect(channel, params)?;
            println!("ch{} {} {}", channel + 1, id, params);
        }
        Command::UpdateEffect(channel, id, update) => manager.update_effect_params(channel, id, &update)?,
        Command::RemoveEffect(channel, id) => {
            if !manager.remove_effect(channel, id)? {
                println!("ch{} has no effect {}", channel + 1, id);
            }
        }
        Command::ListEffects(channel) => {
            for (id, params) in manager.effects(channel)? {
                println!("ch{} {} {}", channel + 1, id, params);
            }
        }
        Command::PlatformAdd(channel, offset) => {
            platform.add_member(manager, channel, offset)?;
        }
        Command::PlatformRemove(channel) => {
            platform.remove_member(manager, channel)?;
        }
        Command::PlatformOffset(channel, secs) => {
            let offset = platform.set_offset(manager, channel, secs)?;
            println!("ch{} offset {:+.1}s", channel + 1, offset);
        }
        Command::PlatformPlay => platform.play(manager),
        Command::PlatformStop => platform.stop(manager),
        Command::MixRecord => {
            let tapped = manager.start_global_record()?;
            println!("mix recording {} channel(s)", tapped);
        }
        Command::MixStop => {
            if manager.stop_global_record()?.is_none() {
                println!("mix: nothing recorded");
            }
        }
        Command::MixPlay => {
            if !manager.play_global_mix()? {
                println!("mix: nothing to play");
            }
        }
        Command::MixHalt => manager.stop_global_mix(),
        Command::Devices => {
            for name in manager.input_devices() {
                println!("  {}", name);
            }
        }
        Command::Status => print_status(manager, platform),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_status(manager: &ChannelManager, platform: &PlatformSync) {
    for channel in manager.channels() {
        let state = if channel.is_recording() {
            "recording"
        } else if channel.is_finalizing() {
            "finalizing"
        } else if channel.is_playing() {
            "playing"
        } else {
            "idle"
        };
        let volume = manager.volume(channel.id()).unwrap_or(0.0);
        let offset = platform
            .offset(channel.id())
            .map(|o| format!(" platform {:+.1}s", o))
            .unwrap_or_default();
        println!(
            "ch{} {:<10} {:>6.2}s vol {:.2} loop {} fx {}{}",
            channel.id() + 1,
            state,
            channel.duration(),
            volume,
            if channel.is_looping() { "on" } else { "off" },
            channel.effect_count(),
            offset
        );
    }
    println!(
        "platform {} | mix {}{}",
        if platform.is_playing() { "playing" } else { "stopped" },
        if manager.global_mix().is_some() { "recorded" } else { "empty" },
        if manager.is_global_recording() { " (recording)" } else { "" }
    );
}

fn report(event: &EngineEvent) {
    match event {
        EngineEvent::WaveformUpdate {
            channel_id,
            buffer,
            is_final: true,
        } => {
            let overview = WaveformOverview::from_samples(&buffer.to_mono(), buffer.sample_rate(), SPARKLINE_WIDTH * 8);
            println!(
                "ch{} {:.2}s {}",
                channel_id + 1,
                buffer.duration(),
                overview.sparkline(SPARKLINE_WIDTH)
            );
        }
        EngineEvent::WaveformUpdate {
            channel_id, buffer, ..
        } => debug!(channel = channel_id, duration = buffer.duration(), "preview"),
        EngineEvent::GlobalMixRecorded { buffer } => println!("mix recorded {:.2}s", buffer.duration()),
        other => match other.channel_id() {
            Some(id) => println!("ch{} {}", id + 1, other.name()),
            None => println!("{}", other.name()),
        },
    }
}
