use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use companion::bus::Handler;
use companion::voice::{self, AudioBuffer, AudioCapture, AudioSink, Speaker};
use companion::{
    AsrClient, BusEvent, Config, ConsolePresenter, EventBus, Orchestrator, OrchestratorHandle,
    Services, Topic, TtsClient, WsConnector,
};

/// Companion - talk to a virtual character
#[derive(Parser)]
#[command(name = "companion", version, about)]
struct Cli {
    /// Dialogue service WebSocket URL
    #[arg(long)]
    server: Option<String>,

    /// Config file (defaults to ~/.config/companion/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Write the recording to this WAV file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "你好，很高兴见到你。")]
        text: String,

        /// Emotion category
        #[arg(short, long, default_value = "happy")]
        emotion: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,companion=info",
        1 => "info,companion=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(server) = cli.server {
        config.server.url = server;
        config.validate()?;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::TestMic { duration, save }) => test_mic(duration, save).await,
        Some(Command::TestSpeaker) => test_speaker().await,
        Some(Command::TestTts { text, emotion }) => test_tts(&config, &text, &emotion).await,
        None => interactive(config).await,
    }
}

/// Sink used when no output device exists
struct Silence;

#[async_trait]
impl AudioSink for Silence {
    async fn play(&self, _audio: AudioBuffer) -> companion::Result<()> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Print chat and connection status to the terminal
fn subscribe_console(bus: &EventBus) {
    let chat: Handler = Arc::new(|event: &BusEvent| {
        if let BusEvent::MessageAdded(utterance) = event {
            let who = if utterance.is_user() { "you" } else { "character" };
            let time = utterance.timestamp.format("%H:%M:%S");
            match &utterance.emotion {
                Some(emotion) => println!("[{time}] {who} ({emotion}): {}", utterance.text),
                None => println!("[{time}] {who}: {}", utterance.text),
            }
        }
    });
    bus.subscribe(Topic::MessageAdded, chat);

    let status: Handler = Arc::new(|event: &BusEvent| match event {
        BusEvent::ConnectionStatusChanged(state) => println!("* {state}"),
        BusEvent::ConnectingProgress(text) => tracing::info!(progress = %text),
        BusEvent::SoundToggle(enabled) => {
            println!("* sound {}", if *enabled { "on" } else { "off" });
        }
        _ => {}
    });
    for topic in [
        Topic::ConnectionStatusChanged,
        Topic::ConnectingProgress,
        Topic::SoundToggle,
    ] {
        bus.subscribe(topic, Arc::clone(&status));
    }
}

/// Run an interactive session on stdin
#[allow(clippy::future_not_send)]
async fn interactive(config: Config) -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::new());
    subscribe_console(&bus);

    let (handle, inputs) = OrchestratorHandle::new();

    let (sink, has_speaker): (Arc<dyn AudioSink>, bool) = match Speaker::new() {
        Ok(speaker) => (Arc::new(speaker), true),
        Err(e) => {
            tracing::warn!(error = %e, "no speaker, replies will be text only");
            (Arc::new(Silence), false)
        }
    };

    let services = Services {
        connector: Arc::new(WsConnector),
        transcriber: Arc::new(AsrClient::new(&config.speech)),
        synthesizer: Arc::new(TtsClient::new(&config.speech)),
        sink,
        presenter: Arc::new(ConsolePresenter::new(
            handle.clone(),
            Duration::from_millis(config.ambient.action_duration_ms),
        )),
        bus,
    };
    let session = tokio::spawn(Orchestrator::new(&config, services, inputs).run());

    if !has_speaker {
        handle.toggle_sound(false);
    }

    let mut capture = match AudioCapture::new() {
        Ok(capture) => Some(capture),
        Err(e) => {
            tracing::warn!(error = %e, "no microphone, /talk unavailable");
            None
        }
    };

    println!("Commands: /call /hangup /talk /send /mute /unmute /quit");
    println!("Anything else is sent as a message.\n");
    handle.call();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/call" => handle.call(),
            "/hangup" => handle.hang_up(),
            "/mute" => handle.toggle_sound(false),
            "/unmute" => handle.toggle_sound(true),
            "/talk" => match capture.as_mut() {
                Some(capture) => match capture.start() {
                    Ok(()) => {
                        handle.start_input();
                        println!("* recording, /send when done");
                    }
                    Err(e) => println!("* cannot record: {e}"),
                },
                None => println!("* no microphone"),
            },
            "/send" => match capture.as_mut().filter(|c| c.is_capturing()) {
                Some(capture) => match capture.finish() {
                    Ok(wav) => handle.submit_audio(wav),
                    Err(e) => println!("* recording lost: {e}"),
                },
                None => println!("* not recording, use /talk first"),
            },
            text => handle.submit_text(text),
        }
    }

    handle.hang_up();
    handle.shutdown();
    session.await?;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64, save: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", voice::SAMPLE_RATE);
    println!("---");

    let mut recording = Vec::new();
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
        recording.extend(samples);
    }

    capture.stop();

    if let Some(path) = save {
        let wav = voice::samples_to_wav(&recording, voice::SAMPLE_RATE)?;
        std::fs::write(&path, wav)?;
        println!("\nSaved {} samples to {}", recording.len(), path.display());
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let speaker = Speaker::new()?;

    let sample_rate = voice::SAMPLE_RATE;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    speaker
        .play(AudioBuffer::new(sample_rate, 1, 16, samples)?)
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test synthesis against the configured TTS endpoint
async fn test_tts(config: &Config, text: &str, emotion: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\" ({emotion})\n");

    let tts = TtsClient::new(&config.speech);

    println!("Synthesizing speech...");
    let wav = tts.try_synthesize(text, emotion).await?;
    println!("Got {} bytes of audio data", wav.len());

    let audio = voice::decode(&wav)?;
    println!(
        "{} Hz, {} channel(s), {}-bit, {:.2}s",
        audio.sample_rate(),
        audio.channels(),
        audio.bit_depth(),
        audio.duration().as_secs_f32()
    );

    println!("Playing audio...");
    Speaker::new()?.play(audio).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
