use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use clarion::config::file::config_file_path;
use clarion::session::{Collaborators, TurnCoordinator};
use clarion::voice::{
    AudioCapture, AudioPlayback, LlmCorrector, MicRecognizer, PcmBuffer, PlaybackDevice,
    SAMPLE_RATE, SpeechToText, Synthesizer, TextToSpeech, TtsProvider, calculate_energy,
    decode_pcm16, recognition_channel,
};
use clarion::{Config, CoordinatorHandle, Notice, SessionState};

/// Clarion - speaks what you say, clearly
#[derive(Parser)]
#[command(name = "clarion", version, about)]
struct Cli {
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
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output with the configured voice
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Print the config file path
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,clarion=info",
        1 => "info,clarion=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::ConfigPath => {
                let path = config_file_path().context("no home directory")?;
                println!("{}", path.display());
                Ok(())
            }
        };
    }

    let config = Config::load()?;
    tracing::info!(
        preset = %config.voice.preset(),
        stt = ?config.stt.provider,
        tts = ?config.tts.provider,
        "starting clarion"
    );

    let (coordinator, notices) = build_coordinator(&config)?;
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    println!("Clarion ready. Enter: start/stop, v: switch voice, q: quit");
    println!("voice: {}", config.voice.preset());

    let result = control_loop(&handle, notices, config.voice.preset()).await;

    // Release devices before exiting, even after a control loop error
    let _ = handle.shutdown();
    task.await.context("coordinator task panicked")?;

    result
}

/// Wire the real microphone, correction, synthesis and speaker together
fn build_coordinator(
    config: &Config,
) -> anyhow::Result<(TurnCoordinator, mpsc::UnboundedReceiver<Notice>)> {
    let stt = SpeechToText::new(
        config.stt.provider,
        config.stt_api_key().unwrap_or_default().to_string(),
        config.stt.model.clone(),
        config.recognition.clone(),
    )?;

    let (events_tx, events_rx) = recognition_channel();
    let recognizer = MicRecognizer::new(config.recognition.clone(), stt, events_tx)
        .with_no_speech_timeout(config.no_speech_timeout);

    let corrector = LlmCorrector::new(
        config.api_keys.openai.clone().unwrap_or_default(),
        config.correction.base_url.clone(),
        config.correction.model.clone(),
    )?;

    let playback = AudioPlayback::new()?;

    let collaborators = Collaborators {
        recognizer: Box::new(recognizer),
        recognition_events: events_rx,
        corrector: Arc::new(corrector),
        synthesizer: Arc::new(build_synthesizer(config)?),
        playback: Arc::new(playback),
    };

    Ok(TurnCoordinator::new(collaborators, config.turn_settings()))
}

fn build_synthesizer(config: &Config) -> anyhow::Result<TextToSpeech> {
    let key = config.tts_api_key().unwrap_or_default().to_string();
    let tts = match config.tts.provider {
        TtsProvider::Google => TextToSpeech::new_google(key, config.recognition.locale.clone())?,
        TtsProvider::OpenAI => TextToSpeech::new_openai(key, config.tts.model.clone())?,
    };
    Ok(tts)
}

/// Read stdin commands and print session changes until quit
async fn control_loop(
    handle: &CoordinatorHandle,
    mut notices: mpsc::UnboundedReceiver<Notice>,
    mut preset: clarion::VoicePreset,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut live = handle.subscribe();
    let mut last_state = SessionState::Idle;
    let mut last_turn = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {
                        if handle.state().is_active() {
                            handle.deactivate()?;
                        } else {
                            handle.activate()?;
                        }
                    }
                    "v" => {
                        preset = preset.next();
                        handle.cycle_voice()?;
                        println!("voice: {preset}");
                    }
                    "q" => break,
                    other => println!("unknown command {other:?} (Enter, v, q)"),
                }
            }
            Some(notice) = notices.recv() => match notice {
                Notice::Interim(text) => println!("  … {text}"),
                Notice::Fault(message) => println!("! {message}"),
            },
            changed = live.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = live.borrow_and_update().clone();
                if snapshot.state != last_state {
                    println!("[{}]", snapshot.state);
                    last_state = snapshot.state;
                }
                if let Some(turn) = snapshot.turn
                    && last_turn != Some(turn.id())
                {
                    last_turn = Some(turn.id());
                    if turn.was_corrected() {
                        println!("you said: {}", turn.original_text());
                    }
                    println!("speaking: {}", turn.corrected_text());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = AudioCapture::open()?;
    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    drop(capture);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let buffer = PcmBuffer::new(samples, sample_rate, 1)?;
    playback.play(buffer, 1.0).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Synthesize and play text with the configured voice
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = build_synthesizer(&config)?;

    println!("Synthesizing speech ({})...", config.voice.voice_id());
    let audio = tts
        .synthesize(text, &config.voice)
        .await?
        .context("provider returned no audio")?;
    println!("Got {} bytes of audio data", audio.data.len());

    let buffer = decode_pcm16(&audio.data, audio.format)?;
    println!(
        "Playing {:.1}s at {} Hz...",
        buffer.duration().as_secs_f32(),
        buffer.sample_rate()
    );

    let playback = AudioPlayback::new()?;
    playback.play(buffer, config.voice.gain()).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
