use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;

use anyhow::Context;
use crossbeam_channel::{Sender, unbounded};

use crate::audio_io::AudioEngine;
use crate::codec;
use crate::config;
use crate::driver::{DriverCommand, ExportSettings, LoopScheduler, Notice, SessionDriver};
use crate::session::{ControllerSettings, RecordingController};

pub fn parse_command(line: &str) -> Option<DriverCommand> {
    match line.trim().to_lowercase().as_str() {
        "start" | "record" | "s" => Some(DriverCommand::Start),
        "cancel" | "c" => Some(DriverCommand::Cancel),
        "status" => Some(DriverCommand::Status),
        "exit" | "quit" | "q" => Some(DriverCommand::Shutdown),
        _ => None,
    }
}

pub fn format_notice(notice: &Notice) -> String {
    match notice {
        Notice::Started(id) => format!("⏳ Session {id}: waiting for backing track"),
        Notice::Rejected(reason) => format!("❌ {reason}"),
        Notice::Recording(id) => format!("🎙️  Session {id}: recording"),
        Notice::PlaybackStartFailed(reason) => {
            format!("❌ {reason} (type `cancel` to reset)")
        }
        Notice::StartTimedOut => {
            "❌ Backing track never started (type `cancel` to reset)".to_string()
        }
        Notice::Failed(reason) => format!("❌ {reason}"),
        Notice::WindowClosed(id) => format!("🛑 Session {id}: window closed, finishing take"),
        Notice::Cancelled => "Cancelled".to_string(),
        Notice::Status {
            state,
            elapsed_ms,
            takes,
        } => match elapsed_ms {
            Some(ms) => format!("{state:?}, {ms:.0} ms elapsed, {takes} take(s) done"),
            None => format!("{state:?}, {takes} take(s) done"),
        },
        Notice::EmptyClip { take_index } => {
            format!(
                "⚠️  Take {}: recording window fell outside the capture, nothing written",
                take_index + 1
            )
        }
        Notice::Exported { take_index, path } => {
            format!("💾 Take {} saved to {}", take_index + 1, path.display())
        }
        Notice::ExportFailed { take_index, reason } => {
            format!("❌ Take {} not saved: {reason}", take_index + 1)
        }
        Notice::StreamError(msg) => format!("❌ Audio stream error: {msg}"),
    }
}

fn read_commands(commands: Sender<DriverCommand>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_command(&line) {
            Some(cmd) => {
                if commands.send(cmd).is_err() || cmd == DriverCommand::Shutdown {
                    return;
                }
            }
            None if line.trim().is_empty() => {}
            None => println!("Unknown command: {}", line.trim()),
        }
    }
    // stdin closed
    let _ = commands.send(DriverCommand::Shutdown);
}

/// Load the rehearsal in `config_dir`, open the audio devices and take
/// commands from stdin until `exit`.
pub fn run_cli_simulation(config_dir: &Path, output_dir: &Path) -> anyhow::Result<()> {
    println!("\n🎤  Rehearsal CLI");

    let rehearsal = config::load_dir(config_dir)
        .with_context(|| format!("loading rehearsal from {}", config_dir.display()))?;
    let track = codec::decode_file(&rehearsal.bgm_path)
        .with_context(|| format!("decoding {}", rehearsal.bgm_path.display()))?;

    let (event_tx, event_rx) = unbounded();
    let mut engine = AudioEngine::start(event_tx).context("starting audio engine")?;
    engine.load_track(&track)?;

    let config = rehearsal.config;
    let settings = ControllerSettings {
        max_frequency_hz: config.spectrogram_max_frequency_hz,
        ..Default::default()
    };
    let controller = RecordingController::new(
        engine,
        LoopScheduler::default(),
        config.window.clone(),
        settings,
    );
    let (width, height) = controller.canvas_size();
    println!("Spectrogram canvas: {width}x{height}");
    let marks = controller.spectrogram().reference_columns(
        config.window.reference_marks_ms(),
        config.window.playback_start_ms(),
    );
    if !marks.is_empty() {
        println!("Reference columns: {marks:?}");
    }

    let (cmd_tx, cmd_rx) = unbounded();
    let (notice_tx, notice_rx) = unbounded::<Notice>();
    let printer = thread::Builder::new()
        .name("notices".into())
        .spawn(move || {
            for notice in notice_rx {
                println!("{}", format_notice(&notice));
                let _ = io::stdout().flush();
            }
        })?;
    // Left detached: it may be blocked on stdin when the driver exits.
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || read_commands(cmd_tx))?;

    println!("Type a command: start | cancel | status | exit\n");
    let driver = SessionDriver::new(
        controller,
        event_rx,
        cmd_rx,
        notice_tx,
        ExportSettings {
            output_dir: output_dir.to_path_buf(),
            recording_names: config.recording_names,
            output_format: config.output_format,
        },
    );
    driver.run()?;

    if printer.join().is_err() {
        log::error!("notice printer panicked");
    }
    println!("👋 Exiting.");
    Ok(())
}
