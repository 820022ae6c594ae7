//! The `bokumo.json` rehearsal file: backing track, timing window, guide marks
//! and take names.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, de};

use crate::error::ConfigError;
use crate::types::ConfigWindow;

pub const CONFIG_FILE_NAME: &str = "bokumo.json";

/// Container written for each exported take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 16-bit integer PCM WAV.
    #[default]
    Wav,
    /// The captured samples unconverted, as 32-bit float WAV.
    #[serde(alias = "browser_default")]
    Passthrough,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        "wav"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Sentinel {
    RecordingStartInMs,
    RecordingStopInMs,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReferenceLine {
    Offset(#[serde(deserialize_with = "whole_number")] u32),
    Sentinel(Sentinel),
}

/// Any JSON number with no fractional part, so `1000`, `1000.0` and `1e3`
/// all read as 1000.
fn whole_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&value) {
        return Err(de::Error::custom(format!(
            "expected a non-negative integer, found {value}"
        )));
    }
    Ok(value as u32)
}

fn optional_whole_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    whole_number(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    bgm_file_name: String,
    #[serde(deserialize_with = "whole_number")]
    playback_start_in_ms: u32,
    #[serde(deserialize_with = "whole_number")]
    recording_start_in_ms: u32,
    #[serde(deserialize_with = "whole_number")]
    recording_stop_in_ms: u32,
    #[serde(deserialize_with = "whole_number")]
    playback_stop_in_ms: u32,
    reference_lines_in_ms: Vec<ReferenceLine>,
    recording_names: Vec<String>,
    #[serde(default, deserialize_with = "optional_whole_number")]
    spectrogram_max_frequency_in_hz: Option<u32>,
    #[serde(default)]
    output_format: OutputFormat,
}

/// A validated rehearsal description.
#[derive(Debug, Clone, PartialEq)]
pub struct RehearsalConfig {
    pub bgm_file_name: String,
    pub window: ConfigWindow,
    pub recording_names: Vec<String>,
    /// `None` keeps every analyser bin.
    pub spectrogram_max_frequency_hz: Option<f64>,
    pub output_format: OutputFormat,
}

/// A config plus the backing track it names, resolved inside one directory.
#[derive(Debug, Clone)]
pub struct RehearsalDir {
    pub config: RehearsalConfig,
    pub bgm_path: PathBuf,
}

pub fn is_config_file_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(CONFIG_FILE_NAME)
}

/// Parse and validate config source text.
pub fn parse(source: &str) -> Result<RehearsalConfig, ConfigError> {
    let raw: RawConfig = serde_json::from_str(source)?;

    let window = ConfigWindow::new(
        raw.playback_start_in_ms,
        raw.recording_start_in_ms,
        raw.recording_stop_in_ms,
        raw.playback_stop_in_ms,
    )?;
    let marks = raw
        .reference_lines_in_ms
        .iter()
        .map(|line| match line {
            ReferenceLine::Offset(ms) => *ms,
            ReferenceLine::Sentinel(Sentinel::RecordingStartInMs) => raw.recording_start_in_ms,
            ReferenceLine::Sentinel(Sentinel::RecordingStopInMs) => raw.recording_stop_in_ms,
        })
        .collect();
    let window = window.with_reference_marks(marks)?;

    let spectrogram_max_frequency_hz = match raw.spectrogram_max_frequency_in_hz {
        Some(0) => {
            return Err(ConfigError::InvalidShape(
                "spectrogram_max_frequency_in_hz must be positive".to_string(),
            ));
        }
        Some(hz) => Some(hz as f64),
        None => None,
    };

    Ok(RehearsalConfig {
        bgm_file_name: raw.bgm_file_name,
        window,
        recording_names: raw.recording_names,
        spectrogram_max_frequency_hz,
        output_format: raw.output_format,
    })
}

/// Find the single config file in `dir`, parse it and locate its backing track.
pub fn load_dir(dir: &Path) -> Result<RehearsalDir, ConfigError> {
    let mut config_files = Vec::new();
    let mut other_files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_config_file_name(&name) {
            config_files.push(entry.path());
        } else {
            other_files.push((name, entry.path()));
        }
    }

    let config_path = match config_files.as_slice() {
        [] => return Err(ConfigError::NoConfigFile),
        [path] => path,
        _ => return Err(ConfigError::MultipleConfigFiles),
    };
    let config = parse(&fs::read_to_string(config_path)?)?;

    let bgm_path = other_files
        .into_iter()
        .find(|(name, _)| *name == config.bgm_file_name)
        .map(|(_, path)| path)
        .ok_or_else(|| ConfigError::BgmNotFound(config.bgm_file_name.clone()))?;

    log::info!(
        "loaded {} (backing track {}, playback {}..{} ms)",
        config_path.display(),
        bgm_path.display(),
        config.window.playback_start_ms(),
        config.window.playback_stop_ms()
    );
    Ok(RehearsalDir { config, bgm_path })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"{
        "bgm_file_name": "track.mp3",
        "playback_start_in_ms": 500,
        "recording_start_in_ms": 1000,
        "recording_stop_in_ms": 3000,
        "playback_stop_in_ms": 4000,
        "reference_lines_in_ms": [800, "recording_start_in_ms", "recording_stop_in_ms"],
        "recording_names": ["a", "i", "u"]
    }"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("rehearsal-config-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_window_and_resolves_sentinels() {
        let config = parse(BASIC).unwrap();
        assert_eq!(config.bgm_file_name, "track.mp3");
        assert_eq!(config.window.playback_start_ms(), 500);
        assert_eq!(config.window.playback_duration_ms(), 3500);
        assert_eq!(config.window.reference_marks_ms(), &[800, 1000, 3000]);
        assert_eq!(config.recording_names, vec!["a", "i", "u"]);
        assert_eq!(config.spectrogram_max_frequency_hz, None);
        assert_eq!(config.output_format, OutputFormat::Wav);
    }

    #[test]
    fn optional_keys() {
        let source = BASIC.replace(
            "\"recording_names\"",
            concat!(
                "\"spectrogram_max_frequency_in_hz\": 5000, ",
                "\"output_format\": \"browser_default\", ",
                "\"recording_names\""
            ),
        );
        let config = parse(&source).unwrap();
        assert_eq!(config.spectrogram_max_frequency_hz, Some(5000.0));
        assert_eq!(config.output_format, OutputFormat::Passthrough);
    }

    #[test]
    fn integral_floats_are_whole_milliseconds() {
        let source = BASIC
            .replace("500,", "500.0,")
            .replace("\"recording_stop_in_ms\": 3000", "\"recording_stop_in_ms\": 3e3")
            .replace("[800,", "[8.0e2,")
            .replace(
                "\"recording_names\"",
                "\"spectrogram_max_frequency_in_hz\": 4000.0, \"recording_names\"",
            );
        let config = parse(&source).unwrap();
        assert_eq!(config.window.playback_start_ms(), 500);
        assert_eq!(config.window.reference_marks_ms(), &[800, 1000, 3000]);
        assert_eq!(config.spectrogram_max_frequency_hz, Some(4000.0));
    }

    #[test]
    fn syntax_errors_are_distinguished_from_shape_errors() {
        assert!(matches!(parse("{ not json"), Err(ConfigError::InvalidJsonSyntax(_))));
        assert!(matches!(parse("[1, 2]"), Err(ConfigError::InvalidShape(_))));
        assert!(matches!(parse("{}"), Err(ConfigError::InvalidShape(_))));
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            BASIC.replace("500,", "-5,"),
            BASIC.replace("500,", "500.5,"),
            BASIC.replace("\"recording_start_in_ms\": 1000", "\"recording_start_in_ms\": 100"),
            BASIC.replace("[800,", "[4500,"),
            BASIC.replace("\"recording_stop_in_ms\"]", "\"playback_stop_in_ms\"]"),
            BASIC.replace("[\"a\", \"i\", \"u\"]", "[\"a\", 2]"),
            BASIC.replace(
                "\"recording_names\"",
                "\"spectrogram_max_frequency_in_hz\": 0, \"recording_names\"",
            ),
        ];
        for source in &cases {
            assert!(
                matches!(parse(source), Err(ConfigError::InvalidShape(_))),
                "accepted {source}"
            );
        }
    }

    #[test]
    fn config_name_is_case_insensitive() {
        assert!(is_config_file_name("Bokumo.JSON"));
        assert!(!is_config_file_name("bokumo.json.bak"));
    }

    #[test]
    fn load_dir_finds_backing_track() {
        let dir = scratch_dir("ok");
        fs::write(dir.join("BOKUMO.json"), BASIC).unwrap();
        fs::write(dir.join("track.mp3"), b"").unwrap();
        let loaded = load_dir(&dir).unwrap();
        assert_eq!(loaded.bgm_path, dir.join("track.mp3"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_dir_errors() {
        let dir = scratch_dir("errors");
        assert!(matches!(load_dir(&dir), Err(ConfigError::NoConfigFile)));

        fs::write(dir.join("bokumo.json"), BASIC).unwrap();
        assert!(matches!(
            load_dir(&dir),
            Err(ConfigError::BgmNotFound(name)) if name == "track.mp3"
        ));

        fs::write(dir.join("Bokumo.json"), BASIC).unwrap();
        // Case-insensitive filesystems fold both names onto one file.
        if fs::read_dir(&dir).unwrap().count() == 2 {
            assert!(matches!(load_dir(&dir), Err(ConfigError::MultipleConfigFiles)));
        }
        fs::remove_dir_all(&dir).unwrap();
    }
}
