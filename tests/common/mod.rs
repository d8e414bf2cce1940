#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;

use async_trait::async_trait;
use longscribe::config::Settings;
use longscribe::transcription::{
    RemoteError, RemoteTranscript, SpeechToText, TranscriptionRequest,
};
use tempfile::TempDir;

pub fn run_longscribe(args: &[&str]) -> Output {
    TestEnv::new().run(args)
}

pub struct TestEnv {
    home: TempDir,
    config: TempDir,
    data: TempDir,
    runtime: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("create temporary HOME dir"),
            config: tempfile::tempdir().expect("create temporary XDG config dir"),
            data: tempfile::tempdir().expect("create temporary XDG data dir"),
            runtime: tempfile::tempdir().expect("create temporary XDG runtime dir"),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Output {
        let mut command = Command::new(env!("CARGO_BIN_EXE_longscribe"));
        command
            .args(args)
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.config.path())
            .env("XDG_DATA_HOME", self.data.path())
            .env("XDG_RUNTIME_DIR", self.runtime.path())
            .env_remove("LONGSCRIBE_API_KEY")
            .env_remove("GROQ_API_KEY")
            .env_remove("RUST_LOG");
        for (key, value) in env {
            command.env(key, value);
        }
        command.output().expect("failed to execute longscribe binary")
    }

    pub fn config_path(&self) -> PathBuf {
        let output = self.run(&["config", "path"]);
        assert!(
            output.status.success(),
            "config path should succeed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );

        let path = String::from_utf8_lossy(&output.stdout);
        PathBuf::from(path.trim())
    }

    pub fn write_config(&self, contents: &str) {
        let config_path = self.config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).expect("create config parent directory");
        }
        std::fs::write(&config_path, contents).expect("write config file");
    }
}

/// Behaviour of the fake ffmpeg/ffprobe pair
#[derive(Debug, Clone)]
pub struct FakeTools {
    /// Bytes written by a full transcode
    pub transcoded_bytes: u64,
    /// Bytes written by a chunk extraction (`-ss` present)
    pub chunk_bytes: u64,
    /// ffprobe duration output; `None` makes ffprobe fail
    pub duration: Option<String>,
    /// Make the full transcode exit non-zero
    pub fail_transcode: bool,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            transcoded_bytes: 500,
            chunk_bytes: 400,
            duration: Some("100.000000".to_string()),
            fail_transcode: false,
        }
    }
}

/// Shell scripts standing in for ffmpeg and ffprobe
pub struct FakeMediaTools {
    dir: TempDir,
}

#[cfg(unix)]
impl FakeMediaTools {
    pub fn install(tools: &FakeTools) -> Self {
        let dir = tempfile::tempdir().expect("create fake tools dir");
        let log = dir.path().join("ffmpeg_calls.log");

        let fail = if tools.fail_transcode {
            "echo \"Error opening input file $3: Invalid data found when processing input\" >&2\nexit 1"
        } else {
            ""
        };

        let ffmpeg = format!(
            r#"#!/bin/sh
case " $* " in
  *" -encoders "*) echo " A....D libopus              libopus Opus"; exit 0 ;;
  *" -version "*) echo "ffmpeg version fake"; exit 0 ;;
esac
echo "$*" >> "{log}"
for arg in "$@"; do last="$arg"; done
case " $* " in
  *" -ss "*) head -c {chunk} /dev/zero > "$last"; exit 0 ;;
esac
{fail}
head -c {full} /dev/zero > "$last"
"#,
            log = log.display(),
            chunk = tools.chunk_bytes,
            full = tools.transcoded_bytes,
            fail = fail,
        );

        let probe_body = match &tools.duration {
            Some(duration) => format!("echo \"{}\"", duration),
            None => "echo \"N/A: Invalid data found\" >&2\nexit 1".to_string(),
        };
        let ffprobe = format!(
            r#"#!/bin/sh
case " $* " in
  *" -version "*) echo "ffprobe version fake"; exit 0 ;;
esac
{}
"#,
            probe_body
        );

        write_script(&dir.path().join("ffmpeg"), &ffmpeg);
        write_script(&dir.path().join("ffprobe"), &ffprobe);

        Self { dir }
    }

    pub fn ffmpeg(&self) -> PathBuf {
        self.dir.path().join("ffmpeg")
    }

    pub fn ffprobe(&self) -> PathBuf {
        self.dir.path().join("ffprobe")
    }

    /// Argument lines of every transcode or extraction ffmpeg ran
    pub fn ffmpeg_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("ffmpeg_calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Settings wired to the fake tools with fast retries and no pacing
    pub fn settings(&self, scratch: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.general.temp_dir = scratch.to_path_buf();
        settings.encoder.ffmpeg_path = self.ffmpeg();
        settings.encoder.ffprobe_path = self.ffprobe();
        settings.chunking.max_upload_bytes = 1_000;
        settings.chunking.target_chunk_bytes = 800;
        settings.chunking.inter_chunk_delay_ms = 0;
        settings.retry.initial_backoff_ms = 1;
        settings.retry.max_backoff_ms = 1;
        settings.transcription.api_key = "test-key".to_string();
        settings
    }
}

#[cfg(unix)]
fn write_script(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, contents).expect("write fake tool");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake tool executable");
}

/// Write a dummy input file of `size` bytes
pub fn media_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![7u8; size]).expect("write media file");
    path
}

/// What the provider received in one call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub file_name: String,
    pub size: usize,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

/// In-memory provider answering from a queue; an empty queue yields a
/// fixed transcript.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<RemoteTranscript, RemoteError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<RemoteTranscript, RemoteError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn transcript(text: &str, language: Option<&str>, duration: Option<f64>) -> RemoteTranscript {
    RemoteTranscript {
        text: text.to_string(),
        language: language.map(str::to_string),
        duration_secs: duration,
    }
}

#[async_trait]
impl SpeechToText for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-whisper"
    }

    async fn transcribe(
        &self,
        request: TranscriptionRequest<'_>,
    ) -> Result<RemoteTranscript, RemoteError> {
        self.calls.lock().unwrap().push(RecordedCall {
            file_name: request.file_name.to_string(),
            size: request.audio.len(),
            language: request.language.map(str::to_string),
            prompt: request.prompt.map(str::to_string),
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(transcript("default words", None, None)))
    }
}

/// True when `dir` holds no entries
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
