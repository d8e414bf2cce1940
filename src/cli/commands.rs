//! CLI command implementations

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::args::{ConfigCommand, OutputFormat};
use crate::config::Settings;
use crate::media::runner::run_with_timeout;
use crate::media::{display_name, AudioTranscoder, MediaProbe};
use crate::transcription::{
    build_provider, find_model, PipelineStage, TranscriptResult, TranscriptionJob,
    TranscriptionPipeline, KNOWN_MODELS,
};

/// Transcribe a media file and write the transcript
pub async fn transcribe_file(
    settings: &Settings,
    input: &Path,
    language: Option<String>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    // Fail on configuration problems before touching any media.
    settings.validate()?;
    let provider = build_provider(settings)?;
    let model = provider.model().to_string();

    let pipeline = TranscriptionPipeline::new(settings, provider)
        .await
        .with_progress(Box::new(|stage: PipelineStage| {
            if let PipelineStage::Transcribing { index, total } = stage {
                if total > 1 {
                    eprintln!("Transcribing chunk {}/{}...", index, total);
                }
            }
        }));

    let job =
        TranscriptionJob::new(input).with_language(language.or_else(|| settings.language_hint()));

    let result = tokio::select! {
        result = pipeline.transcribe(&job) => result?,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("Interrupted, transcription cancelled");
        }
    };

    let export = TranscriptExport {
        source: display_name(input),
        model,
        created_at: Local::now(),
        transcript: result,
    };

    let rendered = match format {
        OutputFormat::Txt => export_as_txt(&export),
        OutputFormat::Json => export_as_json(&export)?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)
                .with_context(|| format!("Failed to write transcript: {}", path.display()))?;
            eprintln!(
                "Transcript saved to {} ({} words)",
                path.display(),
                export.transcript.word_count
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Show what the prober sees in a media file
pub async fn probe_file(settings: &Settings, input: &Path, json: bool) -> Result<()> {
    let probe = MediaProbe::from_settings(settings);
    let asset = probe.probe(input, None, None).await?;
    let info = probe.inspect(input).await;

    if json {
        #[derive(Serialize)]
        struct ProbeReport<'a> {
            file: String,
            size_bytes: u64,
            duration_secs: f64,
            #[serde(flatten)]
            info: &'a crate::media::MediaInfo,
        }

        let report = ProbeReport {
            file: asset.file_name(),
            size_bytes: asset.size_bytes,
            duration_secs: asset.duration_secs,
            info: &info,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", asset.file_name());
    println!("Size: {:.2}MB", asset.size_mb());
    if asset.duration_secs > 0.0 {
        println!("Duration: {}", format_duration(asset.duration_secs));
    } else {
        println!("Duration: unknown");
    }

    if let Some(format) = info.format.format_name.as_deref() {
        println!("Format: {}", format);
    }
    if let Some(bit_rate) = info.bit_rate() {
        println!("Bit rate: {} kb/s", bit_rate / 1000);
    }

    for (i, stream) in info.streams.iter().enumerate() {
        let kind = stream.codec_type.as_deref().unwrap_or("unknown");
        let codec = stream.codec_name.as_deref().unwrap_or("?");
        match (stream.width, stream.height) {
            (Some(w), Some(h)) => println!("  #{} {} {} {}x{}", i, kind, codec, w, h),
            _ => println!("  #{} {} {}", i, kind, codec),
        }
    }

    if !info.is_empty() && !info.has_audio() {
        println!("warning: no audio stream found");
    }

    Ok(())
}

/// Print the model catalogue and the active transcription settings
pub fn list_models(settings: &Settings) -> Result<()> {
    println!("{:<28} {:<14} Description", "Model", "Languages");
    println!("{}", "-".repeat(72));
    for model in KNOWN_MODELS {
        let marker = if model.name == settings.transcription.model {
            "*"
        } else {
            " "
        };
        println!(
            "{}{:<27} {:<14} {}",
            marker,
            model.name,
            if model.multilingual {
                "multilingual"
            } else {
                "english"
            },
            model.description
        );
    }

    println!();
    println!("Provider: {}", settings.transcription.provider);
    println!(
        "Model: {}{}",
        settings.transcription.model,
        if find_model(&settings.transcription.model).is_some() {
            ""
        } else {
            " (not in catalogue)"
        }
    );
    println!(
        "API key: {}",
        if has_api_key(settings) {
            "configured"
        } else {
            "missing"
        }
    );
    println!(
        "Max upload size: {:.0}MB",
        settings.chunking.max_upload_bytes as f64 / (1024.0 * 1024.0)
    );
    println!(
        "Max chunk duration: {:.0} minutes",
        settings.chunking.max_chunk_seconds / 60.0
    );

    Ok(())
}

/// Handle config subcommands
pub fn config_command(settings: &Settings, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let mut shown = settings.clone();
            if has_api_key(&shown) {
                shown.transcription.api_key = "********".to_string();
            }
            let toml = toml::to_string_pretty(&shown)?;
            println!("{}", toml);
        }
        ConfigCommand::Path => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            let path = Settings::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Settings::write_default(&path)?;
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct DoctorReport {
    provider: String,
    model: String,
    checks: Vec<DoctorCheck>,
    notes: Vec<String>,
}

impl DoctorReport {
    fn healthy(&self) -> bool {
        self.checks.iter().all(|c| c.status == "ok")
    }
}

/// Run diagnostic checks to help troubleshoot local setup issues.
pub async fn run_doctor(settings: &Settings, json: bool) -> Result<()> {
    let report = collect_doctor_report(settings).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("longscribe doctor");
    println!("provider: {} ({})", report.provider, report.model);
    println!();

    for check in &report.checks {
        println!("{:<10} {:<8} {}", check.name, check.status, check.detail);
    }

    if !report.notes.is_empty() {
        println!();
        for note in &report.notes {
            println!("{}", note);
        }
    }

    if report.healthy() {
        println!();
        println!("All checks passed.");
    }

    Ok(())
}

async fn collect_doctor_report(settings: &Settings) -> DoctorReport {
    let mut notes = Vec::new();

    let ffmpeg_ok = tool_runs(&settings.encoder.ffmpeg_path).await;
    let ffprobe_ok = tool_runs(&settings.encoder.ffprobe_path).await;
    if !ffmpeg_ok || !ffprobe_ok {
        notes.push(
            "hint: install ffmpeg (sudo apt install ffmpeg, brew install ffmpeg) or set encoder.ffmpeg_path / encoder.ffprobe_path."
                .to_string(),
        );
    }

    let codec_status = if ffmpeg_ok {
        match AudioTranscoder::from_settings(settings).await.codec_available() {
            Some(true) => "ok",
            Some(false) => {
                notes.push(format!(
                    "warning: ffmpeg lacks the {} encoder; transcoding will fail.",
                    settings.encoder.codec
                ));
                "missing"
            }
            None => "unknown",
        }
    } else {
        "unknown"
    };

    let key_ok = has_api_key(settings);
    if !key_ok {
        notes.push(
            "hint: set transcription.api_key in the config file, or export LONGSCRIBE_API_KEY / GROQ_API_KEY."
                .to_string(),
        );
    }

    if find_model(&settings.transcription.model).is_none() {
        notes.push(format!(
            "info: model {} is not in the known catalogue; it is passed to the service as-is.",
            settings.transcription.model
        ));
    }

    DoctorReport {
        provider: settings.transcription.provider.clone(),
        model: settings.transcription.model.clone(),
        checks: vec![
            DoctorCheck {
                name: "ffmpeg",
                status: if ffmpeg_ok { "ok" } else { "missing" },
                detail: settings.encoder.ffmpeg_path.display().to_string(),
            },
            DoctorCheck {
                name: "ffprobe",
                status: if ffprobe_ok { "ok" } else { "missing" },
                detail: settings.encoder.ffprobe_path.display().to_string(),
            },
            DoctorCheck {
                name: "codec",
                status: codec_status,
                detail: settings.encoder.codec.clone(),
            },
            DoctorCheck {
                name: "api-key",
                status: if key_ok { "ok" } else { "missing" },
                detail: "required for remote transcription".to_string(),
            },
        ],
        notes,
    }
}

// Helper functions

async fn tool_runs(program: &Path) -> bool {
    let args: [OsString; 1] = ["-version".into()];
    run_with_timeout(program, &args, Duration::from_secs(10))
        .await
        .map(|output| output.success())
        .unwrap_or(false)
}

fn has_api_key(settings: &Settings) -> bool {
    !settings.transcription.api_key.trim().is_empty()
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[derive(Serialize)]
struct TranscriptExport {
    source: String,
    model: String,
    created_at: DateTime<Local>,
    #[serde(flatten)]
    transcript: TranscriptResult,
}

fn export_as_txt(export: &TranscriptExport) -> String {
    let transcript = &export.transcript;
    let mut output = String::new();
    output.push_str(&format!("Source: {}\n", export.source));
    output.push_str(&format!("Language: {}\n", transcript.language));
    output.push_str(&format!(
        "Duration: {}\n",
        format_duration(transcript.duration_seconds)
    ));
    output.push_str(&format!("Words: {}\n", transcript.word_count));
    output.push_str(&format!(
        "Date: {}\n",
        export.created_at.format("%Y-%m-%d %H:%M")
    ));
    output.push_str("\n---\n\n");
    output.push_str(&transcript.text);
    output.push('\n');
    output
}

fn export_as_json(export: &TranscriptExport) -> Result<String> {
    Ok(serde_json::to_string_pretty(export)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export() -> TranscriptExport {
        TranscriptExport {
            source: "lecture.mp4".to_string(),
            model: "whisper-large-v3-turbo".to_string(),
            created_at: Local::now(),
            transcript: TranscriptResult {
                text: "Hello world. This is chunk two.".to_string(),
                language: "en".to_string(),
                duration_seconds: 3725.4,
                word_count: 6,
            },
        }
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(65.4), "1:05");
        assert_eq!(format_duration(3725.4), "1:02:05");
    }

    #[test]
    fn txt_export_has_header_and_text() {
        let txt = export_as_txt(&export());
        assert!(txt.starts_with("Source: lecture.mp4\n"));
        assert!(txt.contains("Language: en\n"));
        assert!(txt.contains("Duration: 1:02:05\n"));
        assert!(txt.contains("Words: 6\n"));
        assert!(txt.ends_with("---\n\nHello world. This is chunk two.\n"));
    }

    #[test]
    fn json_export_flattens_transcript() {
        let json = export_as_json(&export()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["source"], "lecture.mp4");
        assert_eq!(value["text"], "Hello world. This is chunk two.");
        assert_eq!(value["word_count"], 6);
        assert_eq!(value["duration_seconds"], 3725.4);
        assert!(value["created_at"].is_string());
    }
}
