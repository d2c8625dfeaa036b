//! espeak-ng speech backend.
//!
//! Runs the `espeak-ng` binary and lets it write a WAV file. espeak-ng does
//! not report word boundaries, so bookmark timing requires a transcriber on
//! the [`SpeechService`](crate::service::SpeechService).
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::json;

use crate::error::VoiceoverError;
use crate::{BackendOutput, SpeechBackend};

const IDENTIFIER: &str = "espeak";

const INSTALL_HINT: &str = "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
     macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download";

/// Parameters for an espeak-ng voice.
#[derive(Debug, Clone, PartialEq)]
pub struct EspeakParams {
    /// Voice name (e.g. `"en-us"`, `"en-gb"`, `"fr"`).
    pub voice: String,
    /// Speaking rate in words per minute. Range: 80–450, default 175.
    pub rate: u32,
    /// Pitch adjustment 0–99. `None` keeps the voice default.
    pub pitch: Option<u32>,
}

impl Default for EspeakParams {
    fn default() -> Self {
        Self {
            voice: "en-us".to_string(),
            rate: 175,
            pitch: None,
        }
    }
}

/// Speech backend driving the `espeak-ng` binary.
pub struct EspeakBackend {
    params: EspeakParams,
    bin_path: PathBuf,
    data_path: Option<PathBuf>,
}

impl EspeakBackend {
    /// Use `espeak-ng` from PATH with default parameters.
    pub fn new() -> Result<Self, VoiceoverError> {
        Self::with_params(EspeakParams::default())
    }

    pub fn with_params(params: EspeakParams) -> Result<Self, VoiceoverError> {
        Self::with_espeak(params, None, None)
    }

    /// Use explicit espeak-ng binary and data paths.
    ///
    /// Either path can be `None` to fall back to the system default. Fails
    /// with [`VoiceoverError::BackendUnavailable`] if the binary cannot run.
    pub fn with_espeak(
        params: EspeakParams,
        bin_path: Option<PathBuf>,
        data_path: Option<PathBuf>,
    ) -> Result<Self, VoiceoverError> {
        let backend = Self {
            params,
            bin_path: bin_path.unwrap_or_else(|| PathBuf::from("espeak-ng")),
            data_path,
        };
        backend.probe()?;
        Ok(backend)
    }

    pub fn params(&self) -> &EspeakParams {
        &self.params
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        if let Some(data) = &self.data_path {
            cmd.env("ESPEAK_DATA_PATH", data);
        }
        cmd
    }

    fn probe(&self) -> Result<(), VoiceoverError> {
        let output = self
            .command()
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| unavailable(&self.bin_path, e))?;
        if !output.status.success() {
            return Err(VoiceoverError::BackendUnavailable(format!(
                "{} --version exited with code {:?}",
                self.bin_path.display(),
                output.status.code()
            )));
        }
        log::debug!(
            "Using {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

fn unavailable(bin_path: &Path, e: std::io::Error) -> VoiceoverError {
    if e.kind() == std::io::ErrorKind::NotFound {
        VoiceoverError::BackendUnavailable(INSTALL_HINT.to_string())
    } else {
        VoiceoverError::BackendUnavailable(format!("{}: {e}", bin_path.display()))
    }
}

fn backend_io(e: std::io::Error) -> VoiceoverError {
    VoiceoverError::backend(IDENTIFIER, e.to_string())
}

impl SpeechBackend for EspeakBackend {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn config(&self) -> serde_json::Value {
        json!({
            "voice": self.params.voice,
            "rate": self.params.rate,
            "pitch": self.params.pitch,
        })
    }

    fn generate(&mut self, text: &str, audio_path: &Path) -> Result<BackendOutput, VoiceoverError> {
        let mut cmd = self.command();
        cmd.arg("-q")
            .arg("-v")
            .arg(&self.params.voice)
            .arg("-s")
            .arg(self.params.rate.to_string());
        if let Some(pitch) = self.params.pitch {
            cmd.arg("-p").arg(pitch.to_string());
        }
        cmd.arg("-w")
            .arg(audio_path)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(backend_io)?;
        if let Some(mut stdin) = child.stdin.take() {
            // espeak-ng reads stdin line by line; the last line needs its terminator.
            stdin.write_all(text.as_bytes()).map_err(backend_io)?;
            stdin.write_all(b"\n").map_err(backend_io)?;
        }

        let output = child.wait_with_output().map_err(backend_io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceoverError::backend(
                IDENTIFIER,
                format!("espeak-ng exited with code {:?}: {stderr}", output.status.code()),
            ));
        }

        log::info!("espeak-ng wrote {}", audio_path.display());
        Ok(BackendOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::{backend_io, EspeakBackend, EspeakParams};
    use crate::audio::duration_secs;
    use crate::error::VoiceoverError;
    use crate::SpeechBackend;
    use std::path::PathBuf;
    use std::process::Command;

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn missing_binary_is_reported_as_unavailable() {
        let result = EspeakBackend::with_espeak(
            EspeakParams::default(),
            Some(PathBuf::from("/nonexistent/espeak-ng")),
            None,
        );
        assert!(matches!(
            result,
            Err(VoiceoverError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn process_io_failures_are_backend_errors() {
        let err = backend_io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        match err {
            VoiceoverError::Backend { service, .. } => assert_eq!(service, "espeak"),
            other => panic!("unexpected {other:?}"),
        }

        // Binary removed after construction.
        let mut backend = EspeakBackend {
            params: EspeakParams::default(),
            bin_path: PathBuf::from("/nonexistent/espeak-ng"),
            data_path: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let err = backend
            .generate("Hello", &dir.path().join("x.wav"))
            .unwrap_err();
        assert!(matches!(err, VoiceoverError::Backend { .. }));
    }

    #[test]
    fn config_reflects_params() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_available() {
            return;
        }
        let backend = EspeakBackend::with_params(EspeakParams {
            voice: "en-gb".to_string(),
            rate: 150,
            pitch: Some(40),
        })
        .expect("espeak should start");
        assert_eq!(backend.identifier(), "espeak");
        assert_eq!(backend.config()["voice"], "en-gb");
        assert_eq!(backend.config()["pitch"], 40);
    }

    #[test]
    fn writes_playable_wav() {
        if !espeak_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.wav");
        let mut backend = EspeakBackend::new().expect("espeak should start");
        let output = backend.generate("Hello world", &path).expect("espeak should succeed");
        assert!(output.word_boundaries.is_none());
        assert!(duration_secs(&path).unwrap() > 0.1);
    }
}
