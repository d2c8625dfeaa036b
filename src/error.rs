/// Errors raised while synthesizing narration or querying its timing.
#[derive(thiserror::Error, Debug)]
pub enum VoiceoverError {
    #[error("Malformed bookmark tag near {0:?}. Expected <bookmark mark='NAME'/>")]
    MalformedBookmark(String),
    #[error("Speech backend '{service}' failed: {message}")]
    Backend { service: String, message: String },
    #[error("Speech backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error(
        "Word boundaries are required for timing with bookmarks. This speech backend \
         did not provide them; configure a transcription model (e.g. `base`) together \
         with a transcriber so word boundaries can be derived from the audio."
    )]
    BookmarksUnsupported,
    #[error("There is no <bookmark mark='{0}'/> in the narration text")]
    UnknownBookmark(String),
    #[error("At least one word boundary is required to build a time interpolator")]
    NoWordBoundaries,
    #[error("No voiceover is active. Call add_voiceover_text() first.")]
    NoActiveNarration,
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Failed to persist temp file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl VoiceoverError {
    pub(crate) fn backend(service: &str, message: impl Into<String>) -> Self {
        VoiceoverError::Backend {
            service: service.to_string(),
            message: message.into(),
        }
    }
}
