//! Known remote Whisper models

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub multilingual: bool,
}

pub const KNOWN_MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "whisper-large-v3-turbo",
        description: "Fast and accurate, best for most use cases",
        multilingual: true,
    },
    ModelInfo {
        name: "whisper-large-v3",
        description: "Highest accuracy, slightly slower",
        multilingual: true,
    },
    ModelInfo {
        name: "distil-whisper-large-v3-en",
        description: "Fastest, English only",
        multilingual: false,
    },
];

pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    KNOWN_MODELS.iter().find(|m| m.name == name)
}
