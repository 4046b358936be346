//! Subtitle availability probing results.

use serde::{Deserialize, Serialize};

/// Languages that raise the confidence score when present.
const PREFERRED_LANGS: [&str; 5] = ["zh-TW", "zh-Hant", "zh-CN", "zh-Hans", "en"];

/// Outcome of the pre-analysis subtitle probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStatus {
    /// Whether any usable subtitle track exists
    pub available: bool,

    /// Language codes of manually authored subtitles
    #[serde(default)]
    pub manual_subtitles: Vec<String>,

    /// Language codes of auto-generated captions
    #[serde(default)]
    pub auto_captions: Vec<String>,

    /// Track actually selected for analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_lang: Option<String>,

    /// Quality confidence in [0, 1]
    #[serde(default)]
    pub confidence_score: f64,
}

impl SubtitleStatus {
    /// Derive the status from the discovered tracks.
    ///
    /// Manual tracks score 0.9, auto-only 0.7; either gets +0.05 when a
    /// preferred language is among the candidates. No tracks at all is 0.0.
    pub fn from_tracks(
        manual_subtitles: Vec<String>,
        auto_captions: Vec<String>,
        selected_lang: Option<String>,
    ) -> Self {
        let has_preferred = |langs: &[String]| {
            langs
                .iter()
                .any(|l| PREFERRED_LANGS.iter().any(|p| p.eq_ignore_ascii_case(l)))
        };

        let confidence_score = if !manual_subtitles.is_empty() {
            if has_preferred(&manual_subtitles) {
                0.95
            } else {
                0.9
            }
        } else if !auto_captions.is_empty() {
            if has_preferred(&auto_captions) {
                0.75
            } else {
                0.7
            }
        } else {
            0.0
        };

        Self {
            available: !manual_subtitles.is_empty() || !auto_captions.is_empty(),
            manual_subtitles,
            auto_captions,
            selected_lang,
            confidence_score,
        }
    }

    /// Status for a video with no subtitle tracks (or a failed probe).
    pub fn unavailable() -> Self {
        Self {
            available: false,
            manual_subtitles: Vec::new(),
            auto_captions: Vec::new(),
            selected_lang: None,
            confidence_score: 0.0,
        }
    }
}
