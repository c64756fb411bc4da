//! Speaking-pace scoring for spoken transcripts.
//!
//! Pure and total: every transcript/duration pair yields a result. Pace
//! metrics only exist when a positive duration is known.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z']+").expect("Invalid word regex"));

/// Centre of the comfortable conversational range, words per minute.
const TARGET_WPM: f64 = 150.0;
const NORMAL_MIN_WPM: f64 = 120.0;
const NORMAL_MAX_WPM: f64 = 180.0;
const VERY_SLOW_WPM: f64 = 90.0;
const VERY_FAST_WPM: f64 = 210.0;
const MAX_EXTREME_PENALTY: f64 = 25.0;
/// Ceiling applied to samples too short to judge.
const SHORT_SAMPLE_CAP: f64 = 60.0;
const SHORT_SAMPLE_WORDS: usize = 5;
const SHORT_SAMPLE_MS: i64 = 2500;

/// Qualitative speaking pace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaceLevel {
    Slow,
    Normal,
    Fast,
}

impl PaceLevel {
    fn from_wpm(wpm: f64) -> Self {
        if wpm < NORMAL_MIN_WPM {
            PaceLevel::Slow
        } else if wpm <= NORMAL_MAX_WPM {
            PaceLevel::Normal
        } else {
            PaceLevel::Fast
        }
    }
}

/// Metrics that only make sense with a known duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaceMetrics {
    /// 0..=100
    pub fluency_score: u8,
    pub level: PaceLevel,
    /// Words per minute, rounded to one decimal.
    pub wpm: f64,
}

/// Outcome of scoring one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyResult {
    pub word_count: usize,
    /// Filler detection is not performed; always `None`.
    pub filler_count: Option<u32>,
    pub duration_ms: Option<i64>,
    pub pace: Option<PaceMetrics>,
}

impl FluencyResult {
    pub fn fluency_score(&self) -> Option<u8> {
        self.pace.map(|p| p.fluency_score)
    }

    pub fn level(&self) -> Option<PaceLevel> {
        self.pace.map(|p| p.level)
    }

    pub fn wpm(&self) -> Option<f64> {
        self.pace.map(|p| p.wpm)
    }
}

/// Count words: maximal runs of ASCII letters and apostrophes, case-folded.
pub fn count_words(transcript: &str) -> usize {
    WORD_RE.find_iter(&transcript.to_lowercase()).count()
}

/// Score a transcript given how long the speaker took.
pub fn score(transcript: &str, duration_ms: Option<i64>) -> FluencyResult {
    let word_count = count_words(transcript);
    let mut result = FluencyResult {
        word_count,
        filler_count: None,
        duration_ms,
        pace: None,
    };

    let Some(ms) = duration_ms.filter(|ms| *ms > 0) else {
        return result;
    };

    let minutes = ms as f64 / 60_000.0;
    if minutes <= 0.0 {
        return result;
    }
    let wpm = word_count as f64 / minutes;

    let mut raw = 100.0 - 0.6 * (wpm - TARGET_WPM).abs();
    if wpm < VERY_SLOW_WPM {
        raw -= ((VERY_SLOW_WPM - wpm) * 0.8).min(MAX_EXTREME_PENALTY);
    } else if wpm > VERY_FAST_WPM {
        raw -= ((wpm - VERY_FAST_WPM) * 0.6).min(MAX_EXTREME_PENALTY);
    }
    if word_count < SHORT_SAMPLE_WORDS || ms < SHORT_SAMPLE_MS {
        raw = raw.min(SHORT_SAMPLE_CAP);
    }

    let fluency_score = raw.round_ties_even().clamp(0.0, 100.0) as u8;

    result.pace = Some(PaceMetrics {
        fluency_score,
        level: PaceLevel::from_wpm(wpm),
        wpm: (wpm * 10.0).round_ties_even() / 10.0,
    });
    result
}
