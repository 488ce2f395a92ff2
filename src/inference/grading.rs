//! Derived outputs: letter grade, confidence and recommendation text

use serde::{Deserialize, Serialize};

use crate::preprocessing::config::subject_label;
use crate::training::Neighbor;

/// Confidence reported when the neighbor distances are unusable
pub const FALLBACK_CONFIDENCE: f64 = 0.6;

/// Letter grade band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Grade ladder; each band includes its lower bound.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            LetterGrade::A
        } else if score >= 80.0 {
            LetterGrade::B
        } else if score >= 70.0 {
            LetterGrade::C
        } else if score >= 60.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl std::fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `1 / (1 + mean distance)`, or [`FALLBACK_CONFIDENCE`] when there are no
/// neighbors or the mean is not a finite non-negative number.
pub fn confidence(neighbors: &[Neighbor]) -> f64 {
    if neighbors.is_empty() {
        return FALLBACK_CONFIDENCE;
    }
    let mean = neighbors.iter().map(|n| n.distance).sum::<f64>() / neighbors.len() as f64;
    confidence_from_mean(mean)
}

pub fn confidence_from_mean(mean_distance: f64) -> f64 {
    if !mean_distance.is_finite() || mean_distance < 0.0 {
        return FALLBACK_CONFIDENCE;
    }
    1.0 / (1.0 + mean_distance)
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Static study advice for a subject and grade
pub fn recommendation(subject: &str, grade: LetterGrade) -> String {
    let label = subject_label(subject);
    let focus = match label {
        "math" => "practice problem sets daily and review algebra and geometry fundamentals",
        "reading" => "read a wider range of texts and summarize each chapter in your own words",
        "writing" => "write short essays regularly and ask for feedback on structure and grammar",
        "science" => "review core concepts with diagrams and work through lab-style questions",
        "history" => "build timelines of key events and connect causes to consequences",
        "geography" => "study maps regularly and relate regions to their climate and economy",
        "physics" => "work through derivations step by step and practice unit analysis",
        "chemistry" => "memorize key reactions and practice stoichiometry problems",
        _ => "set a regular study schedule and review past assessments",
    };
    match grade {
        LetterGrade::A => format!("Excellent work in {}! Keep it up and consider advanced material.", label),
        LetterGrade::B => format!("Good performance in {}. To reach the top band, {}.", label, focus),
        LetterGrade::C => format!("Fair performance in {}. To improve, {}.", label, focus),
        LetterGrade::D => format!(
            "{} needs attention. We recommend you {} and seek extra help from a tutor.",
            capitalize(label),
            focus
        ),
        LetterGrade::F => format!(
            "{} is at risk. Meet with a teacher soon, {}, and schedule focused weekly sessions.",
            capitalize(label),
            focus
        ),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
