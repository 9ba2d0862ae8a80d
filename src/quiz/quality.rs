//! Answer-position quality checker
//!
//! Scores how evenly the correct answer is spread over the four option
//! positions. The score is the normalised total variation distance from the
//! uniform distribution, flipped so that 1.0 is perfectly even and 0.0 means
//! every answer sits at the same position.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::model::{Quiz, QuizValidationError, OPTION_COUNT};
use crate::concept_map::persist::atomic_write;

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_TOLERANCE: f64 = 0.1;
const EPSILON: f64 = 1e-9;

/// Largest possible total variation, reached when all answers share a position.
const MAX_VARIATION: f64 = 1.0 - 1.0 / OPTION_COUNT as f64;

/// Correct-answer count per position. Questions whose answer matches no
/// option are skipped.
pub fn position_counts(quiz: &Quiz) -> [usize; OPTION_COUNT] {
    let mut counts = [0; OPTION_COUNT];
    for idx in quiz.questions.iter().filter_map(|q| q.answer_index()) {
        if idx < OPTION_COUNT {
            counts[idx] += 1;
        }
    }
    counts
}

/// Evenness on a 0..=1 scale. An empty distribution is trivially even.
pub fn evenness_score(counts: &[usize; OPTION_COUNT]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 1.0;
    }
    let expected = total as f64 / OPTION_COUNT as f64;
    let abs_dev: f64 = counts.iter().map(|&c| (c as f64 - expected).abs()).sum();
    let variation = abs_dev / (2.0 * total as f64);
    (1.0 - variation / MAX_VARIATION).clamp(0.0, 1.0)
}

/// Best evenness any placement of `n` answers can reach.
///
/// With `r = n mod 4`, the best placement puts `r` positions one above the
/// rest, giving `1 - r(4 - r) / (3n)`.
pub fn best_achievable(n: usize) -> f64 {
    if n == 0 {
        return 1.0;
    }
    let r = (n % OPTION_COUNT) as f64;
    1.0 - r * (OPTION_COUNT as f64 - r) / (3.0 * n as f64)
}

/// Pearson chi-square of the counts against a uniform expectation.
pub fn chi_square(counts: &[usize; OPTION_COUNT]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let expected = total as f64 / OPTION_COUNT as f64;
    counts.iter().map(|&c| (c as f64 - expected).powi(2) / expected).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionStat {
    pub count: usize,
    pub expected: f64,
    /// `count - expected`
    pub delta: f64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_questions: usize,
    pub positions: [PositionStat; OPTION_COUNT],
    pub score: f64,
    pub chi_square: f64,
    pub threshold: f64,
    pub effective_threshold: f64,
    pub imbalanced: bool,
    pub recommendations: Vec<String>,
}

impl QualityReport {
    pub fn counts(&self) -> [usize; OPTION_COUNT] {
        let mut counts = [0; OPTION_COUNT];
        for (slot, stat) in counts.iter_mut().zip(&self.positions) {
            *slot = stat.count;
        }
        counts
    }

    /// Plain-text report; positions are shown 1-based.
    pub fn render(&self, label: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Quiz quality report: {}", label);
        let _ = writeln!(out, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out);
        let _ = writeln!(out, "Questions: {}", self.total_questions);
        let _ = writeln!(
            out,
            "Evenness score: {:.3} (threshold {:.3}, effective {:.3})",
            self.score, self.threshold, self.effective_threshold
        );
        let _ = writeln!(out, "Chi-square vs uniform: {:.3}", self.chi_square);
        let _ = writeln!(out, "Status: {}", if self.imbalanced { "IMBALANCED" } else { "OK" });
        let _ = writeln!(out);
        let _ = writeln!(out, "Answer positions:");
        for (i, stat) in self.positions.iter().enumerate() {
            let _ = writeln!(
                out,
                "  Position {}: {:>3} ({:>5.1}%)  expected {:.2}  delta {:+.2}",
                i + 1,
                stat.count,
                stat.share * 100.0,
                stat.expected,
                stat.delta
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommendations:");
        for rec in &self.recommendations {
            let _ = writeln!(out, "  - {}", rec);
        }
        out
    }
}

/// Write a rendered report as `<dir>/<concept_id>_quality_<YYYYmmdd_HHMMSS>.txt`.
pub fn save_report(dir: &Path, concept_id: &str, report: &QualityReport) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_quality_{}.txt", concept_id, stamp));
    atomic_write(&path, report.render(concept_id).as_bytes())?;
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizQualityChecker {
    threshold: f64,
    tolerance: f64,
}

impl Default for QuizQualityChecker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_TOLERANCE)
    }
}

impl QuizQualityChecker {
    pub fn new(threshold: f64, tolerance: f64) -> Self {
        Self { threshold: threshold.clamp(0.0, 1.0), tolerance: tolerance.max(0.0) }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Threshold lowered to what `n` questions can reach at best.
    pub fn effective_threshold(&self, n: usize) -> f64 {
        self.threshold.min(best_achievable(n))
    }

    /// Validate the quiz and score its answer distribution.
    pub fn check(&self, quiz: &Quiz) -> Result<QualityReport, QuizValidationError> {
        quiz.validate()?;
        Ok(self.report_for(position_counts(quiz)))
    }

    pub fn report_for(&self, counts: [usize; OPTION_COUNT]) -> QualityReport {
        let total: usize = counts.iter().sum();
        let expected = total as f64 / OPTION_COUNT as f64;
        let positions = counts.map(|count| PositionStat {
            count,
            expected,
            delta: count as f64 - expected,
            share: if total == 0 { 0.0 } else { count as f64 / total as f64 },
        });

        let score = evenness_score(&counts);
        let effective_threshold = self.effective_threshold(total);
        let imbalanced = score + EPSILON < effective_threshold;
        debug!(
            "Quality check: counts={:?} score={:.3} effective_threshold={:.3}",
            counts, score, effective_threshold
        );

        QualityReport {
            total_questions: total,
            positions,
            score,
            chi_square: chi_square(&counts),
            threshold: self.threshold,
            effective_threshold,
            imbalanced,
            recommendations: self.recommendations(&positions, imbalanced),
        }
    }

    fn recommendations(&self, positions: &[PositionStat; OPTION_COUNT], imbalanced: bool) -> Vec<String> {
        let ideal = 1.0 / OPTION_COUNT as f64;
        let mut recs: Vec<String> = positions
            .iter()
            .enumerate()
            .filter(|(_, s)| (s.share - ideal).abs() > self.tolerance)
            .map(|(i, s)| {
                let direction = if s.share > ideal { "over-used" } else { "under-used" };
                format!("Position {} is {} ({:.0}% of answers, ideal 25%)", i + 1, direction, s.share * 100.0)
            })
            .collect();

        if imbalanced {
            recs.push("Rebalance answer positions".to_string());
        }
        if recs.is_empty() {
            recs.push("Answer distribution is balanced".to_string());
        }
        recs
    }
}
