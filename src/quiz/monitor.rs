//! Quality Monitor - running history of quiz quality checks
//!
//! Appends one record per generated quiz to `quality_monitor/quality_data.json`
//! and answers aggregate questions over that history.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::model::OPTION_COUNT;
use super::quality::{QualityReport, DEFAULT_TOLERANCE};
use crate::concept_map::persist::atomic_write;

pub const MONITOR_DIR: &str = "quality_monitor";
const DATA_FILE: &str = "quality_data.json";

/// One quality check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub concept: String,
    pub total_questions: usize,
    pub score: f64,
    pub position_counts: [usize; OPTION_COUNT],
    /// Whether the quiz was rebalanced before saving
    pub improved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_quizzes: usize,
    pub total_questions: usize,
    pub mean_score: f64,
    pub improved_count: usize,
    /// Percentage of quizzes that needed rebalancing
    pub improvement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionShare {
    pub count: usize,
    pub share: f64,
    pub deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionAnalysis {
    pub total_records: usize,
    pub positions: Vec<PositionShare>,
    pub max_deviation: f64,
    pub is_uniform: bool,
}

pub struct QualityMonitor {
    path: PathBuf,
    tolerance: f64,
}

impl QualityMonitor {
    /// Monitor rooted at `<workspace>/quality_monitor/`
    pub fn new(workspace: &Path) -> Self {
        Self { path: workspace.join(MONITOR_DIR).join(DATA_FILE), tolerance: DEFAULT_TOLERANCE }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<QualityRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn record(&self, topic: &str, concept: &str, report: &QualityReport, improved: bool) -> Result<QualityRecord> {
        let mut records = self.load()?;
        let record = QualityRecord {
            timestamp: Utc::now(),
            topic: topic.to_string(),
            concept: concept.to_string(),
            total_questions: report.total_questions,
            score: report.score,
            position_counts: report.counts(),
            improved,
        };
        records.push(record.clone());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&records)?;
        atomic_write(&self.path, &json).with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!("Recorded quality for {}/{}: score {:.3}", topic, concept, report.score);
        Ok(record)
    }

    pub fn overall_stats(&self) -> Result<OverallStats> {
        Ok(overall_stats(&self.load()?))
    }

    /// Records from the last `days` days. A window reaching past the
    /// representable date range keeps every record.
    pub fn trends(&self, days: i64) -> Result<Vec<QualityRecord>> {
        let cutoff = Duration::try_days(days.max(0)).and_then(|window| Utc::now().checked_sub_signed(window));
        let records = self.load()?;
        Ok(match cutoff {
            Some(cutoff) => records.into_iter().filter(|r| r.timestamp >= cutoff).collect(),
            None => records,
        })
    }

    pub fn distribution_analysis(&self) -> Result<DistributionAnalysis> {
        Ok(distribution_analysis(&self.load()?, self.tolerance))
    }

    /// Plain-text summary for the `monitor` command
    pub fn render(&self, days: i64) -> Result<String> {
        let stats = self.overall_stats()?;
        let recent = self.trends(days)?;
        let dist = self.distribution_analysis()?;

        let mut out = String::new();
        let _ = writeln!(out, "Quiz quality monitor");
        let _ = writeln!(out, "====================");
        let _ = writeln!(out, "Quizzes:          {}", stats.total_quizzes);
        let _ = writeln!(out, "Questions:        {}", stats.total_questions);
        let _ = writeln!(out, "Mean score:       {:.3}", stats.mean_score);
        let _ = writeln!(
            out,
            "Rebalanced:       {} ({:.1}%)",
            stats.improved_count, stats.improvement_rate
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Last {} days: {} quizzes", days, recent.len());
        if !recent.is_empty() {
            let mean = recent.iter().map(|r| r.score).sum::<f64>() / recent.len() as f64;
            let _ = writeln!(out, "  mean score {:.3}", mean);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Answer positions across all quizzes ({}):",
            if dist.is_uniform { "uniform" } else { "skewed" }
        );
        for (i, p) in dist.positions.iter().enumerate() {
            let _ = writeln!(
                out,
                "  Position {}: {:>4}  {:>5.1}%  deviation {:.3}",
                i + 1,
                p.count,
                p.share * 100.0,
                p.deviation
            );
        }
        let _ = writeln!(out, "  max deviation {:.3}", dist.max_deviation);
        Ok(out)
    }
}

pub fn overall_stats(records: &[QualityRecord]) -> OverallStats {
    if records.is_empty() {
        return OverallStats::default();
    }
    let total_quizzes = records.len();
    let improved_count = records.iter().filter(|r| r.improved).count();
    OverallStats {
        total_quizzes,
        total_questions: records.iter().map(|r| r.total_questions).sum(),
        mean_score: records.iter().map(|r| r.score).sum::<f64>() / total_quizzes as f64,
        improved_count,
        improvement_rate: improved_count as f64 * 100.0 / total_quizzes as f64,
    }
}

pub fn distribution_analysis(records: &[QualityRecord], tolerance: f64) -> DistributionAnalysis {
    let mut totals = [0usize; OPTION_COUNT];
    for record in records {
        for (slot, count) in totals.iter_mut().zip(record.position_counts) {
            *slot += count;
        }
    }
    let sum: usize = totals.iter().sum();
    let ideal = 1.0 / OPTION_COUNT as f64;

    let positions: Vec<PositionShare> = totals
        .iter()
        .map(|&count| {
            let share = if sum == 0 { 0.0 } else { count as f64 / sum as f64 };
            let deviation = if sum == 0 { 0.0 } else { (share - ideal).abs() };
            PositionShare { count, share, deviation }
        })
        .collect();
    let max_deviation = positions.iter().map(|p| p.deviation).fold(0.0, f64::max);
    if max_deviation > tolerance {
        warn!("Answer positions drift from uniform: max deviation {:.3}", max_deviation);
    }

    DistributionAnalysis {
        total_records: records.len(),
        positions,
        max_deviation,
        is_uniform: max_deviation <= tolerance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::quality::QuizQualityChecker;

    fn record(counts: [usize; 4], improved: bool, age_days: i64) -> QualityRecord {
        QualityRecord {
            timestamp: Utc::now() - Duration::days(age_days),
            topic: "rust".into(),
            concept: "borrowing".into(),
            total_questions: counts.iter().sum(),
            score: crate::quiz::quality::evenness_score(&counts),
            position_counts: counts,
            improved,
        }
    }

    #[test]
    fn test_record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = QualityMonitor::new(dir.path());
        assert!(monitor.load().unwrap().is_empty());

        let report = QuizQualityChecker::default().report_for([2, 1, 1, 0]);
        monitor.record("rust", "borrowing", &report, true).unwrap();
        monitor.record("rust", "lifetimes", &report, false).unwrap();

        let records = monitor.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position_counts, [2, 1, 1, 0]);
        assert_eq!(records[1].concept, "lifetimes");
        assert!(dir.path().join("quality_monitor").join("quality_data.json").exists());
    }

    #[test]
    fn test_overall_stats() {
        let stats = overall_stats(&[record([1, 1, 1, 1], false, 0), record([4, 0, 0, 0], true, 0)]);
        assert_eq!(stats.total_quizzes, 2);
        assert_eq!(stats.total_questions, 8);
        assert!((stats.mean_score - 0.5).abs() < 1e-12);
        assert_eq!(stats.improved_count, 1);
        assert_eq!(stats.improvement_rate, 50.0);
        assert_eq!(overall_stats(&[]), OverallStats::default());
    }

    #[test]
    fn test_distribution_analysis() {
        let uniform = distribution_analysis(&[record([2, 1, 1, 0], false, 0), record([0, 1, 1, 2], false, 0)], 0.1);
        assert!(uniform.is_uniform);
        assert_eq!(uniform.positions[0].count, 2);
        assert_eq!(uniform.max_deviation, 0.0);

        let skewed = distribution_analysis(&[record([6, 1, 1, 0], false, 0)], 0.1);
        assert!(!skewed.is_uniform);
        assert_eq!(skewed.max_deviation, 0.5);

        let empty = distribution_analysis(&[], 0.1);
        assert!(empty.is_uniform);
    }

    #[test]
    fn test_trends_filters_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = QualityMonitor::new(dir.path());
        let records = vec![record([1, 1, 1, 1], false, 40), record([1, 1, 1, 1], false, 2)];
        std::fs::create_dir_all(dir.path().join(MONITOR_DIR)).unwrap();
        std::fs::write(monitor.path(), serde_json::to_string(&records).unwrap()).unwrap();

        assert_eq!(monitor.trends(30).unwrap().len(), 1);
        assert_eq!(monitor.trends(60).unwrap().len(), 2);
        assert!(monitor.render(30).unwrap().contains("Last 30 days: 1 quizzes"));
    }

    #[test]
    fn test_trends_with_huge_window_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = QualityMonitor::new(dir.path());
        let records = vec![record([1, 1, 1, 1], false, 4000), record([1, 1, 1, 1], false, 1)];
        std::fs::create_dir_all(dir.path().join(MONITOR_DIR)).unwrap();
        std::fs::write(monitor.path(), serde_json::to_string(&records).unwrap()).unwrap();

        assert_eq!(monitor.trends(i64::MAX).unwrap().len(), 2);
        assert_eq!(monitor.trends(i64::MAX / 86_400).unwrap().len(), 2);
        assert_eq!(monitor.trends(-5).unwrap().len(), 0);
        assert!(monitor.render(i64::MAX).unwrap().contains("quizzes"));
    }
}
