//! Study workflows
//!
//! Each command loads the concept map, does its work and saves. Text
//! generation goes through [`TextGenerator`] so the workflows run the same
//! against the HTTP client and a test double.

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::concept_map::persist::atomic_write;
use crate::concept_map::{
    apply_draft_to, parse_draft, review_draft, ApplySummary, ConceptMapStore, GraphData, MapDraft,
    RelationshipKind, STATUS_EXPLAINED, STATUS_QUIZ_GENERATED,
};
use crate::config::Config;
use crate::llm::{prompts, strip_code_fences, TextGenerator};
use crate::quiz::model::OPTION_LETTERS;
use crate::quiz::quality::save_report;
use crate::quiz::{analyze_document, rebalance, Grade, QualityReport, Quiz, QuizQualityChecker};
use crate::slug::slugify;
use crate::workspace::{ConceptRef, Workspace};

/// How the question count of a new quiz is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum QuizMode {
    /// Use `-n` if given, otherwise derive it from the explanation
    #[default]
    Auto,
    /// Always use `-n`
    Fixed,
}

/// Result of [`Study::generate_quiz`]
#[derive(Debug, Clone)]
pub struct QuizOutcome {
    pub topic_id: String,
    pub concept_id: String,
    pub path: PathBuf,
    pub quiz: Quiz,
    /// Report for the saved (possibly rebalanced) quiz
    pub report: QualityReport,
    pub rebalanced: bool,
    pub report_path: PathBuf,
}

/// Result of [`Study::check_quiz`]
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub before: QualityReport,
    /// Present when the quiz was rebalanced and rewritten
    pub after: Option<QualityReport>,
    pub report_path: PathBuf,
}

/// Open workspace: configuration plus the loaded concept map
pub struct Study {
    workspace: Workspace,
    config: Config,
    store: ConceptMapStore,
}

impl Study {
    pub fn open(config: Config) -> Result<Self> {
        let workspace = Workspace::from_config(&config);
        let store = workspace
            .open_store()
            .with_context(|| format!("Failed to open concept map {}", workspace.map_path().display()))?;
        if let Some(backup) = store.migration_backup() {
            println!("Concept map upgraded to the current format (backup: {})", backup.display());
        }
        Ok(Self { workspace, config, store })
    }

    pub fn store(&self) -> &ConceptMapStore {
        &self.store
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn checker(&self) -> QuizQualityChecker {
        QuizQualityChecker::new(self.config.quiz.quality_threshold, self.config.quiz.tolerance)
    }

    fn resolve(&self, reference: &str) -> Result<(String, String)> {
        ConceptRef::parse(reference)
            .resolve(&self.store)
            .with_context(|| format!("Cannot find concept '{}'", reference))
    }

    /// Ask for a learning map of `topic` and merge it into the store.
    ///
    /// The map is filed under the slug of `topic`, the same topic whose
    /// concepts are listed to the model as already present.
    pub fn generate_map(&mut self, llm: &dyn TextGenerator, topic: &str) -> Result<ApplySummary> {
        let topic_id = slugify(topic);
        if topic_id.is_empty() {
            bail!("Topic '{}' does not produce a usable id", topic);
        }
        let existing: Vec<String> = self
            .store
            .get_topic(&topic_id)
            .map(|t| t.concepts.values().map(|c| c.name.clone()).collect())
            .unwrap_or_default();

        let prompt = prompts::concept_map(topic, &existing).with_model(&self.config.llm.model);
        let response = llm.generate(&prompt).context("Concept map generation failed")?;
        let draft = self.parse_or_reformulate(llm, &response)?;
        if slugify(&draft.main_concept) != topic_id {
            info!("Model named the topic '{}'; filing it under '{}'", draft.main_concept, topic_id);
        }
        for review in review_draft(&draft) {
            for issue in &review.issues {
                warn!("Concept name '{}': {}", review.name, issue);
            }
        }

        let summary = apply_draft_to(&mut self.store, &topic_id, topic.trim(), &draft)?;
        self.store.save()?;
        info!(
            "Map for '{}': {} modules, {} concepts added",
            summary.topic_id, summary.modules_added, summary.concepts_added
        );
        Ok(summary)
    }

    fn parse_or_reformulate(&self, llm: &dyn TextGenerator, response: &str) -> Result<MapDraft> {
        if let Some(draft) = parse_draft(response) {
            return Ok(draft);
        }
        warn!("Map response was not valid JSON, asking for a strict reformulation");
        let prompt = prompts::reformulate_json(response).with_model(&self.config.llm.model);
        let retry = llm.generate(&prompt).context("Reformulation request failed")?;
        match parse_draft(&retry) {
            Some(draft) => Ok(draft),
            None => bail!("Could not parse a concept map from the model output:\n{}", retry),
        }
    }

    /// Write a markdown explanation for a concept and mark it explained.
    pub fn explain(&mut self, llm: &dyn TextGenerator, reference: &str) -> Result<PathBuf> {
        let (topic_id, concept_id) = self.resolve(reference)?;
        let concept_name = self
            .store
            .get_concept(&topic_id, &concept_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| concept_id.clone());
        let topic_name = self
            .store
            .get_topic(&topic_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| topic_id.clone());

        let prompt = prompts::explanation(&concept_name, &topic_name).with_model(&self.config.llm.explain_model);
        let text = llm.generate(&prompt).context("Explanation generation failed")?;

        let path = self.workspace.explanation_path(&topic_id, &concept_id);
        write_file(&path, text.trim().as_bytes())?;
        self.store.update_status(&topic_id, &concept_id, STATUS_EXPLAINED, true)?;
        self.store.save()?;
        info!("Explanation for {}/{} written to {}", topic_id, concept_id, path.display());
        Ok(path)
    }

    fn question_count(&self, requested: Option<usize>, mode: QuizMode, explanation: &str) -> Result<usize> {
        let limits = &self.config.quiz;
        match (requested, mode) {
            (Some(n), _) => {
                if n < limits.min_questions {
                    warn!("{} questions is below the minimum, using {}", n, limits.min_questions);
                    Ok(limits.min_questions)
                } else {
                    if n > limits.max_questions {
                        warn!("{} questions is more than the suggested maximum of {}", n, limits.max_questions);
                    }
                    Ok(n)
                }
            }
            (None, QuizMode::Fixed) => bail!("--mode fixed needs a question count (-n)"),
            (None, QuizMode::Auto) => {
                let analysis = analyze_document(explanation);
                info!(
                    "Explanation has {} knowledge points, suggesting {} questions",
                    analysis.knowledge_points(),
                    analysis.recommended_questions()
                );
                Ok(analysis.recommended_questions())
            }
        }
    }

    /// Generate, validate, balance and save a quiz for an explained concept.
    pub fn generate_quiz(
        &mut self,
        llm: &dyn TextGenerator,
        reference: &str,
        count: Option<usize>,
        mode: QuizMode,
    ) -> Result<QuizOutcome> {
        let (topic_id, concept_id) = self.resolve(reference)?;
        let explanation_path = self.workspace.explanation_path(&topic_id, &concept_id);
        if !explanation_path.exists() {
            bail!(
                "No explanation for '{}' yet. Run 'learnmap explain {}/{}' first.",
                reference,
                topic_id,
                concept_id
            );
        }
        let explanation = std::fs::read_to_string(&explanation_path)
            .with_context(|| format!("Failed to read {}", explanation_path.display()))?;
        let count = self.question_count(count, mode, &explanation)?;
        let concept_name = self
            .store
            .get_concept(&topic_id, &concept_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| concept_id.clone());

        let quiz = self.request_valid_quiz(llm, &concept_name, &explanation, count)?;

        let checker = self.checker();
        let initial = checker.check(&quiz)?;
        let (quiz, report, rebalanced) = if initial.imbalanced {
            let balanced = rebalance(&quiz)?;
            let after = checker.check(&balanced)?;
            info!("Rebalanced quiz: score {:.3} -> {:.3}", initial.score, after.score);
            (balanced, after, true)
        } else {
            (quiz, initial, false)
        };

        let path = self.workspace.quiz_path(&topic_id, &concept_id);
        write_file(&path, quiz.to_yaml_string()?.as_bytes())?;
        let report_path = save_report(&self.workspace.quality_reports_dir(&topic_id), &concept_id, &report)
            .context("Failed to write quality report")?;

        self.store.update_status(&topic_id, &concept_id, STATUS_QUIZ_GENERATED, true)?;
        self.store.save()?;

        let monitor = self.workspace.monitor().with_tolerance(self.config.quiz.tolerance);
        if let Err(e) = monitor.record(&topic_id, &concept_id, &report, rebalanced) {
            warn!("Could not record quiz quality: {:#}", e);
        }

        Ok(QuizOutcome { topic_id, concept_id, path, quiz, report, rebalanced, report_path })
    }

    fn request_valid_quiz(
        &self,
        llm: &dyn TextGenerator,
        concept_name: &str,
        explanation: &str,
        count: usize,
    ) -> Result<Quiz> {
        let attempts = self.config.quiz.generation_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            let temperature = self.config.llm.temperature + 0.1 * attempt as f32;
            let prompt = prompts::quiz(concept_name, explanation, count)
                .with_model(&self.config.llm.model)
                .with_temperature(temperature);
            info!("Quiz generation attempt {}/{} ({} questions)", attempt + 1, attempts, count);

            let response = match llm.generate(&prompt) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Attempt {} failed: {:#}", attempt + 1, e);
                    last_error = Some(e);
                    continue;
                }
            };
            match Quiz::from_yaml_str(strip_code_fences(&response)) {
                Ok(quiz) => return Ok(quiz),
                Err(e) => {
                    warn!("Attempt {} produced an invalid quiz: {}", attempt + 1, e);
                    last_error = Some(e.into());
                }
            }
        }
        let cause = last_error.map(|e| format!("{:#}", e)).unwrap_or_default();
        bail!("No valid quiz after {} attempts: {}", attempts, cause)
    }

    /// Load and validate the saved quiz for a concept.
    pub fn load_quiz(&self, reference: &str) -> Result<(String, String, Quiz)> {
        let (topic_id, concept_id) = self.resolve(reference)?;
        let path = self.workspace.quiz_path(&topic_id, &concept_id);
        if !path.exists() {
            bail!("No quiz for '{}' yet. Run 'learnmap gen-quiz {}/{}' first.", reference, topic_id, concept_id);
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let quiz = Quiz::from_yaml_str(&text).with_context(|| format!("Quiz file {} is invalid", path.display()))?;
        Ok((topic_id, concept_id, quiz))
    }

    /// Record a quiz result; returns the best score after the update.
    pub fn record_score(&mut self, reference: &str, percent: f64) -> Result<f64> {
        let (topic_id, concept_id) = self.resolve(reference)?;
        let best = self.store.update_mastery(&topic_id, &concept_id, percent)?;
        self.store.save()?;
        Ok(best)
    }

    /// Quality-check a saved quiz; with `fix`, rebalance an imbalanced one in place.
    pub fn check_quiz(&mut self, reference: &str, fix: bool) -> Result<CheckOutcome> {
        let (topic_id, concept_id, quiz) = self.load_quiz(reference)?;
        let checker = self.checker();
        let before = checker.check(&quiz)?;

        let mut after = None;
        if fix && before.imbalanced {
            let balanced = rebalance(&quiz)?;
            let report = checker.check(&balanced)?;
            write_file(&self.workspace.quiz_path(&topic_id, &concept_id), balanced.to_yaml_string()?.as_bytes())?;
            let monitor = self.workspace.monitor().with_tolerance(self.config.quiz.tolerance);
            if let Err(e) = monitor.record(&topic_id, &concept_id, &report, true) {
                warn!("Could not record quiz quality: {:#}", e);
            }
            after = Some(report);
        }

        let saved = after.as_ref().unwrap_or(&before);
        let report_path = save_report(&self.workspace.quality_reports_dir(&topic_id), &concept_id, saved)
            .context("Failed to write quality report")?;
        Ok(CheckOutcome { before, after, report_path })
    }

    /// Text listing of topics with progress counts.
    pub fn overview(&self) -> String {
        let topics = self.store.list_topics();
        if topics.is_empty() {
            return "No topics yet. Run 'learnmap map <TOPIC>' to create one.\n".to_string();
        }
        let mut out = String::new();
        for (id, topic) in topics.iter() {
            let stats = topic.stats();
            let mastery = stats
                .mean_mastery
                .map(|m| format!("{:.0}%", m))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{} ({}): {} concepts, {} explained, {} quizzed, {} attempted, mean best score {}",
                topic.name, id, stats.total, stats.explained, stats.quizzed, stats.attempted, mastery
            );
        }
        out
    }

    /// Add or remove a `kind` edge from the concept at `reference` to `target`.
    /// Returns whether the store changed.
    pub fn relate(&mut self, reference: &str, target: &str, kind: RelationshipKind, remove: bool) -> Result<bool> {
        let (topic_id, concept_id) = self.resolve(reference)?;
        let target = slugify(target);
        let changed = if remove {
            self.store.remove_relationship(&concept_id, &target, kind, Some(&topic_id))?
        } else {
            self.store.add_relationship(&concept_id, &target, kind, Some(&topic_id))?
        };
        if changed {
            self.store.save()?;
        }
        Ok(changed)
    }

    pub fn graph(&self, topic: &str) -> Result<GraphData> {
        Ok(self.store.get_graph_data(&slugify(topic))?)
    }

    pub fn remove_topic(&mut self, topic_id: &str) -> Result<()> {
        let topic = self.store.remove_topic(topic_id)?;
        self.store.save()?;
        info!("Removed topic '{}' ({} concepts)", topic_id, topic.concepts.len());
        Ok(())
    }
}

fn write_file(path: &std::path::Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    atomic_write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Parse an answer letter (`A`..`D`, case-insensitive).
pub fn parse_choice(input: &str) -> Option<usize> {
    let input = input.trim();
    OPTION_LETTERS.iter().position(|l| l.eq_ignore_ascii_case(input))
}

/// Present each question and read one letter per question.
///
/// Returns `None` when the user enters an empty line or input ends,
/// in which case nothing should be recorded.
pub fn run_quiz<R: BufRead, W: Write>(quiz: &Quiz, mut input: R, mut output: W) -> Result<Option<Grade>> {
    let mut choices = Vec::with_capacity(quiz.len());
    for (i, question) in quiz.questions.iter().enumerate() {
        writeln!(output, "\n{}. {}", i + 1, question.question)?;
        for (letter, option) in OPTION_LETTERS.iter().zip(&question.options) {
            writeln!(output, "   {}) {}", letter, option)?;
        }
        loop {
            write!(output, "Answer (A-D, empty to quit): ")?;
            output.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 || line.trim().is_empty() {
                writeln!(output, "\nQuiz cancelled, nothing recorded.")?;
                return Ok(None);
            }
            match parse_choice(&line) {
                Some(choice) => {
                    choices.push(choice);
                    break;
                }
                None => writeln!(output, "Please enter A, B, C or D.")?,
            }
        }
    }

    let grade = quiz.grade(&choices);
    writeln!(output, "\nScore: {}/{} ({:.0}%)", grade.correct, grade.total, grade.percent)?;
    for (i, (question, choice)) in quiz.questions.iter().zip(&choices).enumerate() {
        if question.answer_index() != Some(*choice) {
            writeln!(output, "  {}. correct answer: {}", i + 1, question.answer)?;
        }
    }
    Ok(Some(grade))
}
