//! CLI interface for learnmap

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{run_quiz, QuizMode, Study};
use crate::concept_map::RelationshipKind;
use crate::config::{self, Config, WORKSPACE_ENV};
use crate::llm::ChatClient;

#[derive(Parser)]
#[command(name = "learnmap")]
#[command(about = "Personal learning tracker: concept maps, explanations and balanced quizzes", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace directory (overrides config and LEARNMAP_WORKSPACE)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Alternative config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log lifecycle events (INFO level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a learning map for a topic
    #[command(alias = "m")]
    Map {
        /// Topic name, e.g. "Rust ownership"
        topic: String,
    },
    /// Write an explanation for a concept
    #[command(alias = "e")]
    Explain {
        /// Concept name or topic/concept
        concept: String,
    },
    /// Generate a quiz from a concept's explanation
    #[command(name = "gen-quiz", alias = "g")]
    GenQuiz {
        concept: String,
        /// Number of questions
        #[arg(short = 'n', long)]
        num_questions: Option<usize>,
        #[arg(long, value_enum, default_value_t = QuizMode::Auto)]
        mode: QuizMode,
    },
    /// Take a concept's quiz interactively
    #[command(alias = "q")]
    Quiz { concept: String },
    /// Check the answer-position balance of a saved quiz
    #[command(name = "check-quiz")]
    CheckQuiz {
        concept: String,
        /// Rebalance and rewrite the quiz if it is imbalanced
        #[arg(long)]
        fix: bool,
    },
    /// Record a quiz score (0-100) for a concept
    Score { concept: String, percent: f64 },
    /// List topics and progress
    #[command(alias = "t")]
    Topics {
        /// Remove a topic by id
        #[arg(long)]
        remove: Option<String>,
    },
    /// Link one concept to another in the knowledge graph
    Relate {
        /// Source concept name or topic/concept
        concept: String,
        /// Target concept id or name
        target: String,
        /// prerequisites, dependencies, related or enables
        #[arg(short, long, default_value = "related")]
        kind: String,
        /// Remove the link instead of adding it
        #[arg(long)]
        remove: bool,
    },
    /// Print a topic's knowledge graph as JSON
    Graph { topic: String },
    /// Show quiz quality history
    Monitor {
        /// Window for recent trends
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// Upgrade an older concept map file to the current format
    Migrate,
    /// Configure learnmap
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Store the API key in the keyring
        #[arg(long)]
        set_api_key: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<(Config, PathBuf)> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    let mut config = Config::load_from(&path)?;
    config.apply_overrides(std::env::var(WORKSPACE_ENV).ok(), cli.workspace.clone());
    Ok((config, path))
}

fn client(config: &Config) -> Result<ChatClient> {
    ChatClient::from_config(&config.llm)
}

pub fn run(cli: Cli) -> Result<()> {
    let (config, config_path) = load_config(&cli)?;

    match cli.command {
        Commands::Map { topic } => {
            let llm = client(&config)?;
            let mut study = Study::open(config)?;
            println!("Generating learning map for \"{}\"...", topic);
            let summary = study.generate_map(&llm, &topic)?;
            println!(
                "Topic '{}'{}: {} modules and {} concepts added",
                summary.topic_id,
                if summary.topic_created { " (new)" } else { "" },
                summary.modules_added,
                summary.concepts_added
            );
            if !summary.skipped.is_empty() {
                println!("Already present: {}", summary.skipped.join(", "));
            }
        }
        Commands::Explain { concept } => {
            let llm = client(&config)?;
            let mut study = Study::open(config)?;
            println!("Writing explanation for \"{}\"...", concept);
            let path = study.explain(&llm, &concept)?;
            println!("Explanation saved to {}", path.display());
        }
        Commands::GenQuiz { concept, num_questions, mode } => {
            let llm = client(&config)?;
            let mut study = Study::open(config)?;
            let outcome = study.generate_quiz(&llm, &concept, num_questions, mode)?;
            println!(
                "{} questions saved to {} (evenness {:.2}{})",
                outcome.quiz.len(),
                outcome.path.display(),
                outcome.report.score,
                if outcome.rebalanced { ", answers rebalanced" } else { "" }
            );
            println!("Quality report: {}", outcome.report_path.display());
        }
        Commands::Quiz { concept } => {
            let mut study = Study::open(config)?;
            let (topic_id, concept_id, quiz) = study.load_quiz(&concept)?;
            let stdin = std::io::stdin();
            let grade = run_quiz(&quiz, stdin.lock(), std::io::stdout())?;
            if let Some(grade) = grade {
                let best = study.record_score(&format!("{}/{}", topic_id, concept_id), grade.percent)?;
                println!("Best score for {}: {:.0}%", concept_id, best);
            }
        }
        Commands::CheckQuiz { concept, fix } => {
            let mut study = Study::open(config)?;
            let outcome = study.check_quiz(&concept, fix)?;
            print!("{}", outcome.before.render(&concept));
            match &outcome.after {
                Some(after) => println!("\nRebalanced: evenness {:.2} -> {:.2}", outcome.before.score, after.score),
                None if outcome.before.imbalanced => println!("\nRun with --fix to rebalance."),
                None => {}
            }
            println!("Report saved to {}", outcome.report_path.display());
        }
        Commands::Score { concept, percent } => {
            let mut study = Study::open(config)?;
            let best = study.record_score(&concept, percent)?;
            println!("Best score: {:.0}%", best);
        }
        Commands::Topics { remove } => {
            let mut study = Study::open(config)?;
            if let Some(id) = remove {
                study.remove_topic(&id)?;
                println!("Removed topic '{}'", id);
            }
            print!("{}", study.overview());
        }
        Commands::Relate { concept, target, kind, remove } => {
            let kind: RelationshipKind = kind.parse()?;
            let mut study = Study::open(config)?;
            let changed = study.relate(&concept, &target, kind, remove)?;
            let action = if remove { "Removed" } else { "Added" };
            if changed {
                println!("{} {} link {} -> {}", action, kind, concept, target);
            } else {
                println!("Nothing to do: {} link {} -> {} {}", kind, concept, target, if remove { "is absent" } else { "exists" });
            }
        }
        Commands::Graph { topic } => {
            let study = Study::open(config)?;
            let graph = study.graph(&topic)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Commands::Monitor { days } => {
            let study = Study::open(config)?;
            print!("{}", study.workspace().monitor().render(days)?);
        }
        Commands::Migrate => {
            let study = Study::open(config)?;
            if study.store().migration_backup().is_none() {
                println!("Concept map {} is already current", study.workspace().map_path().display());
            }
        }
        Commands::Config { show, set_api_key } => {
            if let Some(key) = set_api_key {
                crate::llm::keyring::set_api_key(&key).context("Failed to store API key")?;
                println!("API key stored securely.");
            }
            if show {
                println!("# {}", config_path.display());
                print!("{}", config.render());
            }
        }
    }

    Ok(())
}
