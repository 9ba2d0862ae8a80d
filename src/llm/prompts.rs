//! Prompt builders for map, explanation and quiz generation

use super::Prompt;

const MAP_SYSTEM: &str = "You design learning curricula. Reply with a single JSON object and nothing else.";

const EXPLAIN_SYSTEM: &str = "You are a patient tutor writing beginner-friendly study notes in Markdown.";

const QUIZ_SYSTEM: &str =
    "You write multiple-choice quizzes. Reply with YAML only: no prose, no code fences.";

/// Ask for a hierarchical learning map of `topic`.
pub fn concept_map(topic: &str, existing: &[String]) -> Prompt {
    let existing_text = if existing.is_empty() {
        String::new()
    } else {
        format!("\n\nConcepts that already exist (do not repeat them):\n{}", existing.join(", "))
    };

    let user = format!(
        r#"Design a layered learning structure for the topic below.

Principles:
1. Split the topic into learning modules with a manageable number of core concepts each.
2. Order concepts from foundations to application, with clear dependencies.
3. Group related concepts in the same module.

Requirements:
- Each concept should take 30-60 minutes to learn.
- Names are short and specific; avoid compound or vague names.
- Decide the number of modules and concepts from the topic's complexity. Modules should not all have the same number of concepts.
- Before answering, check each module for obviously missing fundamentals and add them.

Topic: {topic}{existing_text}

Output only valid JSON in this shape (the counts here are illustrative):
{{
  "main_concept": "Topic name",
  "learning_modules": [
    {{
      "module_name": "Module name",
      "description": "One-line summary",
      "concepts": ["Concept A", "Concept B"]
    }}
  ]
}}"#
    );
    Prompt::new(user).with_system(MAP_SYSTEM)
}

/// Follow-up asking the model to repair output that did not parse.
pub fn reformulate_json(raw: &str) -> Prompt {
    let user = format!(
        "Convert the following text into strictly valid JSON with the keys \"main_concept\" and \
         \"learning_modules\" (each module has \"module_name\", \"description\" and \"concepts\"). \
         Output the JSON only.\n\n{}",
        raw
    );
    Prompt::new(user).with_system(MAP_SYSTEM).with_temperature(0.0)
}

pub fn explanation(concept: &str, topic: &str) -> Prompt {
    let user = format!(
        r#"Write a detailed, beginner-friendly explanation of the concept "{concept}" (part of "{topic}").

Include:
1. **Core definition**: what the concept is, in plain words.
2. **Key characteristics**: its main properties, each explained.
3. **Analogy**: at least one everyday example or analogy.
4. **Code example** (if applicable): a short, runnable, commented example.
5. **Common questions**: two or three frequent questions with answers.

Use Markdown with clear headings."#
    );
    Prompt::new(user).with_system(EXPLAIN_SYSTEM)
}

pub fn quiz(concept: &str, explanation: &str, count: usize) -> Prompt {
    let user = format!(
        r#"Based on the explanation of "{concept}" below, write {count} multiple-choice questions.

Explanation:
{explanation}

Output strictly in this YAML format:

- question: "First question"
  options:
    - "Option A"
    - "Option B"
    - "Option C"
    - "Option D"
  answer: "Full text of the correct option"

Rules:
1. Every question has exactly 4 distinct options.
2. `answer` is the complete text of one of the options.
3. Test understanding rather than memorised details, and cover every section of the explanation.
4. Vary the position of the correct option so each position is used about 25% of the time."#
    );
    Prompt::new(user).with_system(QUIZ_SYSTEM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_prompt_lists_existing() {
        let p = concept_map("Rust", &["Ownership".to_string(), "Traits".to_string()]);
        assert!(p.user.contains("Topic: Rust"));
        assert!(p.user.contains("Ownership, Traits"));
        assert!(concept_map("Rust", &[]).user.contains("Topic: Rust\n"));
    }

    #[test]
    fn test_quiz_prompt() {
        let p = quiz("Borrowing", "# Borrowing\n...", 6);
        assert!(p.user.contains("write 6 multiple-choice questions"));
        assert!(p.user.contains("# Borrowing"));
        assert!(p.system.is_some());
    }

    #[test]
    fn test_reformulate_is_deterministic() {
        assert_eq!(reformulate_json("{bad").temperature, Some(0.0));
    }
}
