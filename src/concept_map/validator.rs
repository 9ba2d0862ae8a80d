//! Concept name checks for generated maps
//!
//! Generated names should each cover one focused idea. These checks flag
//! compound names, names that are too short or too long, umbrella terms
//! ("overview", "基础") and names phrased as an activity. Both English
//! and Chinese markers are recognized.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use super::draft::MapDraft;

/// Suitable name length in characters for CJK names
const CJK_CHARS: std::ops::RangeInclusive<usize> = 2..=8;
/// Suitable name length in words otherwise
const LATIN_WORDS: std::ops::RangeInclusive<usize> = 1..=5;

static COMPOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.+?)\s*(?:以及|与|和|及|、|\band\b|&|\bvs\.?\s|/)\s*(.+)$").expect("static compound pattern")
});

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[？！。，；：“”‘’（）【】?!;:]"#).expect("static punctuation pattern"));

static VERB_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:如何|怎样|学习|掌握|理解|使用|how\s+to\b|learning\s|understanding\s|mastering\s|using\s)")
        .expect("static verb phrase pattern")
});

const BROAD_KEYWORDS: &[&str] = &[
    "基础", "入门", "概述", "介绍", "总览", "综合", "全面", "完整", "整体", "系统", "通用", "常用", "基本", "核心",
    "重要", "主要", "关键", "basics", "introduction", "intro", "overview", "fundamentals", "essentials",
    "comprehensive", "complete", "general", "miscellaneous", "advanced topics",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameIssue {
    /// Joins several ideas; carries the parts it could be split into
    Compound(Vec<String>),
    TooShort,
    TooLong,
    /// Umbrella term instead of a concept
    TooBroad(String),
    Punctuation,
    /// Names an activity ("How to ...") rather than a concept
    VerbPhrase,
}

impl fmt::Display for NameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameIssue::Compound(parts) => write!(f, "combines several concepts; consider {}", parts.join(" / ")),
            NameIssue::TooShort => f.write_str("too short to be specific"),
            NameIssue::TooLong => f.write_str("too long; keep it to the core idea"),
            NameIssue::TooBroad(word) => write!(f, "too broad ('{}')", word),
            NameIssue::Punctuation => f.write_str("contains punctuation"),
            NameIssue::VerbPhrase => f.write_str("reads as an activity rather than a concept"),
        }
    }
}

/// Issues found for one name in a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameReview {
    pub name: String,
    pub issues: Vec<NameIssue>,
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

pub fn check_name(name: &str) -> Vec<NameIssue> {
    let name = name.trim();
    let mut issues = Vec::new();

    if let Some(caps) = COMPOUND.captures(name) {
        let parts: Vec<String> = [&caps[1], &caps[2]].iter().map(|p| p.trim().to_string()).collect();
        if parts.iter().all(|p| !p.is_empty()) {
            issues.push(NameIssue::Compound(parts));
        }
    }

    if name.chars().any(is_cjk) {
        let len = name.chars().filter(|c| !c.is_whitespace()).count();
        if len < *CJK_CHARS.start() {
            issues.push(NameIssue::TooShort);
        } else if len > *CJK_CHARS.end() {
            issues.push(NameIssue::TooLong);
        }
    } else {
        let words = name.split_whitespace().count();
        if name.chars().count() < 2 || words < *LATIN_WORDS.start() {
            issues.push(NameIssue::TooShort);
        } else if words > *LATIN_WORDS.end() {
            issues.push(NameIssue::TooLong);
        }
    }

    let lower = name.to_lowercase();
    if let Some(word) = BROAD_KEYWORDS.iter().find(|w| contains_term(&lower, w)) {
        issues.push(NameIssue::TooBroad(word.to_string()));
    }

    if PUNCTUATION.is_match(name) {
        issues.push(NameIssue::Punctuation);
    }
    if VERB_PHRASE.is_match(name) {
        issues.push(NameIssue::VerbPhrase);
    }
    issues
}

/// Latin terms must match whole words; CJK terms match anywhere.
fn contains_term(haystack: &str, term: &str) -> bool {
    if term.chars().any(is_cjk) {
        return haystack.contains(term);
    }
    haystack
        .match_indices(term)
        .any(|(start, _)| {
            let before = haystack[..start].chars().next_back();
            let after = haystack[start + term.len()..].chars().next();
            !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
        })
}

/// Check every module and concept name of a draft; only flagged names are returned.
pub fn review_draft(draft: &MapDraft) -> Vec<NameReview> {
    draft
        .learning_modules
        .iter()
        .flat_map(|module| std::iter::once(&module.module_name).chain(module.concepts.iter()))
        .filter_map(|name| {
            let issues = check_name(name);
            (!issues.is_empty()).then(|| NameReview { name: name.clone(), issues })
        })
        .collect()
}

/// Share of names with no issues, in `0.0..=1.0`; an empty list scores 1.
pub fn quality_score<'a>(names: impl IntoIterator<Item = &'a str>) -> f64 {
    let (total, clean) = names
        .into_iter()
        .fold((0usize, 0usize), |(total, clean), name| {
            (total + 1, clean + usize::from(check_name(name).is_empty()))
        });
    if total == 0 {
        1.0
    } else {
        clean as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_map::ModuleDraft;

    #[test]
    fn test_focused_names_pass() {
        for name in ["Borrowing", "Lifetime Elision", "Trait Objects", "所有权", "生命周期省略"] {
            assert!(check_name(name).is_empty(), "{}: {:?}", name, check_name(name));
        }
    }

    #[test]
    fn test_compound_names() {
        assert_eq!(
            check_name("Traits and Generics"),
            vec![NameIssue::Compound(vec!["Traits".to_string(), "Generics".to_string()])]
        );
        assert!(matches!(check_name("变量与类型")[0], NameIssue::Compound(_)));
        assert!(matches!(check_name("Stack/Heap")[0], NameIssue::Compound(_)));
        // "and" inside a word is not a connector
        assert!(check_name("Bandwidth").is_empty());
    }

    #[test]
    fn test_broad_and_length() {
        assert!(check_name("Rust Basics").contains(&NameIssue::TooBroad("basics".to_string())));
        assert!(check_name("Python基础").contains(&NameIssue::TooBroad("基础".to_string())));
        assert!(check_name("Basically Safe").is_empty());
        assert!(check_name("X").contains(&NameIssue::TooShort));
        assert!(check_name("变").contains(&NameIssue::TooShort));
        assert!(check_name("The many rules of pattern matching syntax").contains(&NameIssue::TooLong));
        assert!(check_name("面向对象程序设计的基本原则").contains(&NameIssue::TooLong));
    }

    #[test]
    fn test_format_issues() {
        assert!(check_name("How to use iterators").contains(&NameIssue::VerbPhrase));
        assert!(check_name("如何调试").contains(&NameIssue::VerbPhrase));
        assert!(check_name("What is a closure?").contains(&NameIssue::Punctuation));
        assert!(check_name("闭包（Closure）").contains(&NameIssue::Punctuation));
    }

    #[test]
    fn test_review_draft_lists_flagged_names() {
        let draft = MapDraft {
            main_concept: "Rust".to_string(),
            learning_modules: vec![ModuleDraft {
                module_name: "Overview".to_string(),
                description: String::new(),
                concepts: vec!["Borrowing".to_string(), "Structs and Enums".to_string()],
            }],
        };
        let reviews = review_draft(&draft);
        let names: Vec<&str> = reviews.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Overview", "Structs and Enums"]);
        assert!(reviews[0].issues[0].to_string().contains("overview"));

        let score = quality_score(["Borrowing", "Overview", "Moves", "A/B"]);
        assert!((score - 0.5).abs() < 1e-9);
        assert_eq!(quality_score(std::iter::empty()), 1.0);
    }
}
