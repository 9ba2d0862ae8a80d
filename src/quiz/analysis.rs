//! Explanation document analysis
//!
//! Counts the knowledge points of a markdown explanation to suggest how many
//! quiz questions it can support.

use serde::Serialize;

const EXAMPLE_MARKERS: &[&str] = &[
    "example:",
    "for example",
    "e.g.",
    "例如：",
    "示例：",
    "举例：",
    "比如：",
    "例子：",
    "实例：",
    "案例：",
    "演示：",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentAnalysis {
    pub headings: usize,
    pub subheadings: usize,
    pub code_blocks: usize,
    pub examples: usize,
}

impl DocumentAnalysis {
    pub fn knowledge_points(&self) -> usize {
        self.headings + self.subheadings + self.code_blocks + self.examples
    }

    pub fn recommended_questions(&self) -> usize {
        recommended_for(self.knowledge_points())
    }
}

/// Question count for `total` knowledge points.
pub fn recommended_for(total: usize) -> usize {
    match total {
        0..=3 => 3,
        4..=8 => total + 1,
        9..=15 => total,
        16..=25 => total.min(20),
        _ => (total / 2).clamp(15, 25),
    }
}

/// Lines inside fenced code are only scanned for the closing fence.
pub fn analyze_document(text: &str) -> DocumentAnalysis {
    let mut analysis = DocumentAnalysis::default();
    let mut in_code = false;

    for line in text.lines().map(str::trim) {
        if line.starts_with("```") {
            if !in_code {
                analysis.code_blocks += 1;
            }
            in_code = !in_code;
            continue;
        }
        if in_code {
            continue;
        }
        if line.starts_with("##") {
            analysis.subheadings += 1;
        } else if line.starts_with('#') {
            analysis.headings += 1;
        } else {
            let lower = line.to_lowercase();
            if EXAMPLE_MARKERS.iter().any(|m| lower.contains(m)) {
                analysis.examples += 1;
            }
        }
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_bands() {
        assert_eq!(recommended_for(0), 3);
        assert_eq!(recommended_for(3), 3);
        assert_eq!(recommended_for(4), 5);
        assert_eq!(recommended_for(8), 9);
        assert_eq!(recommended_for(12), 12);
        assert_eq!(recommended_for(22), 20);
        assert_eq!(recommended_for(26), 15);
        assert_eq!(recommended_for(40), 20);
        assert_eq!(recommended_for(100), 25);
    }

    #[test]
    fn test_analyze_counts_outside_code() {
        let doc = "# Ownership\n\
                   ## Moves\n\
                   For example: a String moves.\n\
                   ```rust\n\
                   # not a heading\n\
                   // example: not counted\n\
                   ```\n\
                   ## Borrowing\n\
                   ```\n\
                   let r = &x;\n\
                   ```\n";
        let analysis = analyze_document(doc);
        assert_eq!(
            analysis,
            DocumentAnalysis { headings: 1, subheadings: 2, code_blocks: 2, examples: 1 }
        );
        assert_eq!(analysis.recommended_questions(), 7);
    }

    #[test]
    fn test_unclosed_fence_counts_once() {
        assert_eq!(analyze_document("```\ncode\n## inside").code_blocks, 1);
        assert_eq!(analyze_document("```\ncode\n## inside").subheadings, 0);
    }
}
