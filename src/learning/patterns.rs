//! Heuristic regex matchers that mine reusable patterns out of signal
//! output text.

use crate::models::PatternType;
use regex::Regex;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

/// A pattern mined from a single piece of output text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPattern {
    pub name: String,
    pub pattern_type: PatternType,
    pub trigger: String,
    pub template: String,
    pub examples: Vec<String>,
}

static GO_ERR_CHECK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"if\s+\w+(?:,\s*\w+)?\s*:?=.*;\s*\w*[Ee]rr\w*\s*!=\s*nil|if\s+\w*[Ee]rr\w*\s*!=\s*nil").unwrap());

static RUST_ERR_CHECK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"if let Err\(\w*\)|match\s+\w+\s*\{\s*Err\(").unwrap());

static TABLE_TEST_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name:\s*"[^"]*""#).unwrap());

static FUNCTIONAL_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pub fn with_\w+|func With\w*\(").unwrap());

const MAX_REPRESENTATIVE_LEN: usize = 100;

/// Detects idiomatic error-handling checks for the two supported language
/// families (Go and Rust), requiring at least two occurrences of the
/// family's idiom before reporting a pattern.
#[must_use]
pub fn detect_error_handling(output: &str) -> Vec<DetectedPattern> {
    let mut found = Vec::new();
    for (lang, regex) in [("Go", &*GO_ERR_CHECK), ("Rust", &*RUST_ERR_CHECK)] {
        let examples: Vec<String> = regex.find_iter(output).map(|m| m.as_str().to_string()).collect();
        if examples.len() >= 2 {
            found.push(DetectedPattern {
                name: format!("{lang} Error Handling"),
                pattern_type: PatternType::Code,
                trigger: regex.as_str().to_string(),
                template: examples[0].clone(),
                examples,
            });
        }
    }
    found
}

/// Detects a table-driven test literal (repeated `name: "..."` case entries).
#[must_use]
pub fn detect_table_driven_test(output: &str) -> Option<DetectedPattern> {
    let examples: Vec<String> = TABLE_TEST_CASE.find_iter(output).map(|m| m.as_str().to_string()).collect();
    if examples.len() < 2 {
        return None;
    }
    Some(DetectedPattern {
        name: "Table-Driven Test".to_string(),
        pattern_type: PatternType::Code,
        trigger: "test case table".to_string(),
        template: examples[0].clone(),
        examples,
    })
}

/// Detects a functional-options / builder-style declaration pattern.
#[must_use]
pub fn detect_functional_options(output: &str) -> Option<DetectedPattern> {
    let examples: Vec<String> = FUNCTIONAL_OPTION.find_iter(output).map(|m| m.as_str().to_string()).collect();
    if examples.len() < 2 {
        return None;
    }
    Some(DetectedPattern {
        name: "Functional Options".to_string(),
        pattern_type: PatternType::Structural,
        trigger: "option-returning declaration".to_string(),
        template: examples[0].clone(),
        examples,
    })
}

/// Runs every detector over `output`, capping each pattern's examples at
/// `max_examples`.
#[must_use]
pub fn detect_all(output: &str, max_examples: usize) -> Vec<DetectedPattern> {
    let mut patterns = detect_error_handling(output);
    patterns.extend(detect_table_driven_test(output));
    patterns.extend(detect_functional_options(output));
    for pattern in &mut patterns {
        pattern.examples.truncate(max_examples.max(1));
    }
    patterns
}

/// A stable fingerprint over `(name, first 100 chars of representative
/// content)`, so repeated detection of the same pattern collapses instead of
/// duplicating.
#[must_use]
pub fn fingerprint(name: &str, representative: &str) -> String {
    let truncated: String = representative.chars().take(MAX_REPRESENTATIVE_LEN).collect();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    truncated.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
