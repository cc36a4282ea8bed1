//! Quiz/flashcard bundles: parsing generated JSON, validation, scoring.
//!
//! The generator is expected to answer with one JSON object, either bare
//! or inside a Markdown code fence (```` ```json ```` or ```` ``` ````),
//! possibly with prose around it. [`parse_bundle`] accepts all of these
//! and reports anything else as a typed [`QuizError`]; it never falls
//! back to an empty quiz.
//!
//! # Schema
//!
//! ```json
//! {
//!   "mcqs": [{ "question": "…", "options": ["…","…","…","…"], "answer": "…", "explanation": "…" }],
//!   "flashcards": [{ "term": "…", "definition": "…" }]
//! }
//! ```
//!
//! `question` is the canonical key. `questions` is accepted on input only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MCQ_COUNT: usize = 5;
pub const OPTION_COUNT: usize = 4;
pub const FLASHCARD_COUNT: usize = 3;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("quiz response is not valid JSON: {reason}")]
    MalformedJson { reason: String, raw: String },
    #[error("quiz bundle violates the schema: {0}")]
    InvalidBundle(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mcq {
    #[serde(alias = "questions")]
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

/// A validated quiz: 5 MCQs and 3 flashcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizBundle {
    pub mcqs: Vec<Mcq>,
    pub flashcards: Vec<Flashcard>,
}

impl QuizBundle {
    /// Enforce the counts and the answer-is-an-option rule.
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.mcqs.len() != MCQ_COUNT {
            return Err(QuizError::InvalidBundle(format!(
                "expected {} mcqs, got {}",
                MCQ_COUNT,
                self.mcqs.len()
            )));
        }
        if self.flashcards.len() != FLASHCARD_COUNT {
            return Err(QuizError::InvalidBundle(format!(
                "expected {} flashcards, got {}",
                FLASHCARD_COUNT,
                self.flashcards.len()
            )));
        }
        for (i, mcq) in self.mcqs.iter().enumerate() {
            let n = i + 1;
            if mcq.options.len() != OPTION_COUNT {
                return Err(QuizError::InvalidBundle(format!(
                    "question {} has {} options, expected {}",
                    n,
                    mcq.options.len(),
                    OPTION_COUNT
                )));
            }
            if !mcq.options.contains(&mcq.answer) {
                return Err(QuizError::InvalidBundle(format!(
                    "question {} answer {:?} is not one of its options",
                    n, mcq.answer
                )));
            }
        }
        Ok(())
    }
}

/// Parse and validate a generated quiz response.
///
/// Candidates are tried in order: the whole response, the body of the
/// first code fence, then each balanced `{…}` in the text. The first one
/// that deserializes as a bundle is validated and returned.
pub fn parse_bundle(response: &str) -> Result<QuizBundle, QuizError> {
    let mut first_error: Option<String> = None;
    for candidate in json_candidates(response) {
        match serde_json::from_str::<QuizBundle>(candidate) {
            Ok(bundle) => {
                bundle.validate()?;
                return Ok(bundle);
            }
            Err(e) if candidate.starts_with('{') => {
                first_error.get_or_insert_with(|| e.to_string());
            }
            Err(_) => {}
        }
    }
    Err(QuizError::MalformedJson {
        reason: first_error.unwrap_or_else(|| "no JSON object found".to_string()),
        raw: response.to_string(),
    })
}

fn json_candidates(response: &str) -> Vec<&str> {
    let trimmed = response.trim();
    let mut candidates = vec![trimmed];
    if let Some(body) = fenced_body(trimmed) {
        candidates.push(body.trim());
    }
    candidates.extend(
        trimmed
            .char_indices()
            .filter(|&(_, c)| c == '{')
            .filter_map(|(i, _)| find_balanced_object(&trimmed[i..])),
    );
    candidates
}

/// Body of the first code fence, without its info string (`json`, ...).
/// An unclosed fence runs to the end of the text.
fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = match after.find('\n') {
        Some(nl) if !after[..nl].contains('{') => &after[nl + 1..],
        _ => after,
    };
    Some(match after.find("```") {
        Some(end) => &after[..end],
        None => after,
    })
}

/// Return the prefix of `s` (which starts with `{`) up to its matching
/// `}`, honoring string literals and escapes.
fn find_balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Answers keyed by 1-based question number.
pub type QuizAnswers = BTreeMap<usize, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect { given: String },
    NotAnswered,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    /// 1-based question number.
    pub number: usize,
    pub outcome: Outcome,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizReport {
    pub results: Vec<QuestionResult>,
    pub correct: usize,
    pub total: usize,
}

/// Score `answers` against `bundle`. Matching is exact and case-sensitive.
pub fn score(bundle: &QuizBundle, answers: &QuizAnswers) -> QuizReport {
    let results: Vec<QuestionResult> = bundle
        .mcqs
        .iter()
        .enumerate()
        .map(|(i, mcq)| {
            let number = i + 1;
            let outcome = match answers.get(&number) {
                None => Outcome::NotAnswered,
                Some(given) if *given == mcq.answer => Outcome::Correct,
                Some(given) => Outcome::Incorrect {
                    given: given.clone(),
                },
            };
            QuestionResult {
                number,
                outcome,
                correct_answer: mcq.answer.clone(),
                explanation: mcq.explanation.clone(),
            }
        })
        .collect();
    let correct = results
        .iter()
        .filter(|r| r.outcome == Outcome::Correct)
        .count();
    QuizReport {
        total: results.len(),
        correct,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq_json(n: usize, key: &str) -> String {
        format!(
            r#"{{"{key}": "Q{n}?", "options": ["a{n}", "b{n}", "c{n}", "d{n}"], "answer": "b{n}", "explanation": "because {n}"}}"#
        )
    }

    fn bundle_json(mcqs: usize, cards: usize) -> String {
        let mcqs: Vec<String> = (1..=mcqs).map(|n| mcq_json(n, "question")).collect();
        let cards: Vec<String> = (1..=cards)
            .map(|n| format!(r#"{{"term": "t{n}", "definition": "d{n}"}}"#))
            .collect();
        format!(
            r#"{{"mcqs": [{}], "flashcards": [{}]}}"#,
            mcqs.join(","),
            cards.join(",")
        )
    }

    #[test]
    fn parses_unfenced_json() {
        let bundle = parse_bundle(&bundle_json(5, 3)).unwrap();
        assert_eq!(bundle.mcqs.len(), 5);
        assert_eq!(bundle.flashcards.len(), 3);
        assert_eq!(bundle.mcqs[0].question, "Q1?");
    }

    #[test]
    fn parses_json_fence_with_prose() {
        let text = format!(
            "Here is your quiz:\n```json\n{}\n```\nGood luck!",
            bundle_json(5, 3)
        );
        assert!(parse_bundle(&text).is_ok());
    }

    #[test]
    fn parses_bare_fence() {
        let text = format!("```\n{}\n```", bundle_json(5, 3));
        assert!(parse_bundle(&text).is_ok());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_parser() {
        let json = bundle_json(5, 3).replacen("because 1", "set {x | x > 0}", 1);
        let bundle = parse_bundle(&json).unwrap();
        assert_eq!(bundle.mcqs[0].explanation, "set {x | x > 0}");
    }

    #[test]
    fn backticks_inside_unfenced_strings_are_kept() {
        let json = bundle_json(5, 3).replacen(
            "because 1",
            "Write it as ```print(x)``` in Python",
            1,
        );
        let bundle = parse_bundle(&json).unwrap();
        assert_eq!(
            bundle.mcqs[0].explanation,
            "Write it as ```print(x)``` in Python"
        );
    }

    #[test]
    fn backticks_inside_fenced_strings_are_kept() {
        let json = bundle_json(5, 3).replacen("because 2", "see ```code```", 1);
        let text = format!("```json\n{}\n```", json);
        let bundle = parse_bundle(&text).unwrap();
        assert_eq!(bundle.mcqs[1].explanation, "see ```code```");
    }

    #[test]
    fn braces_in_leading_prose_are_skipped() {
        let text = format!(
            "Here is the quiz for the set {{1,2,3}} topic:\n{}",
            bundle_json(5, 3)
        );
        let bundle = parse_bundle(&text).unwrap();
        assert_eq!(bundle.mcqs.len(), 5);
    }

    #[test]
    fn invalid_bundle_after_prose_is_still_reported_as_invalid() {
        let text = format!("Quiz {{draft}}:\n{}", bundle_json(4, 3));
        assert!(matches!(
            parse_bundle(&text),
            Err(QuizError::InvalidBundle(_))
        ));
    }

    #[test]
    fn legacy_questions_key_accepted() {
        let json = bundle_json(5, 3).replacen("\"question\"", "\"questions\"", 1);
        let bundle = parse_bundle(&json).unwrap();
        assert_eq!(bundle.mcqs[0].question, "Q1?");
    }

    #[test]
    fn missing_json_is_malformed() {
        let err = parse_bundle("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, QuizError::MalformedJson { .. }));
    }

    #[test]
    fn truncated_json_is_malformed() {
        let full = bundle_json(5, 3);
        let err = parse_bundle(&full[..full.len() / 2]).unwrap_err();
        assert!(matches!(err, QuizError::MalformedJson { .. }));
    }

    #[test]
    fn wrong_counts_are_invalid() {
        assert!(matches!(
            parse_bundle(&bundle_json(4, 3)),
            Err(QuizError::InvalidBundle(_))
        ));
        assert!(matches!(
            parse_bundle(&bundle_json(5, 2)),
            Err(QuizError::InvalidBundle(_))
        ));
    }

    #[test]
    fn answer_must_match_an_option_exactly() {
        let json = bundle_json(5, 3).replacen("\"answer\": \"b1\"", "\"answer\": \"B1\"", 1);
        let err = parse_bundle(&json).unwrap_err();
        assert!(err.to_string().contains("question 1"));
    }

    #[test]
    fn three_options_is_invalid() {
        let json = bundle_json(5, 3).replacen(", \"d2\"", "", 1);
        assert!(matches!(
            parse_bundle(&json),
            Err(QuizError::InvalidBundle(_))
        ));
    }

    #[test]
    fn score_reports_each_outcome() {
        let bundle = parse_bundle(&bundle_json(5, 3)).unwrap();
        let mut answers = QuizAnswers::new();
        answers.insert(1, "b1".to_string());
        answers.insert(2, "a2".to_string());
        answers.insert(3, "b3".to_string());

        let report = score(&bundle, &answers);
        assert_eq!(report.total, 5);
        assert_eq!(report.correct, 2);
        assert_eq!(report.results[0].outcome, Outcome::Correct);
        assert_eq!(
            report.results[1].outcome,
            Outcome::Incorrect {
                given: "a2".to_string()
            }
        );
        assert_eq!(report.results[3].outcome, Outcome::NotAnswered);
        assert_eq!(report.results[3].correct_answer, "b4");
        assert_eq!(report.results[4].explanation, "because 5");
    }
}
