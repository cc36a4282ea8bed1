//! One study session: a loaded document, its index, the generated study
//! pack, quiz answers, and the chat transcript.
//!
//! Every action goes through [`StudySession`]; there is no global state.
//! Loading a new document clears the index first, so retrieval only ever
//! sees chunks of the current document.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;

use crate::chunk::{build_chunks, content_hash};
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::extract::{content_type_for, extract_text};
use crate::generation::{answer, create_generator, generate_quiz, summarize, GenerationProvider};
use crate::index::VectorIndex;
use crate::models::{ConversationLog, Document, Role};
use crate::progress::{IngestProgressReporter, NoProgress};
use crate::quiz::{score, QuizAnswers, QuizBundle, QuizReport};
use crate::store::Hit;

/// Queries that end the conversation instead of reaching the chatbot.
pub const STOP_WORDS: [&str; 3] = ["exit", "quit", "stop"];

pub const FAREWELL: &str = "Conversation ended. Feel free to ask another question!";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no document loaded")]
    NoDocument,
    #[error("no quiz generated yet")]
    NoQuiz,
    #[error("question {number} is out of range (quiz has {count} questions)")]
    QuestionOutOfRange { number: usize, count: usize },
    #[error("{option:?} is not an option of question {number}")]
    UnknownOption { number: usize, option: String },
    #[error("question is empty")]
    EmptyQuery,
}

#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Answered { answer: String, sources: Vec<Hit> },
    Ended { farewell: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub document_id: String,
    pub chunks: usize,
    /// True when the text matched the loaded document and nothing was re-embedded.
    pub unchanged: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub chunk_size: usize,
    pub top_k: usize,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.size,
            top_k: config.retrieval.top_k,
        }
    }
}

pub struct StudySession {
    index: VectorIndex,
    generator: Arc<dyn GenerationProvider>,
    settings: SessionSettings,
    document: Option<Document>,
    chunk_count: usize,
    summary: Option<String>,
    quiz: Option<QuizBundle>,
    answers: QuizAnswers,
    submitted: bool,
    log: ConversationLog,
}

impl StudySession {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            index: VectorIndex::in_memory(embedder),
            generator,
            settings,
            document: None,
            chunk_count: 0,
            summary: None,
            quiz: None,
            answers: QuizAnswers::new(),
            submitted: false,
            log: ConversationLog::new(),
        }
    }

    /// Build a session with the providers named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let generator: Arc<dyn GenerationProvider> =
            Arc::from(create_generator(&config.generation)?);
        Ok(Self::new(embedder, generator, SessionSettings::from(config)))
    }

    pub async fn load(&mut self, file_name: &str, bytes: &[u8]) -> Result<LoadSummary> {
        self.load_with_progress(file_name, bytes, &NoProgress).await
    }

    /// Extract, chunk and index `bytes` as the session's document.
    ///
    /// Extraction failures leave the session untouched. If embedding fails
    /// after the index was cleared, the session ends up with no document.
    pub async fn load_with_progress(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        progress: &dyn IngestProgressReporter,
    ) -> Result<LoadSummary> {
        let content_type = content_type_for(Path::new(file_name))?;
        let text = extract_text(bytes, content_type)
            .with_context(|| format!("failed to extract text from {}", file_name))?;
        let fingerprint = content_hash(&text);

        if let Some(doc) = &self.document {
            if doc.fingerprint == fingerprint {
                tracing::info!(file = file_name, "document unchanged, keeping index");
                return Ok(LoadSummary {
                    document_id: doc.id.clone(),
                    chunks: self.chunk_count,
                    unchanged: true,
                });
            }
        }

        let chunks = build_chunks(&text, self.settings.chunk_size);
        self.reset_document_state();
        self.index.clear().await?;
        if let Err(e) = self.index.add_chunks_with_progress(&chunks, progress).await {
            self.index.clear().await?;
            return Err(e.context(format!("failed to index {}", file_name)));
        }

        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            text,
            fingerprint,
            loaded_at: Utc::now(),
        };
        tracing::info!(
            file = file_name,
            chunks = chunks.len(),
            words = document.text.split_whitespace().count(),
            "document loaded"
        );
        let summary = LoadSummary {
            document_id: document.id.clone(),
            chunks: chunks.len(),
            unchanged: false,
        };
        self.document = Some(document);
        self.chunk_count = chunks.len();
        Ok(summary)
    }

    fn reset_document_state(&mut self) {
        self.document = None;
        self.chunk_count = 0;
        self.summary = None;
        self.quiz = None;
        self.answers.clear();
        self.submitted = false;
    }

    /// Summarize the document, then build the quiz from that summary.
    ///
    /// A quiz that fails to parse leaves the new summary in place and no quiz.
    pub async fn generate_study_pack(&mut self) -> Result<(&str, &QuizBundle)> {
        let text = match &self.document {
            Some(doc) => doc.text.clone(),
            None => return Err(SessionError::NoDocument.into()),
        };
        self.quiz = None;
        self.answers.clear();
        self.submitted = false;

        let summary = summarize(self.generator.as_ref(), &text).await?;
        let quiz = generate_quiz(self.generator.as_ref(), &summary).await;
        self.summary = Some(summary);
        let quiz = quiz?;
        tracing::info!(
            mcqs = quiz.mcqs.len(),
            flashcards = quiz.flashcards.len(),
            "study pack generated"
        );
        let quiz: &QuizBundle = self.quiz.insert(quiz);
        Ok((self.summary.as_deref().unwrap_or_default(), quiz))
    }

    /// Summarize only, without generating a quiz.
    pub async fn summarize(&mut self) -> Result<&str> {
        let text = match &self.document {
            Some(doc) => doc.text.clone(),
            None => return Err(SessionError::NoDocument.into()),
        };
        let summary = summarize(self.generator.as_ref(), &text).await?;
        Ok(self.summary.insert(summary).as_str())
    }

    /// Record the chosen option for 1-based question `number`.
    pub fn select_answer(&mut self, number: usize, option: &str) -> Result<(), SessionError> {
        let quiz = self.quiz.as_ref().ok_or(SessionError::NoQuiz)?;
        let count = quiz.mcqs.len();
        let mcq = number
            .checked_sub(1)
            .and_then(|i| quiz.mcqs.get(i))
            .ok_or(SessionError::QuestionOutOfRange { number, count })?;
        if !mcq.options.iter().any(|o| o == option) {
            return Err(SessionError::UnknownOption {
                number,
                option: option.to_string(),
            });
        }
        self.answers.insert(number, option.to_string());
        Ok(())
    }

    pub fn submit_quiz(&mut self) -> Result<QuizReport, SessionError> {
        let quiz = self.quiz.as_ref().ok_or(SessionError::NoQuiz)?;
        let report = score(quiz, &self.answers);
        self.submitted = true;
        tracing::debug!(correct = report.correct, total = report.total, "quiz submitted");
        Ok(report)
    }

    /// Clear answers and the submitted flag; the quiz itself is kept.
    pub fn retry_quiz(&mut self) {
        self.answers.clear();
        self.submitted = false;
    }

    /// Answer `query` from the document, or end the conversation on a stop word.
    pub async fn ask(&mut self, query: &str) -> Result<ChatOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyQuery.into());
        }
        if is_stop_word(query) {
            return Ok(ChatOutcome::Ended {
                farewell: FAREWELL.to_string(),
            });
        }
        if self.document.is_none() {
            return Err(SessionError::NoDocument.into());
        }

        let grounded = answer(
            self.generator.as_ref(),
            &self.index,
            query,
            self.settings.top_k,
        )
        .await?;
        self.log.push(Role::User, query);
        self.log.push(Role::Bot, grounded.answer.clone());
        Ok(ChatOutcome::Answered {
            answer: grounded.answer,
            sources: grounded.grounding.sources,
        })
    }

    pub fn reset_conversation(&mut self) {
        self.log.clear();
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn quiz(&self) -> Option<&QuizBundle> {
        self.quiz.as_ref()
    }

    pub fn answers(&self) -> &QuizAnswers {
        &self.answers
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

pub fn is_stop_word(query: &str) -> bool {
    let q = query.trim();
    STOP_WORDS.iter().any(|w| q.eq_ignore_ascii_case(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_ignore_case_and_whitespace() {
        assert!(is_stop_word("stop"));
        assert!(is_stop_word("  EXIT \n"));
        assert!(is_stop_word("Quit"));
        assert!(!is_stop_word("stop the cell cycle"));
        assert!(!is_stop_word("exiting"));
    }

    #[test]
    fn session_error_messages() {
        let err = SessionError::QuestionOutOfRange {
            number: 6,
            count: 5,
        };
        assert_eq!(
            err.to_string(),
            "question 6 is out of range (quiz has 5 questions)"
        );
    }
}
