//! Document commands: `extract`, `chunks`, `summarize`, `quiz`, `ask`.
//!
//! Command output goes to stdout; progress and logs go to stderr.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::chunk::build_chunks;
use crate::config::Config;
use crate::extract::{content_type_for, extract_text};
use crate::progress::ProgressMode;
use crate::quiz::{Outcome, QuizReport};
use crate::session::{ChatOutcome, StudySession};

fn read_file(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((file_name, bytes))
}

/// Read, extract and index `path` in a fresh session.
pub async fn open_session(
    config: &Config,
    path: &Path,
    progress: ProgressMode,
) -> Result<StudySession> {
    let (file_name, bytes) = read_file(path)?;
    let mut session = StudySession::from_config(config)?;
    let progress = progress.reporter();
    session
        .load_with_progress(&file_name, &bytes, progress.as_ref())
        .await?;
    Ok(session)
}

pub fn run_extract(path: &Path) -> Result<()> {
    let (_, bytes) = read_file(path)?;
    let text = extract_text(&bytes, content_type_for(path)?)?;
    println!("{}", text);
    Ok(())
}

pub fn run_chunks(path: &Path, size: usize) -> Result<()> {
    if size == 0 {
        bail!("--size must be > 0");
    }
    let (_, bytes) = read_file(path)?;
    let text = extract_text(&bytes, content_type_for(path)?)?;
    let chunks = build_chunks(&text, size);
    for chunk in &chunks {
        println!(
            "{}  words={}  hash={}",
            chunk.id,
            chunk.word_count,
            &chunk.hash[..12]
        );
    }
    println!("{} chunks", chunks.len());
    Ok(())
}

pub async fn run_summarize(config: &Config, path: &Path, progress: ProgressMode) -> Result<()> {
    let mut session = open_session(config, path, progress).await?;
    println!("{}", session.summarize().await?);
    Ok(())
}

/// Generate the study pack. Scores interactively when `interactive`,
/// otherwise prints the summary and bundle as JSON.
pub async fn run_quiz(
    config: &Config,
    path: &Path,
    interactive: bool,
    progress: ProgressMode,
) -> Result<()> {
    let mut session = open_session(config, path, progress).await?;
    session.generate_study_pack().await?;

    if !interactive {
        let out = serde_json::json!({
            "summary": session.summary(),
            "quiz": session.quiz(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    take_quiz(&mut session, &mut stdin.lock(), &mut stdout)
}

/// Walk the quiz on `input`/`output`: show the summary and flashcards,
/// collect one answer per question (option number, blank to skip), score,
/// and offer a retry.
pub fn take_quiz<R: BufRead, W: Write>(
    session: &mut StudySession,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let quiz = match session.quiz() {
        Some(q) => q.clone(),
        None => bail!(crate::session::SessionError::NoQuiz),
    };

    if let Some(summary) = session.summary() {
        writeln!(output, "=== Summary ===\n{}\n", summary)?;
    }
    writeln!(output, "=== Flashcards ===")?;
    for card in &quiz.flashcards {
        writeln!(output, "{}: {}", card.term, card.definition)?;
    }
    writeln!(output)?;

    loop {
        for (i, mcq) in quiz.mcqs.iter().enumerate() {
            let number = i + 1;
            writeln!(output, "Q{}. {}", number, mcq.question)?;
            for (j, option) in mcq.options.iter().enumerate() {
                writeln!(output, "  {}) {}", j + 1, option)?;
            }
            loop {
                write!(output, "answer [1-{}, blank to skip]: ", mcq.options.len())?;
                output.flush()?;
                let Some(line) = read_line(input)? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                match line.parse::<usize>() {
                    Ok(n) if (1..=mcq.options.len()).contains(&n) => {
                        session.select_answer(number, &mcq.options[n - 1])?;
                        break;
                    }
                    _ => writeln!(output, "enter a number from 1 to {}", mcq.options.len())?,
                }
            }
        }

        let report = session.submit_quiz()?;
        write_report(output, &report)?;

        write!(output, "Try again? [y/N]: ")?;
        output.flush()?;
        match read_line(input)? {
            Some(line) if line.trim().eq_ignore_ascii_case("y") => {
                session.retry_quiz();
                writeln!(output)?;
            }
            _ => return Ok(()),
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

pub fn write_report<W: Write>(output: &mut W, report: &QuizReport) -> Result<()> {
    writeln!(output, "\n=== Results ===")?;
    for r in &report.results {
        match &r.outcome {
            Outcome::Correct => writeln!(output, "Q{}: Correct!", r.number)?,
            Outcome::Incorrect { given } => writeln!(
                output,
                "Q{}: Incorrect ({}). The correct answer is: {}",
                r.number, given, r.correct_answer
            )?,
            Outcome::NotAnswered => writeln!(
                output,
                "Q{}: Not answered. The correct answer is: {}",
                r.number, r.correct_answer
            )?,
        }
        writeln!(output, "   {}", r.explanation)?;
    }
    writeln!(output, "Score: {} / {}", report.correct, report.total)?;
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    path: &Path,
    question: &str,
    top_k: Option<usize>,
    progress: ProgressMode,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(k) = top_k {
        if k == 0 {
            bail!("--top-k must be >= 1");
        }
        config.retrieval.top_k = k;
    }
    let mut session = open_session(&config, path, progress).await?;
    match session.ask(question).await? {
        ChatOutcome::Answered { answer, sources } => {
            println!("{}", answer);
            println!();
            println!("Sources:");
            for hit in &sources {
                println!("  {}  score={:.3}", hit.id, hit.score);
            }
        }
        ChatOutcome::Ended { farewell } => println!("{}", farewell),
    }
    Ok(())
}
