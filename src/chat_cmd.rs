//! `study chat`: a line-oriented REPL over one document.
//!
//! Each line is a question for the grounded chatbot. `exit`, `quit` or
//! `stop` end the conversation; `/reset` clears the transcript and
//! `/history` prints it. A failed turn is reported and the loop goes on.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;

use crate::config::Config;
use crate::progress::ProgressMode;
use crate::session::{ChatOutcome, SessionError, StudySession};
use crate::study_cmd::open_session;

pub async fn run_chat(config: &Config, path: &Path, progress: ProgressMode) -> Result<()> {
    let mut session = open_session(config, path, progress).await?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    chat_loop(&mut session, &mut stdin.lock(), &mut stdout).await
}

pub async fn chat_loop<R: BufRead, W: Write>(
    session: &mut StudySession,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    if let Some(doc) = session.document() {
        writeln!(
            output,
            "Chatting about {}. Type exit to stop, /reset to clear, /history to review.",
            doc.file_name
        )?;
    }
    loop {
        write!(output, "you> ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(());
        }

        match line.trim() {
            "" => continue,
            "/reset" => {
                session.reset_conversation();
                writeln!(output, "Conversation cleared.")?;
                continue;
            }
            "/history" => {
                for turn in session.conversation().turns() {
                    writeln!(
                        output,
                        "[{}] {}: {}",
                        turn.at.format("%H:%M:%S"),
                        turn.role,
                        turn.content
                    )?;
                }
                continue;
            }
            _ => {}
        }

        match session.ask(&line).await {
            Ok(ChatOutcome::Answered { answer, .. }) => writeln!(output, "bot> {}", answer)?,
            Ok(ChatOutcome::Ended { farewell }) => {
                writeln!(output, "{}", farewell)?;
                return Ok(());
            }
            Err(e)
                if matches!(
                    e.downcast_ref::<SessionError>(),
                    Some(SessionError::NoDocument)
                ) =>
            {
                return Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "chat turn failed");
                writeln!(output, "error: {:#}", e)?;
            }
        }
    }
}
