//! Fixed prompt templates for the three generation calls.

/// Prompt asking for a summary of the full extracted text.
pub fn summary_prompt(text: &str) -> String {
    format!(
        "Summarize the following lecture notes in a clear manner.\n\n{}\n",
        text
    )
}

/// Prompt asking for exactly 5 MCQs and 3 flashcards as one JSON object.
///
/// The question key is `question` (singular); the parser also accepts
/// `questions` from older prompt wording.
pub fn quiz_prompt(summary: &str) -> String {
    format!(
        r#"Based on this lecture summary, generate:
- exactly 5 multiple choice questions, each with exactly 4 options and 1 correct answer
- exactly 3 flashcards in term/definition format
- a short explanation for each correct answer

The "answer" value must be copied exactly from one of the 4 "options".
Respond with only this JSON object:
{{
  "mcqs": [
    {{
      "question": "...",
      "options": ["...", "...", "...", "..."],
      "answer": "...",
      "explanation": "..."
    }}
  ],
  "flashcards": [
    {{ "term": "...", "definition": "..." }}
  ]
}}

Summary:
{}
"#,
        summary
    )
}

/// Prompt that grounds an answer in retrieved context.
pub fn grounded_answer_prompt(context: &str, query: &str) -> String {
    format!(
        "Answer the question using only the context below, taken from the user's lecture notes. \
If the context does not contain the answer, say that the notes do not cover it.\n\n\
Context:\n{}\n\nQuestion: {}\n",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_prompt_uses_singular_question_key() {
        let p = quiz_prompt("Cells divide by mitosis.");
        assert!(p.contains("\"question\": \"...\""));
        assert!(!p.contains("\"questions\""));
        assert!(p.ends_with("Cells divide by mitosis.\n"));
    }

    #[test]
    fn grounded_prompt_embeds_context_then_question() {
        let p = grounded_answer_prompt("ctx line 1\nctx line 2", "What is ATP?");
        let ctx_at = p.find("ctx line 1").unwrap();
        let q_at = p.find("Question: What is ATP?").unwrap();
        assert!(ctx_at < q_at);
    }
}
