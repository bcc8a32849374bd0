//! Prompt assembly for retrieval-augmented generation.

use ragpipe_memory::{ScoredChunk, Turn};

const PERSONA: &str = "You are an intelligent assistant designed to help users with their \
queries and documents.\nYou have access to a knowledge base of documents and can provide \
accurate, helpful responses.\n\nGuidelines:\n- Be helpful, accurate, and concise\n- If you \
don't know something, admit it\n- Use the provided context when available\n- Maintain \
conversation continuity using chat history\n- Be professional and respectful";

/// Assemble the full prompt: persona, retrieved context, recent history,
/// and the user question. History is truncated to the last `history_cap`
/// turns.
#[must_use]
pub fn build_prompt(
    query: &str,
    context: &[ScoredChunk],
    history: &[Turn],
    history_cap: usize,
) -> String {
    let context_block = if context.is_empty() {
        "No additional context available.".to_owned()
    } else {
        context
            .iter()
            .map(|chunk| format!("Document: {}\n{}", chunk.source_filename, chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let history_block = if history.is_empty() {
        "No previous conversation.".to_owned()
    } else {
        let start = history.len().saturating_sub(history_cap);
        history[start..]
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{PERSONA}\n\nContext from documents:\n{context_block}\n\n\
         Conversation so far:\n{history_block}\n\n\
         User Question: {query}\n\nYour response:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpipe_memory::TurnRole;

    fn chunk(filename: &str, content: &str) -> ScoredChunk {
        ScoredChunk {
            document_id: "doc".to_owned(),
            chunk_index: 0,
            content: content.to_owned(),
            source_filename: filename.to_owned(),
            score: 0.9,
        }
    }

    fn turn(role: TurnRole, content: &str) -> Turn {
        Turn {
            role,
            content: content.to_owned(),
        }
    }

    #[test]
    fn empty_context_uses_marker() {
        let prompt = build_prompt("hi", &[], &[], 5);
        assert!(prompt.contains("No additional context available."));
        assert!(prompt.contains("No previous conversation."));
        assert!(prompt.contains("User Question: hi"));
    }

    #[test]
    fn context_lists_documents_with_filenames() {
        let chunks = [chunk("a.txt", "alpha facts"), chunk("b.txt", "beta facts")];
        let prompt = build_prompt("q", &chunks, &[], 5);
        assert!(prompt.contains("Document: a.txt\nalpha facts"));
        assert!(prompt.contains("Document: b.txt\nbeta facts"));
        assert!(!prompt.contains("No additional context"));
    }

    #[test]
    fn history_renders_roles_uppercase() {
        let history = [
            turn(TurnRole::User, "hello"),
            turn(TurnRole::Assistant, "hi there"),
        ];
        let prompt = build_prompt("q", &[], &history, 5);
        assert!(prompt.contains("USER: hello\nASSISTANT: hi there"));
    }

    #[test]
    fn history_truncated_to_cap() {
        let history: Vec<Turn> = (0..10)
            .map(|i| turn(TurnRole::User, &format!("msg{i}")))
            .collect();
        let prompt = build_prompt("q", &[], &history, 5);
        assert!(!prompt.contains("msg4"));
        assert!(prompt.contains("msg5"));
        assert!(prompt.contains("msg9"));
    }

    #[test]
    fn question_comes_after_history() {
        let prompt = build_prompt("the question", &[], &[], 5);
        let q = prompt.find("User Question:").unwrap();
        let h = prompt.find("Conversation so far:").unwrap();
        assert!(h < q);
        assert!(prompt.ends_with("Your response:"));
    }
}
