use lectern_index::SearchHit;

/// Reply the model is told to give when the passages do not contain the answer.
pub const NOT_FOUND_REPLY: &str = "I cannot find this information in the provided documents.";

/// Render the single user message sent to the generation backend.
///
/// Passages are joined by a blank line in retrieval order.
#[must_use]
pub fn build_prompt(passages: &[SearchHit], question: &str) -> String {
    let context = passages
        .iter()
        .map(|hit| hit.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful assistant that answers questions using only the documents below.\n\
         \n\
         Begin your answer with \"According to the documentation...\" or a similar phrase.\n\
         If the answer is not in the context, reply exactly: \"{NOT_FOUND_REPLY}\"\n\
         \n\
         Context from documents:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use lectern_index::ChunkMetadata;

    use super::*;

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            text: text.into(),
            metadata: ChunkMetadata {
                source: "docs/a.txt".into(),
                file_name: "a.txt".into(),
                content_type: "text/plain".into(),
                page: None,
                chunk_index: 0,
                start: 0,
                end: text.len(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn passages_joined_by_blank_line() {
        let prompt = build_prompt(&[hit("The sky is blue."), hit("Grass is green.")], "Colors?");
        assert!(prompt.contains("Context from documents:\nThe sky is blue.\n\nGrass is green.\n"));
        assert!(prompt.contains("Question: Colors?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn includes_fallback_instruction() {
        let prompt = build_prompt(&[], "Anything?");
        assert!(prompt.contains(NOT_FOUND_REPLY));
        assert!(prompt.contains("According to the documentation..."));
    }

    #[test]
    fn passages_keep_retrieval_order() {
        let prompt = build_prompt(&[hit("second"), hit("first")], "q");
        let a = prompt.find("second").unwrap();
        let b = prompt.find("first").unwrap();
        assert!(a < b);
    }
}
