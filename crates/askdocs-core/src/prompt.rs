//! Grounded prompt composition.
//!
//! The template only constrains the *shape* of the answer (headings, lists,
//! bold terms, short paragraphs). Output is a pure function of its inputs.

/// Marker line opening the context block. [`crate::generate::EchoGenerator`]
/// looks for it.
pub const DOCUMENT_HEADING: &str = "### Document:";

/// Marker line opening the question block.
pub const QUESTION_HEADING: &str = "### Question:";

const PREAMBLE: &str = "\
You are an AI assistant that generates well-structured answers in a clear and readable format.

Based on the following document, answer the question **using proper formatting**:

- Use **headings (bold or markdown #)** for different sections.
- Use **bullet points** or **numbered lists** where applicable.
- Use **short paragraphs** to improve readability.
- Highlight key terms using **bold text**.
- Ensure the answer is structured properly and easy to understand.
";

const CLOSING: &str = "### Provide the response in a structured format as explained above.";

/// Build the generation prompt for `question` over `context_chunks`.
///
/// Chunks are joined in the given order, separated by blank lines, into the
/// document section. An empty slice still yields a complete prompt whose
/// document section is empty.
pub fn compose<S: AsRef<str>>(question: &str, context_chunks: &[S]) -> String {
    let context = context_chunks
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = String::with_capacity(PREAMBLE.len() + context.len() + question.len() + 128);
    prompt.push_str(PREAMBLE);
    prompt.push('\n');
    prompt.push_str(DOCUMENT_HEADING);
    prompt.push('\n');
    prompt.push_str(&context);
    prompt.push_str("\n\n");
    prompt.push_str(QUESTION_HEADING);
    prompt.push('\n');
    prompt.push_str(question.trim());
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING);
    prompt.push('\n');
    prompt
}

/// Extract the document section from a prompt built by [`compose`].
pub fn document_section(prompt: &str) -> Option<&str> {
    let start = prompt.find(DOCUMENT_HEADING)? + DOCUMENT_HEADING.len();
    let rest = &prompt[start..];
    let end = rest.find(QUESTION_HEADING)?;
    Some(rest[..end].trim())
}
