//! Re-usable prompt skeletons.

use crate::llm::contract::POSTS_PER_BATCH;

pub const SECTION_DIVIDER: &str = "\n-------\n";

pub const DEFAULT_RULES: &[&str] = &[
    "Start with a strong and concise hook",
    "Don't use emojis",
    "Limit it to one sentence per line",
    "Have a LINE BREAK between each line",
    "Use the most fitting HOOK and EXAMPLE POST from the list below as inspiration",
    "Only use content provided in the topic. Do NOT invent new data",
];

pub const RULES_HEADING: &str = "## RULES:";
pub const HOOKS_HEADING: &str = "## HOOKS:";
pub const EXAMPLES_HEADING: &str = "## EXAMPLE POSTS:";
pub const PRIOR_HEADING: &str = "## PREVIOUSLY SELECTED POSTS:";
pub const TOPIC_HEADING: &str = "## SOURCE TOPIC:";
pub const OUTPUT_HEADING: &str = "## OUTPUT FORMAT (strictly valid JSON, nothing else):";

pub fn preamble() -> String {
    format!(
        "I will give you a topic. Generate {POSTS_PER_BATCH} posts based on the following rules and examples. \
Your response MUST be strictly valid JSON and nothing else. \
Do not output any extra text, markdown, code fences, or comments."
    )
}

/// The one output shape the parser accepts, spelled out for the model.
pub fn output_format_template() -> String {
    let entry = "    {\n      \"content\": \"Replace this with generated post content\",\n      \"rating\": \"Replace this with a rating from 0 to 10 (e.g., 8/10)\"\n    }";
    let entries = vec![entry; POSTS_PER_BATCH].join(",\n");
    format!("{{\n  \"posts\": [\n{entries}\n  ]\n}}")
}
