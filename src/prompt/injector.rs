//! Renders the section list into the final prompt string.

use super::schema::{PromptPayload, Section};
use super::templates::*;

pub fn inject(payload: PromptPayload) -> String {
    payload
        .sections
        .into_iter()
        .map(render)
        .collect::<Vec<_>>()
        .join(SECTION_DIVIDER)
}

fn render(section: Section) -> String {
    match section {
        Section::Preamble(text) => text,
        Section::Rules(rules) => {
            let mut block = format!("{RULES_HEADING}\n");
            for rule in rules {
                block.push_str(&format!("- {rule}\n"));
            }
            block
        }
        Section::Hooks(hooks) => format!("{HOOKS_HEADING}\n{hooks}\n"),
        Section::Examples { sampled, prior } => match prior {
            Some(prior) => format!("{EXAMPLES_HEADING}\n{sampled}\n\n{PRIOR_HEADING}\n{prior}\n"),
            None => format!("{EXAMPLES_HEADING}\n{sampled}\n"),
        },
        Section::Topic(topic) => format!("{TOPIC_HEADING}\n{topic}\n"),
        Section::OutputFormat(template) => format!("{OUTPUT_HEADING}\n{template}"),
    }
}
