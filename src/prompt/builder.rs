//! Assembles the generation prompt from rules, sampled corpus, prior
//! selections and the user's topic.

use super::injector::inject;
use super::schema::{PromptPayload, Section};
use super::templates::{output_format_template, preamble, DEFAULT_RULES};

const PRIOR_SEPARATOR: &str = "\n\n****\nSELECTED EXAMPLE:\n\n";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    rules: Vec<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl PromptBuilder {
    pub fn with_rules(rules: Vec<String>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Pure: same inputs, same prompt. Topic validation happens upstream.
    pub fn build(
        &self,
        topic: &str,
        sampled_hooks: &str,
        sampled_examples: &str,
        prior_selections: Option<&str>,
    ) -> String {
        let prior = prior_selections
            .filter(|p| !p.trim().is_empty())
            .map(str::to_string);

        let payload = PromptPayload {
            sections: vec![
                Section::Preamble(preamble()),
                Section::Rules(self.rules.clone()),
                Section::Hooks(sampled_hooks.to_string()),
                Section::Examples {
                    sampled: sampled_examples.to_string(),
                    prior,
                },
                Section::Topic(topic.to_string()),
                Section::OutputFormat(output_format_template()),
            ],
        };

        inject(payload)
    }
}

/// Joins the session's favourited posts into one exemplar block.
pub fn render_prior_selections(selections: &[String]) -> Option<String> {
    let kept: Vec<&str> = selections
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(PRIOR_SEPARATOR))
    }
}
