//! Data model for prompt sections.

#[derive(Debug, Clone)]
pub enum Section {
    Preamble(String),
    Rules(Vec<String>),
    Hooks(String),
    Examples {
        sampled: String,
        prior: Option<String>,
    },
    Topic(String),
    OutputFormat(String),
}

#[derive(Debug, Default, Clone)]
pub struct PromptPayload {
    pub sections: Vec<Section>, // rendered in order
}
