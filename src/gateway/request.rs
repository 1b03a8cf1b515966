use crate::error::AppError;
use serde_json::{Map, Value};

/// Upper bound on topic length, in characters.
pub const MAX_TOPIC_CHARS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationRequest {
    pub topic: String,
    pub prior_selections: Vec<String>,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            prior_selections: Vec::new(),
        }
    }

    pub fn with_prior_selections(mut self, prior: Vec<String>) -> Self {
        self.prior_selections = prior;
        self
    }

    /// Decodes a request body. `userInput`/`selectedPosts` are accepted as
    /// aliases, and a body of the form `{"prompt": "<json>"}` is unwrapped once.
    pub fn from_json(raw: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| AppError::invalid("body", format!("not valid JSON ({e})")))?;
        let mut object = into_object(value, "body")?;

        if !object.contains_key("topic") && !object.contains_key("userInput") {
            if let Some(Value::String(inner)) = object.get("prompt") {
                let inner: Value = serde_json::from_str(inner)
                    .map_err(|e| AppError::invalid("prompt", format!("not valid JSON ({e})")))?;
                object = into_object(inner, "prompt")?;
            }
        }

        let topic = match take_either(&mut object, "topic", "userInput") {
            Some(Value::String(topic)) => topic,
            Some(_) => return Err(AppError::invalid("topic", "must be a string")),
            None => return Err(AppError::invalid("topic", "is required")),
        };

        let prior_selections = match take_either(&mut object, "priorSelections", "selectedPosts") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(single)) => vec![single],
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(AppError::invalid("priorSelections", "must contain only strings")),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(AppError::invalid(
                    "priorSelections",
                    "must be an array of strings",
                ))
            }
        };

        let request = Self {
            topic,
            prior_selections,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.topic.trim().is_empty() {
            return Err(AppError::invalid("topic", "must not be empty"));
        }
        if self.topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(AppError::invalid(
                "topic",
                format!("must be at most {MAX_TOPIC_CHARS} characters"),
            ));
        }
        Ok(())
    }
}

fn into_object(value: Value, field: &'static str) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::invalid(field, "must be a JSON object")),
    }
}

fn take_either(object: &mut Map<String, Value>, name: &str, alias: &str) -> Option<Value> {
    object.remove(name).or_else(|| object.remove(alias))
}
