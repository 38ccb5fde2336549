// Mode-specific prompt scaffolds. Input is sanitized so it stays in its slot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    General,
    Recommendation,
    Support,
    Ecommerce,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::General,
        Mode::Recommendation,
        Mode::Support,
        Mode::Ecommerce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Recommendation => "recommendation",
            Mode::Support => "support",
            Mode::Ecommerce => "ecommerce",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Mode::as_str).collect()
    }

    /// Resolves a mode name, falling back to `General` for anything unknown.
    pub fn resolve(name: &str) -> Mode {
        name.parse().unwrap_or(Mode::General)
    }

    /// Renders the scaffold for this mode around already sanitized input.
    fn scaffold(&self, user_input: &str, history_context: &str) -> String {
        match self {
            Mode::General => format!("{history_context} {user_input}"),
            Mode::Recommendation => format!(
                "You are a professional recommendation system. Refer to the conversation history: {history_context}. \
                 Based on the following user preferences: '{user_input}', provide a detailed and appealing product recommendation."
            ),
            Mode::Support => format!(
                "You are a professional customer support assistant. Refer to the conversation history: {history_context}. \
                 The user asks: '{user_input}'. Provide a clear, professional and friendly response."
            ),
            Mode::Ecommerce => format!(
                "You are a creative e-commerce copywriter. Refer to the conversation history: {history_context}. \
                 Based on the following input: '{user_input}', write an eye-catching product description or promotional copy."
            ),
        }
    }

    pub fn render(&self, user_input: &str, history_context: &str) -> String {
        self.scaffold(&sanitize_input(user_input), history_context)
    }
}

impl FromStr for Mode {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| GenerateError::InvalidMode(s.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strips `{`, `}` and triple backticks from raw user input.
pub fn sanitize_input(user_input: &str) -> String {
    user_input.replace(['{', '}'], "").replace("```", "")
}

/// Renders a prompt for a mode given by name. Unknown modes use the general
/// scaffold, and the input is sanitized either way.
pub fn render(mode: &str, user_input: &str, history_context: &str) -> String {
    Mode::resolve(mode).render(user_input, history_context)
}
