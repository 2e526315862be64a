//! Role-conditioned question prompts.

use serde::{Deserialize, Serialize};
use std::fmt;

const BEGINNER_INSTRUCTIONS: &str = "You are responding to someone new to finance. \
Avoid complex ratios or technical analysis unless specifically requested.
Provide:
- Simple, clear explanations without jargon
- Definitions for any financial terms you must use
- Analogies and examples to explain concepts
Keep the answer under 150 words.";

const ANALYST_INSTRUCTIONS: &str = "You are responding to a professional financial analyst. Provide:
- Detailed quantitative analysis with specific ratios and metrics
- Technical financial terminology and methodologies
- A professional tone with in-depth explanations";

const INVESTOR_INSTRUCTIONS: &str = "You are responding to an investor. Provide:
- Investment thesis and valuation insights
- Risk-return analysis and portfolio implications
- Key catalysts and potential red flags";

/// The requester's declared expertise level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Beginner,
    Analyst,
    Investor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Beginner, Role::Analyst, Role::Investor];

    /// Lenient parse of a user-facing role label. Emoji, case and the
    /// "financial" prefix are ignored; anything unrecognised is a beginner.
    pub fn from_label(label: &str) -> Role {
        let cleaned: String = label
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        match cleaned.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "analyst" | "financial analyst" => Role::Analyst,
            "investor" => Role::Investor,
            _ => Role::Beginner,
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Role::Beginner => BEGINNER_INSTRUCTIONS,
            Role::Analyst => ANALYST_INSTRUCTIONS,
            Role::Investor => INVESTOR_INSTRUCTIONS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Beginner => "🎓 Beginner",
            Role::Analyst => "📊 Financial Analyst",
            Role::Investor => "💼 Investor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Instruction block, then the literal `User Question:` line.
pub fn compose(role: Role, question: &str) -> String {
    format!("{}\nUser Question: {}", role.instructions(), question.trim())
}

/// [`compose`] for a free-form role label.
pub fn compose_for_label(label: &str, question: &str) -> String {
    compose(Role::from_label(label), question)
}
