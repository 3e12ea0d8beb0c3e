use serde::{Deserialize, Serialize};

use crate::provider::ProviderFamily;

/// The speaker of a turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,

    /// The person at the keyboard.
    User,

    /// The model.  Gemini calls this role `model`.
    #[serde(alias = "model")]
    Assistant,
}

impl Role {
    /// Returns the role name as the given protocol family spells it.
    pub fn wire_name(&self, family: ProviderFamily) -> &'static str {
        match (self, family) {
            (Role::System, _) => "system",
            (Role::User, _) => "user",
            (Role::Assistant, ProviderFamily::Gemini) => "model",
            (Role::Assistant, ProviderFamily::OpenAiCompatible) => "assistant",
        }
    }
}
