use crate::types::{ImagePart, Part, Role};

/// The body of a turn: a single text value or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnContent {
    /// A single text value.
    Text(String),

    /// A sequence of typed parts.
    Parts(Vec<Part>),
}

/// One message in a conversation.
///
/// Turns are provider-agnostic; the payload builder renders them in the
/// active protocol family's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who produced the turn.
    pub role: Role,

    /// What was said.
    pub content: TurnContent,
}

impl Turn {
    /// A system turn.  System turns always carry plain text.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: TurnContent::Text(text.into()),
        }
    }

    /// A user turn with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// A user turn made of parts.
    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Parts(parts),
        }
    }

    /// An assistant turn with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    /// An assistant turn made of parts.
    pub fn assistant_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Parts(parts),
        }
    }

    /// Returns the first piece of text in the turn.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text(text) => Some(text),
            TurnContent::Parts(parts) => parts.iter().find_map(Part::as_text),
        }
    }

    /// Iterates over the images attached to the turn.
    pub fn images(&self) -> impl Iterator<Item = &ImagePart> {
        let parts: &[Part] = match &self.content {
            TurnContent::Text(_) => &[],
            TurnContent::Parts(parts) => parts,
        };
        parts.iter().filter_map(|part| match part {
            Part::Image(image) => Some(image),
            Part::Text(_) => None,
        })
    }

    /// Short human-readable rendering for `/history`.
    pub fn display_text(&self) -> String {
        match self.text() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ if self.images().next().is_some() => "[image]".to_string(),
            Some(_) => "[empty]".to_string(),
            None => "[content]".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_of_parts_is_first_text_part() {
        let turn = Turn::user_parts(vec![
            Part::Image(ImagePart::new("image/png", "AAAA")),
            Part::Text("what is this?".to_string()),
        ]);
        assert_eq!(turn.text(), Some("what is this?"));
        assert_eq!(turn.images().count(), 1);
    }

    #[test]
    fn display_text_falls_back_to_image_marker() {
        let turn = Turn::user_parts(vec![Part::Image(ImagePart::new("image/png", "AAAA"))]);
        assert_eq!(turn.display_text(), "[image]");
        assert_eq!(Turn::assistant("").display_text(), "[empty]");
        assert_eq!(Turn::user_parts(vec![]).display_text(), "[content]");
        assert_eq!(Turn::system("be brief").display_text(), "be brief");
    }
}
