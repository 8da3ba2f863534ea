use std::fmt;

/// Marker replaced with live clipboard text when a template is rendered.
pub const PLACEHOLDER: &str = "{CLIPBOARD}";

/// User-editable prompt text. Always contains [`PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    /// Wraps `text`, appending the placeholder on its own line when missing.
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.contains(PLACEHOLDER) {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(PLACEHOLDER);
        }
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn render(&self, content: &str) -> String {
        self.0.replace(PLACEHOLDER, content)
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
