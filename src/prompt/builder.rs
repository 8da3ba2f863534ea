use thiserror::Error;

use super::template::PromptTemplate;
use crate::action::Action;

pub const REWRITE_INSTRUCTIONS: &str = "Please rewrite the following text for more clarity and make it grammatically correct. \
Give me the updated text. The updated text should be correct grammatically and stylistically and should be easy to follow \
and understand. Don't make it too formal. Include only improved text no other commentary.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{0} requires a prompt template")]
    MissingTemplate(Action),
}

/// Renders the message sent to the model.
///
/// For [`Action::CustomPrompt`] `input` is the clipboard text that replaces the
/// placeholder of `template`; the other actions ignore `template`.
pub fn build(
    action: &Action,
    input: &str,
    template: Option<&PromptTemplate>,
) -> Result<String, BuildError> {
    match action {
        Action::Rewrite => Ok(format!(
            "{REWRITE_INSTRUCTIONS}\n\nThe text to check:\n---\n{input}\n---\n\nImproved text: "
        )),
        Action::Ask => Ok(input.to_string()),
        Action::CustomPrompt(_) => template
            .map(|template| template.render(input))
            .ok_or(BuildError::MissingTemplate(*action)),
    }
}
