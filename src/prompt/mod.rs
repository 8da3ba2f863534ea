mod builder;
mod store;
mod template;

pub use builder::{build, BuildError, REWRITE_INSTRUCTIONS};
pub use store::{PromptStore, PromptStoreError, DEFAULT_TEMPLATE};
pub use template::{PromptTemplate, PLACEHOLDER};
