//! LLM provider interface consumed by the `AiCleanup` chapter operation.
//!
//! The language-model providers that back cosmetic title clean-up are an
//! external collaborator (§6/§9): this crate only defines the narrow
//! contract [`ChapterStore::ai_cleanup`](crate::chapter_store::ChapterStore)
//! drives, the same way [`crate::library_server`] defines the remote
//! catalog client's shape without implementing it.

use async_trait::async_trait;

use crate::chapter::Chapter;
use crate::config::AiCleanupOptions;
use crate::error::PipelineError;

/// One provider-proposed edit for a single chapter: a replacement title,
/// or `None` when the provider judges the existing title should stand.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleSuggestion {
    pub chapter_index: usize,
    pub new_title: Option<String>,
    /// Whether the provider judges this chapter should remain selected
    /// (e.g. it recommends deselecting front/back matter per
    /// `deselect_non_chapters`).
    pub selected: bool,
}

/// A cosmetic title-cleanup provider, registered by `provider_id` the same
/// way [`crate::transcriber::TranscriberRegistry`] keys ASR backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Propose title edits for `chapters` under `options`. Implementations
    /// return one [`TitleSuggestion`] per *selected, non-deleted* chapter
    /// considered; chapters outside that set are left untouched by the
    /// caller regardless of what a provider returns for them.
    async fn propose_titles(
        &self,
        chapters: &[Chapter],
        options: &AiCleanupOptions,
    ) -> Result<Vec<TitleSuggestion>, PipelineError>;
}
