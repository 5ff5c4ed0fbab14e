//! Library-server and optional-metadata-source client interfaces (§6).
//!
//! Both are external collaborators this crate only consumes: the real
//! REST clients (auth, retries, the remote catalog) live outside this
//! crate's scope. What's here is the narrow contract the pipeline drives,
//! mirroring the predecessor crate's `http` module in keeping a single
//! shared [`reqwest::Client`] rather than one per call.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::book::Book;
use crate::chapter::Chapter;
use crate::error::PipelineError;

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// The shared client every [`LibraryServerClient`] implementation should
/// reuse instead of building its own per request.
pub fn shared_http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(reqwest::Client::new)
}

/// Progress callback for a file download: `(bytes_read, total_bytes)`.
/// The download loop throttles its own calls to this at 10 Hz (§9), same
/// cadence discipline as the VAD worker's `PROGRESS:` throttling.
pub type DownloadProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Returns `true` to request the in-flight download stop at the next
/// checkpoint.
pub type CancelPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Remote catalog client: fetches book metadata, streams audio files to
/// disk, and accepts the final chapter list on submit.
#[async_trait]
pub trait LibraryServerClient: Send + Sync {
    async fn fetch_book(&self, item_id: &str) -> Result<Book, PipelineError>;

    /// Stream one audio file to `dest`, reporting byte progress and
    /// honoring `cancel` between chunks.
    async fn download_file(
        &self,
        item_id: &str,
        file_ino: &str,
        dest: &Path,
        progress: Option<DownloadProgress>,
        cancel: CancelPredicate,
    ) -> Result<(), PipelineError>;

    async fn submit_chapters(&self, item_id: &str, chapters: &[Chapter]) -> Result<(), PipelineError>;
}

/// `{chapters: [{startOffsetMs, title}]}` shape returned by an optional
/// external metadata source (e.g. keyed by ASIN), per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataChapter {
    #[serde(rename = "startOffsetMs")]
    pub start_offset_ms: u64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataChapterList {
    pub chapters: Vec<MetadataChapter>,
}

/// A supplementary chapter-metadata lookup (e.g. Audnexus), distinct from
/// the primary library server above.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn lookup(&self, identifier: &str) -> Result<MetadataChapterList, PipelineError>;
}
