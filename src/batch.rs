//! Batch assembly: one artifact derivation per raw item, all in flight at
//! once, collected in the order they settle.
//!
//! ## Completion
//!
//! A batch of N items is complete when N derivations have *settled*, whether
//! they produced an artifact or fell back to none. [`BatchState`] owns the
//! settled counter and the running list; every settlement goes through
//! [`BatchState::settle`], which reports completion exactly once, on the
//! settlement that brings the counter to N.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::artifact::{Artifact, ArtifactGenerator};
use crate::error::ArtifactError;
use crate::source::RawItem;

/// A display-ready item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedItem {
    pub source_label: Option<String>,
    pub title: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    /// `None` when the derivation failed; the item is shown without a code.
    pub artifact: Option<Artifact>,
    /// Data URI of the artifact that settled just before this one in the
    /// same batch, if any. Best-effort; not tied to the source order.
    pub previous_artifact: Option<String>,
}

impl RenderedItem {
    pub fn is_fallback(&self) -> bool {
        self.artifact.is_none()
    }

    /// Title followed by the image tag, or the bare title for fallbacks.
    pub fn to_html(&self) -> String {
        match &self.artifact {
            Some(artifact) => format!("{}{}", self.title, artifact.embed_html()),
            None => self.title.clone(),
        }
    }
}

/// Per-batch bookkeeping, owned by a single assembly run.
#[derive(Debug)]
pub struct BatchState {
    expected: usize,
    settled: usize,
    items: Vec<RenderedItem>,
    last_artifact: Option<String>,
}

impl BatchState {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            settled: 0,
            items: Vec::with_capacity(expected),
            last_artifact: None,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn settled(&self) -> usize {
        self.settled
    }

    pub fn is_complete(&self) -> bool {
        self.settled == self.expected
    }

    /// Record one settled derivation.
    ///
    /// Returns the finished batch on the settlement that completes it and
    /// `None` otherwise. Settlements past the expected count are ignored.
    pub fn settle(
        &mut self,
        item: RawItem,
        outcome: Result<Artifact, ArtifactError>,
    ) -> Option<Vec<RenderedItem>> {
        if self.is_complete() {
            tracing::warn!(title = %item.title, "Settlement after batch completion ignored");
            return None;
        }

        let artifact = match outcome {
            Ok(artifact) => Some(artifact),
            // Already reported as a missing field when the payload was decoded.
            Err(ArtifactError::MissingReference) => None,
            Err(e) => {
                tracing::warn!(url = %item.reference_url, error = %e, "Artifact derivation failed, using fallback");
                None
            }
        };

        let previous_artifact = self.last_artifact.clone();
        if let Some(artifact) = &artifact {
            self.last_artifact = Some(artifact.data_uri.clone());
        }

        self.items.push(RenderedItem {
            source_label: item.source_label,
            title: item.title,
            description: item.description,
            published: item.published,
            artifact,
            previous_artifact,
        });
        self.settled += 1;

        if self.is_complete() {
            Some(std::mem::take(&mut self.items))
        } else {
            None
        }
    }
}

/// Derive artifacts for every item concurrently and return the batch once
/// all of them have settled.
///
/// Items appear in settlement order. An empty input yields an empty batch
/// without calling the generator. Items without a reference URL never reach
/// the generator and settle straight away as fallbacks.
pub async fn assemble(raw: Vec<RawItem>, generator: Arc<dyn ArtifactGenerator>) -> Vec<RenderedItem> {
    let mut state = BatchState::new(raw.len());
    if state.is_complete() {
        return Vec::new();
    }

    let mut pending = FuturesUnordered::new();
    for item in raw {
        if item.reference_url.trim().is_empty() {
            if let Some(batch) = state.settle(item, Err(ArtifactError::MissingReference)) {
                return batch;
            }
            continue;
        }

        let generator = Arc::clone(&generator);
        pending.push(async move {
            let outcome = generator.generate(&item.reference_url).await;
            (item, outcome)
        });
    }

    while let Some((item, outcome)) = pending.next().await {
        if let Some(batch) = state.settle(item, outcome) {
            return batch;
        }
    }

    // Every future yields exactly once, so the last settlement completes the
    // batch before the stream runs dry.
    tracing::error!(
        expected = state.expected(),
        settled = state.settled(),
        "Batch stream ended before completion"
    );
    Vec::new()
}
