//! Density-aware sliding window over a materialized memory set.
//!
//! Used for batch reprocessing, distinct from the live buffer path. Window
//! sizing adapts to content density (dense content gets smaller windows),
//! windows are cut back to the best natural boundary seen instead of
//! splitting mid-unit, and consecutive windows overlap so continuity
//! survives the cuts. The cursor advances by at least one memory per
//! iteration regardless of density estimates, so processing always
//! terminates.

use engram_ai::Summarizer;
use engram_ai::summarizer::sections;

use super::compress::FALLBACK_MARKER;
use super::token::TokenEstimator;
use crate::error::Result;
use crate::models::{Memory, MemoryKind};
use crate::store::MemoryStore;

const MAX_WINDOW_RATIO: f32 = 0.8;
const MIN_WINDOW_RATIO: f32 = 0.2;
const OVERLAP_RATIO: f32 = 0.1;

/// How many upcoming memories the density probe samples.
const DENSITY_SAMPLE: usize = 4;

const WINDOW_INSTRUCTION: &str = "\
Compress the following span of memories into a dense summary that \
preserves key information and the relationships between ideas.
Respond with exactly these sections:
SUMMARY: one tight paragraph
KEY POINTS:
- one point per line
RELATIONSHIPS:
- how the points connect
DETAILS:
anything worth keeping verbatim";

/// A half-open range of memory indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Weak,
    Medium,
    Strong,
}

/// Plans and processes overlapping compression windows.
#[derive(Debug, Clone)]
pub struct SlidingWindowProcessor {
    estimator: TokenEstimator,
    max_window_tokens: usize,
    min_window_tokens: usize,
    overlap_tokens: usize,
}

impl SlidingWindowProcessor {
    /// Derive window parameters from a fixed context size in tokens.
    pub fn new(estimator: TokenEstimator, context_tokens: usize) -> Self {
        let context = context_tokens.max(10) as f32;
        Self {
            estimator,
            max_window_tokens: (context * MAX_WINDOW_RATIO) as usize,
            min_window_tokens: (context * MIN_WINDOW_RATIO) as usize,
            overlap_tokens: (context * OVERLAP_RATIO) as usize,
        }
    }

    /// Weighted count of code fences, list markers, and sentence ends,
    /// normalized by estimated length.
    fn content_density(&self, text: &str) -> f32 {
        let fences = text.matches("```").count();
        let list_markers = text
            .lines()
            .filter(|line| {
                let t = line.trim_start();
                t.starts_with("- ")
                    || t.starts_with("* ")
                    || t.starts_with('#')
                    || t.starts_with(|c: char| c.is_ascii_digit())
            })
            .count();
        let sentence_ends = text.matches(['.', '!', '?']).count();
        let tokens = self.estimator.estimate(text).max(1);
        (fences * 3 + list_markers * 2 + sentence_ends) as f32 / tokens as f32
    }

    /// Optimal token budget for a window starting at `start`: denser
    /// upcoming content shrinks the window.
    fn window_budget(&self, memories: &[Memory], start: usize) -> usize {
        let sample = &memories[start..memories.len().min(start + DENSITY_SAMPLE)];
        if sample.is_empty() {
            return self.max_window_tokens;
        }
        let density: f32 = sample
            .iter()
            .map(|m| self.content_density(&m.content))
            .sum::<f32>()
            / sample.len() as f32;
        let size = (self.max_window_tokens as f32 / (1.0 + density)) as usize;
        size.clamp(self.min_window_tokens, self.max_window_tokens)
    }

    /// Strength of the natural boundary when cutting before `next`.
    fn boundary_strength(prev: &Memory, next: Option<&Memory>) -> Option<Boundary> {
        if let Some(next) = next {
            let head = next.body().trim_start();
            if head.starts_with('#') || head.starts_with("- ") || head.starts_with("* ") {
                return Some(Boundary::Strong);
            }
        }
        let tail = prev.body().trim_end();
        if tail.ends_with(['.', '!', '?']) {
            return Some(Boundary::Medium);
        }
        if prev.body().contains("\n\n") {
            return Some(Boundary::Weak);
        }
        None
    }

    /// Compute the next window from `start`. Pure; never empty.
    pub fn next_window(&self, memories: &[Memory], start: usize) -> MemoryWindow {
        let len = memories.len();
        let budget = self.window_budget(memories, start);

        let mut used = 0usize;
        let mut end = start;
        let mut best: Option<(usize, Boundary)> = None;

        while end < len {
            let cost = self.estimator.estimate(&memories[end].content);
            if end > start && used + cost > budget {
                // Cut back to the best boundary rather than mid-unit.
                if let Some((idx, _)) = best {
                    if idx > start {
                        end = idx;
                    }
                }
                break;
            }
            used += cost;
            end += 1;

            if end < len {
                if let Some(strength) =
                    Self::boundary_strength(&memories[end - 1], memories.get(end))
                {
                    best = match best {
                        Some((idx, prev)) if prev > strength => Some((idx, prev)),
                        _ => Some((end, strength)),
                    };
                }
            }
        }

        MemoryWindow {
            start,
            end: end.max(start + 1),
        }
    }

    /// Cursor position after a window: `end` pulled back by the overlap in
    /// memories, always strictly past `start`.
    fn advance_from(&self, memories: &[Memory], window: MemoryWindow) -> usize {
        let span = &memories[window.start..window.end];
        let window_tokens: usize = span
            .iter()
            .map(|m| self.estimator.estimate(&m.content))
            .sum();
        let avg = (window_tokens / span.len().max(1)).max(1);
        let back = self.overlap_tokens.div_ceil(avg);
        let next = window.end.saturating_sub(back);
        next.max(window.start + 1)
    }

    /// Plan the full window sequence. Pure; window starts strictly
    /// increase and the final window reaches the end of the list.
    pub fn plan_windows(&self, memories: &[Memory]) -> Vec<MemoryWindow> {
        let mut windows = Vec::new();
        let mut start = 0;
        while start < memories.len() {
            let window = self.next_window(memories, start);
            windows.push(window);
            if window.end >= memories.len() {
                break;
            }
            start = self.advance_from(memories, window);
        }
        windows
    }

    /// Compress each window through the summarize capability, persisting
    /// one compressed memory per window. Capability failure for a window is
    /// retried once, then degraded to deterministic single-memory
    /// compression so the cursor always moves forward.
    pub async fn process(
        &self,
        project_id: &str,
        memories: &[Memory],
        store: &MemoryStore,
        summarizer: &dyn Summarizer,
    ) -> Result<Vec<Memory>> {
        let mut produced = Vec::new();
        let mut start = 0;

        while start < memories.len() {
            let window = self.next_window(memories, start);

            match self
                .compress_window(project_id, memories, window, store, summarizer)
                .await?
            {
                Some(memory) => {
                    produced.push(memory);
                    if window.end >= memories.len() {
                        break;
                    }
                    start = self.advance_from(memories, window);
                }
                None => {
                    // Repeated capability failure: compress just the first
                    // memory deterministically and move one step.
                    let single = &memories[start];
                    let content = format!(
                        "{FALLBACK_MARKER} 1 memories (summary unavailable)\n\n{}",
                        single.body()
                    );
                    let memory = Memory::new(project_id, content)
                        .with_kind(MemoryKind::Compressed)
                        .with_importance(single.importance)
                        .with_sources(vec![single.id.clone()], None);
                    store.add_memory(&memory)?;
                    produced.push(memory);
                    start += 1;
                }
            }
        }

        tracing::info!(
            project_id,
            windows = produced.len(),
            memories = memories.len(),
            "sliding-window reprocessing finished"
        );
        Ok(produced)
    }

    /// Summarize one window, with a single retry. `Ok(None)` means the
    /// capability failed twice and the caller should fall back.
    async fn compress_window(
        &self,
        project_id: &str,
        memories: &[Memory],
        window: MemoryWindow,
        store: &MemoryStore,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<Memory>> {
        let span = &memories[window.start..window.end];

        let mut input = String::new();
        // At most one prior memory as minimal continuity context.
        if window.start > 0 {
            let prior = &memories[window.start - 1];
            input.push_str(&format!("Continuity context:\n{}\n\n", prior.body()));
        }
        for (i, memory) in span.iter().enumerate() {
            input.push_str(&format!(
                "M{}[{}]: {}\n",
                i + 1,
                memory.importance,
                memory.body()
            ));
        }
        let prompt = format!("{WINDOW_INSTRUCTION}\n\nMemories:\n{input}");

        let reply = match summarizer.summarize(&prompt).await {
            Ok(reply) => reply,
            Err(first) => match summarizer.summarize(&prompt).await {
                Ok(reply) => reply,
                Err(second) => {
                    tracing::warn!(
                        project_id,
                        first = %first,
                        second = %second,
                        start = window.start,
                        "window compression failed twice"
                    );
                    return Ok(None);
                }
            },
        };

        let parsed = sections::parse_sections(&reply);
        let mut content = String::from("COMPRESSED MEMORY\n");
        content.push_str(sections::SUMMARY_HEADER);
        content.push(' ');
        content.push_str(&parsed.summary);
        content.push('\n');
        content.push('\n');
        content.push_str(sections::KEY_POINTS_HEADER);
        content.push('\n');
        for point in &parsed.key_points {
            content.push_str("- ");
            content.push_str(point);
            content.push('\n');
        }
        let source_ids: Vec<String> = span.iter().map(|m| m.id.clone()).collect();
        content.push_str(&format!(
            "\nSource Memories: {} captured entries",
            source_ids.len()
        ));

        let importance = span.iter().map(|m| m.importance).max().unwrap_or(1);
        let memory = Memory::new(project_id, content)
            .with_kind(MemoryKind::Compressed)
            .with_importance(importance)
            .with_sources(source_ids, None);
        store.add_memory(&memory)?;
        Ok(Some(memory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engram_ai::CapabilityError;
    use engram_storage::Storage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct MockSummarizer {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize(&self, _prompt: &str) -> engram_ai::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CapabilityError::Timeout)
            } else {
                Ok("SUMMARY: window summary.\nKEY POINTS:\n- a point".to_string())
            }
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn processor(context_tokens: usize) -> SlidingWindowProcessor {
        SlidingWindowProcessor::new(TokenEstimator::default(), context_tokens)
    }

    fn memories(n: usize, body: &str) -> Vec<Memory> {
        (0..n)
            .map(|i| {
                Memory::new("proj-1", format!("{body} number {i}."))
                    .with_created_at(i as i64)
                    .with_importance(5)
            })
            .collect()
    }

    #[test]
    fn test_windows_cover_everything_with_monotonic_starts() {
        let processor = processor(200);
        let set = memories(30, "a sentence of medium length that fills tokens");
        let windows = processor.plan_windows(&set);

        assert!(!windows.is_empty());
        assert_eq!(windows[0].start, 0);
        assert_eq!(windows.last().unwrap().end, set.len());
        for pair in windows.windows(2) {
            assert!(pair[1].start > pair[0].start, "window starts must increase");
            assert!(pair[1].start <= pair[0].end, "windows should not leave gaps");
        }
        for window in &windows {
            assert!(window.start < window.end);
        }
    }

    #[test]
    fn test_single_small_set_is_one_window() {
        let processor = processor(4000);
        let set = memories(3, "tiny");
        let windows = processor.plan_windows(&set);
        assert_eq!(windows, vec![MemoryWindow { start: 0, end: 3 }]);
    }

    #[test]
    fn test_dense_content_shrinks_budget() {
        let processor = processor(1000);
        let plain = memories(4, "plain prose without much structure at all");
        let dense = memories(4, "```code```\n- list item\n- another. Done!");

        let plain_budget = processor.window_budget(&plain, 0);
        let dense_budget = processor.window_budget(&dense, 0);
        assert!(dense_budget < plain_budget);
        assert!(dense_budget >= processor.min_window_tokens);
    }

    #[test]
    fn test_progress_even_with_oversized_memories() {
        let processor = processor(40);
        // Each memory alone exceeds the whole window budget.
        let set = memories(5, &"overflowing content ".repeat(30));
        let windows = processor.plan_windows(&set);

        assert_eq!(windows.len(), 5);
        for (i, window) in windows.iter().enumerate() {
            assert_eq!(window.start, i);
            assert_eq!(window.end, i + 1);
        }
    }

    #[tokio::test]
    async fn test_process_persists_window_summaries() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(Storage::new(dir.path().join("t.db")).unwrap());
        let processor = processor(400);
        let set = memories(10, "a sentence that carries enough words to count");
        let summarizer = MockSummarizer {
            fail: false,
            calls: AtomicUsize::new(0),
        };

        let produced = processor
            .process("proj-1", &set, &store, &summarizer)
            .await
            .unwrap();

        assert!(!produced.is_empty());
        for memory in &produced {
            assert_eq!(memory.kind, MemoryKind::Compressed);
            assert!(memory.metadata.source_count.unwrap() >= 1);
            assert!(store.get_memory(&memory.id).unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_process_falls_back_per_memory_on_repeated_failure() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new(Storage::new(dir.path().join("t.db")).unwrap());
        let processor = processor(400);
        let set = memories(3, "some content");
        let summarizer = MockSummarizer {
            fail: true,
            calls: AtomicUsize::new(0),
        };

        let produced = processor
            .process("proj-1", &set, &store, &summarizer)
            .await
            .unwrap();

        // One fallback memory per source memory, each marked.
        assert_eq!(produced.len(), 3);
        for memory in &produced {
            assert!(memory.content.contains(FALLBACK_MARKER));
            assert_eq!(memory.metadata.source_count, Some(1));
        }
    }
}
