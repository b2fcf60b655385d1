//! Compression orchestration.
//!
//! A compression cycle folds the oldest buffered entries (and, when one
//! exists, the most recent prior summary) into a single compressed memory
//! through the external summarize capability. The prompt is assembled
//! under a token budget; the structured reply is parsed tolerantly; the
//! consumed entries leave the buffer only after the new memory is
//! persisted. When the capability fails for any reason the cycle degrades
//! to a deterministic concatenation so the buffer always drains.

use engram_ai::summarizer::sections::{self, SummarySections};
use engram_ai::{CapabilityError, Summarizer};

use super::buffer::{BufferEntry, ShortTermBuffer};
use super::chunker::Chunker;
use super::token::TokenEstimator;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{Memory, MemoryKind};
use crate::store::MemoryStore;

/// Literal marker carried by deterministically compressed content.
pub const FALLBACK_MARKER: &str = "Combined";

const COMPRESSION_INSTRUCTION: &str = "\
Compress the following captured memories into a dense summary that \
preserves key information and the relationships between ideas.
Respond with exactly these sections:
SUMMARY: one tight paragraph
KEY POINTS:
- one point per line
RELATIONSHIPS:
- how the points connect
DETAILS:
anything worth keeping verbatim";

const ROOT_INSTRUCTION: &str = "\
Create a comprehensive root memory that captures the essential knowledge \
and insights from an entire project's memories.
Respond with exactly these sections:
SUMMARY: an overview of the project's knowledge
KEY POINTS:
- the main themes, one per line
RELATIONSHIPS:
- how the themes connect
DETAILS:
key insights worth keeping verbatim";

const REWRITE_INSTRUCTION: &str = "\
Rewrite the following memory to be denser and clearer while preserving \
every fact it contains.
Respond with exactly these sections:
SUMMARY: one tight paragraph
KEY POINTS:
- one point per line
RELATIONSHIPS:
- how the points connect
DETAILS:
anything worth keeping verbatim";

/// Result of one successful compression cycle.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    /// The persisted compressed memory
    pub memory: Memory,
    /// True when the deterministic fallback produced it
    pub fallback: bool,
    /// How many buffer entries the cycle consumed
    pub consumed: usize,
}

/// Runs compression cycles for the engine.
#[derive(Clone)]
pub struct CompressionOrchestrator {
    config: EngineConfig,
    estimator: TokenEstimator,
    chunker: Chunker,
}

impl CompressionOrchestrator {
    pub fn new(config: EngineConfig) -> Self {
        let estimator = TokenEstimator::new(config.chars_per_token);
        let chunker = Chunker::new(estimator, config.chunk_reserved_overhead);
        Self {
            config,
            estimator,
            chunker,
        }
    }

    /// Run one compression cycle over the buffer.
    ///
    /// Returns `None` when the buffer is empty. On capability failure the
    /// deterministic fallback still produces a compressed memory; only
    /// persistence failure surfaces as an error, and then the buffer is
    /// left untouched for the next trigger.
    pub async fn compress_once(
        &self,
        project_id: &str,
        buffer: &mut ShortTermBuffer,
        store: &MemoryStore,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<CompressionOutcome>> {
        if buffer.is_empty() {
            return Ok(None);
        }

        let prior = store.get_recent_compressed(project_id, self.config.recent_compressed_window_hours)?;
        let batch = buffer.oldest(self.config.short_term_limit);

        let (input, included, prior_used) = self.build_input(&batch, prior.as_ref());
        let prompt = format!("{COMPRESSION_INSTRUCTION}\n\nMemories:\n{input}");

        let (outcome, consumed_stamps) = match summarizer.summarize(&prompt).await {
            Ok(reply) => {
                let parsed = sections::parse_sections(&reply);
                let prior_importance = if prior_used {
                    prior.as_ref().map(|p| p.importance).unwrap_or(0)
                } else {
                    0
                };
                let importance = included
                    .iter()
                    .map(|e| e.importance)
                    .max()
                    .unwrap_or(0)
                    .max(prior_importance)
                    .clamp(1, 10);

                let source_ids: Vec<String> =
                    included.iter().filter_map(|e| e.raw_id.clone()).collect();
                let prior_id = prior_used.then(|| prior.as_ref().map(|p| p.id.clone())).flatten();
                let content = render_compressed(&parsed, &source_ids, prior_id.as_deref());

                let memory = Memory::new(project_id, content)
                    .with_kind(MemoryKind::Compressed)
                    .with_importance(importance)
                    .with_sources(source_ids, prior_id);
                store.add_memory(&memory)?;

                let stamps: Vec<i64> = included.iter().map(|e| e.created_at).collect();
                (
                    CompressionOutcome {
                        memory,
                        fallback: false,
                        consumed: included.len(),
                    },
                    stamps,
                )
            }
            Err(err) => self.compress_fallback(project_id, &batch, store, &err)?,
        };

        buffer.remove_by_created_at(&consumed_stamps);

        tracing::info!(
            project_id,
            consumed = outcome.consumed,
            fallback = outcome.fallback,
            remaining = buffer.len(),
            "compression cycle finished"
        );

        Ok(Some(outcome))
    }

    /// Deterministic compression used when the capability is unavailable:
    /// the highest-importance entries concatenated under a fixed template.
    fn compress_fallback(
        &self,
        project_id: &str,
        batch: &[BufferEntry],
        store: &MemoryStore,
        cause: &CapabilityError,
    ) -> Result<(CompressionOutcome, Vec<i64>)> {
        tracing::warn!(project_id, error = %cause, "summarize failed, using deterministic compression");

        let mut ranked: Vec<&BufferEntry> = batch.iter().collect();
        ranked.sort_by(|a, b| b.importance.cmp(&a.importance));
        let selected: Vec<&BufferEntry> =
            ranked.into_iter().take(self.config.fallback_top_n).collect();

        let bodies: Vec<&str> = selected
            .iter()
            .map(|e| Memory::strip_decorations(&e.content))
            .collect();
        let source_ids: Vec<String> = selected.iter().filter_map(|e| e.raw_id.clone()).collect();

        let mut content = format!(
            "{FALLBACK_MARKER} {} memories (summary unavailable)\n\n{}",
            selected.len(),
            bodies.join("\n\n---\n\n")
        );
        content.push_str(&render_provenance(&source_ids, None));

        let importance = selected
            .iter()
            .map(|e| e.importance)
            .max()
            .unwrap_or(0)
            .clamp(1, 10);

        let memory = Memory::new(project_id, content)
            .with_kind(MemoryKind::Compressed)
            .with_importance(importance)
            .with_sources(source_ids, None);
        store.add_memory(&memory)?;

        let stamps: Vec<i64> = selected.iter().map(|e| e.created_at).collect();
        Ok((
            CompressionOutcome {
                consumed: selected.len(),
                memory,
                fallback: true,
            },
            stamps,
        ))
    }

    /// Assemble the budgeted prompt input: an optional prior-summary
    /// excerpt, then `M{i}[{importance}]: body` lines oldest-first,
    /// stopping early when the next entry would exceed the budget.
    fn build_input<'a>(
        &self,
        batch: &'a [BufferEntry],
        prior: Option<&Memory>,
    ) -> (String, Vec<&'a BufferEntry>, bool) {
        let available = self.config.available_tokens();
        let mut input = String::new();
        let mut used = 0usize;
        let mut prior_used = false;

        if let Some(excerpt) = prior.and_then(|p| sections::key_points_excerpt(&p.content)) {
            let block = format!("Prior summary key points:\n{excerpt}\n\n");
            let cost = self.estimator.estimate(&block);
            if cost <= available / 2 {
                used += cost;
                input.push_str(&block);
                prior_used = true;
            }
        }

        let mut included = Vec::new();
        for (i, entry) in batch.iter().enumerate() {
            let body = Memory::strip_decorations(&entry.content);
            let line = format!("M{}[{}]: {}\n", i + 1, entry.importance, body);
            let cost = self.estimator.estimate(&line);

            if used + cost > available {
                if included.is_empty() {
                    // A single entry larger than the whole budget: chunk its
                    // body down and include what fits so the cycle can
                    // always make progress.
                    let room = available.saturating_sub(used).max(1);
                    let segments = self.chunker.split(body, room);
                    if let Some(first) = segments.first() {
                        input.push_str(&format!("M1[{}]: {}\n", entry.importance, first));
                        included.push(entry);
                    }
                }
                break;
            }

            used += cost;
            input.push_str(&line);
            included.push(entry);
        }

        (input, included, prior_used)
    }

    /// Synthesize a root memory from a project's entire memory set,
    /// importance-descending, under the same token budget.
    pub async fn form_root(
        &self,
        project_id: &str,
        store: &MemoryStore,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<Memory>> {
        let mut memories = store.get_all_memories(project_id)?;
        if memories.is_empty() {
            return Ok(None);
        }
        memories.sort_by(|a, b| b.importance.cmp(&a.importance));

        let available = self.config.available_tokens();
        let mut input = String::new();
        let mut used = 0usize;
        let mut source_ids = Vec::new();
        for memory in &memories {
            let block = format!("{}\n\n===\n\n", memory.body());
            let cost = self.estimator.estimate(&block);
            if !source_ids.is_empty() && used + cost > available {
                break;
            }
            used += cost;
            input.push_str(&block);
            source_ids.push(memory.id.clone());
        }

        let prompt = format!("{ROOT_INSTRUCTION}\n\nMemories:\n{input}");
        let content = match summarizer.summarize(&prompt).await {
            Ok(reply) => {
                let parsed = sections::parse_sections(&reply);
                render_root(&parsed, &source_ids)
            }
            Err(err) => {
                tracing::warn!(project_id, error = %err, "root synthesis failed, using deterministic fallback");
                let bodies: Vec<&str> = memories.iter().map(|m| m.body()).collect();
                format!(
                    "ROOT MEMORY\n{FALLBACK_MARKER} {} memories (summary unavailable)\n\n{}",
                    memories.len(),
                    bodies.join("\n\n===\n\n")
                )
            }
        };

        let memory = Memory::new(project_id, content)
            .with_importance(10)
            .with_kind(MemoryKind::Root)
            .with_sources(source_ids, None);
        store.add_memory(&memory)?;
        Ok(Some(memory))
    }

    /// Build the rewrite prompt for a compressed/root memory.
    pub fn rewrite_prompt(content: &str) -> String {
        format!("{REWRITE_INSTRUCTION}\n\nMemory:\n{content}")
    }

    /// Render the sections of a rewrite reply into stored content, keeping
    /// the memory's original title and provenance list.
    pub fn render_rewritten(
        reply: &str,
        kind: MemoryKind,
        source_ids: &[String],
        prior_id: Option<&str>,
    ) -> String {
        let parsed = sections::parse_sections(reply);
        match kind {
            MemoryKind::Root => render_root(&parsed, source_ids),
            _ => render_compressed(&parsed, source_ids, prior_id),
        }
    }
}

fn render_section_list(out: &mut String, header: &str, items: &[String]) {
    out.push('\n');
    out.push_str(header);
    out.push('\n');
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
}

fn render_provenance(source_ids: &[String], prior_id: Option<&str>) -> String {
    let mut out = format!("\n\nSource Memories: {} captured entries", source_ids.len());
    for id in source_ids {
        out.push_str("\n- ");
        out.push_str(id);
    }
    if let Some(prior) = prior_id {
        out.push_str("\n- prior summary ");
        out.push_str(prior);
    }
    out
}

/// Render parsed sections under a title, ending with a human-readable
/// provenance list.
fn render_structured(
    title: &str,
    parsed: &SummarySections,
    source_ids: &[String],
    prior_id: Option<&str>,
) -> String {
    let mut out = String::from(title);
    out.push('\n');
    out.push_str(sections::SUMMARY_HEADER);
    out.push(' ');
    out.push_str(&parsed.summary);
    out.push('\n');
    render_section_list(&mut out, sections::KEY_POINTS_HEADER, &parsed.key_points);
    render_section_list(
        &mut out,
        sections::RELATIONSHIPS_HEADER,
        &parsed.relationships,
    );
    if !parsed.details.is_empty() {
        out.push('\n');
        out.push_str(sections::DETAILS_HEADER);
        out.push('\n');
        out.push_str(&parsed.details);
        out.push('\n');
    }
    out.push_str(&render_provenance(source_ids, prior_id));
    out
}

fn render_compressed(
    parsed: &SummarySections,
    source_ids: &[String],
    prior_id: Option<&str>,
) -> String {
    render_structured("COMPRESSED MEMORY", parsed, source_ids, prior_id)
}

fn render_root(parsed: &SummarySections, source_ids: &[String]) -> String {
    render_structured("ROOT MEMORY", parsed, source_ids, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;
    use async_trait::async_trait;
    use engram_storage::Storage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct MockSummarizer {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl MockSummarizer {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize(&self, _prompt: &str) -> engram_ai::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(CapabilityError::Unavailable("forced failure".into())),
            }
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn test_store() -> (MemoryStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("test.db")).unwrap();
        let store = MemoryStore::new(storage);
        (store, dir)
    }

    fn filled_buffer(store: &MemoryStore, project_id: &str, n: usize) -> ShortTermBuffer {
        let mut buffer = ShortTermBuffer::new();
        for i in 0..n {
            let memory = Memory::new(project_id, format!("captured note number {i}"))
                .with_importance((i % 10) as u8 + 1);
            store.add_memory(&memory).unwrap();
            buffer.push(BufferEntry {
                content: memory.content.clone(),
                created_at: memory.created_at,
                project_id: project_id.to_string(),
                importance: memory.importance,
                raw_id: Some(memory.id),
            });
        }
        buffer
    }

    fn orchestrator() -> CompressionOrchestrator {
        CompressionOrchestrator::new(EngineConfig {
            short_term_limit: 5,
            ..EngineConfig::default()
        })
    }

    const STRUCTURED_REPLY: &str = "SUMMARY: five notes about retrieval.\n\
                                    KEY POINTS:\n- notes exist\n- retrieval works\n\
                                    RELATIONSHIPS:\n- notes feed retrieval\n\
                                    DETAILS:\nnothing else";

    #[tokio::test]
    async fn test_compress_drains_batch_and_persists() {
        let (store, _dir) = test_store();
        store.add_project(&Project::new("p").with_id("proj-1")).unwrap();
        let mut buffer = filled_buffer(&store, "proj-1", 5);
        let summarizer = MockSummarizer::replying(STRUCTURED_REPLY);

        let outcome = orchestrator()
            .compress_once("proj-1", &mut buffer, &store, &summarizer)
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.fallback);
        assert_eq!(outcome.consumed, 5);
        assert!(buffer.is_empty());
        assert_eq!(outcome.memory.kind, MemoryKind::Compressed);
        assert_eq!(outcome.memory.metadata.source_count, Some(5));
        assert!(outcome.memory.content.contains("KEY POINTS:"));
        assert!(outcome.memory.content.contains("Source Memories: 5"));

        let persisted = store.get_memory(&outcome.memory.id).unwrap();
        assert!(persisted.is_some());
    }

    #[tokio::test]
    async fn test_compress_empty_buffer_is_noop() {
        let (store, _dir) = test_store();
        let mut buffer = ShortTermBuffer::new();
        let summarizer = MockSummarizer::replying(STRUCTURED_REPLY);

        let outcome = orchestrator()
            .compress_once("proj-1", &mut buffer, &store, &summarizer)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_summarize_falls_back_deterministically() {
        let (store, _dir) = test_store();
        let mut buffer = filled_buffer(&store, "proj-1", 5);
        let summarizer = MockSummarizer::failing();

        let outcome = orchestrator()
            .compress_once("proj-1", &mut buffer, &store, &summarizer)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.fallback);
        assert!(outcome.consumed <= 5);
        assert!(outcome.memory.content.contains(FALLBACK_MARKER));
        assert_eq!(outcome.memory.kind, MemoryKind::Compressed);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_selects_top_by_importance() {
        let (store, _dir) = test_store();
        let orchestrator = CompressionOrchestrator::new(EngineConfig {
            short_term_limit: 8,
            fallback_top_n: 2,
            ..EngineConfig::default()
        });

        let mut buffer = ShortTermBuffer::new();
        for (i, importance) in [3u8, 9, 1, 7].into_iter().enumerate() {
            buffer.push(BufferEntry {
                content: format!("note {i}"),
                created_at: (i + 1) as i64,
                project_id: "proj-1".to_string(),
                importance,
                raw_id: None,
            });
        }

        let outcome = orchestrator
            .compress_once("proj-1", &mut buffer, &store, &MockSummarizer::failing())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.consumed, 2);
        assert_eq!(outcome.memory.importance, 9);
        assert!(outcome.memory.content.contains("note 1"));
        assert!(outcome.memory.content.contains("note 3"));
    }

    #[tokio::test]
    async fn test_importance_propagates_max_of_batch() {
        let (store, _dir) = test_store();
        let mut buffer = ShortTermBuffer::new();
        for importance in [2u8, 8, 4] {
            buffer.push(BufferEntry {
                content: format!("note with importance {importance}"),
                created_at: importance as i64,
                project_id: "proj-1".to_string(),
                importance,
                raw_id: None,
            });
        }

        let outcome = orchestrator()
            .compress_once(
                "proj-1",
                &mut buffer,
                &store,
                &MockSummarizer::replying(STRUCTURED_REPLY),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.memory.importance, 8);
    }

    #[tokio::test]
    async fn test_prior_key_points_folded_into_prompt() {
        let (store, _dir) = test_store();

        // A prior compressed memory with an extractable key-points block.
        let prior = Memory::new("proj-1", render_compressed(
            &sections::parse_sections(STRUCTURED_REPLY),
            &[],
            None,
        ))
        .with_kind(MemoryKind::Compressed)
        .with_importance(9);
        store.add_memory(&prior).unwrap();

        let mut buffer = filled_buffer(&store, "proj-1", 3);
        let outcome = orchestrator()
            .compress_once(
                "proj-1",
                &mut buffer,
                &store,
                &MockSummarizer::replying(STRUCTURED_REPLY),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.memory.metadata.prior_id, Some(prior.id.clone()));
        // Prior importance dominates the batch importances here.
        assert_eq!(outcome.memory.importance, 9);
        assert!(outcome.memory.content.contains(&prior.id));
    }

    #[tokio::test]
    async fn test_budget_stops_batch_early() {
        let (store, _dir) = test_store();
        let orchestrator = CompressionOrchestrator::new(EngineConfig {
            short_term_limit: 5,
            context_window_tokens: 160,
            prompt_reserve_tokens: 50,
            output_reserve_tokens: 50,
            ..EngineConfig::default()
        });

        // Each entry is ~50 tokens; only one fits the ~60-token budget.
        let mut buffer = ShortTermBuffer::new();
        for i in 0..5 {
            buffer.push(BufferEntry {
                content: format!("{i} {}", "lengthy captured text ".repeat(9)),
                created_at: i as i64 + 1,
                project_id: "proj-1".to_string(),
                importance: 5,
                raw_id: None,
            });
        }

        let outcome = orchestrator
            .compress_once(
                "proj-1",
                &mut buffer,
                &store,
                &MockSummarizer::replying(STRUCTURED_REPLY),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.consumed < 5);
        assert!(outcome.consumed >= 1, "must always make progress");
        assert_eq!(buffer.len(), 5 - outcome.consumed);
    }

    #[tokio::test]
    async fn test_form_root_synthesizes_project() {
        let (store, _dir) = test_store();
        for i in 0..3 {
            store
                .add_memory(&Memory::new("proj-1", format!("memory {i}")))
                .unwrap();
        }

        let root = orchestrator()
            .form_root("proj-1", &store, &MockSummarizer::replying(STRUCTURED_REPLY))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(root.kind, MemoryKind::Root);
        assert_eq!(root.importance, 10);
        assert!(root.content.starts_with("ROOT MEMORY"));
        assert_eq!(root.metadata.source_count, Some(3));
    }

    #[tokio::test]
    async fn test_form_root_empty_project() {
        let (store, _dir) = test_store();
        let root = orchestrator()
            .form_root("proj-1", &store, &MockSummarizer::replying(STRUCTURED_REPLY))
            .await
            .unwrap();
        assert!(root.is_none());
    }

    #[tokio::test]
    async fn test_form_root_fallback_on_failure() {
        let (store, _dir) = test_store();
        store
            .add_memory(&Memory::new("proj-1", "only memory").with_importance(6))
            .unwrap();

        let root = orchestrator()
            .form_root("proj-1", &store, &MockSummarizer::failing())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(root.kind, MemoryKind::Root);
        assert_eq!(root.importance, 10);
        assert!(root.content.contains(FALLBACK_MARKER));
        assert!(root.content.contains("only memory"));
    }

    #[test]
    fn test_rendered_content_allows_prior_excerpt_extraction() {
        let parsed = sections::parse_sections(STRUCTURED_REPLY);
        let content = render_compressed(&parsed, &["mem-a".to_string()], None);
        let excerpt = sections::key_points_excerpt(&content).unwrap();
        assert!(excerpt.contains("notes exist"));
        assert!(!excerpt.contains("RELATIONSHIPS"));
    }
}
