use crate::Result;
use agaudit_engine::{
    compute_transitions, extract_tool_sequence, generate_pattern_name, generate_signature,
    normalize_sequence,
};
use agaudit_sessions::SessionStore;
use agaudit_store::{Store, TransitionSeed, VariantSeed};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub sessions_processed: usize,
    pub variants: usize,
}

struct PatternBucket {
    normalized_sequence: Vec<String>,
    display_string: String,
    tool_count: usize,
    session_ids: Vec<String>,
    raw_sequences: Vec<Vec<String>>,
}

/// Recompute the variant and transition rows for an agent from scratch.
///
/// Only sessions with at least one evaluation participate, so variants
/// reflect traffic that went through the compliance pipeline. The stored
/// rows are cleared and rebuilt inside a single transaction; a failure
/// leaves the previous rows in place.
pub fn refresh_variants(
    store: &Store,
    sessions: &dyn SessionStore,
    agent_id: &str,
) -> Result<RefreshSummary> {
    let summaries = sessions.list_sessions(agent_id)?;

    // Which sessions have been evaluated (one short-lived handle)
    let processed_ids: Vec<String> = {
        let handle = store.handle()?;
        let mut processed = Vec::new();
        for summary in &summaries {
            if handle.count_evaluations(agent_id, &summary.id)? > 0 {
                processed.push(summary.id.clone());
            }
        }
        processed
    };

    if processed_ids.is_empty() {
        return Ok(RefreshSummary {
            sessions_processed: 0,
            variants: 0,
        });
    }

    let mut buckets: HashMap<String, PatternBucket> = HashMap::new();
    let mut bucket_order: Vec<String> = Vec::new();
    let mut all_raw_sequences: Vec<Vec<String>> = Vec::new();

    for session_id in &processed_ids {
        let Some(session) = sessions.load_session(agent_id, session_id)? else {
            continue;
        };

        let (raw_sequence, _steps) = extract_tool_sequence(&session.messages);
        if !raw_sequence.is_empty() {
            all_raw_sequences.push(raw_sequence.clone());
        }

        let normalized = normalize_sequence(&raw_sequence);
        let signature = generate_signature(&normalized);

        let bucket = buckets.entry(signature.hash.clone()).or_insert_with(|| {
            bucket_order.push(signature.hash.clone());
            PatternBucket {
                normalized_sequence: signature.normalized_sequence.clone(),
                display_string: signature.display_string.clone(),
                tool_count: signature.tool_count,
                session_ids: Vec::new(),
                raw_sequences: Vec::new(),
            }
        });
        bucket.session_ids.push(session_id.clone());
        bucket.raw_sequences.push(raw_sequence);
    }

    let seeds: Vec<VariantSeed> = bucket_order
        .iter()
        .map(|hash| {
            let bucket = &buckets[hash];
            VariantSeed {
                signature: hash.clone(),
                name: generate_pattern_name(&bucket.normalized_sequence),
                normalized_sequence: bucket.normalized_sequence.clone(),
                sequence_display: bucket.display_string.clone(),
                session_ids: bucket.session_ids.clone(),
                tool_count: bucket.tool_count,
                transitions: transition_seeds(&compute_transitions(&bucket.raw_sequences)),
            }
        })
        .collect();

    let aggregate = transition_seeds(&compute_transitions(&all_raw_sequences));

    let mut handle = store.handle()?;
    handle.replace_variants(agent_id, &seeds, &aggregate)?;

    Ok(RefreshSummary {
        sessions_processed: processed_ids.len(),
        variants: seeds.len(),
    })
}

fn transition_seeds(transitions: &HashMap<(String, String), u64>) -> Vec<TransitionSeed> {
    let mut seeds: Vec<TransitionSeed> = transitions
        .iter()
        .map(|((from_tool, to_tool), count)| TransitionSeed {
            from_tool: from_tool.clone(),
            to_tool: to_tool.clone(),
            count: *count as i64,
        })
        .collect();
    seeds.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.from_tool.cmp(&b.from_tool))
            .then_with(|| a.to_tool.cmp(&b.to_tool))
    });
    seeds
}
