use agaudit_types::{ContentBlock, Message, Role, TRANSITION_END, TRANSITION_START};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

/// One tool call in an extracted sequence, with parallelism metadata kept
/// for diagramming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStep {
    pub tool_name: String,
    pub message_index: usize,
    pub is_parallel: bool,
    pub parallel_group_id: Option<String>,
}

/// Identity of a normalized pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSignature {
    pub hash: String,
    pub normalized_sequence: Vec<String>,
    pub display_string: String,
    pub tool_count: usize,
}

/// Extract the ordered tool sequence from a session's messages.
///
/// Parallel tools (multiple `tool_use` blocks in one assistant message) are
/// flattened into sequential steps sorted alphabetically so parallel
/// invocations have a canonical order; steps from the same message share a
/// parallel-group id.
pub fn extract_tool_sequence(messages: &[Message]) -> (Vec<String>, Vec<ToolStep>) {
    let mut raw_sequence = Vec::new();
    let mut detailed_steps = Vec::new();
    let mut parallel_group_counter = 0usize;

    for (idx, message) in messages.iter().enumerate() {
        if message.role != Role::Assistant {
            continue;
        }

        let mut tools_in_message: Vec<String> = message
            .content
            .blocks()
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        if tools_in_message.is_empty() {
            continue;
        }
        tools_in_message.sort();

        let is_parallel = tools_in_message.len() > 1;
        let parallel_group_id = if is_parallel {
            let id = format!("pg_{}", parallel_group_counter);
            parallel_group_counter += 1;
            Some(id)
        } else {
            None
        };

        for tool_name in tools_in_message {
            raw_sequence.push(tool_name.clone());
            detailed_steps.push(ToolStep {
                tool_name,
                message_index: idx,
                is_parallel,
                parallel_group_id: parallel_group_id.clone(),
            });
        }
    }

    (raw_sequence, detailed_steps)
}

/// Collapse consecutive cycles, keeping the first occurrence:
/// `[a, b, c, b, c, b, c, d]` becomes `[a, b, c, d]`.
///
/// Greedy on the smallest cycle length at each position; order-preserving
/// and idempotent. Distinct tools are never rearranged.
pub fn normalize_sequence(sequence: &[String]) -> Vec<String> {
    if sequence.len() < 2 {
        return sequence.to_vec();
    }

    let mut result = Vec::new();
    let mut i = 0;

    while i < sequence.len() {
        let mut found_cycle = false;

        for cycle_len in 1..=(sequence.len() - i) / 2 {
            let cycle = &sequence[i..i + cycle_len];

            let mut j = i + cycle_len;
            let mut repetitions = 1;
            while j + cycle_len <= sequence.len() && &sequence[j..j + cycle_len] == cycle {
                j += cycle_len;
                repetitions += 1;
            }

            if repetitions > 1 {
                result.extend_from_slice(cycle);
                i = j;
                found_cycle = true;
                break;
            }
        }

        if !found_cycle {
            result.push(sequence[i].clone());
            i += 1;
        }
    }

    result
}

/// Hex SHA-256 over the compact JSON serialization of the normalized
/// sequence. Hash equality is the variant identity.
pub fn generate_signature(normalized_sequence: &[String]) -> PatternSignature {
    let sequence_json =
        serde_json::to_string(normalized_sequence).expect("string arrays always serialize");
    let hash = format!("{:x}", Sha256::digest(sequence_json.as_bytes()));

    let display_string = if normalized_sequence.is_empty() {
        "(empty)".to_string()
    } else {
        normalized_sequence.join(" → ")
    };

    let tool_count = normalized_sequence.iter().collect::<BTreeSet<_>>().len();

    PatternSignature {
        hash,
        normalized_sequence: normalized_sequence.to_vec(),
        display_string,
        tool_count,
    }
}

/// Rule-based display name for a pattern. Naming is cosmetic; the signature
/// is the identity.
pub fn generate_pattern_name(normalized_sequence: &[String]) -> String {
    if normalized_sequence.is_empty() {
        return "Empty pattern".to_string();
    }

    let tools: BTreeSet<&str> = normalized_sequence.iter().map(String::as_str).collect();
    let mut parts: Vec<String> = Vec::new();

    if tools.contains("request_human_approval") {
        parts.push("Approval-required".to_string());
    } else {
        parts.push("Standard".to_string());
    }

    let invoice_count = normalized_sequence
        .iter()
        .filter(|tool| tool.as_str() == "create_invoice")
        .count();
    if invoice_count > 1 {
        parts.push("batch".to_string());
    } else if invoice_count == 1 {
        parts.push("single-order".to_string());
    }

    let has_email = tools.contains("send_invoice_email");
    let has_balance = tools.contains("update_customer_balance");
    let has_invoice = tools.contains("create_invoice");

    if has_email && has_balance {
        parts.push("fulfillment".to_string());
    } else if has_invoice {
        parts.push("invoice processing".to_string());
    } else if tools.contains("check_inventory") {
        parts.push("inventory check".to_string());
    } else {
        parts.push(normalized_sequence[0].replace('_', " "));
    }

    parts.join(" ")
}

/// Count `_start → first`, adjacent, and `last → _end` transitions across
/// raw (non-normalized) sequences. A sequence of length n emits n+1 events.
pub fn compute_transitions(raw_sequences: &[Vec<String>]) -> HashMap<(String, String), u64> {
    let mut transitions: HashMap<(String, String), u64> = HashMap::new();

    for sequence in raw_sequences {
        let Some(first) = sequence.first() else {
            continue;
        };

        *transitions
            .entry((TRANSITION_START.to_string(), first.clone()))
            .or_insert(0) += 1;

        for window in sequence.windows(2) {
            *transitions
                .entry((window[0].clone(), window[1].clone()))
                .or_insert(0) += 1;
        }

        *transitions
            .entry((
                sequence.last().expect("non-empty").clone(),
                TRANSITION_END.to_string(),
            ))
            .or_insert(0) += 1;
    }

    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(tools: &[&str]) -> Vec<String> {
        tools.iter().map(|tool| tool.to_string()).collect()
    }

    #[test]
    fn cycle_collapse_keeps_shape() {
        let raw = seq(&["a", "b", "c", "b", "c", "b", "c", "d"]);
        let normalized = normalize_sequence(&raw);
        assert_eq!(normalized, seq(&["a", "b", "c", "d"]));

        let signature = generate_signature(&normalized);
        assert_eq!(signature.display_string, "a → b → c → d");
        assert_eq!(signature.tool_count, 4);
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            seq(&[]),
            seq(&["a"]),
            seq(&["a", "a", "a"]),
            seq(&["a", "b", "a", "b"]),
            seq(&["a", "b", "c", "b", "c", "b", "c", "d"]),
            seq(&["x", "y", "x", "y", "x", "z", "z", "z"]),
        ];

        for case in cases {
            let once = normalize_sequence(&case);
            let twice = normalize_sequence(&once);
            assert_eq!(once, twice, "normalize not idempotent for {:?}", case);
        }
    }

    #[test]
    fn immediate_repeats_collapse_to_one() {
        assert_eq!(
            normalize_sequence(&seq(&["a", "a", "a", "b"])),
            seq(&["a", "b"])
        );
    }

    #[test]
    fn signature_equality_iff_sequence_equality() {
        let first = generate_signature(&seq(&["a", "b"]));
        let second = generate_signature(&seq(&["a", "b"]));
        let different = generate_signature(&seq(&["b", "a"]));

        assert_eq!(first.hash, second.hash);
        assert_ne!(first.hash, different.hash);
    }

    #[test]
    fn empty_sequence_signature() {
        let signature = generate_signature(&[]);
        assert_eq!(signature.display_string, "(empty)");
        assert_eq!(signature.tool_count, 0);
    }

    #[test]
    fn transition_totals_are_length_plus_one() {
        let raw = vec![seq(&["a", "b", "c"])];
        let transitions = compute_transitions(&raw);
        let total: u64 = transitions.values().sum();
        assert_eq!(total, 4);
        assert_eq!(transitions[&("_start".to_string(), "a".to_string())], 1);
        assert_eq!(transitions[&("c".to_string(), "_end".to_string())], 1);
    }

    #[test]
    fn transitions_aggregate_across_sequences() {
        let raw = vec![seq(&["a", "b"]), seq(&["a", "b"]), seq(&["a"])];
        let transitions = compute_transitions(&raw);
        assert_eq!(transitions[&("_start".to_string(), "a".to_string())], 3);
        assert_eq!(transitions[&("a".to_string(), "b".to_string())], 2);
        assert_eq!(transitions[&("b".to_string(), "_end".to_string())], 2);
        assert_eq!(transitions[&("a".to_string(), "_end".to_string())], 1);
    }

    #[test]
    fn empty_sequences_emit_nothing() {
        assert!(compute_transitions(&[Vec::new()]).is_empty());
    }

    #[test]
    fn parallel_tools_sort_alphabetically_and_share_group() {
        let messages: Vec<Message> = vec![
            serde_json::from_value(json!({
                "role": "assistant",
                "content": [
                    {"type": "tool_use", "id": "t2", "name": "update_customer_balance", "input": {}},
                    {"type": "tool_use", "id": "t1", "name": "create_invoice", "input": {}}
                ]
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "role": "assistant",
                "content": [
                    {"type": "tool_use", "id": "t3", "name": "send_invoice_email", "input": {}}
                ]
            }))
            .unwrap(),
        ];

        let (raw, steps) = extract_tool_sequence(&messages);
        assert_eq!(
            raw,
            seq(&["create_invoice", "update_customer_balance", "send_invoice_email"])
        );
        assert!(steps[0].is_parallel);
        assert_eq!(steps[0].parallel_group_id, steps[1].parallel_group_id);
        assert!(!steps[2].is_parallel);
        assert!(steps[2].parallel_group_id.is_none());
    }

    #[test]
    fn pattern_names_reflect_workflow_markers() {
        assert_eq!(
            generate_pattern_name(&seq(&["check_inventory", "create_invoice", "request_human_approval"])),
            "Approval-required single-order invoice processing"
        );
        assert_eq!(
            generate_pattern_name(&seq(&["create_invoice", "send_invoice_email", "update_customer_balance"])),
            "Standard single-order fulfillment"
        );
        assert_eq!(
            generate_pattern_name(&seq(&["lookup_customer"])),
            "Standard lookup customer"
        );
        assert_eq!(generate_pattern_name(&[]), "Empty pattern");
    }
}
