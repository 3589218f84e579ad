//! Weighted node selection.
//!
//! Produces the ordered candidate list for one request round: capability,
//! whitelist, and blacklist filtering, then a weighted-random ordering where
//! a node's chance of ranking early is proportional to a score derived from
//! its historical performance, with a jitter term so new or recently
//! un-blacklisted nodes are not starved.

use crate::{
    chain::{Chain, NodeProps},
    error::ClientError,
};
use rand::Rng;
use std::time::Instant;
use tracing::{debug, trace};

/// Assumed average response time for a node with no history yet, placing it
/// mid-field rather than first or last.
const DEFAULT_AVG_MS: u64 = 500;

/// Jitter bounds applied multiplicatively to each node's selection weight.
const JITTER_MIN: f64 = 0.5;
const JITTER_MAX: f64 = 1.5;

/// Filter requirements for one selection round.
#[derive(Debug, Clone, Default)]
pub struct SelectionParams {
    /// Number of candidates requested; fewer are returned under scarcity.
    pub request_count: usize,
    /// Capabilities every candidate must advertise.
    pub required_props: NodeProps,
    /// Minimum registry deposit; 0 disables the check.
    pub min_deposit: u64,
    /// Block height the node must retain (archive-depth check against the
    /// node's advertised `min_block_height`).
    pub block_height: Option<u64>,
}

/// Ephemeral association of a chosen node with its computed scores.
///
/// Ordered: earlier entries are tried first. Lives only for one request.
#[derive(Debug, Clone)]
pub struct NodeMatch {
    pub node_index: usize,
    /// Baseline performance score, before jitter.
    pub score: f64,
    /// Jittered weight actually used for the probabilistic ordering.
    pub weight: f64,
}

/// Produces an ordered list of up to `request_count` candidates.
///
/// Blacklisted nodes are excluded unless nothing else remains; nodes on a
/// timeout streak are rotated to the back of the list rather than dropped.
///
/// # Errors
///
/// Returns [`ClientError::NoEligibleNodes`] only when filtering leaves no
/// candidate at all; scarcity below `request_count` degrades gracefully.
pub fn select_nodes(
    chain: &Chain,
    params: &SelectionParams,
    rng: &mut impl Rng,
) -> Result<Vec<NodeMatch>, ClientError> {
    if chain.nodes().is_empty() {
        return Err(ClientError::NoEligibleNodes(format!("chain {} has no nodes", chain.id)));
    }

    let now = Instant::now();
    let whitelist = chain.whitelist.as_ref().filter(|wl| !wl.is_stale());

    let capable: Vec<usize> = chain
        .nodes()
        .iter()
        .filter(|node| {
            if !node.props.supports(params.required_props) {
                return false;
            }
            if params.min_deposit > 0 && node.deposit < params.min_deposit {
                return false;
            }
            if let Some(height) = params.block_height {
                if node.props.min_block_height() > height {
                    return false;
                }
            }
            if let Some(wl) = whitelist {
                if !wl.permits(&node.address) {
                    return false;
                }
            }
            true
        })
        .map(|node| node.index)
        .collect();

    if capable.is_empty() {
        return Err(ClientError::NoEligibleNodes(format!(
            "no node on chain {} matches the required properties",
            chain.id
        )));
    }

    let healthy: Vec<usize> = capable
        .iter()
        .copied()
        .filter(|&i| !chain.weights()[i].is_blacklisted(now))
        .collect();

    // A fully blacklisted chain still gets a candidate list; refusing to try
    // at all would wedge the client until the deadlines expire.
    let pool = if healthy.is_empty() {
        debug!(chain = chain.id, "all capable nodes blacklisted, selecting among them anyway");
        capable
    } else {
        healthy
    };

    let mut matches: Vec<(NodeMatch, f64, u64)> = pool
        .into_iter()
        .map(|i| {
            let weight_rec = &chain.weights()[i];
            let avg_ms = weight_rec.avg_response_time_ms().unwrap_or(DEFAULT_AVG_MS);
            let score = baseline_score(avg_ms, weight_rec.response_count);
            let weight = score * rng.gen_range(JITTER_MIN..JITTER_MAX);
            // Efraimidis-Spirakis key: ordering by u^(1/w) descending draws
            // without replacement with probability proportional to weight.
            let key = rng.gen_range(f64::EPSILON..1.0).powf(1.0 / weight);
            (NodeMatch { node_index: i, score, weight }, key, avg_ms)
        })
        .collect();

    matches.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.0.node_index.cmp(&b.0.node_index))
    });

    // Timeout-streak nodes go to the back: still usable, tried last.
    matches.sort_by_key(|(m, _, _)| chain.weights()[m.node_index].timeout_streak > 0);

    matches.truncate(params.request_count.max(1));
    let selected: Vec<NodeMatch> = matches.into_iter().map(|(m, _, _)| m).collect();

    trace!(
        chain = chain.id,
        candidates = selected.len(),
        first = selected.first().map(|m| m.node_index),
        "candidate list selected"
    );
    Ok(selected)
}

/// Baseline score: faster nodes score higher, and a longer track record
/// nudges the score up so proven nodes edge out unknowns at equal speed.
fn baseline_score(avg_ms: u64, response_count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let speed = 1000.0 / (avg_ms as f64 + 1.0);
    #[allow(clippy::cast_precision_loss)]
    let reliability = 1.0 + (response_count as f64).ln_1p() / 10.0;
    speed * reliability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Chain, ChainKind, NodeProps, Whitelist};
    use rand::{rngs::StdRng, SeedableRng};
    use std::time::Duration;

    fn chain_with_nodes(n: u8) -> Chain {
        let mut chain = Chain::new(1, ChainKind::Ethereum);
        for tag in 0..n {
            chain
                .add_node(
                    vec![tag; 20],
                    format!("https://node-{tag}.example.com").into(),
                    1000,
                    100,
                    NodeProps::PROOF | NodeProps::HTTP,
                )
                .unwrap();
        }
        chain
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn params(count: usize) -> SelectionParams {
        SelectionParams { request_count: count, ..SelectionParams::default() }
    }

    #[test]
    fn empty_chain_is_an_error() {
        let chain = Chain::new(1, ChainKind::Ethereum);
        let err = select_nodes(&chain, &params(1), &mut rng());
        assert!(matches!(err, Err(ClientError::NoEligibleNodes(_))));
    }

    #[test]
    fn scarcity_degrades_gracefully() {
        let chain = chain_with_nodes(2);
        let selected = select_nodes(&chain, &params(5), &mut rng()).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn capability_filter_applies() {
        let mut chain = chain_with_nodes(2);
        chain
            .add_node(vec![9; 20], "https://archive.example.com".into(), 1000, 100, {
                NodeProps::PROOF | NodeProps::HTTP | NodeProps::ARCHIVE
            })
            .unwrap();

        let mut p = params(5);
        p.required_props = NodeProps::ARCHIVE;
        let selected = select_nodes(&chain, &p, &mut rng()).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].node_index, 2);
    }

    #[test]
    fn min_block_height_filter_applies() {
        let mut chain = chain_with_nodes(1);
        chain
            .add_node(
                vec![9; 20],
                "https://pruned.example.com".into(),
                1000,
                100,
                (NodeProps::PROOF | NodeProps::HTTP).with_min_block_height(5000),
            )
            .unwrap();

        let mut p = params(5);
        p.block_height = Some(100);
        let selected = select_nodes(&chain, &p, &mut rng()).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].node_index, 0);
    }

    #[test]
    fn blacklisted_nodes_excluded_while_alternatives_exist() {
        let mut chain = chain_with_nodes(3);
        chain.weight_mut(1).unwrap().blacklist(Duration::from_secs(600), Duration::from_secs(600));

        let mut r = rng();
        for _ in 0..50 {
            let selected = select_nodes(&chain, &params(3), &mut r).unwrap();
            assert!(selected.iter().all(|m| m.node_index != 1));
        }
    }

    #[test]
    fn fully_blacklisted_pool_still_selects() {
        let mut chain = chain_with_nodes(2);
        for i in 0..2 {
            chain
                .weight_mut(i)
                .unwrap()
                .blacklist(Duration::from_secs(600), Duration::from_secs(600));
        }
        let selected = select_nodes(&chain, &params(1), &mut rng()).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn stale_whitelist_is_ignored() {
        let mut chain = chain_with_nodes(3);
        chain.whitelist = Some(Whitelist {
            addresses: vec![vec![0; 20]],
            last_update_block: 1,
            fetched_at: chrono::Utc::now() - chrono::Duration::hours(5),
            max_age: chrono::Duration::hours(1),
        });
        let selected = select_nodes(&chain, &params(3), &mut rng()).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn fresh_whitelist_restricts_selection() {
        let mut chain = chain_with_nodes(3);
        chain.whitelist = Some(Whitelist {
            addresses: vec![vec![2; 20]],
            last_update_block: 1,
            fetched_at: chrono::Utc::now(),
            max_age: chrono::Duration::hours(1),
        });
        let selected = select_nodes(&chain, &params(3), &mut rng()).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].node_index, 2);
    }

    #[test]
    fn timeout_streak_rotates_to_back() {
        let mut chain = chain_with_nodes(3);
        chain.weight_mut(0).unwrap().record_timeout(10);

        let mut r = rng();
        for _ in 0..20 {
            let selected = select_nodes(&chain, &params(3), &mut r).unwrap();
            assert_eq!(selected.last().unwrap().node_index, 0);
        }
    }

    // Scenario A: selection is weighted toward the node with the lowest
    // average response time over a large sample.
    #[test]
    fn selection_favors_faster_nodes_statistically() {
        let mut chain = chain_with_nodes(3);
        for _ in 0..20 {
            chain.weight_mut(0).unwrap().record_response(Duration::from_millis(40));
            chain.weight_mut(1).unwrap().record_response(Duration::from_millis(400));
            chain.weight_mut(2).unwrap().record_response(Duration::from_millis(400));
        }

        let mut r = rng();
        let mut wins = [0u32; 3];
        for _ in 0..2000 {
            let selected = select_nodes(&chain, &params(1), &mut r).unwrap();
            wins[selected[0].node_index] += 1;
        }

        assert!(wins[0] > wins[1] * 2, "fast node won {} vs {}", wins[0], wins[1]);
        assert!(wins[0] > wins[2] * 2, "fast node won {} vs {}", wins[0], wins[2]);
        assert!(wins[1] > 0 && wins[2] > 0, "slow nodes must not be starved");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn baseline_score_finite_and_positive(
                avg_ms in 0u64..100_000,
                count in 0u64..1_000_000
            ) {
                let score = baseline_score(avg_ms, count);
                prop_assert!(score.is_finite());
                prop_assert!(score > 0.0);
            }

            #[test]
            fn blacklisted_absent_while_alternatives_exist(
                seed in 0u64..1000,
                blacklisted in 0usize..4,
                request_count in 1usize..6
            ) {
                let mut chain = chain_with_nodes(4);
                chain
                    .weight_mut(blacklisted)
                    .unwrap()
                    .blacklist(Duration::from_secs(600), Duration::from_secs(600));

                let mut r = StdRng::seed_from_u64(seed);
                let p = SelectionParams {
                    request_count,
                    ..SelectionParams::default()
                };
                let selected = select_nodes(&chain, &p, &mut r).unwrap();
                prop_assert!(selected.iter().all(|m| m.node_index != blacklisted));
                prop_assert!(selected.len() <= request_count.min(3));
            }
        }
    }
}
