//! Pairing Resolver
//!
//! Assigns every unpaired source an unpaired target of exactly the same
//! capacity. Sources are visited in pool order and each takes its match
//! greedily; there is no backtracking, so a source that finds nothing fails
//! the whole run.

use crate::domain::ports::{PairOrigin, PairingMap, ReplicaPair, Volume};
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// Outcome
// =============================================================================

/// Result of one resolver pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum PairingOutcome {
    /// Every source was paired
    Paired { synthesized: usize },
    /// Fewer targets than sources; nothing was attempted
    InsufficientTargets { sources: usize, targets: usize },
    /// A source had no equal-capacity target left when it was visited
    NoMatchingTarget { source_device: String, blocks: u64 },
}

impl PairingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PairingOutcome::Paired { .. })
    }
}

impl std::fmt::Display for PairingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingOutcome::Paired { synthesized } => {
                write!(f, "paired {} new source devices", synthesized)
            }
            PairingOutcome::InsufficientTargets { sources, targets } => write!(
                f,
                "not enough target devices: {} sources but only {} targets",
                sources, targets
            ),
            PairingOutcome::NoMatchingTarget {
                source_device,
                blocks,
            } => write!(
                f,
                "no target device of {} blocks left for source device {}",
                blocks, source_device
            ),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

pub struct PairingResolver;

impl PairingResolver {
    /// Pair `sources` against `targets`, extending `pairs`
    ///
    /// On success the chosen targets are removed from `targets`. On failure
    /// neither `targets` nor `pairs` is touched.
    pub fn pair(
        sources: &[Volume],
        targets: &mut Vec<Volume>,
        pairs: &mut PairingMap,
    ) -> PairingOutcome {
        if targets.len() < sources.len() {
            return PairingOutcome::InsufficientTargets {
                sources: sources.len(),
                targets: targets.len(),
            };
        }

        let mut remaining = targets.clone();
        let mut staged = pairs.clone();
        let mut synthesized = 0;

        for source in sources {
            if staged.contains_source(&source.device_id) {
                debug!("Source {} is already paired", source.device_id);
                continue;
            }

            let Some(index) = Self::best_target(source, &remaining, &staged) else {
                return PairingOutcome::NoMatchingTarget {
                    source_device: source.device_id.clone(),
                    blocks: source.blocks,
                };
            };

            let target = remaining.remove(index);
            debug!("Pairing {} with {}", source.device_id, target.device_id);
            staged.insert(ReplicaPair {
                source: source.device_id.clone(),
                target: target.device_id,
                origin: PairOrigin::Synthesized,
            });
            synthesized += 1;
        }

        *targets = remaining;
        *pairs = staged;
        PairingOutcome::Paired { synthesized }
    }

    /// Index of the equal-capacity candidate to use for `source`
    ///
    /// A later candidate only replaces the current best when it is strictly
    /// smaller, so among equal candidates the first in pool order wins.
    fn best_target(source: &Volume, candidates: &[Volume], pairs: &PairingMap) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.blocks != source.blocks || pairs.contains_target(&candidate.device_id) {
                continue;
            }
            let replace = match best {
                Some(current) => candidate.blocks < candidates[current].blocks,
                None => true,
            };
            if replace {
                debug!("Found new best target dev {}", candidate.device_id);
                best = Some(index);
            }
        }
        best
    }
}
