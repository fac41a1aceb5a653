//! Flavour rating and selection

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{KabinetError, RateError, Rejection};
use crate::flavours::capabilities::Capabilities;
use crate::flavours::selectors::Selector;
use crate::models::Flavour;

/// Which end of the sorted ratings wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOrder {
    /// Ascending sort, lowest rating wins
    #[default]
    LowestFirst,
    /// Descending sort, highest rating wins
    HighestFirst,
}

/// Rate a selector list. Fails on the first required selector that is not satisfied.
pub fn rate_selectors(selectors: &[Selector], caps: &Capabilities) -> Result<u64, RateError> {
    let mut score = 0;
    for selector in selectors {
        match selector.check(caps) {
            Ok(()) => score += u64::from(selector.weight()),
            Err(reason) if selector.required() => {
                return Err(RateError::UnmetSelector {
                    kind: selector.kind().to_string(),
                    reason,
                });
            }
            Err(_) => {}
        }
    }
    Ok(score)
}

/// Rate a flavour whose image presence has already been checked
pub fn rate_flavour(
    flavour: &Flavour,
    caps: &Capabilities,
    image_present: bool,
) -> Result<u64, RateError> {
    if !image_present {
        return Err(RateError::ImageNotFound(flavour.image.clone()));
    }
    rate_selectors(&flavour.selectors, caps)
}

/// Result of a successful selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub flavour: Flavour,
    pub score: u64,
    /// Flavours that were excluded, with the reason
    pub rejections: Vec<Rejection>,
}

/// Pick the best flavour from rated candidates.
///
/// Candidates must be in ingestion order; ties keep that order.
pub fn select_flavour(
    release_id: &str,
    rated: Vec<(Flavour, Result<u64, RateError>)>,
    order: SelectionOrder,
) -> Result<Selection, KabinetError> {
    let mut candidates = Vec::new();
    let mut rejections = Vec::new();

    for (flavour, outcome) in rated {
        match outcome {
            Ok(score) => candidates.push((flavour, score)),
            Err(error) => {
                debug!("Flavour {} rejected: {}", flavour.name, error);
                rejections.push(Rejection {
                    flavour_id: flavour.id.clone(),
                    flavour_name: flavour.name.clone(),
                    error,
                });
            }
        }
    }

    match order {
        SelectionOrder::LowestFirst => candidates.sort_by_key(|(_, score)| *score),
        SelectionOrder::HighestFirst => candidates.sort_by(|(_, a), (_, b)| b.cmp(a)),
    }

    match candidates.into_iter().next() {
        Some((flavour, score)) => Ok(Selection {
            flavour,
            score,
            rejections,
        }),
        None => Err(KabinetError::NoFlavourAvailable {
            release_id: release_id.to_string(),
            rejections,
        }),
    }
}
