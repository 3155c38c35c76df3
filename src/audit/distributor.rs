// Distributor - Stake-weighted split of a block's fees
// Principle: no unit is lost to rounding, the author absorbs every remainder

use crate::types::{AccountId, Balance, Weight};

/// Distribution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributionError {
    #[error("Collected fee {total_fee} is below the minimum fee {total_min_fee}")]
    FeeBelowMinimum {
        total_fee: Balance,
        total_min_fee: Balance,
    },

    #[error("Share computation overflowed for {0}")]
    Overflow(AccountId),

    #[error("Total stake weight overflowed")]
    WeightOverflow,
}

/// Result of splitting one block's fees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeDistribution {
    /// Stakeholder shares, in weight snapshot order, zero shares omitted
    pub shares: Vec<(AccountId, Balance)>,
    pub author: AccountId,
    /// `total_fee - sum(shares)`
    pub author_reward: Balance,
}

impl FeeDistribution {
    pub fn distributed_to_stakeholders(&self) -> Balance {
        self.shares.iter().map(|(_, share)| *share).sum()
    }

    pub fn total(&self) -> Balance {
        self.distributed_to_stakeholders() + self.author_reward
    }
}

/// `share_i = total_min_fee * weight_i / total_weight` (floor), remainder to the author
pub fn distribute(
    total_fee: Balance,
    total_min_fee: Balance,
    weights: &[Weight],
    author: AccountId,
) -> Result<FeeDistribution, DistributionError> {
    if total_fee < total_min_fee {
        return Err(DistributionError::FeeBelowMinimum {
            total_fee,
            total_min_fee,
        });
    }

    let total_weight = weights
        .iter()
        .try_fold(0 as Balance, |acc, w| acc.checked_add(w.weight))
        .ok_or(DistributionError::WeightOverflow)?;

    let mut shares = Vec::with_capacity(weights.len());
    let mut distributed: Balance = 0;

    if total_weight > 0 {
        for w in weights {
            let share = total_min_fee
                .checked_mul(w.weight)
                .ok_or(DistributionError::Overflow(w.account))?
                / total_weight;
            if share > 0 {
                shares.push((w.account, share));
                distributed += share;
            }
        }
    }

    Ok(FeeDistribution {
        shares,
        author,
        author_reward: total_fee - distributed,
    })
}
