// 🎲 Draw Engine - uniform winner selection + selection reset
//
// The random source is always passed in. `DrawRng` derives a `StdRng` from
// the SHA-256 of a seed label, and that label is written to the audit trail,
// so any draw can be replayed against the same pool.
//
// Not cryptographically secure: fairness here means uniform sampling, not
// resistance to an operator who picks seeds.

use crate::db::{self, Entry, Event};
use crate::eligibility::EligibilityPolicy;
use crate::error::{DrawError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, RngCore, SeedableRng};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

// ============================================================================
// RANDOM SOURCE
// ============================================================================

/// Seeded random source for draws
pub struct DrawRng {
    seed: String,
    rng: StdRng,
}

impl DrawRng {
    /// Deterministic generator for a seed label
    pub fn from_seed(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();

        DrawRng {
            seed: label.to_string(),
            rng: StdRng::from_seed(seed),
        }
    }

    /// Fresh random label, so even ad-hoc draws have a recorded seed
    pub fn from_entropy() -> Self {
        Self::from_seed(&uuid::Uuid::new_v4().to_string())
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl RngCore for DrawRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

// ============================================================================
// DRAW
// ============================================================================

/// Result of one draw, as recorded in the audit trail
#[derive(Debug, Clone, Serialize)]
pub struct DrawOutcome {
    pub seed: String,
    pub policy: EligibilityPolicy,
    pub pool_size: usize,
    pub max_winners: usize,
    /// In sampling order
    pub winners: Vec<Entry>,
}

/// Pick `min(max_winners, pool.len())` distinct entries, every subset equally likely
pub fn sample_winners<R: Rng + ?Sized>(pool: Vec<Entry>, max_winners: usize, rng: &mut R) -> Vec<Entry> {
    let count = max_winners.min(pool.len());
    if count == 0 {
        return Vec::new();
    }

    let picked = index::sample(rng, pool.len(), count);
    let mut slots: Vec<Option<Entry>> = pool.into_iter().map(Some).collect();

    picked
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Draw winners from the eligible, unselected pool and mark them selected
///
/// Pool read, sampling, marking and the audit event share one
/// `BEGIN IMMEDIATE` transaction: a concurrent draw waits for this one to
/// commit and then sees the updated pool. On any error nothing is marked.
///
/// An empty pool is not an error; the outcome simply has no winners.
pub fn draw(
    conn: &mut Connection,
    policy: EligibilityPolicy,
    max_winners: usize,
    rng: &mut DrawRng,
) -> Result<DrawOutcome> {
    if max_winners == 0 {
        return Err(DrawError::InvalidArgument(
            "max_winners must be a positive integer".to_string(),
        ));
    }

    db::require_schema(conn)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let pool = db::find_eligible(&tx, policy)?;
    let pool_size = pool.len();

    let mut winners = sample_winners(pool, max_winners, rng);
    let ids: Vec<i64> = winners.iter().map(|w| w.id).collect();
    db::mark_selected(&tx, &ids)?;
    for winner in &mut winners {
        winner.is_selected = true;
    }

    let handles: Vec<&str> = winners.iter().map(|w| w.handle.as_str()).collect();
    db::insert_event(
        &tx,
        &Event::new(
            "winners_drawn",
            "draw",
            rng.seed(),
            serde_json::json!({
                "policy": policy.name(),
                "pool_size": pool_size,
                "max_winners": max_winners,
                "winners": handles,
            }),
            "draw_engine",
        ),
    )?;

    tx.commit()?;

    info!(
        seed = rng.seed(),
        %policy,
        pool_size,
        winners = winners.len(),
        "draw committed"
    );

    Ok(DrawOutcome {
        seed: rng.seed().to_string(),
        policy,
        pool_size,
        max_winners,
        winners,
    })
}

// ============================================================================
// RESET
// ============================================================================

/// Clear `is_selected` on every entry so another draw can run
///
/// Idempotent: a second call changes nothing, not even the audit trail.
/// Handles and eligibility inputs are never touched. Returns the number of
/// entries that were selected before the call.
pub fn reset_selection(conn: &mut Connection) -> Result<usize> {
    db::require_schema(conn)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let cleared = db::clear_selected(&tx)?;
    if cleared > 0 {
        db::insert_event(
            &tx,
            &Event::new(
                "selection_reset",
                "draw",
                "all",
                serde_json::json!({ "cleared": cleared }),
                "draw_engine",
            ),
        )?;
    }

    tx.commit()?;

    info!(cleared, "selection reset");
    Ok(cleared)
}
