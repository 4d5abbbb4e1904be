//! Slot machine: reel simulation, payout resolution, settlement.
//!
//! The wheel is a fixed cyclic sequence of 10 distinct symbols. Each of the 3
//! reels picks a uniformly random rotation offset and shows the 3 consecutive
//! symbols starting there (wrapping), so a reel's visible column is always
//! three neighbors in the fixed cycle — not three independent draws. That
//! adjacency is load-bearing for the payout odds and must not be replaced
//! with independent sampling.
//!
//! Payout is resolved from the middle row against an ordered rule list:
//! exact triple, then exact pair on (first, second), then on (second, third),
//! then the generic three-of-a-kind and two-adjacent buckets. Formulas are
//! pure integer functions of the bid.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::bank::Bank;
use crate::cooldown::{CooldownStatus, CooldownTracker};
use crate::errors::{BankError, EconomyError};
use crate::models::ScopeSettings;

/// The ten reel symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Cherries,
    Cookie,
    Two,
    Clover,
    Cyclone,
    Sunflower,
    Six,
    Mushroom,
    Heart,
    Snowflake,
}

impl Symbol {
    pub fn emoji(&self) -> &'static str {
        match self {
            Symbol::Cherries => "\u{1F352}",
            Symbol::Cookie => "\u{1F36A}",
            Symbol::Two => "2\u{20E3}",
            Symbol::Clover => "\u{1F340}",
            Symbol::Cyclone => "\u{1F300}",
            Symbol::Sunflower => "\u{1F33B}",
            Symbol::Six => "6\u{20E3}",
            Symbol::Mushroom => "\u{1F344}",
            Symbol::Heart => "\u{2764}",
            Symbol::Snowflake => "\u{2744}",
        }
    }
}

/// The fixed cyclic symbol order. Never re-shuffled between spins.
pub const WHEEL: [Symbol; 10] = [
    Symbol::Cherries,
    Symbol::Cookie,
    Symbol::Two,
    Symbol::Clover,
    Symbol::Cyclone,
    Symbol::Sunflower,
    Symbol::Six,
    Symbol::Mushroom,
    Symbol::Heart,
    Symbol::Snowflake,
];

/// Pure payout formula over the bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutFormula {
    /// bid * factor + bid
    MultiplyBid(i64),
    /// bid + bonus
    AddFlat(i64),
}

impl PayoutFormula {
    pub fn apply(&self, bid: i64) -> i64 {
        match *self {
            PayoutFormula::MultiplyBid(factor) => bid.saturating_mul(factor).saturating_add(bid),
            PayoutFormula::AddFlat(bonus) => bid.saturating_add(bonus),
        }
    }

    /// Short human-readable form for payout tables.
    pub fn describe(&self) -> String {
        match *self {
            PayoutFormula::MultiplyBid(factor) => format!("Bet * {}", factor),
            PayoutFormula::AddFlat(bonus) => format!("+{}", bonus),
        }
    }
}

/// What a rule matches against the middle row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePattern {
    /// Exact ordered triple.
    Triple([Symbol; 3]),
    /// Exact ordered adjacent pair, checked on (first, second) then
    /// (second, third).
    Pair([Symbol; 2]),
    /// Any three identical symbols.
    AnyThree,
    /// Any two adjacent identical symbols.
    AnyTwo,
}

/// One entry in the payout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutRule {
    pub pattern: RulePattern,
    pub formula: PayoutFormula,
    /// Stable identifier for callers rendering results.
    pub label: &'static str,
}

/// The payout table, in resolution priority order within each pattern class.
pub const PAYOUT_RULES: [PayoutRule; 7] = [
    PayoutRule {
        pattern: RulePattern::Triple([Symbol::Two, Symbol::Two, Symbol::Six]),
        formula: PayoutFormula::MultiplyBid(2500),
        label: "226 jackpot",
    },
    PayoutRule {
        pattern: RulePattern::Triple([Symbol::Clover, Symbol::Clover, Symbol::Clover]),
        formula: PayoutFormula::AddFlat(1000),
        label: "three clovers",
    },
    PayoutRule {
        pattern: RulePattern::Triple([Symbol::Cherries, Symbol::Cherries, Symbol::Cherries]),
        formula: PayoutFormula::AddFlat(800),
        label: "three cherries",
    },
    PayoutRule {
        pattern: RulePattern::Pair([Symbol::Two, Symbol::Six]),
        formula: PayoutFormula::MultiplyBid(4),
        label: "two six",
    },
    PayoutRule {
        pattern: RulePattern::Pair([Symbol::Cherries, Symbol::Cherries]),
        formula: PayoutFormula::MultiplyBid(3),
        label: "two cherries",
    },
    PayoutRule {
        pattern: RulePattern::AnyThree,
        formula: PayoutFormula::AddFlat(500),
        label: "three of a kind",
    },
    PayoutRule {
        pattern: RulePattern::AnyTwo,
        formula: PayoutFormula::MultiplyBid(2),
        label: "two adjacent",
    },
];

/// The 3x3 visible grid; `rows[1]` is the payline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub rows: [[Symbol; 3]; 3],
}

impl Grid {
    pub fn middle_row(&self) -> [Symbol; 3] {
        self.rows[1]
    }
}

/// Spin three reels: one random rotation offset each, three consecutive wheel
/// symbols visible per reel.
pub fn spin_reels<R: Rng>(rng: &mut R) -> Grid {
    let mut rows = [[Symbol::Cherries; 3]; 3];
    for reel in 0..3 {
        let offset = rng.gen_range(0..WHEEL.len());
        for row in 0..3 {
            rows[row][reel] = WHEEL[(offset + row) % WHEEL.len()];
        }
    }
    Grid { rows }
}

/// Resolve the middle row against the payout table, in strict priority
/// order; the first match wins.
pub fn resolve_payout(row: [Symbol; 3]) -> Option<&'static PayoutRule> {
    for rule in &PAYOUT_RULES {
        if let RulePattern::Triple(triple) = rule.pattern {
            if triple == row {
                return Some(rule);
            }
        }
    }
    for pair in [[row[0], row[1]], [row[1], row[2]]] {
        for rule in &PAYOUT_RULES {
            if let RulePattern::Pair(p) = rule.pattern {
                if p == pair {
                    return Some(rule);
                }
            }
        }
    }
    if row[0] == row[1] && row[1] == row[2] {
        return PAYOUT_RULES
            .iter()
            .find(|r| matches!(r.pattern, RulePattern::AnyThree));
    }
    if row[0] == row[1] || row[1] == row[2] {
        return PAYOUT_RULES
            .iter()
            .find(|r| matches!(r.pattern, RulePattern::AnyTwo));
    }
    None
}

/// Result of one spin, already settled against the ledger.
#[derive(Debug, Clone)]
pub struct SpinOutcome {
    pub grid: Grid,
    /// The matched payout rule, if any.
    pub rule: Option<&'static PayoutRule>,
    pub bid: i64,
    pub old_balance: i64,
    pub new_balance: i64,
}

/// The slot machine. Stateless between spins apart from its RNG; cooldowns
/// and balances live in the tracker and the bank.
pub struct SlotMachine {
    rng: Mutex<ChaCha8Rng>,
}

impl Default for SlotMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotMachine {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Deterministic machine for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn spin(&self) -> Grid {
        spin_reels(&mut *self.rng.lock())
    }

    /// Play one round: validate, spin, resolve, settle.
    ///
    /// Validation never consumes the cooldown — the bid and balance are
    /// checked first, and the cooldown check-and-reset runs last, at spin
    /// start. On a win the balance moves in one delta
    /// (old - bid + formula(bid)); on a loss the bid is withdrawn.
    pub fn play(
        &self,
        bank: &Bank,
        cooldowns: &CooldownTracker,
        settings: &ScopeSettings,
        scope_id: &str,
        owner_id: &str,
        bid: i64,
        now: Instant,
    ) -> Result<SpinOutcome, EconomyError> {
        if bid < settings.slot_min || bid > settings.slot_max {
            return Err(EconomyError::InvalidBid {
                min: settings.slot_min,
                max: settings.slot_max,
            });
        }
        if !bank.can_spend(scope_id, owner_id, bid)? {
            return Err(EconomyError::Bank(BankError::InsufficientBalance));
        }
        let interval = Duration::from_secs(settings.slot_time.max(0) as u64);
        if let CooldownStatus::Wait(remaining) =
            cooldowns.check_and_reset(scope_id, owner_id, now, interval)
        {
            return Err(EconomyError::OnCooldown { remaining });
        }

        let grid = self.spin();
        let rule = resolve_payout(grid.middle_row());
        let (old_balance, new_balance) = match settle(bank, scope_id, owner_id, bid, rule) {
            Ok(balances) => balances,
            Err(e) => {
                // The spin never settled; hand the cooldown back.
                cooldowns.clear(scope_id, owner_id);
                return Err(e.into());
            }
        };

        info!(
            scope = scope_id,
            owner = owner_id,
            bid,
            rule = rule.map(|r| r.label).unwrap_or("none"),
            old_balance,
            new_balance,
            "slot settled"
        );
        Ok(SpinOutcome {
            grid,
            rule,
            bid,
            old_balance,
            new_balance,
        })
    }
}

/// Apply the outcome to the ledger. Returns (old, new) balances.
fn settle(
    bank: &Bank,
    scope_id: &str,
    owner_id: &str,
    bid: i64,
    rule: Option<&'static PayoutRule>,
) -> Result<(i64, i64), BankError> {
    let old_balance = bank.get_balance(scope_id, owner_id)?;
    let new_balance = match rule {
        Some(rule) => {
            let target = old_balance - bid + rule.formula.apply(bid);
            bank.set_balance(scope_id, owner_id, target)?
        }
        None => bank.withdraw(scope_id, owner_id, bid)?,
    };
    Ok((old_balance, new_balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLedger;
    use std::collections::HashSet;

    fn test_bank_with(balance: i64) -> Bank {
        let bank = Bank::new(Box::new(MemoryLedger::new())).unwrap();
        bank.create_account("s", "alice", "Alice", balance).unwrap();
        bank
    }

    fn rule_for(row: [Symbol; 3]) -> Option<&'static str> {
        resolve_payout(row).map(|r| r.label)
    }

    #[test]
    fn test_wheel_symbols_distinct() {
        let unique: HashSet<_> = WHEEL.iter().map(|s| s.emoji()).collect();
        assert_eq!(unique.len(), WHEEL.len());
    }

    #[test]
    fn test_reel_columns_are_wheel_neighbors() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let grid = spin_reels(&mut rng);
            for reel in 0..3 {
                let top = WHEEL.iter().position(|&s| s == grid.rows[0][reel]).unwrap();
                assert_eq!(grid.rows[1][reel], WHEEL[(top + 1) % WHEEL.len()]);
                assert_eq!(grid.rows[2][reel], WHEEL[(top + 2) % WHEEL.len()]);
            }
        }
    }

    #[test]
    fn test_resolve_exact_triples_first() {
        assert_eq!(
            rule_for([Symbol::Two, Symbol::Two, Symbol::Six]),
            Some("226 jackpot")
        );
        assert_eq!(
            rule_for([Symbol::Clover, Symbol::Clover, Symbol::Clover]),
            Some("three clovers")
        );
        // Three cherries hits its own triple, not the cherries pair or the
        // generic three-of-a-kind bucket.
        assert_eq!(
            rule_for([Symbol::Cherries, Symbol::Cherries, Symbol::Cherries]),
            Some("three cherries")
        );
    }

    #[test]
    fn test_resolve_pairs_first_then_second_window() {
        assert_eq!(
            rule_for([Symbol::Two, Symbol::Six, Symbol::Heart]),
            Some("two six")
        );
        assert_eq!(
            rule_for([Symbol::Heart, Symbol::Two, Symbol::Six]),
            Some("two six")
        );
        assert_eq!(
            rule_for([Symbol::Cherries, Symbol::Cherries, Symbol::Six]),
            Some("two cherries")
        );
        assert_eq!(
            rule_for([Symbol::Six, Symbol::Cherries, Symbol::Cherries]),
            Some("two cherries")
        );
    }

    #[test]
    fn test_resolve_generic_buckets() {
        assert_eq!(
            rule_for([Symbol::Heart, Symbol::Heart, Symbol::Heart]),
            Some("three of a kind")
        );
        assert_eq!(
            rule_for([Symbol::Mushroom, Symbol::Mushroom, Symbol::Snowflake]),
            Some("two adjacent")
        );
        assert_eq!(
            rule_for([Symbol::Snowflake, Symbol::Mushroom, Symbol::Mushroom]),
            Some("two adjacent")
        );
    }

    #[test]
    fn test_resolve_no_match() {
        assert_eq!(rule_for([Symbol::Cherries, Symbol::Heart, Symbol::Cherries]), None);
        assert_eq!(rule_for([Symbol::Cookie, Symbol::Cyclone, Symbol::Heart]), None);
    }

    #[test]
    fn test_formulas() {
        assert_eq!(PayoutFormula::MultiplyBid(2500).apply(10), 25_010);
        assert_eq!(PayoutFormula::MultiplyBid(4).apply(10), 50);
        assert_eq!(PayoutFormula::AddFlat(1000).apply(10), 1010);
        assert_eq!(PayoutFormula::AddFlat(500).apply(7), 507);
    }

    #[test]
    fn test_settle_jackpot_delta() {
        let bank = test_bank_with(100);
        let jackpot = resolve_payout([Symbol::Two, Symbol::Two, Symbol::Six]);
        let (old, new) = settle(&bank, "s", "alice", 10, jackpot).unwrap();
        assert_eq!(old, 100);
        // old - bid + (bid * 2500 + bid)
        assert_eq!(new, 100 - 10 + 25_010);
        assert_eq!(new, 25_100);
        assert_eq!(bank.get_balance("s", "alice").unwrap(), 25_100);
    }

    #[test]
    fn test_settle_loss_withdraws_bid() {
        let bank = test_bank_with(100);
        let (old, new) = settle(&bank, "s", "alice", 10, None).unwrap();
        assert_eq!(old, 100);
        assert_eq!(new, 90);
        assert_eq!(bank.get_balance("s", "alice").unwrap(), 90);
    }

    #[test]
    fn test_play_matches_predicted_spin() {
        let seed = 2026;
        let mut preview = ChaCha8Rng::seed_from_u64(seed);
        let expected_grid = spin_reels(&mut preview);
        let expected_rule = resolve_payout(expected_grid.middle_row());

        let bank = test_bank_with(1_000_000);
        let machine = SlotMachine::with_seed(seed);
        let cooldowns = CooldownTracker::new();
        let settings = ScopeSettings::default();

        let outcome = machine
            .play(&bank, &cooldowns, &settings, "s", "alice", 10, Instant::now())
            .unwrap();
        assert_eq!(outcome.grid, expected_grid);
        assert_eq!(outcome.rule.map(|r| r.label), expected_rule.map(|r| r.label));
        assert_eq!(outcome.old_balance, 1_000_000);
        let expected_new = match expected_rule {
            Some(rule) => 1_000_000 - 10 + rule.formula.apply(10),
            None => 1_000_000 - 10,
        };
        assert_eq!(outcome.new_balance, expected_new);
        assert_eq!(bank.get_balance("s", "alice").unwrap(), expected_new);
    }

    #[test]
    fn test_play_rejects_out_of_range_bids() {
        let bank = test_bank_with(1000);
        let machine = SlotMachine::with_seed(1);
        let cooldowns = CooldownTracker::new();
        let settings = ScopeSettings::default();

        assert!(matches!(
            machine.play(&bank, &cooldowns, &settings, "s", "alice", 4, Instant::now()),
            Err(EconomyError::InvalidBid { min: 5, max: 100_000 })
        ));
        assert!(matches!(
            machine.play(&bank, &cooldowns, &settings, "s", "alice", 100_001, Instant::now()),
            Err(EconomyError::InvalidBid { .. })
        ));
    }

    #[test]
    fn test_play_requires_funds_and_account() {
        let bank = test_bank_with(5);
        let machine = SlotMachine::with_seed(1);
        let cooldowns = CooldownTracker::new();
        let settings = ScopeSettings::default();

        assert!(matches!(
            machine.play(&bank, &cooldowns, &settings, "s", "alice", 6, Instant::now()),
            Err(EconomyError::Bank(BankError::InsufficientBalance))
        ));
        assert!(matches!(
            machine.play(&bank, &cooldowns, &settings, "s", "ghost", 6, Instant::now()),
            Err(EconomyError::Bank(BankError::NoAccount))
        ));
    }

    #[test]
    fn test_play_cooldown_applies_between_spins() {
        let bank = test_bank_with(1_000_000);
        let machine = SlotMachine::with_seed(1);
        let cooldowns = CooldownTracker::new();
        let mut settings = ScopeSettings::default();
        settings.slot_time = 30;

        let t0 = Instant::now();
        machine
            .play(&bank, &cooldowns, &settings, "s", "alice", 10, t0)
            .unwrap();
        match machine.play(&bank, &cooldowns, &settings, "s", "alice", 10, t0 + Duration::from_secs(10)) {
            Err(EconomyError::OnCooldown { remaining }) => {
                assert_eq!(remaining, Duration::from_secs(20));
            }
            other => panic!("expected cooldown, got {:?}", other.map(|o| o.new_balance)),
        }
        assert!(machine
            .play(&bank, &cooldowns, &settings, "s", "alice", 10, t0 + Duration::from_secs(30))
            .is_ok());
    }

    #[test]
    fn test_failed_validation_does_not_consume_cooldown() {
        let bank = test_bank_with(1_000_000);
        let machine = SlotMachine::with_seed(1);
        let cooldowns = CooldownTracker::new();
        let mut settings = ScopeSettings::default();
        settings.slot_time = 60;

        let t0 = Instant::now();
        // Invalid bid first; the cooldown must still be fresh for the real spin.
        assert!(machine
            .play(&bank, &cooldowns, &settings, "s", "alice", 1, t0)
            .is_err());
        assert!(machine
            .play(&bank, &cooldowns, &settings, "s", "alice", 10, t0)
            .is_ok());
    }
}
