//! Shared data types: accounts and per-scope settings.
//!
//! These are the shapes that cross module boundaries — the in-memory account
//! the bank hands out, and the settings block persisted per scope.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used in the accounts document (`created_at` field).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A credit account, uniquely keyed by (scope_id, owner_id).
///
/// Accounts are created only through explicit registration and mutated only
/// through the bank; `balance` is never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Isolation boundary this account lives in (one independent ledger).
    pub scope_id: String,
    /// Identity holding the balance within the scope.
    pub owner_id: String,
    /// Human-readable name captured at registration.
    pub display_name: String,
    /// Current credit balance, always >= 0.
    pub balance: i64,
    /// UTC timestamp of registration.
    pub created_at: NaiveDateTime,
}

/// Per-scope configuration block.
///
/// Serialized field names match the settings document keys. Times are in
/// seconds. A scope's block is created with defaults on first reference and
/// overwritten one key at a time via the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSettings {
    /// Seconds between paydays for one owner.
    #[serde(rename = "PAYDAY_TIME")]
    pub payday_time: i64,
    /// Credits granted per payday.
    #[serde(rename = "PAYDAY_CREDITS")]
    pub payday_credits: i64,
    /// Minimum slot bid.
    #[serde(rename = "SLOT_MIN")]
    pub slot_min: i64,
    /// Maximum slot bid.
    #[serde(rename = "SLOT_MAX")]
    pub slot_max: i64,
    /// Seconds between slot plays for one owner.
    #[serde(rename = "SLOT_TIME")]
    pub slot_time: i64,
    /// Starting balance granted at registration.
    #[serde(rename = "REGISTER_CREDITS")]
    pub register_credits: i64,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            payday_time: 300,
            payday_credits: 120,
            slot_min: 5,
            slot_max: 100_000,
            slot_time: 0,
            register_credits: 500,
        }
    }
}

/// The six configurable settings keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    PaydayTime,
    PaydayCredits,
    SlotMin,
    SlotMax,
    SlotTime,
    RegisterCredits,
}

impl SettingKey {
    /// All keys, in document order.
    pub const ALL: [SettingKey; 6] = [
        SettingKey::PaydayTime,
        SettingKey::PaydayCredits,
        SettingKey::SlotMin,
        SettingKey::SlotMax,
        SettingKey::SlotTime,
        SettingKey::RegisterCredits,
    ];

    /// Document key name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::PaydayTime => "PAYDAY_TIME",
            SettingKey::PaydayCredits => "PAYDAY_CREDITS",
            SettingKey::SlotMin => "SLOT_MIN",
            SettingKey::SlotMax => "SLOT_MAX",
            SettingKey::SlotTime => "SLOT_TIME",
            SettingKey::RegisterCredits => "REGISTER_CREDITS",
        }
    }

    /// Parse a document key name (case-insensitive, underscores optional).
    pub fn parse(s: &str) -> Option<SettingKey> {
        match s.to_ascii_uppercase().as_str() {
            "PAYDAY_TIME" | "PAYDAYTIME" => Some(SettingKey::PaydayTime),
            "PAYDAY_CREDITS" | "PAYDAYCREDITS" => Some(SettingKey::PaydayCredits),
            "SLOT_MIN" | "SLOTMIN" => Some(SettingKey::SlotMin),
            "SLOT_MAX" | "SLOTMAX" => Some(SettingKey::SlotMax),
            "SLOT_TIME" | "SLOTTIME" => Some(SettingKey::SlotTime),
            "REGISTER_CREDITS" | "REGISTERCREDITS" => Some(SettingKey::RegisterCredits),
            _ => None,
        }
    }
}

impl ScopeSettings {
    pub fn get(&self, key: SettingKey) -> i64 {
        match key {
            SettingKey::PaydayTime => self.payday_time,
            SettingKey::PaydayCredits => self.payday_credits,
            SettingKey::SlotMin => self.slot_min,
            SettingKey::SlotMax => self.slot_max,
            SettingKey::SlotTime => self.slot_time,
            SettingKey::RegisterCredits => self.register_credits,
        }
    }

    pub fn set(&mut self, key: SettingKey, value: i64) {
        match key {
            SettingKey::PaydayTime => self.payday_time = value,
            SettingKey::PaydayCredits => self.payday_credits = value,
            SettingKey::SlotMin => self.slot_min = value,
            SettingKey::SlotMax => self.slot_max = value,
            SettingKey::SlotTime => self.slot_time = value,
            SettingKey::RegisterCredits => self.register_credits = value,
        }
    }
}
