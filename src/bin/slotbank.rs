//! slotbank CLI
//!
//! Minimal local command layer over the economy core: one subcommand per
//! dispatcher operation, typed errors turned into messages here and nowhere
//! else.
//!
//! Usage:
//!   slotbank --scope guild-1 register alice
//!   slotbank --scope guild-1 payday alice
//!   slotbank --scope guild-1 slot alice 50
//!   slotbank --scope guild-1 set bob +200
//!
//! Environment Variables:
//!   SLOTBANK_DATA - Data directory for the JSON documents (default: data)

use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use slotbank::{
    BankError, Economy, EconomyError, JsonFileLedger, JsonFileSettings, SettingKey, SpinOutcome,
    PAYOUT_RULES,
};

#[derive(Parser, Debug)]
#[command(name = "slotbank")]
#[command(about = "Per-scope credit ledger with a slot machine")]
struct Args {
    /// Data directory holding bank.json and settings.json
    #[arg(long, env = "SLOTBANK_DATA", default_value = "data")]
    data_dir: String,

    /// Scope (one independent ledger) the command acts on
    #[arg(long, default_value = "default")]
    scope: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register an account for an owner
    Register { owner: String },
    /// Show an owner's balance
    Balance { owner: String },
    /// Transfer credits between two owners
    Transfer {
        sender: String,
        receiver: String,
        amount: i64,
    },
    /// Set an owner's credits: plain amount overwrites, +N/-N adjusts
    Set { owner: String, amount: String },
    /// Delete every account in the scope
    Reset {
        /// Required confirmation flag
        #[arg(long)]
        yes: bool,
    },
    /// Claim the periodic payday credits
    Payday { owner: String },
    /// Play the slot machine
    Slot { owner: String, bid: i64 },
    /// Show the payout table
    Payouts,
    /// Show the richest accounts
    Leaderboard {
        #[arg(default_value = "10")]
        top: usize,
        /// Rank across every scope instead of just this one
        #[arg(long)]
        global: bool,
    },
    /// Change a scope setting (slotmin, slotmax, slottime, paydaytime,
    /// paydaycredits, registercredits)
    Economyset { key: String, value: i64 },
}

fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args = Args::parse();
    let economy = Economy::new(
        Box::new(JsonFileLedger::new(format!("{}/bank.json", args.data_dir))),
        Box::new(JsonFileSettings::new(format!(
            "{}/settings.json",
            args.data_dir
        ))),
    )?;
    let scope = args.scope.as_str();

    match args.command {
        Command::Register { owner } => match economy.register(scope, &owner, &owner) {
            Ok(account) => println!("Account opened for {}. Balance: {}", owner, account.balance),
            Err(BankError::AccountAlreadyExists) => {
                println!("{} already has an account here.", owner)
            }
            Err(e) => return Err(e.into()),
        },
        Command::Balance { owner } => match economy.bank().get_balance(scope, &owner) {
            Ok(balance) => println!("{}: {} credits", owner, balance),
            Err(BankError::NoAccount) => println!("{} has no account. Register first.", owner),
            Err(e) => return Err(e.into()),
        },
        Command::Transfer {
            sender,
            receiver,
            amount,
        } => match economy.bank().transfer(scope, &sender, &receiver, amount) {
            Ok(()) => println!("{} credits transferred to {}.", amount, receiver),
            Err(
                e @ (BankError::NegativeValue
                | BankError::SameSenderAndReceiver
                | BankError::InsufficientBalance
                | BankError::NoAccount),
            ) => println!("Transfer failed: {}", e),
            Err(e) => return Err(e.into()),
        },
        Command::Set { owner, amount } => {
            let bank = economy.bank();
            let result = match parse_set_amount(&amount)? {
                SetOperation::Deposit(n) => bank.deposit(scope, &owner, n),
                SetOperation::Withdraw(n) => bank.withdraw(scope, &owner, n),
                SetOperation::Overwrite(n) => bank.set_balance(scope, &owner, n),
            };
            match result {
                Ok(balance) => println!("{} now has {} credits.", owner, balance),
                Err(e @ (BankError::NoAccount | BankError::InsufficientBalance)) => {
                    println!("Set failed: {}", e)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Reset { yes } => {
            if !yes {
                println!("This wipes every account in scope {}. Re-run with --yes.", scope);
            } else {
                economy.bank().wipe_scope(scope)?;
                println!("All accounts in scope {} deleted.", scope);
            }
        }
        Command::Payday { owner } => match economy.payday(scope, &owner, Instant::now()) {
            Ok(payday) => println!(
                "+{} credits! {} now has {}.",
                payday.credited, owner, payday.new_balance
            ),
            Err(e @ (EconomyError::OnCooldown { .. } | EconomyError::Bank(BankError::NoAccount))) => {
                println!("Payday failed: {}", e)
            }
            Err(e) => return Err(e.into()),
        },
        Command::Slot { owner, bid } => match economy.slot(scope, &owner, bid, Instant::now()) {
            Ok(outcome) => print_spin(&owner, &outcome),
            Err(
                e @ (EconomyError::InvalidBid { .. }
                | EconomyError::OnCooldown { .. }
                | EconomyError::Bank(BankError::NoAccount | BankError::InsufficientBalance)),
            ) => println!("Spin refused: {}", e),
            Err(e) => return Err(e.into()),
        },
        Command::Payouts => {
            println!("Slot machine payouts:");
            for rule in &PAYOUT_RULES {
                println!("  {:<16} {}", rule.label, rule.formula.describe());
            }
        }
        Command::Leaderboard { top, global } => {
            let accounts = if global {
                // The CLI has no scope registry; every persisted scope counts.
                economy.global_leaderboard(|_| true, top)
            } else {
                economy.leaderboard(scope, top)
            };
            if accounts.is_empty() {
                println!("There are no accounts in the bank.");
            }
            for (place, account) in accounts.iter().enumerate() {
                println!(
                    "{:<3} {:<20} {}",
                    place + 1,
                    account.display_name,
                    account.balance
                );
            }
        }
        Command::Economyset { key, value } => match SettingKey::parse(&key) {
            Some(key) => {
                economy.configure(scope, key, value)?;
                println!("{} set to {}.", key.as_str(), value);
            }
            None => println!("Unknown setting: {}", key),
        },
    }
    Ok(())
}

enum SetOperation {
    Deposit(i64),
    Withdraw(i64),
    Overwrite(i64),
}

/// `+N` deposits, `-N` withdraws, a bare number overwrites.
fn parse_set_amount(s: &str) -> Result<SetOperation> {
    if let Some(rest) = s.strip_prefix('+') {
        Ok(SetOperation::Deposit(rest.parse()?))
    } else if let Some(rest) = s.strip_prefix('-') {
        Ok(SetOperation::Withdraw(rest.parse()?))
    } else {
        Ok(SetOperation::Overwrite(s.parse()?))
    }
}

fn print_spin(owner: &str, outcome: &SpinOutcome) {
    for (i, row) in outcome.grid.rows.iter().enumerate() {
        let marker = if i == 1 { ">" } else { " " };
        println!(
            "{} {} {} {}",
            marker,
            row[0].emoji(),
            row[1].emoji(),
            row[2].emoji()
        );
    }
    match outcome.rule {
        Some(rule) => println!(
            "{} wins with {} ({})! Bid: {}  {} -> {}",
            owner,
            rule.label,
            rule.formula.describe(),
            outcome.bid,
            outcome.old_balance,
            outcome.new_balance
        ),
        None => println!(
            "Nothing! Bid: {}  {} -> {}",
            outcome.bid, outcome.old_balance, outcome.new_balance
        ),
    }
}
