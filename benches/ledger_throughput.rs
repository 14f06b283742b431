//! Benchmark suite for the ledger core
//!
//! Measures replaying generated operation streams through the CSV pipeline
//! and direct transfers through the engine, using the divan benchmarking
//! framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Each generated stream registers a handful of users, opens one account per
//! user and then cycles through deposits, withdrawals and transfers.

use banking_ledger::io::OperationReader;
use banking_ledger::{
    AccountType, BankingEngine, InMemoryDirectory, LedgerConfig, Replayer, UserProfile,
};
use divan::Bencher;
use rand::Rng;
use rust_decimal_macros::dec;
use std::fmt::Write;
use std::sync::Arc;

const USERS: u64 = 16;

fn main() {
    divan::main();
}

fn account_number(user: u64) -> String {
    format!("{:010}", 1_000_000_000 + user)
}

fn generate_operations(count: usize) -> String {
    let mut csv =
        String::from("op,user,phone,account,target,account_type,status,amount,description,pin\n");

    for user in 1..=USERS {
        let _ = writeln!(csv, "user,{},+1555{:07},,,,,,,", user, user);
        let _ = writeln!(
            csv,
            "open,{},,{},,savings,,1000.00,,",
            user,
            account_number(user)
        );
    }

    for i in 0..count as u64 {
        let from = account_number(i % USERS + 1);
        let to = account_number((i + 1) % USERS + 1);
        let _ = match i % 3 {
            0 => writeln!(csv, "deposit,,,{},,,,12.50,,", from),
            1 => writeln!(csv, "withdraw,,,{},,,,7.25,,", from),
            _ => writeln!(csv, "transfer,,,{},{},,,3.10,,", from, to),
        };
    }

    csv
}

/// Replay a generated stream of operations through the CSV pipeline
#[divan::bench(args = [100, 1_000, 10_000])]
fn replay_operations(bencher: Bencher, count: usize) {
    bencher
        .with_inputs(|| generate_operations(count))
        .bench_values(|csv| {
            let mut replayer = Replayer::new(LedgerConfig::default());
            replayer.run(OperationReader::from_reader(csv.as_bytes()));
            let mut output = Vec::new();
            replayer
                .write_accounts(&mut output)
                .expect("Writing accounts failed");
            output
        });
}

fn engine_with_accounts() -> BankingEngine {
    let directory = Arc::new(InMemoryDirectory::new());
    let engine = BankingEngine::new(directory.clone(), directory.clone(), LedgerConfig::default());

    for user in 1..=USERS {
        directory
            .register_user(UserProfile::new(user, format!("+1555{:07}", user)))
            .expect("Registering user failed");
        engine
            .open_account_with_number(
                &account_number(user),
                user,
                AccountType::Current,
                dec!(1000000.00),
            )
            .expect("Opening account failed");
    }

    engine
}

/// Transfers between neighbouring accounts from several threads at once
#[divan::bench(threads = [1, 4, 8])]
fn concurrent_transfers(bencher: Bencher) {
    let engine = engine_with_accounts();

    bencher.bench(|| {
        let user = rand_user();
        let from = account_number(user);
        let to = account_number(user % USERS + 1);
        engine
            .transfer(&from, &to, dec!(0.01), None, false)
            .expect("Transfer failed")
    });
}

fn rand_user() -> u64 {
    rand::thread_rng().gen_range(1..=USERS)
}
