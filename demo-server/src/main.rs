// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! Scripted demo: spawns a handful of real OS threads against a shared
//! [`Dispatcher`] and prints every contract violation it detects.

use anaconda_core::{Config, Dispatcher};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drives a scripted multi-thread workload through anaconda-core and
/// reports the contract violations it finds.
#[derive(Parser, Debug)]
#[command(name = "anaconda-demo", about = "Dynamic concurrency contract checker demo")]
struct Args {
    /// Path to a contract file.
    #[arg(default_value = "demos/sample.contract")]
    contract: PathBuf,

    /// Append every violation found to this file, in addition to stdout.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Append every violation found to this file as JSON Lines.
    #[arg(long)]
    json_report: Option<PathBuf>,

    /// Write a `<contract>.dump` file of the parsed contract next to it.
    #[arg(long)]
    dump_contracts: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anaconda_demo=info,anaconda_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config {
        contract_paths: vec![args.contract.clone()],
        report_path: args.report.clone(),
        json_report_path: args.json_report.clone(),
        dump_contracts: args.dump_contracts,
    };

    let dispatcher = match Dispatcher::new(&config) {
        Ok(d) => Arc::new(d),
        Err(err) => {
            eprintln!("failed to load {}: {err}", args.contract.display());
            std::process::exit(1);
        }
    };

    let violations_found = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(2));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let mut handles = Vec::new();

    // Threads 0 and 1 run "a" and "c" with no synchronization between
    // them at all: the first contract rule must fire.
    {
        let dispatcher = dispatcher.clone();
        let start = start.clone();
        let count = violations_found.clone();
        handles.push(thread::spawn(move || {
            dispatcher.thread_started(0);
            start.wait();
            run_and_report(&dispatcher, &count, 0, "a", 1);
            dispatcher.thread_finished(0);
        }));
    }
    {
        let dispatcher = dispatcher.clone();
        let start = start.clone();
        let count = violations_found.clone();
        handles.push(thread::spawn(move || {
            dispatcher.thread_started(1);
            start.wait();
            run_and_report(&dispatcher, &count, 1, "c", 2);
            dispatcher.thread_finished(1);
        }));
    }

    // Thread 2 produces and releases lock 1; thread 3 only starts once
    // thread 2 has finished, so its acquire joins thread 2's clock and
    // the second rule must not fire.
    {
        let dispatcher = dispatcher.clone();
        let count = violations_found.clone();
        handles.push(thread::spawn(move || {
            dispatcher.thread_started(2);
            run_and_report(&dispatcher, &count, 2, "producer", 10);
            dispatcher.before_lock_release(2, 1).unwrap();
            dispatcher.thread_finished(2);
            release_tx.send(()).ok();
        }));
    }
    {
        let dispatcher = dispatcher.clone();
        let count = violations_found.clone();
        handles.push(thread::spawn(move || {
            release_rx.recv().ok();
            dispatcher.thread_started(3);
            dispatcher.after_lock_acquire(3, 1).unwrap();
            run_and_report(&dispatcher, &count, 3, "consumer", 11);
            dispatcher.thread_finished(3);
        }));
    }

    for handle in handles {
        handle.join().expect("demo worker thread panicked");
    }

    let total = violations_found.load(Ordering::SeqCst);
    println!("\n{total} contract violation(s) detected");
}

fn run_and_report(dispatcher: &Dispatcher, count: &AtomicUsize, tid: usize, name: &str, sp: u64) {
    dispatcher.function_entered(tid, name, sp).unwrap();
    let violations = dispatcher.before_return(tid, sp, 0).unwrap();
    for violation in violations {
        println!("{violation}");
        count.fetch_add(1, Ordering::SeqCst);
    }
}
