// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! Ties the vector clock, lock table, trace windows and callback stacks
//! together behind the external event API an instrumentation engine
//! drives: thread lifecycle, lock acquire/release, and function entry and
//! exit (normal return or non-local exit).

use crate::callback_stack::CallbackStack;
use crate::config::Config;
use crate::contract::Contract;
use crate::error::AnacondaError;
use crate::lock_table::{LockClockTable, LockId};
use crate::report;
use crate::vector_clock::VectorClock;
use crate::window::{Window, WindowRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

type ExitNames = Arc<Mutex<Vec<String>>>;

fn collect_exit_name(_retval: Option<u64>, data: (ExitNames, String)) {
    data.0.lock().expect("exit name buffer poisoned").push(data.1);
}

struct ThreadState {
    cvc: Mutex<VectorClock>,
    callbacks: Mutex<CallbackStack<(ExitNames, String)>>,
    pending_exits: ExitNames,
    window: Arc<Window>,
}

/// The analysis engine: owns the lock clock table, every thread's trace
/// window, the loaded contracts, and dispatches every instrumentation
/// event into them.
///
/// `before_lock_acquire` and `after_lock_release` are accepted but
/// currently do nothing; they exist so a future deadlock-detection
/// analyser has a place to hook in without changing this API.
pub struct Dispatcher {
    lock_table: LockClockTable,
    windows: WindowRegistry,
    contract: Contract,
    threads: RwLock<HashMap<usize, Arc<ThreadState>>>,
    report_path: Option<std::path::PathBuf>,
    json_report_path: Option<std::path::PathBuf>,
}

impl Dispatcher {
    /// Loads every contract file named in `config` into one shared
    /// contract (so IDs stay dense across files) and prepares an empty
    /// dispatcher ready to accept thread-started events.
    pub fn new(config: &Config) -> Result<Self, AnacondaError> {
        let mut contract = Contract::new();
        for path in &config.contract_paths {
            contract.load(path)?;
            info!(path = %path.display(), "contract loaded");
            if config.dump_contracts {
                report::dump_contract(path, &contract)?;
            }
        }

        Ok(Self {
            lock_table: LockClockTable::new(),
            windows: WindowRegistry::new(),
            contract,
            threads: RwLock::new(HashMap::new()),
            report_path: config.report_path.clone(),
            json_report_path: config.json_report_path.clone(),
        })
    }

    fn thread(&self, tid: usize) -> Result<Arc<ThreadState>, AnacondaError> {
        self.threads
            .read()
            .expect("thread table poisoned")
            .get(&tid)
            .cloned()
            .ok_or(AnacondaError::UnknownThread { tid })
    }

    /// Registers a new thread: initialises its vector clock and gives it
    /// an empty trace window over the currently-loaded contracts.
    pub fn thread_started(&self, tid: usize) {
        let mut cvc = VectorClock::new();
        cvc.init(tid);
        let window = Arc::new(Window::monitor(tid, &self.contract));
        self.windows.insert(window.clone());

        let state = Arc::new(ThreadState {
            cvc: Mutex::new(cvc),
            callbacks: Mutex::new(CallbackStack::new()),
            pending_exits: Arc::new(Mutex::new(Vec::new())),
            window,
        });
        self.threads
            .write()
            .expect("thread table poisoned")
            .insert(tid, state);
        info!(thread = tid, "thread started");
    }

    /// Unregisters nothing: the thread's window and clock are retained so
    /// a peer's later violation check against its `last` instances still
    /// sees valid data (§5).
    pub fn thread_finished(&self, tid: usize) {
        info!(thread = tid, "thread finished");
    }

    /// Reserved for a future deadlock-detection analyser; does nothing.
    pub fn before_lock_acquire(&self, _tid: usize, _lock: LockId) {}

    /// Joins the clock published at `lock`'s last release into the
    /// thread's clock.
    pub fn after_lock_acquire(&self, tid: usize, lock: LockId) -> Result<(), AnacondaError> {
        let thread = self.thread(tid)?;
        let mut cvc = thread.cvc.lock().expect("thread clock poisoned");
        self.lock_table.acquire(lock, &mut cvc);
        debug!(thread = tid, lock, clock = %*cvc, "lock acquired");
        Ok(())
    }

    /// Publishes the thread's clock at `lock`, then advances it.
    pub fn before_lock_release(&self, tid: usize, lock: LockId) -> Result<(), AnacondaError> {
        let thread = self.thread(tid)?;
        let mut cvc = thread.cvc.lock().expect("thread clock poisoned");
        self.lock_table.release(lock, tid, &mut cvc);
        debug!(thread = tid, lock, clock = %*cvc, "lock released");
        Ok(())
    }

    /// Reserved for a future deadlock-detection analyser; does nothing.
    pub fn after_lock_release(&self, _tid: usize, _lock: LockId) {}

    /// Advances every tracked target/spoiler instance in the thread's
    /// window by `name`, and registers an after-call hook at `sp` so the
    /// matching exit can be resolved on return or non-local exit.
    pub fn function_entered(&self, tid: usize, name: &str, sp: u64) -> Result<(), AnacondaError> {
        let thread = self.thread(tid)?;
        let cvc = thread.cvc.lock().expect("thread clock poisoned").clone();
        thread.window.function_entered(name, &cvc);

        let mut callbacks = thread.callbacks.lock().expect("callback stack poisoned");
        if callbacks
            .register_after(sp, collect_exit_name, (thread.pending_exits.clone(), name.to_string()))
            .is_err()
        {
            debug!(thread = tid, name, sp, "function already registered at this stack pointer");
        }
        debug!(thread = tid, name, sp, "function entered");
        Ok(())
    }

    /// Resolves every function that returned normally at `sp` and checks
    /// its instance for violations.
    pub fn before_return(&self, tid: usize, sp: u64, retval: u64) -> Result<Vec<crate::window::Violation>, AnacondaError> {
        let thread = self.thread(tid)?;
        thread
            .callbacks
            .lock()
            .expect("callback stack poisoned")
            .before_return(sp, retval);
        self.drain_exits(tid, &thread)
    }

    /// Resolves every function unwound past by a non-local exit landing
    /// at `sp_after_jump` and checks each for violations.
    pub fn before_long_jump(&self, tid: usize, sp_after_jump: u64) -> Result<Vec<crate::window::Violation>, AnacondaError> {
        let thread = self.thread(tid)?;
        thread
            .callbacks
            .lock()
            .expect("callback stack poisoned")
            .before_long_jump(sp_after_jump);
        self.drain_exits(tid, &thread)
    }

    fn drain_exits(&self, tid: usize, thread: &ThreadState) -> Result<Vec<crate::window::Violation>, AnacondaError> {
        let names: Vec<String> = std::mem::take(&mut *thread.pending_exits.lock().expect("exit name buffer poisoned"));
        let cvc = thread.cvc.lock().expect("thread clock poisoned").clone();
        let peers = self.windows.snapshot();

        let mut violations = Vec::new();
        for name in names {
            debug!(thread = tid, name, "function exited");
            let found = thread.window.function_exited(&name, &cvc, &peers);
            for violation in found {
                warn!(
                    target = %violation.target_regex,
                    target_thread = violation.target_tid,
                    spoiler = %violation.spoiler_regex,
                    spoiler_thread = violation.spoiler_tid,
                    "contract violation"
                );
                if let Some(path) = &self.report_path {
                    report::append_violation(path, &violation)?;
                }
                if let Some(path) = &self.json_report_path {
                    report::append_violation_json(path, &violation)?;
                }
                violations.push(violation);
            }
        }
        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn contract_file(body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "anaconda-core-dispatcher-test-{}-{}.contract",
            std::process::id(),
            body.len()
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn unknown_thread_is_an_error() {
        let dispatcher = Dispatcher::new(&Config::new()).unwrap();
        let err = dispatcher.after_lock_acquire(0, 1).unwrap_err();
        assert!(matches!(err, AnacondaError::UnknownThread { tid: 0 }));
    }

    #[test]
    fn unsynchronized_threads_are_reported() {
        // Neither thread acquires or releases any lock, so nothing
        // serializes the target instance in thread 0 against the spoiler
        // instance in thread 1: they must be treated as overlapping.
        let path = contract_file("a <- { b }\n");
        let config = Config {
            contract_paths: vec![path.clone()],
            report_path: None,
            json_report_path: None,
            dump_contracts: false,
        };
        let dispatcher = Dispatcher::new(&config).unwrap();

        dispatcher.thread_started(0);
        dispatcher.thread_started(1);

        dispatcher.function_entered(0, "a", 1000).unwrap();
        let v1 = dispatcher.before_return(0, 1000, 0).unwrap();
        assert!(v1.is_empty(), "the spoiler has not committed an instance yet");

        dispatcher.function_entered(1, "b", 2000).unwrap();
        let v2 = dispatcher.before_return(1, 2000, 0).unwrap();
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0].target_tid, 0);
        assert_eq!(v2[0].spoiler_tid, 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn lock_synchronized_threads_do_not_violate() {
        let path = contract_file("a <- { b }\n");
        let config = Config {
            contract_paths: vec![path.clone()],
            report_path: None,
            json_report_path: None,
            dump_contracts: false,
        };
        let dispatcher = Dispatcher::new(&config).unwrap();

        dispatcher.thread_started(0);
        dispatcher.thread_started(1);

        dispatcher.function_entered(0, "a", 1000).unwrap();
        dispatcher.before_return(0, 1000, 0).unwrap();
        dispatcher.before_lock_release(0, 42).unwrap();

        dispatcher.after_lock_acquire(1, 42).unwrap();
        dispatcher.function_entered(1, "b", 2000).unwrap();
        let violations = dispatcher.before_return(1, 2000, 0).unwrap();
        assert!(violations.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn long_jump_resolves_pending_functions() {
        let path = contract_file("x <- { y }\n");
        let config = Config {
            contract_paths: vec![path.clone()],
            report_path: None,
            json_report_path: None,
            dump_contracts: false,
        };
        let dispatcher = Dispatcher::new(&config).unwrap();
        dispatcher.thread_started(0);

        dispatcher.function_entered(0, "outer", 100).unwrap();
        dispatcher.function_entered(0, "inner", 50).unwrap();
        dispatcher.before_long_jump(0, 150).unwrap();

        std::fs::remove_file(&path).ok();
    }
}
