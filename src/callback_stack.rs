// Copyright (c) 2026 Adrian Robinson. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.

//! A per-thread stack pairing "before-function" events with
//! "after-function" events across normal returns and non-local exits.

/// A callback invoked once the function that registered it stops
/// executing, either by returning normally or by being unwound past
/// (e.g. a `longjmp`).
///
/// `retval` carries the observed return value on a normal return, and
/// `None` on a non-local exit, since the function never produced one.
/// Plain function pointers (rather than boxed closures) are used so two
/// registrations can be compared for equality by address, the way
/// [`register_after`](CallbackStack::register_after) needs to detect a
/// duplicate.
pub type AfterCallback<D> = fn(Option<u64>, D);

struct Call<D> {
    callback: AfterCallback<D>,
    data: D,
    sp: u64,
}

/// Returned by [`CallbackStack::register_after`] when the same callback
/// was already registered for the same stack pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyRegistered;

/// Pairs before-function events with after-function events for a single
/// thread. Entries are ordered by the stack pointer at the moment their
/// function was entered: calls nest in stack-address order, so the stack
/// is monotonically non-decreasing in `sp` from bottom to top.
pub struct CallbackStack<D> {
    calls: Vec<Call<D>>,
}

impl<D> Default for CallbackStack<D> {
    fn default() -> Self {
        Self { calls: Vec::new() }
    }
}

impl<D> CallbackStack<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to run after the function entered at stack
    /// pointer `sp` stops executing.
    ///
    /// For a given `sp`, the same callback cannot be registered twice:
    /// scanning from the top of the stack while `sp` matches, if the same
    /// function pointer is already present this returns
    /// [`AlreadyRegistered`] and leaves the stack unchanged.
    pub fn register_after(
        &mut self,
        sp: u64,
        callback: AfterCallback<D>,
        data: D,
    ) -> Result<(), AlreadyRegistered> {
        for call in self.calls.iter().rev() {
            if call.sp != sp {
                break;
            }
            if call.callback == callback {
                return Err(AlreadyRegistered);
            }
        }
        self.calls.push(Call { callback, data, sp });
        Ok(())
    }

    /// Pops and invokes every entry whose `sp` equals `sp`, in LIFO order,
    /// with the function's actual return value.
    pub fn before_return(&mut self, sp: u64, retval: u64) {
        while matches!(self.calls.last(), Some(call) if call.sp == sp) {
            let call = self.calls.pop().unwrap();
            (call.callback)(Some(retval), call.data);
        }
    }

    /// Pops and invokes every entry whose `sp` is at or below
    /// `sp_after_jump`, in LIFO order, with a `None` return value: those
    /// functions were unwound past by a non-local exit rather than
    /// returning normally.
    pub fn before_long_jump(&mut self, sp_after_jump: u64) {
        while matches!(self.calls.last(), Some(call) if call.sp <= sp_after_jump) {
            let call = self.calls.pop().unwrap();
            (call.callback)(None, call.data);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(&'static str, Option<u64>)>>>;

    fn record(retval: Option<u64>, data: (Log, &'static str)) {
        data.0.lock().unwrap().push((data.1, retval));
    }

    #[test]
    fn before_return_pops_matching_sp_only() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut stack: CallbackStack<(Log, &'static str)> = CallbackStack::new();

        stack.register_after(100, record, (log.clone(), "f1")).unwrap();

        stack.before_return(100, 42);
        assert_eq!(*log.lock().unwrap(), vec![("f1", Some(42))]);
        assert!(stack.is_empty());
    }

    #[test]
    fn long_jump_pops_everything_at_or_below_target_sp_in_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut stack: CallbackStack<(Log, &'static str)> = CallbackStack::new();

        for (name, sp) in [("f1", 100u64), ("f2", 80), ("f3", 60)] {
            stack.register_after(sp, record, (log.clone(), name)).unwrap();
        }

        stack.before_long_jump(120);

        assert_eq!(
            *log.lock().unwrap(),
            vec![("f3", None), ("f2", None), ("f1", None)]
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn duplicate_registration_for_same_sp_is_rejected() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut stack: CallbackStack<(Log, &'static str)> = CallbackStack::new();

        stack.register_after(10, record, (log.clone(), "f1")).unwrap();
        let err = stack
            .register_after(10, record, (log.clone(), "f1"))
            .unwrap_err();
        assert_eq!(err, AlreadyRegistered);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn same_callback_different_sp_is_allowed() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut stack: CallbackStack<(Log, &'static str)> = CallbackStack::new();

        stack.register_after(10, record, (log.clone(), "a")).unwrap();
        stack.register_after(20, record, (log.clone(), "b")).unwrap();
        assert_eq!(stack.len(), 2);
    }
}
