//! The type-safe submission contract and its erased form.
//!
//! A submission is a pair `(op, cont)`: an operation that runs against the
//! lane's owned state and a continuation that receives the operation's
//! result on the worker thread. [`bind`] fuses the pair into a [`Thunk`] —
//! the single uniform element the inbox queue carries — erasing the
//! operation's argument and result types while the public API keeps them
//! fully checked:
//!
//! - the operation must accept `&mut S` for the lane's state type `S`,
//! - the continuation's parameter type must equal the operation's return
//!   type (`()`-returning operations pass `()` through the same path),
//! - arguments are captured by the closures at submission time (moved or
//!   copied); the `'static` bound rules out references to caller stack data
//!   surviving across submission.
//!
//! Each thunk is single-shot and runs at most once, only ever on the owning
//! lane's worker thread.

/// An erased, single-shot task carrying an operation, its captured
/// arguments, and its continuation.
///
/// `Send` because thunks cross from producer threads into the worker; the
/// state type `S` itself never needs to be `Send` — it is born on the worker
/// and dies there.
pub type Thunk<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Fuses an operation and its continuation into a [`Thunk`].
///
/// The generated thunk runs `cont(op(&mut state))` on the worker. The result
/// is moved into the continuation; nothing is cloned.
pub(crate) fn bind<S, Op, R, C>(op: Op, cont: C) -> Thunk<S>
where
    S: 'static,
    Op: FnOnce(&mut S) -> R + Send + 'static,
    C: FnOnce(R) + Send + 'static,
{
    Box::new(move |state: &mut S| {
        let result = op(state);
        cont(result);
    })
}
