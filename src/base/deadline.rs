//! Deadline and cancellation coordination for a single attempt.
//!
//! [`Coordinator::setup`] turns an optional [`AbortSignal`] and an optional
//! absolute deadline into two independent cancellation sources.
//! [`Coordinator::race`] runs the transport future against both; whichever
//! settles first decides the attempt, and [`Coordinator::disarm`] always
//! runs before the result is returned.

use crate::base::abort::{AbortListener, AbortSignal};
use crate::base::neterror::NetError;
use std::future::Future;
use std::pin::Pin;
use tokio::time::{Instant, Sleep};

/// An armed timer for the chain deadline.
#[derive(Debug)]
pub struct TimeoutHandle {
    deadline: Instant,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TimeoutHandle {
    fn arm(deadline: Instant) -> Self {
        Self {
            deadline,
            sleep: Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Cancel the timer. Returns `false` if it was already disarmed.
    pub fn disarm(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }
}

/// What a single [`Coordinator::disarm`] call actually released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disarmed {
    pub timer: bool,
    pub listener: bool,
}

/// Per-attempt owner of the deadline timer and the abort listener.
#[derive(Debug)]
pub struct Coordinator {
    timer: Option<TimeoutHandle>,
    listener: Option<AbortListener>,
}

impl Coordinator {
    /// Arm the race sources for one attempt.
    ///
    /// Fails with [`NetError::TimedOut`] if `timeout_at` has already passed
    /// and with [`NetError::Aborted`] if the signal has already fired.
    pub fn setup(
        signal: Option<&AbortSignal>,
        timeout_at: Option<Instant>,
    ) -> Result<Self, NetError> {
        let timer = match timeout_at {
            Some(at) if at <= Instant::now() => return Err(NetError::TimedOut),
            Some(at) => Some(TimeoutHandle::arm(at)),
            None => None,
        };

        let listener = match signal {
            Some(signal) if signal.aborted() => return Err(NetError::Aborted),
            Some(signal) => Some(signal.subscribe()),
            None => None,
        };

        Ok(Self { timer, listener })
    }

    pub fn timer(&self) -> Option<&TimeoutHandle> {
        self.timer.as_ref()
    }

    /// Run `transport` against the abort and timeout sources.
    ///
    /// Losing participants are dropped; dropping the transport future tears
    /// down its stream. `disarm` runs before returning regardless of which
    /// source won.
    pub async fn race<F, T>(&mut self, transport: F) -> Result<T, NetError>
    where
        F: Future<Output = Result<T, NetError>>,
    {
        let Self { timer, listener } = &mut *self;

        let result = tokio::select! {
            biased;
            () = wait_aborted(listener) => Err(NetError::Aborted),
            () = wait_expired(timer) => Err(NetError::TimedOut),
            result = transport => result,
        };

        let disarmed = self.disarm();
        tracing::trace!(timer = disarmed.timer, listener = disarmed.listener, "attempt settled");
        result
    }

    /// Cancel the timer and detach the abort listener. Safe to call more
    /// than once; each resource is released at most once.
    pub fn disarm(&mut self) -> Disarmed {
        Disarmed {
            timer: self.timer.as_mut().map(TimeoutHandle::disarm).unwrap_or(false),
            listener: self.listener.as_mut().map(AbortListener::detach).unwrap_or(false),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn wait_aborted(listener: &mut Option<AbortListener>) {
    match listener.as_mut() {
        Some(listener) => listener.fired().await,
        None => std::future::pending().await,
    }
}

async fn wait_expired(timer: &mut Option<TimeoutHandle>) {
    match timer.as_mut() {
        Some(timer) => timer.expired().await,
        None => std::future::pending().await,
    }
}
