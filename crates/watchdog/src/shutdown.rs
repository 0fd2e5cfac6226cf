//! Interruptible waiting
//!
//! Every sleep in the daemon (ping interval, cleanup pause, reconnect delay)
//! goes through [`Pause`] so that Ctrl+C, `systemctl stop` (SIGTERM) or a
//! hangup cuts it short and unwinds through the normal cleanup path instead
//! of killing the process mid-transfer.

use crate::{Error, Result};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// A source of interruptible sleeps
pub trait Pause {
    /// Sleep for `duration`, returning [`Error::Interrupted`] if cancelled
    fn pause(&self, duration: Duration) -> Result<()>;

    /// Return [`Error::Interrupted`] if cancellation is pending
    fn checkpoint(&self) -> Result<()>;
}

impl<P: Pause + ?Sized> Pause for &P {
    fn pause(&self, duration: Duration) -> Result<()> {
        (**self).pause(duration)
    }

    fn checkpoint(&self) -> Result<()> {
        (**self).checkpoint()
    }
}

/// Process-wide cancellation token
///
/// Cloning shares the same underlying flag. [`Shutdown::trigger`] is called
/// from the Ctrl+C handler thread and wakes any thread blocked in
/// [`Pause::pause`].
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake all sleepers
    pub fn trigger(&self) {
        let mut requested = self
            .inner
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *requested = true;
        self.inner.wake.notify_all();
    }

    /// Route SIGINT, SIGTERM and SIGHUP to [`Shutdown::trigger`]
    ///
    /// Only one handler can be installed per process.
    pub fn install_signal_handler(&self) -> Result<()> {
        let shutdown = self.clone();
        ctrlc::set_handler(move || shutdown.trigger())?;
        Ok(())
    }

    pub fn is_triggered(&self) -> bool {
        *self
            .inner
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Pause for Shutdown {
    fn pause(&self, duration: Duration) -> Result<()> {
        let requested = self
            .inner
            .requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (requested, _) = self
            .inner
            .wake
            .wait_timeout_while(requested, duration, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);

        if *requested {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_triggered() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}
