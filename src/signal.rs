//! Process signals that stop or reset the sync loop.
//!
//! * Ctrl-C and `SIGTERM` stop the loop; the process exits successfully
//! * `SIGHUP` forgets what was published, so the next cycle publishes again
//!
//! Only Ctrl-C exists outside of Unix.
//!
//! ```no_run
//! use spotimost::signal::{Handler, Signal};
//!
//! # async fn example() -> spotimost::error::Result<()> {
//! let mut signals = Handler::new()?;
//! loop {
//!     match signals.recv().await {
//!         Signal::Reload => continue,
//!         signal => {
//!             println!("stopping on {signal}");
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use crate::error::Result;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signal {
    /// Ctrl-C or `SIGINT`.
    Interrupt,
    /// `SIGTERM`, as sent by service managers.
    Terminate,
    /// `SIGHUP`: republish on the next cycle.
    Reload,
}

impl Signal {
    #[must_use]
    pub fn is_shutdown(self) -> bool {
        matches!(self, Self::Interrupt | Self::Terminate)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "Ctrl+C"),
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Reload => write!(f, "SIGHUP"),
        }
    }
}

/// Listens for [`Signal`]s.
///
/// Handlers are registered on construction, so a signal arriving between
/// two calls to [`Handler::recv`] is not lost.
pub struct Handler {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sighup: tokio::signal::unix::Signal,
}

impl Handler {
    /// # Errors
    ///
    /// Will return `Err` if the signal handlers cannot be registered.
    pub fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sighup: signal(SignalKind::hangup())?,
            })
        }

        #[cfg(not(unix))]
        Ok(Self {})
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Signal {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => Signal::Interrupt,
                _ = self.sigterm.recv() => Signal::Terminate,
                _ = self.sighup.recv() => Signal::Reload,
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            Signal::Interrupt
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_reload_keeps_running() {
        assert!(Signal::Interrupt.is_shutdown());
        assert!(Signal::Terminate.is_shutdown());
        assert!(!Signal::Reload.is_shutdown());
    }

    #[test]
    fn displays_signal_names() {
        assert_eq!(Signal::Interrupt.to_string(), "Ctrl+C");
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
        assert_eq!(Signal::Reload.to_string(), "SIGHUP");
    }
}
