//! Signal-driven graceful shutdown (spec §4.8). The first SIGINT/SIGTERM
//! stops a stage from pulling new work, lets in-flight records finish,
//! flushes the checkpoint, and the stage exits with 128 + the signal
//! number. A second signal is left to the OS's default disposition
//! (immediate termination) rather than handled here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::signal::unix::{SignalKind, signal};

/// Shared flag a running stage polls between chunks of work.
#[derive(Clone)]
pub struct ShutdownFlag {
    signal_number: Arc<AtomicU8>,
}

impl ShutdownFlag {
    pub fn triggered(&self) -> bool {
        self.signal_number.load(Ordering::Relaxed) != 0
    }

    pub fn signal_number(&self) -> Option<u8> {
        match self.signal_number.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    /// 128 + signal number, the conventional exit code for a process
    /// terminated by a signal (spec §6).
    pub fn exit_code(&self) -> Option<u8> {
        self.signal_number()
            .map(|n| (128u16 + n as u16) as u8)
    }
}

/// Spawns a background task watching SIGINT and SIGTERM and returns a
/// [`ShutdownFlag`] the caller polls. Only the first signal received is
/// recorded.
pub fn watch() -> ShutdownFlag {
    let flag = ShutdownFlag {
        signal_number: Arc::new(AtomicU8::new(0)),
    };
    let handle = flag.clone();

    tokio::spawn(async move {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGINT handler");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => handle.signal_number.store(2, Ordering::Relaxed),
            _ = sigterm.recv() => handle.signal_number.store(15, Ordering::Relaxed),
        }
        tracing::warn!("shutdown signal received, finishing in-flight work");
    });

    flag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_adds_128_to_signal_number() {
        let flag = ShutdownFlag {
            signal_number: Arc::new(AtomicU8::new(15)),
        };
        assert_eq!(flag.exit_code(), Some(143));
        assert!(flag.triggered());
    }

    #[test]
    fn untriggered_flag_has_no_exit_code() {
        let flag = ShutdownFlag {
            signal_number: Arc::new(AtomicU8::new(0)),
        };
        assert_eq!(flag.exit_code(), None);
        assert!(!flag.triggered());
    }
}
