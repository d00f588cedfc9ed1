//! Fixed-interval polling loop.
//!
//! Every tick starts a cycle: obtain an access token, read what is playing
//! and reconcile the chat status. The first cycle runs immediately.
//!
//! Cycles run as separate tasks so that a slow remote call never delays the
//! next tick. With [`Overlap::Allow`] cycles may therefore run concurrently.
//! Reading happens in parallel but reconciliation is serialized, and a cycle
//! that finishes reading after a newer cycle has already reconciled is
//! dropped: the chat status only moves forward. With [`Overlap::Skip`] a tick
//! is skipped while the previous cycle is in flight.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Mutex, time::MissedTickBehavior};

use crate::{
    config::Overlap,
    error::Result,
    sync::{Presence, Report, Source, SyncState, Synchronizer},
};

#[derive(Debug, Default)]
struct Shared {
    state: SyncState,
    /// Sequence number of the newest cycle that reconciled.
    applied: u64,
}

pub struct Scheduler<S, P> {
    source: Arc<S>,
    synchronizer: Arc<Synchronizer<P>>,
    shared: Arc<Mutex<Shared>>,
    sequence: Arc<AtomicU64>,
    busy: Arc<AtomicBool>,
    interval: Duration,
    overlap: Overlap,
}

/// Clears the busy flag when a cycle ends, also when its task panics.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S, P> Scheduler<S, P>
where
    S: Source + 'static,
    P: Presence + 'static,
{
    pub fn new(
        source: S,
        synchronizer: Synchronizer<P>,
        interval: Duration,
        overlap: Overlap,
    ) -> Self {
        Self {
            source: Arc::new(source),
            synchronizer: Arc::new(synchronizer),
            shared: Arc::new(Mutex::new(Shared::default())),
            sequence: Arc::new(AtomicU64::new(0)),
            busy: Arc::new(AtomicBool::new(false)),
            interval,
            overlap,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn synchronizer(&self) -> &Synchronizer<P> {
        &self.synchronizer
    }

    /// Snapshot of what was last published.
    pub async fn state(&self) -> SyncState {
        self.shared.lock().await.state.clone()
    }

    /// Forgets what was published, so that the next cycle publishes again.
    pub async fn reset(&self) {
        self.shared.lock().await.state.clear();
    }

    /// Runs one cycle to completion.
    ///
    /// Returns `Ok(None)` when a newer cycle reconciled first.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no access token can be obtained. Nothing is read
    /// or published in that case.
    pub async fn cycle(&self) -> Result<Option<Report>> {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        cycle(sequence, &*self.source, &self.synchronizer, &self.shared).await
    }

    /// Ticks forever, starting a cycle on every tick.
    pub async fn run(&self) {
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "polling every {}s, overlapping cycles {}",
            self.interval.as_secs_f32(),
            match self.overlap {
                Overlap::Allow => "allowed",
                Overlap::Skip => "skipped",
            }
        );

        loop {
            ticks.tick().await;

            let busy = self.busy.swap(true, Ordering::AcqRel);
            if busy && self.overlap == Overlap::Skip {
                debug!("previous cycle still running, skipping tick");
                continue;
            }

            // Under `Overlap::Allow` the flag is shared by concurrent cycles
            // and only ever read under `Overlap::Skip`.
            let guard = BusyGuard(Arc::clone(&self.busy));
            let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
            let source = Arc::clone(&self.source);
            let synchronizer = Arc::clone(&self.synchronizer);
            let shared = Arc::clone(&self.shared);

            tokio::spawn(async move {
                let _guard = guard;
                match cycle(sequence, &*source, &synchronizer, &shared).await {
                    Ok(Some(report)) if !report.is_ok() => {
                        warn!("cycle {sequence} completed with errors");
                    }
                    Ok(_) => trace!("cycle {sequence} completed"),
                    Err(e) => error!("cycle {sequence} aborted: {e}"),
                }
            });
        }
    }
}

async fn cycle<S, P>(
    sequence: u64,
    source: &S,
    synchronizer: &Synchronizer<P>,
    shared: &Mutex<Shared>,
) -> Result<Option<Report>>
where
    S: Source + ?Sized,
    P: Presence,
{
    let token = source.access_token().await?;
    let fresh = source.now_playing(&token).await;
    trace!("cycle {sequence} read {fresh}");

    let mut shared = shared.lock().await;
    if shared.applied > sequence {
        debug!(
            "cycle {sequence} superseded by cycle {}, dropping",
            shared.applied
        );
        return Ok(None);
    }

    shared.applied = sequence;
    let report = synchronizer.reconcile(&fresh, &mut shared.state).await;
    Ok(Some(report))
}

impl<S, P> std::fmt::Debug for Scheduler<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}
