// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Timer plumbing for the upstream core
//!
//! State-machine methods never sleep: they return [`TimerRequest`]s and the
//! [`UpstreamTimerManager`] task schedules them, sending an
//! [`UpstreamEvent`] back when one fires. The core validates every expiry
//! against the deadline recorded on the owning entry, so a timer that was
//! cancelled or rescheduled in the meantime fires as a no-op.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::logging::{Facility, Logger};
use crate::{log_debug, log_info, log_warning, SourceGroup};

/// Types of timers owned by the upstream core
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// Periodic Join retransmission for one entry
    JoinTimer { sg: SourceGroup },
    /// (S,G) keepalive expiry
    KeepaliveTimer { sg: SourceGroup },
    /// Register-stop suppression/probe timer
    RegisterStopTimer { sg: SourceGroup },
    /// MSDP source-active registration expiry
    MsdpRegTimer { sg: SourceGroup },
    /// Advance the activity wheel by one bucket
    WheelTick,
}

impl TimerType {
    /// The entry this timer belongs to, if any
    pub fn owner(&self) -> Option<SourceGroup> {
        match self {
            TimerType::JoinTimer { sg }
            | TimerType::KeepaliveTimer { sg }
            | TimerType::RegisterStopTimer { sg }
            | TimerType::MsdpRegTimer { sg } => Some(*sg),
            TimerType::WheelTick => None,
        }
    }
}

/// Request to schedule a timer
#[derive(Debug, Clone)]
pub struct TimerRequest {
    /// Type of timer
    pub timer_type: TimerType,
    /// When the timer should fire
    pub fire_at: Instant,
    /// Whether this cancels any existing timer of the same type
    pub replace_existing: bool,
}

impl TimerRequest {
    /// Request that replaces any pending timer of the same type
    pub fn replace(timer_type: TimerType, fire_at: Instant) -> Self {
        Self {
            timer_type,
            fire_at,
            replace_existing: true,
        }
    }
}

/// Events delivered back into the core
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// A scheduled timer expired
    TimerExpired(TimerType),
}

/// A scheduled timer with its fire time and type
#[derive(Debug, Clone)]
struct ScheduledTimer {
    fire_at: Instant,
    timer_type: TimerType,
}

impl PartialEq for ScheduledTimer {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.timer_type == other.timer_type
    }
}

impl Eq for ScheduledTimer {}

impl PartialOrd for ScheduledTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at.cmp(&other.fire_at)
    }
}

/// Protocol timer management
///
/// Pending timers live in a priority queue ordered by fire time; the next
/// timer to fire determines the sleep duration. New requests arrive over a
/// channel and expiries leave over another.
pub struct UpstreamTimerManager {
    /// Pending timers sorted by fire time
    timers: BinaryHeap<std::cmp::Reverse<ScheduledTimer>>,
    /// Channel to receive new timer requests
    timer_rx: mpsc::Receiver<TimerRequest>,
    /// Channel to send timer expiry events
    event_tx: mpsc::Sender<UpstreamEvent>,
    /// Logger
    logger: Logger,
}

impl UpstreamTimerManager {
    /// Create a new timer manager
    pub fn new(
        timer_rx: mpsc::Receiver<TimerRequest>,
        event_tx: mpsc::Sender<UpstreamEvent>,
        logger: Logger,
    ) -> Self {
        Self {
            timers: BinaryHeap::new(),
            timer_rx,
            event_tx,
            logger,
        }
    }

    /// Schedule a new timer
    fn schedule(&mut self, request: TimerRequest) {
        if request.replace_existing {
            // Remove any existing timer of the same type
            self.timers = self
                .timers
                .drain()
                .filter(|t| t.0.timer_type != request.timer_type)
                .collect();
        }

        self.timers.push(std::cmp::Reverse(ScheduledTimer {
            fire_at: request.fire_at,
            timer_type: request.timer_type,
        }));

        log_debug!(
            self.logger,
            Facility::Upstream,
            &format!("Scheduled timer, {} pending", self.timers.len())
        );
    }

    /// Run the timer management loop
    pub async fn run(mut self) {
        log_info!(self.logger, Facility::Upstream, "Timer manager started");

        loop {
            // Calculate sleep duration based on next timer
            let sleep_duration = if let Some(std::cmp::Reverse(next)) = self.timers.peek() {
                let now = Instant::now();
                if next.fire_at <= now {
                    Duration::ZERO
                } else {
                    next.fire_at - now
                }
            } else {
                // No timers, sleep for a long time (or until new timer request)
                Duration::from_secs(3600)
            };

            tokio::select! {
                // Wait for next timer or timeout
                _ = sleep(sleep_duration) => {
                    // Fire all expired timers
                    let now = Instant::now();
                    while let Some(std::cmp::Reverse(timer)) = self.timers.peek() {
                        if timer.fire_at <= now {
                            let timer = self.timers.pop().unwrap().0;
                            let event = UpstreamEvent::TimerExpired(timer.timer_type.clone());

                            log_debug!(
                                self.logger,
                                Facility::Upstream,
                                &format!("Timer expired: {:?}", timer.timer_type)
                            );

                            if self.event_tx.send(event).await.is_err() {
                                log_warning!(
                                    self.logger,
                                    Facility::Upstream,
                                    "Event channel closed, timer manager exiting"
                                );
                                return;
                            }
                        } else {
                            break;
                        }
                    }
                }

                // Receive new timer requests
                request = self.timer_rx.recv() => {
                    match request {
                        Some(req) => {
                            self.schedule(req);
                        }
                        None => {
                            log_info!(
                                self.logger,
                                Facility::Upstream,
                                "Timer request channel closed, timer manager exiting"
                            );
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;

    fn sg(s: &str, g: &str) -> SourceGroup {
        SourceGroup::sg(s.parse().unwrap(), g.parse().unwrap())
    }

    #[test]
    fn test_timer_type_equality_and_owner() {
        let a = TimerType::JoinTimer {
            sg: sg("10.0.0.1", "224.1.1.1"),
        };
        let b = TimerType::JoinTimer {
            sg: sg("10.0.0.1", "224.1.1.1"),
        };
        let c = TimerType::KeepaliveTimer {
            sg: sg("10.0.0.1", "224.1.1.1"),
        };

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.owner(), Some(sg("10.0.0.1", "224.1.1.1")));
        assert_eq!(TimerType::WheelTick.owner(), None);
    }

    #[tokio::test]
    async fn test_manager_fires_due_timer() {
        let (timer_tx, timer_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let (logger, _sink) = Logger::memory();

        let manager = UpstreamTimerManager::new(timer_rx, event_tx, logger);
        let handle = tokio::spawn(manager.run());

        timer_tx
            .send(TimerRequest::replace(
                TimerType::WheelTick,
                Instant::now() + Duration::from_millis(10),
            ))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("timer should fire within a second")
            .expect("channel open");
        assert!(matches!(
            event,
            UpstreamEvent::TimerExpired(TimerType::WheelTick)
        ));

        drop(timer_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_existing_supersedes_earlier_request() {
        let (timer_tx, timer_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let (logger, _sink) = Logger::memory();

        let manager = UpstreamTimerManager::new(timer_rx, event_tx, logger);
        let handle = tokio::spawn(manager.run());

        let key = sg("10.0.0.1", "224.1.1.1");
        timer_tx
            .send(TimerRequest::replace(
                TimerType::JoinTimer { sg: key },
                Instant::now() + Duration::from_millis(20),
            ))
            .await
            .unwrap();
        timer_tx
            .send(TimerRequest::replace(
                TimerType::JoinTimer { sg: key },
                Instant::now() + Duration::from_millis(40),
            ))
            .await
            .unwrap();

        // Only the replacement fires
        let first = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            first,
            UpstreamEvent::TimerExpired(TimerType::JoinTimer { .. })
        ));
        let second =
            tokio::time::timeout(Duration::from_millis(100), event_rx.recv()).await;
        assert!(second.is_err(), "replaced timer must not fire twice");

        drop(timer_tx);
        handle.await.unwrap();
    }
}
