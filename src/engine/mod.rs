//! Progression pipeline: scan → advance → aggregate → dispatch.
//!
//! One cycle scans every non-terminal ticket, advances the ones that have
//! dwelt long enough in their current status, groups the tickets that just
//! reached `Done` by owner, and sends each owner a single digest. Failures
//! are contained at the smallest unit — one ticket or one owner — and never
//! abort the cycle, let alone the scheduler.

pub mod scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::model::{OwnerId, Status, Ticket, TicketId};
use crate::notify::{Notifier, compose_digest};
use crate::store::{OwnerDirectory, TicketStore};
use crate::transitions::TransitionTable;

pub use scheduler::{Scheduler, SchedulerStatus};

/// A ticket due for advancement, with its computed next status. Transient;
/// lives only within one scan cycle.
#[derive(Debug, Clone)]
pub struct EligibleTicket {
    pub ticket: Ticket,
    pub next_status: Status,
}

/// One applied transition.
#[derive(Debug, Clone)]
pub struct Advanced {
    pub ticket: Ticket,
    pub from: Status,
    pub to: Status,
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Tickets the scan found eligible.
    pub eligible: usize,
    /// Transitions actually applied.
    pub advanced: usize,
    /// Owners with tickets that reached the terminal status this cycle.
    pub completed_owners: usize,
    /// Digests the notifier accepted.
    pub digests_sent: usize,
}

/// Side-effect-free eligibility statistics, for operational introspection.
#[derive(Debug, Clone, Default)]
pub struct ProgressionStats {
    pub total_eligible: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub next_transitions: Vec<PlannedTransition>,
}

#[derive(Debug, Clone)]
pub struct PlannedTransition {
    pub ticket_id: TicketId,
    pub from: Status,
    pub to: Status,
}

/// The status-progression pipeline. All collaborators are injected at
/// construction; the pipeline holds no hidden state.
pub struct Pipeline {
    store: Arc<dyn TicketStore>,
    directory: Arc<dyn OwnerDirectory>,
    notifier: Arc<dyn Notifier>,
    table: TransitionTable,
    /// Bound on each directory / notifier call so one unreachable address
    /// cannot stall the whole digest loop.
    call_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn OwnerDirectory>,
        notifier: Arc<dyn Notifier>,
        table: TransitionTable,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            table,
            call_timeout,
        }
    }

    /// Find every ticket due for advancement at `now`. Read-only.
    ///
    /// Eligibility is boundary-inclusive on whole minutes: the elapsed time
    /// since `updated_at` is truncated to minutes, so a ticket exactly at its
    /// dwell threshold is eligible and one millisecond short is not.
    pub async fn scan(&self, now: DateTime<Utc>) -> crate::error::Result<Vec<EligibleTicket>> {
        let tickets = self.store.find_non_terminal().await?;

        let mut eligible = Vec::new();
        for ticket in tickets {
            let Some(next_status) = self.table.next_status(ticket.status) else {
                continue;
            };

            let dwelt_minutes = (now - ticket.updated_at).num_minutes();
            if dwelt_minutes >= self.table.min_dwell(ticket.status).num_minutes() {
                eligible.push(EligibleTicket {
                    ticket,
                    next_status,
                });
            }
        }

        debug!(count = eligible.len(), "scan found eligible tickets");
        Ok(eligible)
    }

    /// Apply one transition. `None` when the ticket disappeared or its status
    /// changed between scan and advance — logged and skipped by the caller.
    pub async fn advance(
        &self,
        eligible: &EligibleTicket,
        now: DateTime<Utc>,
    ) -> crate::error::Result<Option<Advanced>> {
        let from = eligible.ticket.status;
        let to = eligible.next_status;

        let updated = self
            .store
            .advance_status(eligible.ticket.id, from, to, now)
            .await?;

        Ok(updated.map(|ticket| Advanced { ticket, from, to }))
    }

    /// Group this cycle's newly-terminal tickets by owner. Pure.
    pub fn aggregate(advanced: &[Advanced]) -> BTreeMap<OwnerId, Vec<Ticket>> {
        let mut batches: BTreeMap<OwnerId, Vec<Ticket>> = BTreeMap::new();
        for result in advanced {
            if result.to.is_terminal() {
                batches
                    .entry(result.ticket.owner.clone())
                    .or_default()
                    .push(result.ticket.clone());
            }
        }
        batches
    }

    /// Send one digest per owner. Returns how many the notifier accepted.
    ///
    /// Delivery is at-most-once: a failed or skipped send is logged and lost
    /// for this cycle. There is no retry and no durable outbox, matching the
    /// source system.
    pub async fn dispatch(
        &self,
        batches: &BTreeMap<OwnerId, Vec<Ticket>>,
        now: DateTime<Utc>,
    ) -> usize {
        let mut sent = 0;

        for (owner, tickets) in batches {
            let resolved = tokio::time::timeout(
                self.call_timeout,
                self.directory.resolve_contact(owner),
            )
            .await;

            let address = match resolved {
                Ok(Ok(Some(address))) => address,
                Ok(Ok(None)) => {
                    warn!(%owner, "no contact address on file, skipping digest");
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(%owner, "contact resolution failed, skipping digest: {e}");
                    continue;
                }
                Err(_) => {
                    warn!(%owner, "contact resolution timed out, skipping digest");
                    continue;
                }
            };

            let digest = compose_digest(tickets, now);

            let delivered = tokio::time::timeout(
                self.call_timeout,
                self.notifier.send(&address, &digest.subject, &digest.body),
            )
            .await
            .unwrap_or_else(|_| {
                warn!(%owner, "notification send timed out");
                false
            });

            if delivered {
                info!(%owner, tickets = tickets.len(), "completion digest sent");
                sent += 1;
            } else {
                warn!(%owner, tickets = tickets.len(), "completion digest not delivered");
            }
        }

        sent
    }

    /// Run one full cycle at `now`.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        // A store read failure skips the cycle entirely.
        let eligible = match self.scan(now).await {
            Ok(eligible) => eligible,
            Err(e) => {
                warn!("scan failed, skipping cycle: {e}");
                return CycleReport::default();
            }
        };

        if eligible.is_empty() {
            debug!("no tickets eligible for status update");
            return CycleReport::default();
        }

        let mut advanced = Vec::new();
        for candidate in &eligible {
            match self.advance(candidate, now).await {
                Ok(Some(result)) => {
                    info!(
                        id = %result.ticket.id,
                        from = %result.from,
                        to = %result.to,
                        "ticket advanced"
                    );
                    advanced.push(result);
                }
                Ok(None) => {
                    // Deleted or concurrently updated between scan and
                    // advance. Skip; the next scan will pick it up if it
                    // still qualifies.
                    debug!(id = %candidate.ticket.id, "advance did not apply");
                }
                Err(e) => {
                    warn!(id = %candidate.ticket.id, "advance failed: {e}");
                }
            }
        }

        let batches = Self::aggregate(&advanced);
        let digests_sent = self.dispatch(&batches, now).await;

        CycleReport {
            eligible: eligible.len(),
            advanced: advanced.len(),
            completed_owners: batches.len(),
            digests_sent,
        }
    }

    /// Eligibility statistics via a fresh, side-effect-free scan.
    pub async fn stats(&self, now: DateTime<Utc>) -> crate::error::Result<ProgressionStats> {
        let eligible = self.scan(now).await?;

        let mut stats = ProgressionStats {
            total_eligible: eligible.len(),
            ..Default::default()
        };

        for candidate in &eligible {
            *stats.by_status.entry(candidate.ticket.status).or_insert(0) += 1;
            stats.next_transitions.push(PlannedTransition {
                ticket_id: candidate.ticket.id,
                from: candidate.ticket.status,
                to: candidate.next_status,
            });
        }

        Ok(stats)
    }
}
