//! Routes inbound events to sessions and flow handlers.
//!
//! For each event, under the identity's lock:
//!
//! 1. drop the event if its message id was already processed
//! 2. load the session, or start one at HOME
//! 3. honour home commands from any state; terminal states fall back to the hub
//! 4. run the handler for the session's flow family
//! 5. prompt the new flow when the session crossed into another family
//! 6. save only if the state or context moved, then record the message id
//!
//! A handler error leaves the stored session untouched. The user gets a
//! generic retry message and the message id stays unrecorded, so a
//! redelivery is processed again.

use crate::error::Result;
use crate::models::events::InboundEvent;
use crate::models::jobs::ExtractionOutcome;
use crate::services::conversation::dedup::DeliveryLedger;
use crate::services::conversation::flows::{
    Collaborators, FlowContext, FlowHandlerRegistry, FlowOutcome, FlowSettings,
};
use crate::services::conversation::locks::SessionLocks;
use crate::services::conversation::state_machine::{FlowType, HOME, State, StateMachine};
use crate::services::sessions::{Session, SessionStore};
use chrono::TimeDelta;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const RETRY_MESSAGE: &str = "Sorry, something went wrong on our side. Please try again in a moment.";
const RECOVERY_MESSAGE: &str = "Sorry, we lost track of that step. Let's pick up from here.";

/// What happened to one dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Transitioned { from: State, to: State },
    Recovered { to: State },
    Unchanged,
    Ignored,
    /// The message id was already processed
    Duplicate,
}

impl From<FlowOutcome> for DispatchOutcome {
    fn from(outcome: FlowOutcome) -> Self {
        match outcome {
            FlowOutcome::Transitioned { from, to } => Self::Transitioned { from, to },
            FlowOutcome::Recovered { to } => Self::Recovered { to },
            FlowOutcome::Unchanged => Self::Unchanged,
            FlowOutcome::Ignored => Self::Ignored,
        }
    }
}

/// Counts of what one maintenance pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub locks: usize,
    pub deliveries: usize,
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub identity: String,
    pub outcome: DispatchOutcome,
    /// Session state after dispatch. Absent for duplicates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
}

pub struct Dispatcher {
    sessions: Arc<dyn SessionStore>,
    services: Collaborators,
    settings: FlowSettings,
    registry: FlowHandlerRegistry,
    locks: SessionLocks,
    ledger: DeliveryLedger,
}

impl Dispatcher {
    pub fn new(sessions: Arc<dyn SessionStore>, services: Collaborators, settings: FlowSettings) -> Self {
        Self {
            sessions,
            services,
            settings,
            registry: FlowHandlerRegistry::new(),
            locks: SessionLocks::new(),
            ledger: DeliveryLedger::new(),
        }
    }

    pub fn services(&self) -> &Collaborators {
        &self.services
    }

    /// Processes one inbound event.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchReport> {
        let identity = event.identity.as_str();
        let _guard = self.locks.acquire(identity).await;

        info!(
            identity = %identity,
            message_id = ?event.message_id,
            kind = event.kind(),
            "[Dispatcher] Event received"
        );

        if let Some(message_id) = &event.message_id {
            if self.ledger.contains(identity, message_id).await {
                info!(identity = %identity, message_id = %message_id, "[Dispatcher] Duplicate delivery dropped");
                return Ok(DispatchReport {
                    identity: identity.to_string(),
                    outcome: DispatchOutcome::Duplicate,
                    state: None,
                });
            }
        }

        let report = match self.process(&event).await {
            Ok(report) => report,
            Err(e) => {
                error!(identity = %identity, error = %e, "[Dispatcher] Event processing failed");
                self.send_retry_notice(identity).await;
                return Err(e);
            }
        };

        if let Some(message_id) = &event.message_id {
            self.ledger.record(identity, message_id).await;
        }
        Ok(report)
    }

    /// Feeds a settled extraction job back into its session.
    pub async fn deliver_extraction_outcome(&self, outcome: ExtractionOutcome) -> Result<DispatchReport> {
        let identity = outcome.identity.as_str();
        let _guard = self.locks.acquire(identity).await;

        let Some(mut session) = self.sessions.load(identity).await? else {
            warn!(identity = %identity, job_id = %outcome.job_id, "[Dispatcher] Extraction outcome for unknown session");
            return Ok(DispatchReport {
                identity: identity.to_string(),
                outcome: DispatchOutcome::Ignored,
                state: None,
            });
        };

        let mut machine = StateMachine::with_context(session.state, session.context.clone());
        let flow_outcome = {
            let mut ctx = FlowContext::new(identity, &mut machine, &self.services, &self.settings);
            let flow_outcome = self
                .registry
                .add_vehicle()
                .on_extraction_outcome(&outcome, &mut ctx)
                .await?;
            self.follow_up(flow_outcome, &mut ctx).await?;
            flow_outcome
        };

        self.persist(&mut session, &machine, flow_outcome).await?;
        Ok(DispatchReport {
            identity: identity.to_string(),
            outcome: flow_outcome.into(),
            state: Some(machine.current_state()),
        })
    }

    /// Forgets idle locks, plus delivery records and settled extraction
    /// jobs older than `retention`.
    pub async fn prune(&self, retention: TimeDelta) -> PruneReport {
        let locks = self.locks.prune_idle().await;
        let deliveries = self.ledger.prune_expired(retention).await;
        let jobs = match self.services.jobs.prune_settled(retention).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "[Dispatcher] Failed to prune settled extraction jobs");
                0
            }
        };
        PruneReport {
            locks,
            deliveries,
            jobs,
        }
    }

    async fn process(&self, event: &InboundEvent) -> Result<DispatchReport> {
        let identity = event.identity.as_str();
        let mut session = match self.sessions.load(identity).await? {
            Some(session) => session,
            None => {
                debug!(identity = %identity, "[Dispatcher] Starting new session");
                Session::new(identity)
            }
        };

        let mut machine = StateMachine::with_context(session.state, session.context.clone());
        let outcome = {
            let mut ctx = FlowContext::new(identity, &mut machine, &self.services, &self.settings)
                .with_message_id(event.message_id.as_deref());
            self.drive(event, &mut ctx).await?
        };

        self.persist(&mut session, &machine, outcome).await?;
        debug!(
            identity = %identity,
            outcome = ?outcome,
            state = %machine.current_state(),
            "[Dispatcher] Event handled"
        );

        Ok(DispatchReport {
            identity: identity.to_string(),
            outcome: outcome.into(),
            state: Some(machine.current_state()),
        })
    }

    async fn drive(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let origin = ctx.state();
        let hub = self.registry.get_handler(FlowType::Hub);

        if event.is_home_command() {
            ctx.machine.return_home();
            hub.enter(ctx).await?;
            return Ok(FlowOutcome::Transitioned {
                from: origin,
                to: HOME,
            });
        }

        if ctx.machine.is_terminal() {
            debug!(identity = %ctx.identity, state = %origin, "[Dispatcher] Terminal state, routing to hub");
            ctx.machine.return_home();
            let outcome = hub.handle(event, ctx).await?;
            if outcome == FlowOutcome::Ignored {
                hub.enter(ctx).await?;
            } else {
                self.follow_up(outcome, ctx).await?;
            }
            return Ok(match outcome {
                FlowOutcome::Transitioned { to, .. } => FlowOutcome::Transitioned { from: origin, to },
                FlowOutcome::Recovered { to } => FlowOutcome::Recovered { to },
                FlowOutcome::Unchanged | FlowOutcome::Ignored => FlowOutcome::Transitioned {
                    from: origin,
                    to: HOME,
                },
            });
        }

        let outcome = self
            .registry
            .get_handler(ctx.machine.flow_type())
            .handle(event, ctx)
            .await?;
        self.follow_up(outcome, ctx).await?;
        Ok(outcome)
    }

    /// Prompts the flow the session just landed in, when the handler that
    /// moved it there does not own it.
    async fn follow_up(&self, outcome: FlowOutcome, ctx: &mut FlowContext<'_>) -> Result<()> {
        match outcome {
            FlowOutcome::Transitioned { from, to } if from.flow_type() != to.flow_type() => {
                self.registry.get_handler(to.flow_type()).enter(ctx).await
            }
            FlowOutcome::Recovered { to } => {
                ctx.say(RECOVERY_MESSAGE).await?;
                self.registry.get_handler(to.flow_type()).enter(ctx).await
            }
            _ => Ok(()),
        }
    }

    async fn persist(&self, session: &mut Session, machine: &StateMachine, outcome: FlowOutcome) -> Result<()> {
        if !outcome.progressed() {
            return Ok(());
        }
        let (state, context) = machine.export_state();
        session.state = state;
        session.context = context;
        session.version = self.sessions.save(session).await?;
        Ok(())
    }

    async fn send_retry_notice(&self, identity: &str) {
        if let Err(e) = self.services.messages.send_text(identity, RETRY_MESSAGE).await {
            warn!(identity = %identity, error = %e, "[Dispatcher] Failed to send retry notice");
        }
    }
}
