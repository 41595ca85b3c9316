//! The orchestrator proper

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use swarm_agents::{
    AdversarialPolicy, AgentPolicy, DeceptivePolicy, DeclaredPolicy, ExternalProxyAgent,
    HonestPolicy, Observation, OpportunisticPolicy, PeerInfo, PostView, ProposalView, SelfView,
    TaskView,
};
use swarm_core::{
    Action, ActionError, ActionOutcome, ActionResult, AgentId, Archetype, ConfigError,
    InteractionKind, KernelRng, ScenarioConfig, SoftInteraction, StateError,
};
use swarm_env::{EnvState, PendingInteraction};
use swarm_events::{EventKind, EventLog, EventLogError, JsonlSink};
use swarm_governance::GovernanceEngine;
use swarm_metrics::EpochMetrics;
use swarm_payoff::{PairCosts, PayoffEngine, PayoffError};

use crate::manifest::{RunManifest, RunStatus};
use crate::schedule::visitation;
use crate::synth;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("state invariant violated: {0}")]
    State(#[from] StateError),

    #[error("payoff engine rejected: {0}")]
    Payoff(#[from] PayoffError),

    #[error("event log failure: {0}")]
    Log(#[from] EventLogError),

    #[error("run directory io failure: {message}")]
    Io { message: String },
}

/// Feed slice size exposed to agents.
const FEED_WINDOW: usize = 10;

pub struct Orchestrator {
    config: ScenarioConfig,
    state: EnvState,
    policies: BTreeMap<AgentId, Box<dyn AgentPolicy>>,
    governance: GovernanceEngine,
    payoff: PayoffEngine,
    rng: KernelRng,
    log: EventLog,
    manifest: RunManifest,
    resolved: Vec<SoftInteraction>,
    epoch_resolved_start: usize,
    flagged_this_epoch: u64,
    /// Agents whose turn has occurred this step.
    visited: BTreeSet<AgentId>,
    /// Agents able to act when the current step started.
    active_at_step_start: BTreeSet<AgentId>,
    cancel: Arc<AtomicBool>,
    run_dir: Option<PathBuf>,
    metrics_rows: Vec<String>,
}

impl Orchestrator {
    /// Build an orchestrator from a validated scenario. Registers the
    /// configured population immediately; all registration events land in
    /// an in-memory log.
    pub fn new(config: ScenarioConfig) -> Result<Self, RunError> {
        Self::build(config, None)
    }

    /// Like [`Orchestrator::new`], but persists `events.jsonl`,
    /// `metrics.csv` and `manifest.json` under the given directory.
    pub fn with_run_dir(
        config: ScenarioConfig,
        dir: impl Into<PathBuf>,
    ) -> Result<Self, RunError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| RunError::Io {
            message: e.to_string(),
        })?;
        let sink = JsonlSink::create(dir.join("events.jsonl"))?;
        Self::build(config, Some((dir, sink)))
    }

    fn build(
        config: ScenarioConfig,
        run_dir: Option<(PathBuf, JsonlSink)>,
    ) -> Result<Self, RunError> {
        config.validate()?;
        let payoff = PayoffEngine::new(config.payoff.clone())?;
        let governance = GovernanceEngine::new(config.governance.clone(), config.proxy.k);
        let state = EnvState::new(config.rate_limits.clone());
        let manifest = RunManifest::begin(config.id.clone(), config.seed);
        let rng = KernelRng::seed_from(config.seed);
        let (run_dir, log) = match run_dir {
            Some((dir, sink)) => (Some(dir), EventLog::with_sink(Box::new(sink))),
            None => (None, EventLog::new()),
        };

        let mut orchestrator = Self {
            config,
            state,
            policies: BTreeMap::new(),
            governance,
            payoff,
            rng,
            log,
            manifest,
            resolved: Vec::new(),
            epoch_resolved_start: 0,
            flagged_this_epoch: 0,
            visited: BTreeSet::new(),
            active_at_step_start: BTreeSet::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            run_dir,
            metrics_rows: Vec::new(),
        };
        orchestrator.register_population()?;
        Ok(orchestrator)
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn state(&self) -> &EnvState {
        &self.state
    }

    pub fn resolved_interactions(&self) -> &[SoftInteraction] {
        &self.resolved
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    fn register_population(&mut self) -> Result<(), RunError> {
        // name agents per archetype in spec order, then wire adversarial
        // groups once the whole roster is known
        let mut counters: BTreeMap<Archetype, u32> = BTreeMap::new();
        let mut roster: Vec<(AgentId, usize)> = Vec::new();
        let mut groups: BTreeMap<String, Vec<AgentId>> = BTreeMap::new();

        for (idx, spec) in self.config.agents.iter().enumerate() {
            for _ in 0..spec.count {
                let n = counters.entry(spec.archetype).or_insert(0);
                *n += 1;
                let id = AgentId::from_string(format!("{}_{}", spec.archetype, n));
                if spec.archetype == Archetype::Adversarial {
                    let key = spec
                        .params
                        .group_id
                        .clone()
                        .unwrap_or_else(|| format!("group_{idx}"));
                    groups.entry(key).or_default().push(id.clone());
                }
                roster.push((id, idx));
            }
        }

        let group_of = |id: &AgentId| -> Option<&Vec<AgentId>> {
            groups.values().find(|members| members.contains(id))
        };

        for (id, idx) in &roster {
            let spec = &self.config.agents[*idx];
            let policy: Box<dyn AgentPolicy> = match spec.archetype {
                Archetype::Honest => Box::new(HonestPolicy::new()),
                Archetype::Opportunistic => {
                    Box::new(OpportunisticPolicy::new(spec.params.defect_rate))
                }
                Archetype::Deceptive => Box::new(DeceptivePolicy::new(&mut self.rng)),
                Archetype::Adversarial => {
                    let mut policy = AdversarialPolicy::new();
                    if let Some(members) = group_of(id) {
                        policy.set_group(members.iter().cloned());
                    }
                    Box::new(policy)
                }
                Archetype::External => {
                    let declared = DeclaredPolicy {
                        cooperation_bias: spec.params.cooperation_bias.unwrap_or(0.5),
                        acceptance_threshold: spec.params.acceptance_threshold.unwrap_or(0.4),
                        interaction_probability: spec
                            .params
                            .interaction_probability
                            .unwrap_or(0.3),
                        post_probability: spec.params.post_probability.unwrap_or(0.2),
                    };
                    Box::new(ExternalProxyAgent::with_policy(declared))
                }
            };
            self.register_policy(id.clone(), policy)?;
        }
        Ok(())
    }

    /// Register one agent with its policy. Public so bridges can attach
    /// callback-mode proxies; the kernel schedules them like anyone else.
    pub fn register_policy(
        &mut self,
        id: AgentId,
        policy: Box<dyn AgentPolicy>,
    ) -> Result<(), RunError> {
        let archetype = policy.archetype();
        self.state.register_agent(
            id.clone(),
            archetype,
            self.config.governance.initial_reputation,
            self.config.initial_resources,
            self.config.initial_stake,
        )?;
        self.policies.insert(id.clone(), policy);
        self.log.append(
            0,
            0,
            EventKind::AgentRegistered,
            json!({"agent": &id.0, "archetype": archetype.to_string()}),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // The run loop
    // ------------------------------------------------------------------

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn run(&mut self) -> Result<Vec<EpochMetrics>, RunError> {
        let mut all_metrics = Vec::new();
        info!(
            scenario = %self.config.id,
            seed = self.config.seed,
            agents = self.state.agent_count(),
            "run starting"
        );

        for epoch in 0..self.config.n_epochs {
            match self.run_epoch(epoch, &mut all_metrics) {
                Ok(true) => continue,
                Ok(false) => {
                    // cancelled inside the epoch; partial metrics emitted
                    self.finish(RunStatus::Cancelled, epoch)?;
                    return Ok(all_metrics);
                }
                Err(err) => {
                    // best-effort terminator; the original error wins
                    let _ = self.crash(&err, epoch);
                    return Err(err);
                }
            }
        }

        self.finish(RunStatus::Completed, self.config.n_epochs)?;
        Ok(all_metrics)
    }

    /// Returns Ok(false) when the run was cancelled mid-epoch.
    fn run_epoch(
        &mut self,
        epoch: u64,
        all_metrics: &mut Vec<EpochMetrics>,
    ) -> Result<bool, RunError> {
        // governance first: cooldowns expire before anything else happens
        let start_ruling = self.governance.on_epoch_start(&self.state, epoch);
        for id in &start_ruling.unfreeze {
            self.state.unfreeze_agent(id)?;
            self.log.append(
                epoch,
                0,
                EventKind::AgentUnfrozen,
                json!({"agent": &id.0}),
            )?;
        }

        self.state.begin_epoch(epoch);
        self.epoch_resolved_start = self.resolved.len();
        self.flagged_this_epoch = 0;
        for _ in 0..self.config.tasks_per_epoch {
            self.state.spawn_task(self.config.task_reward);
        }

        for step in 0..self.config.steps_per_epoch {
            if self.cancelled() {
                let partial = self.epoch_metrics(epoch);
                self.log.append(
                    epoch,
                    step,
                    EventKind::EpochMetrics,
                    json!({"metrics": &partial, "partial": true}),
                )?;
                self.log.append(
                    epoch,
                    step,
                    EventKind::RunCancelled,
                    json!({"epoch": epoch, "step": step}),
                )?;
                self.metrics_rows.push(partial.csv_row());
                all_metrics.push(partial);
                return Ok(false);
            }
            self.run_step(epoch, step)?;
        }
        debug_assert!(self.state.pending().is_empty());

        let metrics = self.epoch_metrics(epoch);
        let end_ruling = self.governance.on_epoch_end(&self.state, epoch);
        for (id, reputation) in &end_ruling.reputation_updates {
            self.state.set_reputation(id, *reputation)?;
        }
        self.log.append(
            epoch,
            self.config.steps_per_epoch,
            EventKind::EpochMetrics,
            json!({"metrics": &metrics}),
        )?;
        debug!(
            epoch,
            toxicity = metrics.toxicity_rate,
            welfare = metrics.total_welfare,
            "epoch complete"
        );
        self.metrics_rows.push(metrics.csv_row());
        all_metrics.push(metrics);
        Ok(true)
    }

    fn run_step(&mut self, epoch: u64, step: u64) -> Result<(), RunError> {
        self.state.begin_step(step);
        let order = visitation(&self.state, self.config.scheduling, &mut self.rng);

        self.active_at_step_start = self
            .state
            .agents()
            .filter(|a| a.can_act(epoch))
            .map(|a| a.id.clone())
            .collect();
        self.visited.clear();

        for agent_id in order {
            let Some(agent) = self.state.agent(&agent_id) else {
                continue;
            };
            if !agent.can_act(epoch) {
                let reason = if agent.quarantined {
                    "quarantined"
                } else {
                    "frozen"
                };
                // an agent that lost the right to act after the step began
                // had its pending turn dropped rather than skipped
                let kind = if self.active_at_step_start.contains(&agent_id) {
                    EventKind::FrozenActionDropped
                } else {
                    EventKind::AgentSkipped
                };
                self.log.append(
                    epoch,
                    step,
                    kind,
                    json!({"agent": &agent_id.0, "reason": reason}),
                )?;
                self.visited.insert(agent_id);
                continue;
            }

            let obs = self.build_observation(&agent_id);
            let policy = self
                .policies
                .get_mut(&agent_id)
                .expect("every registered agent has a policy");
            let action = policy.act(&obs, &mut self.rng);
            self.log.append(
                epoch,
                step,
                EventKind::ActionEmitted,
                json!({"agent": &agent_id.0, "action": action.tag()}),
            )?;

            let result = self.execute_action(&agent_id, action)?;
            if let Some(result) = result {
                if let Some(policy) = self.policies.get_mut(&agent_id) {
                    policy.on_result(&result);
                }
            }

            // a proxy that keeps failing is retired for the run
            let wants_quarantine = self
                .policies
                .get(&agent_id)
                .is_some_and(|p| p.should_quarantine());
            if wants_quarantine && !self.state.require_agent(&agent_id)?.quarantined {
                self.state.quarantine_agent(&agent_id)?;
                self.log.append(
                    epoch,
                    step,
                    EventKind::AgentQuarantined,
                    json!({"agent": &agent_id.0, "reason": "proxy_failures"}),
                )?;
            }

            self.visited.insert(agent_id);
        }

        self.resolve_pending_sweep()
    }

    /// Same-step resolution sweep for proposals whose counterparty had not
    /// yet been visited when the proposal landed. Unresolvable leftovers
    /// are abandoned inside `resolve_interaction`.
    fn resolve_pending_sweep(&mut self) -> Result<(), RunError> {
        for pending in self.state.take_pending() {
            self.resolve_interaction(pending, None)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Action execution
    // ------------------------------------------------------------------

    fn refuse(
        &mut self,
        agent: &AgentId,
        action: &Action,
        err: ActionError,
    ) -> Result<Option<ActionResult>, RunError> {
        if let ActionError::RateLimited { .. } = &err {
            self.log.append(
                self.state.current_epoch,
                self.state.current_step,
                EventKind::RateLimited,
                json!({"agent": &agent.0, "action": action.tag()}),
            )?;
        }
        debug!(agent = %agent, action = action.tag(), error = %err, "action refused");
        Ok(Some(ActionResult::refused(action, err)))
    }

    fn execute_action(
        &mut self,
        agent: &AgentId,
        action: Action,
    ) -> Result<Option<ActionResult>, RunError> {
        match action.clone() {
            Action::Pass => Ok(Some(ActionResult::applied(&action))),

            Action::Post { content } => match self.state.add_post(agent, content) {
                Ok(_) => Ok(Some(ActionResult::applied(&action))),
                Err(err) => self.refuse(agent, &action, err),
            },

            Action::Reply { post, content } => {
                if self.state.post(&post).is_none() {
                    return self.refuse(
                        agent,
                        &action,
                        ActionError::UnknownPost { post: post.0 },
                    );
                }
                match self.state.add_post(agent, content) {
                    Ok(_) => Ok(Some(ActionResult::applied(&action))),
                    Err(err) => self.refuse(agent, &action, err),
                }
            }

            Action::Vote { post, direction } => {
                let weight = self.governance.vote_weight(self.state.votes_cast(agent));
                match self.state.record_vote(agent, &post, direction, weight) {
                    Ok(()) => {
                        let author = self
                            .state
                            .post(&post)
                            .map(|p| p.author.clone())
                            .expect("vote succeeded on existing post");
                        if &author != agent {
                            let positive = direction == swarm_core::VoteDirection::Up;
                            let flagged = self.governance.on_social_event(
                                agent,
                                &author,
                                positive,
                                self.state.current_epoch,
                            );
                            if let Some((a, b)) = flagged {
                                self.emit_collusion_flag(&a, &b)?;
                            }
                        }
                        Ok(Some(ActionResult::applied(&action)))
                    }
                    Err(err) => self.refuse(agent, &action, err),
                }
            }

            Action::ClaimTask { task } => match self.state.claim_task(agent, &task) {
                Ok(()) => Ok(Some(ActionResult::applied(&action))),
                Err(err) => self.refuse(agent, &action, err),
            },

            Action::SubmitWork { task, quality } => {
                match self.state.submit_work(agent, &task, quality) {
                    Ok(()) => Ok(Some(ActionResult::applied(&action))),
                    Err(err) => self.refuse(agent, &action, err),
                }
            }

            Action::Verify { task, approve } => {
                match self.state.verify_task(agent, &task, approve) {
                    Ok((author, quality, reward)) => {
                        if approve {
                            self.state.apply_resource_delta(&author, reward)?;
                        }
                        let flagged = self.governance.on_social_event(
                            agent,
                            &author,
                            approve,
                            self.state.current_epoch,
                        );
                        if let Some((a, b)) = flagged {
                            self.emit_collusion_flag(&a, &b)?;
                        }
                        self.resolve_verification(agent, &author, quality, approve)
                    }
                    Err(err) => self.refuse(agent, &action, err),
                }
            }

            Action::Collaborate { partner } => {
                self.propose(agent, &partner, InteractionKind::Collaboration, 0.0, &action)
            }

            Action::TradePropose { partner, transfer } => {
                self.propose(agent, &partner, InteractionKind::Trade, transfer, &action)
            }

            Action::TradeAccept { interaction } => {
                let addressed_to_agent = self
                    .state
                    .pending()
                    .iter()
                    .any(|p| p.id == interaction && &p.counterparty == agent);
                if !addressed_to_agent {
                    return self.refuse(
                        agent,
                        &action,
                        ActionError::UnknownInteraction {
                            interaction: interaction.0,
                        },
                    );
                }
                let pending = self
                    .state
                    .take_pending_by_id(&interaction)
                    .expect("pending existence checked above");
                self.resolve_interaction(pending, Some(true))?;
                Ok(None)
            }
        }
    }

    fn propose(
        &mut self,
        initiator: &AgentId,
        partner: &AgentId,
        kind: InteractionKind,
        tau: f64,
        action: &Action,
    ) -> Result<Option<ActionResult>, RunError> {
        if let Err(err) = self.governance.can_initiate(&self.state, initiator) {
            return self.refuse(initiator, action, err);
        }

        let intent = {
            let policy = self
                .policies
                .get_mut(initiator)
                .expect("every registered agent has a policy");
            policy.work_intent(partner, &mut self.rng)
        };

        let id = match self.state.propose_interaction(
            initiator,
            partner,
            kind,
            tau,
            intent.true_quality,
            intent.apparent_boost,
        ) {
            Ok(id) => id,
            Err(err) => return self.refuse(initiator, action, err),
        };

        self.log.append(
            self.state.current_epoch,
            self.state.current_step,
            EventKind::InteractionProposed,
            json!({
                "interaction": &id.0,
                "initiator": &initiator.0,
                "counterparty": &partner.0,
                "kind": kind.to_string(),
            }),
        )?;

        // resolve now if the counterparty's turn already came this step;
        // otherwise the end-of-step sweep picks it up
        if self.visited.contains(partner) {
            let pending = self
                .state
                .take_pending_by_id(&id)
                .expect("just proposed, still pending");
            self.resolve_interaction(pending, None)?;
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Interaction resolution
    // ------------------------------------------------------------------

    /// Resolve a verification as an immediately-decided interaction from
    /// verifier to author.
    fn resolve_verification(
        &mut self,
        verifier: &AgentId,
        author: &AgentId,
        quality: f64,
        approve: bool,
    ) -> Result<Option<ActionResult>, RunError> {
        let pending = PendingInteraction {
            id: self.state.mint_interaction_id(),
            initiator: verifier.clone(),
            counterparty: author.clone(),
            kind: InteractionKind::Verification,
            tau: 0.0,
            epoch: self.state.current_epoch,
            step: self.state.current_step,
            true_quality: quality,
            apparent_boost: 0.0,
        };
        self.resolve_interaction(pending, Some(approve))?;
        Ok(None)
    }

    /// Resolve one pending interaction: synthesize observables, score,
    /// decide acceptance, evaluate governance, settle payoffs, log, and
    /// feed the outcome back to both parties.
    fn resolve_interaction(
        &mut self,
        pending: PendingInteraction,
        forced: Option<bool>,
    ) -> Result<(), RunError> {
        let epoch = self.state.current_epoch;
        let step = self.state.current_step;

        // a counterparty that can no longer act cannot answer the proposal
        let counterparty_live = self
            .state
            .agent(&pending.counterparty)
            .is_some_and(|a| a.can_act(epoch));
        if !counterparty_live && forced.is_none() {
            self.log.append(
                epoch,
                step,
                EventKind::InteractionAbandoned,
                json!({
                    "interaction": &pending.id.0,
                    "initiator": &pending.initiator.0,
                    "counterparty": &pending.counterparty.0,
                }),
            )?;
            return Ok(());
        }

        let initiator_reputation = self.state.require_agent(&pending.initiator)?.reputation;
        let observables = synth::observables(
            pending.true_quality,
            pending.apparent_boost,
            initiator_reputation,
            &mut self.rng,
        );
        let (v_hat, p) = swarm_proxy::score(&observables, &self.config.proxy);

        let accepted = match forced {
            Some(decision) => decision,
            None => {
                let proposal = ProposalView {
                    id: pending.id.clone(),
                    initiator: pending.initiator.clone(),
                    kind: pending.kind,
                    tau: pending.tau,
                    estimated_p: p,
                };
                let obs = self.build_observation(&pending.counterparty);
                let policy = self
                    .policies
                    .get_mut(&pending.counterparty)
                    .expect("every registered agent has a policy");
                policy.accept(&proposal, &obs, &mut self.rng)
            }
        };

        let mut interaction = SoftInteraction {
            id: pending.id.clone(),
            epoch: pending.epoch,
            step: pending.step,
            initiator: pending.initiator.clone(),
            counterparty: pending.counterparty.clone(),
            kind: pending.kind,
            accepted,
            v_hat,
            p,
            observables,
            tau: pending.tau,
            audited: false,
            audit_verdict: None,
            taxed_amount: 0.0,
            payoff_a: 0.0,
            payoff_b: 0.0,
        };

        // governance before payoffs: costs flow into the payoff formula
        let ruling = self
            .governance
            .on_interaction(&interaction, &self.state, &mut self.rng);

        let rep_a = self.state.require_agent(&interaction.initiator)?.reputation;
        let rep_b = self
            .state
            .require_agent(&interaction.counterparty)?
            .reputation;
        let costs = PairCosts {
            c_a: ruling.cost_a,
            c_b: ruling.cost_b,
        };
        let payoffs = self.payoff.payoffs(&interaction, costs, rep_a, rep_b);

        interaction.taxed_amount = ruling.taxed_amount;
        interaction.audited = ruling.audited;
        interaction.audit_verdict = ruling.audit_verdict;
        interaction.payoff_a = payoffs.initiator;
        interaction.payoff_b = payoffs.counterparty;

        if accepted {
            self.state.apply_payoffs(
                &interaction.initiator,
                &interaction.counterparty,
                payoffs.initiator,
                payoffs.counterparty,
            )?;
        }

        self.apply_ruling(&interaction, &ruling)?;

        self.log.append(
            epoch,
            step,
            EventKind::InteractionResolved,
            json!({"interaction": &interaction}),
        )?;
        self.resolved.push(interaction.clone());

        // both sides learn the outcome
        let initiator_result = ActionResult {
            tag: interaction.kind.to_string(),
            outcome: ActionOutcome::Interaction {
                id: interaction.id.clone(),
                partner: interaction.counterparty.clone(),
                accepted,
                p,
                payoff: payoffs.initiator,
            },
        };
        if let Some(policy) = self.policies.get_mut(&interaction.initiator) {
            policy.on_result(&initiator_result);
        }
        let counterparty_result = ActionResult {
            tag: interaction.kind.to_string(),
            outcome: ActionOutcome::Interaction {
                id: interaction.id.clone(),
                partner: interaction.initiator.clone(),
                accepted,
                p,
                payoff: payoffs.counterparty,
            },
        };
        if let Some(policy) = self.policies.get_mut(&interaction.counterparty) {
            policy.on_result(&counterparty_result);
        }
        Ok(())
    }

    fn apply_ruling(
        &mut self,
        interaction: &SoftInteraction,
        ruling: &swarm_governance::InteractionRuling,
    ) -> Result<(), RunError> {
        let epoch = self.state.current_epoch;
        let step = self.state.current_step;

        for (id, delta) in &ruling.reputation_deltas {
            self.state.apply_reputation_delta(id, *delta)?;
        }

        if ruling.audited {
            self.log.append(
                epoch,
                step,
                EventKind::AuditExecuted,
                json!({
                    "interaction": &interaction.id.0,
                    "initiator": &interaction.initiator.0,
                    "verdict": ruling.audit_verdict,
                    "p": interaction.p,
                }),
            )?;
        }

        if let Some((id, until)) = &ruling.freeze {
            self.state.freeze_agent(id, *until)?;
            self.log.append(
                epoch,
                step,
                EventKind::AgentFrozen,
                json!({"agent": &id.0, "until_epoch": until}),
            )?;
        }

        if let Some((id, rate)) = &ruling.slash {
            let amount = self.state.slash_stake(id, *rate)?;
            self.log.append(
                epoch,
                step,
                EventKind::StakeSlashed,
                json!({"agent": &id.0, "amount": amount, "rate": rate}),
            )?;
            let drained = self.state.require_agent(id)?.stake <= f64::EPSILON;
            if drained && !self.state.require_agent(id)?.quarantined {
                self.state.quarantine_agent(id)?;
                self.log.append(
                    epoch,
                    step,
                    EventKind::AgentQuarantined,
                    json!({"agent": &id.0, "reason": "stake_exhausted"}),
                )?;
                warn!(agent = %id, "stake exhausted, agent quarantined");
            }
        }

        for (a, b) in &ruling.flagged_pairs {
            self.emit_collusion_flag(a, b)?;
        }
        Ok(())
    }

    fn emit_collusion_flag(&mut self, a: &AgentId, b: &AgentId) -> Result<(), RunError> {
        self.flagged_this_epoch += 1;
        self.log.append(
            self.state.current_epoch,
            self.state.current_step,
            EventKind::CollusionFlagged,
            json!({"pair": [a.0.clone(), b.0.clone()]}),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observation building & metrics
    // ------------------------------------------------------------------

    fn build_observation(&self, agent_id: &AgentId) -> Observation {
        let epoch = self.state.current_epoch;
        let agent = self
            .state
            .agent(agent_id)
            .expect("observations are built for registered agents");

        let peers = self
            .state
            .agents()
            .filter(|a| &a.id != agent_id && a.can_act(epoch))
            .map(|a| PeerInfo {
                id: a.id.clone(),
                reputation: a.reputation,
            })
            .collect();

        let feed = self
            .state
            .visible_feed(FEED_WINDOW)
            .iter()
            .map(|p| PostView {
                id: p.id.clone(),
                author: p.author.clone(),
                score: p.score,
            })
            .collect();

        let open_tasks = self
            .state
            .open_tasks()
            .into_iter()
            .map(|t| TaskView {
                id: t.id.clone(),
                reward: t.reward,
                submitted_by: None,
            })
            .collect();

        let verifiable_tasks = self
            .state
            .tasks_awaiting_verification()
            .into_iter()
            .filter(|t| {
                t.submission
                    .as_ref()
                    .is_some_and(|s| &s.author != agent_id)
            })
            .map(|t| TaskView {
                id: t.id.clone(),
                reward: t.reward,
                submitted_by: t.submission.as_ref().map(|s| s.author.clone()),
            })
            .collect();

        Observation {
            epoch,
            step: self.state.current_step,
            this: SelfView {
                id: agent.id.clone(),
                archetype: agent.archetype,
                reputation: agent.reputation,
                resources: agent.resources,
                stake: agent.stake,
                claimed_task: self.state.claimed_task_of(agent_id).map(|t| t.id.clone()),
            },
            peers,
            feed,
            open_tasks,
            verifiable_tasks,
        }
    }

    fn epoch_metrics(&self, epoch: u64) -> EpochMetrics {
        let interactions = &self.resolved[self.epoch_resolved_start..];
        let payoff_totals: Vec<f64> = self.state.agents().map(|a| a.total_payoff).collect();
        EpochMetrics::compute(
            epoch,
            interactions,
            &payoff_totals,
            self.state.frozen_count(epoch) as u64,
            self.flagged_this_epoch,
        )
    }

    // ------------------------------------------------------------------
    // Run termination
    // ------------------------------------------------------------------

    fn crash(&mut self, err: &RunError, epoch: u64) -> Result<(), RunError> {
        warn!(error = %err, "run crashed");
        // best-effort terminator; the original error wins either way
        let _ = self.log.append(
            self.state.current_epoch,
            self.state.current_step,
            EventKind::RunCrashed,
            json!({"error": err.to_string()}),
        );
        self.manifest.finish(RunStatus::Crashed, epoch);
        self.write_run_dir()
    }

    fn finish(&mut self, status: RunStatus, epochs_completed: u64) -> Result<(), RunError> {
        self.manifest.finish(status, epochs_completed);
        info!(
            run = %self.manifest.run_id,
            status = ?status,
            epochs = epochs_completed,
            events = self.log.len(),
            "run finished"
        );
        self.write_run_dir()
    }

    fn write_run_dir(&mut self) -> Result<(), RunError> {
        let Some(dir) = self.run_dir.clone() else {
            return Ok(());
        };
        let io_err = |e: std::io::Error| RunError::Io {
            message: e.to_string(),
        };
        let mut csv = std::fs::File::create(dir.join("metrics.csv")).map_err(io_err)?;
        writeln!(csv, "{}", EpochMetrics::csv_header()).map_err(io_err)?;
        for row in &self.metrics_rows {
            writeln!(csv, "{row}").map_err(io_err)?;
        }
        self.manifest
            .write_json(dir.join("manifest.json"))
            .map_err(io_err)?;
        Ok(())
    }
}
