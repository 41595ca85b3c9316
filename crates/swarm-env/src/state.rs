//! The environment state and its named transactions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use swarm_core::{
    ActionError, AgentId, Archetype, InteractionId, InteractionKind, PostId, RateLimits,
    StateError, TaskId, VoteDirection,
};
use tracing::debug;

use crate::agent::AgentState;
use crate::world::{Post, Submission, Task};

/// An interaction proposed but not yet resolved this step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInteraction {
    pub id: InteractionId,
    pub initiator: AgentId,
    pub counterparty: AgentId,
    pub kind: InteractionKind,
    /// Explicit transfer offered by the initiator.
    pub tau: f64,
    pub epoch: u64,
    pub step: u64,
    /// Latent quality of the initiator's intent, in [0, 1]. Ground truth;
    /// the proxy layer never reads it directly.
    pub true_quality: f64,
    /// Cosmetic inflation of the observable signals, in [0, 1].
    pub apparent_boost: f64,
}

/// Per-agent action counters, reset at each epoch start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCounters {
    pub posts: u32,
    pub votes: u32,
    pub interactions: u32,
}

/// The mutable world. Owned exclusively by the orchestrator; governance and
/// agent policies see read-only views.
pub struct EnvState {
    agents: BTreeMap<AgentId, AgentState>,
    /// Registration order; drives round-robin visitation.
    order: Vec<AgentId>,
    posts: Vec<Post>,
    tasks: BTreeMap<TaskId, Task>,
    pending: Vec<PendingInteraction>,
    rate: BTreeMap<AgentId, RateCounters>,
    rate_limits: RateLimits,
    next_post: u64,
    next_task: u64,
    next_interaction: u64,
    pub current_epoch: u64,
    pub current_step: u64,
}

impl EnvState {
    pub fn new(rate_limits: RateLimits) -> Self {
        Self {
            agents: BTreeMap::new(),
            order: Vec::new(),
            posts: Vec::new(),
            tasks: BTreeMap::new(),
            pending: Vec::new(),
            rate: BTreeMap::new(),
            rate_limits,
            next_post: 0,
            next_task: 0,
            next_interaction: 0,
            current_epoch: 0,
            current_step: 0,
        }
    }

    // ------------------------------------------------------------------
    // Agent ledger
    // ------------------------------------------------------------------

    pub fn register_agent(
        &mut self,
        id: AgentId,
        archetype: Archetype,
        reputation: f64,
        resources: f64,
        stake: f64,
    ) -> Result<(), StateError> {
        if self.agents.contains_key(&id) {
            return Err(StateError::DuplicateAgent {
                agent: id.0.clone(),
            });
        }
        self.order.push(id.clone());
        self.rate.insert(id.clone(), RateCounters::default());
        self.agents.insert(
            id.clone(),
            AgentState::new(id, archetype, reputation, resources, stake),
        );
        Ok(())
    }

    pub fn agent(&self, id: &AgentId) -> Option<&AgentState> {
        self.agents.get(id)
    }

    fn agent_mut(&mut self, id: &AgentId) -> Result<&mut AgentState, StateError> {
        self.agents.get_mut(id).ok_or_else(|| StateError::AgentNotFound {
            agent: id.0.clone(),
        })
    }

    pub fn require_agent(&self, id: &AgentId) -> Result<&AgentState, StateError> {
        self.agents.get(id).ok_or_else(|| StateError::AgentNotFound {
            agent: id.0.clone(),
        })
    }

    /// Agents in registration order.
    pub fn visitation_order(&self) -> &[AgentId] {
        &self.order
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentState> {
        self.agents.values()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn frozen_count(&self, epoch: u64) -> usize {
        self.agents.values().filter(|a| a.is_frozen(epoch)).count()
    }

    // ------------------------------------------------------------------
    // Epoch / step bookkeeping
    // ------------------------------------------------------------------

    /// Reset per-epoch counters and stamp the new epoch.
    pub fn begin_epoch(&mut self, epoch: u64) {
        self.current_epoch = epoch;
        self.current_step = 0;
        for counters in self.rate.values_mut() {
            *counters = RateCounters::default();
        }
    }

    pub fn begin_step(&mut self, step: u64) {
        self.current_step = step;
    }

    // ------------------------------------------------------------------
    // Rate limits
    // ------------------------------------------------------------------

    fn quota_for(&self, id: &AgentId) -> Result<swarm_core::Quota, ActionError> {
        let archetype = self
            .agent(id)
            .ok_or_else(|| ActionError::UnknownCounterparty {
                agent: id.0.clone(),
            })?
            .archetype;
        Ok(self.rate_limits.for_archetype(archetype))
    }

    fn counters_mut(&mut self, id: &AgentId) -> &mut RateCounters {
        self.rate.entry(id.clone()).or_default()
    }

    fn try_consume_post(&mut self, id: &AgentId) -> Result<(), ActionError> {
        let quota = self.quota_for(id)?;
        let counters = self.counters_mut(id);
        if counters.posts >= quota.posts_per_epoch {
            return Err(ActionError::RateLimited {
                action: "post".to_string(),
                quota: quota.posts_per_epoch,
            });
        }
        counters.posts += 1;
        Ok(())
    }

    fn try_consume_vote(&mut self, id: &AgentId) -> Result<(), ActionError> {
        let quota = self.quota_for(id)?;
        let counters = self.counters_mut(id);
        if counters.votes >= quota.votes_per_epoch {
            return Err(ActionError::RateLimited {
                action: "vote".to_string(),
                quota: quota.votes_per_epoch,
            });
        }
        counters.votes += 1;
        Ok(())
    }

    fn try_consume_interaction(&mut self, id: &AgentId) -> Result<(), ActionError> {
        let quota = self.quota_for(id)?;
        let counters = self.counters_mut(id);
        if counters.interactions >= quota.interactions_per_epoch {
            return Err(ActionError::RateLimited {
                action: "interaction".to_string(),
                quota: quota.interactions_per_epoch,
            });
        }
        counters.interactions += 1;
        Ok(())
    }

    /// Votes cast so far this epoch, for vote-weight normalization.
    pub fn votes_cast(&self, id: &AgentId) -> u32 {
        self.rate.get(id).map(|c| c.votes).unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------

    pub fn add_post(&mut self, author: &AgentId, content: String) -> Result<PostId, ActionError> {
        self.try_consume_post(author)?;
        let id = PostId::from_counter(self.next_post);
        self.next_post += 1;
        self.posts.push(Post {
            id: id.clone(),
            author: author.clone(),
            content,
            epoch: self.current_epoch,
            score: 0.0,
        });
        Ok(id)
    }

    pub fn record_vote(
        &mut self,
        voter: &AgentId,
        post: &PostId,
        direction: VoteDirection,
        weight: f64,
    ) -> Result<(), ActionError> {
        if !self.posts.iter().any(|p| &p.id == post) {
            return Err(ActionError::UnknownPost {
                post: post.0.clone(),
            });
        }
        self.try_consume_vote(voter)?;
        let entry = self
            .posts
            .iter_mut()
            .find(|p| &p.id == post)
            .expect("existence checked above");
        match direction {
            VoteDirection::Up => entry.score += weight,
            VoteDirection::Down => entry.score -= weight,
        }
        Ok(())
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    /// Most recent posts, newest last.
    pub fn visible_feed(&self, limit: usize) -> &[Post] {
        let start = self.posts.len().saturating_sub(limit);
        &self.posts[start..]
    }

    // ------------------------------------------------------------------
    // Task pool
    // ------------------------------------------------------------------

    pub fn spawn_task(&mut self, reward: f64) -> TaskId {
        let id = TaskId::from_counter(self.next_task);
        self.next_task += 1;
        self.tasks.insert(id.clone(), Task::open(id.clone(), reward));
        id
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn open_tasks(&self) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.is_open()).collect()
    }

    pub fn tasks_awaiting_verification(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.awaiting_verification())
            .collect()
    }

    pub fn claim_task(&mut self, agent: &AgentId, task: &TaskId) -> Result<(), ActionError> {
        let entry = self.tasks.get(task).ok_or_else(|| ActionError::UnknownTask {
            task: task.0.clone(),
        })?;
        if entry.claimer.is_some() {
            return Err(ActionError::TaskAlreadyClaimed {
                task: task.0.clone(),
            });
        }
        let entry = self.tasks.get_mut(task).expect("existence checked above");
        entry.claimer = Some(agent.clone());
        debug!(agent = %agent, task = %task, "task claimed");
        Ok(())
    }

    pub fn submit_work(
        &mut self,
        agent: &AgentId,
        task: &TaskId,
        quality: f64,
    ) -> Result<(), ActionError> {
        let entry = self.tasks.get_mut(task).ok_or_else(|| ActionError::UnknownTask {
            task: task.0.clone(),
        })?;
        if entry.claimer.as_ref() != Some(agent) {
            return Err(ActionError::TaskNotClaimed {
                task: task.0.clone(),
                agent: agent.0.clone(),
            });
        }
        entry.submission = Some(Submission {
            author: agent.clone(),
            quality: quality.clamp(0.0, 1.0),
        });
        Ok(())
    }

    /// Mark a submitted task verified. Returns the submission author, its
    /// latent quality and the task reward so the caller can settle payoffs.
    pub fn verify_task(
        &mut self,
        verifier: &AgentId,
        task: &TaskId,
        approve: bool,
    ) -> Result<(AgentId, f64, f64), ActionError> {
        let entry = self.tasks.get_mut(task).ok_or_else(|| ActionError::UnknownTask {
            task: task.0.clone(),
        })?;
        let (author, quality) = {
            let submission =
                entry
                    .submission
                    .as_ref()
                    .ok_or_else(|| ActionError::TaskNotClaimed {
                        task: task.0.clone(),
                        agent: verifier.0.clone(),
                    })?;
            if &submission.author == verifier {
                return Err(ActionError::SelfInteraction);
            }
            (submission.author.clone(), submission.quality)
        };
        entry.verified = Some(approve);
        Ok((author, quality, entry.reward))
    }

    // ------------------------------------------------------------------
    // Pending interactions
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn propose_interaction(
        &mut self,
        initiator: &AgentId,
        counterparty: &AgentId,
        kind: InteractionKind,
        tau: f64,
        true_quality: f64,
        apparent_boost: f64,
    ) -> Result<InteractionId, ActionError> {
        if initiator == counterparty {
            return Err(ActionError::SelfInteraction);
        }
        if !self.agents.contains_key(counterparty) {
            return Err(ActionError::UnknownCounterparty {
                agent: counterparty.0.clone(),
            });
        }
        self.try_consume_interaction(initiator)?;
        let id = InteractionId::from_counter(self.next_interaction);
        self.next_interaction += 1;
        self.pending.push(PendingInteraction {
            id: id.clone(),
            initiator: initiator.clone(),
            counterparty: counterparty.clone(),
            kind,
            tau,
            epoch: self.current_epoch,
            step: self.current_step,
            true_quality: true_quality.clamp(0.0, 1.0),
            apparent_boost: apparent_boost.clamp(0.0, 1.0),
        });
        Ok(id)
    }

    pub fn pending(&self) -> &[PendingInteraction] {
        &self.pending
    }

    /// Drain the pending table, in proposal order.
    pub fn take_pending(&mut self) -> Vec<PendingInteraction> {
        std::mem::take(&mut self.pending)
    }

    /// Mint an interaction id outside the proposal path, for interactions
    /// the kernel resolves directly (verifications).
    pub fn mint_interaction_id(&mut self) -> InteractionId {
        let id = InteractionId::from_counter(self.next_interaction);
        self.next_interaction += 1;
        id
    }

    /// Remove one pending interaction by id, for immediate resolution.
    pub fn take_pending_by_id(&mut self, id: &InteractionId) -> Option<PendingInteraction> {
        let idx = self.pending.iter().position(|p| &p.id == id)?;
        Some(self.pending.remove(idx))
    }

    /// The task this agent has claimed but not yet submitted against.
    pub fn claimed_task_of(&self, agent: &AgentId) -> Option<&Task> {
        self.tasks
            .values()
            .find(|t| t.claimer.as_ref() == Some(agent) && t.submission.is_none())
    }

    // ------------------------------------------------------------------
    // Settlement transactions (orchestrator only)
    // ------------------------------------------------------------------

    pub fn apply_payoffs(
        &mut self,
        initiator: &AgentId,
        counterparty: &AgentId,
        payoff_a: f64,
        payoff_b: f64,
    ) -> Result<(), StateError> {
        if !payoff_a.is_finite() || !payoff_b.is_finite() {
            return Err(StateError::NonFinite {
                context: "payoff".to_string(),
                value: if payoff_a.is_finite() { payoff_b } else { payoff_a },
            });
        }
        // validate both sides before touching either
        self.require_agent(initiator)?;
        self.require_agent(counterparty)?;
        {
            let a = self.agent_mut(initiator)?;
            a.resources += payoff_a;
            a.total_payoff += payoff_a;
            a.interactions_seen += 1;
        }
        {
            let b = self.agent_mut(counterparty)?;
            b.resources += payoff_b;
            b.total_payoff += payoff_b;
            b.interactions_seen += 1;
        }
        Ok(())
    }

    pub fn apply_reputation_delta(&mut self, id: &AgentId, delta: f64) -> Result<(), StateError> {
        if !delta.is_finite() {
            return Err(StateError::NonFinite {
                context: format!("reputation delta for {id}"),
                value: delta,
            });
        }
        let agent = self.agent_mut(id)?;
        agent.reputation = (agent.reputation + delta).clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_reputation(&mut self, id: &AgentId, value: f64) -> Result<(), StateError> {
        if !value.is_finite() {
            return Err(StateError::NonFinite {
                context: format!("reputation for {id}"),
                value,
            });
        }
        let agent = self.agent_mut(id)?;
        agent.reputation = value.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn apply_resource_delta(&mut self, id: &AgentId, delta: f64) -> Result<(), StateError> {
        if !delta.is_finite() {
            return Err(StateError::NonFinite {
                context: format!("resource delta for {id}"),
                value: delta,
            });
        }
        let agent = self.agent_mut(id)?;
        agent.resources += delta;
        Ok(())
    }

    /// Burn `rate * stake`. Returns the slashed amount; stake never goes
    /// negative.
    pub fn slash_stake(&mut self, id: &AgentId, rate: f64) -> Result<f64, StateError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(StateError::NonFinite {
                context: format!("slash rate for {id}"),
                value: rate,
            });
        }
        let agent = self.agent_mut(id)?;
        let amount = (agent.stake * rate).min(agent.stake);
        agent.stake -= amount;
        Ok(amount)
    }

    pub fn freeze_agent(&mut self, id: &AgentId, until_epoch: u64) -> Result<(), StateError> {
        let agent = self.agent_mut(id)?;
        agent.frozen_until = Some(until_epoch);
        Ok(())
    }

    pub fn unfreeze_agent(&mut self, id: &AgentId) -> Result<(), StateError> {
        let agent = self.agent_mut(id)?;
        agent.frozen_until = None;
        Ok(())
    }

    pub fn quarantine_agent(&mut self, id: &AgentId) -> Result<(), StateError> {
        let agent = self.agent_mut(id)?;
        agent.quarantined = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> EnvState {
        let mut s = EnvState::new(RateLimits::default());
        s.register_agent(AgentId::from("a"), Archetype::Honest, 0.5, 10.0, 5.0)
            .unwrap();
        s.register_agent(AgentId::from("b"), Archetype::Honest, 0.5, 10.0, 5.0)
            .unwrap();
        s
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let mut s = state();
        let err = s
            .register_agent(AgentId::from("a"), Archetype::Honest, 0.5, 0.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, StateError::DuplicateAgent { .. }));
    }

    #[test]
    fn rate_limit_refuses_with_typed_reason() {
        let mut s = state();
        let a = AgentId::from("a");
        let quota = RateLimits::default().for_archetype(Archetype::Honest);
        for _ in 0..quota.posts_per_epoch {
            s.add_post(&a, "hi".to_string()).unwrap();
        }
        let err = s.add_post(&a, "over".to_string()).unwrap_err();
        assert!(matches!(err, ActionError::RateLimited { .. }));
    }

    #[test]
    fn rate_counters_reset_on_epoch() {
        let mut s = state();
        let a = AgentId::from("a");
        let quota = RateLimits::default().for_archetype(Archetype::Honest);
        for _ in 0..quota.posts_per_epoch {
            s.add_post(&a, "hi".to_string()).unwrap();
        }
        s.begin_epoch(1);
        assert!(s.add_post(&a, "fresh".to_string()).is_ok());
    }

    #[test]
    fn task_claim_is_exclusive() {
        let mut s = state();
        let task = s.spawn_task(1.0);
        s.claim_task(&AgentId::from("a"), &task).unwrap();
        let err = s.claim_task(&AgentId::from("b"), &task).unwrap_err();
        assert!(matches!(err, ActionError::TaskAlreadyClaimed { .. }));
    }

    #[test]
    fn submit_requires_claim() {
        let mut s = state();
        let task = s.spawn_task(1.0);
        let err = s
            .submit_work(&AgentId::from("a"), &task, 0.9)
            .unwrap_err();
        assert!(matches!(err, ActionError::TaskNotClaimed { .. }));
    }

    #[test]
    fn verify_rejects_self_verification() {
        let mut s = state();
        let a = AgentId::from("a");
        let task = s.spawn_task(1.0);
        s.claim_task(&a, &task).unwrap();
        s.submit_work(&a, &task, 0.9).unwrap();
        assert!(matches!(
            s.verify_task(&a, &task, true),
            Err(ActionError::SelfInteraction)
        ));
        let (author, quality, reward) = s.verify_task(&AgentId::from("b"), &task, true).unwrap();
        assert_eq!(author, a);
        assert!((quality - 0.9).abs() < 1e-12);
        assert!((reward - 1.0).abs() < 1e-12);
    }

    #[test]
    fn self_interaction_is_refused() {
        let mut s = state();
        let a = AgentId::from("a");
        let err = s
            .propose_interaction(&a, &a, InteractionKind::Collaboration, 0.0, 0.9, 0.0)
            .unwrap_err();
        assert!(matches!(err, ActionError::SelfInteraction));
    }

    #[test]
    fn pending_drains_in_order() {
        let mut s = state();
        let a = AgentId::from("a");
        let b = AgentId::from("b");
        let first = s
            .propose_interaction(&a, &b, InteractionKind::Collaboration, 0.0, 0.9, 0.0)
            .unwrap();
        let second = s
            .propose_interaction(&b, &a, InteractionKind::Trade, 0.1, 0.5, 0.0)
            .unwrap();
        let drained = s.take_pending();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id, first);
        assert_eq!(drained[1].id, second);
        assert!(s.pending().is_empty());
    }

    #[test]
    fn payoffs_update_both_ledger_sides() {
        let mut s = state();
        let a = AgentId::from("a");
        let b = AgentId::from("b");
        s.apply_payoffs(&a, &b, 1.5, -0.5).unwrap();
        assert!((s.agent(&a).unwrap().resources - 11.5).abs() < 1e-12);
        assert!((s.agent(&b).unwrap().resources - 9.5).abs() < 1e-12);
        assert_eq!(s.agent(&a).unwrap().interactions_seen, 1);
    }

    #[test]
    fn non_finite_payoff_is_a_state_error() {
        let mut s = state();
        let err = s
            .apply_payoffs(&AgentId::from("a"), &AgentId::from("b"), f64::NAN, 0.0)
            .unwrap_err();
        assert!(matches!(err, StateError::NonFinite { .. }));
    }

    #[test]
    fn reputation_is_clamped() {
        let mut s = state();
        let a = AgentId::from("a");
        s.apply_reputation_delta(&a, 5.0).unwrap();
        assert!((s.agent(&a).unwrap().reputation - 1.0).abs() < 1e-12);
        s.apply_reputation_delta(&a, -5.0).unwrap();
        assert_eq!(s.agent(&a).unwrap().reputation, 0.0);
    }

    #[test]
    fn slash_never_goes_negative() {
        let mut s = state();
        let a = AgentId::from("a");
        let amount = s.slash_stake(&a, 0.5).unwrap();
        assert!((amount - 2.5).abs() < 1e-12);
        let amount = s.slash_stake(&a, 1.0).unwrap();
        assert!((amount - 2.5).abs() < 1e-12);
        assert_eq!(s.agent(&a).unwrap().stake, 0.0);
    }

    #[test]
    fn feed_slice_is_bounded() {
        let mut s = state();
        let a = AgentId::from("a");
        s.add_post(&a, "one".to_string()).unwrap();
        s.add_post(&a, "two".to_string()).unwrap();
        s.add_post(&a, "three".to_string()).unwrap();
        let feed = s.visible_feed(2);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[1].content, "three");
    }

    #[test]
    fn vote_applies_weight() {
        let mut s = state();
        let a = AgentId::from("a");
        let b = AgentId::from("b");
        let post = s.add_post(&a, "p".to_string()).unwrap();
        s.record_vote(&b, &post, VoteDirection::Up, 1.0).unwrap();
        s.record_vote(&b, &post, VoteDirection::Down, 0.5).unwrap();
        assert!((s.post(&post).unwrap().score - 0.5).abs() < 1e-12);
        assert_eq!(s.votes_cast(&b), 2);
    }
}
