//! Adversarial archetype
//!
//! Targets honest agents with bad-faith proposals while keeping a shared
//! latent group whose members up-vote each other and co-complete tasks.
//! The in-group coordination is what the collusion detector exists to
//! catch; the out-group predation is what the circuit breaker catches.

use std::collections::BTreeSet;

use swarm_core::{Action, AgentId, Archetype, KernelRng, VoteDirection};

use crate::observation::{Observation, ProposalView};
use crate::policy::{AgentPolicy, WorkIntent};

pub struct AdversarialPolicy {
    group: BTreeSet<AgentId>,
}

impl AdversarialPolicy {
    pub fn new() -> Self {
        Self {
            group: BTreeSet::new(),
        }
    }

    /// Wire up the shared group after the whole population is registered.
    pub fn set_group(&mut self, members: impl IntoIterator<Item = AgentId>) {
        self.group = members.into_iter().collect();
    }

    fn is_ally(&self, id: &AgentId) -> bool {
        self.group.contains(id)
    }

    fn ally_in<'a>(&self, obs: &'a Observation) -> Option<&'a AgentId> {
        obs.peers.iter().map(|p| &p.id).find(|id| self.is_ally(id))
    }

    /// Honest-looking targets: reputable peers outside the group.
    fn mark_in<'a>(&self, obs: &'a Observation) -> Option<&'a AgentId> {
        obs.peers
            .iter()
            .filter(|p| !self.is_ally(&p.id))
            .max_by(|a, b| {
                a.reputation
                    .partial_cmp(&b.reputation)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|p| &p.id)
    }
}

impl Default for AdversarialPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentPolicy for AdversarialPolicy {
    fn archetype(&self) -> Archetype {
        Archetype::Adversarial
    }

    fn act(&mut self, obs: &Observation, rng: &mut KernelRng) -> Action {
        if let Some(task) = &obs.this.claimed_task {
            return Action::SubmitWork {
                task: task.clone(),
                quality: rng.range_f64(0.1, 0.3),
            };
        }

        // boost an ally's post whenever one is visible
        if rng.chance(0.6) {
            if let Some(post) = obs
                .feed
                .iter()
                .rev()
                .find(|p| self.is_ally(&p.author) && p.author != obs.this.id)
            {
                return Action::Vote {
                    post: post.id.clone(),
                    direction: VoteDirection::Up,
                };
            }
        }

        // co-complete with an ally to pump the pair statistics
        if let Some(ally) = self.ally_in(obs) {
            if rng.chance(0.4) {
                return Action::Collaborate {
                    partner: ally.clone(),
                };
            }
        }

        // go after an honest mark
        if let Some(mark) = self.mark_in(obs) {
            if rng.chance(0.6) {
                return Action::Collaborate {
                    partner: mark.clone(),
                };
            }
        }

        if rng.chance(0.4) {
            return Action::Post {
                content: "boosting the signal".to_string(),
            };
        }
        Action::Pass
    }

    fn accept(&mut self, proposal: &ProposalView, _obs: &Observation, rng: &mut KernelRng) -> bool {
        if self.is_ally(&proposal.initiator) {
            return true;
        }
        // outsiders mostly get stonewalled; the ring wastes their effort
        proposal.estimated_p >= 0.3 && rng.chance(0.4)
    }

    fn work_intent(&mut self, counterparty: &AgentId, rng: &mut KernelRng) -> WorkIntent {
        if self.is_ally(counterparty) {
            // genuine effort inside the ring keeps the pair stats glowing
            WorkIntent::honest(rng.range_f64(0.8, 0.95))
        } else {
            WorkIntent::inflated(rng.range_f64(0.05, 0.25), rng.range_f64(0.5, 0.8))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{PeerInfo, PostView, SelfView};
    use swarm_core::{InteractionId, InteractionKind, PostId};

    fn observation(with_ally_post: bool) -> Observation {
        Observation {
            epoch: 0,
            step: 0,
            this: SelfView {
                id: AgentId::from("adv_1"),
                archetype: Archetype::Adversarial,
                reputation: 0.5,
                resources: 10.0,
                stake: 0.0,
                claimed_task: None,
            },
            peers: vec![
                PeerInfo {
                    id: AgentId::from("adv_2"),
                    reputation: 0.4,
                },
                PeerInfo {
                    id: AgentId::from("honest_1"),
                    reputation: 0.9,
                },
            ],
            feed: if with_ally_post {
                vec![PostView {
                    id: PostId::from_counter(0),
                    author: AgentId::from("adv_2"),
                    score: 0.0,
                }]
            } else {
                vec![]
            },
            open_tasks: vec![],
            verifiable_tasks: vec![],
        }
    }

    fn grouped() -> AdversarialPolicy {
        let mut policy = AdversarialPolicy::new();
        policy.set_group([AgentId::from("adv_1"), AgentId::from("adv_2")]);
        policy
    }

    #[test]
    fn always_accepts_allies() {
        let mut policy = grouped();
        let mut rng = KernelRng::seed_from(0);
        let obs = observation(false);
        let proposal = ProposalView {
            id: InteractionId::from_counter(0),
            initiator: AgentId::from("adv_2"),
            kind: InteractionKind::Collaboration,
            tau: 0.0,
            estimated_p: 0.01,
        };
        assert!(policy.accept(&proposal, &obs, &mut rng));
    }

    #[test]
    fn intent_splits_by_group_membership() {
        let mut policy = grouped();
        let mut rng = KernelRng::seed_from(1);
        let ally = policy.work_intent(&AgentId::from("adv_2"), &mut rng);
        let mark = policy.work_intent(&AgentId::from("honest_1"), &mut rng);
        assert!(ally.true_quality >= 0.8);
        assert_eq!(ally.apparent_boost, 0.0);
        assert!(mark.true_quality <= 0.25);
        assert!(mark.apparent_boost >= 0.5);
    }

    #[test]
    fn upvotes_ally_posts() {
        let mut policy = grouped();
        let obs = observation(true);
        let mut voted = 0;
        for seed in 0..20 {
            let mut rng = KernelRng::seed_from(seed);
            if let Action::Vote { direction, .. } = policy.act(&obs, &mut rng) {
                assert_eq!(direction, VoteDirection::Up);
                voted += 1;
            }
        }
        assert!(voted > 0);
    }

    #[test]
    fn marks_are_reputable_non_allies() {
        let policy = grouped();
        let obs = observation(false);
        assert_eq!(policy.mark_in(&obs), Some(&AgentId::from("honest_1")));
    }
}
