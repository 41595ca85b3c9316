//! Circuit breaker: windowed toxicity threshold
//!
//! Tracks the last `window` values of `1 - p` per initiator. Once the
//! window is full and its mean exceeds the threshold, the agent trips the
//! breaker. The tracker clears on trip so a returning agent starts from an
//! empty window instead of instantly re-freezing.

use std::collections::{BTreeMap, VecDeque};

use swarm_core::AgentId;

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    window: usize,
    threshold: f64,
    history: BTreeMap<AgentId, VecDeque<f64>>,
}

impl CircuitBreaker {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window,
            threshold,
            history: BTreeMap::new(),
        }
    }

    /// Record one toxicity observation for `agent`. Returns true if the
    /// breaker trips on this observation.
    pub fn observe(&mut self, agent: &AgentId, toxicity: f64) -> bool {
        let buf = self.history.entry(agent.clone()).or_default();
        buf.push_back(toxicity);
        while buf.len() > self.window {
            buf.pop_front();
        }
        if buf.len() < self.window {
            return false;
        }
        let mean = buf.iter().sum::<f64>() / buf.len() as f64;
        if mean > self.threshold {
            self.history.remove(agent);
            true
        } else {
            false
        }
    }

    /// Rolling mean toxicity for an agent, 0 when unobserved.
    pub fn rolling_toxicity(&self, agent: &AgentId) -> f64 {
        match self.history.get(agent) {
            Some(buf) if !buf.is_empty() => buf.iter().sum::<f64>() / buf.len() as f64,
            _ => 0.0,
        }
    }
}
