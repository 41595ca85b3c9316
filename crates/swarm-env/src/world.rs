//! Feed posts and the task pool

use serde::{Deserialize, Serialize};
use swarm_core::{AgentId, PostId, TaskId};

/// A post on the shared feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: AgentId,
    pub content: String,
    pub epoch: u64,
    /// Weighted vote score; governance may normalize individual weights.
    pub score: f64,
}

/// Work submitted against a claimed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub author: AgentId,
    /// Latent work quality in [0, 1]; only audits see it directly.
    pub quality: f64,
}

/// One unit of work in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub reward: f64,
    pub claimer: Option<AgentId>,
    pub submission: Option<Submission>,
    pub verified: Option<bool>,
}

impl Task {
    pub fn open(id: TaskId, reward: f64) -> Self {
        Self {
            id,
            reward,
            claimer: None,
            submission: None,
            verified: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.claimer.is_none()
    }

    pub fn awaiting_verification(&self) -> bool {
        self.submission.is_some() && self.verified.is_none()
    }
}
