//! SWARM Agents - the behavioral policies the kernel schedules
//!
//! Policies are plain decision objects: the orchestrator hands each one an
//! [`Observation`] plus the kernel RNG and receives an `Action`. Policies
//! never touch environment state; everything they know arrives through the
//! observation, and everything they do goes back through the action.
//!
//! The deciding rule per archetype:
//!
//! - **Honest** cooperates and accepts when the estimated label clears 0.4
//! - **Opportunistic** cherry-picks reputable partners, accepts at 0.2 or
//!   with a 30% coin flip, and sometimes defects on submissions
//! - **Deceptive** plays honest for its first `T ~ Uniform{3..=8}`
//!   interactions, then exploits its highest-trust partners
//! - **Adversarial** targets honest agents and coordinates with its group
//! - **ExternalProxy** delegates to an out-of-process policy under a hard
//!   timeout

pub mod adversarial;
pub mod deceptive;
pub mod external;
pub mod honest;
pub mod observation;
pub mod opportunistic;
pub mod policy;

pub use adversarial::AdversarialPolicy;
pub use deceptive::DeceptivePolicy;
pub use external::{CallbackProxy, DeclaredPolicy, ExternalProxyAgent, ProxyPolicy};
pub use honest::HonestPolicy;
pub use observation::{Observation, PeerInfo, PostView, ProposalView, SelfView, TaskView};
pub use opportunistic::OpportunisticPolicy;
pub use policy::{AgentPolicy, WorkIntent};
