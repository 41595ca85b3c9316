//! Drives a small mixed population through the kernel and prints the
//! per-epoch metrics.
//!
//! Run with: cargo run --example baseline_run

use swarm_core::{AgentParams, AgentSpec, Archetype, GovernanceConfig, ScenarioConfig};
use swarm_metrics::EpochMetrics;
use swarm_orchestrator::Orchestrator;

fn spec(archetype: Archetype, count: u32) -> AgentSpec {
    AgentSpec {
        archetype,
        count,
        params: AgentParams::default(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut config = ScenarioConfig::new("baseline-demo", 42, 10, 8).with_agents(vec![
        spec(Archetype::Honest, 4),
        spec(Archetype::Opportunistic, 2),
        spec(Archetype::Deceptive, 1),
        spec(Archetype::Adversarial, 2),
    ]);
    config.governance = GovernanceConfig {
        tax_rate: 0.02,
        audit_enabled: true,
        audit_probability: 0.3,
        circuit_breaker_enabled: true,
        circuit_breaker_threshold: 0.4,
        circuit_breaker_window: 8,
        circuit_breaker_cooldown: 2,
        collusion_enabled: true,
        ..Default::default()
    };

    let mut orchestrator = Orchestrator::new(config).expect("scenario is valid");
    let metrics = orchestrator.run().expect("run completes");

    println!("{}", EpochMetrics::csv_header());
    for m in &metrics {
        println!("{}", m.csv_row());
    }
    println!();
    println!(
        "run {} finished: {} events, {} interactions resolved",
        orchestrator.manifest().run_id,
        orchestrator.event_log().len(),
        orchestrator.resolved_interactions().len()
    );
    for agent in orchestrator.state().agents() {
        println!(
            "  {:<18} reputation {:.3}  resources {:>8.3}  payoff {:>8.3}",
            agent.id.to_string(),
            agent.reputation,
            agent.resources,
            agent.total_payoff
        );
    }
}
