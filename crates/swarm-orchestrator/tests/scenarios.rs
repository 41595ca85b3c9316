//! End-to-end scenarios: literal populations driven through the kernel,
//! asserting the signals each composition is expected to produce.

use swarm_core::{
    AgentParams, AgentSpec, Archetype, GovernanceConfig, ScenarioConfig,
};
use swarm_events::{to_interactions, EventKind};
use swarm_metrics::EpochMetrics;
use swarm_orchestrator::Orchestrator;

fn spec(archetype: Archetype, count: u32) -> AgentSpec {
    AgentSpec {
        archetype,
        count,
        params: AgentParams::default(),
    }
}

fn run(config: ScenarioConfig) -> (Vec<EpochMetrics>, Orchestrator) {
    let mut orchestrator = Orchestrator::new(config).expect("valid scenario");
    let metrics = orchestrator.run().expect("run completes");
    (metrics, orchestrator)
}

/// Baseline: a small honest population with governance off. A sharp
/// sigmoid keeps clean work confidently labeled.
fn baseline_config() -> ScenarioConfig {
    let mut config =
        ScenarioConfig::new("baseline", 42, 3, 5).with_agents(vec![spec(Archetype::Honest, 3)]);
    config.proxy.k = 8.0;
    config.governance = GovernanceConfig {
        tax_rate: 0.0,
        audit_enabled: false,
        circuit_breaker_enabled: false,
        ..Default::default()
    };
    config
}

#[test]
fn s1_baseline_honest_population_stays_clean() {
    let (metrics, orchestrator) = run(baseline_config());
    assert_eq!(metrics.len(), 3);
    let bound = orchestrator.config().honest_error_bound;
    for m in &metrics {
        assert!(
            m.toxicity_rate <= bound,
            "epoch {} toxicity {} above bound {}",
            m.epoch,
            m.toxicity_rate,
            bound
        );
    }
    let welfare: f64 = metrics.iter().map(|m| m.total_welfare).sum();
    assert!(welfare > 0.0, "honest population generated no welfare");
}

#[test]
fn s1_baseline_event_log_is_stable() {
    let fingerprint = |o: &Orchestrator| {
        o.event_log()
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    };
    let (_, a) = run(baseline_config());
    let (_, b) = run(baseline_config());
    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn s2_adversarial_majority_degrades_selection_quality() {
    let config = ScenarioConfig::new("collapse", 7, 10, 10).with_agents(vec![
        spec(Archetype::Honest, 2),
        spec(Archetype::Adversarial, 4),
    ]);
    let (metrics, _) = run(config);
    assert_eq!(metrics.len(), 10);

    // the ring's misrepresented proposals pollute the accepted pool while
    // stonewalled honest proposals lift the rejected pool: the quality gap
    // must not improve, and late selection shows little separation
    let early: f64 = metrics[..3].iter().map(|m| m.quality_gap).sum::<f64>() / 3.0;
    let late: f64 = metrics[7..].iter().map(|m| m.quality_gap).sum::<f64>() / 3.0;
    assert!(
        late <= early + 0.05,
        "quality gap improved under an adversarial majority: early {early}, late {late}"
    );
    let late_min = metrics[5..]
        .iter()
        .map(|m| m.quality_gap)
        .fold(f64::INFINITY, f64::min);
    assert!(
        late_min <= 0.25,
        "no epoch after 5 showed degraded selection: min gap {late_min}"
    );

    // an adversarial majority is visibly more toxic than an honest room
    let mean_toxicity: f64 =
        metrics.iter().map(|m| m.toxicity_rate).sum::<f64>() / metrics.len() as f64;
    assert!(mean_toxicity > 0.15, "toxicity {mean_toxicity}");
}

#[test]
fn s3_circuit_breaker_freezes_a_deceptive_agent() {
    let mut config = ScenarioConfig::new("breaker", 123, 6, 6).with_agents(vec![
        spec(Archetype::Honest, 3),
        spec(Archetype::Deceptive, 2),
    ]);
    config.governance = GovernanceConfig {
        circuit_breaker_enabled: true,
        circuit_breaker_threshold: 0.3,
        circuit_breaker_window: 5,
        circuit_breaker_cooldown: 3,
        ..Default::default()
    };
    let (_, orchestrator) = run(config);

    let deceptive_freezes: Vec<_> = orchestrator
        .event_log()
        .of_kind(EventKind::AgentFrozen)
        .filter(|e| e.payload["agent"].as_str().unwrap().starts_with("deceptive"))
        .map(|e| {
            (
                e.seq,
                e.payload["agent"].as_str().unwrap().to_string(),
                e.payload["until_epoch"].as_u64().unwrap(),
            )
        })
        .collect();
    assert!(
        deceptive_freezes.iter().any(|(_, _, until)| *until <= 5 + 3),
        "no deceptive agent froze by epoch 5: {deceptive_freezes:?}"
    );

    // no actions from a frozen agent inside its cooldown window
    for event in orchestrator.event_log().of_kind(EventKind::ActionEmitted) {
        let actor = event.payload["agent"].as_str().unwrap();
        for (freeze_seq, agent, until) in &deceptive_freezes {
            if actor == agent {
                assert!(
                    !(event.seq > *freeze_seq && event.epoch < *until),
                    "{agent} acted during cooldown at seq {}",
                    event.seq
                );
            }
        }
    }
}

#[test]
fn s4_replayed_log_reproduces_live_toxicity() {
    let dir = std::env::temp_dir().join(format!("swarm-replay-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut orchestrator = Orchestrator::with_run_dir(baseline_config(), &dir).unwrap();
    let live_metrics = orchestrator.run().unwrap();

    let events = swarm_events::read_jsonl(dir.join("events.jsonl")).unwrap();
    let replayed = to_interactions(&events).unwrap();
    assert_eq!(replayed, orchestrator.resolved_interactions());

    for live in &live_metrics {
        let epoch_interactions: Vec<_> = replayed
            .iter()
            .filter(|i| i.epoch == live.epoch)
            .cloned()
            .collect();
        let replayed_toxicity = swarm_metrics::toxicity_rate(&epoch_interactions);
        assert!(
            (replayed_toxicity - live.toxicity_rate).abs() < 1e-12,
            "epoch {}: replay {} vs live {}",
            live.epoch,
            replayed_toxicity,
            live.toxicity_rate
        );
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn s5_certain_audits_separate_deceptive_reputation() {
    let mut config = ScenarioConfig::new("audit", 5, 8, 6).with_agents(vec![
        spec(Archetype::Honest, 1),
        spec(Archetype::Deceptive, 1),
    ]);
    config.governance = GovernanceConfig {
        audit_enabled: true,
        audit_probability: 1.0,
        audit_divergence_threshold: 0.25,
        audit_penalty: 0.5,
        ..Default::default()
    };
    let (_, orchestrator) = run(config);

    assert!(
        orchestrator.resolved_interactions().len() >= 20,
        "only {} interactions resolved",
        orchestrator.resolved_interactions().len()
    );
    let reputation = |prefix: &str| {
        orchestrator
            .state()
            .agents()
            .find(|a| a.id.as_str().starts_with(prefix))
            .map(|a| a.reputation)
            .expect("agent exists")
    };
    let honest = reputation("honest");
    let deceptive = reputation("deceptive");
    assert!(
        honest - deceptive >= 0.2,
        "honest {honest} vs deceptive {deceptive}"
    );
    assert!(
        orchestrator.event_log().count_kind(EventKind::AuditExecuted) > 0,
        "no audits executed"
    );
}

#[test]
fn s6_coordinated_adversarials_get_flagged() {
    let mut config = ScenarioConfig::new("collusion", 11, 30, 5).with_agents(vec![
        spec(Archetype::Honest, 3),
        AgentSpec {
            archetype: Archetype::Adversarial,
            count: 2,
            params: AgentParams {
                group_id: Some("ring".to_string()),
                ..Default::default()
            },
        },
    ]);
    config.governance = GovernanceConfig {
        collusion_enabled: true,
        collusion_window: 20,
        collusion_correlation_threshold: 0.7,
        ..Default::default()
    };
    let (_, orchestrator) = run(config);

    let adversarial_pair_flagged = orchestrator
        .event_log()
        .of_kind(EventKind::CollusionFlagged)
        .any(|e| {
            let pair = e.payload["pair"].as_array().unwrap();
            pair.iter()
                .all(|id| id.as_str().unwrap().starts_with("adversarial"))
        });
    assert!(
        adversarial_pair_flagged,
        "the adversarial pair was never flagged"
    );
}
