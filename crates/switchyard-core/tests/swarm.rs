//! Swarm composition wired to a live failover engine

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedTransport, Step, conversation, init_tracing, resolver, sonnet};
use switchyard_core::failover::{ExecuteOptions, FailoverConfig, FailoverEngine};
use switchyard_core::llm::TransportError;
use switchyard_core::resolver::TaskType;
use switchyard_core::swarm::{
    DistributionStrategy, StdRandomSource, SwarmComposer, SwarmConfig,
};

fn engine(transport: ScriptedTransport) -> FailoverEngine {
    init_tracing();
    let config = FailoverConfig::new("anthropic", ["openai", "google"])
        .with_retry_delay(Duration::ZERO)
        .with_max_retries(3);
    FailoverEngine::new(config, resolver(), Arc::new(transport))
}

#[tokio::test]
async fn performance_based_concentrates_on_best_vendor() {
    // anthropic goes unhealthy, openai recovers at half rate, google is untouched
    let reset = || Step::Fail(TransportError::transport("reset"));
    let transport = ScriptedTransport::new()
        .then("anthropic", vec![reset(), reset(), reset()])
        .then("openai", vec![reset()]);
    let engine = engine(transport);
    engine
        .execute_with_failover(&sonnet(), &conversation(), &ExecuteOptions::new())
        .await
        .unwrap();

    let composer = SwarmComposer::new(resolver()).with_failover_engine(engine);
    let config = SwarmConfig::new(6, TaskType::Coding)
        .with_strategy(DistributionStrategy::PerformanceBased);
    let swarm = composer.compose_swarm(&config).unwrap();

    // Health does not move during one composition, so every slot lands on one vendor
    let distribution = swarm.vendor_distribution();
    assert_eq!(distribution.len(), 1);
    assert_eq!(distribution.get("google"), Some(&6));
    assert!(swarm.agent_slots.iter().all(|s| s.model.id == "gemini-2.5-pro"));
}

#[test]
fn seeded_weighted_distribution_is_reproducible() {
    let mut weights = HashMap::new();
    weights.insert("anthropic".to_string(), 5.0);
    weights.insert("openai".to_string(), 1.0);
    weights.insert("google".to_string(), 1.0);
    let config = SwarmConfig::new(50, TaskType::Chat)
        .with_strategy(DistributionStrategy::Weighted(weights));

    let compose = || {
        SwarmComposer::new(resolver())
            .with_random_source(StdRandomSource::with_seed(42))
            .compose_swarm(&config)
            .unwrap()
    };
    let first = compose();
    let second = compose();

    let vendors = |s: &switchyard_core::swarm::Swarm| -> Vec<String> {
        s.agent_slots.iter().map(|slot| slot.vendor.clone()).collect()
    };
    assert_eq!(vendors(&first), vendors(&second));
    assert_ne!(first.swarm_id, second.swarm_id);

    let distribution = first.vendor_distribution();
    let anthropic = distribution.get("anthropic").copied().unwrap_or(0);
    assert!(anthropic > 50 / 3, "weighted vendor got {anthropic} of 50");
}
