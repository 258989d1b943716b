use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tessera_cache::Cache;
use tessera_common::{Component, ComponentCore, ComponentError, MessageBus};
use tessera_core::{StrategyId, TraderId};
use tessera_ports::Clock;

use crate::error::{Result, StrategyError};
use crate::runtime::StrategyRuntime;
use crate::strategy::Strategy;

/// Owns the strategies of one trader and drives their lifecycles together
///
/// Strategies are kept in id order so start/stop fan-out is reproducible.
pub struct Trader {
    core: ComponentCore,
    clock: Rc<dyn Clock>,
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    strategies: RefCell<BTreeMap<StrategyId, Rc<StrategyRuntime>>>,
}

impl Trader {
    pub fn new(clock: Rc<dyn Clock>, cache: Rc<RefCell<Cache>>, msgbus: Rc<MessageBus>) -> Self {
        Self {
            core: ComponentCore::new(format!("Trader-{}", msgbus.trader_id())),
            clock,
            cache,
            msgbus,
            strategies: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn trader_id(&self) -> &TraderId {
        self.msgbus.trader_id()
    }

    /// Wrap a strategy in a runtime and register it
    ///
    /// The runtime is initialized immediately and started when the trader is
    /// already running.
    pub fn add_strategy(&self, strategy: Box<dyn Strategy>) -> Result<Rc<StrategyRuntime>> {
        let strategy_id = strategy.strategy_id().clone();
        if self.strategies.borrow().contains_key(&strategy_id) {
            log::error!("Rejected strategy: strategy_id={strategy_id}, reason=duplicate");
            return Err(StrategyError::DuplicateStrategy(strategy_id));
        }
        let runtime = StrategyRuntime::new(
            strategy,
            self.clock.clone(),
            self.cache.clone(),
            self.msgbus.clone(),
        );
        runtime.initialize()?;
        self.strategies
            .borrow_mut()
            .insert(strategy_id.clone(), runtime.clone());
        log::info!("Added strategy: strategy_id={strategy_id}");

        if self.is_running() {
            runtime.start()?;
        }
        Ok(runtime)
    }

    /// Stop, dispose and drop a strategy
    pub fn remove_strategy(&self, strategy_id: &StrategyId) -> Result<()> {
        let runtime = self
            .strategies
            .borrow_mut()
            .remove(strategy_id)
            .ok_or_else(|| StrategyError::StrategyNotFound(strategy_id.clone()))?;
        runtime.stop()?;
        runtime.dispose()?;
        log::info!("Removed strategy: strategy_id={strategy_id}");
        Ok(())
    }

    pub fn strategy(&self, strategy_id: &StrategyId) -> Option<Rc<StrategyRuntime>> {
        self.strategies.borrow().get(strategy_id).cloned()
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.strategies.borrow().keys().cloned().collect()
    }

    pub fn strategies(&self) -> Vec<Rc<StrategyRuntime>> {
        self.strategies.borrow().values().cloned().collect()
    }

    fn for_each<F>(&self, action: &str, f: F) -> anyhow::Result<()>
    where
        F: Fn(&StrategyRuntime) -> std::result::Result<(), ComponentError>,
    {
        // Snapshot so a strategy may add or remove strategies from a hook
        for runtime in self.strategies() {
            if let Err(e) = f(&runtime) {
                log::error!(
                    "Failed to {action} strategy: strategy_id={}, error={e}",
                    runtime.strategy_id()
                );
            }
        }
        Ok(())
    }
}

impl Component for Trader {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn on_start(&self) -> anyhow::Result<()> {
        self.for_each("start", |s| s.start())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        self.for_each("stop", |s| s.stop())
    }

    fn on_resume(&self) -> anyhow::Result<()> {
        self.for_each("resume", |s| s.resume())
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        self.for_each("reset", |s| s.reset())
    }

    fn on_dispose(&self) -> anyhow::Result<()> {
        self.for_each("dispose", |s| s.dispose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_clock::TestClock;
    use tessera_common::ComponentState;
    use tessera_core::stubs;

    use crate::strategy::StrategyConfig;

    struct Idle(StrategyConfig);

    impl Strategy for Idle {
        fn config(&self) -> &StrategyConfig {
            &self.0
        }
    }

    fn trader() -> Trader {
        let clock = Rc::new(TestClock::new(stubs::ts(0)));
        let msgbus = Rc::new(MessageBus::new(stubs::trader_id(), None));
        Trader::new(clock, Rc::new(RefCell::new(Cache::default())), msgbus)
    }

    #[test]
    fn test_duplicate_strategy_is_rejected() {
        let trader = trader();
        trader.add_strategy(Box::new(Idle(StrategyConfig::new("A-001")))).unwrap();
        let err = trader
            .add_strategy(Box::new(Idle(StrategyConfig::new("A-001"))))
            .err().unwrap();
        assert!(matches!(err, StrategyError::DuplicateStrategy(_)));
        assert_eq!(trader.strategy_ids().len(), 1);
    }

    #[test]
    fn test_lifecycle_fans_out_in_id_order() {
        let trader = trader();
        trader.add_strategy(Box::new(Idle(StrategyConfig::new("B-002")))).unwrap();
        trader.add_strategy(Box::new(Idle(StrategyConfig::new("A-001")))).unwrap();
        assert_eq!(
            trader.strategy_ids(),
            vec![StrategyId::new("A-001"), StrategyId::new("B-002")]
        );

        trader.initialize().unwrap();
        trader.start().unwrap();
        assert!(trader.strategies().iter().all(|s| s.is_running()));

        // Added while running: started on the spot
        let late = trader.add_strategy(Box::new(Idle(StrategyConfig::new("C-003")))).unwrap();
        assert!(late.is_running());

        trader.stop().unwrap();
        assert!(
            trader
                .strategies()
                .iter()
                .all(|s| s.state() == ComponentState::Stopped)
        );
    }

    #[test]
    fn test_remove_unknown_strategy() {
        let trader = trader();
        let err = trader.remove_strategy(&StrategyId::new("X-001")).unwrap_err();
        assert!(matches!(err, StrategyError::StrategyNotFound(_)));
    }
}
