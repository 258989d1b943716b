//! Engine wiring shared by the backtest engine and the live node

use std::cell::RefCell;
use std::rc::Rc;

use tessera_cache::{Cache, Portfolio};
use tessera_common::{Component, ComponentError, MessageBus};
use tessera_core::TraderId;
use tessera_data::{DataEngine, DataEngineConfig, DataEngineError};
use tessera_execution::{ExecEngineConfig, ExecutionEngine, ExecutionError};
use tessera_ports::Clock;
use tessera_risk::{RiskEngine, RiskEngineConfig, RiskError};
use tessera_strategy::{Strategy, StrategyError, StrategyRuntime, Trader};

/// Bus, cache, the three engines and the trader, built around one clock
pub struct Kernel {
    pub clock: Rc<dyn Clock>,
    pub msgbus: Rc<MessageBus>,
    pub cache: Rc<RefCell<Cache>>,
    pub portfolio: Portfolio,
    pub data_engine: Rc<DataEngine>,
    pub risk_engine: Rc<RiskEngine>,
    pub exec_engine: Rc<ExecutionEngine>,
    pub trader: Trader,
}

impl Kernel {
    pub fn new<E>(
        trader_id: TraderId,
        clock: Rc<dyn Clock>,
        data: DataEngineConfig,
        risk: RiskEngineConfig,
        exec: ExecEngineConfig,
    ) -> Result<Self, E>
    where
        E: From<DataEngineError> + From<RiskError> + From<ExecutionError> + From<ComponentError>,
    {
        let msgbus = Rc::new(MessageBus::new(trader_id, None));
        let cache = Rc::new(RefCell::new(Cache::default()));

        let data_engine = DataEngine::new(clock.clone(), cache.clone(), msgbus.clone(), data);
        data_engine.register_endpoints()?;
        let risk_engine = RiskEngine::new(clock.clone(), cache.clone(), msgbus.clone(), risk);
        risk_engine.register_endpoints()?;
        let exec_engine = ExecutionEngine::new(clock.clone(), cache.clone(), msgbus.clone(), exec);
        exec_engine.register_endpoints()?;

        let trader = Trader::new(clock.clone(), cache.clone(), msgbus.clone());
        let kernel = Self {
            portfolio: Portfolio::new(cache.clone()),
            clock,
            msgbus,
            cache,
            data_engine,
            risk_engine,
            exec_engine,
            trader,
        };
        for component in kernel.components() {
            component.initialize()?;
        }
        kernel.trader.initialize()?;
        Ok(kernel)
    }

    fn components(&self) -> [Rc<dyn Component>; 3] {
        [
            self.data_engine.clone(),
            self.risk_engine.clone(),
            self.exec_engine.clone(),
        ]
    }

    /// Register a strategy, with its position netting override if any
    pub fn add_strategy(&self, strategy: Box<dyn Strategy>) -> Result<Rc<StrategyRuntime>, StrategyError> {
        let oms_type = strategy.config().oms_type;
        let runtime = self.trader.add_strategy(strategy)?;
        if let Some(oms_type) = oms_type {
            self.exec_engine
                .register_oms_type(runtime.strategy_id().clone(), oms_type);
        }
        Ok(runtime)
    }

    /// Engines first so strategies find clients connected and state reconciled
    pub fn start(&self) -> Result<(), ComponentError> {
        for component in self.components() {
            component.start()?;
        }
        self.trader.start()
    }

    pub fn stop_trader(&self) -> Result<(), ComponentError> {
        self.trader.stop()
    }

    pub fn stop_engines(&self) -> Result<(), ComponentError> {
        for component in self.components().into_iter().rev() {
            component.stop()?;
        }
        Ok(())
    }

    pub fn reset(&self) -> Result<(), ComponentError> {
        self.trader.reset()?;
        for component in self.components() {
            component.reset()?;
        }
        Ok(())
    }

    pub fn dispose(&self) -> Result<(), ComponentError> {
        self.trader.dispose()?;
        for component in self.components() {
            component.dispose()?;
        }
        Ok(())
    }
}
