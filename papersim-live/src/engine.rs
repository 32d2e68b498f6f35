//! Async dry-run engine: simulated prices on a live clock.
//!
//! All mutable state lives in one [`SimState`] behind a single
//! `tokio::sync::Mutex`, shared between the public API and the background
//! fill monitor. The lock is taken per operation and per monitor tick and is
//! never held across an await, so submissions and the monitor interleave but
//! every individual operation is atomic. Each order reaches exactly one
//! terminal state: a cancel and a fill racing on the same order resolve to
//! whichever takes the lock first, and the loser gets an error.

use crate::monitor::FillMonitor;
use chrono::Utc;
use papersim_core::engine::{settle_fill, validate_balances, validate_limit_price, validate_size};
use papersim_core::{
    CostModel, ExecutionError, InvalidProduct, Ledger, Order, OrderId, OrderIdGen, OrderRegistry,
    OrderStatus, OrderType, PerformanceMetrics, PriceSimulator, ProductId, SeedTree, SetupError,
    Side, SimulationStats, TradeRecord, TransitionEvent, ValuationPoint, WalkConfig,
};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SLIPPAGE_STREAM: &str = "slippage";
const PRICE_WALK_STREAM: &str = "price-walk";
const FILL_MONITOR_STREAM: &str = "fill-monitor";

/// Dry-run behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct DryRunConfig {
    pub walk: WalkConfig,
    /// Cadence of the price walk and fill monitor.
    pub tick_interval: Duration,
    /// Probability that a crossed limit order fills on a given tick.
    pub fill_probability: f64,
    /// Artificial delay applied to every submission.
    pub simulated_latency: Duration,
}

impl Default for DryRunConfig {
    fn default() -> Self {
        Self {
            walk: WalkConfig::default(),
            tick_interval: Duration::from_secs(1),
            fill_probability: 0.9,
            simulated_latency: Duration::ZERO,
        }
    }
}

/// All mutable simulation state, guarded by one mutex.
pub(crate) struct SimState {
    quote: String,
    ledger: Ledger,
    registry: OrderRegistry,
    id_gen: OrderIdGen,
    simulator: PriceSimulator,
    trades: Vec<TradeRecord>,
    valuations: Vec<ValuationPoint>,
    stats: SimulationStats,
    halted: bool,
    costs: CostModel,
    walk: WalkConfig,
    seeds: SeedTree,
    slippage_rng: StdRng,
    fill_rng: StdRng,
    initial_balances: HashMap<String, f64>,
    initial_prices: BTreeMap<ProductId, f64>,
}

impl SimState {
    fn new(
        costs: CostModel,
        walk: WalkConfig,
        initial_balances: HashMap<String, f64>,
        initial_prices: BTreeMap<ProductId, f64>,
        seed: u64,
    ) -> Self {
        let quote = initial_prices
            .keys()
            .next()
            .map(|p| p.quote().to_string())
            .unwrap_or_default();
        let seeds = SeedTree::new(seed);
        let slippage_rng = seeds.stream(SLIPPAGE_STREAM);
        let fill_rng = seeds.stream(FILL_MONITOR_STREAM);
        let simulator = PriceSimulator::new(
            walk,
            initial_prices.clone(),
            seeds.stream(PRICE_WALK_STREAM),
        );
        let mut state = Self {
            quote,
            ledger: Ledger::new(initial_balances.clone()),
            registry: OrderRegistry::new(),
            id_gen: OrderIdGen::default(),
            simulator,
            trades: Vec::new(),
            valuations: Vec::new(),
            stats: SimulationStats::default(),
            halted: false,
            costs,
            walk,
            seeds,
            slippage_rng,
            fill_rng,
            initial_balances,
            initial_prices,
        };
        state.record_valuation();
        state
    }

    /// Portfolio value in the common quote currency at current simulated
    /// prices.
    fn portfolio_value(&self) -> f64 {
        let prices: HashMap<&str, f64> = self
            .simulator
            .prices()
            .iter()
            .map(|(product, price)| (product.base(), *price))
            .collect();
        self.ledger
            .value_in(&self.quote, |currency| prices.get(currency).copied())
    }

    fn record_valuation(&mut self) {
        self.valuations.push(ValuationPoint {
            timestamp: Utc::now(),
            value: self.portfolio_value(),
        });
    }

    /// Shared submission gate. Every call counts as an attempt; every
    /// failure (halt included) counts as a rejection, so the stats always
    /// reconcile with the call history. Unknown products read as invalid.
    fn admit(
        &mut self,
        product: &str,
        side: &str,
        size: f64,
        limit_price: Option<f64>,
    ) -> Result<(ProductId, Side, f64), ExecutionError> {
        self.stats.orders_attempted += 1;
        let result = (|| {
            if self.halted {
                return Err(ExecutionError::TradingHalted);
            }
            validate_size(size)?;
            if let Some(limit_price) = limit_price {
                validate_limit_price(limit_price)?;
            }
            let side: Side = side.parse()?;
            let product: ProductId = product.parse()?;
            let price = self
                .simulator
                .price(&product)
                .ok_or_else(|| InvalidProduct(product.to_string()))?;
            Ok((product, side, price))
        })();
        if result.is_err() {
            self.stats.orders_rejected += 1;
        }
        result
    }

    pub(crate) fn submit_market(
        &mut self,
        product: &str,
        side: &str,
        size: f64,
    ) -> Result<Order, ExecutionError> {
        let (product, side, reference_price) = self.admit(product, side, size, None)?;
        let order = Order::new(
            self.id_gen.next_id(),
            product,
            side,
            OrderType::Market,
            size,
            Utc::now(),
        );
        let price = papersim_core::execution::simulate_execution_price(
            reference_price,
            self.costs.slippage_std,
            &mut self.slippage_rng,
        );
        self.fill(order, price)
    }

    pub(crate) fn submit_limit(
        &mut self,
        product: &str,
        side: &str,
        size: f64,
        limit_price: f64,
    ) -> Result<Order, ExecutionError> {
        let (product, side, _reference_price) = self.admit(product, side, size, Some(limit_price))?;
        let order = Order::new(
            self.id_gen.next_id(),
            product,
            side,
            OrderType::Limit { limit_price },
            size,
            Utc::now(),
        );
        self.registry.insert(order.clone());
        self.registry.mark_open(order.id)?;
        debug!(order_id = %order.id, %limit_price, "limit order resting");
        self.registry
            .get(order.id)
            .cloned()
            .ok_or(ExecutionError::OrderNotFound(order.id))
    }

    pub(crate) fn cancel(&mut self, id: OrderId) -> Result<(), ExecutionError> {
        match self.registry.status(id)? {
            OrderStatus::Open | OrderStatus::Pending => {
                self.registry.mark_cancelled(id, "cancelled by user")?;
                info!(order_id = %id, "order cancelled");
                Ok(())
            }
            status => Err(ExecutionError::OrderNotCancellable {
                id,
                status: status.to_string(),
            }),
        }
    }

    fn fill(&mut self, order: Order, execution_price: f64) -> Result<Order, ExecutionError> {
        let fee =
            papersim_core::execution::compute_fee(order.size, execution_price, self.costs.fee_rate);
        let id = order.id;
        self.registry.insert(order.clone());
        if let Err(err) = settle_fill(
            &mut self.ledger,
            &order.product,
            order.side,
            order.size,
            execution_price,
            fee,
        ) {
            warn!(order_id = %id, error = %err, "order rejected");
            self.registry.mark_rejected(id, &err.to_string())?;
            self.stats.orders_rejected += 1;
            return Err(err.into());
        }
        self.registry
            .mark_filled(id, execution_price, fee, Utc::now())?;
        self.stats.orders_filled += 1;
        self.record_trade(id, execution_price, fee);
        info!(order_id = %id, price = %execution_price, "order filled");
        self.registry
            .get(id)
            .cloned()
            .ok_or(ExecutionError::OrderNotFound(id))
    }

    fn fill_resting(&mut self, order: Order, execution_price: f64) {
        let fee =
            papersim_core::execution::compute_fee(order.size, execution_price, self.costs.fee_rate);
        match settle_fill(
            &mut self.ledger,
            &order.product,
            order.side,
            order.size,
            execution_price,
            fee,
        ) {
            Ok(()) => {
                if self
                    .registry
                    .mark_filled(order.id, execution_price, fee, Utc::now())
                    .is_ok()
                {
                    self.stats.orders_filled += 1;
                    self.record_trade(order.id, execution_price, fee);
                    info!(order_id = %order.id, price = %execution_price, "limit order filled");
                }
            }
            Err(err) => {
                if self.registry.mark_rejected(order.id, &err.to_string()).is_ok() {
                    self.stats.orders_rejected += 1;
                    warn!(order_id = %order.id, error = %err, "limit order rejected at fill");
                }
            }
        }
    }

    fn record_trade(&mut self, id: OrderId, execution_price: f64, fee: f64) {
        if let Some(order) = self.registry.get(id) {
            self.trades.push(TradeRecord {
                timestamp: Utc::now(),
                order_id: order.id,
                product: order.product.clone(),
                side: order.side,
                order_type: order.order_type,
                size: order.size,
                execution_price,
                fee,
                portfolio_value: self.portfolio_value(),
            });
        }
    }

    /// One monitor tick: walk prices, then try to fill crossed limit orders
    /// with the configured probability, then record a valuation point.
    /// Fills keep resolving while trading is halted; the halt gates
    /// submissions only.
    pub(crate) fn tick(&mut self, fill_probability: f64) {
        self.simulator.tick();
        for id in self.registry.open_order_ids() {
            let Some(order) = self.registry.get(id).cloned() else {
                continue;
            };
            let Some(limit_price) = order.order_type.limit_price() else {
                continue;
            };
            let Some(price) = self.simulator.price(&order.product) else {
                continue;
            };
            let crossed = match order.side {
                Side::Buy => price <= limit_price,
                Side::Sell => price >= limit_price,
            };
            if crossed && self.fill_rng.gen::<f64>() < fill_probability {
                self.fill_resting(order, limit_price);
            }
        }
        self.record_valuation();
        self.stats.ticks += 1;
    }

    fn reset(&mut self) {
        self.ledger = Ledger::new(self.initial_balances.clone());
        self.registry.clear();
        self.id_gen = OrderIdGen::default();
        self.trades.clear();
        self.valuations.clear();
        self.stats = SimulationStats::default();
        self.halted = false;
        self.simulator = PriceSimulator::new(
            self.walk,
            self.initial_prices.clone(),
            self.seeds.stream(PRICE_WALK_STREAM),
        );
        self.slippage_rng = self.seeds.stream(SLIPPAGE_STREAM);
        self.fill_rng = self.seeds.stream(FILL_MONITOR_STREAM);
        self.record_valuation();
    }
}

/// Paper-trading engine driven by a synthetic price walk on a live clock.
///
/// Cheap to share: callers hold it behind `&self` for everything except
/// starting and stopping the monitor.
pub struct DryRunEngine {
    state: Arc<Mutex<SimState>>,
    config: DryRunConfig,
    monitor: Option<FillMonitor>,
}

impl DryRunEngine {
    /// Validate configuration and build the engine. All products must quote
    /// in the same currency, and every product's base currency plus the
    /// shared quote currency must appear in the initial balances. The
    /// monitor is not started yet; call [`start`].
    ///
    /// [`start`]: DryRunEngine::start
    pub fn new(
        costs: CostModel,
        config: DryRunConfig,
        initial_balances: HashMap<String, f64>,
        initial_prices: HashMap<ProductId, f64>,
        seed: u64,
    ) -> Result<Self, SetupError> {
        if initial_prices.is_empty() {
            return Err(SetupError::NoProducts);
        }
        let prices: BTreeMap<ProductId, f64> = initial_prices.into_iter().collect();
        let mut quotes = prices.keys().map(|p| p.quote());
        let first = quotes.next().unwrap_or_default();
        if let Some(second) = quotes.find(|quote| *quote != first) {
            return Err(SetupError::MixedQuoteCurrencies {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
        for (product, price) in &prices {
            if !price.is_finite() || *price <= 0.0 {
                return Err(SetupError::InvalidInitialPrice {
                    product: product.to_string(),
                    price: *price,
                });
            }
        }
        let required: Vec<&str> = prices
            .keys()
            .map(|product| product.base())
            .chain(std::iter::once(first))
            .collect();
        validate_balances(&initial_balances, &required)?;

        let state = SimState::new(costs, config.walk, initial_balances, prices, seed);
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            config,
            monitor: None,
        })
    }

    /// Spawn the background fill monitor. Idempotent.
    pub fn start(&mut self) {
        if self.monitor.is_none() {
            self.monitor = Some(FillMonitor::spawn(
                Arc::clone(&self.state),
                self.config.tick_interval,
                self.config.fill_probability,
            ));
        }
    }

    /// Stop the monitor and wait for its task to finish. Engine state and
    /// resting orders survive; trading itself is not halted.
    pub async fn stop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_some()
    }

    async fn simulate_latency(&self) {
        if !self.config.simulated_latency.is_zero() {
            tokio::time::sleep(self.config.simulated_latency).await;
        }
    }

    /// Fill a market order against the current simulated price, slippage
    /// applied, after the configured latency.
    pub async fn execute_market_order(
        &self,
        product: &str,
        side: &str,
        size: f64,
    ) -> Result<Order, ExecutionError> {
        self.simulate_latency().await;
        self.state.lock().await.submit_market(product, side, size)
    }

    /// Admit a limit order. The ledger is untouched until the monitor fills
    /// it; an already-crossed limit fills on the next monitor tick.
    pub async fn execute_limit_order(
        &self,
        product: &str,
        side: &str,
        size: f64,
        limit_price: f64,
    ) -> Result<Order, ExecutionError> {
        self.simulate_latency().await;
        self.state
            .lock()
            .await
            .submit_limit(product, side, size, limit_price)
    }

    pub async fn cancel_order(&self, id: OrderId) -> Result<(), ExecutionError> {
        self.state.lock().await.cancel(id)
    }

    pub async fn get_order_status(&self, id: OrderId) -> Result<OrderStatus, ExecutionError> {
        self.state.lock().await.registry.status(id)
    }

    pub async fn get_order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.registry.get(id).cloned()
    }

    pub async fn get_trade_history(&self) -> Vec<TradeRecord> {
        self.state.lock().await.trades.clone()
    }

    pub async fn valuation_history(&self) -> Vec<ValuationPoint> {
        self.state.lock().await.valuations.clone()
    }

    /// Every order lifecycle transition this run, oldest first.
    pub async fn audit_trail(&self) -> Vec<TransitionEvent> {
        self.state.lock().await.registry.audit_trail().to_vec()
    }

    /// `None` until the first fill.
    pub async fn get_performance_metrics(&self) -> Option<PerformanceMetrics> {
        let state = self.state.lock().await;
        PerformanceMetrics::compute(&state.trades, &state.valuations)
    }

    pub async fn get_simulation_stats(&self) -> SimulationStats {
        let state = self.state.lock().await;
        SimulationStats {
            limit_orders_open: state.registry.open_count() as u64,
            ..state.stats
        }
    }

    /// Stop accepting new orders. The monitor keeps resolving resting limit
    /// orders.
    pub async fn halt_trading(&self, reason: &str) {
        self.state.lock().await.halted = true;
        info!(reason, "trading halted");
    }

    pub async fn resume_trading(&self, reason: &str) {
        self.state.lock().await.halted = false;
        info!(reason, "trading resumed");
    }

    pub async fn is_halted(&self) -> bool {
        self.state.lock().await.halted
    }

    /// Return to the exact post-construction state: initial balances and
    /// prices, empty history, fresh IDs, reseeded RNG streams. The monitor,
    /// if running, keeps ticking against the reset state.
    pub async fn reset(&self) {
        self.state.lock().await.reset();
        info!("simulation reset");
    }

    /// Pin a product's simulated price. The walk continues from the new
    /// value on the next tick.
    pub async fn set_simulated_price(
        &self,
        product: &str,
        price: f64,
    ) -> Result<(), ExecutionError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(ExecutionError::InvalidPrice(price));
        }
        let product: ProductId = product.parse()?;
        let mut state = self.state.lock().await;
        if state.simulator.price(&product).is_none() {
            return Err(InvalidProduct(product.to_string()).into());
        }
        state.simulator.set_price(product, price);
        Ok(())
    }

    pub async fn get_simulated_price(&self, product: &str) -> Result<f64, ExecutionError> {
        let product: ProductId = product.parse()?;
        self.state
            .lock()
            .await
            .simulator
            .price(&product)
            .ok_or_else(|| InvalidProduct(product.to_string()).into())
    }

    pub async fn get_simulated_balance(&self, currency: &str) -> f64 {
        self.state.lock().await.ledger.available(currency)
    }

    pub async fn get_simulated_balances(&self) -> HashMap<String, f64> {
        self.state.lock().await.ledger.balances().clone()
    }

    pub async fn portfolio_value(&self) -> f64 {
        self.state.lock().await.portfolio_value()
    }
}
