//! Replay engine: deterministic execution over a historical candle series.
//!
//! Simulated time is the candle clock. `step()` advances one candle,
//! resolves resting limit orders against the new candle's range, and records
//! a valuation point. Market orders execute immediately against the current
//! candle's close. Under a fixed seed and fixed call sequence a run is
//! bit-reproducible.

use super::{
    settle_fill, validate_balances, validate_limit_price, validate_size, ExecutionError,
    OrderRegistry, SetupError, SimulationStats, TransitionEvent,
};
use crate::domain::{
    Candle, CandleSeries, Ledger, Order, OrderId, OrderIdGen, OrderStatus, OrderType, ProductId,
    Side, TradeRecord, ValuationPoint,
};
use crate::execution::{compute_fee, simulate_execution_price, CostModel};
use crate::market::CandleCursor;
use crate::metrics::PerformanceMetrics;
use crate::rng::SeedTree;
use rand::rngs::StdRng;
use std::collections::HashMap;

const SLIPPAGE_STREAM: &str = "slippage";

/// Everything needed to start a replay run.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub product: ProductId,
    pub series: CandleSeries,
    /// Starting balances per currency. Must include the product's base and
    /// quote currency (zero is fine).
    pub initial_balances: HashMap<String, f64>,
    pub costs: CostModel,
    pub seed: u64,
}

/// Single-product execution engine over historical candles.
#[derive(Debug)]
pub struct ReplayEngine {
    product: ProductId,
    cursor: CandleCursor,
    ledger: Ledger,
    registry: OrderRegistry,
    id_gen: OrderIdGen,
    trades: Vec<TradeRecord>,
    valuations: Vec<ValuationPoint>,
    stats: SimulationStats,
    halted: bool,
    halt_reason: Option<String>,
    costs: CostModel,
    seeds: SeedTree,
    slippage_rng: StdRng,
    initial_balances: HashMap<String, f64>,
}

impl ReplayEngine {
    pub fn new(config: ReplayConfig) -> Result<Self, SetupError> {
        validate_balances(
            &config.initial_balances,
            &[config.product.base(), config.product.quote()],
        )?;
        let seeds = SeedTree::new(config.seed);
        let slippage_rng = seeds.stream(SLIPPAGE_STREAM);
        let mut engine = Self {
            product: config.product,
            cursor: CandleCursor::new(config.series),
            ledger: Ledger::new(config.initial_balances.clone()),
            registry: OrderRegistry::new(),
            id_gen: OrderIdGen::default(),
            trades: Vec::new(),
            valuations: Vec::new(),
            stats: SimulationStats::default(),
            halted: false,
            halt_reason: None,
            costs: config.costs,
            seeds,
            slippage_rng,
            initial_balances: config.initial_balances,
        };
        engine.record_valuation();
        Ok(engine)
    }

    // ── Price & portfolio ──

    /// Close of the candle the cursor is on.
    pub fn current_price(&self) -> f64 {
        self.cursor.current().close
    }

    pub fn current_candle(&self) -> &Candle {
        self.cursor.current()
    }

    /// Portfolio value in quote currency at the current price.
    pub fn portfolio_value(&self) -> f64 {
        let base = self.product.base();
        let price = self.current_price();
        self.ledger.value_in(self.product.quote(), |currency| {
            (currency == base).then_some(price)
        })
    }

    pub fn balances(&self) -> &HashMap<String, f64> {
        self.ledger.balances()
    }

    // ── Order intake ──

    /// Execute a market order against the current candle's close, slippage
    /// applied. Fills or fails synchronously; on failure the ledger is
    /// untouched and the order is recorded as rejected.
    pub fn execute_market_order(
        &mut self,
        product: &str,
        side: &str,
        size: f64,
    ) -> Result<Order, ExecutionError> {
        let (product, side) = self.admit(product, side, size, None)?;
        let order = self.new_order(product, side, OrderType::Market, size);
        let price = simulate_execution_price(
            self.current_price(),
            self.costs.slippage_std,
            &mut self.slippage_rng,
        );
        self.fill(order, price)
    }

    /// Admit a limit order. No ledger mutation happens here: the order rests
    /// until a later candle crosses its limit price (resolved in `step()`).
    pub fn execute_limit_order(
        &mut self,
        product: &str,
        side: &str,
        size: f64,
        limit_price: f64,
    ) -> Result<Order, ExecutionError> {
        let (product, side) = self.admit(product, side, size, Some(limit_price))?;
        let order = self.new_order(product, side, OrderType::Limit { limit_price }, size);
        self.registry.insert(order.clone());
        self.registry.mark_open(order.id)?;
        self.registry
            .get(order.id)
            .cloned()
            .ok_or(ExecutionError::OrderNotFound(order.id))
    }

    /// Cancel a resting limit order. The ledger is untouched: nothing was
    /// reserved at admission. Terminal orders cannot be cancelled.
    pub fn cancel_order(&mut self, id: OrderId) -> Result<(), ExecutionError> {
        match self.registry.status(id)? {
            OrderStatus::Open | OrderStatus::Pending => {
                self.registry.mark_cancelled(id, "cancelled by user")
            }
            status => Err(ExecutionError::OrderNotCancellable {
                id,
                status: status.to_string(),
            }),
        }
    }

    pub fn get_order_status(&self, id: OrderId) -> Result<OrderStatus, ExecutionError> {
        self.registry.status(id)
    }

    pub fn get_order(&self, id: OrderId) -> Option<&Order> {
        self.registry.get(id)
    }

    // ── Time ──

    /// Advance one candle: move the cursor, resolve resting limit orders
    /// against the new candle's [low, high] range, and record a valuation
    /// point. Returns false (and does nothing) when the series is exhausted.
    pub fn step(&mut self) -> bool {
        if !self.cursor.advance() {
            return false;
        }
        let candle = *self.cursor.current();
        for id in self.registry.open_order_ids() {
            let Some(order) = self.registry.get(id).cloned() else {
                continue;
            };
            let Some(limit_price) = order.order_type.limit_price() else {
                continue;
            };
            let crossed = match order.side {
                Side::Buy => candle.low <= limit_price,
                Side::Sell => candle.high >= limit_price,
            };
            if crossed {
                self.fill_resting(order, limit_price);
            }
        }
        self.record_valuation();
        self.stats.ticks += 1;
        true
    }

    // ── Control plane ──

    /// Stop accepting new orders. Resting limit orders keep resolving on
    /// `step()`; only submission is gated.
    pub fn halt_trading(&mut self, reason: &str) {
        self.halted = true;
        self.halt_reason = Some(reason.to_string());
    }

    /// Re-open submissions. The reason is informational.
    pub fn resume_trading(&mut self, _reason: &str) {
        self.halted = false;
        self.halt_reason = None;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Return to the exact post-construction state: initial balances, cursor
    /// at the first candle, empty history, fresh IDs, reseeded RNG.
    pub fn reset(&mut self) {
        self.ledger = Ledger::new(self.initial_balances.clone());
        self.registry.clear();
        self.id_gen = OrderIdGen::default();
        self.trades.clear();
        self.valuations.clear();
        self.stats = SimulationStats::default();
        self.halted = false;
        self.halt_reason = None;
        self.cursor.rewind();
        self.slippage_rng = self.seeds.stream(SLIPPAGE_STREAM);
        self.record_valuation();
    }

    // ── History & metrics ──

    pub fn get_trade_history(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn valuation_history(&self) -> &[ValuationPoint] {
        &self.valuations
    }

    /// Every order lifecycle transition this run, oldest first.
    pub fn audit_trail(&self) -> &[TransitionEvent] {
        self.registry.audit_trail()
    }

    /// `None` until the first fill.
    pub fn get_performance_metrics(&self) -> Option<PerformanceMetrics> {
        PerformanceMetrics::compute(&self.trades, &self.valuations)
    }

    pub fn get_simulation_stats(&self) -> SimulationStats {
        SimulationStats {
            limit_orders_open: self.registry.open_count() as u64,
            ..self.stats
        }
    }

    // ── Internals ──

    /// Shared submission gate. Every call counts as an attempt; every
    /// failure (halt included) counts as a rejection, so the stats always
    /// reconcile with the call history.
    fn admit(
        &mut self,
        product: &str,
        side: &str,
        size: f64,
        limit_price: Option<f64>,
    ) -> Result<(ProductId, Side), ExecutionError> {
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
            if product != self.product {
                return Err(crate::domain::InvalidProduct(product.to_string()).into());
            }
            Ok((product, side))
        })();
        if result.is_err() {
            self.stats.orders_rejected += 1;
        }
        result
    }

    fn new_order(&mut self, product: ProductId, side: Side, order_type: OrderType, size: f64) -> Order {
        Order::new(
            self.id_gen.next_id(),
            product,
            side,
            order_type,
            size,
            self.cursor.current().timestamp,
        )
    }

    /// Settle and record a fill for a not-yet-registered order. On
    /// insufficient balance the order is registered as rejected and the
    /// error propagates; the ledger is untouched.
    fn fill(&mut self, order: Order, execution_price: f64) -> Result<Order, ExecutionError> {
        let fee = compute_fee(order.size, execution_price, self.costs.fee_rate);
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
            self.registry.mark_rejected(id, &err.to_string())?;
            self.stats.orders_rejected += 1;
            return Err(err.into());
        }
        let now = self.cursor.current().timestamp;
        self.registry.mark_filled(id, execution_price, fee, now)?;
        self.stats.orders_filled += 1;
        self.record_trade(id, execution_price, fee);
        self.registry
            .get(id)
            .cloned()
            .ok_or(ExecutionError::OrderNotFound(id))
    }

    /// Fill a resting limit order during `step()`. A fill the ledger cannot
    /// cover rejects the order instead of failing the step.
    fn fill_resting(&mut self, order: Order, execution_price: f64) {
        let fee = compute_fee(order.size, execution_price, self.costs.fee_rate);
        match settle_fill(
            &mut self.ledger,
            &order.product,
            order.side,
            order.size,
            execution_price,
            fee,
        ) {
            Ok(()) => {
                let now = self.cursor.current().timestamp;
                if self
                    .registry
                    .mark_filled(order.id, execution_price, fee, now)
                    .is_ok()
                {
                    self.stats.orders_filled += 1;
                    self.record_trade(order.id, execution_price, fee);
                }
            }
            Err(err) => {
                if self.registry.mark_rejected(order.id, &err.to_string()).is_ok() {
                    self.stats.orders_rejected += 1;
                }
            }
        }
    }

    fn record_trade(&mut self, id: OrderId, execution_price: f64, fee: f64) {
        if let Some(order) = self.registry.get(id) {
            self.trades.push(TradeRecord {
                timestamp: self.cursor.current().timestamp,
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

    fn record_valuation(&mut self) {
        self.valuations.push(ValuationPoint {
            timestamp: self.cursor.current().timestamp,
            value: self.portfolio_value(),
        });
    }
}
