//! End-to-end execution scenarios against scripted in-memory collaborators.
//!
//! The mocks record every borrow/swap/repay/transfer so the tests can
//! assert not just outcomes but ordering: repayment must be confirmed
//! before profit moves, and a pre-flight rejection must leave the lender
//! untouched.

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{Address, U256};
use flashloan_core::{
    ArbitrageExecutor, CoreError, CoreResult, ExecutionOutcome, ExecutionParameters,
    ExecutorConfig, FeeTier, LendingFacility, LoanObligation, OpportunityEvaluator, PoolHandle,
    PoolRegistry, PoolState, Quote, QuoteEngine, RepayReceipt, SlippageGuard, SwapVenue,
    TokenAmount, TokenLedger,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn addr(byte: u8) -> Address {
    Address::from_low_u64_be(byte as u64)
}

fn weth() -> Address {
    addr(0x11)
}

fn usdc() -> Address {
    addr(0x22)
}

fn owner() -> Address {
    addr(0x01)
}

fn one_weth() -> U256 {
    U256::exp10(18)
}

type CallLog = Arc<Mutex<Vec<String>>>;

struct MockRegistry {
    pools: DashMap<(Address, Address, FeeTier), Address>,
    states: DashMap<Address, PoolState>,
}

impl MockRegistry {
    fn new() -> Self {
        Self {
            pools: DashMap::new(),
            states: DashMap::new(),
        }
    }

    fn add_pool(&self, handle: &PoolHandle, state: PoolState) {
        self.pools.insert(
            (handle.token_in, handle.token_out, handle.fee_tier),
            handle.address,
        );
        self.states.insert(handle.address, state);
    }
}

#[async_trait]
impl PoolRegistry for MockRegistry {
    async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee_tier: FeeTier,
    ) -> CoreResult<Option<Address>> {
        Ok(self
            .pools
            .get(&(token_a, token_b, fee_tier))
            .map(|entry| *entry.value()))
    }

    async fn pool_state(&self, pool: Address) -> CoreResult<PoolState> {
        self.states
            .get(&pool)
            .map(|entry| *entry.value())
            .ok_or_else(|| CoreError::Venue(format!("no state for pool {:?}", pool)))
    }
}

struct MockVenue {
    outputs: Mutex<VecDeque<U256>>,
    log: CallLog,
}

#[async_trait]
impl SwapVenue for MockVenue {
    async fn swap_exact_in(
        &self,
        _handle: &PoolHandle,
        amount_in: U256,
        min_amount_out: U256,
    ) -> CoreResult<U256> {
        self.log
            .lock()
            .unwrap()
            .push(format!("swap in={} min={}", amount_in, min_amount_out));
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CoreError::Venue("no scripted swap output".to_string()))
    }
}

struct MockLender {
    available: U256,
    fee_bps: u64,
    accept_repay: bool,
    log: CallLog,
}

#[async_trait]
impl LendingFacility for MockLender {
    async fn available_liquidity(&self, _token: Address) -> CoreResult<U256> {
        Ok(self.available)
    }

    async fn borrow(&self, token: Address, amount: U256) -> CoreResult<LoanObligation> {
        self.log.lock().unwrap().push(format!("borrow {}", amount));
        let fee = amount * U256::from(self.fee_bps) / U256::from(10_000u64);
        Ok(LoanObligation {
            principal: TokenAmount::new(token, amount),
            fee: TokenAmount::new(token, fee),
        })
    }

    async fn repay(&self, _token: Address, amount: U256) -> CoreResult<RepayReceipt> {
        self.log.lock().unwrap().push(format!("repay {}", amount));
        if self.accept_repay {
            Ok(RepayReceipt::Accepted)
        } else {
            Ok(RepayReceipt::Rejected)
        }
    }
}

struct MockLedger {
    allowances: DashMap<(Address, Address, Address), U256>,
    default_allowance: U256,
    log: CallLog,
}

#[async_trait]
impl TokenLedger for MockLedger {
    async fn allowance(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
    ) -> CoreResult<U256> {
        Ok(self
            .allowances
            .get(&(owner, token, spender))
            .map(|entry| *entry.value())
            .unwrap_or(self.default_allowance))
    }

    async fn transfer(&self, _token: Address, to: Address, amount: U256) -> CoreResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("transfer {} to {:?}", amount, to));
        Ok(())
    }
}

struct Harness {
    registry: Arc<MockRegistry>,
    venue_outputs: VecDeque<U256>,
    lender_available: U256,
    lender_fee_bps: u64,
    accept_repay: bool,
    ledger_default_allowance: U256,
    allowance_overrides: Vec<((Address, Address, Address), U256)>,
    log: CallLog,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: Arc::new(MockRegistry::new()),
            venue_outputs: VecDeque::new(),
            lender_available: one_weth() * U256::from(100u64),
            lender_fee_bps: 9,
            accept_repay: true,
            ledger_default_allowance: U256::MAX,
            allowance_overrides: Vec::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn config() -> ExecutorConfig {
        ExecutorConfig {
            owner: owner(),
            swap_venue: addr(0xf1),
            quoter: addr(0xf2),
            pool_registry: addr(0xf3),
            lending_facility: addr(0xf4),
            slippage_tolerance_bps: 50,
            max_price_impact_bps: 100,
            min_pool_liquidity: U256::from(1_000u64),
            gas_limit: 1_000_000,
            gas_price_ceiling_wei: U256::from(100_000_000_000u64), // 100 gwei
            fee_tiers: vec![FeeTier::V3_005, FeeTier::V3_030, FeeTier::V2],
        }
    }

    fn build(
        self,
    ) -> ArbitrageExecutor<MockRegistry, MockVenue, MockLender, MockLedger> {
        let venue = Arc::new(MockVenue {
            outputs: Mutex::new(self.venue_outputs),
            log: self.log.clone(),
        });
        let lender = Arc::new(MockLender {
            available: self.lender_available,
            fee_bps: self.lender_fee_bps,
            accept_repay: self.accept_repay,
            log: self.log.clone(),
        });
        let allowances = DashMap::new();
        for (key, amount) in self.allowance_overrides {
            allowances.insert(key, amount);
        }
        let ledger = Arc::new(MockLedger {
            allowances,
            default_allowance: self.ledger_default_allowance,
            log: self.log.clone(),
        });
        ArbitrageExecutor::new(Self::config(), self.registry, venue, lender, ledger)
    }
}

/// Deep WETH/USDC pool at roughly 1800 USDC per WETH
fn weth_usdc_pool() -> (PoolHandle, PoolState) {
    let handle = PoolHandle {
        token_in: weth(),
        token_out: usdc(),
        fee_tier: FeeTier::V2,
        address: addr(0xa1),
    };
    let state = PoolState::V2 {
        reserve0: U256::exp10(18) * U256::from(10_000u64), // 10,000 WETH
        reserve1: U256::exp10(6) * U256::from(18_000_000u64), // 18,000,000 USDC
    };
    (handle, state)
}

/// Deep USDC/WETH pool priced slightly better, leaving room for profit
fn usdc_weth_pool() -> (PoolHandle, PoolState) {
    let handle = PoolHandle {
        token_in: usdc(),
        token_out: weth(),
        fee_tier: FeeTier::V2,
        address: addr(0xa2),
    };
    // token0 = WETH (lower address), token1 = USDC
    let state = PoolState::V2 {
        reserve0: U256::exp10(18) * U256::from(10_200u64),
        reserve1: U256::exp10(6) * U256::from(18_000_000u64),
    };
    (handle, state)
}

fn params_for(route: Vec<PoolHandle>, amount_in: U256) -> ExecutionParameters {
    let token_in = route.first().map(|h| h.token_in).unwrap_or_else(weth);
    let token_out = route.last().map(|h| h.token_out).unwrap_or_else(weth);
    ExecutionParameters {
        owner: owner(),
        token_in,
        token_out,
        amount_in,
        min_amount_out: U256::zero(),
        slippage_tolerance_bps: 50,
        gas_limit: 1_000_000,
        gas_price_wei: U256::from(30_000_000_000u64),
        route,
    }
}

fn expected_quote(handle: &PoolHandle, state: &PoolState, amount_in: U256) -> Quote {
    QuoteEngine::quote(handle, state, amount_in).unwrap()
}

#[tokio::test]
async fn slippage_breach_rolls_the_unit_back() {
    init_tracing();
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);

    // The venue fills the first hop one unit under the floor the
    // executor will demand
    let quote = expected_quote(&buy, &buy_state, one_weth());
    let floor = SlippageGuard::minimum_acceptable(&quote, 50).unwrap();
    harness.venue_outputs.push_back(floor - U256::one());

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    assert_eq!(
        outcome,
        ExecutionOutcome::Reverted {
            cause: CoreError::SlippageExceeded {
                actual: floor - U256::one(),
                floor,
            },
        }
    );
}

#[test]
fn published_floor_example_holds() {
    // 1800e6 expected at 50 bps tolerance floors at exactly 1791e6
    let (handle, _) = weth_usdc_pool();
    let quote = Quote {
        handle,
        amount_in: one_weth(),
        amount_out_expected: U256::exp10(6) * U256::from(1_800u64),
        price_impact_bps: 0,
    };
    assert_eq!(
        SlippageGuard::minimum_acceptable(&quote, 50).unwrap(),
        U256::exp10(6) * U256::from(1_791u64)
    );
}

#[tokio::test]
async fn oversized_loan_is_rejected_before_any_obligation() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);
    harness.lender_available = one_weth() / U256::from(2u64);
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    match outcome {
        ExecutionOutcome::Rejected {
            reason: CoreError::LoanFacilityUnavailable(_),
        } => {}
        other => panic!("expected LoanFacilityUnavailable rejection, got {:?}", other),
    }
    // No obligation was ever created and nothing else was touched
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn profitable_round_trip_commits_and_forwards_profit() {
    init_tracing();
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);

    // The venue fills both hops exactly at quote
    let q1 = expected_quote(&buy, &buy_state, one_weth());
    let q2 = expected_quote(&sell, &sell_state, q1.amount_out_expected);
    harness
        .venue_outputs
        .push_back(q1.amount_out_expected);
    harness
        .venue_outputs
        .push_back(q2.amount_out_expected);
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    let owed = one_weth() + one_weth() * U256::from(9u64) / U256::from(10_000u64);
    assert!(
        q2.amount_out_expected > owed,
        "scenario must leave room for profit"
    );
    let expected_profit = q2.amount_out_expected - owed;

    assert_eq!(
        outcome,
        ExecutionOutcome::Success {
            profit: TokenAmount::new(weth(), expected_profit),
        }
    );

    // Repayment must precede the profit transfer
    let entries = log.lock().unwrap().clone();
    let repay_index = entries.iter().position(|e| e.starts_with("repay")).unwrap();
    let transfer_index = entries
        .iter()
        .position(|e| e.starts_with("transfer"))
        .unwrap();
    assert!(repay_index < transfer_index);
    assert!(entries[0].starts_with("borrow"));
    assert_eq!(
        entries.iter().filter(|e| e.starts_with("swap")).count(),
        2
    );
}

#[tokio::test]
async fn unprofitable_round_trip_rolls_back() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);

    let q1 = expected_quote(&buy, &buy_state, one_weth());
    let q2 = expected_quote(&sell, &sell_state, q1.amount_out_expected);
    harness.venue_outputs.push_back(q1.amount_out_expected);
    harness.venue_outputs.push_back(q2.amount_out_expected);

    // A 2% facility fee eats the whole edge
    harness.lender_fee_bps = 200;
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    match outcome {
        ExecutionOutcome::Reverted {
            cause: CoreError::Unprofitable { proceeds, owed },
        } => {
            assert_eq!(proceeds, q2.amount_out_expected);
            assert!(owed > proceeds);
        }
        other => panic!("expected Unprofitable rollback, got {:?}", other),
    }
    // The unit never settled and never paid anyone
    let entries = log.lock().unwrap().clone();
    assert!(!entries.iter().any(|e| e.starts_with("repay")));
    assert!(!entries.iter().any(|e| e.starts_with("transfer")));
}

#[tokio::test]
async fn missing_allowance_rolls_back_before_swapping() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);
    harness.ledger_default_allowance = U256::zero();
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    match outcome {
        ExecutionOutcome::Reverted {
            cause: CoreError::InsufficientAllowance { have, need },
        } => {
            assert_eq!(have, U256::zero());
            assert_eq!(need, one_weth());
        }
        other => panic!("expected InsufficientAllowance rollback, got {:?}", other),
    }
    let entries = log.lock().unwrap().clone();
    assert!(entries.iter().any(|e| e.starts_with("borrow")));
    assert!(!entries.iter().any(|e| e.starts_with("swap")));
    assert!(!entries.iter().any(|e| e.starts_with("transfer")));
}

#[tokio::test]
async fn later_hop_zero_allowance_rolls_back() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);

    // First leg fully approved; the USDC approval for the second hop is
    // zero, which is certain failure even before its exact need is known
    harness
        .allowance_overrides
        .push(((owner(), usdc(), addr(0xf1)), U256::zero()));
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    match outcome {
        ExecutionOutcome::Reverted {
            cause: CoreError::InsufficientAllowance { have, need },
        } => {
            assert_eq!(have, U256::zero());
            assert_eq!(need, U256::one());
        }
        other => panic!("expected InsufficientAllowance rollback, got {:?}", other),
    }
    let entries = log.lock().unwrap().clone();
    assert!(entries.iter().any(|e| e.starts_with("borrow")));
    assert!(!entries.iter().any(|e| e.starts_with("swap")));
}

#[tokio::test]
async fn repay_rejection_rolls_back() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);

    let q1 = expected_quote(&buy, &buy_state, one_weth());
    let q2 = expected_quote(&sell, &sell_state, q1.amount_out_expected);
    harness.venue_outputs.push_back(q1.amount_out_expected);
    harness.venue_outputs.push_back(q2.amount_out_expected);
    harness.accept_repay = false;
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(vec![buy, sell], one_weth()))
        .await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Reverted {
            cause: CoreError::RepayRejected(_),
        }
    ));
    let entries = log.lock().unwrap().clone();
    assert!(!entries.iter().any(|e| e.starts_with("transfer")));
}

#[tokio::test]
async fn zero_hop_route_is_rejected_as_malformed() {
    let harness = Harness::new();
    let log = harness.log.clone();
    let executor = harness.build();

    let mut params = params_for(vec![], one_weth());
    params.token_in = weth();
    params.token_out = weth();
    let outcome = executor.execute(params).await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Rejected {
            reason: CoreError::MalformedRoute(_),
        }
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn open_route_is_rejected_before_any_obligation() {
    // Borrow USDC but end the route in WETH: the proceeds could never
    // repay the obligation, so the unit must not start at all
    let mut harness = Harness::new();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&sell, sell_state);
    let log = harness.log.clone();

    let executor = harness.build();
    let outcome = executor
        .execute(params_for(
            vec![sell],
            U256::exp10(6) * U256::from(1_800u64),
        ))
        .await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Rejected {
            reason: CoreError::MalformedRoute(_),
        }
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn gas_price_above_ceiling_is_rejected() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);
    let log = harness.log.clone();

    let executor = harness.build();
    let mut params = params_for(vec![buy, sell], one_weth());
    params.gas_price_wei = U256::from(200_000_000_000u64); // 200 gwei > 100 gwei ceiling
    let outcome = executor.execute(params).await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Rejected {
            reason: CoreError::GasPriceAboveCeiling { .. },
        }
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn caller_floor_on_final_proceeds_is_enforced() {
    let mut harness = Harness::new();
    let (buy, buy_state) = weth_usdc_pool();
    let (sell, sell_state) = usdc_weth_pool();
    harness.registry.add_pool(&buy, buy_state);
    harness.registry.add_pool(&sell, sell_state);

    let q1 = expected_quote(&buy, &buy_state, one_weth());
    let q2 = expected_quote(&sell, &sell_state, q1.amount_out_expected);
    harness.venue_outputs.push_back(q1.amount_out_expected);
    harness.venue_outputs.push_back(q2.amount_out_expected);

    let executor = harness.build();
    let mut params = params_for(vec![buy, sell], one_weth());
    // Demand more than the route can possibly deliver
    params.min_amount_out = q2.amount_out_expected + U256::one();
    let outcome = executor.execute(params).await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Reverted {
            cause: CoreError::SlippageExceeded { .. },
        }
    ));
}

#[tokio::test]
async fn allowance_probe_reads_both_legs() {
    let mut harness = Harness::new();
    harness.ledger_default_allowance = U256::from(5_000u64);
    let executor = harness.build();

    let (leg_in, leg_out) = executor
        .check_allowances(owner(), weth(), usdc())
        .await
        .unwrap();
    assert_eq!(leg_in, TokenAmount::new(weth(), U256::from(5_000u64)));
    assert_eq!(leg_out, TokenAmount::new(usdc(), U256::from(5_000u64)));
}

#[tokio::test]
async fn evaluation_is_idempotent_and_feasible() {
    let registry = Arc::new(MockRegistry::new());
    let (handle, state) = weth_usdc_pool();
    registry.add_pool(&handle, state);

    let evaluator = OpportunityEvaluator::new(Harness::config(), registry);

    let first = evaluator
        .evaluate_opportunity(weth(), usdc(), one_weth())
        .await
        .unwrap();
    let second = evaluator
        .evaluate_opportunity(weth(), usdc(), one_weth())
        .await
        .unwrap();

    assert!(first.feasible);
    assert_eq!(first, second);
    let quote = first.quote.unwrap();
    assert_eq!(
        first.min_acceptable.unwrap(),
        SlippageGuard::minimum_acceptable(&quote, 50).unwrap()
    );
}

#[tokio::test]
async fn evaluation_distinguishes_no_pool_from_empty_pool() {
    // No pool registered at all
    let empty_registry = Arc::new(MockRegistry::new());
    let evaluator = OpportunityEvaluator::new(Harness::config(), empty_registry);
    let result = evaluator
        .evaluate_opportunity(weth(), usdc(), one_weth())
        .await
        .unwrap();
    assert!(!result.feasible);
    assert_eq!(result.reason, Some(CoreError::NotFound));

    // Pool exists but holds nothing
    let registry = Arc::new(MockRegistry::new());
    let (handle, _) = weth_usdc_pool();
    registry.add_pool(
        &handle,
        PoolState::V2 {
            reserve0: U256::zero(),
            reserve1: U256::zero(),
        },
    );
    let evaluator = OpportunityEvaluator::new(Harness::config(), registry);
    let result = evaluator
        .evaluate_opportunity(weth(), usdc(), one_weth())
        .await
        .unwrap();
    assert!(!result.feasible);
    match result.reason {
        Some(CoreError::InsufficientLiquidity(reason)) => {
            assert!(reason.contains("holds no liquidity"));
        }
        other => panic!("expected InsufficientLiquidity, got {:?}", other),
    }
}
