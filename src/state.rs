//! The typed world-state data model (component C1).
//!
//! A value type with deep structural equality. The model imposes no
//! economic constraints itself — it is a passive container that the path
//! engine and reducer pipeline read and write.

use crate::error::{KernelError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse `from -> to -> weight` matrix. Missing entries are the additive
/// identity (0.0). A `BTreeMap` gives lexicographic key order for free,
/// which doubles as the "stable traversal sorted lexicographically by
/// code" ordering guarantee in the concurrency model.
pub type Matrix = BTreeMap<String, BTreeMap<String, f64>>;

/// A free-form, string-keyed bag of policy parameters.
pub type RegimeBag = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Macro {
    pub gdp: Option<f64>,
    pub potential_gdp: Option<f64>,
    pub inflation: Option<f64>,
    pub unemployment: Option<f64>,
    pub output_gap: Option<f64>,
    pub primary_balance: Option<f64>,
    pub debt_gdp: Option<f64>,
    pub neutral_rate: Option<f64>,
    pub policy_rate: Option<f64>,
    pub inflation_target: f64,
    pub sfa: f64,
}

impl Default for Macro {
    fn default() -> Self {
        Macro {
            gdp: None,
            potential_gdp: None,
            inflation: None,
            unemployment: None,
            output_gap: None,
            primary_balance: None,
            debt_gdp: None,
            neutral_rate: None,
            policy_rate: None,
            inflation_target: 0.02,
            sfa: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct External {
    pub fx_rate: Option<f64>,
    pub reserves_usd: Option<f64>,
    pub current_account_gdp: Option<f64>,
    pub net_errors_omissions_gdp: f64,
}

impl Default for External {
    fn default() -> Self {
        External {
            fx_rate: None,
            reserves_usd: None,
            current_account_gdp: None,
            net_errors_omissions_gdp: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Finance {
    pub sovereign_yield: Option<f64>,
    pub credit_spread: Option<f64>,
    pub bank_tier1_ratio: Option<f64>,
    pub leverage_target: f64,
}

impl Default for Finance {
    fn default() -> Self {
        Finance {
            sovereign_yield: None,
            credit_spread: None,
            bank_tier1_ratio: None,
            leverage_target: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trade {
    pub exports_gdp: Option<f64>,
    pub imports_gdp: Option<f64>,
    pub tariff_mfn_avg: Option<f64>,
    pub ntm_index: Option<f64>,
    pub terms_of_trade: f64,
}

impl Default for Trade {
    fn default() -> Self {
        Trade {
            exports_gdp: None,
            imports_gdp: None,
            tariff_mfn_avg: None,
            ntm_index: None,
            terms_of_trade: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyFood {
    pub energy_stock_to_use: Option<f64>,
    pub food_price_index: Option<f64>,
    pub energy_price_index: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub milex_gdp: Option<f64>,
    pub personnel: Option<i64>,
    pub conflict_intensity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    pub gdelt_tone: Option<f64>,
    pub trends_salience: Option<f64>,
    pub policy_pressure: Option<f64>,
    pub approval: Option<f64>,
}

/// Complete state for a single country across all seven economic domains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryState {
    pub macro_: Macro,
    pub external: External,
    pub finance: Finance,
    pub trade: Trade,
    pub energy: EnergyFood,
    pub security: Security,
    pub sentiment: Sentiment,
}

fn default_monetary() -> RegimeBag {
    BTreeMap::from([
        ("rule".to_string(), Value::Text("taylor".to_string())),
        ("phi_pi".to_string(), Value::Number(0.5)),
        ("phi_y".to_string(), Value::Number(0.5)),
    ])
}

fn default_fx() -> RegimeBag {
    BTreeMap::from([("uip_rho_base".to_string(), Value::Number(0.0))])
}

fn default_fiscal() -> RegimeBag {
    BTreeMap::from([
        ("wealth_tax_rate".to_string(), Value::Number(0.0)),
        ("elasticity_saving".to_string(), Value::Number(-0.3)),
    ])
}

fn default_trade_regime() -> RegimeBag {
    BTreeMap::from([
        ("tariff_multiplier".to_string(), Value::Number(1.0)),
        ("ntm_shock".to_string(), Value::Number(0.0)),
    ])
}

fn default_security() -> RegimeBag {
    BTreeMap::from([("mobilization_intensity".to_string(), Value::Number(0.0))])
}

fn default_labor() -> RegimeBag {
    BTreeMap::from([("national_service_pct".to_string(), Value::Number(0.0))])
}

fn default_sentiment_regime() -> RegimeBag {
    BTreeMap::from([("propaganda_gain".to_string(), Value::Number(0.0))])
}

/// The seven named policy-parameter bags consulted by the reducer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regimes {
    pub monetary: RegimeBag,
    pub fx: RegimeBag,
    pub fiscal: RegimeBag,
    pub trade: RegimeBag,
    pub security: RegimeBag,
    pub labor: RegimeBag,
    pub sentiment: RegimeBag,
}

impl Default for Regimes {
    fn default() -> Self {
        Regimes {
            monetary: default_monetary(),
            fx: default_fx(),
            fiscal: default_fiscal(),
            trade: default_trade_regime(),
            security: default_security(),
            labor: default_labor(),
            sentiment: default_sentiment_regime(),
        }
    }
}

impl Regimes {
    pub fn bag(&self, name: &str) -> Option<&RegimeBag> {
        match name {
            "monetary" => Some(&self.monetary),
            "fx" => Some(&self.fx),
            "fiscal" => Some(&self.fiscal),
            "trade" => Some(&self.trade),
            "security" => Some(&self.security),
            "labor" => Some(&self.labor),
            "sentiment" => Some(&self.sentiment),
            _ => None,
        }
    }

    pub fn bag_mut(&mut self, name: &str) -> Option<&mut RegimeBag> {
        match name {
            "monetary" => Some(&mut self.monetary),
            "fx" => Some(&mut self.fx),
            "fiscal" => Some(&mut self.fiscal),
            "trade" => Some(&mut self.trade),
            "security" => Some(&mut self.security),
            "labor" => Some(&mut self.labor),
            "sentiment" => Some(&mut self.sentiment),
            _ => None,
        }
    }

    /// Numeric lookup with a default, matching the `regimes.<bag>.<key> ?? default` idiom
    /// used throughout the reducer formulas.
    pub fn number(&self, bag: &str, key: &str, default: f64) -> f64 {
        self.bag(bag)
            .and_then(|b| b.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn text(&self, bag: &str, key: &str, default: &str) -> String {
        self.bag(bag)
            .and_then(|b| b.get(key))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| default.to_string())
    }
}

/// Simulation-wide rules: regime parameters, RNG seed, reducer overrides,
/// and the bookkeeping invariant flags carried from the original model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationRules {
    pub regimes: Regimes,
    pub rng_seed: u64,
    /// `reducer_type -> impl_name`, set by `ReducerOverride` trigger actions.
    pub reducer_overrides: BTreeMap<String, String>,
    pub invariants: BTreeMap<String, bool>,
}

impl Default for SimulationRules {
    fn default() -> Self {
        SimulationRules {
            regimes: Regimes::default(),
            rng_seed: 42,
            reducer_overrides: BTreeMap::new(),
            invariants: BTreeMap::from([
                ("bmp6".to_string(), true),
                ("sfc_light".to_string(), true),
            ]),
        }
    }
}

/// An event appended by `EventInject`. No reducer in the fixed sequence
/// consumes these; they are carried for future event reducers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub payload: BTreeMap<String, Value>,
    pub injected_at_timestep: u64,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQueues {
    pub pending: Vec<Event>,
    pub processed: Vec<Event>,
}

/// Aggregate root: the complete global economic simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalState {
    pub t: u64,
    pub base_ccy: String,
    pub countries: BTreeMap<String, CountryState>,
    pub trade_matrix: Matrix,
    pub interbank_matrix: Matrix,
    pub alliance_graph: Matrix,
    pub sanctions: Matrix,
    /// Network-rewrite layer `"energy"` targets this matrix (see DESIGN.md
    /// for why it is a dedicated field rather than overloading
    /// `io_coefficients`).
    pub energy_network: Matrix,
    pub io_coefficients: Matrix,
    pub commodity_prices: BTreeMap<String, f64>,
    pub rules: SimulationRules,
    pub events: EventQueues,
}

impl Default for GlobalState {
    fn default() -> Self {
        GlobalState {
            t: 0,
            base_ccy: "USD".to_string(),
            countries: BTreeMap::new(),
            trade_matrix: BTreeMap::new(),
            interbank_matrix: BTreeMap::new(),
            alliance_graph: BTreeMap::new(),
            sanctions: BTreeMap::new(),
            energy_network: BTreeMap::new(),
            io_coefficients: BTreeMap::new(),
            commodity_prices: BTreeMap::new(),
            rules: SimulationRules::default(),
            events: EventQueues::default(),
        }
    }
}

/// The five matrix layers a `NetworkRewrite` action can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixLayer {
    Trade,
    Alliances,
    Sanctions,
    Interbank,
    Energy,
}

impl MatrixLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixLayer::Trade => "trade",
            MatrixLayer::Alliances => "alliances",
            MatrixLayer::Sanctions => "sanctions",
            MatrixLayer::Interbank => "interbank",
            MatrixLayer::Energy => "energy",
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        GlobalState::default()
    }

    pub fn with_country(mut self, code: impl Into<String>, country: CountryState) -> Self {
        self.countries.insert(code.into(), country);
        self
    }

    fn matrix_mut(&mut self, layer: MatrixLayer) -> &mut Matrix {
        match layer {
            MatrixLayer::Trade => &mut self.trade_matrix,
            MatrixLayer::Alliances => &mut self.alliance_graph,
            MatrixLayer::Sanctions => &mut self.sanctions,
            MatrixLayer::Interbank => &mut self.interbank_matrix,
            MatrixLayer::Energy => &mut self.energy_network,
        }
    }

    pub fn matrix(&self, layer: MatrixLayer) -> &Matrix {
        match layer {
            MatrixLayer::Trade => &self.trade_matrix,
            MatrixLayer::Alliances => &self.alliance_graph,
            MatrixLayer::Sanctions => &self.sanctions,
            MatrixLayer::Interbank => &self.interbank_matrix,
            MatrixLayer::Energy => &self.energy_network,
        }
    }

    pub fn get_matrix_edge(&self, layer: MatrixLayer, from: &str, to: &str) -> f64 {
        self.matrix(layer)
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Writes a single matrix cell, creating the `from` row if absent.
    /// Returns an error if either key is empty.
    pub fn set_matrix_edge(
        &mut self,
        layer: MatrixLayer,
        from: &str,
        to: &str,
        weight: f64,
    ) -> Result<()> {
        if from.is_empty() || to.is_empty() {
            return Err(KernelError::ValidationError(
                "matrix edge keys must be non-empty".to_string(),
            ));
        }
        self.matrix_mut(layer)
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), weight);
        Ok(())
    }

    pub fn get_commodity_price(&self, commodity: &str) -> Option<f64> {
        self.commodity_prices.get(commodity).copied()
    }

    pub fn set_commodity_price(&mut self, commodity: &str, price: f64) -> Result<()> {
        if commodity.is_empty() {
            return Err(KernelError::ValidationError(
                "commodity key must be non-empty".to_string(),
            ));
        }
        self.commodity_prices
            .insert(commodity.to_string(), price);
        Ok(())
    }
}
