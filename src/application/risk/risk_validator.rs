use crate::domain::errors::RiskViolation;
use crate::domain::trading::{Direction, Signal};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Defaults per spec §4.9.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub risk_per_trade_pct: f64,
    pub leverage: u32,
    pub size_tolerance_pct: f64,
    pub min_size: Decimal,
    pub max_size: Decimal,
    pub stop_loss_min_pct: f64,
    pub stop_loss_max_pct: f64,
    pub rr_min: f64,
    pub rr_max: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 2.0,
            leverage: 5,
            size_tolerance_pct: 0.05,
            min_size: Decimal::new(1, 3),
            max_size: Decimal::new(100, 0),
            stop_loss_min_pct: 0.003,
            stop_loss_max_pct: 0.03,
            rr_min: 1.5,
            rr_max: 5.0,
        }
    }
}

/// Validates a proposed signal against the risk policy (spec §4.9). Checks
/// run in order and stop at the first failure.
pub struct RiskValidator {
    config: RiskConfig,
}

impl RiskValidator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        signal: &Signal,
        account_balance: Decimal,
        entry_blocked: bool,
    ) -> Result<(), RiskViolation> {
        if entry_blocked {
            return Err(RiskViolation::DailyLossLimit { loss_pct: 0.0, limit_pct: 0.0 });
        }

        self.check_directionality(signal)?;
        self.check_position_size(signal, account_balance)?;
        self.check_stop_loss(signal)?;
        self.check_take_profit(signal)?;
        Ok(())
    }

    fn check_directionality(&self, signal: &Signal) -> Result<(), RiskViolation> {
        if signal.is_directionally_valid() {
            Ok(())
        } else {
            Err(RiskViolation::InvalidDirectionality { symbol: signal.symbol.clone() })
        }
    }

    /// Position size implied by account balance, risk-per-trade, stop
    /// distance and leverage (spec §4.9). Strategies and `check_position_size`
    /// both derive from this so signal sizing can never drift from what the
    /// validator will accept.
    pub fn reference_size(&self, account_balance: Decimal, entry: Decimal, stop: Decimal) -> Decimal {
        let risk_amount = account_balance * Decimal::try_from(self.config.risk_per_trade_pct / 100.0).unwrap_or(Decimal::ZERO);
        let per_unit_risk = (entry - stop).abs();
        if per_unit_risk.is_zero() {
            return Decimal::ZERO;
        }
        (risk_amount / per_unit_risk * Decimal::from(self.config.leverage)).floor()
    }

    fn check_position_size(&self, signal: &Signal, account_balance: Decimal) -> Result<(), RiskViolation> {
        let reference_size = self.reference_size(account_balance, signal.entry, signal.stop);
        if reference_size.is_zero() {
            return Err(RiskViolation::PositionSizeLimit { proposed_pct: 0.0, max_pct: 0.0 });
        }

        let delta_pct = ((signal.size - reference_size) / reference_size).abs().to_f64().unwrap_or(1.0);
        if delta_pct > self.config.size_tolerance_pct {
            return Err(RiskViolation::PositionSizeLimit {
                proposed_pct: delta_pct * 100.0,
                max_pct: self.config.size_tolerance_pct * 100.0,
            });
        }
        if signal.size < self.config.min_size || signal.size > self.config.max_size {
            return Err(RiskViolation::PositionSizeLimit {
                proposed_pct: signal.size.to_f64().unwrap_or(0.0),
                max_pct: self.config.max_size.to_f64().unwrap_or(0.0),
            });
        }
        Ok(())
    }

    fn check_stop_loss(&self, signal: &Signal) -> Result<(), RiskViolation> {
        match signal.direction {
            Direction::Long if signal.stop >= signal.entry => {
                return Err(RiskViolation::InvalidDirectionality { symbol: signal.symbol.clone() });
            }
            Direction::Short if signal.stop <= signal.entry => {
                return Err(RiskViolation::InvalidDirectionality { symbol: signal.symbol.clone() });
            }
            _ => {}
        }
        if signal.entry.is_zero() {
            return Err(RiskViolation::InvalidDirectionality { symbol: signal.symbol.clone() });
        }
        let distance_pct = ((signal.entry - signal.stop).abs() / signal.entry).to_f64().unwrap_or(0.0);
        if distance_pct < self.config.stop_loss_min_pct || distance_pct > self.config.stop_loss_max_pct {
            return Err(RiskViolation::InsufficientRiskReward { actual: distance_pct, min: self.config.stop_loss_min_pct });
        }
        Ok(())
    }

    fn check_take_profit(&self, signal: &Signal) -> Result<(), RiskViolation> {
        match signal.direction {
            Direction::Long if signal.take_profit <= signal.entry => {
                return Err(RiskViolation::InvalidDirectionality { symbol: signal.symbol.clone() });
            }
            Direction::Short if signal.take_profit >= signal.entry => {
                return Err(RiskViolation::InvalidDirectionality { symbol: signal.symbol.clone() });
            }
            _ => {}
        }
        let rr = Signal::compute_risk_reward(signal.entry, signal.stop, signal.take_profit);
        if rr < self.config.rr_min || rr > self.config.rr_max {
            return Err(RiskViolation::InsufficientRiskReward { actual: rr, min: self.config.rr_min });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn valid_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            strategy_id: "strategy_a_conservative".into(),
            symbol: "BTCUSDT".into(),
            direction: Direction::Long,
            entry: dec!(100),
            stop: dec!(99),
            take_profit: dec!(102.5),
            size: dec!(10),
            confidence: 0.9,
            timestamp: 0,
            timeframe: crate::domain::market::Timeframe::M15,
            rationale: String::new(),
            risk_reward: 2.5,
        }
    }

    #[test]
    fn accepts_well_formed_signal_with_matching_size() {
        let validator = RiskValidator::new(RiskConfig::default());
        // reference_size = floor((10000*0.02)/1*5) = floor(1000) = 1000; proposed size 10 is far off,
        // so exercise the happy path with a balance sized to match.
        let balance = dec!(100); // risk_amount=2, per_unit_risk=1, leverage=5 -> reference=10
        assert!(validator.validate(&valid_signal(), balance, false).is_ok());
    }

    #[test]
    fn rejects_when_entry_blocked() {
        let validator = RiskValidator::new(RiskConfig::default());
        assert!(validator.validate(&valid_signal(), dec!(100), true).is_err());
    }

    #[test]
    fn reference_size_matches_the_formula_check_position_size_enforces() {
        let validator = RiskValidator::new(RiskConfig::default());
        // risk_amount = 100*0.02 = 2, per_unit_risk = 1, leverage = 5 -> floor(10) = 10
        assert_eq!(validator.reference_size(dec!(100), dec!(100), dec!(99)), dec!(10));
    }

    #[test]
    fn reference_size_is_zero_when_entry_equals_stop() {
        let validator = RiskValidator::new(RiskConfig::default());
        assert_eq!(validator.reference_size(dec!(100), dec!(100), dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn rejects_stop_outside_bounds() {
        let validator = RiskValidator::new(RiskConfig::default());
        let mut signal = valid_signal();
        signal.stop = dec!(99.99); // 0.01% away, below the 0.3% floor
        assert!(validator.validate(&signal, dec!(100), false).is_err());
    }
}
