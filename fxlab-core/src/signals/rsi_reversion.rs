//! RSI mean reversion with a trend filter.
//!
//! Long when RSI crosses up through `oversold` while close is above the trend
//! EMA. Short when RSI crosses down through `overbought` while close is below it.

use super::{short_or_exit, Signal, SignalGenerator};
use crate::indicators::{IndicatorFrame, IndicatorSpec};

#[derive(Debug, Clone)]
pub struct RsiReversion {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub trend_ema: usize,
    pub allow_short: bool,
    rsi_key: String,
    ema_key: String,
}

impl RsiReversion {
    pub fn new(
        period: usize,
        oversold: f64,
        overbought: f64,
        trend_ema: usize,
        allow_short: bool,
    ) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        assert!(trend_ema >= 1, "trend EMA period must be >= 1");
        assert!(
            0.0 < oversold && oversold < overbought && overbought < 100.0,
            "need 0 < oversold < overbought < 100"
        );
        Self {
            period,
            oversold,
            overbought,
            trend_ema,
            allow_short,
            rsi_key: IndicatorSpec::rsi(period).key(),
            ema_key: IndicatorSpec::ema(trend_ema).key(),
        }
    }
}

impl SignalGenerator for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn required_indicators(&self) -> Vec<IndicatorSpec> {
        vec![IndicatorSpec::rsi(self.period), IndicatorSpec::ema(self.trend_ema)]
    }

    fn warmup_bars(&self) -> usize {
        (self.period + 1).max(IndicatorSpec::ema(self.trend_ema).lookback())
    }

    fn evaluate(&self, frame: &IndicatorFrame, i: usize) -> Signal {
        if i == 0 {
            return Signal::none();
        }
        let Some(bar) = frame.bar(i) else {
            return Signal::none();
        };
        let (Some(rsi), Some(prev_rsi), Some(trend)) = (
            frame.value(&self.rsi_key, i),
            frame.value(&self.rsi_key, i - 1),
            frame.value(&self.ema_key, i),
        ) else {
            return Signal::none();
        };

        if prev_rsi <= self.oversold && rsi > self.oversold && bar.close > trend {
            let depth = (self.oversold - prev_rsi) / self.oversold;
            return Signal::long().with_confidence(0.5 + depth);
        }
        if prev_rsi >= self.overbought && rsi < self.overbought && bar.close < trend {
            let depth = (prev_rsi - self.overbought) / (100.0 - self.overbought);
            return short_or_exit(self.allow_short).with_confidence(0.5 + depth);
        }
        Signal::none()
    }
}
