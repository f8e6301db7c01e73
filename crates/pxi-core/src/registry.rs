use crate::types::{IndicatorDefinition, Polarity, Provider, RiskDirection};

/// The fixed indicator panel. Percent-quoted provider series are stored on
/// the canonical decimal scale (3.45% -> 0.0345); index-quoted series keep
/// their native scale.
pub static INDICATORS: &[IndicatorDefinition] = &[
    IndicatorDefinition {
        id: "hy_oas",
        label: "High Yield OAS",
        unit: "decimal",
        lower_bound: 0.02,
        upper_bound: 0.12,
        hard_min: 0.001,
        hard_max: 0.50,
        weight: 0.18,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::Fred,
        provider_series_id: "BAMLH0A0HYM2",
    },
    IndicatorDefinition {
        id: "ig_oas",
        label: "Investment Grade OAS",
        unit: "decimal",
        lower_bound: 0.005,
        upper_bound: 0.04,
        hard_min: 0.0005,
        hard_max: 0.20,
        weight: 0.10,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::Fred,
        provider_series_id: "BAMLC0A0CM",
    },
    IndicatorDefinition {
        id: "vix",
        label: "CBOE Volatility Index",
        unit: "index",
        lower_bound: 10.0,
        upper_bound: 45.0,
        hard_min: 5.0,
        hard_max: 150.0,
        weight: 0.18,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::Fred,
        provider_series_id: "VIXCLS",
    },
    IndicatorDefinition {
        id: "unemployment",
        label: "Unemployment Rate (U-3)",
        unit: "decimal",
        lower_bound: 0.03,
        upper_bound: 0.08,
        hard_min: 0.01,
        hard_max: 0.30,
        weight: 0.08,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::Fred,
        provider_series_id: "UNRATE",
    },
    IndicatorDefinition {
        id: "usd_index",
        label: "US Dollar Index",
        unit: "index",
        lower_bound: 90.0,
        upper_bound: 115.0,
        hard_min: 50.0,
        hard_max: 200.0,
        weight: 0.10,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::TwelveData,
        provider_series_id: "DXY",
    },
    IndicatorDefinition {
        id: "nfci",
        label: "Financial Conditions (NFCI)",
        unit: "index",
        lower_bound: -1.0,
        upper_bound: 1.5,
        hard_min: -3.0,
        hard_max: 10.0,
        weight: 0.12,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::Fred,
        provider_series_id: "NFCI",
    },
    IndicatorDefinition {
        id: "btc_return",
        label: "Bitcoin 24h Return",
        unit: "decimal",
        lower_bound: -0.15,
        upper_bound: 0.15,
        hard_min: -0.50,
        hard_max: 0.50,
        weight: 0.08,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsLessRisk,
        provider: Provider::CoinGecko,
        provider_series_id: "bitcoin",
    },
    IndicatorDefinition {
        id: "yield_curve",
        label: "Yield Curve Slope (10y-2y)",
        unit: "decimal",
        lower_bound: -0.02,
        upper_bound: 0.03,
        hard_min: -0.05,
        hard_max: 0.05,
        weight: 0.10,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsLessRisk,
        provider: Provider::Fred,
        provider_series_id: "DGS10,DGS2",
    },
    IndicatorDefinition {
        id: "breakeven_10y",
        label: "10y Breakeven Inflation",
        unit: "decimal",
        lower_bound: 0.01,
        upper_bound: 0.035,
        hard_min: -0.01,
        hard_max: 0.10,
        weight: 0.06,
        polarity: Polarity::Positive,
        risk_direction: RiskDirection::HigherIsMoreRisk,
        provider: Provider::Fred,
        provider_series_id: "T10YIE",
    },
];

pub fn indicator_registry() -> &'static [IndicatorDefinition] {
    INDICATORS
}

pub fn indicator(id: &str) -> Option<&'static IndicatorDefinition> {
    INDICATORS.iter().find(|d| d.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ids_are_unique() {
        let mut ids: Vec<&str> = INDICATORS.iter().map(|d| d.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), INDICATORS.len());
    }

    #[test]
    fn hard_bounds_contain_display_bounds() {
        for def in INDICATORS {
            assert!(def.hard_min <= def.lower_bound, "{}", def.id);
            assert!(def.hard_max >= def.upper_bound, "{}", def.id);
        }
    }

    #[test]
    fn weights_are_non_negative() {
        for def in INDICATORS {
            assert!(def.weight >= 0.0, "{}", def.id);
        }
    }

    #[test]
    fn lookup_by_id() {
        assert!(indicator("vix").is_some());
        assert!(indicator("hy_oas").is_some());
        assert!(indicator("nope").is_none());
    }
}
