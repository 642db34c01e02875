use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Inputs of the affiliate campaign break-even calculator.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RoiInput {
    /// Commission earned per sale.
    #[serde(alias = "comissao")]
    pub commission_per_sale: f64,
    /// Total ad spend.
    #[serde(alias = "investimento")]
    pub ad_spend: f64,
    #[serde(alias = "vendas_esperadas")]
    pub expected_sales: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoiReport {
    pub revenue: f64,
    pub profit: f64,
    pub roi_percent: f64,
    pub margin_percent: f64,
    /// Sales needed to cover the spend.
    pub break_even_sales: u64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// ROI as shown on metrics dashboards: `profit / spend * 100`, or 0 when nothing was spent.
///
/// Unlike [`calculate_roi`] this never rejects its inputs.
pub fn roi_percentage(profit: f64, spend: f64) -> f64 {
    if spend == 0.0 {
        0.0
    } else {
        round2(profit / spend * 100.0)
    }
}

fn break_even(spend: f64, commission: f64) -> u64 {
    if commission == 0.0 {
        0
    } else {
        (spend / commission).ceil() as u64
    }
}

/// Validating calculator: every input must be strictly positive.
pub fn calculate_roi(input: &RoiInput) -> Result<RoiReport, AppError> {
    let checks = [
        ("commission_per_sale", input.commission_per_sale),
        ("ad_spend", input.ad_spend),
        ("expected_sales", input.expected_sales),
    ];
    for (field, value) in checks {
        if !value.is_finite() || value <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "{} must be greater than zero",
                field
            )));
        }
    }

    let revenue = input.commission_per_sale * input.expected_sales;
    let profit = revenue - input.ad_spend;
    let margin = if revenue == 0.0 {
        0.0
    } else {
        profit / revenue * 100.0
    };

    let report = RoiReport {
        revenue: round2(revenue),
        profit: round2(profit),
        roi_percent: roi_percentage(profit, input.ad_spend),
        margin_percent: round2(margin),
        break_even_sales: break_even(input.ad_spend, input.commission_per_sale),
    };

    // JSON has no infinity; overflowed figures would serialize as null
    let figures = [
        report.revenue,
        report.profit,
        report.roi_percent,
        report.margin_percent,
    ];
    if figures.iter().any(|v| !v.is_finite()) {
        return Err(AppError::InvalidInput(
            "inputs are too large to compute a finite ROI".to_string(),
        ));
    }
    Ok(report)
}
