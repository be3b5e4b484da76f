//! Linear trend of yearly incident counts.
//!
//! Ordinary least squares over one observation per year, unweighted. The
//! fit is done on years centred at their mean, which keeps the sums small
//! when years are in the thousands.

use crate::error::PipelineError;
use crate::models::{Prediction, TrendSummary, YearCount};
use tracing::debug;

/// A fitted line `count = intercept + slope * year`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendModel {
    pub intercept: f64,
    pub slope: f64,
    /// Coefficient of determination over the fitted points.
    pub r_squared: f64,
    pub observations: usize,
}

impl TrendModel {
    /// Fit the model on a by-year table.
    ///
    /// Fails when fewer than two distinct years are present.
    pub fn fit(by_year: &[YearCount]) -> Result<Self, PipelineError> {
        let mut years: Vec<i32> = by_year.iter().map(|row| row.year).collect();
        years.sort_unstable();
        years.dedup();
        if years.len() < 2 {
            return Err(PipelineError::ModelInput {
                distinct_years: years.len(),
            });
        }

        let n = by_year.len() as f64;
        let mean_x = by_year.iter().map(|row| row.year as f64).sum::<f64>() / n;
        let mean_y = by_year.iter().map(|row| row.count as f64).sum::<f64>() / n;

        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for row in by_year {
            let dx = row.year as f64 - mean_x;
            let dy = row.count as f64 - mean_y;
            sxy += dx * dy;
            sxx += dx * dx;
            syy += dy * dy;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        // All counts equal: the flat line explains everything there is.
        let r_squared = if syy == 0.0 {
            1.0
        } else {
            (sxy * sxy) / (sxx * syy)
        };

        debug!(
            "Fitted trend over {} years: intercept={}, slope={}, r2={}",
            by_year.len(),
            intercept,
            slope,
            r_squared
        );

        Ok(Self {
            intercept,
            slope,
            r_squared,
            observations: by_year.len(),
        })
    }

    /// Predicted count for a year. Not rounded, and may be negative.
    pub fn predict(&self, year: i32) -> f64 {
        self.intercept + self.slope * year as f64
    }

    /// Predictions for each queried year, in query order.
    pub fn predict_many(&self, years: &[i32]) -> Vec<Prediction> {
        years
            .iter()
            .map(|&year| Prediction {
                year,
                predicted_count: self.predict(year),
            })
            .collect()
    }

    /// Bundle the coefficients with predictions for the report.
    pub fn summarize(&self, years: &[i32]) -> TrendSummary {
        TrendSummary {
            intercept: self.intercept,
            slope: self.slope,
            r_squared: self.r_squared,
            observations: self.observations,
            predictions: self.predict_many(years),
        }
    }
}
