//! Per-column outlier treatment for normalized ratings.

use tracing::{debug, warn};

/// Outlier treatment strategy for one rating column
#[derive(Debug, Clone, PartialEq)]
pub enum OutlierMethod {
    /// Clamp into the IQR fence
    Cap,
    /// Null out values beyond the IQR fence
    Nan,
    /// Clamp into the configured percentile band
    PercentileCap,
    None,
    /// Unrecognized name from configuration; columns are left untouched
    Unknown(String),
}

impl OutlierMethod {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "cap" => OutlierMethod::Cap,
            "nan" => OutlierMethod::Nan,
            "percentile_cap" => OutlierMethod::PercentileCap,
            "none" => OutlierMethod::None,
            _ => OutlierMethod::Unknown(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OutlierMethod::Cap => "cap",
            OutlierMethod::Nan => "nan",
            OutlierMethod::PercentileCap => "percentile_cap",
            OutlierMethod::None => "none",
            OutlierMethod::Unknown(name) => name,
        }
    }
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Cap
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlierSettings {
    pub method: OutlierMethod,
    pub iqr_factor: f64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for OutlierSettings {
    fn default() -> Self {
        Self {
            method: OutlierMethod::Cap,
            iqr_factor: 1.5,
            lower_percentile: 0.05,
            upper_percentile: 0.95,
        }
    }
}

/// Linear-interpolation quantile of an ascending, non-empty slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// IQR fence multipliers must be finite and non-negative
pub fn is_valid_iqr_factor(factor: f64) -> bool {
    factor.is_finite() && factor >= 0.0
}

fn clamp_all(values: &[Option<f64>], low: f64, high: f64) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(|x| x.clamp(low, high))).collect()
}

/// Treat outliers in one column, returning a column of equal length.
///
/// Columns with fewer than two distinct present values are returned as is, as
/// are columns with a zero IQR under `cap`/`nan`. Unknown methods and invalid
/// percentile bounds warn and leave the column unchanged, as does an invalid
/// `iqr_factor` under `cap`/`nan`.
pub fn treat_outliers(values: &[Option<f64>], settings: &OutlierSettings) -> Vec<Option<f64>> {
    match &settings.method {
        OutlierMethod::None => return values.to_vec(),
        OutlierMethod::Unknown(name) => {
            warn!("Unknown outlier treatment method: {}. Column not modified.", name);
            return values.to_vec();
        }
        OutlierMethod::Cap | OutlierMethod::Nan if !is_valid_iqr_factor(settings.iqr_factor) => {
            warn!(
                "Invalid iqr_factor: {}. Skipping {} outlier treatment.",
                settings.iqr_factor,
                settings.method.as_str()
            );
            return values.to_vec();
        }
        _ => {}
    }

    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    present.sort_by(f64::total_cmp);

    let mut distinct = present.clone();
    distinct.dedup();
    if distinct.len() < 2 {
        debug!("Fewer than 2 distinct values; skipping outlier treatment");
        return values.to_vec();
    }

    let q1 = quantile(&present, 0.25);
    let q3 = quantile(&present, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - settings.iqr_factor * iqr;
    let upper_fence = q3 + settings.iqr_factor * iqr;

    match settings.method {
        OutlierMethod::Cap | OutlierMethod::Nan if iqr == 0.0 => {
            debug!("IQR is 0; no outliers to treat");
            values.to_vec()
        }
        OutlierMethod::Cap => {
            debug!("Capping outliers to [{}, {}]", lower_fence, upper_fence);
            clamp_all(values, lower_fence, upper_fence)
        }
        OutlierMethod::Nan => {
            debug!("Nulling outliers outside [{}, {}]", lower_fence, upper_fence);
            values
                .iter()
                .map(|v| v.filter(|x| (lower_fence..=upper_fence).contains(x)))
                .collect()
        }
        OutlierMethod::PercentileCap => {
            let (lower, upper) = (settings.lower_percentile, settings.upper_percentile);
            if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
                warn!(
                    "Invalid percentiles: lower={}, upper={}. Skipping percentile_cap.",
                    lower, upper
                );
                return values.to_vec();
            }
            let low = quantile(&present, lower);
            let high = quantile(&present, upper);
            debug!("Capping to percentile band [{}, {}]", low, high);
            clamp_all(values, low, high)
        }
        OutlierMethod::None | OutlierMethod::Unknown(_) => values.to_vec(),
    }
}
