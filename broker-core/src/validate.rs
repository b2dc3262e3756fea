//! Pure request validation.
//!
//! Nothing here mutates its input or has side effects; `validate_request`
//! is safe to call twice (admission and, defensively, at take-time) and
//! will return the identical result both times for the identical request.

use crate::error::ValidationError;
use crate::types::{DataBlock, Input, OutputSchema, Request, Visualization};
use std::collections::HashSet;

const GRID_DIM_MIN: i32 = 1;
const GRID_DIM_MAX: i32 = 100;
const MULTI_GRID_CHANNELS_MIN: i32 = 1;
const MULTI_GRID_CHANNELS_MAX: i32 = 10;
const TIME_SERIES_POINTS_MIN: i32 = 1;
const TIME_SERIES_POINTS_MAX: i32 = 1000;
const OPTION_LIST_MIN_OPTIONS: usize = 2;

fn fail(path: impl std::fmt::Display, message: impl std::fmt::Display) -> ValidationError {
    ValidationError::new(format!("{path}: {message}"))
}

/// Validate a complete request: non-empty inputs, each input internally
/// consistent with its visualization, and an output schema with at least
/// two uniquely-hotkeyed options. Returns on the first failure.
pub fn validate_request(request: &Request) -> Result<(), ValidationError> {
    if request.inputs.is_empty() {
        return Err(fail("request", "inputs must be non-empty"));
    }

    for (idx, input) in request.inputs.iter().enumerate() {
        validate_input(idx, input)?;
    }

    validate_output_schema(
        request
            .output
            .as_ref()
            .ok_or_else(|| fail("output schema", "unset"))?,
    )
}

fn validate_input(idx: usize, input: &Input) -> Result<(), ValidationError> {
    let path = format!("input {idx}");

    let visualization = input
        .visualization
        .as_ref()
        .ok_or_else(|| fail(&path, "visualization variant unset"))?;
    let data = input
        .data
        .as_ref()
        .ok_or_else(|| fail(&path, "data block unset"))?;

    match visualization {
        Visualization::Grid { rows, cols } => {
            validate_grid_dims(&path, *rows, *cols)?;
            let expected = (*rows as i64) * (*cols as i64);
            validate_numeric_data(&path, data, expected)
        }
        Visualization::MultiGrid {
            rows,
            cols,
            channels,
            channel_names,
        } => {
            validate_grid_dims(&path, *rows, *cols)?;
            if !(MULTI_GRID_CHANNELS_MIN..=MULTI_GRID_CHANNELS_MAX).contains(channels) {
                return Err(fail(
                    &path,
                    format!(
                        "channels {channels} out of range [{MULTI_GRID_CHANNELS_MIN}, {MULTI_GRID_CHANNELS_MAX}]"
                    ),
                ));
            }
            if !channel_names.is_empty() && channel_names.len() as i32 != *channels {
                return Err(fail(
                    &path,
                    format!(
                        "channel_names has {} entries but channels is {}",
                        channel_names.len(),
                        channels
                    ),
                ));
            }
            let expected = (*rows as i64) * (*cols as i64) * (*channels as i64);
            validate_numeric_data(&path, data, expected)
        }
        Visualization::Scalar { label, min, max, .. } => {
            validate_label(&path, label)?;
            validate_finite(&path, *min)?;
            validate_finite(&path, *max)?;
            if !(*min < *max) {
                return Err(fail(&path, format!("min {min} must be < max {max}")));
            }
            let values = expect_floats(&path, data, 1)?;
            let v = values[0];
            validate_finite(&path, v)?;
            if v < *min || v > *max {
                return Err(fail(
                    &path,
                    format!("scalar value {v} out of range [{min}, {max}]"),
                ));
            }
            Ok(())
        }
        Visualization::Vector {
            label,
            max_magnitude,
        } => {
            validate_label(&path, label)?;
            validate_finite(&path, *max_magnitude)?;
            if !(*max_magnitude > 0.0) {
                return Err(fail(
                    &path,
                    format!("max_magnitude {max_magnitude} must be > 0"),
                ));
            }
            let values = expect_floats(&path, data, 2)?;
            for v in &values {
                validate_finite(&path, *v)?;
            }
            let norm = (values[0] * values[0] + values[1] * values[1]).sqrt();
            if norm > *max_magnitude {
                return Err(fail(
                    &path,
                    format!("vector magnitude {norm} exceeds max_magnitude {max_magnitude}"),
                ));
            }
            Ok(())
        }
        Visualization::TimeSeries {
            label,
            points,
            min_value,
            max_value,
        } => {
            validate_label(&path, label)?;
            if !(TIME_SERIES_POINTS_MIN..=TIME_SERIES_POINTS_MAX).contains(points) {
                return Err(fail(
                    &path,
                    format!(
                        "points {points} out of range [{TIME_SERIES_POINTS_MIN}, {TIME_SERIES_POINTS_MAX}]"
                    ),
                ));
            }
            validate_finite(&path, *min_value)?;
            validate_finite(&path, *max_value)?;
            if !(*min_value < *max_value) {
                return Err(fail(
                    &path,
                    format!("min_value {min_value} must be < max_value {max_value}"),
                ));
            }
            let values = expect_floats(&path, data, *points as usize)?;
            for v in &values {
                validate_finite(&path, *v)?;
                if *v < *min_value || *v > *max_value {
                    return Err(fail(
                        &path,
                        format!("time series value {v} out of range [{min_value}, {max_value}]"),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn validate_grid_dims(path: &str, rows: i32, cols: i32) -> Result<(), ValidationError> {
    if !(GRID_DIM_MIN..=GRID_DIM_MAX).contains(&rows) {
        return Err(fail(
            path,
            format!("rows {rows} out of range [{GRID_DIM_MIN}, {GRID_DIM_MAX}]"),
        ));
    }
    if !(GRID_DIM_MIN..=GRID_DIM_MAX).contains(&cols) {
        return Err(fail(
            path,
            format!("cols {cols} out of range [{GRID_DIM_MIN}, {GRID_DIM_MAX}]"),
        ));
    }
    Ok(())
}

fn validate_label(path: &str, label: &str) -> Result<(), ValidationError> {
    if label.is_empty() {
        return Err(fail(path, "label must be non-empty"));
    }
    Ok(())
}

fn validate_finite(path: &str, v: f64) -> Result<(), ValidationError> {
    if !v.is_finite() {
        return Err(fail(path, format!("value {v} is not finite")));
    }
    Ok(())
}

/// Grid/MultiGrid accept either ints or floats; just check the length and,
/// for floats, finiteness.
fn validate_numeric_data(
    path: &str,
    data: &DataBlock,
    expected_len: i64,
) -> Result<(), ValidationError> {
    match data {
        DataBlock::Ints { values } => {
            if values.len() as i64 != expected_len {
                return Err(fail(
                    path,
                    format!(
                        "grid too large or too small: got {} values, expected {}",
                        values.len(),
                        expected_len
                    ),
                ));
            }
            Ok(())
        }
        DataBlock::Floats { values } => {
            if values.len() as i64 != expected_len {
                return Err(fail(
                    path,
                    format!(
                        "grid too large or too small: got {} values, expected {}",
                        values.len(),
                        expected_len
                    ),
                ));
            }
            for v in values {
                validate_finite(path, *v)?;
            }
            Ok(())
        }
    }
}

/// Scalar/Vector/TimeSeries all require floats of an exact length.
fn expect_floats(
    path: &str,
    data: &DataBlock,
    expected_len: usize,
) -> Result<Vec<f64>, ValidationError> {
    match data {
        DataBlock::Floats { values } => {
            if values.len() != expected_len {
                return Err(fail(
                    path,
                    format!(
                        "expected {} float value(s), got {}",
                        expected_len,
                        values.len()
                    ),
                ));
            }
            Ok(values.clone())
        }
        DataBlock::Ints { .. } => Err(fail(path, "expected float data, got integer data")),
    }
}

fn validate_output_schema(schema: &OutputSchema) -> Result<(), ValidationError> {
    let OutputSchema::OptionList { options } = schema;

    if options.len() < OPTION_LIST_MIN_OPTIONS {
        return Err(fail(
            "output schema",
            format!(
                "option list has {} option(s), need at least {}",
                options.len(),
                OPTION_LIST_MIN_OPTIONS
            ),
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, option) in options.iter().enumerate() {
        if option.label.is_empty() {
            return Err(fail(
                "output schema",
                format!("option {idx} has an empty label"),
            ));
        }
        if option.hotkey.chars().count() != 1 {
            return Err(fail(
                "output schema",
                format!(
                    "option {idx} hotkey {:?} must be exactly one character",
                    option.hotkey
                ),
            ));
        }
        if !seen.insert(option.hotkey.as_str()) {
            return Err(fail(
                "output schema",
                format!(
                    "duplicate hotkey {:?} at option {idx}",
                    option.hotkey
                ),
            ));
        }
    }

    Ok(())
}
