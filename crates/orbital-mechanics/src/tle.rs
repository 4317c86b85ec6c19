//! Two-Line-Element parsing.
//!
//! Record grammar: an optional name line followed by the `1 `/`2 ` element
//! lines. Field extraction and checksum validation are delegated to
//! `sgp4::Elements`; only the resulting Keplerian elements are kept, since
//! propagation is done by the classical Kepler solve in this crate.

use std::io::BufRead;

use chrono::{DateTime, Utc};

use crate::kepler::KeplerianElements;
use crate::{OrbitalError, Result};

/// One satellite parsed from a TLE stream.
#[derive(Debug, Clone)]
pub struct TleRecord {
    pub name: String,
    pub elements: KeplerianElements,
}

/// Parses every TLE record from the reader.
///
/// A satellite without a name line is named after its catalog number.
pub fn parse_tle<R: BufRead>(reader: R) -> Result<Vec<TleRecord>> {
    let mut lines = reader.lines();
    let mut records = Vec::new();

    while let Some(line) = lines.next() {
        let line = line?;
        let first = line.trim();
        if first.is_empty() {
            continue;
        }

        let (name, line1) = if first.starts_with('1') {
            (None, first.to_owned())
        } else {
            let line1 = next_line(&mut lines)?;
            if !line1.starts_with('1') {
                return Err(OrbitalError::InvalidTle(format!(
                    "expected element line 1 after name {first:?}"
                )));
            }
            (Some(first.to_owned()), line1)
        };

        let line2 = next_line(&mut lines)?;
        if !line2.starts_with('2') {
            return Err(OrbitalError::InvalidTle(format!(
                "expected element line 2, got {line2:?}"
            )));
        }

        records.push(record_from_lines(name, &line1, &line2)?);
    }

    Ok(records)
}

fn next_line<R: BufRead>(lines: &mut std::io::Lines<R>) -> Result<String> {
    match lines.next() {
        Some(line) => Ok(line?.trim().to_owned()),
        None => Err(OrbitalError::InvalidTle("truncated TLE record".into())),
    }
}

fn record_from_lines(name: Option<String>, line1: &str, line2: &str) -> Result<TleRecord> {
    let elements = sgp4::Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
        .map_err(|e| OrbitalError::InvalidTle(format!("{e:?}")))?;

    let epoch: DateTime<Utc> = DateTime::from_naive_utc_and_offset(elements.datetime, Utc);
    let name = name.unwrap_or_else(|| elements.norad_id.to_string());

    Ok(TleRecord {
        name,
        elements: KeplerianElements::new(
            elements.inclination,
            elements.right_ascension,
            elements.eccentricity,
            elements.argument_of_perigee,
            elements.mean_anomaly,
            elements.mean_motion,
            epoch,
        ),
    })
}
