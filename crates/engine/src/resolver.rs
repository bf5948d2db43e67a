//! Location resolution: raw storage location to picking area id.
//!
//! A storage location may list several candidates separated by `/` or `,`,
//! each optionally followed by a parenthetical note (`"A-1-2 (top)/B-3"`).
//! Each candidate is cut at the first `(`, trimmed and uppercased, then:
//!
//! 1. skipped if it is an overflow location
//! 2. rewritten by the first transformation whose prefix it starts with
//! 3. renamed through the bin mappings
//! 4. normalized to its first two `-` segments (`A-12-3` → `A-12`)
//! 5. looked up by picking-area name
//!
//! The first candidate that matches wins.

use pickroute_core::catalog::PickingArea;
use pickroute_core::venue::VenueSettings;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Rules for one venue, compiled once per run against the picking-area
/// snapshot used by that run.
#[derive(Debug, Clone, Default)]
pub struct LocationRules {
    overflow: HashSet<String>,
    /// (prefix, replacement) in configured order
    transformations: Vec<(String, String)>,
    bin_renames: HashMap<String, String>,
    /// Uppercased picking-area name → id
    areas_by_name: HashMap<String, String>,
}

/// What happened to one candidate during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateTrace {
    /// The candidate after cutting, trimming and uppercasing
    pub token: String,
    /// Skipped as an overflow location
    pub overflow: bool,
    /// `(prefix, replacement)` of the transformation that applied
    pub transformation: Option<(String, String)>,
    /// Bin mapping target, when the token was renamed
    pub renamed: Option<String>,
    /// The label that was looked up
    pub normalized: Option<String>,
    /// Matched picking area id
    pub matched: Option<String>,
}

fn label(value: &str) -> String {
    value.trim().to_uppercase()
}

impl LocationRules {
    pub fn compile(venue: &VenueSettings, areas: &[PickingArea]) -> Self {
        let overflow = venue
            .overflow_locations
            .iter()
            .map(|o| label(o.label()))
            .filter(|o| !o.is_empty())
            .collect();

        let transformations = venue
            .location_transformations
            .iter()
            .filter_map(|t| {
                let prefix = label(&t.original);
                if prefix.is_empty() {
                    warn!(venue_id = %venue.venue_id, "Ignoring location transformation with empty prefix");
                    return None;
                }
                Some((prefix, label(&t.transformed)))
            })
            .collect();

        // Later mappings for the same bin overwrite earlier ones
        let bin_renames = venue
            .bin_mappings
            .iter()
            .map(|m| (label(&m.bin_location), label(&m.picking_area)))
            .collect();

        let areas_by_name = areas
            .iter()
            .map(|a| (label(&a.name), a.id.clone()))
            .collect();

        Self {
            overflow,
            transformations,
            bin_renames,
            areas_by_name,
        }
    }

    /// Resolve a storage location to a picking area id.
    pub fn resolve(&self, storage_location: &str) -> Option<String> {
        let matched = candidates(storage_location).find_map(|token| self.trace(token).matched);
        if matched.is_none() && !storage_location.trim().is_empty() {
            debug!(storage_location, "Storage location did not resolve");
        }
        matched
    }

    /// Per-candidate trace, stopping after the first match.
    pub fn explain(&self, storage_location: &str) -> Vec<CandidateTrace> {
        let mut traces = Vec::new();
        for token in candidates(storage_location) {
            let trace = self.trace(token);
            let done = trace.matched.is_some();
            traces.push(trace);
            if done {
                break;
            }
        }
        traces
    }

    pub fn area_count(&self) -> usize {
        self.areas_by_name.len()
    }

    fn trace(&self, token: String) -> CandidateTrace {
        let mut trace = CandidateTrace {
            token,
            overflow: false,
            transformation: None,
            renamed: None,
            normalized: None,
            matched: None,
        };

        if self.overflow.contains(&trace.token) {
            trace.overflow = true;
            return trace;
        }

        let mut current = trace.token.clone();

        if let Some((prefix, replacement)) = self
            .transformations
            .iter()
            .find(|(prefix, _)| current.starts_with(prefix.as_str()))
        {
            current = replacement.clone();
            trace.transformation = Some((prefix.clone(), replacement.clone()));
        }

        if let Some(target) = self.bin_renames.get(&current) {
            current = target.clone();
            trace.renamed = Some(target.clone());
        }

        let normalized = normalize(&current).to_string();
        if !normalized.is_empty() {
            trace.matched = self.areas_by_name.get(&normalized).cloned();
        }
        trace.normalized = Some(normalized);
        trace
    }
}

/// Split a raw storage location into its uppercased candidate tokens,
/// in input order. Empty candidates are dropped.
pub fn candidates(storage_location: &str) -> impl Iterator<Item = String> + '_ {
    storage_location
        .split(['/', ','])
        .map(|candidate| {
            let head = candidate
                .split_once('(')
                .map_or(candidate, |(head, _)| head);
            head.trim().to_uppercase()
        })
        .filter(|token| !token.is_empty())
}

/// Keep the first two `-`-delimited segments of a location.
pub fn normalize(location: &str) -> &str {
    match location.match_indices('-').nth(1) {
        Some((idx, _)) => &location[..idx],
        None => location,
    }
}
