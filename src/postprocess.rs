//! Component H: Post-Processors (spec §4.H).
//!
//! Takes the tuned candidate plan and turns it into the publishable window
//! list: target/set values, overlap removal, manual overrides, and
//! achieved-range clipping using the winning simulation's SoC trace.

use std::collections::BTreeMap;

use crate::types::{ChargeWindow, ExportLimit, ExportWindow, Minute, PredictionResult};

/// Manual override maps, keyed by window start minute (spec §4.H.3
/// "six manual maps": force-charge/force-export/freeze-charge/freeze-export/
/// pause-charge/pause-export).
#[derive(Clone, Debug, Default)]
pub struct ManualOverrides {
    pub force_charge: BTreeMap<Minute, f64>,
    pub force_export: BTreeMap<Minute, u8>,
    pub freeze_charge: BTreeMap<Minute, bool>,
    pub freeze_export: BTreeMap<Minute, bool>,
    pub pause_charge: BTreeMap<Minute, bool>,
    pub pause_export: BTreeMap<Minute, bool>,
}

/// Publishes `target`/`set` onto each window from the winning candidate's
/// raw limits (spec §4.H.1).
pub fn publish_targets(charge_windows: &mut [ChargeWindow], charge_limits: &[f64], export_windows: &mut [ExportWindow], export_limits: &[ExportLimit]) {
    for (w, &limit) in charge_windows.iter_mut().zip(charge_limits) {
        w.target = Some(limit);
        w.set = Some(limit);
    }
    for (w, &limit) in export_windows.iter_mut().zip(export_limits) {
        let pct = limit.to_legacy_float();
        w.target = Some(pct);
        w.set = Some(pct);
    }
}

/// Removes overlapping windows of the same kind, keeping the one that
/// starts earlier; on an exact tie, keeps the lower index (spec §4.H.2,
/// invariant 1: "no two windows of the same kind overlap").
pub fn remove_overlaps(windows: &mut Vec<ChargeWindow>) {
    windows.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    let mut kept: Vec<ChargeWindow> = Vec::with_capacity(windows.len());
    for w in windows.drain(..) {
        if let Some(last) = kept.last_mut() {
            if w.start < last.end {
                continue;
            }
        }
        kept.push(w);
    }
    *windows = kept;
}

/// Same overlap rule for export windows (kept as a separate function since
/// `ChargeWindow`/`ExportWindow` are distinct types, spec §3).
pub fn remove_overlaps_export(windows: &mut Vec<ExportWindow>) {
    windows.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    let mut kept: Vec<ExportWindow> = Vec::with_capacity(windows.len());
    for w in windows.drain(..) {
        if let Some(last) = kept.last_mut() {
            if w.start < last.end {
                continue;
            }
        }
        kept.push(w);
    }
    *windows = kept;
}

/// Cancels a charge window against an export window that overlaps it while
/// both are actively engaged — a battery cannot charge and export in the
/// same minute (spec §4.H.2, invariant 4). A locked (manually pinned) window
/// always wins over an unlocked one; between two unlocked windows the charge
/// window is kept and the conflicting export window is dropped.
pub fn remove_cross_kind_overlaps(charge_windows: &mut Vec<ChargeWindow>, export_windows: &mut Vec<ExportWindow>) {
    let is_active_charge = |w: &ChargeWindow| w.set.map(|s| s > 0.0).unwrap_or(false);
    let is_active_export = |w: &ExportWindow| w.set.map(|s| s < ExportLimit::Freeze.to_legacy_float()).unwrap_or(false);
    let overlaps = |a_start: Minute, a_end: Minute, b_start: Minute, b_end: Minute| a_start < b_end && b_start < a_end;

    export_windows.retain(|e| {
        if !is_active_export(e) {
            return true;
        }
        match charge_windows.iter().find(|c| is_active_charge(c) && overlaps(c.start, c.end, e.start, e.end)) {
            None => true,
            Some(c) => e.locked && !c.locked,
        }
    });

    charge_windows.retain(|c| {
        if !is_active_charge(c) {
            return true;
        }
        match export_windows.iter().find(|e| is_active_export(e) && overlaps(c.start, c.end, e.start, e.end)) {
            None => true,
            Some(e) => c.locked && !e.locked,
        }
    });
}

/// Applies manual overrides on top of the optimizer's output. A pinned
/// window is marked `locked` so the tuners (component G) never touch it
/// again on a subsequent tick (spec invariant 6).
pub fn apply_manual_overrides(charge_windows: &mut [ChargeWindow], export_windows: &mut [ExportWindow], overrides: &ManualOverrides) {
    for w in charge_windows.iter_mut() {
        if let Some(&kwh) = overrides.force_charge.get(&w.start) {
            w.target = Some(kwh);
            w.set = Some(kwh);
            w.locked = true;
        }
        if overrides.freeze_charge.get(&w.start).copied().unwrap_or(false) {
            w.set = Some(0.0);
            w.locked = true;
        }
        if overrides.pause_charge.get(&w.start).copied().unwrap_or(false) {
            w.target = None;
            w.set = None;
            w.locked = true;
        }
    }
    for w in export_windows.iter_mut() {
        if let Some(&pct) = overrides.force_export.get(&w.start) {
            w.target = Some(pct as f64);
            w.set = Some(pct as f64);
            w.locked = true;
        }
        if overrides.freeze_export.get(&w.start).copied().unwrap_or(false) {
            w.set = Some(ExportLimit::Freeze.to_legacy_float());
            w.locked = true;
        }
        if overrides.pause_export.get(&w.start).copied().unwrap_or(false) {
            w.target = None;
            w.set = None;
            w.locked = true;
        }
    }
}

/// Clips a window's published bounds to what the winning simulation's SoC
/// trace actually achieved within it, rather than the requested target,
/// since the two can legitimately diverge (e.g. a charge window the PV
/// already filled before the grid contribution was needed), per spec
/// §4.H.4/5.
pub fn clip_to_achieved(charge_windows: &mut [ChargeWindow], export_windows: &mut [ExportWindow], mid: &PredictionResult) {
    for w in charge_windows.iter_mut() {
        if let Some((_, max)) = mid.soc_range_in(w.start, w.end) {
            w.set = Some(max);
        }
    }
    for w in export_windows.iter_mut() {
        if let Some((min, _)) = mid.soc_range_in(w.start, w.end) {
            w.set = Some(min);
        }
    }
}

/// Merges two adjacent windows of the same kind when the second's rate
/// reaches strictly higher "usefulness" than the first AND the first never
/// actually reached its target inside the simulation trace — the exact
/// merge condition from spec §4.H.6. Returns `true` if a merge occurred.
pub fn maybe_merge_charge(a: &mut ChargeWindow, b: &ChargeWindow, mid: &PredictionResult) -> bool {
    if a.end != b.start {
        return false;
    }
    let first_reached_target = match (a.target, mid.soc_range_in(a.start, a.end)) {
        (Some(target), Some((_, achieved_max))) => achieved_max + 1e-6 >= target,
        _ => false,
    };
    if b.average_rate > a.average_rate && !first_reached_target {
        a.end = b.end;
        a.target = b.target.or(a.target);
        a.set = b.set.or(a.set);
        true
    } else {
        false
    }
}

/// Drops windows whose published `set` value has no effect (charge windows
/// set to the current SoC or below, export windows set to `Off`), per spec
/// §4.H.7 "discard unused".
pub fn discard_unused(charge_windows: &mut Vec<ChargeWindow>, soc_now: f64, export_windows: &mut Vec<ExportWindow>) {
    charge_windows.retain(|w| w.set.map(|s| s > soc_now).unwrap_or(false) || w.locked);
    export_windows.retain(|w| w.set.map(|s| s < ExportLimit::Off.to_legacy_float()).unwrap_or(false) || w.locked);
}
