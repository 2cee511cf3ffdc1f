//! Component D: Rate Scanner & Window Sorter (spec §4.D).
//!
//! Replaces the sortable-string key the original describes
//! (`"%04.2f_%04.2f_%04d_[cd]%02d"`) with a structured, `Ord`-deriving
//! `SortKey`, per spec §9 REDESIGN FLAGS ("stringly-typed hashes/keys").

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::{ChargeWindow, ExportWindow, Minute};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WindowKind {
    Charge,
    Export,
}

/// One opaque reference into either the charge or export window list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub kind: WindowKind,
    pub id: usize,
}

/// A window's rounded effective rate plus enough metadata to re-sort it.
#[derive(Clone, Copy, Debug)]
pub struct WindowInfo {
    pub key: WindowKey,
    pub start: Minute,
    pub average: f64,
    pub average_secondary: f64,
}

/// Sort order for the price-ordered pass: highest effective price first,
/// ties broken by later start time, then charge-before-export, then id.
/// Export windows are pushed after all charge windows when
/// `calculate_export_first` is false, mirroring the teacher-sourced `"zz_"`
/// prefix without string formatting in the hot path.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SortKey {
    export_last: bool,
    neg_average: f64,
    neg_average_secondary: f64,
    neg_start: Minute,
    id: usize,
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Eq for SortKey {}
impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.export_last
            .cmp(&other.export_last)
            .then_with(|| self.neg_average.partial_cmp(&other.neg_average).unwrap_or(Ordering::Equal))
            .then_with(|| self.neg_average_secondary.partial_cmp(&other.neg_average_secondary).unwrap_or(Ordering::Equal))
            .then_with(|| self.neg_start.cmp(&other.neg_start))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Loss-adjusted effective rate for a charge window, per spec §4.D.
pub fn charge_effective_rate(nominal: f64, inverter_loss: f64, battery_loss: f64, cycle_cost: f64, carbon_adder: f64, self_suff_adder: f64) -> f64 {
    nominal / (inverter_loss * battery_loss).max(1e-9) + cycle_cost + carbon_adder + self_suff_adder
}

/// Loss-adjusted effective rate for an export window, per spec §4.D.
pub fn export_effective_rate(nominal: f64, inverter_loss: f64, battery_loss_discharge: f64, cycle_cost: f64, carbon_adder: f64) -> f64 {
    nominal * inverter_loss * battery_loss_discharge - cycle_cost + carbon_adder
}

/// Output of `sort_window_by_price_combined`: a price-descending ordering of
/// window keys, plus the unique rounded price set and reverse lookup.
pub struct PriceCombined {
    pub ordered: Vec<WindowKey>,
    pub info: BTreeMap<(WindowKind, usize), WindowInfo>,
    pub price_set: Vec<f64>,
    pub price_links: BTreeMap<i64, Vec<WindowKey>>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Builds the combined price-ordered view over charge and export windows.
pub fn sort_window_by_price_combined(
    charge_windows: &[ChargeWindow],
    charge_rates: &[f64],
    export_windows: &[ExportWindow],
    export_rates: &[f64],
    calculate_export_first: bool,
) -> PriceCombined {
    let mut entries: Vec<(WindowInfo, SortKey)> = Vec::new();
    let mut info = BTreeMap::new();

    for (i, w) in charge_windows.iter().enumerate() {
        let avg = round1(*charge_rates.get(i).unwrap_or(&w.average_rate));
        let key = WindowKey { kind: WindowKind::Charge, id: i };
        let wi = WindowInfo { key, start: w.start, average: avg, average_secondary: 0.0 };
        info.insert((WindowKind::Charge, i), wi);
        entries.push((
            wi,
            SortKey { export_last: false, neg_average: -avg, neg_average_secondary: 0.0, neg_start: -w.start, id: i },
        ));
    }
    for (j, w) in export_windows.iter().enumerate() {
        let avg = round1(*export_rates.get(j).unwrap_or(&w.average_rate));
        let key = WindowKey { kind: WindowKind::Export, id: j };
        let wi = WindowInfo { key, start: w.start, average: avg, average_secondary: 0.0 };
        info.insert((WindowKind::Export, j), wi);
        entries.push((
            wi,
            SortKey {
                export_last: !calculate_export_first,
                neg_average: -avg,
                neg_average_secondary: 0.0,
                neg_start: -w.start,
                id: j,
            },
        ));
    }

    entries.sort_by(|a, b| a.1.cmp(&b.1));

    let mut price_links: BTreeMap<i64, Vec<WindowKey>> = BTreeMap::new();
    for (wi, _) in &entries {
        price_links.entry((wi.average * 10.0).round() as i64).or_default().push(wi.key);
    }
    let mut price_set: Vec<f64> = price_links.keys().map(|p| *p as f64 / 10.0).collect();
    price_set.sort_by(|a, b| a.partial_cmp(b).unwrap());
    price_set.dedup();

    PriceCombined {
        ordered: entries.into_iter().map(|(wi, _)| wi.key).collect(),
        info,
        price_set,
        price_links,
    }
}

/// Time-ordered combined view, per spec §4.D `sort_window_by_time_combined`.
pub fn sort_window_by_time_combined(charge_windows: &[ChargeWindow], export_windows: &[ExportWindow]) -> Vec<WindowKey> {
    let mut entries: Vec<(Minute, WindowKind, usize)> = Vec::new();
    for (i, w) in charge_windows.iter().enumerate() {
        entries.push((w.start, WindowKind::Charge, i));
    }
    for (j, w) in export_windows.iter().enumerate() {
        entries.push((w.start, WindowKind::Export, j));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)).then_with(|| (a.1 == WindowKind::Export).cmp(&(b.1 == WindowKind::Export))));
    entries.into_iter().map(|(_, kind, id)| WindowKey { kind, id }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cw(start: Minute, end: Minute, rate: f64) -> ChargeWindow {
        ChargeWindow { start, end, average_rate: rate, target: None, set: None, locked: false }
    }
    fn ew(start: Minute, end: Minute, rate: f64) -> ExportWindow {
        ExportWindow { start, end, average_rate: rate, target: None, set: None, locked: false }
    }

    #[test]
    fn orders_highest_price_first() {
        let charge = vec![cw(0, 30, 5.0), cw(30, 60, 30.0)];
        let rates = vec![5.0, 30.0];
        let result = sort_window_by_price_combined(&charge, &rates, &[], &[], true);
        assert_eq!(result.ordered[0], WindowKey { kind: WindowKind::Charge, id: 1 });
        assert_eq!(result.price_set, vec![5.0, 30.0]);
    }

    #[test]
    fn export_last_when_export_first_disabled() {
        let charge = vec![cw(0, 30, 5.0)];
        let crates = vec![5.0];
        let export = vec![ew(0, 30, 50.0)];
        let erates = vec![50.0];
        let result = sort_window_by_price_combined(&charge, &crates, &export, &erates, false);
        assert_eq!(result.ordered[0].kind, WindowKind::Charge);
        assert_eq!(result.ordered[1].kind, WindowKind::Export);
    }

    #[test]
    fn time_combined_sorts_by_start() {
        let charge = vec![cw(60, 90, 1.0)];
        let export = vec![ew(0, 30, 2.0)];
        let keys = sort_window_by_time_combined(&charge, &export);
        assert_eq!(keys[0].kind, WindowKind::Export);
        assert_eq!(keys[1].kind, WindowKind::Charge);
    }
}
