//! Contest scoring: per-benchmark score, per-benchmark ranks and the final
//! team placing, plus the benchmark result table read from tool outputs.

use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const RUNTIME_WEIGHT: f64 = 0.9;
const WIRELENGTH_WEIGHT: f64 = 0.1;
const WALL_CLOCK_PREFIX: &str = "Wall-clock time (sec): ";
const WIRELENGTH_TAG: &str = "Wirelength: ";

/// Score of one benchmark run; lower is better. Failing runs score infinity
/// whatever their runtime or wirelength.
pub fn score_benchmark(check: bool, runtime: Option<f64>, cpw: Option<f64>) -> f64 {
    match (check, runtime, cpw) {
        (true, Some(runtime), Some(cpw)) => RUNTIME_WEIGHT * runtime + WIRELENGTH_WEIGHT * cpw,
        _ => f64::INFINITY,
    }
}

/// Ranks teams on every benchmark. Equal scores share a rank and the next
/// distinct score takes the following rank.
pub fn rank_benchmark_scores(
    scores: &BTreeMap<String, Vec<f64>>,
) -> Result<BTreeMap<String, Vec<usize>>> {
    let mut num_benchmarks = None;
    for (team, s) in scores {
        match num_benchmarks {
            None => num_benchmarks = Some(s.len()),
            Some(n) if n != s.len() => {
                bail!("team '{}' has {} benchmark scores, expected {}", team, s.len(), n)
            }
            _ => {}
        }
    }

    let mut rankings: BTreeMap<String, Vec<usize>> =
        scores.keys().map(|k| (k.clone(), Vec::new())).collect();
    for b in 0..num_benchmarks.unwrap_or(0) {
        let mut distinct: Vec<f64> = scores.values().map(|s| s[b]).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        for (team, s) in scores {
            let rank = distinct.partition_point(|&x| x < s[b]) + 1;
            if let Some(r) = rankings.get_mut(team) {
                r.push(rank);
            }
        }
    }
    Ok(rankings)
}

/// Orders teams by their mean rank; each entry is one place, holding every
/// team that tied for it.
pub fn rank_teams(rankings: &BTreeMap<String, Vec<usize>>) -> Vec<BTreeSet<String>> {
    let mut averages: Vec<(f64, &String)> = rankings
        .iter()
        .map(|(team, ranks)| {
            let avg = ranks.iter().sum::<usize>() as f64 / ranks.len().max(1) as f64;
            (avg, team)
        })
        .collect();
    averages.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut places: Vec<(f64, BTreeSet<String>)> = Vec::new();
    for (avg, team) in averages {
        match places.last_mut() {
            Some((last, set)) if *last == avg => {
                set.insert(team.clone());
            }
            _ => places.push((avg, BTreeSet::from([team.clone()]))),
        }
    }
    places.into_iter().map(|(_, set)| set).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub name: String,
    pub passed: bool,
    pub runtime: Option<f64>,
    pub wirelength: Option<String>,
}

impl BenchmarkResult {
    pub fn score(&self) -> f64 {
        let cpw = self.wirelength.as_deref().and_then(|w| w.parse().ok());
        score_benchmark(self.passed, self.runtime, cpw)
    }
}

/// Reads `<bench>.check`, `<bench>.phys.log` and `<bench>.wirelength`.
/// Anything missing or malformed leaves the corresponding field unset.
pub fn read_benchmark(bench: &Path) -> BenchmarkResult {
    let name = bench.display().to_string();
    let sibling = |ext: &str| format!("{}{}", name, ext);

    let passed = fs::read_to_string(sibling(".check"))
        .map(|s| s.lines().next().map(str::trim_end) == Some("PASS"))
        .unwrap_or(false);

    let mut result = BenchmarkResult {
        name: name.clone(),
        passed,
        runtime: None,
        wirelength: None,
    };
    if !passed {
        return result;
    }

    result.runtime = fs::read_to_string(sibling(".phys.log"))
        .ok()
        .and_then(|log| {
            log.lines()
                .last()
                .and_then(|l| l.trim_end().strip_prefix(WALL_CLOCK_PREFIX))
                .and_then(|s| s.trim().parse().ok())
        });
    if result.runtime.is_none() {
        return result;
    }

    result.wirelength = fs::read_to_string(sibling(".wirelength"))
        .ok()
        .and_then(|text| {
            text.lines()
                .find(|l| l.contains(WIRELENGTH_TAG))
                .and_then(|l| l.split_whitespace().last())
                .map(str::to_string)
        });
    result
}

pub fn format_table(results: &[BenchmarkResult]) -> String {
    let rule = "-".repeat(71);
    let mut out = format!(
        "{:<30} {:>10} {:>10}\n{}\n",
        "Benchmark", "Wall Clock (sec)", "Critical-Path Wirelength", rule
    );
    let mut total = 0.0;
    for r in results {
        let runtime = r.runtime.unwrap_or(f64::INFINITY);
        total += runtime;
        let cpw = r.wirelength.clone().unwrap_or_else(|| "inf".to_string());
        out.push_str(&format!("{:<30} {:>10} {:>10}\n", r.name, runtime, cpw));
    }
    out.push_str(&format!("{}\n{:<30} {:>10.2}\n", rule, "Total", total));
    out
}
