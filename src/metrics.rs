use super::model::{Algorithm, CycleRecord};

use std::fmt;

/// Per algorithm totals over the whole cycle history.
#[derive(Clone, Debug, PartialEq)]
pub struct AlgorithmSummary {
    pub algorithm: Algorithm,
    /// Number of collections run with this algorithm.
    pub cycles: usize,
    pub total_freed: u64,
    pub total_bytes: u64,
    /// Sum of all pause durations, in milliseconds.
    pub total_pause: f64,
    pub avg_pause: f64,
    pub max_pause: f64,
    /// Objects freed per cycle.
    pub throughput: f64,
}

/// One point of the pause duration timeline. Only the algorithm that ran the
/// cycle has a value at this index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimelinePoint {
    /// 1-based position in the history.
    pub cycle: usize,
    pub algorithm: Algorithm,
    pub pause: f64,
}

impl TimelinePoint {
    pub fn pause_for(&self, algorithm: Algorithm) -> Option<f64> {
        (self.algorithm == algorithm).then_some(self.pause)
    }
}

/// Totals over the history regardless of algorithm.
#[derive(Clone, Debug, PartialEq)]
pub struct HistorySummary {
    pub total_cycles: usize,
    pub total_objects_freed: u64,
    pub total_bytes_reclaimed: u64,
    pub avg_pause: f64,
    pub max_pause: f64,
    pub min_pause: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    /// No cycles have been recorded. Consumers show a "no data" state rather
    /// than an all zero chart.
    Empty,
    Data {
        /// In order of each algorithm's first appearance in the history.
        summaries: Vec<AlgorithmSummary>,
        timeline: Vec<TimelinePoint>,
        overall: HistorySummary,
    },
}

/// Aggregates the full cycle history.
///
/// Nothing is cached between calls: every call recomputes from `records`.
pub fn aggregate(records: &[CycleRecord]) -> Comparison {
    if records.is_empty() {
        return Comparison::Empty;
    }

    let mut summaries: Vec<AlgorithmSummary> = vec![];

    for record in records {
        let index = match summaries
            .iter()
            .position(|summary| summary.algorithm == record.algorithm)
        {
            Some(index) => index,
            None => {
                summaries.push(AlgorithmSummary {
                    algorithm: record.algorithm,
                    cycles: 0,
                    total_freed: 0,
                    total_bytes: 0,
                    total_pause: 0.0,
                    avg_pause: 0.0,
                    max_pause: 0.0,
                    throughput: 0.0,
                });
                summaries.len() - 1
            }
        };

        let summary = &mut summaries[index];
        summary.cycles += 1;
        summary.total_freed += record.objects_freed;
        summary.total_bytes += record.bytes_reclaimed;
        summary.total_pause += record.pause_duration;
        summary.max_pause = summary.max_pause.max(record.pause_duration);
    }

    // every summary has at least one cycle
    for summary in &mut summaries {
        summary.avg_pause = summary.total_pause / summary.cycles as f64;
        summary.throughput = summary.total_freed as f64 / summary.cycles as f64;
    }

    let timeline = records
        .iter()
        .enumerate()
        .map(|(i, record)| TimelinePoint {
            cycle: i + 1,
            algorithm: record.algorithm,
            pause: record.pause_duration,
        })
        .collect();

    let pauses = records.iter().map(|record| record.pause_duration);
    let overall = HistorySummary {
        total_cycles: records.len(),
        total_objects_freed: records.iter().map(|record| record.objects_freed).sum(),
        total_bytes_reclaimed: records.iter().map(|record| record.bytes_reclaimed).sum(),
        avg_pause: pauses.clone().sum::<f64>() / records.len() as f64,
        max_pause: pauses.clone().fold(f64::NEG_INFINITY, f64::max),
        min_pause: pauses.fold(f64::INFINITY, f64::min),
    };

    Comparison::Data {
        summaries,
        timeline,
        overall,
    }
}

impl Comparison {
    pub fn is_empty(&self) -> bool {
        matches!(self, Comparison::Empty)
    }

    pub fn summaries(&self) -> &[AlgorithmSummary] {
        match self {
            Comparison::Empty => &[],
            Comparison::Data { summaries, .. } => summaries,
        }
    }

    pub fn summary(&self, algorithm: Algorithm) -> Option<&AlgorithmSummary> {
        self.summaries()
            .iter()
            .find(|summary| summary.algorithm == algorithm)
    }

    pub fn timeline(&self) -> &[TimelinePoint] {
        match self {
            Comparison::Empty => &[],
            Comparison::Data { timeline, .. } => timeline,
        }
    }

    pub fn overall(&self) -> Option<&HistorySummary> {
        match self {
            Comparison::Empty => None,
            Comparison::Data { overall, .. } => Some(overall),
        }
    }

    /// The `(cycle, pause)` points of a single algorithm's line, skipping the
    /// cycles where another algorithm ran.
    pub fn series(&self, algorithm: Algorithm) -> Vec<(usize, f64)> {
        self.timeline()
            .iter()
            .filter_map(|point| point.pause_for(algorithm).map(|pause| (point.cycle, pause)))
            .collect()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Comparison::Data { summaries, overall, .. } = self else {
            return write!(
                f,
                "No GC cycles recorded yet. Run some garbage collections to see comparison data."
            );
        };

        writeln!(
            f,
            "{:<20} {:>6} {:>12} {:>12} {:>12} {:>12}",
            "algorithm", "cycles", "avg pause", "total freed", "total bytes", "throughput"
        )?;

        for s in summaries {
            writeln!(
                f,
                "{:<20} {:>6} {:>9.3} ms {:>12} {:>10} B {:>6.2} obj/c",
                s.algorithm.as_str(),
                s.cycles,
                s.avg_pause,
                s.total_freed,
                s.total_bytes,
                s.throughput
            )?;
        }

        write!(
            f,
            "{} cycles, {} objects freed, pause avg {:.3} / max {:.3} / min {:.3} ms",
            overall.total_cycles,
            overall.total_objects_freed,
            overall.avg_pause,
            overall.max_pause,
            overall.min_pause
        )
    }
}
