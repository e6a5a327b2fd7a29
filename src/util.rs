use super::error::*;
use super::rand_xoshiro;
use crate::rand_xoshiro::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::time::Instant;

/// global index of a row in the matrix being reduced
pub type RowIndex = usize;
/// index of a column, shared by all processes
pub type ColumnIndex = usize;
/// the rank of a participant inside the process group, `0` is the coordinating process
pub type ProcessRank = usize;
/// the type of every matrix entry
pub type Entry = f64;

/// the coordinating process: holds the global matrix and selects the global pivot
pub const ROOT_PROCESS: ProcessRank = 0;

/// values with magnitude not greater than this are treated as zero
pub const DEFAULT_EPSILON: Entry = 1e-10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct IndexRange {
    pub range: [RowIndex; 2],
}

// just to distinguish them in code, essentially nothing different
pub type RowRange = IndexRange;

impl IndexRange {
    pub fn new(start: RowIndex, end: RowIndex) -> Self {
        debug_assert!(end >= start, "invalid range [{}, {})", start, end);
        Self { range: [start, end] }
    }
    pub fn new_length(start: RowIndex, length: usize) -> Self {
        Self::new(start, start + length)
    }
    pub fn is_empty(&self) -> bool {
        self.range[1] == self.range[0]
    }
    pub fn len(&self) -> usize {
        self.range[1] - self.range[0]
    }
    pub fn start(&self) -> RowIndex {
        self.range[0]
    }
    pub fn end(&self) -> RowIndex {
        self.range[1]
    }
    pub fn contains(&self, row_index: RowIndex) -> bool {
        row_index >= self.start() && row_index < self.end()
    }
    /// translate a global index into this range into a local index
    pub fn local_index(&self, row_index: RowIndex) -> Option<usize> {
        if self.contains(row_index) {
            Some(row_index - self.start())
        } else {
            None
        }
    }
}

#[allow(dead_code)]
/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// record the time of computing the rank of multiple matrices
pub struct BenchmarkProfiler {
    /// each record corresponds to a different matrix
    pub records: Vec<BenchmarkProfilerEntry>,
    /// summation of all elapsed time
    pub sum_round_time: f64,
    /// summation of all matrix rows
    pub sum_rows: usize,
    /// the number of participants in the process group
    pub process_num: usize,
    /// the file to output the profiler results
    pub benchmark_profiler_output: Option<File>,
}

impl BenchmarkProfiler {
    pub fn new(process_num: usize, detail_log_file: Option<String>) -> RankResult<Self> {
        let benchmark_profiler_output = match detail_log_file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                serde_json::to_writer(&mut file, &serde_json::json!({ "process_num": process_num }))?;
                file.write_all(b"\n")?;
                Some(file)
            }
            None => None,
        };
        Ok(Self {
            records: vec![],
            sum_round_time: 0.,
            sum_rows: 0,
            process_num,
            benchmark_profiler_output,
        })
    }
    /// record the beginning of a rank computation
    pub fn begin(&mut self, rows: usize, cols: usize) {
        // sanity check last entry, if exists, is complete
        if let Some(last_entry) = self.records.last() {
            assert!(
                last_entry.is_complete(),
                "the last benchmark profiler entry is not complete, make sure to call `begin` and `end` in pairs"
            );
        }
        let mut entry = BenchmarkProfilerEntry::new(rows, cols);
        entry.record_begin();
        self.records.push(entry);
    }
    pub fn event(&mut self, event_name: String) {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `event`");
        last_entry.record_event(event_name);
    }
    /// record the ending of a rank computation
    pub fn end(&mut self, rank: usize) -> RankResult<()> {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `end`");
        last_entry.record_end(rank);
        let round_time = last_entry.round_time.unwrap_or(0.);
        self.sum_round_time += round_time;
        self.sum_rows += last_entry.rows;
        if let Some(file) = self.benchmark_profiler_output.as_mut() {
            let mut events = serde_json::Map::new();
            for (event_name, time) in last_entry.events.iter() {
                events.insert(event_name.clone(), serde_json::json!(time));
            }
            let value = serde_json::json!({
                "round_time": round_time,
                "rows": last_entry.rows,
                "cols": last_entry.cols,
                "rank": rank,
                "events": events,
            });
            serde_json::to_writer(&mut *file, &value)?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
    /// print out a brief one-line statistics
    pub fn brief(&self) -> String {
        let total = self.sum_round_time / (self.records.len() as f64);
        let per_row = self.sum_round_time / (self.sum_rows as f64);
        format!("total: {total:.3e}, row: {per_row:.3e}, processes: {},", self.process_num)
    }
}

pub struct BenchmarkProfilerEntry {
    /// the number of rows of the matrix
    pub rows: usize,
    /// the number of columns of the matrix
    pub cols: usize,
    /// the time of beginning a rank computation
    begin_time: Option<Instant>,
    /// record additional events
    pub events: Vec<(String, f64)>,
    /// interval between calling [`Self::record_begin`] to calling [`Self::record_end`]
    pub round_time: Option<f64>,
    /// the computed rank
    pub rank: Option<usize>,
}

impl BenchmarkProfilerEntry {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            begin_time: None,
            events: vec![],
            round_time: None,
            rank: None,
        }
    }
    /// record the beginning of a rank computation
    pub fn record_begin(&mut self) {
        assert_eq!(self.begin_time, None, "do not call `record_begin` twice on the same entry");
        self.begin_time = Some(Instant::now());
    }
    /// record the ending of a rank computation
    pub fn record_end(&mut self, rank: usize) {
        let begin_time = self
            .begin_time
            .as_ref()
            .expect("make sure to call `record_begin` before calling `record_end`");
        self.round_time = Some(begin_time.elapsed().as_secs_f64());
        self.rank = Some(rank);
    }
    pub fn record_event(&mut self, event_name: String) {
        let begin_time = self
            .begin_time
            .as_ref()
            .expect("make sure to call `record_begin` before calling `record_event`");
        self.events.push((event_name, begin_time.elapsed().as_secs_f64()));
    }
    pub fn is_complete(&self) -> bool {
        self.round_time.is_some()
    }
}
