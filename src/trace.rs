//! Execution trace and replay verification.
//!
//! When enabled on a simulator, every executed event is appended to an
//! [`ExecutionTrace`]. Two runs of the same model with the same seed must
//! produce identical traces; [`ExecutionTrace::trace_hash`] condenses a
//! trace into one number for that comparison, and the text export lets a
//! trace recorded in one process be checked against a run in another.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::event::{EventId, EventKey, Priority};
use crate::time::SimTime;

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// ── Trace ─────────────────────────────────────────────────────────────

/// One executed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry<T: SimTime> {
    /// Position in execution order, starting at 0.
    pub index: u64,
    /// Id within the replication (generation 0), so traces of different
    /// replications of the same model compare equal.
    pub id: EventId,
    pub time: T,
    pub priority: Priority,
    pub source: Option<String>,
}

/// Append-only record of executed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTrace<T: SimTime> {
    entries: Vec<TraceEntry<T>>,
}

impl<T: SimTime> ExecutionTrace<T> {
    pub fn new() -> Self {
        ExecutionTrace { entries: Vec::new() }
    }

    pub(crate) fn record(&mut self, key: EventKey<T>, source: Option<&str>) {
        let index = self.entries.len() as u64;
        self.entries.push(TraceEntry {
            index,
            id: EventId::new(key.id.raw()),
            time: key.time,
            priority: key.priority,
            source: source.map(str::to_string),
        });
    }

    pub fn entries(&self) -> &[TraceEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deterministic hash over ids, times, priorities and sources.
    pub fn trace_hash(&self) -> u64 {
        let mut h: u64 = 0;
        for entry in &self.entries {
            h = hash_combine(h, entry.id.raw());
            h = hash_combine(h, hash_bytes(entry.time.to_string().as_bytes()));
            h = hash_combine(h, entry.priority.value() as u64);
            h = hash_combine(h, entry.source.as_deref().map_or(0, |s| hash_bytes(s.as_bytes())));
        }
        h
    }

    /// Index of the first entry where two traces disagree, if any.
    pub fn first_divergence(&self, other: &ExecutionTrace<T>) -> Option<usize> {
        let common = self.entries.len().min(other.entries.len());
        (0..common)
            .find(|&i| self.entries[i] != other.entries[i])
            .or_else(|| (self.entries.len() != other.entries.len()).then_some(common))
    }

    // ── Export / verification ─────────────────────────────────────

    /// Export the trace in a line-oriented text format.
    ///
    /// ```text
    /// # KAIROS TRACE v1
    /// # events: 2
    /// # hash: 3f0c...
    /// E 0 0 10 5 -
    /// E 1 1 10 5 6172726976616c
    /// ```
    ///
    /// Fields: index, event id, time (display form), priority, hex source.
    pub fn export<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "# KAIROS TRACE v1")?;
        writeln!(w, "# events: {}", self.entries.len())?;
        writeln!(w, "# hash: {:016x}", self.trace_hash())?;
        for entry in &self.entries {
            writeln!(w, "{}", export_line(entry))?;
        }
        Ok(())
    }

    /// Export to a file path.
    pub fn export_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut f = io::BufWriter::new(std::fs::File::create(path)?);
        self.export(&mut f)?;
        f.flush()
    }

    /// Check this trace against a previously exported one.
    ///
    /// Comment lines are ignored, so only the executed events are compared.
    pub fn matches_export<R: BufRead>(&self, r: R) -> io::Result<bool> {
        let mut expected = self.entries.iter().map(export_line);
        for line in r.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !line.starts_with('E') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid trace line: {}", line),
                ));
            }
            match expected.next() {
                Some(ours) if ours == line => {}
                _ => return Ok(false),
            }
        }
        Ok(expected.next().is_none())
    }

    /// JSON array of entries, times in display form.
    #[cfg(feature = "serialize")]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "index": e.index,
                        "id": e.id,
                        "time": e.time.to_string(),
                        "priority": e.priority,
                        "source": e.source,
                    })
                })
                .collect(),
        )
    }
}

impl<T: SimTime> Default for ExecutionTrace<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two traces for identical execution order.
pub fn traces_match<T: SimTime>(a: &ExecutionTrace<T>, b: &ExecutionTrace<T>) -> bool {
    a.entries == b.entries
}

fn export_line<T: SimTime>(entry: &TraceEntry<T>) -> String {
    let source = entry
        .source
        .as_deref()
        .map_or_else(|| "-".to_string(), |s| hex_encode(s.as_bytes()));
    format!(
        "E {} {} {} {} {}",
        entry.index,
        entry.id.raw(),
        entry.time,
        entry.priority.value(),
        source
    )
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
