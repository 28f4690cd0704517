#![warn(missing_docs)]
//! Headless test surfaces: JSONL event logs, mesh metric dumps and metrics reports.

mod metrics;

use anyhow::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use terrastream_core::SimTick;

pub use metrics::*;

/// Primary event record captured by headless runs.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    /// Simulation tick when the event occurred.
    pub tick: SimTick,
    /// Short kind label (`chunk_ready`, `window_moved`, ...).
    pub kind: &'a str,
    /// Free-form payload.
    pub payload: &'a str,
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append an event to the log.
    pub fn write(&mut self, event: &EventRecord<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Events written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Mesh metric snapshot for a chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMeshMetric {
    /// Chunk coordinates [x, z].
    pub chunk: [i32; 2],
    /// Vertex count of the render mesh.
    pub vertices: usize,
    /// Triangle count for the chunk mesh.
    pub triangles: usize,
    /// Size of the vertex buffer in bytes.
    pub vertex_bytes: usize,
    /// Samples per edge of the collision heightfield.
    pub collision_samples: usize,
    /// Lowest and highest collision height in world units.
    pub height_range: [f32; 2],
    /// Mesh hash (hex string) for deterministic comparisons.
    pub hash: String,
}

/// Writes chunk mesh metrics to JSON for CI artifacts.
pub struct MeshMetricSink {
    file: File,
}

impl MeshMetricSink {
    /// Create a sink pointed at the supplied path, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            file: File::create(path)?,
        })
    }

    /// Persist the provided metrics as pretty JSON.
    pub fn write(&mut self, metrics: &[ChunkMeshMetric]) -> Result<()> {
        let json = serde_json::to_string_pretty(metrics)?;
        self.file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(stem: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "{stem}-{}.json",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn mesh_metric_sink_writes_file() {
        let path = temp_path("mesh-metrics");
        let metrics = vec![ChunkMeshMetric {
            chunk: [0, 0],
            vertices: 16641,
            triangles: 32768,
            vertex_bytes: 16641 * 24,
            collision_samples: 33,
            height_range: [-12.5, 64.0],
            hash: "deadbeef".into(),
        }];
        let mut sink = MeshMetricSink::create(&path).expect("sink create");
        sink.write(&metrics).expect("write succeeds");
        let contents = fs::read_to_string(&path).expect("file readable");
        assert!(contents.contains("deadbeef"));
        assert!(contents.contains("collision_samples"));
        assert!(contents.contains("height_range"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn jsonl_sink_writes_one_line_per_event() {
        let path = temp_path("events");
        let mut sink = JsonlSink::create(&path).unwrap();
        for (tick, kind) in [(0, "window_moved"), (3, "chunk_ready")] {
            sink.write(&EventRecord {
                tick: SimTick(tick),
                kind,
                payload: "(0, 0)",
            })
            .unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(sink.written(), 2);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"kind\":\"chunk_ready\""));
        fs::remove_file(&path).ok();
    }
}
