//! Metrics reports for headless streaming runs.
//!
//! Reports are exported as JSON so CI can diff chunk throughput, seam quality
//! and mesh output between runs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Top-level metrics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Run identifier
    pub test_name: String,

    /// Timestamp when metrics were collected (ISO 8601)
    pub timestamp: String,

    /// World seed phrase the run used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,

    /// Overall result
    pub result: TestResult,

    /// Terrain generation metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terrain: Option<TerrainMetrics>,

    /// Chunk window / lifecycle counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingReport>,

    /// Render mesh output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering: Option<RenderMetrics>,

    /// Test execution metrics
    pub test_execution: TestExecutionMetrics,
}

/// Overall test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// Run passed all validations
    Pass,
    /// Run failed
    Fail,
    /// Run was skipped
    Skip,
}

/// Terrain generation timing and quality
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainMetrics {
    /// Chunks that reached Ready
    pub chunks_generated: usize,

    /// Oracle samples taken (render + collision)
    pub samples_taken: usize,

    /// Average build time per chunk (microseconds)
    pub avg_gen_time_us: f64,

    /// Min build time (microseconds)
    pub min_gen_time_us: u128,

    /// Max build time (microseconds)
    pub max_gen_time_us: u128,

    /// Total build time (milliseconds)
    pub total_gen_time_ms: f64,

    /// Chunks per second throughput
    pub chunks_per_second: f64,

    /// Shared-edge validation results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seam_validation: Option<SeamValidation>,
}

/// Chunk boundary seam validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeamValidation {
    /// Seams checked
    pub total_seams: usize,

    /// Seams within tolerance
    pub seams_valid: usize,

    /// Seams outside tolerance
    pub seams_failed: usize,

    /// Largest height difference observed along a shared edge
    pub max_seam_diff: f32,

    /// Average height difference along shared edges
    pub avg_seam_diff: f64,
}

/// Lifecycle counters for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamingReport {
    /// Window recentres observed
    pub window_moves: u64,
    /// Records inserted
    pub scheduled: u64,
    /// Builds that reached Ready
    pub built: u64,
    /// In-flight builds cancelled by eviction
    pub cancelled: u64,
    /// Builds that failed
    pub failed: u64,
    /// Records removed
    pub evicted: u64,
    /// Live records at the end of the run
    pub live_chunks: usize,
}

/// Render mesh output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderMetrics {
    /// Chunks meshed
    pub chunks_meshed: usize,

    /// Total triangles generated
    pub total_triangles: usize,

    /// Average triangles per chunk
    pub avg_triangles_per_chunk: f64,

    /// Total vertices generated
    pub total_vertices: usize,
}

/// Test execution metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExecutionMetrics {
    /// Total duration (seconds)
    pub duration_seconds: f64,

    /// Number of assertions checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertions_checked: Option<usize>,

    /// Number of validations passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validations_passed: Option<usize>,
}

/// Builder for constructing metrics reports
pub struct MetricsReportBuilder {
    report: MetricsReport,
}

impl MetricsReportBuilder {
    /// Create a new builder with test name
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            report: MetricsReport {
                test_name: test_name.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                seed: None,
                result: TestResult::Pass,
                terrain: None,
                streaming: None,
                rendering: None,
                test_execution: TestExecutionMetrics {
                    duration_seconds: 0.0,
                    assertions_checked: None,
                    validations_passed: None,
                },
            },
        }
    }

    /// Set test result
    pub fn result(mut self, result: TestResult) -> Self {
        self.report.result = result;
        self
    }

    /// Record the seed phrase
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.report.seed = Some(seed.into());
        self
    }

    /// Set terrain metrics
    pub fn terrain(mut self, metrics: TerrainMetrics) -> Self {
        self.report.terrain = Some(metrics);
        self
    }

    /// Set streaming counters
    pub fn streaming(mut self, metrics: StreamingReport) -> Self {
        self.report.streaming = Some(metrics);
        self
    }

    /// Set render metrics
    pub fn rendering(mut self, metrics: RenderMetrics) -> Self {
        self.report.rendering = Some(metrics);
        self
    }

    /// Set test execution metrics
    pub fn execution(mut self, metrics: TestExecutionMetrics) -> Self {
        self.report.test_execution = metrics;
        self
    }

    /// Build the metrics report
    pub fn build(self) -> MetricsReport {
        self.report
    }
}

/// Sink for writing metrics reports to JSON files
pub struct MetricsSink {
    path: PathBuf,
}

impl MetricsSink {
    /// Create a new metrics sink at the specified path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Write metrics report to file
    pub fn write(&self, report: &MetricsReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
