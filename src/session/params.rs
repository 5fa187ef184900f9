//! Engine parameter surface.
//!
//! Field names and defaults mirror the parameter dictionary consumed by the
//! external source-extraction engine, so the serialized bundle can be fed to
//! an unmodified engine-side worker. Frame rate and decay time have no
//! defaults: they describe the recording, not the algorithm, and omitting
//! them is a configuration error.

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// PSD averaging method used for the noise standard-deviation estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseMethod {
    /// Mean over PSD bins.
    Mean,
    /// Median over PSD bins.
    Median,
    /// Log-mean-exponential over PSD bins.
    Logmexp,
}

/// Deconvolution backend used for trace extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeconvolutionMethod {
    /// OASIS online deconvolution.
    Oasis,
    /// Convex-programming deconvolution.
    Cvxpy,
}

/// Model bootstrap strategy for the streaming phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMethod {
    /// Minimal bootstrap from the initialization batch.
    Bare,
    /// Full batch factorization of the initialization batch.
    Cnmf,
}

/// Complete parameter bundle for the external engine.
///
/// Serialized field names follow the engine's own vocabulary (`fr`, `K`,
/// `gSig`, …); the Rust field names spell them out. All fields except
/// `frame_rate` and `decay_time` carry the deployment's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Acquisition frame rate in Hz. Required, must be positive.
    #[serde(rename = "fr")]
    pub frame_rate: f64,

    /// Length of a typical transient in seconds. Required, must be positive.
    pub decay_time: f64,

    /// Noise estimation method.
    #[serde(default = "default_noise_method")]
    pub noise_method: NoiseMethod,

    /// Order of the autoregressive system (0, 1, or 2).
    #[serde(rename = "p", default = "default_ar_order")]
    pub ar_order: u8,

    /// Expected number of components (upper bound); unset means no bound.
    #[serde(rename = "K", default)]
    pub expected_components: Option<u32>,

    /// Patch half-size in pixels; unset processes the whole field of view.
    #[serde(rename = "rf", default)]
    pub patch_half_size: Option<u32>,

    /// One-photon processing mode.
    #[serde(rename = "center_psf", default = "default_true")]
    pub one_photon: bool,

    /// Spatial downsampling factor during initialization.
    #[serde(rename = "ssub", default = "default_spatial_downsampling")]
    pub spatial_downsampling: u32,

    /// Temporal downsampling factor during initialization.
    #[serde(rename = "tsub", default = "default_temporal_downsampling")]
    pub temporal_downsampling: u32,

    /// Additional spatial downsampling factor for the background model.
    #[serde(rename = "ssub_B", default = "default_background_downsampling")]
    pub background_downsampling: u32,

    /// Background rank if positive; sign-encoded ring-model selector
    /// otherwise (0: return background terms, -1: full-rank background,
    /// below -1: no background returned).
    #[serde(rename = "nb", default)]
    pub background_rank: i32,

    /// Minimum correlation-image value for a candidate component.
    #[serde(default = "default_min_correlation")]
    pub min_corr: f64,

    /// Minimum peak-to-noise-ratio value for a candidate component.
    #[serde(default = "default_min_pnr")]
    pub min_pnr: f64,

    /// Ring radius factor (multiple of `gSig`) for the background model.
    #[serde(default = "default_ring_size_factor")]
    pub ring_size_factor: f64,

    /// Traces with SNR below this are rejected outright.
    #[serde(rename = "SNR_lowest", default = "default_snr_lowest")]
    pub snr_lowest: f64,

    /// Space correlation threshold for accepting a component.
    #[serde(rename = "rval_thr", default = "default_space_threshold")]
    pub space_threshold: f64,

    /// Radius of an average neuron, in pixels per axis.
    #[serde(rename = "gSig", default = "default_neuron_radius")]
    pub neuron_radius: (u32, u32),

    /// Half-size of the per-neuron bounding box, in pixels per axis.
    #[serde(rename = "gSiz", default = "default_neuron_bound")]
    pub neuron_bound: (u32, u32),

    /// Whether to normalize during initialization.
    #[serde(default)]
    pub normalize_init: bool,

    /// Whether to update background components during the run.
    #[serde(default)]
    pub update_background_components: bool,

    /// Deconvolution backend.
    #[serde(default = "default_deconvolution")]
    pub method_deconvolution: DeconvolutionMethod,

    // ── Streaming-phase parameters ──────────────────────────────────────────
    /// Spatial downsampling factor during streaming.
    #[serde(rename = "ds_factor", default = "default_stream_downsampling")]
    pub stream_downsampling: u32,

    /// Number of passes over the data.
    #[serde(default = "default_epochs")]
    pub epochs: u32,

    /// Expected component count for memory allocation.
    #[serde(rename = "expected_comps", default = "default_expected_comps")]
    pub expected_comps: u32,

    /// Length of the mini-batch used for initialization, in frames.
    #[serde(default = "default_init_batch")]
    pub init_batch: u32,

    /// Model bootstrap strategy.
    #[serde(default = "default_init_method")]
    pub init_method: InitMethod,

    /// Traces with SNR above this are accepted during streaming.
    #[serde(rename = "min_SNR", default = "default_min_snr")]
    pub min_snr: f64,

    /// Motion correction during streaming.
    #[serde(default)]
    pub motion_correct: bool,

    /// Normalize each frame prior to streaming analysis.
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Whether to search for new components during streaming.
    #[serde(default)]
    pub update_num_comps: bool,

    /// Screen candidate components with the CNN classifier (space
    /// correlation is used when disabled).
    #[serde(default = "default_true")]
    pub sniper_mode: bool,

    /// Acceptance threshold for the CNN classifier.
    #[serde(rename = "thresh_CNN_noisy", default = "default_cnn_threshold")]
    pub cnn_threshold: f64,
}

impl EngineParams {
    /// Validate every parameter against its engine-defined range.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(config_err("fr", "frame rate must be positive"));
        }
        if !(self.decay_time.is_finite() && self.decay_time > 0.0) {
            return Err(config_err("decay_time", "decay time must be positive"));
        }
        if self.ar_order > 2 {
            return Err(config_err("p", "autoregressive order must be 0, 1, or 2"));
        }
        if let Some(rf) = self.patch_half_size {
            if rf == 0 {
                return Err(config_err("rf", "patch half-size must be positive"));
            }
        }
        for (name, value) in [
            ("ssub", self.spatial_downsampling),
            ("tsub", self.temporal_downsampling),
            ("ssub_B", self.background_downsampling),
            ("ds_factor", self.stream_downsampling),
        ] {
            if value == 0 {
                return Err(config_err(name, "downsampling factor must be at least 1"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_corr) {
            return Err(config_err("min_corr", "correlation threshold must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.space_threshold) {
            return Err(config_err("rval_thr", "space threshold must be in [0, 1]"));
        }
        if !(self.min_pnr.is_finite() && self.min_pnr > 0.0) {
            return Err(config_err("min_pnr", "PNR threshold must be positive"));
        }
        if !(self.ring_size_factor.is_finite() && self.ring_size_factor > 0.0) {
            return Err(config_err("ring_size_factor", "ring factor must be positive"));
        }
        if !(self.snr_lowest.is_finite() && self.snr_lowest >= 0.0) {
            return Err(config_err("SNR_lowest", "rejection SNR must be non-negative"));
        }
        if !(self.min_snr.is_finite() && self.min_snr > 0.0) {
            return Err(config_err("min_SNR", "acceptance SNR must be positive"));
        }
        if self.neuron_radius.0 == 0 || self.neuron_radius.1 == 0 {
            return Err(config_err("gSig", "neuron radius must be positive"));
        }
        if self.neuron_bound.0 == 0 || self.neuron_bound.1 == 0 {
            return Err(config_err("gSiz", "neuron bounding half-size must be positive"));
        }
        if self.epochs == 0 {
            return Err(config_err("epochs", "epoch count must be at least 1"));
        }
        if self.init_batch == 0 {
            return Err(config_err("init_batch", "initialization batch must be at least 1 frame"));
        }
        if !(0.0..=1.0).contains(&self.cnn_threshold) {
            return Err(config_err(
                "thresh_CNN_noisy",
                "classifier threshold must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

fn config_err(param: &str, detail: &str) -> AppError {
    AppError::Config(format!("parameter '{param}': {detail}"))
}

fn default_noise_method() -> NoiseMethod {
    NoiseMethod::Mean
}

fn default_ar_order() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

fn default_spatial_downsampling() -> u32 {
    3
}

fn default_temporal_downsampling() -> u32 {
    1
}

fn default_background_downsampling() -> u32 {
    5
}

fn default_min_correlation() -> f64 {
    0.85
}

fn default_min_pnr() -> f64 {
    20.0
}

fn default_ring_size_factor() -> f64 {
    1.5
}

fn default_snr_lowest() -> f64 {
    0.5
}

fn default_space_threshold() -> f64 {
    0.9
}

fn default_neuron_radius() -> (u32, u32) {
    (120, 120)
}

fn default_neuron_bound() -> (u32, u32) {
    (30, 30)
}

fn default_deconvolution() -> DeconvolutionMethod {
    DeconvolutionMethod::Oasis
}

fn default_stream_downsampling() -> u32 {
    3
}

fn default_epochs() -> u32 {
    1
}

fn default_expected_comps() -> u32 {
    1
}

fn default_init_batch() -> u32 {
    300
}

fn default_init_method() -> InitMethod {
    InitMethod::Bare
}

fn default_min_snr() -> f64 {
    1.0
}

fn default_cnn_threshold() -> f64 {
    0.5
}
