use voxmorph_core::TransformParams;

/// Spectral content of one output frame after transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformedSpectrum {
    /// Final magnitude and phase per bin, ready for the inverse FFT.
    Stft { magnitude: Vec<f32>, phase: Vec<f32> },
    /// Vocoder parameters with pitch and envelope changes applied.
    Vocoder {
        f0: f32,
        envelope: Vec<f32>,
        aperiodicity: Vec<f32>,
        rms: f32,
    },
}

/// One output-timeline frame produced by the transformer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedFrame {
    /// Output frame index, contiguous from 0.
    pub index: u64,
    /// Fractional analysis frame the contours were sampled at.
    pub source_frame: f64,
    /// Source timeline position of the frame center, in seconds.
    pub source_time: f64,
    /// Parameters in effect for this frame, after overrides and ramping.
    pub params: TransformParams,
    pub spectrum: TransformedSpectrum,
}

/// Time-domain frame in the analysis-window domain, `frame_size` long.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedFrame {
    pub index: u64,
    pub samples: Vec<f32>,
}
