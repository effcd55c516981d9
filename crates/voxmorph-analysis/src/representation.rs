//! Per-frame spectral representations handed from analysis to synthesis.

/// Magnitude and phase of one windowed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StftFrame {
    pub index: u64,
    /// Center of the source frame in seconds.
    pub center_time: f64,
    pub magnitude: Vec<f32>,
    pub phase: Vec<f32>,
    /// RMS of the raw frame samples.
    pub rms: f32,
}

/// Vocoder-style decomposition of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VocoderFrame {
    pub index: u64,
    pub center_time: f64,
    /// Fundamental in Hz, 0.0 when unvoiced.
    pub f0: f32,
    /// Smoothed magnitude per bin.
    pub envelope: Vec<f32>,
    /// Noise share per band, in `[0, 1]`.
    pub aperiodicity: Vec<f32>,
    pub rms: f32,
    /// The frame failed decomposition and was replaced by silence.
    pub recovered: bool,
}

impl VocoderFrame {
    /// Silent unvoiced frame substituted for one that failed decomposition.
    pub fn silent(index: u64, center_time: f64, num_bins: usize, num_bands: usize) -> Self {
        Self {
            index,
            center_time,
            f0: 0.0,
            envelope: vec![0.0; num_bins],
            aperiodicity: vec![1.0; num_bands],
            rms: 0.0,
            recovered: true,
        }
    }

    #[inline]
    pub fn is_voiced(&self) -> bool {
        self.f0 > 0.0
    }
}

/// Output of the analyzer for one frame, in whichever mode is configured.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralRepresentation {
    Stft(StftFrame),
    Vocoder(VocoderFrame),
}

impl SpectralRepresentation {
    pub fn index(&self) -> u64 {
        match self {
            Self::Stft(f) => f.index,
            Self::Vocoder(f) => f.index,
        }
    }

    pub fn center_time(&self) -> f64 {
        match self {
            Self::Stft(f) => f.center_time,
            Self::Vocoder(f) => f.center_time,
        }
    }

    pub fn rms(&self) -> f32 {
        match self {
            Self::Stft(f) => f.rms,
            Self::Vocoder(f) => f.rms,
        }
    }

    /// Magnitude for display: the raw spectrum, or the envelope.
    pub fn magnitude(&self) -> &[f32] {
        match self {
            Self::Stft(f) => &f.magnitude,
            Self::Vocoder(f) => &f.envelope,
        }
    }

    /// Voicing, when the representation carries one.
    pub fn voiced(&self) -> Option<bool> {
        match self {
            Self::Stft(_) => None,
            Self::Vocoder(f) => Some(f.is_voiced()),
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Vocoder(f) if f.recovered)
    }
}
