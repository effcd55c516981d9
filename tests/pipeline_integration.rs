//! End-to-end tests for the sequential pipeline: identity reconstruction,
//! duration mapping, stream ordering and configuration errors.
//!
//! Run with:
//! ```bash
//! cargo test -p voxmorph --test pipeline_integration
//! ```

mod helpers;

use helpers::tolerances::*;
use helpers::{
    assert_matches, generate_sine, generate_sweep, generate_vowel, init_tracing, TEST_CHUNK_LEN,
    TEST_SAMPLE_RATE,
};
use voxmorph::core::Error as CoreError;
use voxmorph::prelude::*;
use voxmorph::Error;

// =============================================================================
// Identity
// =============================================================================

/// 3 s sweep at 16 kHz, 2048/512 frames, STFT mode, identity parameters.
#[test]
fn test_identity_sweep_reconstructs_input() {
    init_tracing();
    let input = generate_sweep(100.0, 4000.0, TEST_SAMPLE_RATE, 3 * TEST_SAMPLE_RATE as usize);

    let mut pipeline = Pipeline::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .frame_size(2048)
        .hop_size(512)
        .mode(AnalysisMode::Stft)
        .build()
        .unwrap();
    let output = pipeline.process_all(&input, TEST_CHUNK_LEN).unwrap();

    assert_matches(&input, &output, IDENTITY_ERROR_DB);
}

#[test]
fn test_identity_holds_for_every_sample() {
    let input = generate_sine(523.25, TEST_SAMPLE_RATE, 8000);
    let output = Pipeline::builder()
        .frame_size(1024)
        .hop_size(256)
        .build()
        .unwrap()
        .process_all(&input, 777)
        .unwrap();

    assert_eq!(output.len(), input.len());
    for (i, (a, b)) in input.iter().zip(&output).enumerate() {
        assert!((a - b).abs() < DSP_EPSILON, "sample {i}: {a} vs {b}");
    }
}

// =============================================================================
// Duration
// =============================================================================

#[test]
fn test_time_stretch_sets_output_duration() {
    let input = generate_vowel(130.0, &[700.0, 1200.0, 2600.0], TEST_SAMPLE_RATE, 16000);

    for mode in [AnalysisMode::Stft, AnalysisMode::Decomposition] {
        let mut pipeline = Pipeline::builder().mode(mode).time_stretch(0.8).build().unwrap();
        let output = pipeline.process_all(&input, TEST_CHUNK_LEN).unwrap();

        // 0.8 s, well inside the 10 ms tolerance
        assert_eq!(output.len(), 12800, "{mode:?}");
        let stats = pipeline.stats();
        assert!((stats.output_secs() - 0.8).abs() < 0.010);
        assert!((stats.duration_ratio() - 0.8).abs() < 1e-3);
        assert!(output.iter().all(|s| s.is_finite()));
    }
}

/// At exactly 50% overlap the streamed output never runs past the
/// compressed length, so every ratio lands on `round(len * ratio)`.
#[test]
fn test_half_overlap_output_length_matches_ratio() {
    let input = generate_sine(330.0, TEST_SAMPLE_RATE, 16000);

    for ratio in [0.5f32, 0.8, 1.0, 1.7] {
        let output = Pipeline::builder()
            .frame_size(512)
            .hop_size(256)
            .mode(AnalysisMode::Stft)
            .time_stretch(ratio)
            .build()
            .unwrap()
            .process_all(&input, TEST_CHUNK_LEN)
            .unwrap();

        let expected = (input.len() as f64 * ratio as f64).round() as usize;
        assert_eq!(output.len(), expected, "ratio {ratio}");
        assert!(output.iter().all(|s| s.is_finite()));
    }
}

#[test]
fn test_stretch_longer_than_input() {
    let input = generate_sine(220.0, TEST_SAMPLE_RATE, 8000);
    let output = Pipeline::builder()
        .time_stretch(1.5)
        .build()
        .unwrap()
        .process_all(&input, TEST_CHUNK_LEN)
        .unwrap();
    assert_eq!(output.len(), 12000);
}

#[test]
fn test_presets_map_duration() {
    let input = generate_vowel(120.0, &[600.0, 1100.0, 2500.0], TEST_SAMPLE_RATE, 16000);

    let older = Pipeline::builder()
        .mode(AnalysisMode::Decomposition)
        .preset(VoicePreset::Older)
        .build()
        .unwrap()
        .process_all(&input, TEST_CHUNK_LEN)
        .unwrap();
    // Slower speech: 1 s at playback rate 0.85
    assert_eq!(older.len(), 18824);

    let younger = Pipeline::builder()
        .mode(AnalysisMode::Decomposition)
        .preset(VoicePreset::Younger)
        .build()
        .unwrap()
        .process_all(&input, TEST_CHUNK_LEN)
        .unwrap();
    assert_eq!(younger.len(), 13913);
}

// =============================================================================
// Chunking and ordering
// =============================================================================

#[test]
fn test_chunk_size_does_not_change_output() {
    let input = generate_vowel(150.0, &[500.0, 1500.0, 2500.0], TEST_SAMPLE_RATE, 12000);
    let run = |chunk_len: usize| {
        Pipeline::builder()
            .mode(AnalysisMode::Decomposition)
            .pitch_shift(-3.0)
            .seed(11)
            .build()
            .unwrap()
            .process_all(&input, chunk_len)
            .unwrap()
    };
    let reference = run(12000);
    assert_eq!(run(1), reference);
    assert_eq!(run(511), reference);
}

#[test]
fn test_streaming_output_arrives_before_finish() {
    let input = generate_sine(300.0, TEST_SAMPLE_RATE, 16000);
    let mut pipeline = Pipeline::builder().build().unwrap();

    let mut streamed = 0;
    for chunk in AudioChunk::split(&input, TEST_SAMPLE_RATE, TEST_CHUNK_LEN) {
        streamed += pipeline.push_chunk(&chunk).unwrap().len();
    }
    let tail = pipeline.finish().unwrap();

    assert!(streamed > 0);
    // Latency stays within two frames
    assert!(tail.len() <= 2 * 2048);
    assert_eq!(streamed + tail.len(), input.len());
}

#[test]
fn test_out_of_order_chunk_is_fatal() {
    let mut pipeline = Pipeline::builder().build().unwrap();
    let input = generate_sine(200.0, TEST_SAMPLE_RATE, 3000);
    let chunks = AudioChunk::split(&input, TEST_SAMPLE_RATE, 1000);

    pipeline.push_chunk(&chunks[0]).unwrap();
    let err = pipeline.push_chunk(&chunks[2]).unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::OutOfOrderChunk { expected: 1, got: 2 })));
    assert!(err.is_stream_fatal());

    // The run is over; nothing more is accepted
    assert!(matches!(pipeline.push_chunk(&chunks[1]), Err(Error::Core(CoreError::StreamClosed))));
    assert!(matches!(pipeline.finish(), Err(Error::Core(CoreError::StreamClosed))));
}

#[test]
fn test_sample_rate_change_is_rejected() {
    let mut pipeline = Pipeline::builder().build().unwrap();
    let err = pipeline
        .push_chunk(&AudioChunk::new(vec![0.0f32; 256], 22050, 0, 0.0))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(CoreError::SampleRateMismatch { expected: 16000, got: 22050 })
    ));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_invalid_configuration_is_rejected_before_processing() {
    let cases = [
        Pipeline::builder().frame_size(1024).hop_size(1024).build(),
        Pipeline::builder().frame_size(512).hop_size(384).build(),
        Pipeline::builder().frame_size(3).hop_size(1).build(),
        Pipeline::builder().hop_size(0).build(),
        Pipeline::builder().sample_rate(0).build(),
        Pipeline::builder().formant_shift(0.0).build(),
        Pipeline::builder().time_stretch(-0.5).build(),
        Pipeline::builder().pitch_shift(f32::NAN).build(),
        Pipeline::builder().crossfade_secs(-0.01).build(),
        Pipeline::builder().queue_capacity(0).build(),
        Pipeline::builder()
            .override_for("AA", ParameterOverride::formant(-1.0))
            .build(),
        Pipeline::builder()
            .phonemes(vec![
                PhonemeInterval::new("AA", 0.0, 0.3),
                PhonemeInterval::new("IY", 0.2, 0.5),
            ])
            .build(),
    ];
    for (i, result) in cases.into_iter().enumerate() {
        assert!(
            matches!(result, Err(Error::Core(CoreError::InvalidConfiguration(_)))),
            "case {i} was accepted"
        );
    }
}

#[test]
fn test_config_round_trips_through_builder() {
    let config = PipelineConfig {
        mode: AnalysisMode::Decomposition,
        params: TransformParams::new().pitch_shift(2.0),
        overrides: PhonemeOverrides::vowel_softening(1.0),
        denoiser: DenoiserKind::SpectralGate {
            reduction_db: -20.0,
            over_subtraction: 1.5,
        },
        ..Default::default()
    };
    let pipeline = PipelineBuilder::from_config(config.clone()).build().unwrap();
    assert_eq!(pipeline.config(), &config);
}

#[test]
fn test_vowel_softening_changes_only_vowels() {
    let input = generate_vowel(140.0, &[700.0, 1200.0, 2600.0], TEST_SAMPLE_RATE, 12000);
    let run = |phonemes: Vec<PhonemeInterval>| {
        Pipeline::builder()
            .frame_size(512)
            .hop_size(128)
            .vowel_softening(1.0)
            .phonemes(phonemes)
            .build()
            .unwrap()
            .process_all(&input, TEST_CHUNK_LEN)
            .unwrap()
    };

    // Labels outside the table fall back to the identity globals
    let consonants = run(vec![PhonemeInterval::new("s", 0.1, 0.5)]);
    assert_matches(&input, &consonants, IDENTITY_ERROR_DB);

    let vowel = run(vec![PhonemeInterval::new("i", 0.1, 0.5)]);
    assert_eq!(vowel.len(), input.len());
    assert!(voxmorph::analysis::metrics::relative_error_db(&input, &vowel) > -40.0);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_run_stats_and_spectrogram() {
    let input = generate_vowel(110.0, &[650.0, 1100.0, 2400.0], TEST_SAMPLE_RATE, 16000);
    let mut pipeline = Pipeline::builder()
        .mode(AnalysisMode::Decomposition)
        .record_spectrogram(16)
        .build()
        .unwrap();
    let output = pipeline.process_all(&input, TEST_CHUNK_LEN).unwrap();

    let stats = pipeline.stats();
    assert_eq!(stats.input_samples, 16000);
    assert_eq!(stats.output_samples, output.len() as u64);
    // Frames span the padded input: ceil((16000 + 1536) / 512)
    assert_eq!(stats.frames_analyzed, 35);
    assert!(stats.frames_voiced > stats.frames_analyzed / 2);
    assert!(stats.input_rms > 0.0 && stats.output_rms > 0.0);

    let spectrogram = pipeline.spectrogram().unwrap();
    assert_eq!(spectrogram.num_frames(), 16);
    assert_eq!(spectrogram.num_bins(), 1025);
}

#[test]
fn test_silence_stays_silent() {
    let input = vec![0.0f32; 8000];
    for mode in [AnalysisMode::Stft, AnalysisMode::Decomposition] {
        let output = Pipeline::builder()
            .mode(mode)
            .pitch_shift(5.0)
            .build()
            .unwrap()
            .process_all(&input, TEST_CHUNK_LEN)
            .unwrap();
        assert_eq!(output.len(), 8000);
        assert!(helpers::peak(&output) < SILENCE_THRESHOLD, "{mode:?}");
    }
}
