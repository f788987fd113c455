//! Integration tests for the full sample-to-chord cycle on simulated hardware.

use lazy_static::lazy_static;
use pico_chord::sim::{FrozenClock, IoSerial, SerialBuffer, SimClock, SimError, Tone, ToneInput};
use pico_chord::{
    ChordKind, ChordPipeline, CycleOutcome, NoteName, PipelineError, PipelineState, SamplerError,
    TransformKind, FRAME_SIZE,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::sync::{Arc, Mutex};

const C3: f32 = 130.81;
const C4: f32 = 261.63;

type SimPipeline = ChordPipeline<ToneInput, SerialBuffer, SimClock>;

/// Pipeline waiting `delay_us` per sample on the simulated clock.
fn pipeline_with_delay(delay_us: u32, input: ToneInput, transform: TransformKind) -> SimPipeline {
    ChordPipeline::builder()
        .sample_delay_us(delay_us)
        .transform(transform)
        .build(input, SerialBuffer::new(), SimClock::new())
        .unwrap()
}

/// Pipeline whose sample loop runs at exactly `rate` Hz on the simulated clock.
fn pipeline_at(rate: u32, input: ToneInput, transform: TransformKind) -> SimPipeline {
    pipeline_with_delay(1_000_000 / rate, input, transform)
}

fn triad(root: f32, third: i32, amplitude: f32) -> Vec<Tone> {
    [0, third, 7]
        .iter()
        .map(|&st| Tone::new(root * 2f32.powf(st as f32 / 12.0), amplitude))
        .collect()
}

/// Holds one synthetic chord to sweep
#[derive(Debug, Clone)]
struct ChordCase {
    label: String,
    root: NoteName,
    quality: ChordKind,
    tones: Vec<Tone>,
    delay_us: u32,
}

impl ChordCase {
    fn input(&self) -> ToneInput {
        ToneInput::new(1_000_000.0 / self.delay_us as f32, self.tones.clone())
    }
}

/// Every triad voiced over two octaves from its root in octave 3. The rate
/// is seven times the root, so all six tones sit between bins 18 and 55 at
/// least three bins apart, and the six real peaks outrank any leakage.
fn all_chord_cases() -> Vec<ChordCase> {
    let mut cases = Vec::new();
    for root in 0..12 {
        let f0 = C3 * 2f32.powf(root as f32 / 12.0);
        let delay_us = (1_000_000.0 / (7.0 * f0)).round() as u32;
        for (quality, third, suffix) in [(ChordKind::Major, 4, ""), (ChordKind::Minor, 3, "m")] {
            let root = NoteName::from_idx(root);
            let mut tones = triad(f0, third, 300.0);
            tones.extend(triad(2.0 * f0, third, 300.0));
            cases.push(ChordCase {
                label: format!("{root}{suffix}"),
                root,
                quality,
                tones,
                delay_us,
            });
        }
    }
    cases
}

lazy_static! {
    static ref CHORD_CASES: Vec<ChordCase> = all_chord_cases();
}

#[test]
fn silence_produces_no_output() {
    for dc in [0.0, 40.0] {
        let mut pipeline = pipeline_at(1_000, ToneInput::silence(dc), TransformKind::Radix2);
        for _ in 0..3 {
            let outcome = pipeline.run_cycle().unwrap();
            let CycleOutcome::Gated(stats) = outcome else {
                panic!("expected the gate to close, got {outcome:?}");
            };
            assert!(!stats.passes_gate());
            assert!((stats.rms - stats.mean).abs() < 1e-3);
        }
        assert_eq!(pipeline.serial().contents(), "");
        assert!(pipeline.histogram().is_empty());
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}

#[test]
fn c_major_triad_is_reported() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);

    let outcome = pipeline.run_cycle().unwrap();
    let CycleOutcome::Reported(chord) = outcome else {
        panic!("expected a chord, got {outcome:?}");
    };
    assert_eq!(chord.root, NoteName::C);
    assert_eq!(chord.quality, ChordKind::Major);
    assert!(chord.is_detected());
    assert_eq!(pipeline.serial().contents(), "C\n");

    let h = pipeline.histogram();
    assert!(h.get(0) > 0 && h.get(4) > 0 && h.get(7) > 0);
    assert_eq!(pipeline.spectrum().sample_rate(), 1_000.0);
    assert!(pipeline.peaks().len() <= 8);
}

#[test]
fn minor_triads_are_reported() {
    let input = ToneInput::new(1_000.0, triad(C4, 3, 550.0));
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);
    pipeline.run_cycle().unwrap();
    assert_eq!(pipeline.serial().contents(), "Cm\n");

    let input = ToneInput::new(1_000.0, [220.0, 261.63, 329.63].map(|f| Tone::new(f, 500.0)));
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);
    pipeline.run_cycle().unwrap();
    assert_eq!(pipeline.serial().contents(), "Am\n");
}

#[test]
fn single_c_tone_votes_for_c() {
    let input = ToneInput::new(1_000.0, [Tone::new(261.6, 1_500.0)]);
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);
    pipeline.run_cycle().unwrap();

    let strongest = pipeline.peaks().as_slice()[0];
    assert_eq!(strongest.bin, 33);
    assert!((strongest.frequency - 261.6).abs() < 3.0, "{}", strongest.frequency);
    assert!(pipeline.histogram().get(0) >= 8);
    assert_eq!(pipeline.histogram().dominant(), Some(NoteName::C));
}

#[test]
fn measured_rate_overrides_the_nominal_delay() {
    // nominal 900 us per sample, 100 us of loop overhead: really 1 kHz
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = ChordPipeline::builder()
        .sample_delay_us(900)
        .build(
            input,
            SerialBuffer::new(),
            SimClock::new().with_overhead_us(100),
        )
        .unwrap();

    let CycleOutcome::Reported(chord) = pipeline.run_cycle().unwrap() else {
        panic!("expected a chord");
    };
    assert_eq!(pipeline.spectrum().sample_rate(), 1_000.0);
    assert_eq!(chord.label(), "C");
}

#[test]
fn every_triad_is_recognised() {
    let failures = Arc::new(Mutex::new(Vec::<String>::new()));

    CHORD_CASES.par_iter().for_each(|case| {
        let mut pipeline = pipeline_with_delay(case.delay_us, case.input(), TransformKind::Radix2);

        let outcome = pipeline.run_cycle();
        let written = pipeline.serial().contents();
        let matched = matches!(
            outcome,
            Ok(CycleOutcome::Reported(chord))
                if chord.root == case.root && chord.quality == case.quality
        );
        if !matched || written != format!("{}\n", case.label) {
            let msg = format!(
                "expected = {}\nactual = {:?}, written {:?}\n",
                case.label, outcome, written
            );
            failures.lock().unwrap().push(msg);
        }
    });

    let failures = Arc::try_unwrap(failures).unwrap().into_inner().unwrap();
    if !failures.is_empty() {
        panic!(
            "{} chord tests failed:\n\n{}",
            failures.len(),
            failures.join("\n")
        );
    }
}

#[test]
fn library_transform_makes_the_same_decisions() {
    CHORD_CASES.par_iter().for_each(|case| {
        let [radix2, library] = [TransformKind::Radix2, TransformKind::RustFft].map(|kind| {
            let mut pipeline = pipeline_with_delay(case.delay_us, case.input(), kind);
            pipeline.run_cycle().unwrap();
            pipeline.into_parts().1
        });
        assert_eq!(radix2.contents(), library.contents(), "{}", case.label);
    });
}

#[test]
fn cycles_repeat_and_append_lines() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);
    for _ in 0..4 {
        pipeline.run_cycle().unwrap();
    }
    assert_eq!(pipeline.serial().lines().count(), 4);
    assert_eq!(pipeline.input().readings(), 4 * FRAME_SIZE as u64);
}

#[test]
fn analog_fault_aborts_the_cycle() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0)).fail_after(50);
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);

    let err = pipeline.run_cycle().unwrap_err();
    match &err {
        PipelineError::Sampler(SamplerError::Analog { index, source }) => {
            assert_eq!(*index, 50);
            assert!(source.downcast_ref::<SimError>().is_some());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "analog read failed at sample 50: ADC conversion failed after 50 readings"
    );
    assert_eq!(pipeline.serial().contents(), "");
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn run_returns_the_first_hardware_error() {
    // two good cycles, then the ADC dies mid-frame
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0)).fail_after(2 * 128 + 10);
    let mut pipeline = pipeline_at(1_000, input, TransformKind::Radix2);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Sampler(SamplerError::Analog { index: 10, .. })
    ));
    assert_eq!(pipeline.serial().contents(), "C\nC\n");
}

#[test]
fn serial_fault_is_reported() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = ChordPipeline::builder()
        .sample_delay_us(1_000)
        .build(input, SerialBuffer::closed(), SimClock::new())
        .unwrap();

    let err = pipeline.run_cycle().unwrap_err();
    assert!(matches!(err, PipelineError::Serial(_)));
    assert_eq!(err.to_string(), "serial write failed: serial link closed");
}

#[test]
fn each_report_is_a_single_write() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = ChordPipeline::builder()
        .sample_delay_us(1_000)
        .build(input, SerialBuffer::new().close_after(1), SimClock::new())
        .unwrap();

    pipeline.run_cycle().unwrap();
    assert_eq!(pipeline.serial().writes(), 1);
    assert_eq!(pipeline.serial().contents(), "C\n");

    // a failed report leaves no partial line behind
    let err = pipeline.run_cycle().unwrap_err();
    assert!(matches!(err, PipelineError::Serial(_)));
    assert_eq!(pipeline.serial().contents(), "C\n");
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn stalled_clock_is_an_error() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = ChordPipeline::builder()
        .build(input, SerialBuffer::new(), FrozenClock)
        .unwrap();

    let err = pipeline.run_cycle().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Sampler(SamplerError::StalledClock { samples: 128 })
    ));
}

#[test]
fn io_writers_serve_as_serial_output() {
    let input = ToneInput::new(1_000.0, triad(C4, 4, 500.0));
    let mut pipeline = ChordPipeline::builder()
        .sample_delay_us(1_000)
        .transform(TransformKind::RustFft)
        .build(input, IoSerial(Vec::<u8>::new()), SimClock::new())
        .unwrap();

    pipeline.run_cycle().unwrap();
    let (_, IoSerial(bytes), _) = pipeline.into_parts();
    assert_eq!(bytes, b"C\n");
}

#[test]
fn builder_rejects_impossible_adc_settings() {
    let err = ChordPipeline::builder()
        .adc_shift(16)
        .build(ToneInput::silence(0.0), SerialBuffer::new(), SimClock::new())
        .err()
        .unwrap();
    assert_eq!(
        err.to_string(),
        "configuration error: adc_shift must be below 16, got 16"
    );

    let err = ChordPipeline::builder()
        .adc_shift(8)
        .mid_scale(2048)
        .build(ToneInput::silence(0.0), SerialBuffer::new(), SimClock::new())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PipelineError::Sampler(SamplerError::Configuration(_))
    ));

    assert!(ChordPipeline::builder()
        .adc_shift(0)
        .mid_scale(32_768)
        .idle_delay_ms(100)
        .build(ToneInput::silence(0.0), SerialBuffer::new(), SimClock::new())
        .is_ok());
}
