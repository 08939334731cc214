use ppgsampler_app::capture::{CaptureSession, INDEX_FILE};
use ppgsampler_core::fake::{ManualClock, MemorySink, ScriptedInput};
use ppgsampler_core::{Sampler, SamplerConfig};
use std::fs;
use std::time::Duration;

fn recorded_stream(cycles: usize) -> Vec<u8> {
    let clock = ManualClock::new();
    let sink = MemorySink::new();
    let config = SamplerConfig {
        sample_period: Duration::from_millis(10),
        collection_time: Duration::from_millis(100),
        wait_time: Duration::from_millis(500),
        ..Default::default()
    };
    let mut sampler = Sampler::new(ScriptedInput::constant(100, 200), clock, sink.clone(), config);
    sampler.start().unwrap();
    for _ in 0..cycles {
        sampler.run_cycle().unwrap();
    }

    let mut stream = Vec::new();
    for text in sink.texts() {
        stream.extend_from_slice(text.as_bytes());
        stream.extend_from_slice(b"\r\n");
    }
    stream
}

#[test]
fn sampler_output_round_trips_into_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = CaptureSession::with_name(dir.path(), "bench").unwrap();

    let mut written = Vec::new();
    for chunk in recorded_stream(2).chunks(7) {
        written.extend(session.ingest(chunk).unwrap());
    }
    assert_eq!(session.finish().unwrap(), 2);
    assert_eq!(written.len(), 2);

    let first = fs::read_to_string(dir.path().join("bench_collection_0000_raw_data.csv")).unwrap();
    let rows: Vec<&str> = first.lines().collect();
    assert_eq!(rows[0], "timestamp_ms,ppg1,ppg2");
    assert_eq!(rows[1], "0,100,200");
    assert_eq!(rows.last(), Some(&"90,100,200"));
    assert_eq!(rows.len(), 11);

    let index = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
    let records: Vec<serde_json::Value> = index
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["session"], "bench");
    assert_eq!(records[1]["file"], "bench_collection_0001_raw_data.csv");
    assert_eq!(records[1]["samples"], 10);
    assert_eq!(records[1]["malformed"], 0);
    let rate = records[1]["rate"].as_f64().unwrap();
    assert!((rate - 100.0).abs() < 1e-6);
}

#[test]
fn index_is_appended_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a", "b"] {
        let mut session = CaptureSession::with_name(dir.path(), name).unwrap();
        session.ingest(&recorded_stream(1)).unwrap();
        session.finish().unwrap();
    }

    let index = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
    assert_eq!(index.lines().count(), 2);
    assert!(dir.path().join("a_collection_0000_raw_data.csv").exists());
    assert!(dir.path().join("b_collection_0000_raw_data.csv").exists());
}
