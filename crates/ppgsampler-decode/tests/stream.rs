use ppgsampler_decode::{BatchDecoder, DecodeEvent, Sample};

// Captured from a board that ends lines with CRLF and was reset mid-batch.
const RECORDING: &str = "PPG PTT Data Collection System\r\n\
Collecting data for 10 seconds every minute\r\n\
START_DATA_COLLECTION\r\n\
0,2011,1874\r\n\
10,2032,1880\r\n\
20,2054,1\r\n\
PPG PTT Data Collection System\r\n\
Collecting data for 10 seconds every minute\r\n\
START_DATA_COLLECTION\r\n\
0,1998,1870\r\n\
11,2003,1871\r\n\
22,2010,1875\r\n\
END_DATA_COLLECTION\r\n";

#[test]
fn reset_board_recording() {
    let mut decoder = BatchDecoder::new();
    let events: Vec<DecodeEvent> = RECORDING.lines().filter_map(|l| decoder.feed(l)).collect();

    let malformed = events
        .iter()
        .filter(|e| matches!(e, DecodeEvent::Malformed { .. }))
        .count();
    assert_eq!(malformed, 2, "banner lines inside the open batch");

    let aborted: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            DecodeEvent::Aborted(b) => Some(b),
            _ => None,
        })
        .collect();
    assert_eq!(aborted.len(), 1);
    assert_eq!(aborted[0].len(), 3);

    let DecodeEvent::Completed(batch) = events.last().unwrap() else {
        panic!("stream should end with a completed batch");
    };
    assert_eq!(batch.index, 1);
    assert_eq!(
        batch.samples,
        vec![
            Sample::new(0, 1998, 1870),
            Sample::new(11, 2003, 1871),
            Sample::new(22, 2010, 1875),
        ]
    );

    let summary = serde_json::to_value(batch.summary()).unwrap();
    assert_eq!(summary["samples"], 3);
    assert_eq!(summary["monotonic"], true);
    assert_eq!(summary["span"]["end_s"], 0.022);
}
