use std::fs;
use std::path::Path;

use promise_tracer::{
    CallId, EventSink, JsonLinesSink, PromiseId, PromiseInfo, SexpType, StackParent, TraceEvent,
    TracerConfig,
};

fn lookup_event(prom_id: i64) -> TraceEvent {
    TraceEvent::PromiseLookup(PromiseInfo {
        prom_id: PromiseId(prom_id),
        in_call_id: CallId(1),
        from_call_id: CallId::INVALID,
        prom_type: SexpType::Language,
        full_type: vec![SexpType::Language],
        return_type: SexpType::Integer,
        parent: StackParent::none(),
        in_prom_id: PromiseId::INVALID,
        depth: 0,
        declared: prom_id < 0,
    })
}

fn read_events(path: &Path) -> Vec<TraceEvent> {
    fs::read_to_string(path)
        .expect("read trace file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("parse trace line"))
        .collect()
}

#[test]
fn writes_one_json_object_per_line() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("trace.jsonl");

    let mut sink = JsonLinesSink::create(&path, true).expect("create sink");
    sink.persist(&lookup_event(-1)).expect("persist");
    sink.persist(&lookup_event(2)).expect("persist");
    sink.flush().expect("flush");
    assert_eq!(sink.written(), 2);
    assert_eq!(sink.path(), path.as_path());

    let raw = fs::read_to_string(&path).expect("read trace file");
    let first: serde_json::Value =
        serde_json::from_str(raw.lines().next().expect("first line")).expect("json");
    assert_eq!(first["event"], "promise_lookup");
    assert_eq!(first["declared"], true);

    assert_eq!(read_events(&path), vec![lookup_event(-1), lookup_event(2)]);
}

#[test]
fn append_mode_keeps_previous_runs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("trace.jsonl");

    {
        let mut sink = JsonLinesSink::create(&path, true).expect("create sink");
        sink.persist(&lookup_event(1)).expect("persist");
    }
    {
        let mut sink = JsonLinesSink::create(&path, false).expect("reopen sink");
        sink.persist(&lookup_event(2)).expect("persist");
    }
    assert_eq!(read_events(&path).len(), 2);

    {
        let mut sink = JsonLinesSink::create(&path, true).expect("truncate sink");
        sink.persist(&lookup_event(3)).expect("persist");
    }
    assert_eq!(read_events(&path), vec![lookup_event(3)]);
}

#[test]
fn config_file_selects_sink() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = temp.path().join("out").join("events.jsonl");
    let config_path = temp.path().join("tracer.toml");
    fs::write(
        &config_path,
        format!(
            "[tracer]\noutput = {:?}\ncompute_promise_expressions = true\n",
            output.display().to_string()
        ),
    )
    .expect("write config");

    let mut config = TracerConfig::from_toml_str(
        &fs::read_to_string(&config_path).expect("read config"),
        &config_path,
    )
    .expect("parse config");
    assert!(config.compute_promise_expressions);
    assert_eq!(config.output.as_deref(), Some(output.as_path()));

    {
        let mut sink = config.open_sink().expect("open sink");
        sink.persist(&lookup_event(-4)).expect("persist");
        sink.flush().expect("flush");
    }
    assert_eq!(read_events(&output), vec![lookup_event(-4)]);

    config.output = None;
    let mut sink = config.open_sink().expect("open null sink");
    sink.persist(&lookup_event(5)).expect("null persist");
}

#[test]
fn missing_config_file_is_an_io_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = TracerConfig::load(Some(&temp.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().starts_with("io error"));
}
