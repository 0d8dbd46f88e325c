use kvlog::sink::SharedBuffer;
use kvlog::{keyvals, Config, Engine, Format, Level, Log, Logger};

fn facade(config: &Config) -> (Log, SharedBuffer) {
    let buffer = SharedBuffer::new();
    (Log::to_writer(config, Box::new(buffer.clone())), buffer)
}

fn json_lines(buffer: &SharedBuffer) -> Vec<serde_json::Value> {
    buffer
        .lines()
        .iter()
        .map(|line| serde_json::from_str(line).expect("well-formed json record"))
        .collect()
}

#[test]
fn std_engine_writes_key_value_and_honors_set_level() {
    let (log, buffer) = facade(&Config::new(Engine::Std).with_level("info"));

    log.infow(keyvals!["key", "value"]);
    let first = buffer.contents();
    assert!(first.contains("key=value"));
    assert!(first.contains("INFO"));

    log.set_level("warn");
    log.infow(keyvals!["key", "value"]);
    assert_eq!(buffer.contents(), first);
}

#[test]
fn json_engines_write_structured_records() {
    for engine in [Engine::Tracing, Engine::Log] {
        let config = Config::new(engine).with_level("info").with_format(Format::Json);
        let (log, buffer) = facade(&config);

        log.info("hello");

        let records = json_lines(&buffer);
        assert_eq!(records.len(), 1, "{engine}");
        assert_eq!(records[0]["msg"], "hello");
        assert_eq!(records[0]["level"], "info");
        assert_eq!(records[0]["type"], engine.as_str());
        assert!(records[0]["caller"]
            .as_str()
            .unwrap()
            .starts_with("tests/facade_end_to_end.rs:"));
    }
}

#[test]
fn threshold_filters_every_engine_the_same_way() {
    for engine in [Engine::Tracing, Engine::Log, Engine::Std] {
        for threshold in Level::ALL {
            let config = Config::new(engine).with_level(threshold.as_str());
            let (log, buffer) = facade(&config);

            for level in Level::ALL {
                buffer.clear();
                log.log(level, keyvals!["msg", "sample"]).unwrap();
                let written = !buffer.contents().is_empty();
                assert_eq!(written, level >= threshold, "{engine} threshold={threshold} level={level}");
            }
        }
    }
}

#[test]
fn invalid_set_level_falls_back_to_warn() {
    let (log, buffer) = facade(&Config::new(Engine::Tracing).with_level("info"));
    log.set_level("invalid");

    log.info("dropped");
    assert!(buffer.contents().is_empty());
    log.warn("kept");
    assert!(buffer.contents().contains("kept"));
}

#[test]
fn odd_keyvals_are_padded_not_rejected() {
    let config = Config::new(Engine::Log).with_level("debug").with_format(Format::Json);
    let (log, buffer) = facade(&config);

    log.log(Level::Warn, keyvals!["msg", "odd", "dangling"]).unwrap();

    let records = json_lines(&buffer);
    assert_eq!(records[0]["dangling"], "KEYVALS UNPAIRED");
}

#[test]
fn text_format_renders_fields_in_call_order() {
    let (log, buffer) = facade(&Config::new(Engine::Tracing).with_level("debug"));
    log.debugw(keyvals!["msg", "ordered", "a", 1, "b", 2]);

    let out = buffer.contents();
    let a = out.find(" a=1").unwrap();
    let b = out.find(" b=2").unwrap();
    assert!(a < b);
    assert!(out.contains("DEBUG"));
}
