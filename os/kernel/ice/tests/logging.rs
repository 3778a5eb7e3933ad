use ice::{IceConfig, init_logging};
use ice_console::{ConsoleLogger, ConsoleSink};
use log::LevelFilter;
use std::sync::Mutex;

struct Capture(Mutex<Vec<u8>>);

impl ConsoleSink for Capture {
    fn write_bytes(&self, bytes: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(bytes);
    }
}

static SINK: Capture = Capture(Mutex::new(Vec::new()));
static LOGGER: ConsoleLogger = ConsoleLogger::new(LevelFilter::Debug, &SINK);

#[test]
fn configured_level_caps_the_logger() {
    let config = IceConfig::new().with_log_level(LevelFilter::Warn);
    init_logging(&LOGGER, &config).unwrap();
    assert_eq!(log::max_level(), LevelFilter::Warn);

    log::info!("hidden");
    log::warn!("symbol pool low");
    let text = String::from_utf8(SINK.0.lock().unwrap().clone()).unwrap();
    assert!(!text.contains("hidden"));
    assert!(text.contains("symbol pool low"), "{text}");

    assert!(init_logging(&LOGGER, &config).is_err());
}
