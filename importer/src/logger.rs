/// Intercept messages from the `log` crate and print them to STDOUT, with
/// the worker thread's name standing in for a process rank.
pub struct Logger;

impl Logger {
    pub fn setup() {
        if log::set_boxed_logger(Box::new(Logger)).is_ok() {
            log::set_max_level(log::LevelFilter::Info);
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let target = if !record.target().is_empty() {
            record.target()
        } else {
            record.module_path().unwrap_or_default()
        };
        println!("[{}] {}: {}", record.level(), target, record.args());
    }

    fn flush(&self) {}
}
