//! Kernel log: a bounded byte ring that keeps the most recent output, and the `log` crate
//! backend writing into it.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt::Write;

use spin::Mutex;

pub static LOG: Mutex<Option<Log>> = Mutex::new(None);

pub fn init() {
    LOG.lock().get_or_insert_with(|| Log::new(1024 * 1024));
}

/// Copy out the kernel log, empty if it was never initialized
pub fn contents() -> Vec<u8> {
    LOG.lock().as_ref().map(Log::contents).unwrap_or_default()
}

pub struct Log {
    data: VecDeque<u8>,
    size: usize,
}

impl Log {
    pub fn new(size: usize) -> Log {
        Log {
            data: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Copy out the whole ring, oldest byte first
    pub fn contents(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn write(&mut self, buf: &[u8]) {
        for &b in buf {
            while self.data.len() + 1 >= self.size {
                self.data.pop_front();
            }
            self.data.push_back(b);
        }
    }
}

impl Write for Log {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

pub struct KernelLogger;

impl ::log::Log for KernelLogger {
    fn enabled(&self, metadata: &::log::Metadata<'_>) -> bool {
        metadata.level() <= ::log::max_level()
    }
    fn log(&self, record: &::log::Record<'_>) {
        if let Some(ref mut log) = *LOG.lock() {
            let _ = writeln!(log, "{} {}: {}", record.level(), record.target(), record.args());
        }
    }
    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Install the ring-buffer logger as the `log` backend. Fails if another backend is
/// already installed.
pub fn init_logger(level: ::log::LevelFilter) -> Result<(), ::log::SetLoggerError> {
    init();
    ::log::set_logger(&LOGGER)?;
    ::log::set_max_level(level);
    ::log::info!("Logger initialized.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_bytes() {
        let mut log = Log::new(8);
        log.write(b"abcdef");
        log.write(b"ghij");
        assert_eq!(log.contents(), b"defghij");
    }

    #[test]
    fn logger_formats_into_ring() {
        init();

        ::log::Log::log(
            &KernelLogger,
            &::log::Record::builder()
                .level(::log::Level::Warn)
                .target("kernel::context::shm")
                .args(format_args!("rolling back"))
                .build(),
        );

        let contents = contents();
        let text = String::from_utf8_lossy(&contents);
        assert!(text.contains("WARN kernel::context::shm: rolling back\n"), "{text:?}");
    }
}
