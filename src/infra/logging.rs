//! Tracing subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::util::SubscriberInitExt;

/// Map `-v` occurrences to a default filter; `RUST_LOG` wins when set.
pub fn filter_for(verbosity: u8) -> EnvFilter
{
    let default = match verbosity
    {
        0 => "shelfrank=warn",
        1 => "shelfrank=info",
        2 => "shelfrank=debug",
        _ => "shelfrank=trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// `fmt` subscriber with RFC 3339 UTC timestamps, writing to `writer`
pub fn subscriber<W>(
    verbosity: u8,
    no_color: bool,
    writer: W,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity))
        .with_writer(writer)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(!no_color)
        .with_target(false)
        .finish()
}

/// Install the stderr subscriber. Safe to call more than once.
pub fn init(
    verbosity: u8,
    no_color: bool,
)
{
    let _ = subscriber(verbosity, no_color, std::io::stderr).try_init();
}

#[cfg(test)]
mod tests
{
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture
    {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize>
        {
            self.0
                .lock()
                .unwrap()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()>
        {
            Ok(())
        }
    }

    #[test]
    fn events_carry_utc_timestamps()
    {
        let capture = Capture::default();
        let sink = capture.clone();
        let sub = subscriber(3, true, move || sink.clone());
        tracing::subscriber::with_default(sub, || tracing::error!("category recomputed"));

        let text = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let line = text
            .lines()
            .next()
            .expect("one event written");
        assert!(line.contains("category recomputed"));
        // 2024-01-01T00:00:00...
        assert_eq!(&line[4..5], "-");
        assert_eq!(&line[10..11], "T");
        assert!(line[..4].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn init_twice_is_harmless()
    {
        init(0, true);
        init(2, true);
    }
}
