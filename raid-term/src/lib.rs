#![cfg_attr(not(test), no_std)]

//! The ambient logging concern, kept deliberately tiny. Persistent logging
//! is an external collaborator, not a core responsibility, so this crate
//! does not decide where log lines end up — it only gives the engine a
//! uniform `log!` call site and lets whatever embeds it install a [`Sink`].
//! Until one is installed, log lines are dropped.

use core::fmt::Arguments;

use spin::Mutex;

pub trait Sink: Send + Sync {
    fn write(&self, args: Arguments<'_>);
}

struct NullSink;

impl Sink for NullSink {
    fn write(&self, _args: Arguments<'_>) {}
}

static SINK: Mutex<&'static dyn Sink> = Mutex::new(&NullSink);

/// Installs the process-wide sink. Later calls replace the previous sink.
pub fn set_sink(sink: &'static dyn Sink) {
    *SINK.lock() = sink;
}

#[doc(hidden)]
pub fn dispatch(args: Arguments<'_>) {
    SINK.lock().write(args);
}

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::dispatch(format_args!("{} - line {}, {}\n", file!(), line!(), format_args!($($arg)*)))
    };
}
