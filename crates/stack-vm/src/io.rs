/// The part of a `Machine` that talks to the outside world.
///
/// The output buffer filled by `WRITE`/`WRITE_CHAR` is part of the run
/// result. Everything else goes through here: the `PRINT` instruction
/// and, when debugging is enabled, the disassembly and the
/// per-instruction trace.
pub trait MachineIO {
    /// Print a value. Called by `PRINT`.
    fn print(&mut self, value: i64);

    /// Emit one line of debug output.
    fn debug(&mut self, line: &str);
}

/// A [`MachineIO`] that prints to stdout and writes debug lines to
/// stderr.
#[cfg(feature = "std")]
#[derive(Copy, Clone, Debug, Default)]
pub struct StdIO;

#[cfg(feature = "std")]
impl MachineIO for StdIO {
    fn print(&mut self, value: i64) {
        println!("{value}");
    }

    fn debug(&mut self, line: &str) {
        eprintln!("{line}");
    }
}

/// A [`MachineIO`] that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullIO;

impl MachineIO for NullIO {
    fn print(&mut self, _value: i64) {}

    fn debug(&mut self, _line: &str) {}
}
