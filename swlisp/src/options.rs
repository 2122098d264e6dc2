//! Interpreter configuration

use parking_lot::{Mutex, MutexGuard};
use swlisp_gc::DEFAULT_MAX_OBJECTS;

/// Options passed throughout the program.
pub struct Options {
    /// Live-object count at which allocation triggers a collection, and the
    /// hard ceiling an allocation may not leave the heap above
    pub heap_limit: usize,

    /// Run a collection on every allocation
    pub gc_stress: bool,

    /// Buffer to write all printed output into instead of stdout
    pub dump_buffer: Option<Mutex<Vec<u8>>>,
}

impl Options {
    pub fn dump_buffer(&self) -> Option<MutexGuard<'_, Vec<u8>>> {
        self.dump_buffer.as_ref().map(|buffer| buffer.lock())
    }
}

impl Default for Options {
    /// Create a new options struct with default values.
    fn default() -> Self {
        OptionsBuilder::new().build()
    }
}

pub struct OptionsBuilder(Options);

impl OptionsBuilder {
    /// Create new options with default values.
    pub fn new() -> Self {
        Self(Options {
            heap_limit: DEFAULT_MAX_OBJECTS,
            gc_stress: false,
            dump_buffer: None,
        })
    }

    pub fn heap_limit(mut self, heap_limit: usize) -> Self {
        self.0.heap_limit = heap_limit;
        self
    }

    pub fn gc_stress(mut self, gc_stress: bool) -> Self {
        self.0.gc_stress = gc_stress;
        self
    }

    /// Capture printed output in an in-memory buffer instead of stdout.
    pub fn capture_output(mut self) -> Self {
        self.0.dump_buffer = Some(Mutex::new(Vec::new()));
        self
    }

    pub fn build(self) -> Options {
        self.0
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
