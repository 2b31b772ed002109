#![allow(dead_code)]
use basic::mach::{Console, Recorder, Runtime};

/// A runtime with its console kept on the side.
pub struct Machine {
    pub runtime: Runtime,
    pub console: Recorder,
}

impl Machine {
    pub fn new() -> Machine {
        let console = Recorder::new();
        Machine {
            runtime: Runtime::new(console.clone()),
            console,
        }
    }

    /// Enters one line; an error is printed the way the terminal shows it.
    pub fn enter(&mut self, line: &str) {
        if let Err(error) = self.runtime.enter(line) {
            self.console.clone().write_str(&format!("?{}\n", error));
        }
    }

    pub fn load(&mut self, program: &str) {
        if let Err(error) = self.runtime.load(program) {
            self.console.clone().write_str(&format!("?{}\n", error));
        }
    }
}

/// Output since the last call.
pub fn exec(m: &mut Machine) -> String {
    m.console.take_output()
}

/// Loads and runs a whole program, returning everything it printed.
pub fn run(program: &str) -> String {
    let mut m = Machine::new();
    m.load(program);
    m.enter("RUN");
    exec(&mut m)
}
