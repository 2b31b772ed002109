use basic::lang::ErrorCode;
use basic::mach::{Console, Runtime};
use ansi_term::Style;
use linefeed::{DefaultTerminal, Interface, ReadResult, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("BASIC_LOG"))
        .with_writer(std::io::stderr)
        .init();
    if let Err(error) = main_loop() {
        eprintln!("{}", error);
    }
}

fn main_loop() -> std::io::Result<()> {
    let command = Arc::new(Interface::new("BASIC")?);
    command.set_prompt("> ")?;
    let input = Interface::new("INPUT")?;
    input.set_report_signal(Signal::Interrupt, true);

    let runtime = Runtime::default();
    let interrupted = runtime.break_flag();
    let int_moved = interrupted.clone();
    ctrlc::set_handler(move || {
        int_moved.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");
    let mut runtime = runtime.with_console(Terminal::new(command.clone(), input, interrupted.clone()));

    if let Some(path) = std::env::args().nth(1) {
        let text = std::fs::read_to_string(&path)?;
        let result = runtime.load(&text).and_then(|_| runtime.run());
        report(&command, result.map_err(|error| error.in_source(&path)))?;
    }

    loop {
        let string = match command.read_line()? {
            ReadResult::Input(string) => string,
            ReadResult::Signal(_) | ReadResult::Eof => break,
        };
        if !string.trim().is_empty() {
            command.add_history_unique(string.clone());
        }
        interrupted.store(false, Ordering::SeqCst);
        let result = runtime.enter(&string);
        report(&command, result)?;
    }
    Ok(())
}

fn report(command: &Interface<DefaultTerminal>, result: Result<(), basic::lang::Error>) -> std::io::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(error) if error.code() == ErrorCode::Break => {
            command.write_fmt(format_args!("\n{}\n", Style::new().bold().paint("BREAK")))
        }
        Err(error) => command.write_fmt(format_args!(
            "{}\n",
            Style::new().bold().paint(format!("?{}", error))
        )),
    }
}

/// Console on the terminal. PRINT goes through the command interface so
/// output interleaves with the prompt; INPUT reads on its own interface.
struct Terminal {
    output: Arc<Interface<DefaultTerminal>>,
    input: Interface<DefaultTerminal>,
    interrupted: Arc<AtomicBool>,
    /// Text written since the last newline, redrawn as the INPUT prompt.
    tail: String,
}

impl Terminal {
    fn new(
        output: Arc<Interface<DefaultTerminal>>,
        input: Interface<DefaultTerminal>,
        interrupted: Arc<AtomicBool>,
    ) -> Terminal {
        Terminal {
            output,
            input,
            interrupted,
            tail: String::new(),
        }
    }
}

impl Console for Terminal {
    fn write_str(&mut self, s: &str) {
        match s.rfind('\n') {
            Some(index) => self.tail = s[index + 1..].to_string(),
            None => self.tail.push_str(s),
        }
        if let Err(error) = self.output.write_fmt(format_args!("{}", s)) {
            warn!(%error, "console write failed");
        }
    }

    fn read_line(&mut self) -> Option<String> {
        let prompt = std::mem::take(&mut self.tail);
        if !prompt.is_empty() {
            // the prompt is redrawn over the text already on the line
            if let Err(error) = self.output.write_fmt(format_args!("\r")) {
                warn!(%error, "console write failed");
            }
        }
        if let Err(error) = self.input.set_prompt(&prompt) {
            warn!(%error, "cannot set input prompt");
        }
        match self.input.read_line() {
            Ok(ReadResult::Input(string)) => Some(string),
            Ok(ReadResult::Signal(Signal::Interrupt)) => {
                if let Err(error) = self.input.set_buffer("") {
                    warn!(%error, "cannot clear input");
                }
                if let Err(error) = self.input.lock_reader().cancel_read_line() {
                    warn!(%error, "cannot cancel input");
                }
                self.interrupted.store(true, Ordering::SeqCst);
                None
            }
            Ok(_) => None,
            Err(error) => {
                warn!(%error, "console read failed");
                None
            }
        }
    }

    fn read_key(&mut self) -> Option<char> {
        None
    }
}
