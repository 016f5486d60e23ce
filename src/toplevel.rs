use jtv::{ErrorKind, ExecutionResult, Interpreter};
use std::io::{stdin, stdout, BufRead, Write};

/// The accepted program is replayed from the top on every entry, so only
/// output lines beyond `shown` are printed.
struct Session {
    history: String,
    shown: usize,
    last: Option<ExecutionResult>,
}

enum Outcome {
    Accepted,
    Incomplete,
    Failed(jtv::Error),
}

impl Session {
    fn submit(&mut self, entry: &str) -> Outcome {
        let source = format!("{}{}", self.history, entry);
        let program = match jtv::parse(&source) {
            Ok(program) => program,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::Parse { offset, .. } if *offset >= source.trim_end().len() => {
                        Outcome::Incomplete
                    }
                    _ => Outcome::Failed(e),
                }
            }
        };

        let result = match Interpreter::new(&program).and_then(|mut i| i.run()) {
            Ok(result) => result,
            Err(e) => return Outcome::Failed(e),
        };
        for line in result.output.iter().skip(self.shown) {
            println!("{}", line);
        }
        if let Some(value) = &result.return_value {
            println!("=> {}", value);
        }
        self.shown = result.output.len();
        self.history = source;
        self.last = Some(result);
        Outcome::Accepted
    }

    fn vars(&self) {
        if let Some(result) = &self.last {
            for (name, value) in &result.variables {
                println!("{} = {} ({})", name, value, value.kind());
            }
        }
    }
}

pub(crate) fn main_loop() -> Result<(), failure::Error> {
    let mut session = Session {
        history: String::new(),
        shown: 0,
        last: None,
    };
    let mut pending = String::new();
    let stdin = stdin();

    loop {
        print!("{}", if pending.is_empty() { "Ready> " } else { "...> " });
        stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        if pending.is_empty() {
            match line.trim() {
                ":quit" | ":q" => break,
                ":vars" => {
                    session.vars();
                    continue;
                }
                "" => continue,
                _ => {}
            }
        }

        pending.push_str(&line);
        match session.submit(&pending) {
            Outcome::Accepted => pending.clear(),
            Outcome::Incomplete if !line.trim().is_empty() => {}
            Outcome::Incomplete => {
                println!("error: incomplete input discarded");
                pending.clear();
            }
            Outcome::Failed(e) => {
                println!("error: {}", e);
                for diagnostic in e.diagnostics() {
                    println!("  {}", diagnostic);
                }
                pending.clear();
            }
        }
    }

    Ok(())
}
