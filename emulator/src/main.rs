mod clock;
mod hw;
mod session;

use std::env;
use std::fs;
use std::process;

use pico_core::config::{self, BoardId, Config};
use pico_core::error::{FatalError, report_fatal};
use pico_core::script;
use pico_core::telemetry::EventLog;
use static_cell::StaticCell;

use session::{ButtonSource, CONSOLE, SessionError};

const USAGE: &str = "Usage: pico-emulator [--board <pico1|pico2>] [--script <script> | --script-file <path>]";

static CONFIG: StaticCell<Config> = StaticCell::new();

#[derive(Debug, Eq, PartialEq)]
enum ScriptArg {
    Inline(String),
    File(String),
}

#[derive(Debug, Eq, PartialEq)]
struct Options {
    board: BoardId,
    script: Option<ScriptArg>,
}

fn main() {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let source = match load_source(options.script) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    let config = match config::load(options.board) {
        Ok(config) => CONFIG.init(config),
        Err(error) => {
            let _ = report_fatal(&mut &CONSOLE, &FatalError::from(error), &EventLog::new());
            process::exit(1);
        }
    };

    match session::run(config, source) {
        Ok(()) => {}
        Err(SessionError::Fatal(_)) => process::exit(1),
        Err(err @ SessionError::Terminal(_)) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

fn parse_options<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options {
        board: BoardId::Pico1,
        script: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--board" => {
                let name = value()?;
                options.board =
                    BoardId::from_name(&name).map_err(|_| format!("Unknown board `{name}`"))?;
            }
            "--script" => options.script = Some(ScriptArg::Inline(value()?)),
            "--script-file" => options.script = Some(ScriptArg::File(value()?)),
            _ => return Err(format!("Unexpected argument `{flag}`")),
        }
    }

    Ok(options)
}

fn load_source(script: Option<ScriptArg>) -> Result<ButtonSource, String> {
    let text = match script {
        None => return Ok(ButtonSource::Keyboard),
        Some(ScriptArg::Inline(text)) => text,
        Some(ScriptArg::File(path)) => {
            fs::read_to_string(&path).map_err(|err| format!("Cannot read `{path}`: {err}"))?
        }
    };
    script::parse(&text)
        .map(ButtonSource::Script)
        .map_err(|err| format!("Invalid script: {err}"))
}
