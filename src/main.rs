use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{config::Config as EditorConfig, Editor, Helper};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

mod input;
mod lang;

use input::{fixup_input, strip_comments, Command, ReplHelper};
use lang::runtime::Interpreter;

const HISTORY_FILE: &str = ".quill_history";
const PROMPT: &str = "(quill) ";

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Show debug output
    #[arg(short, long)]
    debug: bool,
    /// Evaluate a script line by line instead of starting a REPL
    script: Option<PathBuf>,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn init_editor() -> Result<Editor<ReplHelper, DefaultHistory>> {
    let config = EditorConfig::builder().auto_add_history(true).build();
    let mut editor = Editor::with_config(config)?;
    let validator = ReplHelper::new();
    editor.set_helper(Some(validator));

    Ok(editor)
}

fn init_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) {
    let _ = editor.load_history(HISTORY_FILE);
}

fn save_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) -> Result<()> {
    match editor.save_history(HISTORY_FILE) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to save history: {}", e),
    }
}

fn welcome() {
    println!(r#"quill v{}"#, env!("CARGO_PKG_VERSION"));
    println!("Type 'quit' or press Ctrl-D to quit");
    println!();
}

/// Evaluate every line of `path`, stopping at the first error
fn run_script(path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let content = strip_comments(&fixup_input(&content));

    let mut interp = Interpreter::new();
    for (idx, line) in content.lines().enumerate() {
        info!("eval: {}", line);

        match interp.evaluate_line(line) {
            Ok(Some(val)) => println!("{}", val),
            Ok(None) => (),
            Err(e) => bail!("{}:{}: {}", path.display(), idx + 1, e),
        }
    }

    Ok(())
}

fn repl() -> Result<()> {
    let mut editor = init_editor()?;
    init_history(&mut editor);
    welcome();

    let mut interp = Interpreter::new();
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                info!("read: {}", &line);

                let line = fixup_input(&line);
                match Command::from(line.as_str()) {
                    Command::Quit => break,
                    Command::Line(line) => match interp.evaluate_line(line) {
                        Ok(Some(val)) => println!("{}", val),
                        Ok(None) => (),
                        Err(e) => eprintln!("{}", e),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("Press Ctrl-D or type 'quit' to quit");
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                println!("quit");
                break;
            }
        }
    }

    save_history(&mut editor)?;

    Ok(())
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    match opts.script {
        Some(path) => run_script(&path),
        None => repl(),
    }
}
