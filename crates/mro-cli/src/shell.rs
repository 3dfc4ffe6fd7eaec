//! `mro chat`: interactive REPL over one [`ChatSession`].
//!
//! The session is created on the first question and reset by `/clear`.
//! Service and data errors are shown and the loop goes on; configuration
//! errors end it.

use colored::Colorize;
use mro_core::{ChatSession, Chatbot, Config, Error, Recovery};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::{print_answer, with_spinner};

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Clear,
    History,
    Help,
    Model(Option<&'a str>),
    Unknown(&'a str),
    Question(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (command, None),
    };
    match name {
        "quit" | "exit" => Input::Quit,
        "clear" => Input::Clear,
        "history" => Input::History,
        "help" => Input::Help,
        "model" => Input::Model(arg),
        _ => Input::Unknown(name),
    }
}

fn print_help() {
    println!("  {}          start a new conversation", "/clear".yellow());
    println!("  {}   show or switch the chat model", "/model [NAME]".yellow());
    println!("  {}        list this conversation", "/history".yellow());
    println!("  {}           leave", "/quit".yellow());
}

pub(crate) async fn run(bot: &Chatbot, config: &Config) -> Result<(), Error> {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}: failed to initialize readline: {e}", "error".red());
            return Ok(());
        }
    };

    println!("{}", "MRO maintenance assistant".bold().green());
    println!("Ask about your manuals. Type {} for commands, {} to exit.\n", "/help".yellow(), "/quit".yellow());

    let mut session: Option<ChatSession> = None;
    let prompt = format!("{}> ", "mro".green());
    loop {
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };
        let input = parse(&line);
        if input != Input::Empty {
            let _ = rl.add_history_entry(line.trim());
        }
        match input {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => print_help(),
            Input::Clear => {
                if let Some(s) = session.as_mut() {
                    s.clear();
                }
                println!("{}", "Conversation cleared.".dimmed());
            }
            Input::History => match session.as_ref().map(ChatSession::history) {
                Some(history) if !history.is_empty() => {
                    for (i, ex) in history.iter().enumerate() {
                        println!("{} {}", format!("[{}] you:", i + 1).cyan(), ex.query);
                        println!("{} {}", "    mro:".green(), ex.response);
                        if let Some(fig) = &ex.figure {
                            println!("    {} {}", "figure:".dimmed(), fig.citation);
                        }
                    }
                }
                _ => println!("{}", "No questions yet.".dimmed()),
            },
            Input::Model(None) => {
                let model = session.as_ref().map_or(bot.default_model(), ChatSession::model);
                println!("model: {model}");
            }
            Input::Model(Some(name)) => {
                session
                    .get_or_insert_with(|| bot.new_session(config.memory_window))
                    .set_model(name);
                println!("{}", format!("Now using {name}.").dimmed());
            }
            Input::Unknown(name) => eprintln!("{} /{name}; try /help", "unknown command".yellow()),
            Input::Question(question) => {
                let session = session.get_or_insert_with(|| bot.new_session(config.memory_window));
                match with_spinner(bot.ask(session, question)).await {
                    Ok(answer) => {
                        println!();
                        print_answer(&answer);
                        println!();
                    }
                    Err(e) => match e.recovery() {
                        Recovery::FailFast => return Err(e),
                        Recovery::ReportAndContinue => eprintln!("{}: {e}", "error".red()),
                    },
                }
            }
        }
    }
    Ok(())
}
