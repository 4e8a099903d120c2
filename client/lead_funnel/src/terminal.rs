//! Line-based terminal driver for the funnel.
//!
//! `/b` goes back, `/q` quits, an empty line keeps the current answer.

use std::io::Write;

use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};

use lead_funnel::i18n::Messages;
use lead_funnel::quiz::{FunnelServices, QuizController, QuizSettings, Step, Transition};
use lead_funnel::store::{Capital, Motivation, Readiness, StepDataStore};

enum Command {
    Quit,
    Back,
    Text(String),
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(stdin()).lines(),
        }
    }

    async fn ask(&mut self, label: &str) -> anyhow::Result<Command> {
        print!("{label}> ");
        std::io::stdout().flush()?;
        let line = match self.lines.next_line().await? {
            Some(line) => line,
            None => return Ok(Command::Quit),
        };
        Ok(match line.trim() {
            "/q" => Command::Quit,
            "/b" => Command::Back,
            _ => Command::Text(line),
        })
    }
}

enum Exit {
    Home,
    Quit,
}

pub async fn run(services: FunnelServices, settings: QuizSettings) -> anyhow::Result<()> {
    let messages = settings.language.messages();
    let mut prompt = Prompt::new();

    loop {
        show_home(messages);
        match prompt.ask(messages.home.start_button).await? {
            Command::Quit => return Ok(()),
            Command::Back | Command::Text(_) => {}
        }

        // Every visit to the quiz starts from a fresh set of answers.
        let mut quiz = QuizController::new(StepDataStore::new(), services.clone(), settings);
        quiz.start();

        match run_quiz(&mut quiz, &mut prompt).await? {
            Exit::Home => continue,
            Exit::Quit => return Ok(()),
        }
    }
}

fn show_home(messages: &Messages) {
    println!();
    println!("{}", messages.home.title);
    for line in messages.home.highlight {
        println!("  {line}");
    }
    println!();
    println!("{}", messages.home.subtitle);
    println!();
}

async fn run_quiz(quiz: &mut QuizController, prompt: &mut Prompt) -> anyhow::Result<Exit> {
    let messages = quiz.messages();

    loop {
        let (current, total) = quiz.progress();
        println!();
        println!("[{current}/{total}]");

        let answers = quiz.answers();
        let command = match quiz.step() {
            Step::Capital => {
                let labels = Capital::ALL.map(|c| messages.capital_label(c));
                let selected = answers.capital.and_then(|c| Capital::ALL.iter().position(|o| *o == c));
                choose(prompt, messages, messages.capital_title, &labels, selected).await?
            }
            Step::Motivation => {
                let labels = Motivation::ALL.map(|m| messages.motivation_label(m));
                let selected = answers
                    .motivation
                    .and_then(|m| Motivation::ALL.iter().position(|o| *o == m));
                choose(prompt, messages, messages.motivation_title, &labels, selected).await?
            }
            Step::Readiness => {
                let labels = Readiness::ALL.map(|r| messages.readiness_label(r));
                let selected = answers
                    .readiness
                    .and_then(|r| Readiness::ALL.iter().position(|o| *o == r));
                choose(prompt, messages, messages.readiness_title, &labels, selected).await?
            }
            Step::Contact => contact_form(quiz, prompt).await?,
            Step::Done => {
                println!("{}", messages.done.title);
                println!("{}", messages.done.subtitle);
                println!("{}", messages.done.description);
                return Ok(match prompt.ask(messages.done.home_button).await? {
                    Command::Quit => Exit::Quit,
                    Command::Back | Command::Text(_) => Exit::Home,
                });
            }
        };

        let transition = match command {
            Choice::Quit => return Ok(Exit::Quit),
            Choice::Back => quiz.back(),
            Choice::Pick(idx) => {
                match quiz.step() {
                    Step::Capital => quiz.select_capital(Capital::ALL[idx]),
                    Step::Motivation => quiz.select_motivation(Motivation::ALL[idx]),
                    Step::Readiness => quiz.select_readiness(Readiness::ALL[idx]),
                    Step::Contact | Step::Done => {}
                }
                quiz.forward()
            }
            Choice::Next => quiz.forward(),
        };

        match transition {
            Transition::Exit => return Ok(Exit::Home),
            Transition::Rejected(result) => {
                for message in result.messages() {
                    println!("  ! {message}");
                }
            }
            Transition::Moved { .. } | Transition::Stayed | Transition::Submitted { .. } => {}
        }
    }
}

enum Choice {
    Quit,
    Back,
    Pick(usize),
    Next,
}

async fn choose(
    prompt: &mut Prompt,
    messages: &Messages,
    title: &str,
    labels: &[&str],
    selected: Option<usize>,
) -> anyhow::Result<Choice> {
    println!("{title}");
    println!("  (/b {})", messages.back);
    for (idx, label) in labels.iter().enumerate() {
        let mark = if selected == Some(idx) { "x" } else { " " };
        println!("  [{mark}] {}. {label}", idx + 1);
    }

    loop {
        match prompt.ask(messages.next).await? {
            Command::Quit => return Ok(Choice::Quit),
            Command::Back => return Ok(Choice::Back),
            Command::Text(text) if text.trim().is_empty() => return Ok(Choice::Next),
            Command::Text(text) => match text.trim().parse::<usize>() {
                Ok(n) if (1..=labels.len()).contains(&n) => return Ok(Choice::Pick(n - 1)),
                _ => println!("1-{}", labels.len()),
            },
        }
    }
}

async fn contact_form(quiz: &mut QuizController, prompt: &mut Prompt) -> anyhow::Result<Choice> {
    let messages = quiz.messages();
    println!("{}", messages.contact.title);
    println!("  (/b {})", messages.back);

    let answers = quiz.answers();
    let name_label = with_current(messages.contact.name_placeholder, &answers.name);
    match prompt.ask(&name_label).await? {
        Command::Quit => return Ok(Choice::Quit),
        Command::Back => return Ok(Choice::Back),
        Command::Text(text) if text.trim().is_empty() => {}
        Command::Text(text) => quiz.set_name(text.trim()),
    }

    let phone_label = with_current(messages.contact.phone_placeholder, quiz.phone_display());
    match prompt.ask(&phone_label).await? {
        Command::Quit => return Ok(Choice::Quit),
        Command::Back => return Ok(Choice::Back),
        Command::Text(text) if text.trim().is_empty() => {}
        Command::Text(text) => {
            let edit = quiz.edit_phone(&text, None);
            println!("  {}", edit.display);
        }
    }

    let email_label = with_current(messages.contact.email_placeholder, &answers.email);
    match prompt.ask(&email_label).await? {
        Command::Quit => return Ok(Choice::Quit),
        Command::Back => return Ok(Choice::Back),
        Command::Text(text) if text.trim().is_empty() => {}
        Command::Text(text) => quiz.set_email(text.trim()),
    }

    println!("{}", messages.submit);
    Ok(Choice::Next)
}

fn with_current(label: &str, current: &str) -> String {
    if current.is_empty() {
        label.to_string()
    } else {
        format!("{label} [{current}]")
    }
}
