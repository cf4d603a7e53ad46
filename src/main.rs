use anyhow::{bail, Context};
use clap::Parser;
use inquire::error::InquireResult;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod app;
mod books;
mod cli;
mod config;
mod lifecycle;
mod seed;
mod semantic;
mod storage;
mod summarize;
#[cfg(test)]
mod tests;

use app::{AppError, AppFactory, Catalogue};
use books::{BookCreate, BookUpdate};
use cli::{BookFields, Command};

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_content(fields: &BookFields) -> anyhow::Result<Option<String>> {
    match &fields.content_file {
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("failed to read {}", path.display())),
        None => Ok(fields.content.clone()),
    }
}

fn run(catalogue: &Catalogue, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Seed { path } => print_json(&catalogue.seed(&path)?),

        Command::Add { fields } => {
            let book_create = BookCreate {
                title: fields.title.clone().unwrap_or_default(),
                author: fields.author.clone().unwrap_or_default(),
                genre: fields.genre.clone(),
                description: fields.description.clone(),
                content: read_content(&fields)?,
            };
            print_json(&catalogue.create(book_create)?)
        }

        Command::List { query, count } => {
            let books = catalogue.list(query.as_deref())?;
            if count {
                println!("{} books found", books.len());
                return Ok(());
            }
            print_json(&books)
        }

        Command::Show { id } => print_json(&catalogue.get(id)?),

        Command::Update { id, fields } => {
            let book_update = BookUpdate {
                title: fields.title.clone(),
                author: fields.author.clone(),
                genre: fields.genre.clone(),
                description: fields.description.clone(),
                content: read_content(&fields)?,
            };

            if book_update.is_empty() {
                println!("This update request does nothing");
                return Ok(());
            }

            print_json(&catalogue.update(id, book_update)?)
        }

        Command::Delete { id, yes } => {
            let book = catalogue.get(id)?;

            if !yes {
                match inquire::prompt_confirmation(format!(
                    "Are you sure you want to delete '{}' by {}?",
                    book.title, book.author
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }

            catalogue.delete(id)?;
            println!("deleted book #{id}");
            Ok(())
        }

        Command::Summarize {
            id,
            max_length,
            min_length,
        } => print_json(&catalogue.summarize(id, max_length, min_length)?),

        Command::Similar { id, top_k } => print_json(&catalogue.recommendations(id, top_k)?),

        Command::Search { description, top_k } => {
            print_json(&catalogue.search_by_description(&description, top_k)?)
        }

        Command::Models { load } => {
            if load {
                let summarizer = catalogue.preload()?;
                if let Ok(Err(err)) = summarizer.join() {
                    log::warn!("background summarizer load failed: {err}");
                }
            }
            print_json(&catalogue.model_status())
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let paths = AppFactory::get_paths()?;
    let catalogue = AppFactory::create_catalogue(&paths)?;

    if let Err(err) = run(&catalogue, args.command) {
        if let Some(app_err) = err.downcast_ref::<AppError>() {
            if app_err.is_user_error() {
                eprintln!("error: {app_err}");
                std::process::exit(2);
            }
        }
        return Err(err);
    }

    Ok(())
}
