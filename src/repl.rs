use crate::config::AppConfig;
use crate::core::record::parse_record;
use crate::core::{Backend, PolydbError, Result, Target};
use crate::db;
use crate::export::ExportFormat;
use crate::menu::{backend_menu, Menu, MenuAction};
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;

const SELECT_EXISTING: &str = "Select Existing";
const CREATE_NEW: &str = "Create New";

/// Line-oriented prompts over any reader/writer pair.
///
/// Reaching the end of input fails with `PolydbError::Prompt`, which the
/// session treats as the user leaving.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PolydbError::Prompt("end of input".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Asks for free text; the answer is trimmed.
    pub fn input(&mut self, question: &str) -> Result<String> {
        write!(self.output, "? {} ", question)?;
        self.output.flush()?;
        Ok(self.read_line()?.trim().to_string())
    }

    /// Shows a numbered menu until the answer resolves to one option.
    pub fn select(&mut self, question: &str, menu: &Menu) -> Result<usize> {
        loop {
            writeln!(self.output, "? {}", question)?;
            write!(self.output, "{}", menu.render())?;
            write!(self.output, "> ")?;
            self.output.flush()?;

            let answer = self.read_line()?;
            if let Some(index) = menu.resolve(&answer) {
                return Ok(index);
            }
            let suggestions = menu.filter(&answer);
            if answer.trim().is_empty() || suggestions.is_empty() {
                writeln!(self.output, "Please choose one of the listed options.")?;
            } else {
                writeln!(self.output, "Did you mean:")?;
                for index in suggestions {
                    writeln!(self.output, "  {}", menu.options()[index])?;
                }
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        write!(self.output, "Press Enter to continue...")?;
        self.output.flush()?;
        self.read_line()?;
        Ok(())
    }

    pub fn say(&mut self, message: impl Display) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }
}

/// Runs the interactive session: pick a backend and database, then loop over
/// the main menu until "Exit" or end of input.
pub async fn run_interactive<R: BufRead, W: Write>(
    config: &AppConfig,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    match session(config, prompter).await {
        Err(PolydbError::Prompt(reason)) => {
            info!("Interactive session ended: {}", reason);
            Ok(())
        }
        other => other,
    }
}

async fn session<R: BufRead, W: Write>(config: &AppConfig, prompter: &mut Prompter<R, W>) -> Result<()> {
    let backend = Backend::ALL[prompter.select("Select the database type:", &backend_menu())?];
    let mode = prompter.select(
        "Do you want to select an existing database or create a new one?",
        &Menu::new([SELECT_EXISTING, CREATE_NEW]),
    )?;
    let name = prompter.input(&format!("Enter the {} database name:", backend))?;
    if mode == 1 {
        db::create_database(config, backend, &name).await?;
        prompter.say(format!("Database {} created.", name))?;
    }
    let target = db::select_database(config, backend, &name).await?;
    prompter.say(format!("Using {} database {}.", backend, target.database))?;

    let menu = MenuAction::menu();
    loop {
        let action = MenuAction::ALL[prompter.select("What would you like to do?", &menu)?];
        if action == MenuAction::Exit {
            prompter.say("Goodbye!")?;
            return Ok(());
        }
        match perform(config, &target, action, prompter).await {
            Ok(()) => {}
            Err(e @ PolydbError::Prompt(_)) => return Err(e),
            Err(e) => prompter.say(format!("Error {}: {}", failure_verb(action), e))?,
        }
        prompter.pause()?;
    }
}

fn failure_verb(action: MenuAction) -> &'static str {
    match action {
        MenuAction::ListCollections => "listing collections",
        MenuAction::CreateCollection => "creating collection",
        MenuAction::CreateRecord => "inserting record",
        MenuAction::ReadRecords => "reading records",
        MenuAction::UpdateRecord => "updating record",
        MenuAction::DeleteRecord => "deleting record",
        MenuAction::SchemaReport => "generating schema report",
        MenuAction::ExportData => "exporting data",
        MenuAction::ImportData => "importing data",
        MenuAction::BackupDatabase => "backing up database",
        MenuAction::Exit => "exiting",
    }
}

fn print_collections<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    noun: &str,
    names: &[String],
) -> Result<()> {
    if names.is_empty() {
        return prompter.say(format!("No {}s found.", noun));
    }
    prompter.say(format!("{}s:", capitalize(noun)))?;
    for name in names {
        prompter.say(format!("  - {}", name))?;
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

async fn perform<R: BufRead, W: Write>(
    config: &AppConfig,
    target: &Target,
    action: MenuAction,
    prompter: &mut Prompter<R, W>,
) -> Result<()> {
    let noun = target.backend.collection_noun();
    let ask_collection = format!("Enter the {} name:", noun);

    match action {
        MenuAction::ListCollections => {
            let names = db::list_collections(config, target).await?;
            print_collections(prompter, noun, &names)?;
        }
        MenuAction::CreateCollection => {
            let choice = prompter.select(
                &format!("Select an existing {} or create a new one?", noun),
                &Menu::new([SELECT_EXISTING, CREATE_NEW]),
            )?;
            if choice == 0 {
                let names = db::list_collections(config, target).await?;
                print_collections(prompter, noun, &names)?;
            } else {
                let name = prompter.input(&format!("Enter the new {} name:", noun))?;
                let definition = if target.backend.is_relational() {
                    prompter.input("Enter the column definitions (e.g. id INTEGER PRIMARY KEY, name TEXT):")?
                } else {
                    String::new()
                };
                db::create_collection(config, target, &name, &definition).await?;
                prompter.say(format!("{} {} created.", capitalize(noun), name))?;
            }
        }
        MenuAction::CreateRecord => {
            let collection = prompter.input(&ask_collection)?;
            let record = parse_record(&prompter.input("Enter the record as JSON:")?)?;
            db::create_record(config, target, &collection, &record).await?;
            prompter.say("Record inserted.")?;
        }
        MenuAction::ReadRecords => {
            let collection = prompter.input(&ask_collection)?;
            let records = db::read_records(config, target, &collection).await?;
            if records.is_empty() {
                prompter.say("No records found.")?;
            } else {
                prompter.say(serde_json::to_string_pretty(&records)?)?;
            }
        }
        MenuAction::UpdateRecord => {
            let collection = prompter.input(&ask_collection)?;
            let id = prompter.input("Enter the record ID to update:")?;
            let changes = parse_record(&prompter.input("Enter the fields to update as JSON:")?)?;
            match db::update_record(config, target, &collection, &id, &changes).await? {
                0 => prompter.say(format!("No record found with ID {}.", id))?,
                _ => prompter.say("Record updated.")?,
            }
        }
        MenuAction::DeleteRecord => {
            let collection = prompter.input(&ask_collection)?;
            let id = prompter.input("Enter the record ID to delete:")?;
            match db::delete_record(config, target, &collection, &id).await? {
                0 => prompter.say(format!("No record found with ID {}.", id))?,
                _ => prompter.say("Record deleted.")?,
            }
        }
        MenuAction::SchemaReport => {
            let collection = prompter.input(&ask_collection)?;
            let report = db::generate_schema_report(config, target, &collection).await?;
            prompter.say(report.render().trim_end())?;
        }
        MenuAction::ExportData => {
            let collection = prompter.input(&ask_collection)?;
            let formats = Menu::new(ExportFormat::ALL.iter().map(|f| f.extension()));
            let format = ExportFormat::ALL[prompter.select("Select the export format:", &formats)?];
            let summary = db::export_data(config, target, &collection, format, None).await?;
            prompter.say(format!(
                "Exported {} records to {}.",
                summary.records,
                summary.path.display()
            ))?;
        }
        MenuAction::ImportData => {
            let collection = prompter.input(&ask_collection)?;
            let path = prompter.input("Enter the path of the file to import (CSV or JSON):")?;
            let imported = db::import_data(config, target, &collection, Path::new(&path)).await?;
            prompter.say(format!("Imported {} records into {}.", imported, collection))?;
        }
        MenuAction::BackupDatabase => {
            let dir = prompter.input(&format!(
                "Enter the backup directory (blank for {}):",
                config.backup.directory.display()
            ))?;
            let out_dir = if dir.is_empty() { None } else { Some(Path::new(&dir)) };
            let artifact = db::backup_database(config, target, out_dir).await?;
            prompter.say(format!("Backup completed: {}", artifact.display()))?;
        }
        MenuAction::Exit => {}
    }
    Ok(())
}
