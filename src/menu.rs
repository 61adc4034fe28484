// Menu Module for polydb
//
// A numbered list of choices shown at every interactive prompt. Input is
// matched by number, by exact label, or by a substring that picks out a
// single label, so "exp" selects "Export Data".

use crate::core::Backend;

/// Actions offered once a database is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ListCollections,
    CreateCollection,
    CreateRecord,
    ReadRecords,
    UpdateRecord,
    DeleteRecord,
    SchemaReport,
    ExportData,
    ImportData,
    BackupDatabase,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 11] = [
        MenuAction::ListCollections,
        MenuAction::CreateCollection,
        MenuAction::CreateRecord,
        MenuAction::ReadRecords,
        MenuAction::UpdateRecord,
        MenuAction::DeleteRecord,
        MenuAction::SchemaReport,
        MenuAction::ExportData,
        MenuAction::ImportData,
        MenuAction::BackupDatabase,
        MenuAction::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::ListCollections => "List Collections/Tables",
            MenuAction::CreateCollection => "Create a Collection/Table",
            MenuAction::CreateRecord => "Create a New Record",
            MenuAction::ReadRecords => "Read Records",
            MenuAction::UpdateRecord => "Update a Record",
            MenuAction::DeleteRecord => "Delete a Record",
            MenuAction::SchemaReport => "Generate Schema Report",
            MenuAction::ExportData => "Export Data",
            MenuAction::ImportData => "Import Data",
            MenuAction::BackupDatabase => "Backup Database",
            MenuAction::Exit => "Exit",
        }
    }

    /// The main menu
    pub fn menu() -> Menu {
        Menu::new(MenuAction::ALL.iter().map(|a| a.label()))
    }
}

/// The backend selection menu
pub fn backend_menu() -> Menu {
    Menu::new(Backend::ALL.iter().map(|b| b.name()))
}

pub struct Menu {
    options: Vec<String>,
}

impl Menu {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Menu {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Numbered listing, one option per line.
    pub fn render(&self) -> String {
        self.options
            .iter()
            .enumerate()
            .map(|(i, option)| format!("  {}) {}\n", i + 1, option))
            .collect()
    }

    /// Indexes of the options containing `query` (case-insensitive).
    pub fn filter(&self, query: &str) -> Vec<usize> {
        let q = query.trim().to_lowercase();
        self.options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.to_lowercase().contains(&q))
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolves user input to an option index.
    pub fn resolve(&self, input: &str) -> Option<usize> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if let Ok(n) = input.parse::<usize>() {
            return (1..=self.options.len()).contains(&n).then(|| n - 1);
        }
        if let Some(exact) = self.options.iter().position(|o| o.eq_ignore_ascii_case(input)) {
            return Some(exact);
        }
        match self.filter(input).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}
