//! Command line definitions
use biblio_core::model::types::CopyState;
use chrono::NaiveDateTime;
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "biblio",
    version,
    about = "Administer the library: books, copies, members, categories and loans"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the library REST API (overrides BIBLIO_API_URL)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output (-v for info, -vv for debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Books and their copies
    #[command(subcommand)]
    Books(BooksCommand),
    /// Library members
    #[command(subcommand)]
    Members(MembersCommand),
    /// Book categories
    #[command(subcommand)]
    Categories(CategoriesCommand),
    /// Loans of book copies to members
    #[command(subcommand)]
    Loans(LoansCommand),
    /// Search the catalogue
    Search(SearchArgs),
}

impl Command {
    /// Short name used in logs
    pub const fn name(&self) -> &'static str {
        match *self {
            Self::Books(ref books) => match *books {
                BooksCommand::List => "books.list",
                BooksCommand::Show { .. } => "books.show",
                BooksCommand::Loans { .. } => "books.loans",
                BooksCommand::AddCopies { .. } => "books.add_copies",
                BooksCommand::ToLoan => "books.to_loan",
            },
            Self::Members(ref members) => match *members {
                MembersCommand::List => "members.list",
                MembersCommand::Show { .. } => "members.show",
                MembersCommand::Delete { .. } => "members.delete",
            },
            Self::Categories(ref categories) => match *categories {
                CategoriesCommand::List => "categories.list",
                CategoriesCommand::Add { .. } => "categories.add",
                CategoriesCommand::Delete { .. } => "categories.delete",
            },
            Self::Loans(ref loans) => match *loans {
                LoansCommand::List { .. } => "loans.list",
                LoansCommand::New { .. } => "loans.new",
                LoansCommand::Return { .. } => "loans.return",
            },
            Self::Search(_) => "search",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum BooksCommand {
    /// List every book
    List,
    /// Show one book with its copies
    Show { id: String },
    /// Show the loan history of a book
    Loans { id: String },
    /// Add copies to a book
    AddCopies {
        id: String,
        /// Number of copies to add
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// State of the new copies (Neuf, Très bon, Bon, Usé, Mauvais)
        #[arg(long, default_value = "Neuf", value_parser = parse_state)]
        state: CopyState,
    },
    /// List the books that own at least one copy
    ToLoan,
}

#[derive(Subcommand, Debug)]
pub enum MembersCommand {
    /// List every member
    List,
    /// Show one member with their loans
    Show { id: String },
    /// Delete a member
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CategoriesCommand {
    /// List every category
    List,
    /// Create a category
    Add {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        /// Books of this category are not lent to children
        #[arg(long)]
        adult_only: bool,
    },
    /// Delete a category
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum LoansCommand {
    /// List loans
    List {
        /// Only loans whose copy has not come back
        #[arg(long)]
        active: bool,
    },
    /// Lend a copy to a member
    New {
        #[arg(long)]
        member: String,
        #[arg(long)]
        copy: String,
        /// Loan time, e.g. 2024-03-01T10:00:00 (defaults to now)
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },
    /// Close a loan
    Return {
        id: String,
        /// State the copy came back in
        #[arg(long, value_parser = parse_state)]
        state: CopyState,
    },
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Part of the title or the ISBN
    #[arg(long)]
    pub title: Option<String>,
    /// Part of a category name
    #[arg(long)]
    pub category: Option<String>,
    /// Part of an author's full name
    #[arg(long)]
    pub author: Option<String>,
    /// Part of the publication year
    #[arg(long)]
    pub year: Option<String>,
    /// Part of the page count
    #[arg(long)]
    pub pages: Option<String>,
    /// Only books with a borrowable copy
    #[arg(long)]
    pub available: bool,
    /// Leave out adult-only books
    #[arg(long)]
    pub child_safe: bool,
    /// Filter the books loaded from the server without a dedicated search request
    #[arg(long, conflicts_with = "copies")]
    pub cached: bool,
    /// List the borrowable copies of the matches instead of the books
    #[arg(long)]
    pub copies: bool,
}

fn parse_state(label: &str) -> Result<CopyState, String> {
    CopyState::from_label(label).ok_or_else(|| {
        let known: Vec<&str> = CopyState::ALL.iter().map(|state| state.label()).collect();
        format!("unknown copy state {label:?}, expected one of {}", known.join(", "))
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn copy_states_parse_from_labels() {
        let cli = Cli::try_parse_from([
            "biblio",
            "books",
            "add-copies",
            "b1",
            "--count",
            "3",
            "--state",
            "très bon",
        ])
        .unwrap();

        let Command::Books(BooksCommand::AddCopies { id, count, state }) = cli.command else {
            panic!("parsed the wrong command");
        };
        assert_eq!(id, "b1");
        assert_eq!(count, 3);
        assert_eq!(state, CopyState::VeryGood);
    }

    #[test]
    fn unknown_copy_state_is_rejected() {
        let parsed = Cli::try_parse_from(["biblio", "loans", "return", "l1", "--state", "abîmé"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "biblio",
            "search",
            "--title",
            "potter",
            "--available",
            "--json",
            "--api-url",
            "http://library.local/api/v1/rest",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(
            cli.api_url.as_deref(),
            Some("http://library.local/api/v1/rest")
        );
        assert_eq!(cli.command.name(), "search");
        let Command::Search(args) = cli.command else {
            panic!("parsed the wrong command");
        };
        assert_eq!(args.title.as_deref(), Some("potter"));
        assert!(args.available);
    }

    #[test]
    fn loan_time_is_parsed() {
        let cli = Cli::try_parse_from([
            "biblio",
            "loans",
            "new",
            "--member",
            "m1",
            "--copy",
            "x1",
            "--at",
            "2024-03-01T10:00:00",
        ])
        .unwrap();
        let Command::Loans(LoansCommand::New { at, .. }) = cli.command else {
            panic!("parsed the wrong command");
        };
        assert_eq!(at.unwrap().to_string(), "2024-03-01 10:00:00");
    }
}
