use crate::cli::{
    BooksCommand, CategoriesCommand, Command, LoansCommand, MembersCommand, SearchArgs,
};
use crate::errors::Error;
use crate::state::{AppState, recorded};
use biblio_core::SearchCriteria;
use biblio_core::model::types::{Book, BookCopy, Category, Loan, Member};
use chrono::Local;
use serde::Serialize;
use std::time::Instant;
use tracing::{Instrument as _, info_span};

/// Prints `value` as JSON, or `lines` as text
#[allow(clippy::print_stdout, reason = "Printing results is the point of a command")]
fn emit<T: Serialize + ?Sized>(state: &AppState, value: &T, lines: &[String]) -> Result<(), Error> {
    if state.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else if lines.is_empty() {
        println!("(none)");
    } else {
        for line in lines {
            println!("{line}");
        }
    }
    Ok(())
}

/// Prints the status message a store left after a mutation
#[allow(clippy::print_stdout, reason = "Printing results is the point of a command")]
fn report(state: &AppState, status: Option<String>) -> Result<(), Error> {
    let status = status.unwrap_or_default();
    if state.json {
        println!("{}", serde_json::json!({ "status": status }));
    } else {
        println!("{status}");
    }
    Ok(())
}

fn book_line(book: &Book) -> String {
    let mut line = format!(
        "{:<10} {:<14} {}",
        book.id.as_deref().unwrap_or("-"),
        book.isbn,
        book.title
    );
    if let Some(year) = book.publication_year {
        line.push_str(&format!(" ({year})"));
    }
    if let Some(copies) = book.copies.as_ref() {
        line.push_str(&format!(
            " [{}/{} borrowable]",
            book.borrowable_copies().len(),
            copies.len()
        ));
    }
    line
}

fn copy_line(copy: &BookCopy) -> String {
    let whereabouts = if copy.removed {
        "removed"
    } else if copy.available {
        "on shelf"
    } else {
        "lent out"
    };
    format!(
        "  copy {:<10} {:<9} {whereabouts}",
        copy.id.as_deref().unwrap_or("-"),
        copy.state.label()
    )
}

fn book_details(book: &Book) -> Vec<String> {
    let mut lines = vec![book_line(book)];
    if let Some(editor) = book.editor.as_deref() {
        lines.push(format!("  editor: {editor}"));
    }
    if let Some(pages) = book.num_of_pages {
        lines.push(format!("  pages: {pages}"));
    }
    for author in &book.authors {
        lines.push(format!("  author: {}", author.full_name()));
    }
    for category in &book.categories {
        lines.push(format!("  category: {}", category.name));
    }
    lines.extend(book.copies.iter().flatten().map(copy_line));
    lines
}

fn member_line(member: &Member) -> String {
    let mut line = format!(
        "{:<10} {} {}",
        member.id.as_deref().unwrap_or("-"),
        member.firstname,
        member.name
    );
    if let Some(birthday) = member.birthday {
        line.push_str(&format!(", born {birthday}"));
    }
    line
}

fn category_line(category: &Category) -> String {
    let mut line = format!(
        "{:<10} {:<6} {}",
        category.id.as_deref().unwrap_or("-"),
        category.code,
        category.name
    );
    if category.adult_only {
        line.push_str(" (adult only)");
    }
    line
}

fn loan_line(loan: &Loan) -> String {
    let copy = loan
        .book_copy
        .as_ref()
        .and_then(|copy| copy.id.as_deref())
        .unwrap_or("-");
    let mut line = format!(
        "{:<10} copy {copy} lent {} ({})",
        loan.id.as_deref().unwrap_or("-"),
        loan.loan_date_time.format("%Y-%m-%d %H:%M"),
        loan.initial_state.label()
    );
    if let Some(member) = loan.member.as_ref() {
        line.push_str(&format!(" to {} {}", member.firstname, member.name));
    }
    match (loan.return_date_time, loan.return_state) {
        (Some(returned), Some(returned_state)) => line.push_str(&format!(
            ", returned {} ({})",
            returned.format("%Y-%m-%d %H:%M"),
            returned_state.label()
        )),
        (Some(returned), None) => {
            line.push_str(&format!(", returned {}", returned.format("%Y-%m-%d %H:%M")));
        }
        (None, _) => {}
    }
    line
}

fn criteria(args: &SearchArgs) -> SearchCriteria {
    let mut criteria = SearchCriteria::new()
        .available_only(args.available)
        .child_safe(args.child_safe);
    criteria.title.clone_from(&args.title);
    criteria.category.clone_from(&args.category);
    criteria.author.clone_from(&args.author);
    criteria.year.clone_from(&args.year);
    criteria.pages.clone_from(&args.pages);
    criteria
}

/// Runs one command against the stores
pub async fn execute(state: &AppState, command: Command) -> Result<(), Error> {
    let span = info_span!("cmd", name = command.name());
    async move {
        let t0 = Instant::now();
        let result = match command {
            Command::Books(books) => run_books(state, books).await,
            Command::Members(members) => run_members(state, members).await,
            Command::Categories(categories) => run_categories(state, categories).await,
            Command::Loans(loans) => run_loans(state, loans).await,
            Command::Search(args) => run_search(state, &args).await,
        };
        tracing::info!(
            elapsed_ms = t0.elapsed().as_millis(),
            ok = result.is_ok(),
            "command finished"
        );
        result
    }
    .instrument(span)
    .await
}

async fn run_books(state: &AppState, command: BooksCommand) -> Result<(), Error> {
    let books = state.registry.books();
    match command {
        BooksCommand::List => {
            books.fetch_all().await;
            recorded("books", books.last_error().await)?;
            let items = books.items().await;
            emit(state, &items, &items.iter().map(book_line).collect::<Vec<_>>())
        }
        BooksCommand::Show { id } => {
            books.fetch_one(&id).await;
            recorded("books", books.last_error().await)?;
            let book = books
                .detail()
                .await
                .ok_or_else(|| Error::Missing(format!("Book {id} was not returned")))?;
            emit(state, &book, &book_details(&book))
        }
        BooksCommand::Loans { id } => {
            let loans = books.fetch_book_loans(&id).await?;
            emit(state, &loans, &loans.iter().map(loan_line).collect::<Vec<_>>())
        }
        BooksCommand::AddCopies {
            id,
            count,
            state: initial_state,
        } => {
            let created = books.create_copies(&id, count, initial_state).await?;
            tracing::info!(book = %id, count = created.len(), "copies added");
            emit(
                state,
                &created,
                &created.iter().map(copy_line).collect::<Vec<_>>(),
            )
        }
        BooksCommand::ToLoan => {
            books.fetch_books_to_loan().await;
            recorded("books", books.last_error().await)?;
            let items = books.items().await;
            emit(state, &items, &items.iter().map(book_line).collect::<Vec<_>>())
        }
    }
}

async fn run_members(state: &AppState, command: MembersCommand) -> Result<(), Error> {
    let members = state.registry.members();
    match command {
        MembersCommand::List => {
            members.fetch_all().await;
            recorded("members", members.last_error().await)?;
            let items = members.items().await;
            emit(state, &items, &items.iter().map(member_line).collect::<Vec<_>>())
        }
        MembersCommand::Show { id } => {
            members.fetch_one(&id).await;
            recorded("members", members.last_error().await)?;
            let member = members
                .detail()
                .await
                .ok_or_else(|| Error::Missing(format!("Member {id} was not returned")))?;
            let mut lines = vec![member_line(&member)];
            lines.extend(member.loans.iter().flatten().map(loan_line));
            emit(state, &member, &lines)
        }
        MembersCommand::Delete { id } => {
            members.remove(&id).await;
            recorded("members", members.last_error().await)?;
            report(state, members.status_message().await)
        }
    }
}

async fn run_categories(state: &AppState, command: CategoriesCommand) -> Result<(), Error> {
    let categories = state.registry.categories();
    match command {
        CategoriesCommand::List => {
            categories.fetch_all().await;
            recorded("categories", categories.last_error().await)?;
            let items = categories.items().await;
            emit(
                state,
                &items,
                &items.iter().map(category_line).collect::<Vec<_>>(),
            )
        }
        CategoriesCommand::Add {
            code,
            name,
            adult_only,
        } => {
            let created = categories
                .create(&Category::new(code, name, adult_only))
                .await?;
            emit(state, &created, &[category_line(&created)])
        }
        CategoriesCommand::Delete { id } => {
            categories.remove(&id).await;
            recorded("categories", categories.last_error().await)?;
            report(state, categories.status_message().await)
        }
    }
}

async fn run_loans(state: &AppState, command: LoansCommand) -> Result<(), Error> {
    let loans = state.registry.loans();
    match command {
        LoansCommand::List { active } => {
            loans.fetch_all().await;
            recorded("loans", loans.last_error().await)?;
            let items = if active {
                loans.active_loans().await
            } else {
                loans.items().await
            };
            emit(state, &items, &items.iter().map(loan_line).collect::<Vec<_>>())
        }
        LoansCommand::New { member, copy, at } => {
            let at = at.unwrap_or_else(|| Local::now().naive_local());
            let loan = loans.create_loan(&member, &copy, at).await?;
            emit(state, &loan, &[loan_line(&loan)])
        }
        LoansCommand::Return {
            id,
            state: return_state,
        } => {
            // returns are built from the cached loan
            loans.fetch_all().await;
            recorded("loans", loans.last_error().await)?;
            let loan = loans.return_loan(&id, return_state).await?;
            emit(state, &loan, &[loan_line(&loan)])
        }
    }
}

async fn run_search(state: &AppState, args: &SearchArgs) -> Result<(), Error> {
    let criteria = criteria(args);
    let search = state.registry.search();

    if args.cached {
        let books = state.registry.books();
        books.fetch_all().await;
        recorded("books", books.last_error().await)?;
        let found = search.search_cached(&criteria).await;
        return emit(state, &found, &found.iter().map(book_line).collect::<Vec<_>>());
    }

    let found = search.search(&criteria).await;
    recorded("search", search.last_error().await)?;
    if args.copies {
        let copies = search.available_copies(&criteria).await?;
        return emit(
            state,
            &copies,
            &copies.iter().map(copy_line).collect::<Vec<_>>(),
        );
    }
    emit(state, &found, &found.iter().map(book_line).collect::<Vec<_>>())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use biblio_core::model::types::CopyState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn book_line_counts_borrowable_copies() {
        let book: Book = serde_json::from_value(json!({
            "id": "b1",
            "isbn": "9782070409228",
            "title": "Germinal",
            "publicationYear": 1885,
            "copies": [
                { "id": "x1", "state": "Bon", "available": true, "removed": false },
                { "id": "x2", "state": "Usé", "available": false, "removed": false }
            ]
        }))
        .unwrap();

        assert_eq!(
            book_line(&book),
            "b1         9782070409228  Germinal (1885) [1/2 borrowable]"
        );
    }

    #[test]
    fn copy_line_shows_whereabouts() {
        let copy: BookCopy = serde_json::from_value(
            json!({ "id": "x2", "state": "VERY_GOOD", "available": false, "removed": false }),
        )
        .unwrap();
        assert_eq!(copy_line(&copy), "  copy x2         Très bon  lent out");
        assert_eq!(copy.state, CopyState::VeryGood);
    }

    #[test]
    fn loan_line_mentions_the_return() {
        let loan: Loan = serde_json::from_value(json!({
            "id": "l1",
            "bookCopy": { "id": "x1", "state": "Bon", "available": true, "removed": false },
            "loanDateTime": "2024-03-01T10:00:00",
            "returnDateTime": "2024-03-08T09:30:00",
            "initialState": "Bon",
            "returnState": "Usé"
        }))
        .unwrap();

        assert_eq!(
            loan_line(&loan),
            "l1         copy x1 lent 2024-03-01 10:00 (Bon), returned 2024-03-08 09:30 (Usé)"
        );
    }

    #[test]
    fn search_flags_become_criteria() {
        let args = SearchArgs {
            title: Some("potter".to_owned()),
            year: Some("199".to_owned()),
            child_safe: true,
            ..SearchArgs::default()
        };
        let criteria = criteria(&args);

        assert_eq!(criteria.title.as_deref(), Some("potter"));
        assert_eq!(criteria.year.as_deref(), Some("199"));
        assert_eq!(criteria.author, None);
        assert!(criteria.child_safe);
        assert!(!criteria.available_only);
    }
}
