use crate::model::Resource;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Physical condition of a copy. The server spells it `GOOD`, `USED`...; staff read and type
/// the French labels of [`CopyState::label`].
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyState {
    #[default]
    #[serde(rename = "NEW", alias = "Neuf")]
    New,
    #[serde(rename = "VERY_GOOD", alias = "Très bon")]
    VeryGood,
    #[serde(rename = "GOOD", alias = "Bon")]
    Good,
    #[serde(rename = "USED", alias = "Usé")]
    Used,
    #[serde(rename = "BAD", alias = "Mauvais")]
    Bad,
}

impl CopyState {
    /// Every state, best first
    pub const ALL: [Self; 5] = [Self::New, Self::VeryGood, Self::Good, Self::Used, Self::Bad];

    /// The label shown to (and typed by) library staff
    #[must_use]
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "Neuf",
            Self::VeryGood => "Très bon",
            Self::Good => "Bon",
            Self::Used => "Usé",
            Self::Bad => "Mauvais",
        }
    }

    /// Parses a staff label, ignoring case and surrounding whitespace
    #[must_use]
    #[inline]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.label().to_lowercase() == label)
    }
}

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    #[must_use]
    #[inline]
    pub const fn new(first_name: String, last_name: String) -> Self {
        Self {
            first_name,
            last_name,
        }
    }

    /// "First Last", or whichever half is known
    #[must_use]
    #[inline]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_owned()
    }
}

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub adult_only: bool,
}

impl Category {
    #[must_use]
    #[inline]
    pub const fn new(code: String, name: String, adult_only: bool) -> Self {
        Self {
            id: None,
            code,
            name,
            adult_only,
        }
    }
}

/// One physical exemplar of a book
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookCopy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub state: CopyState,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub removed: bool,
}

impl BookCopy {
    #[must_use]
    #[inline]
    pub const fn new(state: CopyState, available: bool, removed: bool) -> Self {
        Self {
            id: None,
            state,
            available,
            removed,
        }
    }

    /// A copy can be lent out only when it is on the shelf and not withdrawn
    #[must_use]
    #[inline]
    pub const fn is_borrowable(&self) -> bool {
        self.available && !self.removed
    }
}

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub num_of_pages: Option<u32>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub categories: Vec<Category>,
    /// `None` when the server view leaves copies out (collection listings), which is not the
    /// same thing as a book without copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<Vec<BookCopy>>,
}

impl Book {
    #[must_use]
    #[inline]
    pub fn new(isbn: String, title: String) -> Self {
        Self {
            isbn,
            title,
            ..Self::default()
        }
    }

    #[must_use]
    #[inline]
    pub fn is_adult_only(&self) -> bool {
        self.categories.iter().any(|category| category.adult_only)
    }

    /// Borrowable copies of this book; empty when copies were not loaded
    #[must_use]
    #[inline]
    pub fn borrowable_copies(&self) -> Vec<&BookCopy> {
        self.copies
            .iter()
            .flatten()
            .filter(|copy| copy.is_borrowable())
            .collect()
    }
}

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loans: Option<Vec<Loan>>,
}

impl Member {
    #[must_use]
    #[inline]
    pub const fn new(name: String, firstname: String, birthday: Option<NaiveDate>) -> Self {
        Self {
            id: None,
            name,
            firstname,
            birthday,
            loans: None,
        }
    }
}

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_copy: Option<BookCopy>,
    pub loan_date_time: NaiveDateTime,
    #[serde(default)]
    pub return_date_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub initial_state: CopyState,
    #[serde(default)]
    pub return_state: Option<CopyState>,
}

impl Loan {
    /// A loan is active until the copy comes back
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        self.return_date_time.is_none()
    }
}

/// Body of `POST /loans`: the server resolves both ids itself
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoanCreationOrder {
    pub member_id: String,
    pub book_copy_id: String,
    pub loan_date_time: NaiveDateTime,
}

impl LoanCreationOrder {
    #[must_use]
    #[inline]
    pub const fn new(
        member_id: String,
        book_copy_id: String,
        loan_date_time: NaiveDateTime,
    ) -> Self {
        Self {
            member_id,
            book_copy_id,
            loan_date_time,
        }
    }
}

/// Body of `POST /books/{id}/copies`
#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CopiesCreationOrder {
    pub num_copies: u32,
    pub initial_state: CopyState,
}

impl CopiesCreationOrder {
    #[must_use]
    #[inline]
    pub const fn new(num_copies: u32, initial_state: CopyState) -> Self {
        Self {
            num_copies,
            initial_state,
        }
    }
}

impl Resource for Category {
    const COLLECTION: &'static str = "categories";
    const LABEL: &'static str = "Category";

    #[inline]
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_owned());
    }
}

impl Resource for Book {
    const COLLECTION: &'static str = "books";
    const LABEL: &'static str = "Book";

    #[inline]
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_owned());
    }
}

impl Resource for Member {
    const COLLECTION: &'static str = "members";
    const LABEL: &'static str = "Member";

    #[inline]
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_owned());
    }
}

impl Resource for Loan {
    const COLLECTION: &'static str = "loans";
    const LABEL: &'static str = "Loan";

    #[inline]
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_owned());
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn book_listing_without_copies() {
        let book: Book = serde_json::from_value(json!({
            "id": "b1",
            "isbn": "9782070643028",
            "title": "Harry Potter à l'école des sorciers",
            "editor": "Gallimard",
            "numOfPages": 320,
            "publicationYear": 1998,
            "authors": [{ "firstName": "J. K.", "lastName": "Rowling" }],
            "categories": [{ "id": "c1", "code": "FAN", "name": "Fantasy", "adultOnly": false }]
        }))
        .unwrap();

        assert_eq!(book.copies, None);
        assert_eq!(book.num_of_pages, Some(320));
        assert_eq!(book.authors[0].full_name(), "J. K. Rowling");
        assert!(!book.is_adult_only());
        assert!(book.borrowable_copies().is_empty());
    }

    #[test]
    fn copy_states_accept_both_spellings() {
        let copies: Vec<BookCopy> = serde_json::from_value(json!([
            { "id": "x1", "state": "Très bon", "available": true, "removed": false },
            { "id": "x2", "state": "USED", "available": true, "removed": true }
        ]))
        .unwrap();

        assert_eq!(copies[0].state, CopyState::VeryGood);
        assert_eq!(copies[1].state, CopyState::Used);
        assert!(copies[0].is_borrowable());
        assert!(!copies[1].is_borrowable());

        // Outgoing payloads always use the server spelling
        assert_eq!(
            serde_json::to_value(&copies[0]).unwrap()["state"],
            json!("VERY_GOOD")
        );
        assert_eq!(
            serde_json::to_value(&copies[1]).unwrap()["state"],
            json!("USED")
        );
    }

    #[test]
    fn server_states_are_sent_back_unchanged() {
        let copy: BookCopy = serde_json::from_value(json!(
            { "id": "x1", "state": "GOOD", "available": true, "removed": false }
        ))
        .unwrap();

        assert_eq!(copy.state, CopyState::Good);
        assert_eq!(copy.state.label(), "Bon");
        assert_eq!(
            serde_json::to_value(&copy).unwrap(),
            json!({ "id": "x1", "state": "GOOD", "available": true, "removed": false })
        );
        assert_eq!(
            serde_json::to_value(CopiesCreationOrder::new(1, copy.state)).unwrap(),
            json!({ "numCopies": 1, "initialState": "GOOD" })
        );
    }

    #[test]
    fn state_labels_parse_case_insensitively() {
        assert_eq!(CopyState::from_label(" très BON "), Some(CopyState::VeryGood));
        assert_eq!(CopyState::from_label("mauvais"), Some(CopyState::Bad));
        assert_eq!(CopyState::from_label("excellent"), None);
    }

    #[test]
    fn new_records_serialize_without_id() {
        let category = Category::new("ADU".to_owned(), "Adultes".to_owned(), true);
        assert_eq!(
            serde_json::to_value(&category).unwrap(),
            json!({ "code": "ADU", "name": "Adultes", "adultOnly": true })
        );
    }

    #[test]
    fn loan_activity_follows_return_time() {
        let mut loan: Loan = serde_json::from_value(json!({
            "id": "l1",
            "bookCopy": { "id": "x1", "state": "Bon", "available": false, "removed": false },
            "loanDateTime": "2023-03-01T10:15:00",
            "initialState": "Bon"
        }))
        .unwrap();
        assert!(loan.is_active());

        loan.return_date_time = Some("2023-03-15T09:00:00.123".parse().unwrap());
        assert!(!loan.is_active());
    }
}
