use crate::model::types::{Book, BookCopy};

/// Book search filter. Every criterion that is set must hold; unset or blank text criteria
/// impose no constraint.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Matched against the title or the ISBN
    pub title: Option<String>,
    /// Matched against the name of any category
    pub category: Option<String>,
    /// Matched against the full name ("First Last") of any author
    pub author: Option<String>,
    /// Matched against the publication year as text
    pub year: Option<String>,
    /// Matched against the page count as text
    pub pages: Option<String>,
    /// Only books with at least one borrowable copy
    pub available_only: bool,
    /// Only books without an adult-only category
    pub child_safe: bool,
}

/// Lowercased needle of a text criterion, `None` when it imposes no constraint
fn needle(criterion: Option<&String>) -> Option<String> {
    criterion
        .map(|text| text.trim().to_lowercase())
        .filter(|text| !text.is_empty())
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl SearchCriteria {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    #[inline]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    #[inline]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    #[must_use]
    #[inline]
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    #[must_use]
    #[inline]
    pub fn with_pages(mut self, pages: impl Into<String>) -> Self {
        self.pages = Some(pages.into());
        self
    }

    #[must_use]
    #[inline]
    pub const fn available_only(mut self, available_only: bool) -> Self {
        self.available_only = available_only;
        self
    }

    #[must_use]
    #[inline]
    pub const fn child_safe(mut self, child_safe: bool) -> Self {
        self.child_safe = child_safe;
        self
    }

    /// True when no criterion constrains the result
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.available_only
            && !self.child_safe
            && [
                &self.title,
                &self.category,
                &self.author,
                &self.year,
                &self.pages,
            ]
            .into_iter()
            .all(|criterion| needle(criterion.as_ref()).is_none())
    }

    /// Query parameters for the server side filters that mean exactly the same as the local
    /// ones
    #[must_use]
    #[inline]
    pub fn server_filters(&self) -> Vec<(&'static str, &'static str)> {
        let mut filters = Vec::new();
        if self.available_only {
            filters.push(("available", "true"));
        }
        if self.child_safe {
            filters.push(("child", "true"));
        }
        filters
    }

    /// Whether `book` satisfies every criterion.
    ///
    /// Availability can only be judged on books whose copies are loaded; a listing record
    /// without copies is given the benefit of the doubt.
    #[must_use]
    #[inline]
    pub fn matches(&self, book: &Book) -> bool {
        let title = needle(self.title.as_ref())
            .is_none_or(|title| contains(&book.title, &title) || contains(&book.isbn, &title));
        let category = needle(self.category.as_ref()).is_none_or(|category| {
            book.categories
                .iter()
                .any(|candidate| contains(&candidate.name, &category))
        });
        let author = needle(self.author.as_ref()).is_none_or(|author| {
            book.authors
                .iter()
                .any(|candidate| contains(&candidate.full_name(), &author))
        });
        let year = needle(self.year.as_ref()).is_none_or(|year| {
            book.publication_year
                .is_some_and(|published| published.to_string().contains(&year))
        });
        let pages = needle(self.pages.as_ref()).is_none_or(|pages| {
            book.num_of_pages
                .is_some_and(|count| count.to_string().contains(&pages))
        });
        let available = !self.available_only
            || book.copies.is_none()
            || !book.borrowable_copies().is_empty();
        let child_safe = !self.child_safe || !book.is_adult_only();

        title && category && author && year && pages && available && child_safe
    }

    /// Books satisfying every criterion, in input order. With `available_only`, loaded copies
    /// are narrowed to the borrowable ones.
    #[must_use]
    #[inline]
    pub fn filter_books(&self, books: Vec<Book>) -> Vec<Book> {
        if self.is_empty() {
            return books;
        }
        books
            .into_iter()
            .filter(|book| self.matches(book))
            .map(|mut book| {
                if self.available_only {
                    if let Some(copies) = book.copies.as_mut() {
                        copies.retain(BookCopy::is_borrowable);
                    }
                }
                book
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::model::types::{Author, Category, CopyState};
    use pretty_assertions::assert_eq;

    fn book(title: &str, year: i32, pages: u32) -> Book {
        Book {
            publication_year: Some(year),
            num_of_pages: Some(pages),
            ..Book::new(format!("978{pages}"), title.to_owned())
        }
    }

    fn shelf() -> Vec<Book> {
        let mut potter = book("Harry Potter à l'école des sorciers", 1998, 320);
        potter.authors = vec![Author::new("J. K.".to_owned(), "Rowling".to_owned())];
        potter.categories = vec![Category::new("FAN".to_owned(), "Fantasy".to_owned(), false)];
        potter.copies = Some(vec![
            BookCopy::new(CopyState::Good, true, false),
            BookCopy::new(CopyState::Bad, true, true),
        ]);

        let mut miserables = book("Les Misérables", 1862, 1488);
        miserables.authors = vec![Author::new("Victor".to_owned(), "Hugo".to_owned())];
        miserables.copies = Some(vec![BookCopy::new(CopyState::Used, false, false)]);

        let mut emmanuelle = book("Emmanuelle", 1959, 256);
        emmanuelle.categories = vec![Category::new("ADU".to_owned(), "Adultes".to_owned(), true)];

        vec![potter, miserables, emmanuelle]
    }

    fn titles(books: &[Book]) -> Vec<&str> {
        books.iter().map(|found| found.title.as_str()).collect()
    }

    #[test]
    fn title_matches_case_insensitively() {
        let found = SearchCriteria::new().with_title("harry").filter_books(shelf());
        assert_eq!(titles(&found), ["Harry Potter à l'école des sorciers"]);
    }

    #[test]
    fn title_criterion_also_matches_isbn() {
        let found = SearchCriteria::new().with_title("9781488").filter_books(shelf());
        assert_eq!(titles(&found), ["Les Misérables"]);
    }

    #[test]
    fn empty_criteria_return_the_input() {
        let criteria = SearchCriteria::new().with_title("  ").with_author("");
        assert!(criteria.is_empty());
        assert_eq!(criteria.filter_books(shelf()), shelf());
    }

    #[test]
    fn criteria_are_combined() {
        let criteria = SearchCriteria::new().with_author("hugo").with_year("18");
        assert_eq!(titles(&criteria.filter_books(shelf())), ["Les Misérables"]);

        let criteria = SearchCriteria::new().with_author("hugo").with_year("19");
        assert!(criteria.filter_books(shelf()).is_empty());
    }

    #[test]
    fn category_and_pages_are_substrings() {
        let found = SearchCriteria::new().with_category("fanta").filter_books(shelf());
        assert_eq!(titles(&found), ["Harry Potter à l'école des sorciers"]);

        let found = SearchCriteria::new().with_pages("25").filter_books(shelf());
        assert_eq!(titles(&found), ["Emmanuelle"]);
    }

    #[test]
    fn availability_narrows_copies() {
        let criteria = SearchCriteria::new().available_only(true);
        let found = criteria.filter_books(shelf());

        // Emmanuelle has no copies loaded and is kept
        assert_eq!(
            titles(&found),
            ["Harry Potter à l'école des sorciers", "Emmanuelle"]
        );
        assert_eq!(found[0].copies.as_ref().map(Vec::len), Some(1));
        assert_eq!(criteria.server_filters(), [("available", "true")]);
    }

    #[test]
    fn child_safe_drops_adult_books() {
        let criteria = SearchCriteria::new().child_safe(true);
        assert_eq!(
            titles(&criteria.filter_books(shelf())),
            ["Harry Potter à l'école des sorciers", "Les Misérables"]
        );
        assert_eq!(criteria.server_filters(), [("child", "true")]);
    }
}
