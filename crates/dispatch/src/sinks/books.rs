// crates/dispatch/src/sinks/books.rs
//! Live view of the book collection

use super::NotificationSink;
use crate::cell::StateCell;
use crate::error::{DispatchError, DispatchResult};
use bookwire_core::{Book, BookId, Notification};
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Result of applying a metadata update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The stored book was replaced
    Applied,
    /// The book is not in the collection; the update was dropped
    UnknownBook,
}

/// In-memory book collection kept current by notifications
///
/// Seeded from the initial library load, then patched by book-add,
/// books-remove and the two metadata update topics. Every change is keyed
/// by book id, so replays and cross-topic reordering converge.
#[derive(Debug, Default)]
pub struct BookCollection {
    books: StateCell<BTreeMap<BookId, Book>>,
}

impl BookCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection
    pub fn seed(&self, books: impl IntoIterator<Item = Book>) {
        let map = books.into_iter().map(|book| (book.id, book)).collect();
        self.books.replace(map);
    }

    /// Inserts or replaces a book
    pub fn handle_new_book(&self, book: Book) {
        log::debug!("Book {} added", book.id);
        self.books.modify_if(|books| {
            books.insert(book.id, book);
            true
        });
    }

    /// Removes books by id; unknown ids are ignored
    ///
    /// Returns how many books were removed.
    pub fn handle_removed_books(&self, ids: &[BookId]) -> usize {
        let mut removed = 0;
        self.books.modify_if(|books| {
            removed = ids.iter().filter(|id| books.remove(id).is_some()).count();
            removed > 0
        });
        removed
    }

    /// Replaces a known book with its updated version
    pub fn handle_book_update(&self, book: Book) -> UpdateOutcome {
        let id = book.id;
        let applied = self.books.modify_if(|books| match books.get_mut(&id) {
            Some(existing) => {
                *existing = book;
                true
            }
            None => false,
        });

        if applied {
            UpdateOutcome::Applied
        } else {
            log::debug!("Dropping metadata update for unknown book {}", id);
            UpdateOutcome::UnknownBook
        }
    }

    /// Applies a batch of updates in one change
    ///
    /// Returns how many books were updated.
    pub fn handle_batch_update(&self, updated: Vec<Book>) -> usize {
        let total = updated.len();
        let mut applied = 0;
        self.books.modify_if(|books| {
            for book in updated {
                if let Some(existing) = books.get_mut(&book.id) {
                    *existing = book;
                    applied += 1;
                }
            }
            applied > 0
        });

        if applied < total {
            log::debug!(
                "Batch update skipped {} unknown book(s)",
                total - applied
            );
        }
        applied
    }

    pub fn get(&self, id: BookId) -> Option<Book> {
        self.books.read(|books| books.get(&id).cloned())
    }

    pub fn contains(&self, id: BookId) -> bool {
        self.books.read(|books| books.contains_key(&id))
    }

    pub fn len(&self) -> usize {
        self.books.read(BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current books, ordered by id
    pub fn snapshot(&self) -> Vec<Book> {
        self.books.read(|books| books.values().cloned().collect())
    }

    /// Observes the collection
    pub fn observe(&self) -> watch::Receiver<BTreeMap<BookId, Book>> {
        self.books.observe()
    }
}

impl NotificationSink for BookCollection {
    fn update(&self, notification: Notification) -> DispatchResult<()> {
        match notification {
            Notification::BookAdded(book) => self.handle_new_book(book),
            Notification::BooksRemoved(ids) => {
                self.handle_removed_books(&ids);
            }
            Notification::BookMetadataUpdated(book) => {
                let id = book.id;
                if self.handle_book_update(book) == UpdateOutcome::UnknownBook {
                    return Err(DispatchError::UnknownBook(id));
                }
            }
            Notification::BookMetadataBatchUpdated(books) => {
                self.handle_batch_update(books);
            }
            other => {
                return Err(DispatchError::WrongNotification {
                    sink: self.name(),
                    topic: other.topic(),
                })
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "BookCollection"
    }
}
