//! Listing filters and pagination.

use serde::{Deserialize, Serialize};
use tavern_protocol::{Message, MessageRole, ProtocolError, Session, SessionStatus};

/// A 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Checks the window against `max_per_page`.
    pub fn validate(&self, max_per_page: usize) -> Result<(), ProtocolError> {
        ProtocolError::check_range("page", self.page as i64, 1, i64::MAX)?;
        ProtocolError::check_range("per_page", self.per_page as i64, 1, max_per_page as i64)
    }

    /// Cuts the window out of `items`, which are already in display order.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let offset = self.page.saturating_sub(1).saturating_mul(self.per_page);
        let items = items.into_iter().skip(offset).take(self.per_page).collect();
        Page {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching items across all pages.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Returns `true` if a later page has items.
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.per_page) < self.total
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

// ---------------------------------------------------------------------------
// MessageFilter
// ---------------------------------------------------------------------------

/// Which messages of a session to list. Results are in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFilter {
    pub role: Option<MessageRole>,
    /// Case-insensitive substring of the content.
    pub search: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            role: None,
            search: None,
            page: 1,
            per_page: 50,
        }
    }
}

impl MessageFilter {
    pub fn role(mut self, role: MessageRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn window(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }

    /// Filters and paginates `messages`, which are in creation order.
    pub fn apply<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) -> Page<Message> {
        let term = search_term(&self.search);
        let matching: Vec<Message> = messages
            .into_iter()
            .filter(|m| self.role.is_none_or(|role| m.role == role))
            .filter(|m| term.as_deref().is_none_or(|t| contains_ignore_case(&m.content, t)))
            .cloned()
            .collect();
        self.window().slice(matching)
    }
}

// ---------------------------------------------------------------------------
// SessionFilter
// ---------------------------------------------------------------------------

/// Which accessible sessions to list. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            page: 1,
            per_page: 10,
        }
    }
}

impl SessionFilter {
    pub fn status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn window(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }

    /// Filters, orders (newest first) and paginates `sessions`.
    pub fn apply(&self, sessions: Vec<Session>) -> Page<Session> {
        let term = search_term(&self.search);
        let mut matching: Vec<Session> = sessions
            .into_iter()
            .filter(|s| self.status.is_none_or(|status| s.status == status))
            .filter(|s| {
                term.as_deref().is_none_or(|t| {
                    contains_ignore_case(&s.title, t)
                        || s.description
                            .as_deref()
                            .is_some_and(|d| contains_ignore_case(d, t))
                })
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.window().slice(matching)
    }
}
