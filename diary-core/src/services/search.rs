//! Search-as-you-type
//!
//! Each keystroke restarts a short timer; only the query standing when the
//! timer fires is sent to the full-text index. Filters narrow the matches
//! by mood and creation time and re-run the search at once.

use crate::config::SEARCH_DEBOUNCE;
use crate::database::{DiaryEntry, Mood, Repository};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Narrowing applied to full-text matches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    /// Empty means any mood
    pub moods: HashSet<Mood>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.moods.is_empty() && self.from.is_none() && self.to.is_none()
    }

    /// Date bounds are inclusive
    pub fn matches(&self, entry: &DiaryEntry) -> bool {
        if !self.moods.is_empty() && !self.moods.contains(&entry.mood) {
            return false;
        }
        if self.from.is_some_and(|from| entry.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.created_at > to) {
            return false;
        }
        true
    }
}

/// What the search screen renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<DiaryEntry>,
    pub is_searching: bool,
    pub error: Option<String>,
}

struct Pending {
    query: String,
    filters: SearchFilters,
    task: Option<JoinHandle<()>>,
}

/// Debounced, cancellable search over diary entries
pub struct SearchController {
    repo: Repository,
    delay: Duration,
    state: Arc<watch::Sender<SearchState>>,
    pending: Mutex<Pending>,
}

impl SearchController {
    pub fn new(repo: Repository) -> Self {
        Self::with_delay(repo, SEARCH_DEBOUNCE)
    }

    pub fn with_delay(repo: Repository, delay: Duration) -> Self {
        let (tx, _) = watch::channel(SearchState::default());
        Self {
            repo,
            delay,
            state: Arc::new(tx),
            pending: Mutex::new(Pending {
                query: String::new(),
                filters: SearchFilters::default(),
                task: None,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Replace the query and restart the debounce timer
    pub async fn update_query(&self, text: impl Into<String>) {
        let mut pending = self.pending.lock().await;
        pending.query = text.into();
        self.restart(&mut pending, self.delay);
    }

    /// Replace the filters and search again without waiting
    pub async fn set_filters(&self, filters: SearchFilters) {
        let mut pending = self.pending.lock().await;
        pending.filters = filters;
        self.restart(&mut pending, Duration::ZERO);
    }

    pub async fn filters(&self) -> SearchFilters {
        self.pending.lock().await.filters.clone()
    }

    /// Drop the timer or in-flight search, if any
    fn cancel(pending: &mut Pending) {
        if let Some(task) = pending.task.take() {
            task.abort();
        }
    }

    fn restart(&self, pending: &mut Pending, delay: Duration) {
        Self::cancel(pending);

        let repo = self.repo.clone();
        let state = Arc::clone(&self.state);
        let query = pending.query.clone();
        let filters = pending.filters.clone();

        pending.task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            run_search(&repo, &state, query, &filters).await;
        }));
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        Self::cancel(self.pending.get_mut());
    }
}

async fn run_search(
    repo: &Repository,
    state: &watch::Sender<SearchState>,
    query: String,
    filters: &SearchFilters,
) {
    if query.trim().is_empty() {
        state.send_replace(SearchState {
            query,
            ..SearchState::default()
        });
        return;
    }

    state.send_modify(|s| {
        s.query = query.clone();
        s.is_searching = true;
        s.error = None;
    });

    tracing::debug!("Searching diaries: {}", query);
    let next = match repo.search_diaries(&query).await {
        Ok(entries) => SearchState {
            query,
            results: entries.into_iter().filter(|e| filters.matches(e)).collect(),
            is_searching: false,
            error: None,
        },
        Err(e) => {
            tracing::warn!("Search failed for {:?}: {}", query, e);
            SearchState {
                query,
                results: Vec::new(),
                is_searching: false,
                error: Some(e.to_string()),
            }
        }
    };

    state.send_replace(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::{at, create_test_repo, insert};
    use crate::database::DiaryFields;

    const DELAY: Duration = Duration::from_millis(40);

    /// Wait until a settled state for `query` is published
    async fn settled(rx: &mut watch::Receiver<SearchState>, query: &str) -> SearchState {
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.query == query && !s.is_searching),
        )
        .await
        .unwrap()
        .unwrap();
        state.clone()
    }

    #[tokio::test]
    async fn test_only_last_query_of_burst_runs() {
        let repo = create_test_repo().await;
        insert(&repo, "Beach", "sand and sun", at(2024, 6, 1, 9)).await;
        let controller = SearchController::with_delay(repo, DELAY);

        let mut rx = controller.subscribe();
        let mut seen = Vec::new();
        controller.update_query("b").await;
        controller.update_query("be").await;
        controller.update_query("beach").await;

        let state = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                let state = rx.borrow_and_update().clone();
                seen.push(state.query.clone());
                if !state.is_searching && !state.query.is_empty() {
                    return state;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(state.query, "beach");
        assert_eq!(state.results.len(), 1);
        assert!(seen.iter().all(|q| q == "beach"), "published: {:?}", seen);
    }

    #[tokio::test]
    async fn test_blank_query_clears_results() {
        let repo = create_test_repo().await;
        insert(&repo, "Beach", "", at(2024, 6, 1, 9)).await;
        let controller = SearchController::with_delay(repo, DELAY);
        let mut rx = controller.subscribe();

        controller.update_query("beach").await;
        assert_eq!(settled(&mut rx, "beach").await.results.len(), 1);

        controller.update_query("   ").await;
        let state = settled(&mut rx, "   ").await;
        assert!(state.results.is_empty());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_filters_narrow_results() {
        let repo = create_test_repo().await;
        let happy = repo
            .insert_diary(&DiaryFields::new("Walk", "park walk", Mood::Happy), at(2024, 6, 1, 9))
            .await
            .unwrap();
        repo.insert_diary(&DiaryFields::new("Walk", "rainy walk", Mood::Sad), at(2024, 6, 2, 9))
            .await
            .unwrap();
        let late = repo
            .insert_diary(&DiaryFields::new("Walk", "night walk", Mood::Happy), at(2024, 7, 1, 9))
            .await
            .unwrap();

        let controller = SearchController::with_delay(repo, DELAY);
        let mut rx = controller.subscribe();

        controller.update_query("walk").await;
        assert_eq!(settled(&mut rx, "walk").await.results.len(), 3);

        controller
            .set_filters(SearchFilters {
                moods: HashSet::from([Mood::Happy]),
                ..SearchFilters::default()
            })
            .await;
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| !s.is_searching && s.results.len() == 2),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        let ids: Vec<i64> = state.results.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![late.id, happy.id]);

        controller
            .set_filters(SearchFilters {
                moods: HashSet::from([Mood::Happy]),
                from: Some(at(2024, 6, 1, 9)),
                to: Some(at(2024, 6, 30, 0)),
            })
            .await;
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| !s.is_searching && s.results.len() == 1),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.results[0].id, happy.id);
        assert!(!controller.filters().await.is_empty());
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let entry = DiaryEntry {
            id: 1,
            title: String::new(),
            content: String::new(),
            mood: Mood::Tired,
            weather: None,
            location: None,
            created_at: at(2024, 6, 1, 9),
            updated_at: at(2024, 6, 1, 9),
            is_favorite: false,
            is_deleted: false,
        };

        let exact = SearchFilters {
            from: Some(at(2024, 6, 1, 9)),
            to: Some(at(2024, 6, 1, 9)),
            ..SearchFilters::default()
        };
        assert!(exact.matches(&entry));
        assert!(SearchFilters::default().matches(&entry));

        let other_mood = SearchFilters {
            moods: HashSet::from([Mood::Happy]),
            ..SearchFilters::default()
        };
        assert!(!other_mood.matches(&entry));
    }
}
