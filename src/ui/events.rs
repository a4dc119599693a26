//! Background task event processing.

use crate::app::{App, AppEvent, Mutation};
use feedpane::controller::LoadOutcome;
use tokio::sync::mpsc;

use super::helpers::{spawn_count_refresh, spawn_directory_load, spawn_page_load};

pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    match event {
        AppEvent::PageLoaded { request, result } => {
            let first_page = request.page == 1;
            match app.controller.apply_page(&request, result) {
                LoadOutcome::Applied { .. } if first_page => app.reset_article_position(),
                LoadOutcome::Applied { .. } | LoadOutcome::Failed | LoadOutcome::Stale => {}
            }
            app.clamp_selections();
        }
        AppEvent::DirectoryLoaded(Ok((feeds, groups))) => {
            app.controller.set_directory(feeds, groups);
            app.clamp_selections();
            spawn_count_refresh(app, event_tx);
        }
        AppEvent::DirectoryLoaded(Err(e)) => {
            tracing::error!(error = %e, "Failed to load feeds");
            app.set_status(format!("Failed to load feeds: {}", e));
        }
        AppEvent::CountsRefreshed(snapshot) => {
            app.controller.apply_counts(snapshot);
        }
        AppEvent::MutationApplied { mutation, affected } => {
            handle_mutation_applied(app, mutation, affected, event_tx);
        }
        AppEvent::MutationFailed { mutation, error } => {
            handle_mutation_failed(app, mutation, &error, event_tx);
        }
        AppEvent::FeedUpdated { feed_ids } => {
            tracing::debug!(?feed_ids, "Reloading after feed update");
            spawn_directory_load(app, event_tx);
            let request = app.controller.reload();
            spawn_page_load(app, request, event_tx);
        }
        AppEvent::TaskPanicked { task, error } => {
            app.set_status(format!("Internal error in {}: {}", task, error));
        }
    }
}

fn handle_mutation_applied(
    app: &mut App,
    mutation: Mutation,
    affected: u64,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    spawn_count_refresh(app, event_tx);
    match mutation {
        Mutation::MarkAllRead { .. } => {
            app.set_status(format!("Marked {} articles as read", affected));
        }
        Mutation::DeleteAll { .. } => {
            app.set_status(format!("Deleted {} articles", affected));
        }
        Mutation::MarkRead { .. } | Mutation::Favorite { .. } | Mutation::Delete { .. } => {}
    }
    if mutation.reloads() {
        let request = app.controller.reload();
        spawn_page_load(app, request, event_tx);
    }
}

/// Put the list back the way the store has it.
fn handle_mutation_failed(
    app: &mut App,
    mutation: Mutation,
    error: &str,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    app.set_status(format!("Failed to {}: {}", mutation.describe(), error));
    match mutation {
        Mutation::MarkRead {
            article_id,
            is_read,
        } => {
            app.controller.set_read(article_id, !is_read);
        }
        Mutation::Favorite {
            article_id,
            is_favorite,
        } => {
            app.controller.set_favorite(article_id, !is_favorite);
        }
        // Removed rows or bulk flag changes cannot be undone locally
        Mutation::Delete { .. } | Mutation::DeleteAll { .. } | Mutation::MarkAllRead { .. } => {
            let request = app.controller.reload();
            spawn_page_load(app, request, event_tx);
        }
    }
}
