//! Archive screen: collection summary and recent ingest runs.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::warn;

use tweetrag_shared::{CollectionInfo, IngestRun, Result};
use tweetrag_storage::Storage;

use crate::app::AppContext;
use crate::widgets::titled_block;

/// Ingest runs listed on the screen.
const RECENT_RUNS: usize = 10;

/// Collection state read from the database.
#[derive(Debug, Clone, Default)]
struct ArchiveSnapshot {
    collection: String,
    info: Option<CollectionInfo>,
    runs: Vec<IngestRun>,
}

type SnapshotResult = std::result::Result<ArchiveSnapshot, String>;

pub(crate) struct ArchiveScreen {
    snapshot: Option<ArchiveSnapshot>,
    error: Option<String>,
    pending: Option<mpsc::Receiver<SnapshotResult>>,
}

impl ArchiveScreen {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: None,
            error: None,
            pending: None,
        }
    }

    pub(crate) fn status(&self) -> Option<String> {
        if self.pending.is_some() {
            return Some("Loading collection...".into());
        }
        self.error.as_ref().map(|e| format!("Error: {e}"))
    }

    /// Reload the snapshot on a background task.
    pub(crate) fn refresh(&mut self, ctx: &AppContext) {
        if self.pending.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel(1);
        let task_ctx = ctx.clone();
        ctx.runtime.spawn(async move {
            let result = load_snapshot(&task_ctx).await.map_err(|e| e.to_string());
            if let Err(e) = &result {
                warn!(error = %e, "failed to load collection");
            }
            let _ = tx.send(result).await;
        });
        self.pending = Some(rx);
    }

    pub(crate) fn tick(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(snapshot)) => {
                self.pending = None;
                self.snapshot = Some(snapshot);
                self.error = None;
            }
            Ok(Err(e)) => {
                self.pending = None;
                self.error = Some(e);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.error = Some("load task ended unexpectedly".into());
            }
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers, ctx: &AppContext) {
        if let KeyCode::Char('r') = code {
            self.refresh(ctx);
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(3)])
            .split(area);

        let info_lines = match &self.snapshot {
            Some(snapshot) => collection_lines(snapshot),
            None => vec![Line::from("Loading...")],
        };
        let info = Paragraph::new(info_lines).block(titled_block("Collection (r to refresh)", false));
        f.render_widget(info, chunks[0]);

        let runs: Vec<ListItem> = self
            .snapshot
            .iter()
            .flat_map(|s| s.runs.iter())
            .map(|run| ListItem::new(run_line(run)))
            .collect();
        let list = List::new(runs).block(titled_block("Recent ingest runs", false));
        f.render_widget(list, chunks[1]);
    }
}

fn collection_lines(snapshot: &ArchiveSnapshot) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::Cyan);
    let Some(info) = &snapshot.info else {
        return vec![
            Line::from(format!("Collection '{}' does not exist yet.", snapshot.collection)),
            Line::from("Run `tweetrag ingest` to build it."),
        ];
    };

    let dimension = info
        .dimension
        .map_or_else(|| "-".to_string(), |d| d.to_string());
    vec![
        Line::from(vec![Span::styled("Name:       ", label), Span::raw(info.name.clone())]),
        Line::from(vec![Span::styled("Tweets:     ", label), Span::raw(info.document_count.to_string())]),
        Line::from(vec![Span::styled("Model:      ", label), Span::raw(info.embedding_model.clone())]),
        Line::from(vec![Span::styled("Dimension:  ", label), Span::raw(dimension)]),
        Line::from(vec![
            Span::styled("Created:    ", label),
            Span::raw(info.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
        Line::from(vec![
            Span::styled("Updated:    ", label),
            Span::raw(info.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
    ]
}

fn run_line(run: &IngestRun) -> String {
    let started = run.started_at.format("%Y-%m-%d %H:%M");
    let Some(stats) = &run.stats else {
        return format!("{started}  (unfinished)");
    };
    let field = |name: &str| stats.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
    format!(
        "{started}  loaded {}  embedded {}  skipped {}  failed {}",
        field("loaded"),
        field("embedded"),
        field("skipped"),
        field("failed"),
    )
}

async fn load_snapshot(ctx: &AppContext) -> Result<ArchiveSnapshot> {
    // No database yet reads as an empty archive
    if !ctx.db_path.exists() {
        return Ok(ArchiveSnapshot {
            collection: ctx.collection.clone(),
            ..Default::default()
        });
    }
    let storage = Storage::open_readonly(&ctx.db_path).await?;
    let info = storage.get_collection(&ctx.collection).await?;
    let runs = storage
        .list_ingest_runs(&ctx.collection, RECENT_RUNS)
        .await?;
    Ok(ArchiveSnapshot {
        collection: ctx.collection.clone(),
        info,
        runs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tweetrag_shared::RunId;

    fn run(stats: Option<serde_json::Value>) -> IngestRun {
        IngestRun {
            id: RunId::new(),
            collection: "tweets".into(),
            started_at: Utc::now(),
            finished_at: None,
            stats,
        }
    }

    #[test]
    fn run_line_shows_counts() {
        let line = run_line(&run(Some(serde_json::json!({
            "loaded": 4, "embedded": 3, "skipped": 1, "failed": 0
        }))));
        assert!(line.ends_with("loaded 4  embedded 3  skipped 1  failed 0"));
        assert!(run_line(&run(None)).ends_with("(unfinished)"));
    }

    #[test]
    fn missing_collection_explains_ingest() {
        let lines = collection_lines(&ArchiveSnapshot {
            collection: "tweets".into(),
            ..Default::default()
        });
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].to_string(), "Collection 'tweets' does not exist yet.");
    }

    #[test]
    fn tick_stores_loaded_snapshot() {
        let mut screen = ArchiveScreen::new();
        let (tx, rx) = mpsc::channel(1);
        screen.pending = Some(rx);
        assert!(screen.status().is_some());

        tx.try_send(Ok(ArchiveSnapshot {
            collection: "tweets".into(),
            info: None,
            runs: vec![run(None)],
        }))
        .unwrap();
        screen.tick();
        assert!(screen.pending.is_none());
        assert!(screen.status().is_none());
        assert_eq!(screen.snapshot.unwrap().runs.len(), 1);
    }
}
