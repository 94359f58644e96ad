//! Chat screen: ask a question, read the answer and the tweets behind it.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{info, warn};

use tweetrag_core::{RagAnswer, RagRequest, ollama_models, rag};
use tweetrag_shared::{Result, SearchHit};
use tweetrag_storage::Storage;

use crate::app::AppContext;
use crate::widgets::{spinner_frame, titled_block};

/// Characters of tweet text shown per source line.
const SOURCE_PREVIEW_CHARS: usize = 100;

type AnswerResult = std::result::Result<RagAnswer, String>;

pub(crate) struct ChatScreen {
    input: String,
    editing: bool,
    /// Question the answer pane belongs to.
    question: Option<String>,
    answer: String,
    sources: Vec<SearchHit>,
    selected: usize,
    error: Option<String>,
    /// Receiver for the in-flight RAG call.
    pending: Option<mpsc::Receiver<AnswerResult>>,
    ticks: usize,
}

impl ChatScreen {
    pub(crate) fn new() -> Self {
        Self {
            input: String::new(),
            editing: false,
            question: None,
            answer: String::new(),
            sources: Vec::new(),
            selected: 0,
            error: None,
            pending: None,
            ticks: 0,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    pub(crate) fn status(&self) -> Option<String> {
        if self.pending.is_some() {
            return Some(format!("{} Thinking...", spinner_frame(self.ticks)));
        }
        self.error.as_ref().map(|e| format!("Error: {e}"))
    }

    pub(crate) fn tick(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            return;
        };
        self.ticks = self.ticks.wrapping_add(1);

        match rx.try_recv() {
            Ok(result) => {
                self.pending = None;
                self.show(result);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.error = Some("answer task ended unexpectedly".into());
            }
        }
    }

    fn show(&mut self, result: AnswerResult) {
        match result {
            Ok(answer) => {
                self.answer = answer.answer;
                self.sources = answer.hits;
                self.selected = 0;
                self.error = None;
            }
            Err(e) => {
                self.answer.clear();
                self.sources.clear();
                self.error = Some(e);
            }
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers, ctx: &AppContext) {
        if self.editing {
            match code {
                KeyCode::Enter => self.submit(ctx),
                KeyCode::Esc => self.editing = false,
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Char('i') | KeyCode::Enter => self.editing = true,
            KeyCode::Up if self.selected > 0 => self.selected -= 1,
            KeyCode::Down if self.selected + 1 < self.sources.len() => self.selected += 1,
            _ => {}
        }
    }

    /// Send the typed question to a background RAG task.
    fn submit(&mut self, ctx: &AppContext) {
        let question = self.input.trim().to_string();
        if question.is_empty() {
            return;
        }
        if self.pending.is_some() {
            self.error = Some("still answering the previous question".into());
            return;
        }

        info!(chars = question.len(), "question submitted");
        let (tx, rx) = mpsc::channel(1);
        let task_ctx = ctx.clone();
        let task_question = question.clone();
        ctx.runtime.spawn(async move {
            let result = ask(&task_ctx, task_question)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &result {
                warn!(error = %e, "question failed");
            }
            // Receiver is gone only when the app has quit
            let _ = tx.send(result).await;
        });

        self.pending = Some(rx);
        self.question = Some(question);
        self.input.clear();
        self.editing = false;
        self.error = None;
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),      // Question input
                Constraint::Min(5),         // Answer
                Constraint::Percentage(35), // Sources
            ])
            .split(area);

        let hint = if self.editing {
            "Question (Enter to ask, Esc to stop typing)"
        } else {
            "Question (i to type)"
        };
        let input = Paragraph::new(self.input.as_str()).block(titled_block(hint, self.editing));
        f.render_widget(input, chunks[0]);
        if self.editing {
            let x = chunks[0].x + 1 + self.input.chars().count() as u16;
            f.set_cursor_position((x.min(chunks[0].right().saturating_sub(2)), chunks[0].y + 1));
        }

        let answer_title = match &self.question {
            Some(q) => format!("Answer: {q}"),
            None => "Answer".to_string(),
        };
        let body = if self.pending.is_some() {
            "Thinking...".to_string()
        } else if let Some(e) = &self.error {
            e.clone()
        } else if self.question.is_none() {
            "Ask something about your tweets.".to_string()
        } else {
            self.answer.clone()
        };
        let answer = Paragraph::new(body)
            .block(titled_block(&answer_title, false))
            .wrap(Wrap { trim: false });
        f.render_widget(answer, chunks[1]);

        let items: Vec<ListItem> = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, hit)| source_item(i, hit))
            .collect();
        let title = format!("Sources ({})", self.sources.len());
        let list = List::new(items)
            .block(titled_block(&title, false))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        if !self.sources.is_empty() {
            state.select(Some(self.selected));
        }
        f.render_stateful_widget(list, chunks[2], &mut state);
    }
}

fn source_item(i: usize, hit: &SearchHit) -> ListItem<'static> {
    let when = hit.tweet.timestamp.clone().unwrap_or_else(|| "-".into());
    ListItem::new(vec![
        Line::from(vec![
            Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::Cyan)),
            Span::raw(hit.tweet.preview(SOURCE_PREVIEW_CHARS)),
        ]),
        Line::from(Span::styled(
            format!("   {when}  distance {:.3}", hit.distance),
            Style::default().fg(Color::DarkGray),
        )),
    ])
}

async fn ask(ctx: &AppContext, question: String) -> Result<RagAnswer> {
    let storage = Storage::open_readonly(&ctx.db_path).await?;
    let (_client, embedder, generator) = ollama_models(&ctx.models)?;

    let request = RagRequest {
        collection: ctx.collection.clone(),
        question,
        n_results: ctx.context_tweets,
        template: ctx.template.clone(),
    };
    rag::answer(&embedder, &generator, &storage, &request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweetrag_core::PromptTemplate;
    use tweetrag_shared::{MARKDOWN_FORMAT, ModelConfig, Tweet, parse_base_url};

    fn test_context(runtime: &tokio::runtime::Runtime) -> AppContext {
        AppContext {
            db_path: std::env::temp_dir().join("tweetrag_tui_chat_missing.db"),
            collection: "tweets".into(),
            models: ModelConfig {
                base_url: parse_base_url("http://127.0.0.1:9").unwrap(),
                embedding_model: "e".into(),
                generation_model: "g".into(),
                timeout_secs: 1,
            },
            template: PromptTemplate::default(),
            context_tweets: 3,
            runtime: runtime.handle().clone(),
        }
    }

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            tweet: Tweet {
                tweet_id: id.into(),
                content: format!("tweet {id}"),
                timestamp: None,
                posted_at: None,
                url: None,
                author: None,
                source_file: "tweets.md".into(),
                format: MARKDOWN_FORMAT.into(),
            },
            distance: 0.2,
        }
    }

    #[test]
    fn typing_edits_the_input() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&runtime);
        let mut chat = ChatScreen::new();

        chat.handle_key(KeyCode::Char('i'), KeyModifiers::NONE, &ctx);
        for c in "hey!".chars() {
            chat.handle_key(KeyCode::Char(c), KeyModifiers::NONE, &ctx);
        }
        chat.handle_key(KeyCode::Backspace, KeyModifiers::NONE, &ctx);
        assert_eq!(chat.input, "hey");

        chat.handle_key(KeyCode::Esc, KeyModifiers::NONE, &ctx);
        assert!(!chat.is_editing());
        assert_eq!(chat.input, "hey");
    }

    #[test]
    fn blank_question_is_not_submitted() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&runtime);
        let mut chat = ChatScreen::new();

        chat.handle_key(KeyCode::Enter, KeyModifiers::NONE, &ctx);
        chat.handle_key(KeyCode::Char(' '), KeyModifiers::NONE, &ctx);
        chat.handle_key(KeyCode::Enter, KeyModifiers::NONE, &ctx);
        assert!(chat.pending.is_none());
        assert!(chat.is_editing());
    }

    #[test]
    fn missing_database_surfaces_as_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&runtime);
        let mut chat = ChatScreen::new();

        chat.input = "what did I do?".into();
        chat.editing = true;
        chat.handle_key(KeyCode::Enter, KeyModifiers::NONE, &ctx);
        assert!(chat.pending.is_some());
        assert!(chat.input.is_empty());
        assert!(chat.status().unwrap().contains("Thinking"));

        for _ in 0..200 {
            chat.tick();
            if chat.pending.is_none() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(chat.pending.is_none());
        assert!(chat.error.is_some());
        assert!(chat.sources.is_empty());
    }

    #[test]
    fn answer_arrives_over_channel() {
        let mut chat = ChatScreen::new();
        let (tx, rx) = mpsc::channel(1);
        chat.pending = Some(rx);

        chat.tick();
        assert!(chat.pending.is_some());

        tx.try_send(Ok(RagAnswer {
            question: "q".into(),
            answer: "an answer".into(),
            hits: vec![hit("1"), hit("2")],
            model: "m".into(),
        }))
        .unwrap();
        chat.tick();
        assert!(chat.pending.is_none());
        assert_eq!(chat.answer, "an answer");
        assert_eq!(chat.sources.len(), 2);
        assert!(chat.status().is_none());
    }

    #[test]
    fn source_selection_stays_in_bounds() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&runtime);
        let mut chat = ChatScreen::new();
        chat.sources = vec![hit("1"), hit("2")];

        chat.handle_key(KeyCode::Up, KeyModifiers::NONE, &ctx);
        assert_eq!(chat.selected, 0);
        chat.handle_key(KeyCode::Down, KeyModifiers::NONE, &ctx);
        chat.handle_key(KeyCode::Down, KeyModifiers::NONE, &ctx);
        assert_eq!(chat.selected, 1);
    }
}
