//! Retrieval-augmented answering over a tweet collection.
//!
//! A question is embedded, the closest tweets are pulled from the vector
//! store, and their text is spliced into a prompt for the generation model.

use tracing::{debug, info, instrument};

use tweetrag_shared::{
    CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER, Result, SearchHit, TweetRagError,
    validate_template,
};
use tweetrag_storage::Storage;

use crate::models::{Embedder, Generator};

/// Prompt used when no custom template is configured.
pub const DEFAULT_TEMPLATE: &str = "Based on the following tweets:\n\n{context}\n\nPlease respond to this question: {question}\n\nUse the information from the tweets to provide a relevant and helpful response.";

/// Default number of tweets retrieved per question.
pub const DEFAULT_CONTEXT_TWEETS: usize = 3;

// ---------------------------------------------------------------------------
// Prompt template
// ---------------------------------------------------------------------------

/// A prompt with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Build a template, checking both placeholders are present.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        validate_template(&template)?;
        Ok(Self { template })
    }

    /// The configured template, or the default when `None`.
    pub fn from_config(template: Option<&str>) -> Result<Self> {
        match template {
            Some(t) => Self::new(t),
            None => Ok(Self::default()),
        }
    }

    /// Fill in the placeholders.
    pub fn render(&self, context: &str, question: &str) -> String {
        // Question last so a literal "{context}" typed by the user stays as-is.
        self.template
            .replace(CONTEXT_PLACEHOLDER, context)
            .replace(QUESTION_PLACEHOLDER, question)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests & results
// ---------------------------------------------------------------------------

/// Tweets retrieved for a query.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub query: String,
    /// Closest first.
    pub hits: Vec<SearchHit>,
}

/// A question to answer against a collection.
#[derive(Debug, Clone)]
pub struct RagRequest {
    pub collection: String,
    pub question: String,
    /// Number of tweets to retrieve as context.
    pub n_results: usize,
    pub template: PromptTemplate,
}

impl RagRequest {
    /// A request with the default template and context size.
    pub fn new(collection: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            question: question.into(),
            n_results: DEFAULT_CONTEXT_TWEETS,
            template: PromptTemplate::default(),
        }
    }
}

/// A generated answer with the tweets it was grounded on.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    pub hits: Vec<SearchHit>,
    /// Generation model that produced the answer.
    pub model: String,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Retrieve the `n` stored tweets closest to `query`.
#[instrument(skip_all, fields(collection = %collection, n = n))]
pub async fn search_similar<E: Embedder>(
    embedder: &E,
    storage: &Storage,
    collection: &str,
    query: &str,
    n: usize,
) -> Result<SearchResults> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TweetRagError::validation("query must not be empty"));
    }
    if n == 0 {
        return Err(TweetRagError::validation("number of results must be at least 1"));
    }

    // A collection only answers queries embedded by its own model
    if let Some(info) = storage.get_collection(collection).await? {
        if info.embedding_model != embedder.model_name() {
            return Err(TweetRagError::model_mismatch(
                collection,
                &info.embedding_model,
                embedder.model_name(),
            ));
        }
    }

    let vector = embedder.embed(query).await?;
    let hits = storage.query_similar(collection, &vector, n).await?;

    debug!(hits = hits.len(), "retrieved similar tweets");
    Ok(SearchResults {
        query: query.to_string(),
        hits,
    })
}

/// One `- <text>` line per hit.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {}", hit.tweet.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer a question from the collection's most relevant tweets.
///
/// With no matching tweets the model is still asked, with an empty context.
#[instrument(skip_all, fields(collection = %request.collection, n = request.n_results))]
pub async fn answer<E: Embedder, G: Generator>(
    embedder: &E,
    generator: &G,
    storage: &Storage,
    request: &RagRequest,
) -> Result<RagAnswer> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(TweetRagError::validation("question must not be empty"));
    }

    let results = search_similar(
        embedder,
        storage,
        &request.collection,
        question,
        request.n_results,
    )
    .await?;

    let context = build_context(&results.hits);
    let prompt = request.template.render(&context, question);
    debug!(prompt_len = prompt.len(), "prompt rendered");

    let answer = generator.generate(&prompt).await?;
    info!(
        hits = results.hits.len(),
        model = generator.model_name(),
        "answer generated"
    );

    Ok(RagAnswer {
        question: question.to_string(),
        answer,
        hits: results.hits,
        model: generator.model_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{SilentProgress, embed_tweets};
    use crate::models::testing::{HashEmbedder, RecordingGenerator};
    use tweetrag_shared::{MARKDOWN_FORMAT, Tweet};
    use uuid::Uuid;

    fn tweet(id: &str, content: &str) -> Tweet {
        Tweet {
            tweet_id: id.into(),
            content: content.into(),
            timestamp: None,
            posted_at: None,
            url: None,
            author: None,
            source_file: "tweets.md".into(),
            format: MARKDOWN_FORMAT.into(),
        }
    }

    fn hit(content: &str) -> SearchHit {
        SearchHit {
            tweet: tweet("1", content),
            distance: 0.1,
        }
    }

    async fn seeded_storage(embedder: &HashEmbedder) -> Storage {
        let tmp = std::env::temp_dir().join(format!("tweetrag_rag_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        let tweets = vec![
            tweet("1", "Just set up my first Rails app on a VPS"),
            tweet("2", "Listening to Radiohead on repeat"),
            tweet("3", "Rails migrations are confusing today"),
            tweet("4", "Coffee then more coffee"),
        ];
        embed_tweets(embedder, &storage, "tweets", tweets, &SilentProgress)
            .await
            .expect("seed");
        storage
    }

    #[test]
    fn build_context_bullets() {
        let hits = vec![hit("first tweet"), hit("second tweet")];
        assert_eq!(build_context(&hits), "- first tweet\n- second tweet");
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn default_template_renders() {
        let prompt = PromptTemplate::default().render("- a tweet", "What happened?");
        assert_eq!(
            prompt,
            "Based on the following tweets:\n\n- a tweet\n\nPlease respond to this question: What happened?\n\nUse the information from the tweets to provide a relevant and helpful response."
        );
    }

    #[test]
    fn custom_template_requires_placeholders() {
        assert!(PromptTemplate::new("Q: {question}").is_err());
        assert!(PromptTemplate::new("{context}").is_err());

        let template = PromptTemplate::from_config(Some("C={context} Q={question}")).unwrap();
        assert_eq!(template.render("ctx", "why?"), "C=ctx Q=why?");
        assert_eq!(PromptTemplate::from_config(None).unwrap(), PromptTemplate::default());
    }

    #[tokio::test]
    async fn search_similar_ranks_related_tweets_first() {
        let embedder = HashEmbedder::new(64);
        let storage = seeded_storage(&embedder).await;

        let results = search_similar(&embedder, &storage, "tweets", "Rails app", 2)
            .await
            .unwrap();
        assert_eq!(results.hits.len(), 2);
        assert!(results.hits.iter().all(|h| h.tweet.content.contains("Rails")));
    }

    #[tokio::test]
    async fn search_similar_rejects_zero_and_empty() {
        let embedder = HashEmbedder::new(8);
        let storage = seeded_storage(&embedder).await;

        let err = search_similar(&embedder, &storage, "tweets", "rails", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));

        let err = search_similar(&embedder, &storage, "tweets", "   ", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));
    }

    #[tokio::test]
    async fn search_with_other_embedding_model_is_rejected() {
        let embedder = HashEmbedder::new(8);
        let storage = seeded_storage(&embedder).await;

        // Same vector size, different model
        let other = HashEmbedder::named(8, "nomic-embed-text");
        let err = search_similar(&other, &storage, "tweets", "Rails app", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));
        let msg = err.to_string();
        assert!(msg.contains("'hash-embedder'"));
        assert!(msg.contains("tweetrag reset"));

        let generator = RecordingGenerator::new("unused");
        let request = RagRequest::new("tweets", "What about Rails?");
        assert!(answer(&other, &generator, &storage, &request).await.is_err());
        assert!(generator.last_prompt().is_none());
    }

    #[tokio::test]
    async fn answer_grounds_prompt_in_retrieved_tweets() {
        let embedder = HashEmbedder::new(64);
        let generator = RecordingGenerator::new("You were building Rails apps.");
        let storage = seeded_storage(&embedder).await;

        let mut request = RagRequest::new("tweets", "  What was I doing with Rails?  ");
        request.n_results = 2;

        let answer = answer(&embedder, &generator, &storage, &request)
            .await
            .unwrap();
        assert_eq!(answer.answer, "You were building Rails apps.");
        assert_eq!(answer.question, "What was I doing with Rails?");
        assert_eq!(answer.hits.len(), 2);
        assert_eq!(answer.model, "recording-generator");

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.contains("- Just set up my first Rails app on a VPS"));
        assert!(prompt.contains("Please respond to this question: What was I doing with Rails?"));
    }

    #[tokio::test]
    async fn answer_with_empty_collection_still_generates() {
        let embedder = HashEmbedder::new(8);
        let generator = RecordingGenerator::new("I have no tweets to go on.");
        let tmp = std::env::temp_dir().join(format!("tweetrag_rag_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.unwrap();

        let request = RagRequest::new("tweets", "Anything?");
        let answer = answer(&embedder, &generator, &storage, &request)
            .await
            .unwrap();
        assert!(answer.hits.is_empty());
        assert!(generator
            .last_prompt()
            .unwrap()
            .starts_with("Based on the following tweets:\n\n\n\nPlease respond"));
    }

    #[tokio::test]
    async fn answer_rejects_empty_question() {
        let embedder = HashEmbedder::new(8);
        let generator = RecordingGenerator::new("unused");
        let storage = seeded_storage(&embedder).await;

        let err = answer(&embedder, &generator, &storage, &RagRequest::new("tweets", " "))
            .await
            .unwrap_err();
        assert!(matches!(err, TweetRagError::Validation { .. }));
        assert!(generator.last_prompt().is_none());
    }
}
