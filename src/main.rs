//! Operator console for the discovery engine.
//!
//! Starts a discovery for the item named on the command line, then relays
//! stdin lines as operator turns:
//!
//! - plain text: one turn
//! - `/stream <text>`: one streamed turn
//! - `/context`: print where the session stands
//! - `/done`: complete the session and print the result
//! - `/abandon`: abandon the session

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use menu_discovery::adapters::{
    postgres, InMemoryCacheStore, InMemoryDiscoverySessionRepository, InMemoryExtractionStore,
    MockAIProvider, OpenAIConfig, OpenAIProvider, PostgresDiscoverySessionRepository,
    PostgresExtractionStore, RedisCacheStore,
};
use menu_discovery::application::{
    DiscoveryService, ProcessResponseCommand, StartDiscoveryCommand, StreamEvent,
};
use menu_discovery::config::{AppConfig, LogFormat, LoggingConfig};
use menu_discovery::domain::discovery::{RestaurantContext, FORCE_REFRESH_KEY};
use menu_discovery::domain::foundation::{SessionId, UserId};
use menu_discovery::ports::{
    AIProvider, CacheStore, DiscoverySessionRepository, ExtractionStore,
};

type BoxError = Box<dyn Error + Send + Sync>;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "menu-discovery")]
#[command(about = "Configure a menu item through a guided conversation")]
#[command(version)]
struct Args {
    /// Name of the menu item to configure
    #[arg(required = true)]
    item_name: Vec<String>,

    /// Free-text description of the item
    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    cuisine: Option<String>,

    #[arg(long)]
    location: Option<String>,

    /// Price tier (low, medium, high, premium)
    #[arg(long)]
    price_tier: Option<String>,

    #[arg(long)]
    category: Option<String>,

    /// Language code for assistant replies
    #[arg(long)]
    language: Option<String>,

    /// Ignore any cached opening conversation
    #[arg(long)]
    force_refresh: bool,

    /// Operator identity recorded on the session
    #[arg(long, env = "MENU_DISCOVERY_USER", default_value = "console")]
    user: String,
}

impl Args {
    fn context(&self) -> RestaurantContext {
        let mut context = RestaurantContext::new();
        if let Some(v) = &self.cuisine {
            context = context.with_cuisine_type(v);
        }
        if let Some(v) = &self.location {
            context = context.with_location(v);
        }
        if let Some(v) = &self.price_tier {
            context = context.with_price_tier(v);
        }
        if let Some(v) = &self.category {
            context = context.with_category(v);
        }
        if let Some(v) = &self.language {
            context = context.with_language(v);
        }
        if self.force_refresh {
            context = context.with_extra(FORCE_REFRESH_KEY, "true");
        }
        context
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.logging);

    let service = build_service(&config).await?;

    let mut cmd = StartDiscoveryCommand::new(
        UserId::new(args.user.clone())?,
        args.item_name.join(" "),
        args.context(),
    );
    if let Some(description) = &args.description {
        cmd = cmd.with_description(description);
    }

    let session = service.start_discovery(cmd).await?;
    let session_id = *session.id();
    println!("session {}", session_id);
    if let Some(reply) = session.last_assistant_reply() {
        println!("\n{}\n", reply.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match run_command(&service, session_id, line).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}

/// Handles one console line. Returns true when the session is over.
async fn run_command(
    service: &DiscoveryService,
    session_id: SessionId,
    line: &str,
) -> Result<bool, BoxError> {
    match line {
        "/done" => {
            let session = service.complete_discovery(session_id).await?;
            println!("{}", serde_json::to_string_pretty(session.extracted_data())?);
            println!("{}", serde_json::to_string_pretty(session.confidence_scores())?);
            Ok(true)
        }
        "/abandon" => {
            service.abandon_session(session_id).await?;
            println!("abandoned");
            Ok(true)
        }
        "/context" => {
            let context = service.get_conversation_context(session_id).await?;
            println!("{}", serde_json::to_string_pretty(&context)?);
            Ok(false)
        }
        _ => {
            if let Some(text) = line.strip_prefix("/stream ") {
                stream_turn(service, session_id, text).await?;
            } else {
                let context = service
                    .process_user_response(ProcessResponseCommand::new(session_id, line))
                    .await?;
                println!("[{}]", context.phase);
                if let Some(prompt) = context.next_prompt {
                    println!("\n{}\n", prompt);
                }
            }
            Ok(false)
        }
    }
}

async fn stream_turn(
    service: &DiscoveryService,
    session_id: SessionId,
    text: &str,
) -> Result<(), BoxError> {
    use futures::StreamExt;

    let mut stream = service.stream_response(session_id, text).await?;
    println!("[{}]", stream.phase());
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Chunk { delta } => {
                print!("{}", delta);
                stdout.flush()?;
            }
            StreamEvent::Complete { usage, .. } => {
                println!("\n({} tokens)\n", usage.total_tokens);
            }
            StreamEvent::Error { message } => {
                println!();
                return Err(message.into());
            }
        }
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn build_service(config: &AppConfig) -> Result<DiscoveryService, BoxError> {
    let ai: Arc<dyn AIProvider> = match &config.ai.openai_api_key {
        Some(key) if config.ai.has_openai() => {
            let provider_config = OpenAIConfig::new(key.clone())
                .with_base_url(&config.ai.base_url)
                .with_model(&config.ai.model)
                .with_temperature(config.ai.temperature)
                .with_max_tokens(config.ai.max_tokens)
                .with_timeout(config.ai.timeout())
                .with_max_retries(config.ai.max_retries);
            Arc::new(OpenAIProvider::new(provider_config)?)
        }
        _ => {
            tracing::warn!("No OpenAI API key configured, replies come from the scripted mock provider");
            Arc::new(MockAIProvider::new())
        }
    };
    let provider = ai.provider_info();
    tracing::info!(
        provider = %provider.name,
        model = %provider.model,
        streaming = provider.supports_streaming,
        "AI provider ready"
    );

    let cache: Arc<dyn CacheStore> = match &config.redis {
        Some(redis) => {
            match tokio::time::timeout(
                redis.timeout(),
                RedisCacheStore::connect(&redis.url, redis.key_prefix.clone()),
            )
            .await
            {
                Ok(Ok(store)) => Arc::new(store),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Redis unavailable, caching in memory");
                    Arc::new(InMemoryCacheStore::new())
                }
                Err(_) => {
                    tracing::warn!("Redis connection timed out, caching in memory");
                    Arc::new(InMemoryCacheStore::new())
                }
            }
        }
        None => Arc::new(InMemoryCacheStore::new()),
    };

    let (sessions, extractions): (Arc<dyn DiscoverySessionRepository>, Arc<dyn ExtractionStore>) =
        match &config.database {
            Some(database) => {
                let pool = PgPoolOptions::new()
                    .min_connections(database.min_connections)
                    .max_connections(database.max_connections)
                    .acquire_timeout(database.acquire_timeout())
                    .connect(&database.url)
                    .await?;
                if database.ensure_schema {
                    postgres::ensure_schema(&pool).await?;
                }
                (
                    Arc::new(PostgresDiscoverySessionRepository::new(pool.clone())),
                    Arc::new(PostgresExtractionStore::new(pool)),
                )
            }
            None => (
                Arc::new(InMemoryDiscoverySessionRepository::new()),
                Arc::new(InMemoryExtractionStore::new()),
            ),
        };

    tracing::info!(
        redis = config.redis.is_some(),
        postgres = config.database.is_some(),
        "Discovery service wired"
    );
    Ok(DiscoveryService::new(
        ai,
        sessions,
        cache,
        extractions,
        config.discovery.clone(),
    ))
}
