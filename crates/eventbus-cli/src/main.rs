//! CLI binary to publish to and consume from an eventbus cluster.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::time::Duration;

use bytes::Bytes;
use clap::{Args as ClapArgs, Parser, Subcommand};
use eventbus::{Config, Consumer, HttpProducer, LogLevel, Producer};
use eventbus_nats::{NatsConnector, NatsSubscriber};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bus client error
    #[error(transparent)]
    Eventbus(#[from] eventbus::Error),

    /// Reading messages from stdin failed
    #[error("stdin error: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Node addresses (host:port), comma separated
    #[arg(long, value_delimiter = ',', env = "EVENTBUS_NODES")]
    nodes: Vec<String>,

    /// Seeker addresses (host:port), comma separated
    #[arg(long, value_delimiter = ',', env = "EVENTBUS_SEEKERS")]
    seekers: Vec<String>,

    /// Client identifier, defaults to the short hostname
    #[arg(long, default_value = "", env = "EVENTBUS_CLIENT_ID")]
    client_id: String,

    /// Log level: debug, info, warn or error
    #[arg(long, default_value = "info", env = "EVENTBUS_LOG_LEVEL")]
    log_level: LogLevel,

    /// Timeout for HTTP requests, in seconds
    #[arg(long, default_value_t = 10, env = "EVENTBUS_HTTP_TIMEOUT")]
    http_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Publish messages over node connections
    Produce(ProduceArgs),

    /// Publish messages over the node HTTP API
    HttpProduce(HttpProduceArgs),

    /// Print messages from a topic/channel
    Consume(ConsumeArgs),
}

#[derive(Clone, Debug, ClapArgs)]
struct ProduceArgs {
    /// Topic to publish to
    #[arg(long, env = "EVENTBUS_TOPIC")]
    topic: String,

    /// Message bodies; read line by line from stdin when omitted, until
    /// `quit` or `exit`
    messages: Vec<String>,
}

#[derive(Clone, Debug, ClapArgs)]
struct HttpProduceArgs {
    /// Event bodies; read line by line from stdin when omitted
    messages: Vec<String>,
}

#[derive(Clone, Debug, ClapArgs)]
struct ConsumeArgs {
    /// Topic to consume
    #[arg(long, env = "EVENTBUS_TOPIC")]
    topic: String,

    /// Channel to consume; an ephemeral one is generated when empty
    #[arg(long, default_value = "", env = "EVENTBUS_CHANNEL")]
    channel: String,

    /// Minimum in-flight window
    #[arg(long, default_value_t = eventbus::DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Attempts after which a message is dropped
    #[arg(long, default_value_t = eventbus::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u16,

    /// Exit after this many messages
    #[arg(long)]
    count: Option<usize>,
}

impl Args {
    fn config(&self) -> Config {
        Config::default()
            .with_nodes(self.nodes.clone())
            .with_seekers(self.seekers.clone())
            .with_client_id(self.client_id.clone())
            .with_log_level(self.log_level)
            .with_http_timeout(Duration::from_secs(self.http_timeout))
    }
}

/// Message bodies from the command line, or from stdin lines until EOF or a
/// `quit`/`exit` line.
struct MessageSource {
    given: std::vec::IntoIter<String>,
    stdin: Option<Lines<BufReader<Stdin>>>,
}

impl MessageSource {
    fn new(given: Vec<String>) -> Self {
        let stdin = given
            .is_empty()
            .then(|| BufReader::new(tokio::io::stdin()).lines());
        Self {
            given: given.into_iter(),
            stdin,
        }
    }

    async fn next(&mut self) -> Result<Option<String>, Error> {
        if let Some(message) = self.given.next() {
            return Ok(Some(message));
        }
        let Some(lines) = self.stdin.as_mut() else {
            return Ok(None);
        };

        while let Some(line) = lines.next_line().await? {
            match line.trim() {
                "" => {}
                "quit" | "exit" => return Ok(None),
                message => return Ok(Some(message.to_string())),
            }
        }
        Ok(None)
    }
}

async fn produce(config: &Config, args: ProduceArgs) -> Result<(), Error> {
    let producer = Producer::new(config, &NatsConnector).await?;

    let mut messages = MessageSource::new(args.messages);
    let mut published = 0_usize;
    while let Some(message) = messages.next().await? {
        producer.publish(&args.topic, message).await?;
        published += 1;
    }

    producer.close().await;
    info!("published {published} message(s) to {}", args.topic);
    Ok(())
}

async fn http_produce(config: &Config, args: HttpProduceArgs) -> Result<(), Error> {
    let producer = HttpProducer::new(config)?;

    let mut messages = MessageSource::new(args.messages);
    while let Some(message) = messages.next().await? {
        let response: Bytes = producer.publish(message).await?;
        println!("{}", String::from_utf8_lossy(&response));
    }

    producer.close();
    Ok(())
}

async fn consume(
    config: Config,
    args: ConsumeArgs,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let config = config
        .with_max_in_flight(args.max_in_flight)
        .with_max_attempts(args.max_attempts);
    let consumer = Consumer::new(&args.topic, &args.channel, &config, &NatsSubscriber).await?;
    let mut stream = consumer.consume()?;
    info!(
        "consuming {}/{} with {} in flight",
        consumer.topic(),
        consumer.channel(),
        consumer.in_flight()
    );

    let mut seen = 0_usize;
    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => break,
            message = stream.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        println!("{}", String::from_utf8_lossy(message.body()));
        seen += 1;
        if args.count.is_some_and(|count| seen >= count) {
            break;
        }
    }

    consumer.close().await;
    info!("consumed {seen} message(s)");
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(args.log_level))
        .with_writer(std::io::stderr)
        .init();

    let config = args.config();

    let shutdown_token = CancellationToken::new();
    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt signal");
        signal_shutdown_token.cancel();
    });

    match args.command {
        Command::Produce(produce_args) => produce(&config, produce_args).await,
        Command::HttpProduce(http_args) => http_produce(&config, http_args).await,
        Command::Consume(consume_args) => consume(config, consume_args, shutdown_token).await,
    }
}
