use clap::Parser;
use ferrous_forward_domain::CliOverrides;
use ferrous_forward_infrastructure::dns::{ForwardContext, Forwarder};
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use std::time::Instant;
use tracing::{debug, info};

mod bootstrap;
mod query;

#[derive(Parser)]
#[command(name = "ferrous-forward")]
#[command(version)]
#[command(about = "Ferrous Forward - races a DNS query across upstream resolvers")]
struct Cli {
    /// Name to resolve
    domain: String,

    /// Record type (A, AAAA, MX, TXT, ...)
    #[arg(short = 't', long = "type", default_value = "A", value_parser = query::parse_record_type)]
    record_type: RecordType,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Upstream resolver (IP, IP:port or https:// URL). Repeatable.
    #[arg(short = 'r', long = "resolver", value_name = "RESOLVER")]
    resolvers: Vec<String>,

    /// Overall query timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log every upstream send at info level
    #[arg(long)]
    debug_send: bool,

    /// Print the race plan and exit without sending anything
    #[arg(long)]
    plan: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        upstream_servers: cli.resolvers.clone(),
        query_timeout_ms: cli.timeout_ms,
        log_level: cli.log_level.clone(),
        debug_send: cli.debug_send,
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;
    bootstrap::init_logging(&config);

    let forwarder = Forwarder::from_config(&config)?;

    if cli.plan {
        for candidate in forwarder.plan() {
            println!("{}", candidate);
        }
        return Ok(());
    }

    let packet = query::build_query(&cli.domain, cli.record_type)?;
    debug!(
        domain = %cli.domain,
        record_type = %cli.record_type,
        resolvers = forwarder.resolvers().len(),
        "Forwarding query"
    );

    let ctx = ForwardContext::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let started = Instant::now();
    let response = forwarder.forward(&ctx, &packet).await?;
    let elapsed = started.elapsed();

    let message = Message::from_vec(&response)?;
    info!(
        rcode = %message.response_code,
        answers = message.answers.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Query answered"
    );

    println!(
        ";; status: {}, answers: {}, time: {} ms",
        message.response_code,
        message.answers.len(),
        elapsed.as_millis()
    );
    for record in &message.answers {
        println!("{}", record);
    }

    Ok(())
}
