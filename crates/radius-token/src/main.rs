use clap::Parser;
use radius_token::{
    AttemptContext, ChallengeOrchestrator, Config, MemoryChallengeStore, PrefixPinPolicy, RadiusBridge,
    RadiusTokenAdapter, Token, UdpTransport, Verdict,
};
use std::io::{self, BufRead, Write};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// RADIUS token check - verify a one-time password against a RADIUS server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius-token")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Serial of the token to check
    #[arg(short, long, required_unless_present = "validate")]
    serial: Option<String>,

    /// PIN and/or OTP value
    #[arg(short, long, required_unless_present = "validate")]
    pass: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::registry()
                .with(EnvFilter::new("info"))
                .with(tracing_subscriber::fmt::layer())
                .init();

            if cli.validate {
                eprintln!("Configuration validation failed!");
                eprintln!("   Error: {}", e);
                process::exit(1);
            }

            warn!("Could not load config file from: {}", cli.config_path);
            info!("Creating example configuration at: {}", cli.config_path);

            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }

            info!("Please edit {} and run again", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        print_summary(&config);
        process::exit(0);
    }

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let (Some(serial), Some(pass)) = (cli.serial, cli.pass) else {
        eprintln!("--serial and --pass are required");
        process::exit(2);
    };

    let Some(definition) = config.find_token(&serial) else {
        error!("No token with serial {} in {}", serial, cli.config_path);
        process::exit(1);
    };

    let mut token = match Token::enroll(definition.serial.as_str(), &definition.params) {
        Ok(token) => token,
        Err(e) => {
            error!("Cannot enroll token {}: {}", serial, e);
            process::exit(1);
        }
    };
    token.locked = definition.locked;

    let registry = config.registry();
    let bridge = RadiusBridge::new(Arc::new(config), Arc::new(registry), Arc::new(UdpTransport::new()));
    let orchestrator = ChallengeOrchestrator::new(Arc::new(MemoryChallengeStore::new()), Arc::new(bridge));
    let adapter = RadiusTokenAdapter::new(token, Arc::new(orchestrator), Arc::new(PrefixPinPolicy));

    let accepted = match run(&adapter, &pass) {
        Ok(accepted) => accepted,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    process::exit(if accepted { 0 } else { 1 });
}

/// One authentication, answering a server challenge from stdin
fn run(adapter: &RadiusTokenAdapter, pass: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let mut ctx = AttemptContext::new();

    if !adapter.is_challenge_request(pass, &mut ctx) {
        let outcome = adapter.authenticate(pass, &mut ctx)?;
        println!("{}: {}", outcome.verdict, outcome.reply.message);
        return Ok(outcome.accepted);
    }

    let challenge = adapter.create_challenge(None, &ctx)?;
    print!("{} ", challenge.message);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim_end_matches(['\r', '\n']);

    let mut ctx = AttemptContext::for_transaction(challenge.transaction_id.as_str());
    if !adapter.is_challenge_response(answer, &mut ctx) {
        println!("{}: challenged again, giving up", Verdict::Challenge);
        return Ok(false);
    }

    let verdict = adapter.check_challenge_response(answer, &mut ctx)?;
    println!("{}", verdict);
    Ok(verdict.is_accept())
}

fn print_summary(config: &Config) {
    println!("Configuration validated successfully!");
    println!();
    println!("Configuration summary:");
    println!("  RADIUS servers: {}", config.servers.len());
    println!("  Tokens: {}", config.tokens.len());
    println!("  Log level: {}", config.log_level.as_deref().unwrap_or("info"));
    for (key, value) in &config.system {
        if key.ends_with("secret") {
            println!("  {} = <redacted>", key);
        } else {
            println!("  {} = {}", key, value);
        }
    }
    println!();

    if config.servers.is_empty() {
        println!("No named RADIUS servers configured");
    } else {
        println!("RADIUS servers:");
        for server in &config.servers {
            let description = server.description.as_deref().unwrap_or("(no description)");
            println!("  {} {}:{} - {}", server.identifier, server.server, server.port, description);
        }
    }

    if !config.tokens.is_empty() {
        println!("Tokens:");
        for token in &config.tokens {
            let status = if token.locked { "locked" } else { "active" };
            println!("  {} ({})", token.serial, status);
        }
    }
}
