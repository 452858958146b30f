// gsauth - Grand Slam authentication CLI
//
// Signs in against the identity service, walks the second-factor
// prompt when the account demands one, and fetches a developer-tools
// app token. The engine itself never reads the terminal; this binary
// resolves the suspension points.

use std::io::{BufRead, Write};
use std::time::Duration;

use clap::Parser;

use grandslam_shared::config::get_config;
use grandslam_shared::log::initialize_logging;

use gsauth::{
    AnisetteData, AuthChannel, AuthOutcome, AuthSession, Authenticator, Credential,
    ReqwestTransport, SecondFactorMethod, StaticAnisette, TokenIssuer, XCODE_APP_ID,
};

/// Default config file name
const DEFAULT_CONFIG: &str = "gsauth.conf";

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "gsauth")]
#[command(about = "Grand Slam authentication client")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Account username (prompted for when omitted)
    #[arg(short, long)]
    username: Option<String>,

    /// Application identifier to fetch a token for
    #[arg(short, long, default_value = XCODE_APP_ID)]
    app: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; the file is optional for a client tool
    let config_found = {
        let mut config = get_config().lock();
        config.set_source(&args.config, "Gsauth_")
    };

    let log_dir = {
        let config = get_config().lock();
        let dir = config.get_string_default("LogsDir", "");
        if dir.is_empty() { None } else { Some(dir) }
    };
    initialize_logging(log_dir.as_deref(), "info");

    tracing::info!("gsauth v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        tracing::info!("Using configuration file: {}", args.config);
    } else {
        tracing::info!("No configuration file at {}, using defaults", args.config);
    }

    let (base_url, timeout_ms, serial) = {
        let config = get_config().lock();
        (
            config.get_string_default("AuthBaseUrl", gsauth::channel::DEFAULT_BASE_URL),
            config.get_int_default("RequestTimeout", 15_000) as u64,
            config.get_string("DeviceSerial"),
        )
    };

    let username = match args.username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = match std::env::var("GSAUTH_PASSWORD") {
        Ok(password) => password,
        Err(_) => prompt("Password: ")?,
    };
    let credential = Credential::new(username, password);

    // Fingerprint data comes from the environment; the engine treats it
    // as opaque and sends it verbatim
    let anisette = StaticAnisette::new(AnisetteData {
        machine_id: std::env::var("GSAUTH_MACHINE_ID").unwrap_or_default(),
        one_time_password: std::env::var("GSAUTH_OTP").unwrap_or_default(),
        routing_info: std::env::var("GSAUTH_ROUTING_INFO").unwrap_or_default(),
        device_serial: serial,
    });

    let transport = ReqwestTransport::new(Duration::from_millis(timeout_ms))?;
    let channel = AuthChannel::with_base_url(anisette, transport, base_url);
    let authenticator = Authenticator::new(channel);

    let session = run_login(&authenticator, &credential).await?;
    tracing::info!("Authenticated as adsid {}", session.payload().adsid);

    let issuer = TokenIssuer::new(authenticator.channel());
    let token = issuer.fetch_app_token(&session, &args.app).await?;

    println!("service:  {}", token.service);
    println!(
        "expires:  {}",
        token
            .expiry
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("token:    {}", token.token);

    Ok(())
}

/// Authenticate, resolving the second-factor suspension point on the
/// terminal until the service accepts a code.
async fn run_login<P, T>(
    authenticator: &Authenticator<P, T>,
    credential: &Credential,
) -> anyhow::Result<AuthSession>
where
    P: gsauth::AnisetteProvider,
    T: gsauth::Transport,
{
    let mut challenge = match authenticator.authenticate(credential).await? {
        AuthOutcome::Authenticated(session) => return Ok(session),
        AuthOutcome::SecondFactorRequired(challenge) => challenge,
    };

    loop {
        let method = match challenge.method() {
            SecondFactorMethod::TrustedDevice => "trusted device",
            SecondFactorMethod::Sms => "SMS",
        };
        let code = prompt(&format!("Enter {method} verification code: "))?;

        match authenticator.submit_second_factor(challenge, code.trim()).await {
            Ok(session) => return Ok(session),
            Err(failure) => {
                if failure.error.is_retryable() {
                    tracing::warn!("Code submission failed: {}", failure.error);
                } else {
                    tracing::warn!("Code rejected: {}", failure.error);
                }
                challenge = failure.challenge;
            }
        }
    }
}

/// Read one line from the terminal
fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
