use crate::{api, auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub frontend_base_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.token_secret)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_frontend_base_url(args.frontend_base_url);

    api::new(args.port, args.dsn, auth_config).await
}
