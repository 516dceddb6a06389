use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            signing_key,
            token_ttl,
        } => {
            let config = AuthConfig::new(signing_key).with_token_ttl_seconds(token_ttl);

            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
