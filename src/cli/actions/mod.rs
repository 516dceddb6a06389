pub mod server;

use secrecy::SecretString;

/// Actions the CLI can dispatch.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        signing_key: SecretString,
        token_ttl: i64,
    },
}
