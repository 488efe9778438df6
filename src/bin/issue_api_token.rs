//! Issues a fresh API token for a user.
//!
//! Usage: `issue_api_token <email> [--create-admin <full name>]`
//!
//! With `--create-admin`, an ADMIN account is created when the email is unknown, which is
//! how the first administrator is bootstrapped. The token is printed once; only its digest
//! is stored.

use anyhow::Context;
use credit_bureau_api::auth::{generate_token, sha256_hex};
use credit_bureau_api::config::Config;
use credit_bureau_api::db::Database;
use credit_bureau_api::db_storage::CreditStorage;
use credit_bureau_api::models::{CreateUserRequest, Role};
use credit_bureau_api::validation::require_valid_email;

struct Args {
    email: String,
    create_admin: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let email = args
        .next()
        .context("usage: issue_api_token <email> [--create-admin <full name>]")?;
    let create_admin = match args.next().as_deref() {
        Some("--create-admin") => Some(
            args.next()
                .context("--create-admin needs the administrator's full name")?,
        ),
        Some(other) => anyhow::bail!("unexpected argument: {}", other),
        None => None,
    };
    Ok(Args {
        email,
        create_admin,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = parse_args(std::env::args().skip(1))?;
    require_valid_email(&args.email)?;

    let config = Config::from_env()?;
    let db = Database::connect_only(&config.database_url).await?;
    let storage = CreditStorage::new(db.pool.clone());

    let existing = storage
        .find_user_by_email(&args.email.trim().to_lowercase())
        .await?;

    let user = match (existing, args.create_admin) {
        (Some(user), _) => user,
        (None, Some(full_name)) => {
            let created = storage
                .create_user(&CreateUserRequest {
                    email: args.email.clone(),
                    full_name,
                    role: Role::Admin,
                    bank_id: None,
                })
                .await?;
            tracing::info!("Created administrator {}", created.id);
            created
        }
        (None, None) => anyhow::bail!(
            "no user registered with email {}; pass --create-admin <full name> to create one",
            args.email
        ),
    };

    let token = generate_token();
    storage
        .set_user_token_hash(user.id, &sha256_hex(&token))
        .await?;

    tracing::info!("API token issued for {} ({})", user.email, user.role.as_str());
    println!("{}", token);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&["root@bureau.mh"])).unwrap();
        assert_eq!(parsed.email, "root@bureau.mh");
        assert!(parsed.create_admin.is_none());

        let parsed = parse_args(args(&["root@bureau.mh", "--create-admin", "Root Admin"])).unwrap();
        assert_eq!(parsed.create_admin.as_deref(), Some("Root Admin"));

        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["root@bureau.mh", "--create-admin"])).is_err());
        assert!(parse_args(args(&["root@bureau.mh", "--bogus"])).is_err());
    }
}
