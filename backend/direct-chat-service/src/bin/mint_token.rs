use anyhow::{anyhow, Context as _, Result};
use chrono::Duration;
use crypto_core::jwt::JwtIssuer;
use dotenvy::dotenv;
use std::env;

#[derive(Debug)]
struct Args {
    user_id: Option<String>,
    ttl_minutes: i64,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            user_id: None,
            ttl_minutes: 24 * 60,
        }
    }
}

fn parse_args() -> Result<Option<Args>> {
    let mut args = Args::default();
    let mut it = env::args().skip(1);

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--user" => {
                let v = it.next().ok_or_else(|| anyhow!("--user requires a user id"))?;
                args.user_id = Some(v);
            }
            "--ttl-minutes" => {
                let v = it.next().ok_or_else(|| anyhow!("--ttl-minutes requires a number"))?;
                args.ttl_minutes = v.parse().context("invalid --ttl-minutes")?;
            }
            "--help" | "-h" => {
                println!(
                    "\
mint-token

Mint an HS256 bearer token for local testing, signed with JWT_SECRET.

USAGE:
  mint-token --user <USER_ID> [--ttl-minutes <N>]
"
                );
                return Ok(None);
            }
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }

    Ok(Some(args))
}

fn main() -> Result<()> {
    dotenv().ok();

    let Some(args) = parse_args()? else {
        return Ok(());
    };
    let user_id = args
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow!("--user is required"))?;
    let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

    let issuer =
        JwtIssuer::from_secret(secret.as_bytes())?.with_ttl(Duration::minutes(args.ttl_minutes));
    let token = issuer.generate_access_token(&user_id)?;

    println!("{token}");
    Ok(())
}
