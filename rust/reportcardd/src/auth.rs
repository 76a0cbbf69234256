use crate::db;
use crate::error::{AppError, AppResult};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const ACCOUNTS_KEY: &str = "security.accounts";
const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

fn default_pbkdf2_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    email: String,
    password_hash: String,
    salt: String,
    #[serde(default = "default_pbkdf2_iterations")]
    iterations: u32,
}

impl Account {
    fn verify(&self, password: &str) -> bool {
        let key = derive_key(password, &self.salt, self.iterations.max(1));
        constant_time_eq(hex(&key).as_bytes(), self.password_hash.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub email: String,
    pub started_at: String,
}

impl Session {
    fn start(email: &str) -> Self {
        Session {
            email: email.to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn derive_key(password: &str, salt: &str, iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Runs over every byte whatever the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn credentials<'a>(email: &'a str, password: &'a str) -> AppResult<(String, &'a str)> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Enter email and password"));
    }
    Ok((email.to_ascii_lowercase(), password))
}

fn load_accounts(conn: &Connection) -> AppResult<Vec<Account>> {
    let Some(v) = db::settings_get_json(conn, ACCOUNTS_KEY)? else {
        return Ok(Vec::new());
    };
    serde_json::from_value(v)
        .map_err(|e| AppError::RemoteIo(format!("{} is malformed: {}", ACCOUNTS_KEY, e)))
}

pub fn has_accounts(conn: &Connection) -> AppResult<bool> {
    Ok(!load_accounts(conn)?.is_empty())
}

/// Creates the workspace's first account and signs it in. Later accounts are
/// refused.
pub fn register(conn: &Connection, email: &str, password: &str) -> AppResult<Session> {
    let (email, password) = credentials(email, password)?;
    let mut accounts = load_accounts(conn)?;
    if !accounts.is_empty() {
        return Err(AppError::validation("an account already exists"));
    }
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let key = derive_key(password, &salt, DEFAULT_PBKDF2_ITERATIONS);
    accounts.push(Account {
        password_hash: hex(&key),
        email: email.clone(),
        salt,
        iterations: DEFAULT_PBKDF2_ITERATIONS,
    });
    let v = serde_json::to_value(&accounts).map_err(anyhow::Error::from)?;
    db::settings_set_json(conn, ACCOUNTS_KEY, &v)?;
    tracing::info!(email = %email, "account registered");
    Ok(Session::start(&email))
}

pub fn sign_in(conn: &Connection, email: &str, password: &str) -> AppResult<Session> {
    let (email, password) = credentials(email, password)?;
    let accounts = load_accounts(conn)?;
    let matched = accounts
        .iter()
        .find(|a| a.email == email && a.verify(password));
    match matched {
        Some(a) => {
            tracing::info!(email = %a.email, "signed in");
            Ok(Session::start(&a.email))
        }
        None => {
            tracing::warn!(email = %email, "sign-in rejected");
            Err(AppError::validation("invalid email or password"))
        }
    }
}
