//! Basic usage example for passport-core
//!
//! This example demonstrates:
//! - Registering a customer
//! - Signing in and checking the access token
//! - Rotating the session with the refresh token
//! - Signing out

use std::sync::Arc;

use anyhow::Result;
use passport_core::{
    InMemoryCredentialStore, JwtConfig, Registration, SecretKey, SessionManager, TokenCodec,
    UserCredential,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let jwt = JwtConfig {
        secret_key: SecretKey::new("example-access-key-change-me-0123456789"),
        admin_key: SecretKey::new("example-admin-key-change-me-0123456789"),
        api_key: SecretKey::new("example-api-key-change-me-0123456789"),
        ..Default::default()
    };
    let store = Arc::new(InMemoryCredentialStore::new());
    let codec = Arc::new(TokenCodec::new(jwt)?);
    let sessions = SessionManager::new(store, codec, Default::default())?;

    println!("Registering alice...");
    let registered = sessions
        .register_customer(&Registration {
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password: "correcthorse9".to_string(),
        })
        .await?;
    println!("   id: {}, role: {}", registered.user.id, registered.user.role_id);

    println!("\nSigning in...");
    let passport = sessions
        .sign_in(&UserCredential {
            email: "alice@example.com".to_string(),
            password: "correcthorse9".to_string(),
        })
        .await?;
    let token = passport.token.ok_or_else(|| anyhow::anyhow!("sign-in returned no tokens"))?;
    println!("   session: {}", token.id);

    let claims = sessions.authenticate(&token.access_token).await?;
    println!("   access token belongs to {}", claims.id);

    println!("\nRotating the session...");
    let rotated = sessions.refresh(&token.refresh_token).await?;
    let rotated_token = rotated.token.ok_or_else(|| anyhow::anyhow!("refresh returned no tokens"))?;
    println!("   refresh token changed: {}", rotated_token.refresh_token != token.refresh_token);

    match sessions.refresh(&token.refresh_token).await {
        Ok(_) => println!("   old refresh token still works (unexpected)"),
        Err(e) => println!("   old refresh token rejected: {}", e),
    }

    println!("\nSigning out...");
    sessions.sign_out(&rotated_token.id).await?;
    let still_valid = sessions.authenticate(&rotated_token.access_token).await.is_ok();
    println!("   access token accepted after sign-out: {}", still_valid);

    Ok(())
}
