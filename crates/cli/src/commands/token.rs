//! `pickroute token seed`: Store an operator-provided refresh token.

use crate::runtime::Runtime;

pub async fn seed(refresh_token: String) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load().await?;
    runtime.credentials.seed(&refresh_token).await?;

    println!("✅ Refresh token stored ({} backend)", runtime.store.name());
    println!("   The next remote call exchanges it for an access token.");

    Ok(())
}
