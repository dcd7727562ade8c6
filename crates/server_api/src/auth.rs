use google_client::identity::{demo_user, fallback_admin};
use shared::{domain::User, protocol::LoginResponse};
use tracing::{error, info, warn};

use crate::ApiContext;

/// Signs in with a Google access token. A failed profile lookup never blocks
/// sign-in; the fallback administrator identity is used instead.
pub async fn login_with_google(
    ctx: &ApiContext,
    access_token: &str,
    user_agent: Option<&str>,
) -> LoginResponse {
    let (user, fallback) = match ctx.identity.fetch_profile(access_token).await {
        Ok(user) => (user, false),
        Err(err) => {
            warn!(error = %err, "profile fetch failed; signing in as fallback administrator");
            (fallback_admin(), true)
        }
    };
    save_profile_and_session(ctx, &user, user_agent).await;
    info!(user_id = %user.id, fallback, "user signed in");

    LoginResponse {
        user,
        access_token: access_token.to_string(),
        fallback,
    }
}

pub async fn login_demo(ctx: &ApiContext, user_agent: Option<&str>) -> LoginResponse {
    let user = demo_user();
    save_profile_and_session(ctx, &user, user_agent).await;
    info!(user_id = %user.id, "demo user signed in");

    LoginResponse {
        user,
        access_token: ctx.drive.demo_token().to_string(),
        fallback: false,
    }
}

async fn save_profile_and_session(ctx: &ApiContext, user: &User, user_agent: Option<&str>) {
    if let Err(err) = ctx.store.upsert_profile(user).await {
        error!(user_id = %user.id, error = %err, "profile upsert failed");
        return;
    }
    if let Err(err) = ctx.store.record_session(user.id, user_agent).await {
        warn!(user_id = %user.id, error = %err, "session record failed");
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
