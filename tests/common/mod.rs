#![allow(dead_code)]

use actix_web::web;
use softwaretest::data;
use softwaretest::identity::IdentityService;
use softwaretest::platform::Platform;
use softwaretest::state::AppState;
use softwaretest::StartupPlan;

pub const PASSWORD: &str = "Passw0rd!";

/// Plans startup for a Linux host, which selects the in-memory SQLite database.
pub fn plan(environment: &str) -> StartupPlan {
    let environment = environment.to_string();
    StartupPlan::from_lookup(
        move |key| match key {
            "ConnectionStrings__DefaultConnection" => {
                Some("postgres://postgres@localhost/softwaretest".into())
            }
            "ConnectionStrings__MockDBConnection" => Some("sqlite::memory:".into()),
            "APP_ENVIRONMENT" => Some(environment.clone()),
            "JWT_SECRET" => Some("integration_test_secret".into()),
            _ => None,
        },
        Platform::Linux,
    )
    .unwrap()
}

pub async fn app_state(environment: &str) -> web::Data<AppState> {
    app_state_from(plan(environment)).await
}

pub async fn app_state_from(plan: StartupPlan) -> web::Data<AppState> {
    let store = data::connect(&plan.backend).await.unwrap();
    store.migrate().await.unwrap();
    web::Data::new(plan.build_state(store))
}

/// Connected to a fresh database with no identity tables, so every store call fails.
pub async fn unmigrated_app_state(environment: &str) -> web::Data<AppState> {
    let plan = plan(environment);
    let store = data::connect(&plan.backend).await.unwrap();
    web::Data::new(plan.build_state(store))
}

/// Registers and confirms an account without going through HTTP. Returns the user id.
pub async fn confirmed_user(identity: &IdentityService, email: &str) -> String {
    let registration = identity.register(email, PASSWORD).await.unwrap();
    identity
        .confirm_email(&registration.user.id, &registration.confirmation_code)
        .await
        .unwrap();
    registration.user.id
}
